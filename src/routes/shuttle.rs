//! Shuttle routes

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::shuttle;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/shuttle/routes", get(shuttle::list_routes))
        .route(
            "/shuttle/bookings",
            post(shuttle::book_shuttle).get(shuttle::list_bookings),
        )
        .route("/shuttle/bookings/:id/cancel", post(shuttle::cancel_booking))
}
