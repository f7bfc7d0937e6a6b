//! Room booking routes

use axum::routing::{get, patch, post};
use axum::Router;

use crate::handlers::booking;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/bookings",
            post(booking::create_booking).get(booking::list_bookings),
        )
        .route("/bookings/:id", get(booking::get_booking))
        .route("/bookings/:id/status", patch(booking::update_booking_status))
        .route("/bookings/:id/cancel", post(booking::cancel_booking))
}
