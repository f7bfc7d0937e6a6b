//! Payment routes
//!
//! The verify callback is registered for both GET and POST: the gateway
//! redirects the browser to the callback URL with GET, while API clients
//! may re-trigger verification with POST.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::payment;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments/initialize", post(payment::initialize_payment))
        .route(
            "/payments/verify",
            get(payment::verify_payment).post(payment::verify_payment),
        )
        .route("/payments/history", get(payment::payment_history))
        .route("/payments/balance", get(payment::get_balance))
        .route("/payments/webhook", post(payment::webhook))
}
