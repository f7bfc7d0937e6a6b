//! HostelHub server library
//!
//! Multi-tenant hostel management backend: room bookings, shuttle seat
//! reservations and payment reconciliation against the Paystack gateway.

pub mod auth;
pub mod booking;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod payment;
pub mod routes;
pub mod shuttle;
pub mod state;

use axum::{middleware::from_fn, routing::get, Router};

use crate::state::AppState;

/// Builds the full application router with middleware layers applied
pub fn app(state: AppState) -> Router {
    let cors = routes::configure_cors(&state.config);

    let api = Router::new()
        .merge(routes::booking::routes())
        .merge(routes::shuttle::routes())
        .merge(routes::payment::routes());

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(from_fn(middleware::request_tracing))
        .layer(from_fn(middleware::security_headers))
        .layer(cors)
        .with_state(state)
}
