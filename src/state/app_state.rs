//! Shared application state for dependency injection into route handlers

use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;

use crate::booking::BookingService;
use crate::config::Config;
use crate::notify::EmailNotifier;
use crate::payment::{PaymentService, PaystackClient};
use crate::shuttle::ShuttleService;

/// Application state shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<Config>,
    pub booking_service: Arc<BookingService>,
    pub shuttle_service: Arc<ShuttleService>,
    pub payment_service: Arc<PaymentService>,
}

impl AppState {
    pub fn new(db_pool: PgPool, config: Config, notifier: EmailNotifier) -> Self {
        let gateway = PaystackClient::new(
            config.paystack_base_url.clone(),
            config.paystack_secret_key.clone(),
            config.paystack_webhook_secret.clone(),
        );

        let booking_service = Arc::new(BookingService::new(
            db_pool.clone(),
            notifier.clone(),
            config.currency.clone(),
        ));
        let shuttle_service = Arc::new(ShuttleService::new(db_pool.clone()));
        let payment_service = Arc::new(PaymentService::new(
            db_pool.clone(),
            gateway,
            notifier,
            config.api_base_url.clone(),
            config.currency.clone(),
        ));

        Self {
            db_pool,
            config: Arc::new(config),
            booking_service,
            shuttle_service,
            payment_service,
        }
    }
}

impl FromRef<AppState> for Arc<Config> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.db_pool.clone()
    }
}

impl FromRef<AppState> for Arc<BookingService> {
    fn from_ref(state: &AppState) -> Self {
        state.booking_service.clone()
    }
}

impl FromRef<AppState> for Arc<ShuttleService> {
    fn from_ref(state: &AppState) -> Self {
        state.shuttle_service.clone()
    }
}

impl FromRef<AppState> for Arc<PaymentService> {
    fn from_ref(state: &AppState) -> Self {
        state.payment_service.clone()
    }
}
