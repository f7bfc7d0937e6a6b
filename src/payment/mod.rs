//! Payment Reconciliation Engine
//!
//! Owns the payment record lifecycle and the booking-balance update.
//! Both settlement entry points (the caller-initiated verify call and the
//! gateway-initiated webhook) funnel through one shared completion routine
//! so the idempotency and balance-update logic lives in exactly one place.

mod gateway;
mod model;
mod service;

pub use gateway::{
    InitializeParams, InitializedTransaction, PaystackClient, VerifiedTransaction, VerifyResponse,
    WebhookData, WebhookEvent,
};
pub use model::{
    apply_payment, BalanceResponse, BalanceUpdate, InitializePaymentRequest,
    InitializePaymentResponse, Payment, PaymentHistoryItem, PaymentHistoryQuery,
    PaymentHistoryResponse, PaymentStatus, PaymentSummary, PaymentType, SettlementOutcome,
    VerifyPaymentQuery,
};
pub use service::{generate_payment_reference, PaymentService};
