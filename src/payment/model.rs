//! Payment models and data structures

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::Pagination;

/// Payment status. A payment transitions `pending -> completed` or
/// `pending -> failed` exactly once; both end states are terminal.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

/// Payment type
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    RoomBooking,
    OtherFees,
}

/// Payment model. `transaction_reference` is the sole correlation key
/// between this system and the gateway and is globally unique.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub payment_type: PaymentType,
    pub reference_id: Option<String>,
    pub transaction_reference: String,
    pub status: PaymentStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_payment_method() -> String {
    "paystack".to_string()
}

/// Request DTO for initializing a payment
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializePaymentRequest {
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    pub reference: Option<String>,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    pub booking_id: Option<Uuid>,
}

/// Response DTO for an initialized payment
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializePaymentResponse {
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_link: String,
    pub reference: String,
}

/// Query parameters for the verify callback
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentQuery {
    pub reference: Option<String>,
}

/// Query parameters for payment history
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistoryQuery {
    pub status: Option<PaymentStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<i64>,
}

/// A single payment in the history listing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistoryItem {
    pub id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    pub reference: Option<String>,
    pub status: PaymentStatus,
    pub payment_method: String,
    pub transaction_reference: String,
    pub date: DateTime<Utc>,
    pub receipt_url: Option<String>,
}

impl From<Payment> for PaymentHistoryItem {
    fn from(p: Payment) -> Self {
        let receipt_url = matches!(p.status, PaymentStatus::Completed)
            .then(|| format!("/api/payments/{}/receipt", p.id));
        Self {
            id: p.id,
            amount: p.amount,
            currency: p.currency,
            payment_type: p.payment_type,
            reference: p.reference_id,
            status: p.status,
            payment_method: p.payment_method,
            transaction_reference: p.transaction_reference,
            date: p.created_at,
            receipt_url,
        }
    }
}

/// Totals shown alongside the payment history
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    pub total_paid: Decimal,
    pub outstanding_balance: Decimal,
}

/// Payment history with summary and pagination
#[derive(Debug, Serialize)]
pub struct PaymentHistoryResponse {
    pub payments: Vec<PaymentHistoryItem>,
    pub summary: PaymentSummary,
    pub pagination: Pagination,
}

/// Aggregate balance view over the user's chargeable bookings
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub outstanding_balance: Decimal,
    pub total_owed: Decimal,
    pub amount_paid: Decimal,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub next_payment_due: Option<NaiveDate>,
}

/// Outcome of the shared settlement routine
#[derive(Debug)]
pub enum SettlementOutcome {
    /// The payment was pending and has now been completed; the booking
    /// balance (if any) was updated in the same transaction.
    Applied(Payment),
    /// The payment was already completed; nothing was changed.
    AlreadySettled,
    /// The payment was previously marked failed; nothing was changed.
    Failed,
}

/// Result of applying a payment amount to a booking balance
#[derive(Debug, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub amount_paid: Decimal,
    pub outstanding_balance: Decimal,
    /// True when the booking is fully paid by this payment
    pub settled: bool,
}

/// Booking balance arithmetic. The outstanding balance is floored at zero
/// and `settled` reflects the pre-floor remainder, so an overpayment still
/// settles the booking.
pub fn apply_payment(total_amount: Decimal, amount_paid: Decimal, payment: Decimal) -> BalanceUpdate {
    let new_amount_paid = amount_paid + payment;
    let remainder = total_amount - new_amount_paid;
    BalanceUpdate {
        amount_paid: new_amount_paid,
        outstanding_balance: remainder.max(Decimal::ZERO),
        settled: remainder <= Decimal::ZERO,
    }
}
