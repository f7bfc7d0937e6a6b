//! Booking models and data structures

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Booking status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Active,
    Completed,
    Cancelled,
    Rejected,
}

impl BookingStatus {
    /// Terminal states freeze balance mutation and accept no transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Rejected
        )
    }

    /// Administrative transition graph:
    /// pending -> approved | rejected | cancelled,
    /// approved -> active | cancelled,
    /// active -> completed | cancelled.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Approved, Active)
                | (Approved, Cancelled)
                | (Active, Completed)
                | (Active, Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Active => "active",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Rejected => "rejected",
        }
    }
}

/// Booking model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub duration_months: i32,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub outstanding_balance: Decimal,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Booking joined with its room for list/detail responses
#[derive(Debug, Serialize, sqlx::FromRow, Clone)]
pub struct BookingWithRoom {
    pub id: Uuid,
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub room_number: String,
    pub room_type: String,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub duration_months: i32,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub outstanding_balance: Decimal,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for creating a booking
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub room_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub notes: Option<String>,
}

/// Request DTO for the administrative status transition
#[derive(Debug, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
    pub notes: Option<String>,
}

/// Query parameters for listing bookings
#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    pub status: Option<BookingStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Response DTO for a booking
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub id: Uuid,
    pub room_id: Uuid,
    pub room_number: String,
    pub room_type: String,
    pub student_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub duration: i32,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub outstanding_balance: Decimal,
    pub status: BookingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<BookingWithRoom> for BookingResponse {
    fn from(b: BookingWithRoom) -> Self {
        Self {
            id: b.id,
            room_id: b.room_id,
            room_number: b.room_number,
            room_type: b.room_type,
            student_id: b.user_id,
            check_in_date: b.check_in_date,
            check_out_date: b.check_out_date,
            duration: b.duration_months,
            total_amount: b.total_amount,
            amount_paid: b.amount_paid,
            outstanding_balance: b.outstanding_balance,
            status: b.status,
            notes: b.notes,
            created_at: b.created_at,
        }
    }
}

/// Response DTO for a cancellation (full-refund policy; the actual money
/// movement is triggered separately by an operator)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBookingResponse {
    pub refund_amount: Decimal,
    pub refund_date: NaiveDate,
}

/// Whole-month duration between check-in and check-out, floored at 1.
///
/// Day-of-month is deliberately ignored, so partial months are truncated.
/// Downstream pricing depends on this exact formula; do not "fix" it to
/// count elapsed days.
pub fn duration_months(check_in: NaiveDate, check_out: NaiveDate) -> i32 {
    let months = (check_out.year() - check_in.year()) * 12
        + (check_out.month() as i32 - check_in.month() as i32);
    months.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_duration_ignores_day_of_month() {
        assert_eq!(duration_months(d(2024, 1, 15), d(2024, 3, 15)), 2);
        assert_eq!(duration_months(d(2024, 1, 31), d(2024, 3, 1)), 2);
    }

    #[test]
    fn test_duration_three_months() {
        assert_eq!(duration_months(d(2024, 2, 1), d(2024, 5, 1)), 3);
    }

    #[test]
    fn test_duration_spans_year_boundary() {
        assert_eq!(duration_months(d(2024, 11, 1), d(2025, 2, 1)), 3);
    }

    #[test]
    fn test_duration_floors_at_one() {
        assert_eq!(duration_months(d(2024, 1, 1), d(2024, 1, 20)), 1);
    }

    #[test]
    fn test_total_amount_from_duration() {
        let duration = duration_months(d(2024, 2, 1), d(2024, 5, 1));
        let total = dec!(500) * Decimal::from(duration);
        assert_eq!(total, dec!(1500));
    }

    #[test]
    fn test_transition_graph() {
        use BookingStatus::*;

        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Approved.can_transition_to(Active));
        assert!(Approved.can_transition_to(Cancelled));
        assert!(Active.can_transition_to(Completed));
        assert!(Active.can_transition_to(Cancelled));

        // No shortcuts or resurrections
        assert!(!Pending.can_transition_to(Active));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Active.can_transition_to(Approved));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Rejected.can_transition_to(Approved));
    }

    #[test]
    fn test_terminal_states() {
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::Rejected.is_terminal());
        assert!(!BookingStatus::Pending.is_terminal());
        assert!(!BookingStatus::Approved.is_terminal());
        assert!(!BookingStatus::Active.is_terminal());
    }
}
