//! Shuttle models and data structures

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Shuttle route status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "shuttle_route_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    Active,
    Inactive,
}

/// Shuttle route model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct ShuttleRoute {
    pub id: Uuid,
    pub route_from: String,
    pub route_to: String,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
    pub price_per_seat: Decimal,
    pub total_seats: i32,
    pub driver_name: Option<String>,
    pub vehicle_type: Option<String>,
    pub frequency: Option<String>,
    pub status: RouteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Shuttle booking status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "shuttle_booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ShuttleBookingStatus {
    Confirmed,
    Cancelled,
}

/// Shuttle booking model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct ShuttleBooking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub route_id: Uuid,
    pub booking_date: NaiveDate,
    pub seats_booked: i32,
    pub total_price: Decimal,
    pub status: ShuttleBookingStatus,
    pub qr_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Shuttle booking joined with its route for list responses
#[derive(Debug, Serialize, sqlx::FromRow, Clone)]
pub struct ShuttleBookingWithRoute {
    pub id: Uuid,
    pub route_id: Uuid,
    pub route_from: String,
    pub route_to: String,
    pub departure_time: NaiveTime,
    pub booking_date: NaiveDate,
    pub seats_booked: i32,
    pub total_price: Decimal,
    pub status: ShuttleBookingStatus,
    pub qr_code: Option<String>,
}

/// Query parameters for listing routes
#[derive(Debug, Deserialize)]
pub struct ListRoutesQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub date: Option<NaiveDate>,
}

fn default_seats() -> i32 {
    1
}

/// Request DTO for booking shuttle seats
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookShuttleRequest {
    pub route_id: Uuid,
    pub date: NaiveDate,
    #[serde(default = "default_seats")]
    #[validate(range(min = 1, message = "Seats must be at least 1"))]
    pub seats: i32,
}

/// Route with availability computed for a given date
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShuttleRouteAvailability {
    pub id: Uuid,
    pub from: String,
    pub to: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub price: Decimal,
    pub available_seats: i32,
    pub total_seats: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
}

/// Response DTO for a shuttle booking
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShuttleBookingResponse {
    pub booking_id: Uuid,
    pub route_id: Uuid,
    pub from: String,
    pub to: String,
    pub departure_time: String,
    pub date: NaiveDate,
    pub seats: i32,
    pub total_price: Decimal,
    pub status: ShuttleBookingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
}

/// Response DTO for a cancellation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelShuttleBookingResponse {
    pub refund_amount: Decimal,
}

/// QR payload attached to a confirmed booking, used for physical boarding
/// verification. The content is not further validated by this system.
pub fn qr_payload(booking_id: Uuid, route_id: Uuid, date: NaiveDate, seats: i32) -> String {
    serde_json::json!({
        "bookingId": booking_id,
        "routeId": route_id,
        "date": date,
        "seats": seats,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qr_payload_contents() {
        let booking_id = Uuid::new_v4();
        let route_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let payload = qr_payload(booking_id, route_id, date, 2);
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(parsed["bookingId"], booking_id.to_string());
        assert_eq!(parsed["routeId"], route_id.to_string());
        assert_eq!(parsed["date"], "2024-06-01");
        assert_eq!(parsed["seats"], 2);
    }

    #[test]
    fn test_seats_default_to_one() {
        let req: BookShuttleRequest = serde_json::from_str(
            r#"{"routeId": "5f0cbe79-98b8-4f14-9b32-7de8b0f9e6f1", "date": "2024-06-01"}"#,
        )
        .unwrap();
        assert_eq!(req.seats, 1);
    }

    #[test]
    fn test_zero_seats_fails_validation() {
        use validator::Validate;

        let req: BookShuttleRequest = serde_json::from_str(
            r#"{"routeId": "5f0cbe79-98b8-4f14-9b32-7de8b0f9e6f1", "date": "2024-06-01", "seats": 0}"#,
        )
        .unwrap();
        assert!(req.validate().is_err());
    }
}
