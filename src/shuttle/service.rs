//! Shuttle service layer - seat-capacity accounting and reservations

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::shuttle::{
    qr_payload, BookShuttleRequest, CancelShuttleBookingResponse, ListRoutesQuery, RouteStatus,
    ShuttleBooking, ShuttleBookingResponse, ShuttleBookingStatus, ShuttleBookingWithRoute,
    ShuttleRoute, ShuttleRouteAvailability,
};

/// Shuttle service for route availability and seat reservation
#[derive(Clone)]
pub struct ShuttleService {
    db_pool: PgPool,
}

impl ShuttleService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// List active routes with availability computed for the requested
    /// date (today when absent). Availability is always recomputed from
    /// the bookings table, never cached.
    pub async fn list_routes(
        &self,
        query: ListRoutesQuery,
    ) -> ApiResult<Vec<ShuttleRouteAvailability>> {
        let mut builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM shuttle_routes WHERE status = ");
        builder.push_bind(RouteStatus::Active);
        if let Some(from) = &query.from {
            builder.push(" AND route_from ILIKE ");
            builder.push_bind(format!("%{}%", from));
        }
        if let Some(to) = &query.to {
            builder.push(" AND route_to ILIKE ");
            builder.push_bind(format!("%{}%", to));
        }
        builder.push(" ORDER BY departure_time ASC");

        let routes = builder
            .build_query_as::<ShuttleRoute>()
            .fetch_all(&self.db_pool)
            .await?;

        let date = query.date.unwrap_or_else(|| Utc::now().date_naive());

        let mut result = Vec::with_capacity(routes.len());
        for route in routes {
            let booked = self.seats_booked(route.id, date).await?;
            result.push(ShuttleRouteAvailability {
                id: route.id,
                from: route.route_from,
                to: route.route_to,
                departure_time: route.departure_time.format("%H:%M").to_string(),
                arrival_time: route.arrival_time.format("%H:%M").to_string(),
                price: route.price_per_seat,
                available_seats: route.total_seats - booked,
                total_seats: route.total_seats,
                driver: route.driver_name,
                vehicle: route.vehicle_type,
                frequency: route.frequency,
            });
        }

        Ok(result)
    }

    /// Sum of seats booked on a route for a date, cancelled bookings
    /// excluded
    async fn seats_booked(&self, route_id: Uuid, date: NaiveDate) -> ApiResult<i32> {
        let booked = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(seats_booked), 0)
            FROM shuttle_bookings
            WHERE route_id = $1 AND booking_date = $2 AND status <> 'cancelled'
            "#,
        )
        .bind(route_id)
        .bind(date)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(booked as i32)
    }

    /// Reserve seats on a route for a date.
    ///
    /// The seat sum and the insert run in one transaction with the route
    /// row locked, so two concurrent requests cannot both pass the
    /// capacity check and oversell the route.
    pub async fn book_shuttle(
        &self,
        user_id: Uuid,
        request: BookShuttleRequest,
    ) -> ApiResult<ShuttleBookingResponse> {
        request.validate()?;

        let mut tx = self.db_pool.begin().await?;

        // Row lock serializes concurrent seat reservations on this route
        let route =
            sqlx::query_as::<_, ShuttleRoute>("SELECT * FROM shuttle_routes WHERE id = $1 FOR UPDATE")
                .bind(request.route_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| ApiError::NotFound("Route not found".to_string()))?;

        if route.status != RouteStatus::Active {
            return Err(ApiError::Conflict("Route is not active".to_string()));
        }

        let booked = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(seats_booked), 0)
            FROM shuttle_bookings
            WHERE route_id = $1 AND booking_date = $2 AND status <> 'cancelled'
            "#,
        )
        .bind(request.route_id)
        .bind(request.date)
        .fetch_one(&mut *tx)
        .await? as i32;

        let available = route.total_seats - booked;
        if request.seats > available {
            return Err(ApiError::Conflict("Not enough seats available".to_string()));
        }

        let total_price = route.price_per_seat * Decimal::from(request.seats);
        let booking_id = Uuid::new_v4();
        let qr = qr_payload(booking_id, request.route_id, request.date, request.seats);

        let booking = sqlx::query_as::<_, ShuttleBooking>(
            r#"
            INSERT INTO shuttle_bookings (
                id, user_id, route_id, booking_date, seats_booked, total_price,
                status, qr_code, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(user_id)
        .bind(request.route_id)
        .bind(request.date)
        .bind(request.seats)
        .bind(total_price)
        .bind(ShuttleBookingStatus::Confirmed)
        .bind(&qr)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ShuttleBookingResponse {
            booking_id: booking.id,
            route_id: booking.route_id,
            from: route.route_from,
            to: route.route_to,
            departure_time: route.departure_time.format("%H:%M").to_string(),
            date: booking.booking_date,
            seats: booking.seats_booked,
            total_price: booking.total_price,
            status: booking.status,
            qr_code: booking.qr_code,
        })
    }

    /// List the user's shuttle bookings with route details
    pub async fn list_bookings(&self, user_id: Uuid) -> ApiResult<Vec<ShuttleBookingWithRoute>> {
        let bookings = sqlx::query_as::<_, ShuttleBookingWithRoute>(
            r#"
            SELECT b.id, b.route_id, r.route_from, r.route_to, r.departure_time,
                   b.booking_date, b.seats_booked, b.total_price, b.status, b.qr_code
            FROM shuttle_bookings b
            JOIN shuttle_routes r ON b.route_id = r.id
            WHERE b.user_id = $1
            ORDER BY b.booking_date DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(bookings)
    }

    /// Cancel a shuttle booking. Owner-only; cancelling releases the seats
    /// implicitly because cancelled bookings are excluded from the
    /// availability sum.
    pub async fn cancel_booking(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> ApiResult<CancelShuttleBookingResponse> {
        let booking = sqlx::query_as::<_, ShuttleBooking>(
            "SELECT * FROM shuttle_bookings WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))?;

        if booking.status == ShuttleBookingStatus::Cancelled {
            return Err(ApiError::Validation(
                "Booking already cancelled".to_string(),
            ));
        }

        sqlx::query("UPDATE shuttle_bookings SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(ShuttleBookingStatus::Cancelled)
            .bind(Utc::now())
            .execute(&self.db_pool)
            .await?;

        Ok(CancelShuttleBookingResponse {
            refund_amount: booking.total_price,
        })
    }
}
