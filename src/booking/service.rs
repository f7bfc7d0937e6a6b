//! Booking service layer - business logic for the room booking lifecycle

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::booking::{
    duration_months, Booking, BookingResponse, BookingStatus, BookingWithRoom,
    CancelBookingResponse, CreateBookingRequest, ListBookingsQuery, UpdateBookingStatusRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthenticatedUser;
use crate::models::{Pagination, Room, RoomStatus};
use crate::notify::{BookingConfirmation, EmailNotifier};

/// Booking service for managing the room booking lifecycle
#[derive(Clone)]
pub struct BookingService {
    db_pool: PgPool,
    notifier: EmailNotifier,
    currency: String,
}

impl BookingService {
    pub fn new(db_pool: PgPool, notifier: EmailNotifier, currency: String) -> Self {
        Self {
            db_pool,
            notifier,
            currency,
        }
    }

    /// Create a booking for a room.
    ///
    /// The availability check and the insert run in one transaction with
    /// the room row locked, so two concurrent requests for the same room
    /// serialize instead of both passing the overlap scan.
    pub async fn create_booking(
        &self,
        user_id: Uuid,
        request: CreateBookingRequest,
    ) -> ApiResult<BookingResponse> {
        let today = Utc::now().date_naive();

        if request.check_in_date < today {
            return Err(ApiError::Validation(
                "Check-in date cannot be in the past".to_string(),
            ));
        }

        if request.check_out_date <= request.check_in_date {
            return Err(ApiError::Validation(
                "Check-out date must be after check-in date".to_string(),
            ));
        }

        let duration = duration_months(request.check_in_date, request.check_out_date);

        let mut tx = self.db_pool.begin().await?;

        // Row lock serializes concurrent bookings of the same room
        let room = sqlx::query_as::<_, Room>(
            "SELECT * FROM rooms WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(request.room_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::NotFound("Room not found".to_string()))?;

        if room.status != RoomStatus::Available {
            return Err(ApiError::Conflict("Room is not available".to_string()));
        }

        // Closed-interval overlap test against bookings that still hold the room
        let conflict = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM bookings
                WHERE room_id = $1
                  AND deleted_at IS NULL
                  AND status IN ('pending', 'approved', 'active')
                  AND check_in_date <= $2
                  AND check_out_date >= $3
            )
            "#,
        )
        .bind(request.room_id)
        .bind(request.check_out_date)
        .bind(request.check_in_date)
        .fetch_one(&mut *tx)
        .await?;

        if conflict {
            return Err(ApiError::Conflict(
                "Room is already booked for the selected dates".to_string(),
            ));
        }

        let total_amount = room.price_per_month * Decimal::from(duration);

        let booking = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (
                id, user_id, room_id, check_in_date, check_out_date, duration_months,
                total_amount, amount_paid, outstanding_balance, status, notes,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $7, $8, $9, $10, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(request.room_id)
        .bind(request.check_in_date)
        .bind(request.check_out_date)
        .bind(duration)
        .bind(total_amount)
        .bind(BookingStatus::Pending)
        .bind(&request.notes)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.spawn_confirmation_email(&booking, &room).await;

        Ok(BookingResponse {
            id: booking.id,
            room_id: booking.room_id,
            room_number: room.room_number,
            room_type: room.room_type,
            student_id: booking.user_id,
            check_in_date: booking.check_in_date,
            check_out_date: booking.check_out_date,
            duration: booking.duration_months,
            total_amount: booking.total_amount,
            amount_paid: booking.amount_paid,
            outstanding_balance: booking.outstanding_balance,
            status: booking.status,
            notes: booking.notes,
            created_at: booking.created_at,
        })
    }

    /// List the user's bookings with status filter and pagination
    pub async fn list_bookings(
        &self,
        user_id: Uuid,
        query: ListBookingsQuery,
    ) -> ApiResult<(Vec<BookingWithRoom>, Pagination)> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(10).clamp(1, 100);
        let offset = (page - 1) * limit;

        let mut list_builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
            r#"
            SELECT b.id, b.user_id, b.room_id, r.room_number, r.room_type,
                   b.check_in_date, b.check_out_date, b.duration_months,
                   b.total_amount, b.amount_paid, b.outstanding_balance,
                   b.status, b.notes, b.created_at, b.updated_at
            FROM bookings b
            JOIN rooms r ON b.room_id = r.id
            WHERE b.deleted_at IS NULL AND b.user_id =
            "#,
        );
        list_builder.push_bind(user_id);
        if let Some(status) = query.status {
            list_builder.push(" AND b.status = ");
            list_builder.push_bind(status);
        }
        list_builder.push(" ORDER BY b.created_at DESC LIMIT ");
        list_builder.push_bind(limit);
        list_builder.push(" OFFSET ");
        list_builder.push_bind(offset);

        let bookings = list_builder
            .build_query_as::<BookingWithRoom>()
            .fetch_all(&self.db_pool)
            .await?;

        let mut count_builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
            "SELECT COUNT(*) FROM bookings WHERE deleted_at IS NULL AND user_id = ",
        );
        count_builder.push_bind(user_id);
        if let Some(status) = query.status {
            count_builder.push(" AND status = ");
            count_builder.push_bind(status);
        }

        let total = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.db_pool)
            .await?;

        Ok((bookings, Pagination::new(page, limit, total)))
    }

    /// Get a single booking owned by the user
    pub async fn get_booking(&self, user_id: Uuid, id: Uuid) -> ApiResult<BookingWithRoom> {
        let booking = sqlx::query_as::<_, BookingWithRoom>(
            r#"
            SELECT b.id, b.user_id, b.room_id, r.room_number, r.room_type,
                   b.check_in_date, b.check_out_date, b.duration_months,
                   b.total_amount, b.amount_paid, b.outstanding_balance,
                   b.status, b.notes, b.created_at, b.updated_at
            FROM bookings b
            JOIN rooms r ON b.room_id = r.id
            WHERE b.id = $1 AND b.user_id = $2 AND b.deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))?;

        Ok(booking)
    }

    /// Administrative status transition, constrained by the booking state
    /// machine
    pub async fn update_booking_status(
        &self,
        id: Uuid,
        request: UpdateBookingStatusRequest,
    ) -> ApiResult<Booking> {
        let booking = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))?;

        if !booking.status.can_transition_to(request.status) {
            return Err(ApiError::Validation(format!(
                "Cannot transition booking from {} to {}",
                booking.status.as_str(),
                request.status.as_str()
            )));
        }

        let updated = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = $2, notes = COALESCE($3, notes), updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.status)
        .bind(&request.notes)
        .bind(Utc::now())
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(
            booking_id = %id,
            from = booking.status.as_str(),
            to = updated.status.as_str(),
            "Booking status updated"
        );

        Ok(updated)
    }

    /// Cancel a booking. Only the owner or an admin may cancel; the
    /// reported refund is the full amount paid so far.
    pub async fn cancel_booking(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
    ) -> ApiResult<CancelBookingResponse> {
        let booking = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))?;

        if booking.user_id != actor.user_id && !actor.role.is_admin() {
            return Err(ApiError::Forbidden(
                "You do not have permission to cancel this booking".to_string(),
            ));
        }

        if matches!(
            booking.status,
            BookingStatus::Cancelled | BookingStatus::Completed
        ) {
            return Err(ApiError::Validation(
                "Booking cannot be cancelled".to_string(),
            ));
        }

        sqlx::query("UPDATE bookings SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(BookingStatus::Cancelled)
            .bind(Utc::now())
            .execute(&self.db_pool)
            .await?;

        Ok(CancelBookingResponse {
            refund_amount: booking.amount_paid,
            refund_date: Utc::now().date_naive(),
        })
    }

    /// Fire-and-forget confirmation email; failures are logged, never
    /// propagated
    async fn spawn_confirmation_email(&self, booking: &Booking, room: &Room) {
        let email = match sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
            .bind(booking.user_id)
            .fetch_optional(&self.db_pool)
            .await
        {
            Ok(Some(email)) => email,
            Ok(None) => {
                tracing::warn!(user_id = %booking.user_id, "No user email for booking confirmation");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to look up email for booking confirmation");
                return;
            }
        };

        let details = BookingConfirmation {
            booking_id: booking.id,
            room_number: room.room_number.clone(),
            check_in_date: booking.check_in_date,
            check_out_date: booking.check_out_date,
            total_amount: booking.total_amount,
            currency: self.currency.clone(),
        };

        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send_booking_confirmation(&email, &details).await {
                tracing::warn!(error = %e, "Failed to send booking confirmation email");
            }
        });
    }
}
