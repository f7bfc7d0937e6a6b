//! Room booking handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::booking::{
    Booking, BookingResponse, CancelBookingResponse, CreateBookingRequest, ListBookingsQuery,
    UpdateBookingStatusRequest,
};
use crate::error::ApiResult;
use crate::middleware::{AdminUser, AuthenticatedUser};
use crate::models::{ApiResponse, Pagination};
use crate::state::AppState;

#[derive(Serialize)]
pub struct BookingListResponse {
    pub bookings: Vec<BookingResponse>,
    pub pagination: Pagination,
}

/// POST /api/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateBookingRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<BookingResponse>>)> {
    let booking = state
        .booking_service
        .create_booking(user.user_id, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            booking,
            "Booking created successfully",
        )),
    ))
}

/// GET /api/bookings
pub async fn list_bookings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListBookingsQuery>,
) -> ApiResult<Json<ApiResponse<BookingListResponse>>> {
    let (bookings, pagination) = state
        .booking_service
        .list_bookings(user.user_id, query)
        .await?;

    Ok(Json(ApiResponse::ok(BookingListResponse {
        bookings: bookings.into_iter().map(BookingResponse::from).collect(),
        pagination,
    })))
}

/// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<BookingResponse>>> {
    let booking = state.booking_service.get_booking(user.user_id, id).await?;
    Ok(Json(ApiResponse::ok(BookingResponse::from(booking))))
}

/// PATCH /api/bookings/:id/status (admin only)
pub async fn update_booking_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBookingStatusRequest>,
) -> ApiResult<Json<ApiResponse<Booking>>> {
    let booking = state
        .booking_service
        .update_booking_status(id, request)
        .await?;

    Ok(Json(ApiResponse::ok_with_message(
        booking,
        "Booking status updated",
    )))
}

/// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<CancelBookingResponse>>> {
    let refund = state.booking_service.cancel_booking(&user, id).await?;

    Ok(Json(ApiResponse::ok_with_message(
        refund,
        "Booking cancelled successfully",
    )))
}
