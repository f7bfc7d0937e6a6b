//! Shuttle booking handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::shuttle::{
    BookShuttleRequest, CancelShuttleBookingResponse, ListRoutesQuery, ShuttleBookingResponse,
    ShuttleBookingWithRoute, ShuttleRouteAvailability,
};
use crate::state::AppState;

/// GET /api/shuttle/routes
pub async fn list_routes(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<ListRoutesQuery>,
) -> ApiResult<Json<ApiResponse<Vec<ShuttleRouteAvailability>>>> {
    let routes = state.shuttle_service.list_routes(query).await?;
    Ok(Json(ApiResponse::ok(routes)))
}

/// POST /api/shuttle/bookings
pub async fn book_shuttle(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<BookShuttleRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ShuttleBookingResponse>>)> {
    let booking = state
        .shuttle_service
        .book_shuttle(user.user_id, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            booking,
            "Shuttle booked successfully",
        )),
    ))
}

/// GET /api/shuttle/bookings
pub async fn list_bookings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<ApiResponse<Vec<ShuttleBookingWithRoute>>>> {
    let bookings = state.shuttle_service.list_bookings(user.user_id).await?;
    Ok(Json(ApiResponse::ok(bookings)))
}

/// POST /api/shuttle/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<CancelShuttleBookingResponse>>> {
    let refund = state.shuttle_service.cancel_booking(user.user_id, id).await?;

    Ok(Json(ApiResponse::ok_with_message(
        refund,
        "Shuttle booking cancelled",
    )))
}
