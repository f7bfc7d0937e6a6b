//! Payment handlers, including the gateway webhook

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::payment::{
    BalanceResponse, InitializePaymentRequest, InitializePaymentResponse, Payment,
    PaymentHistoryQuery, PaymentHistoryResponse, PaystackClient, VerifyPaymentQuery,
};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// POST /api/payments/initialize
pub async fn initialize_payment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<InitializePaymentRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<InitializePaymentResponse>>)> {
    let payment = state
        .payment_service
        .initialize_payment(user.user_id, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            payment,
            "Payment initialized",
        )),
    ))
}

/// GET|POST /api/payments/verify?reference=...
pub async fn verify_payment(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<VerifyPaymentQuery>,
) -> ApiResult<Json<ApiResponse<Payment>>> {
    let reference = query.reference.ok_or_else(|| {
        ApiError::Validation("Payment reference is required".to_string())
    })?;

    let (payment, newly_settled) = state.payment_service.verify_payment(&reference).await?;

    let message = if newly_settled {
        "Payment verified successfully"
    } else {
        "Payment already verified"
    };

    Ok(Json(ApiResponse::ok_with_message(payment, message)))
}

/// GET /api/payments/history
pub async fn payment_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PaymentHistoryQuery>,
) -> ApiResult<Json<ApiResponse<PaymentHistoryResponse>>> {
    let history = state
        .payment_service
        .payment_history(user.user_id, query)
        .await?;
    Ok(Json(ApiResponse::ok(history)))
}

/// GET /api/payments/balance
pub async fn get_balance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<ApiResponse<BalanceResponse>>> {
    let balance = state.payment_service.get_balance(user.user_id).await?;
    Ok(Json(ApiResponse::ok(balance)))
}

/// POST /api/payments/webhook
///
/// Unauthenticated; trust comes from the HMAC signature over the raw
/// body. Once the signature and payload shape check out, the endpoint
/// always acknowledges with 200 so the gateway does not retry events we
/// have already recorded or deliberately ignored.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let Some(signature) = signature else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Missing signature" })),
        )
            .into_response();
    };

    if !state
        .payment_service
        .verify_webhook_signature(&body, signature)
    {
        tracing::warn!("Webhook rejected: invalid signature");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Invalid signature" })),
        )
            .into_response();
    }

    let Some(event) = PaystackClient::parse_webhook_event(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "Malformed event payload" })),
        )
            .into_response();
    };

    match state.payment_service.handle_webhook_event(event).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "received": true }))).into_response(),
        Err(e) => {
            // Acknowledge anyway; the failure is logged and the event can
            // be replayed from the gateway dashboard if needed.
            tracing::error!(error = %e, "Webhook processing failed");
            (
                StatusCode::OK,
                Json(json!({ "received": true, "error": "processing failed" })),
            )
                .into_response()
        }
    }
}
