//! Authentication middleware
//!
//! Extractors that verify the bearer token and expose the authenticated
//! user to handlers. Token issuance is out of scope for this service.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{verify_token, TokenError};
use crate::config::Config;
use crate::models::UserRole;

/// Authenticated user extracted from the JWT access token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: UserRole,
}

/// Error response for authentication failures
#[derive(Debug, Serialize)]
struct AuthErrorBody {
    success: bool,
    message: String,
}

fn auth_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(AuthErrorBody {
            success: false,
            message: message.to_string(),
        }),
    )
        .into_response()
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<Config>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    auth_error(
                        StatusCode::UNAUTHORIZED,
                        "Authorization header with Bearer token required",
                    )
                })?;

        let config = Arc::<Config>::from_ref(state);

        let claims = verify_token(bearer.token(), &config.jwt_secret).map_err(|e| match e {
            TokenError::Expired => auth_error(StatusCode::UNAUTHORIZED, "Token has expired"),
            TokenError::Invalid(_) => auth_error(StatusCode::UNAUTHORIZED, "Invalid token"),
        })?;

        if claims.token_type != "access" {
            return Err(auth_error(StatusCode::UNAUTHORIZED, "Expected access token"));
        }

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| auth_error(StatusCode::UNAUTHORIZED, "Invalid user ID in token"))?;

        let role = match claims.role.as_str() {
            "student" => UserRole::Student,
            "admin" => UserRole::Admin,
            "super_admin" => UserRole::SuperAdmin,
            _ => return Err(auth_error(StatusCode::UNAUTHORIZED, "Invalid role in token")),
        };

        Ok(AuthenticatedUser { user_id, role })
    }
}

/// Extractor that additionally requires an admin-level role
pub struct AdminUser(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    Arc<Config>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;

        if !user.role.is_admin() {
            return Err(auth_error(StatusCode::FORBIDDEN, "Admin access required"));
        }

        Ok(AdminUser(user))
    }
}
