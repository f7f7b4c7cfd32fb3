//! Request extractors for caller identity.
//!
//! Authentication happens upstream; these only read what the edge forwards.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;
use constant_time_eq::constant_time_eq;

use crate::AppState;
use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// The authenticated shopper, from the `x-user-id` header.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
            .map(CurrentUser)
            .ok_or(ApiError::Unauthorized)
    }
}

/// Proof that the caller presented the admin token.
///
/// Without a configured token (local mode only) every caller is admitted.
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

impl FromRequestParts<Arc<AppState>> for AdminAccess {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token.as_deref() else {
            return Ok(AdminAccess);
        };
        let presented = parts
            .headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());

        match presented {
            Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
                Ok(AdminAccess)
            }
            _ => {
                tracing::warn!("admin request without a valid token");
                Err(ApiError::Unauthorized)
            }
        }
    }
}
