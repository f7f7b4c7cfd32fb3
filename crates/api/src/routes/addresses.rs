//! Shipping address endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use checkout::NewAddress;
use domain::Address;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::CurrentUser;

/// POST /addresses — save a shipping address for the caller.
#[tracing::instrument(skip(state, body))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<NewAddress>,
) -> Result<(StatusCode, Json<Address>), ApiError> {
    let address = state.addresses.save_address(user_id, body).await?;
    Ok((StatusCode::CREATED, Json(address)))
}
