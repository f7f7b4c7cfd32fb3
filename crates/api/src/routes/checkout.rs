//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use checkout::CheckoutRequest;
use common::AddressId;
use domain::PaymentMethod;
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::routes::orders::ReceiptResponse;

#[derive(Deserialize)]
pub struct CheckoutBody {
    pub shipping_address_id: AddressId,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
}

/// POST /checkout — turn the caller's cart into a `Pending` order.
#[tracing::instrument(skip(state, body))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<ReceiptResponse>), ApiError> {
    let receipt = state
        .checkout
        .checkout(CheckoutRequest {
            user_id,
            shipping_address_id: body.shipping_address_id,
            payment_method: body.payment_method,
            coupon_code: body.coupon_code.filter(|code| !code.trim().is_empty()),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ReceiptResponse::from(receipt))))
}
