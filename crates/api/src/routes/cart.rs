//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::CartView;
use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::extract::CurrentUser;

#[derive(Deserialize)]
pub struct AddItemBody {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub lines: Vec<CartLineResponse>,
    pub subtotal_cents: i64,
}

#[derive(Serialize)]
pub struct CartLineResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl From<CartView> for CartResponse {
    fn from(view: CartView) -> Self {
        Self {
            subtotal_cents: view.subtotal.cents(),
            lines: view
                .lines
                .into_iter()
                .map(|line| CartLineResponse {
                    product_id: line.product_id.to_string(),
                    line_total_cents: line.line_total().cents(),
                    product_name: line.product_name,
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price.cents(),
                })
                .collect(),
        }
    }
}

/// GET /cart — the caller's cart at current prices.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<CartResponse>, ApiError> {
    let view = state.carts.view(user_id).await?;
    Ok(Json(CartResponse::from(view)))
}

/// POST /cart/items — add a product, merging with an existing line.
#[tracing::instrument(skip(state, body))]
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<AddItemBody>,
) -> Result<Json<CartResponse>, ApiError> {
    let view = state
        .carts
        .add_item(user_id, body.product_id, body.quantity)
        .await?;
    Ok(Json(CartResponse::from(view)))
}

/// DELETE /cart/items/{product_id} — drop a line from the cart.
#[tracing::instrument(skip(state))]
pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartResponse>, ApiError> {
    let view = state.carts.remove_item(user_id, product_id).await?;
    Ok(Json(CartResponse::from(view)))
}
