//! Order query and payment retry endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use checkout::CheckoutReceipt;
use common::OrderId;
use domain::{Order, ShippingAddress, StatusHistoryEntry};
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::CurrentUser;

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub items: Vec<OrderItemResponse>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub coupon_id: Option<String>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub shipping_price_cents: i64,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Serialize)]
pub struct HistoryEntryResponse {
    pub status: String,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct PaymentResponse {
    pub client_secret: String,
    pub checkout_url: String,
}

/// An order together with its payment handoff.
#[derive(Serialize)]
pub struct ReceiptResponse {
    pub order: OrderResponse,
    pub payment: PaymentResponse,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().to_string(),
            user_id: order.user_id().to_string(),
            status: order.status().to_string(),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                    line_total_cents: item.total_price().cents(),
                })
                .collect(),
            shipping_address: order.shipping_address().clone(),
            payment_method: order.payment_method().as_str().to_string(),
            coupon_id: order.coupon_id().map(|id| id.to_string()),
            subtotal_cents: order.subtotal().cents(),
            discount_cents: order.discount().cents(),
            shipping_price_cents: order.shipping_price().cents(),
            total_cents: order.total().cents(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

impl From<&StatusHistoryEntry> for HistoryEntryResponse {
    fn from(entry: &StatusHistoryEntry) -> Self {
        Self {
            status: entry.status.to_string(),
            note: entry.note.clone(),
            recorded_at: entry.recorded_at,
        }
    }
}

impl From<CheckoutReceipt> for ReceiptResponse {
    fn from(receipt: CheckoutReceipt) -> Self {
        Self {
            order: OrderResponse::from(&receipt.order),
            payment: PaymentResponse {
                client_secret: receipt.payment.client_secret,
                checkout_url: receipt.payment.checkout_url,
            },
        }
    }
}

// -- Handlers --

/// GET /orders/{id} — load one of the caller's orders.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.get_order(user_id, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /orders/{id}/history — status history, oldest first.
#[tracing::instrument(skip(state))]
pub async fn history(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Vec<HistoryEntryResponse>>, ApiError> {
    let history = state.orders.order_history(user_id, order_id).await?;
    Ok(Json(history.iter().map(HistoryEntryResponse::from).collect()))
}

/// POST /orders/{id}/payment — request a fresh payment intent for a `Pending` order.
#[tracing::instrument(skip(state))]
pub async fn retry_payment(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<ReceiptResponse>, ApiError> {
    let receipt = state.checkout.retry_payment(user_id, order_id).await?;
    Ok(Json(ReceiptResponse::from(receipt)))
}
