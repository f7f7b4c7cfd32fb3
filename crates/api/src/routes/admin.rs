//! Back-office endpoints. Guarded by [`AdminAccess`].

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use checkout::CheckoutError;
use common::OrderId;
use domain::{Coupon, CouponKind, CouponType, Money, NewCoupon, Product};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::extract::AdminAccess;
use crate::routes::orders::OrderResponse;

// -- Request types --

#[derive(Deserialize)]
pub struct UpdateStatusBody {
    pub status: String,
    pub note: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateCouponBody {
    pub code: String,
    #[serde(rename = "type")]
    pub coupon_type: String,
    /// Percent for percentage coupons, amount in whole units for fixed ones.
    pub value: Decimal,
    pub max_discount: Option<Decimal>,
    pub expires_at: DateTime<Utc>,
    pub usage_limit: u32,
    #[serde(default = "default_per_user_limit")]
    pub per_user_limit: u32,
}

fn default_per_user_limit() -> u32 {
    1
}

#[derive(Deserialize)]
pub struct CreateProductBody {
    pub name: String,
    pub price_cents: i64,
    pub stock: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct CouponResponse {
    pub id: String,
    pub code: String,
    #[serde(rename = "type")]
    pub coupon_type: CouponType,
    pub value: Decimal,
    pub max_discount_cents: Option<i64>,
    pub expires_at: DateTime<Utc>,
    pub usage_limit: u32,
    pub per_user_limit: u32,
    pub used_count: u32,
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub stock: u32,
}

impl From<&Coupon> for CouponResponse {
    fn from(coupon: &Coupon) -> Self {
        Self {
            id: coupon.id.to_string(),
            code: coupon.code.clone(),
            coupon_type: coupon.kind.coupon_type(),
            value: coupon.kind.value(),
            max_discount_cents: coupon.kind.max_discount().map(|cap| cap.cents()),
            expires_at: coupon.expires_at,
            usage_limit: coupon.usage_limit,
            per_user_limit: coupon.per_user_limit,
            used_count: coupon.used_count,
        }
    }
}

impl From<&Product> for ProductResponse {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            price_cents: product.price.cents(),
            stock: product.stock,
        }
    }
}

// -- Handlers --

/// PUT /admin/orders/{id}/status — move an order along the fulfillment path.
#[tracing::instrument(skip(state, body))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminAccess,
    Path(order_id): Path<OrderId>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .admin
        .update_order_status(order_id, &body.status, body.note)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /admin/coupons — define a coupon.
#[tracing::instrument(skip(state, body))]
pub async fn create_coupon(
    State(state): State<Arc<AppState>>,
    _admin: AdminAccess,
    Json(body): Json<CreateCouponBody>,
) -> Result<(StatusCode, Json<CouponResponse>), ApiError> {
    let coupon_type: CouponType = body.coupon_type.parse().map_err(CheckoutError::from)?;
    let max_discount = match body.max_discount {
        Some(cap) => Some(Money::from_decimal(cap).ok_or_else(|| {
            ApiError::BadRequest(format!("max_discount {cap} is not a valid amount"))
        })?),
        None => None,
    };
    let kind =
        CouponKind::from_parts(coupon_type, body.value, max_discount).map_err(CheckoutError::from)?;

    let coupon = state
        .admin
        .create_coupon(NewCoupon {
            code: body.code,
            kind,
            expires_at: body.expires_at,
            usage_limit: body.usage_limit,
            per_user_limit: body.per_user_limit,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CouponResponse::from(&coupon))))
}

/// POST /admin/products — add a product with its opening stock.
#[tracing::instrument(skip(state, body))]
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminAccess,
    Json(body): Json<CreateProductBody>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let product = state
        .admin
        .create_product(body.name, Money::from_cents(body.price_cents), body.stock)
        .await?;
    Ok((StatusCode::CREATED, Json(ProductResponse::from(&product))))
}
