//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CheckoutError, ErrorKind, WebhookError};
use domain::{CouponError, OrderError, ProductError};
use serde_json::{Map, Value, json};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Checkout, cart, order, or admin failure.
    Checkout(CheckoutError),
    /// Webhook failure; authentication failures carry no detail.
    Webhook(WebhookError),
    /// Malformed request the services never saw.
    BadRequest(String),
    /// Missing or invalid caller identity. No body.
    Unauthorized,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Checkout(err) => checkout_error_to_response(&err),
            ApiError::Webhook(WebhookError::Unauthorized) | ApiError::Unauthorized => {
                StatusCode::UNAUTHORIZED.into_response()
            }
            ApiError::Webhook(err) => {
                let status = match &err {
                    WebhookError::Store(store) if store.is_timeout() => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                tracing::error!(error = %err, "webhook processing failed");
                error_body(status, err.code(), &err.to_string(), Map::new())
            }
            ApiError::BadRequest(message) => {
                error_body(StatusCode::BAD_REQUEST, "BAD_REQUEST", &message, Map::new())
            }
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn checkout_error_to_response(err: &CheckoutError) -> Response {
    let status = status_for(err.kind());
    if status.is_server_error() {
        tracing::error!(code = err.code(), error = %err, "request failed");
    }

    let mut context = error_context(err);
    if err.is_retryable() {
        context.insert("retryable".into(), Value::Bool(true));
    }
    error_body(status, err.code(), &err.to_string(), context)
}

/// Identifying fields that let a client act on the error.
fn error_context(err: &CheckoutError) -> Map<String, Value> {
    let context = match err {
        CheckoutError::AddressNotFound { address_id } => json!({ "address_id": address_id }),
        CheckoutError::ProductNotFound { product_id } => json!({ "product_id": product_id }),
        CheckoutError::InsufficientStock {
            product_id,
            product_name,
            requested,
            available,
        } => json!({
            "product_id": product_id,
            "product_name": product_name,
            "requested": requested,
            "available": available,
        }),
        CheckoutError::InvalidQuantity { quantity } => json!({ "quantity": quantity }),
        CheckoutError::OrderNotFound { order_id } => json!({ "order_id": order_id }),
        CheckoutError::OrderNotPayable { order_id, status } => json!({
            "order_id": order_id,
            "status": status.as_str(),
        }),
        CheckoutError::PaymentIntentFailed { order_id, .. } => json!({ "order_id": order_id }),
        CheckoutError::Coupon(
            CouponError::CouponNotFound { code }
            | CouponError::CouponExpired { code }
            | CouponError::CouponUsageLimitExceeded { code }
            | CouponError::UserLimitExceeded { code }
            | CouponError::CouponCodeTaken { code },
        ) => json!({ "coupon_code": code }),
        CheckoutError::Order(OrderError::InvalidStatusTransition { current, requested }) => {
            json!({
                "current_status": current.as_str(),
                "requested_status": requested.as_str(),
            })
        }
        CheckoutError::Order(OrderError::UnknownStatus(status)) => json!({ "status": status }),
        CheckoutError::Product(ProductError::InvalidPrice { price, max }) => json!({
            "price_cents": price.cents(),
            "max_price_cents": max.cents(),
        }),
        CheckoutError::Product(ProductError::InvalidStock { stock, max }) => json!({
            "stock": stock,
            "max_stock": max,
        }),
        _ => json!({}),
    };

    match context {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn error_body(
    status: StatusCode,
    code: &str,
    message: &str,
    context: Map<String, Value>,
) -> Response {
    let mut body = Map::new();
    body.insert("code".into(), Value::from(code));
    body.insert("message".into(), Value::from(message));
    body.extend(context);
    (status, axum::Json(Value::Object(body))).into_response()
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        ApiError::Webhook(err)
    }
}
