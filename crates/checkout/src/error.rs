//! Checkout error types.

use common::{AddressId, OrderId, ProductId};
use domain::{CouponError, OrderError, OrderStatus, ProductError, StockError};
use store::StoreError;
use thiserror::Error;

/// Broad category of a failure, used to pick a transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request cannot succeed as sent.
    Validation,
    /// A referenced resource does not exist (or is not visible to the caller).
    NotFound,
    /// The request conflicts with current state.
    Conflict,
    /// A downstream provider failed. Retryable.
    Upstream,
    /// A bounded operation ran out of time.
    Unavailable,
    /// Anything else.
    Internal,
}

/// Errors that can occur during checkout and order operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The user's cart has no items.
    #[error("Cart is empty")]
    CartIsEmpty,

    /// The shipping address does not exist or belongs to another user.
    #[error("Address {address_id} not found")]
    AddressNotFound { address_id: AddressId },

    /// A product referenced by the cart or request no longer exists.
    #[error("Product {product_id} not found")]
    ProductNotFound { product_id: ProductId },

    /// Not enough stock to cover the requested quantity.
    #[error("Insufficient stock for {product_name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: u32,
        available: u32,
    },

    /// Cart quantities must be at least one.
    #[error("Invalid quantity {quantity}: must be at least 1")]
    InvalidQuantity { quantity: u32 },

    /// The order does not exist or belongs to another user.
    #[error("Order {order_id} not found")]
    OrderNotFound { order_id: OrderId },

    /// Payment can only be requested while the order awaits it.
    #[error("Order {order_id} is {status} and cannot be paid")]
    OrderNotPayable { order_id: OrderId, status: OrderStatus },

    /// The order was created but the gateway did not hand back a payment intent.
    #[error("Payment intent for order {order_id} failed: {reason}")]
    PaymentIntentFailed { order_id: OrderId, reason: String },

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<StockError> for CheckoutError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::ProductNotFound { product_id } => {
                CheckoutError::ProductNotFound { product_id }
            }
            StockError::InsufficientStock {
                product_id,
                product_name,
                requested,
                available,
            } => CheckoutError::InsufficientStock {
                product_id,
                product_name,
                requested,
                available,
            },
        }
    }
}

impl CheckoutError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            CheckoutError::CartIsEmpty => "CART_IS_EMPTY",
            CheckoutError::AddressNotFound { .. } => "ADDRESS_NOT_FOUND",
            CheckoutError::ProductNotFound { .. } => "PRODUCT_NOT_FOUND",
            CheckoutError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CheckoutError::InvalidQuantity { .. } => "INVALID_QUANTITY",
            CheckoutError::OrderNotFound { .. } => "ORDER_NOT_FOUND",
            CheckoutError::OrderNotPayable { .. } => "ORDER_NOT_PAYABLE",
            CheckoutError::PaymentIntentFailed { .. } => "PAYMENT_INTENT_FAILED",
            CheckoutError::Coupon(err) => err.code(),
            CheckoutError::Order(err) => match err {
                OrderError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
                OrderError::UnknownStatus(_) => "INVALID_STATUS",
                OrderError::InvalidQuantity { .. } => "INVALID_QUANTITY",
                OrderError::InvalidPrice { .. }
                | OrderError::InvalidDiscount { .. }
                | OrderError::NoItems => "INVALID_ORDER",
            },
            CheckoutError::Product(ProductError::InvalidPrice { .. }) => "INVALID_PRICE",
            CheckoutError::Product(ProductError::InvalidStock { .. }) => "INVALID_STOCK",
            CheckoutError::Store(StoreError::Timeout { .. }) => "TIMEOUT",
            CheckoutError::Store(_) => "STORE_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::CartIsEmpty | CheckoutError::InvalidQuantity { .. } => {
                ErrorKind::Validation
            }
            CheckoutError::AddressNotFound { .. }
            | CheckoutError::ProductNotFound { .. }
            | CheckoutError::OrderNotFound { .. } => ErrorKind::NotFound,
            CheckoutError::InsufficientStock { .. } | CheckoutError::OrderNotPayable { .. } => {
                ErrorKind::Conflict
            }
            CheckoutError::PaymentIntentFailed { .. } => ErrorKind::Upstream,
            CheckoutError::Coupon(err) => match err {
                CouponError::CouponNotFound { .. } => ErrorKind::NotFound,
                CouponError::CouponCodeTaken { .. } => ErrorKind::Conflict,
                _ => ErrorKind::Validation,
            },
            CheckoutError::Order(err) => match err {
                OrderError::InvalidStatusTransition { .. } => ErrorKind::Conflict,
                OrderError::UnknownStatus(_) | OrderError::InvalidQuantity { .. } => {
                    ErrorKind::Validation
                }
                _ => ErrorKind::Internal,
            },
            CheckoutError::Product(_) => ErrorKind::Validation,
            CheckoutError::Store(StoreError::Timeout { .. }) => ErrorKind::Unavailable,
            CheckoutError::Store(_) => ErrorKind::Internal,
        }
    }

    /// Whether the client may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Upstream | ErrorKind::Unavailable)
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
