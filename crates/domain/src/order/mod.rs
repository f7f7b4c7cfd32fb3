//! Order aggregate and related types.

mod aggregate;
mod history;
mod state;
mod value_objects;

pub use aggregate::{NewOrder, Order, OrderHeader};
pub use history::{PaymentOutcome, StatusHistoryEntry};
pub use state::OrderStatus;
pub use value_objects::{OrderItem, PaymentMethod, ShippingAddress};

use common::ProductId;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order is not in a status that allows the requested transition.
    #[error("Invalid status transition: cannot move from {current} to {requested}")]
    InvalidStatusTransition {
        current: OrderStatus,
        requested: OrderStatus,
    },

    /// The status string is not one the system recognizes.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    /// Invalid quantity.
    #[error("Invalid quantity for {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity {
        product_id: ProductId,
        quantity: u32,
    },

    /// Invalid price.
    #[error("Invalid price for {product_id}: {price} cents (must be greater than 0)")]
    InvalidPrice { product_id: ProductId, price: i64 },

    /// The discount is negative or larger than the subtotal.
    #[error("Invalid discount {discount} for subtotal {subtotal}")]
    InvalidDiscount {
        discount: crate::Money,
        subtotal: crate::Money,
    },

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,
}
