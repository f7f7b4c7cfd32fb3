//! Order status state machine.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
///            payment webhook                 admin fulfillment
/// Pending ──┬──► Completed ──► Processing ──► Shipped ──► Delivered
///           └──► Failed
///
/// Pending | Completed | Processing | Shipped ──► Cancelled   (admin)
/// ```
///
/// `Completed` and `Failed` are only ever produced by a payment outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order placed, stock reserved, awaiting payment.
    #[default]
    Pending,

    /// Payment confirmed by the provider.
    Completed,

    /// Payment rejected by the provider (dead end).
    Failed,

    /// Order is being prepared for shipment.
    Processing,

    /// Order has left the warehouse.
    Shipped,

    /// Order reached the customer (end of the fulfillment path).
    Delivered,

    /// Order was cancelled (dead end).
    Cancelled,
}

impl OrderStatus {
    /// All recognized statuses.
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Completed,
        OrderStatus::Failed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Returns true if a payment outcome may still be applied.
    pub fn awaits_payment(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if this status can only be reached through a payment outcome.
    pub fn is_payment_outcome(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Failed)
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending
                | OrderStatus::Completed
                | OrderStatus::Processing
                | OrderStatus::Shipped
        )
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Failed | OrderStatus::Cancelled | OrderStatus::Delivered
        )
    }

    /// Returns true if an admin may move an order from this status to `next`.
    pub fn can_advance_to(&self, next: OrderStatus) -> bool {
        match next {
            OrderStatus::Processing => matches!(self, OrderStatus::Completed),
            OrderStatus::Shipped => matches!(self, OrderStatus::Processing),
            OrderStatus::Delivered => matches!(self, OrderStatus::Shipped),
            OrderStatus::Cancelled => self.can_cancel(),
            OrderStatus::Pending | OrderStatus::Completed | OrderStatus::Failed => false,
        }
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Completed => "Completed",
            OrderStatus::Failed => "Failed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}
