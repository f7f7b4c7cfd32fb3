//! Order status history.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};

use super::OrderStatus;

/// One row of an order's append-only status history.
///
/// Entries are facts: once recorded they are never edited or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    /// The order this entry belongs to.
    pub order_id: OrderId,

    /// The status the order moved into.
    pub status: OrderStatus,

    /// Free-form audit note (provider transaction id, admin comment, ...).
    pub note: Option<String>,

    /// When the transition happened.
    pub recorded_at: DateTime<Utc>,
}

impl StatusHistoryEntry {
    /// Creates a new history entry.
    pub fn new(
        order_id: OrderId,
        status: OrderStatus,
        note: Option<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            status,
            note,
            recorded_at,
        }
    }
}

/// Outcome reported by the payment provider for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentOutcome {
    /// The charge settled.
    Succeeded,
    /// The charge was declined or errored.
    Declined,
}

impl PaymentOutcome {
    /// Returns the order status this outcome drives the order into.
    pub fn target_status(&self) -> OrderStatus {
        match self {
            PaymentOutcome::Succeeded => OrderStatus::Completed,
            PaymentOutcome::Declined => OrderStatus::Failed,
        }
    }
}
