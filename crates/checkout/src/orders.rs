//! Read-side order queries for the owning user.

use std::sync::Arc;

use common::{OrderId, UserId};
use domain::{Order, StatusHistoryEntry};
use store::{Store, finish, with_timeout};

use crate::error::{CheckoutError, Result};
use crate::settings::CheckoutSettings;

/// Looks up orders on behalf of their owner.
///
/// Orders owned by someone else are reported as not found.
pub struct OrderService {
    store: Arc<dyn Store>,
    settings: CheckoutSettings,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, settings: CheckoutSettings) -> Self {
        Self { store, settings }
    }

    pub async fn get_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        let order = with_timeout(self.settings.store_timeout, "get order", async {
            let mut tx = self.store.begin().await?;
            let result = tx.order(order_id).await.map_err(CheckoutError::from);
            finish(tx, result).await
        })
        .await?;

        order
            .filter(|order| order.user_id() == user_id)
            .ok_or(CheckoutError::OrderNotFound { order_id })
    }

    /// Returns the order's status history, oldest first.
    pub async fn order_history(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Vec<StatusHistoryEntry>> {
        let order = self.get_order(user_id, order_id).await?;
        Ok(order.history().to_vec())
    }
}
