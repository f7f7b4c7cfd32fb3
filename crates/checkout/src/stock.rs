//! Stock step of checkout.

use domain::{Product, StockAdjustment, StockError, StockRequest, plan_reservation};
use store::StoreTx;

use crate::error::Result;

/// Reserves every request or none of them.
///
/// `locked` must be the products as returned by
/// [`StoreTx::products_for_update`] in this same transaction. Every request
/// is validated against them before the first decrement is written.
pub async fn reserve_stock(
    tx: &mut dyn StoreTx,
    locked: &[Product],
    requests: &[StockRequest],
) -> Result<Vec<StockAdjustment>> {
    let plan = plan_reservation(locked, requests)?;

    for adjustment in &plan {
        if !tx
            .decrement_stock(adjustment.product_id, adjustment.quantity)
            .await?
        {
            // Only reachable when `locked` was read without a row lock.
            let product = locked
                .iter()
                .find(|p| p.id == adjustment.product_id)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            return Err(StockError::InsufficientStock {
                product_id: adjustment.product_id,
                product_name: product,
                requested: adjustment.quantity,
                available: adjustment.quantity + adjustment.remaining,
            }
            .into());
        }
    }

    tracing::debug!(lines = plan.len(), "stock reserved");
    Ok(plan)
}
