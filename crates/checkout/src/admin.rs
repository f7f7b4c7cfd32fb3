//! Back-office operations: fulfillment status, coupons, and catalog stock.

use std::sync::Arc;

use chrono::Utc;
use common::OrderId;
use domain::{Coupon, CouponError, Money, NewCoupon, Order, OrderStatus, Product};
use store::{Store, StoreError, finish, with_timeout};

use crate::error::{CheckoutError, Result};
use crate::settings::CheckoutSettings;

/// Administrative order, coupon, and product management.
pub struct AdminService {
    store: Arc<dyn Store>,
    settings: CheckoutSettings,
}

impl AdminService {
    pub fn new(store: Arc<dyn Store>, settings: CheckoutSettings) -> Self {
        Self { store, settings }
    }

    /// Moves an order to the status named by `status`.
    ///
    /// Unrecognized names and transitions the state machine forbids are
    /// rejected. Payment outcomes are never reachable from here.
    #[tracing::instrument(skip(self, note))]
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        status: &str,
        note: Option<String>,
    ) -> Result<Order> {
        let next: OrderStatus = status.parse()?;

        let order = with_timeout(self.settings.store_timeout, "update order status", async {
            let mut tx = self.store.begin().await?;
            let result: Result<Order> = async {
                let mut order = tx
                    .order_for_update(order_id)
                    .await?
                    .ok_or(CheckoutError::OrderNotFound { order_id })?;
                let entry = order.change_status(next, note, Utc::now())?;
                tx.update_order_status(order_id, entry.status, entry.recorded_at)
                    .await?;
                tx.append_history(&entry).await?;
                order.apply(entry);
                Ok(order)
            }
            .await;
            finish(tx, result).await
        })
        .await?;

        metrics::counter!("order_status_changes_total", "status" => next.as_str()).increment(1);
        tracing::info!(%order_id, status = %next, "order status updated");
        Ok(order)
    }

    /// Defines a new coupon. Codes are unique ignoring case.
    #[tracing::instrument(skip(self, new), fields(code = %new.code))]
    pub async fn create_coupon(&self, new: NewCoupon) -> Result<Coupon> {
        let coupon = Coupon::create(new)?;

        with_timeout(self.settings.store_timeout, "create coupon", async {
            let mut tx = self.store.begin().await?;
            let result = tx.insert_coupon(&coupon).await.map_err(|err| match err {
                StoreError::Duplicate { .. } => CheckoutError::from(CouponError::CouponCodeTaken {
                    code: coupon.code.clone(),
                }),
                other => CheckoutError::from(other),
            });
            finish(tx, result).await
        })
        .await?;

        tracing::info!(coupon_id = %coupon.id, "coupon created");
        Ok(coupon)
    }

    /// Adds a product with its opening stock, within the catalog limits.
    pub async fn create_product(&self, name: String, price: Money, stock: u32) -> Result<Product> {
        let product = Product::new(name, price, stock)?;

        with_timeout(self.settings.store_timeout, "create product", async {
            let mut tx = self.store.begin().await?;
            let result = tx
                .insert_product(&product)
                .await
                .map_err(CheckoutError::from);
            finish(tx, result).await
        })
        .await?;

        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }
}
