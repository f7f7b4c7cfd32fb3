use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AddressId, CouponId, OrderId, ProductId, UserId};
use domain::{Address, CartItem, Coupon, Order, OrderStatus, Product, StatusHistoryEntry};

use crate::{Result, StoreError};

/// Entry point to the persistence boundary.
///
/// Every read and write goes through a [`StoreTx`], so a caller that
/// touches stock, orders, history, coupon counters and the cart in one
/// unit of work sees all of it commit or none of it.
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a new unit of work.
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;

    /// Checks that the backing storage is reachable.
    async fn health_check(&self) -> Result<()>;
}

/// An open unit of work.
///
/// Dropping a transaction without calling [`StoreTx::commit`] discards its
/// writes. Methods named `*_for_update` hold the returned rows until the
/// transaction ends, so concurrent units of work touching the same rows are
/// serialized.
#[async_trait]
pub trait StoreTx: Send {
    // Carts

    /// Returns the user's cart lines in insertion order.
    async fn cart_items(&mut self, user_id: UserId) -> Result<Vec<CartItem>>;

    /// Sets a cart line's quantity, creating the cart and the line if needed.
    async fn put_cart_item(&mut self, user_id: UserId, item: CartItem) -> Result<()>;

    /// Removes a cart line. Returns whether it existed.
    async fn remove_cart_item(&mut self, user_id: UserId, product_id: ProductId) -> Result<bool>;

    /// Empties the cart but keeps the cart itself.
    async fn clear_cart(&mut self, user_id: UserId) -> Result<()>;

    // Catalog

    async fn insert_product(&mut self, product: &Product) -> Result<()>;

    async fn products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Locks and returns the requested products, in id order.
    async fn products_for_update(&mut self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Takes `quantity` units if at least that many remain.
    ///
    /// Returns false, and changes nothing, when stock is short.
    async fn decrement_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool>;

    // Addresses

    async fn insert_address(&mut self, address: &Address) -> Result<()>;

    /// Returns the address only if it belongs to `user_id`.
    async fn address(&mut self, user_id: UserId, address_id: AddressId) -> Result<Option<Address>>;

    // Coupons

    /// Fails with [`StoreError::Duplicate`] when the code is taken.
    async fn insert_coupon(&mut self, coupon: &Coupon) -> Result<()>;

    /// Looks up a coupon by its normalized code and locks it.
    async fn coupon_by_code_for_update(&mut self, code: &str) -> Result<Option<Coupon>>;

    async fn user_redemptions(&mut self, coupon_id: CouponId, user_id: UserId) -> Result<u32>;

    /// Counts one redemption against the coupon's global and per-user usage.
    ///
    /// Returns false, and changes nothing, when the global limit is reached.
    async fn record_redemption(
        &mut self,
        coupon_id: CouponId,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<bool>;

    // Orders

    /// Persists a freshly placed order with its items and history.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    async fn order(&mut self, order_id: OrderId) -> Result<Option<Order>>;

    /// Loads and locks an order.
    async fn order_for_update(&mut self, order_id: OrderId) -> Result<Option<Order>>;

    async fn update_order_status(
        &mut self,
        order_id: OrderId,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn append_history(&mut self, entry: &StatusHistoryEntry) -> Result<()>;

    // Lifecycle

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Runs `fut`, failing with [`StoreError::Timeout`] once `limit` elapses.
///
/// Dropping the timed-out future drops any transaction it holds, which
/// rolls the transaction back.
pub async fn with_timeout<T, E, F>(
    limit: Duration,
    operation: &'static str,
    fut: F,
) -> std::result::Result<T, E>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: From<StoreError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, timeout_ms = limit.as_millis() as u64, "store timeout");
            metrics::counter!("store_timeouts_total", "operation" => operation).increment(1);
            Err(StoreError::Timeout { operation }.into())
        }
    }
}

/// Commits `tx` if `result` is `Ok`, otherwise rolls it back.
///
/// A failed rollback is logged; the original error is returned either way.
pub async fn finish<T, E>(
    tx: Box<dyn StoreTx>,
    result: std::result::Result<T, E>,
) -> std::result::Result<T, E>
where
    E: From<StoreError>,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
