use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AddressId, CouponId, OrderId, ProductId, UserId};
use domain::{
    Address, CartItem, Coupon, Order, OrderHeader, OrderItem, OrderStatus, Product,
    StatusHistoryEntry,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, StoreError,
    store::{Store, StoreTx},
};

#[derive(Debug, Clone)]
struct StoredOrder {
    header: OrderHeader,
    items: Vec<OrderItem>,
    history: Vec<StatusHistoryEntry>,
}

impl StoredOrder {
    fn to_order(&self) -> Order {
        Order::rehydrate(
            self.header.clone(),
            self.items.clone(),
            self.history.clone(),
        )
    }
}

#[derive(Debug, Clone)]
struct Redemption {
    coupon_id: CouponId,
    user_id: UserId,
}

#[derive(Debug, Clone, Default)]
struct State {
    products: BTreeMap<ProductId, Product>,
    carts: HashMap<UserId, Vec<CartItem>>,
    addresses: HashMap<AddressId, Address>,
    coupons: HashMap<CouponId, Coupon>,
    redemptions: Vec<Redemption>,
    orders: HashMap<OrderId, StoredOrder>,
}

/// In-memory store implementation for testing and local runs.
///
/// A transaction holds the store-wide lock for its whole lifetime and works
/// on a private copy of the state, which replaces the shared state on
/// commit. Units of work are therefore fully serialized.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Clears all data.
    pub async fn clear(&self) {
        *self.state.lock().await = State::default();
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTx { guard, staged }))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// A unit of work against [`InMemoryStore`].
pub struct InMemoryTx {
    guard: OwnedMutexGuard<State>,
    staged: State,
}

impl InMemoryTx {
    fn stored_order_mut(&mut self, order_id: OrderId) -> Result<&mut StoredOrder> {
        self.staged
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::corrupt("order", format!("order {order_id} does not exist")))
    }
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn cart_items(&mut self, user_id: UserId) -> Result<Vec<CartItem>> {
        Ok(self
            .staged
            .carts
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_cart_item(&mut self, user_id: UserId, item: CartItem) -> Result<()> {
        let items = self.staged.carts.entry(user_id).or_default();
        match items.iter_mut().find(|i| i.product_id == item.product_id) {
            Some(existing) => existing.quantity = item.quantity,
            None => items.push(item),
        }
        Ok(())
    }

    async fn remove_cart_item(&mut self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let Some(items) = self.staged.carts.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = items.len();
        items.retain(|i| i.product_id != product_id);
        Ok(items.len() != before)
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<()> {
        if let Some(items) = self.staged.carts.get_mut(&user_id) {
            items.clear();
        }
        Ok(())
    }

    async fn insert_product(&mut self, product: &Product) -> Result<()> {
        if self.staged.products.contains_key(&product.id) {
            return Err(StoreError::Duplicate {
                entity: "product",
                key: product.id.to_string(),
            });
        }
        self.staged.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.staged.products.get(id).cloned())
            .collect())
    }

    async fn products_for_update(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let mut products = self.products(ids).await?;
        products.sort_by_key(|p| p.id);
        products.dedup_by_key(|p| p.id);
        Ok(products)
    }

    async fn decrement_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool> {
        let Some(product) = self.staged.products.get_mut(&product_id) else {
            return Ok(false);
        };
        match product.stock.checked_sub(quantity) {
            Some(remaining) => {
                product.stock = remaining;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_address(&mut self, address: &Address) -> Result<()> {
        self.staged.addresses.insert(address.id, address.clone());
        Ok(())
    }

    async fn address(&mut self, user_id: UserId, address_id: AddressId) -> Result<Option<Address>> {
        Ok(self
            .staged
            .addresses
            .get(&address_id)
            .filter(|a| a.user_id == user_id)
            .cloned())
    }

    async fn insert_coupon(&mut self, coupon: &Coupon) -> Result<()> {
        if self.staged.coupons.values().any(|c| c.code == coupon.code) {
            return Err(StoreError::Duplicate {
                entity: "coupon",
                key: coupon.code.clone(),
            });
        }
        self.staged.coupons.insert(coupon.id, coupon.clone());
        Ok(())
    }

    async fn coupon_by_code_for_update(&mut self, code: &str) -> Result<Option<Coupon>> {
        Ok(self
            .staged
            .coupons
            .values()
            .find(|c| c.code == code)
            .cloned())
    }

    async fn user_redemptions(&mut self, coupon_id: CouponId, user_id: UserId) -> Result<u32> {
        let count = self
            .staged
            .redemptions
            .iter()
            .filter(|r| r.coupon_id == coupon_id && r.user_id == user_id)
            .count();
        u32::try_from(count).map_err(|_| StoreError::OutOfRange {
            entity: "coupon redemption count",
            value: count.to_string(),
        })
    }

    async fn record_redemption(
        &mut self,
        coupon_id: CouponId,
        user_id: UserId,
        _order_id: OrderId,
    ) -> Result<bool> {
        let Some(coupon) = self.staged.coupons.get_mut(&coupon_id) else {
            return Ok(false);
        };
        if coupon.used_count >= coupon.usage_limit {
            return Ok(false);
        }
        coupon.used_count += 1;
        self.staged.redemptions.push(Redemption { coupon_id, user_id });
        Ok(true)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if self.staged.orders.contains_key(&order.id()) {
            return Err(StoreError::Duplicate {
                entity: "order",
                key: order.id().to_string(),
            });
        }
        self.staged.orders.insert(
            order.id(),
            StoredOrder {
                header: order.header().clone(),
                items: order.items().to_vec(),
                history: order.history().to_vec(),
            },
        );
        Ok(())
    }

    async fn order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.staged.orders.get(&order_id).map(StoredOrder::to_order))
    }

    async fn order_for_update(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        self.order(order_id).await
    }

    async fn update_order_status(
        &mut self,
        order_id: OrderId,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let stored = self.stored_order_mut(order_id)?;
        stored.header.status = status;
        stored.header.updated_at = updated_at;
        Ok(())
    }

    async fn append_history(&mut self, entry: &StatusHistoryEntry) -> Result<()> {
        let stored = self.stored_order_mut(entry.order_id)?;
        stored.history.push(entry.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
