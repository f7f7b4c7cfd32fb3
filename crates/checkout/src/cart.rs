//! Cart operations ahead of checkout.

use std::sync::Arc;

use common::{ProductId, UserId};
use domain::{CartItem, CartLine, CartSnapshot, Money};
use serde::Serialize;
use store::{Store, StoreTx, finish, with_timeout};

use crate::error::{CheckoutError, Result};
use crate::settings::CheckoutSettings;

/// A cart priced at the catalog's current prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub subtotal: Money,
}

impl CartView {
    fn from_snapshot(snapshot: CartSnapshot) -> Self {
        let subtotal = snapshot.subtotal();
        Self {
            lines: snapshot.lines,
            subtotal,
        }
    }
}

/// Adds, removes, and prices cart lines.
pub struct CartService {
    store: Arc<dyn Store>,
    settings: CheckoutSettings,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>, settings: CheckoutSettings) -> Self {
        Self { store, settings }
    }

    /// Adds `quantity` of a product, creating the cart on first use.
    ///
    /// Stock is checked softly here; the binding check happens at checkout.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView> {
        if quantity == 0 {
            return Err(CheckoutError::InvalidQuantity { quantity });
        }

        with_timeout(self.settings.store_timeout, "add cart item", async {
            let mut tx = self.store.begin().await?;
            let result = Self::add_in_tx(&mut *tx, user_id, product_id, quantity).await;
            finish(tx, result).await
        })
        .await
    }

    async fn add_in_tx(
        tx: &mut dyn StoreTx,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView> {
        let product = tx
            .products(&[product_id])
            .await?
            .into_iter()
            .next()
            .ok_or(CheckoutError::ProductNotFound { product_id })?;

        let items = tx.cart_items(user_id).await?;
        let existing = items
            .iter()
            .find(|item| item.product_id == product_id)
            .map_or(0, |item| item.quantity);
        let wanted = existing.saturating_add(quantity);

        if wanted > product.stock {
            return Err(CheckoutError::InsufficientStock {
                product_id,
                product_name: product.name,
                requested: wanted,
                available: product.stock,
            });
        }

        tx.put_cart_item(
            user_id,
            CartItem {
                product_id,
                quantity: wanted,
            },
        )
        .await?;

        Self::view_in_tx(tx, user_id).await
    }

    /// Removes a product line from the cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, user_id: UserId, product_id: ProductId) -> Result<CartView> {
        with_timeout(self.settings.store_timeout, "remove cart item", async {
            let mut tx = self.store.begin().await?;
            let result: Result<CartView> = async {
                if !tx.remove_cart_item(user_id, product_id).await? {
                    return Err(CheckoutError::ProductNotFound { product_id });
                }
                Self::view_in_tx(&mut *tx, user_id).await
            }
            .await;
            finish(tx, result).await
        })
        .await
    }

    /// Returns the cart priced at current catalog prices.
    pub async fn view(&self, user_id: UserId) -> Result<CartView> {
        with_timeout(self.settings.store_timeout, "view cart", async {
            let mut tx = self.store.begin().await?;
            let result = Self::view_in_tx(&mut *tx, user_id).await;
            finish(tx, result).await
        })
        .await
    }

    async fn view_in_tx(tx: &mut dyn StoreTx, user_id: UserId) -> Result<CartView> {
        let items = tx.cart_items(user_id).await?;
        let ids: Vec<_> = items.iter().map(|item| item.product_id).collect();
        let products = tx.products(&ids).await?;
        let snapshot = CartSnapshot::price(&items, &products)?;
        Ok(CartView::from_snapshot(snapshot))
    }
}
