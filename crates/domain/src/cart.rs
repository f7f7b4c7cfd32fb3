//! Shopping cart and its priced snapshot.

use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::catalog::{Product, StockError, StockRequest};
use crate::money::Money;
use crate::order::OrderItem;

/// A product reference and quantity held in a user's cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A user's cart. Created lazily on first add, emptied on checkout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cart {
    pub user_id: UserId,
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Returns an empty cart for `user_id`.
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            items: Vec::new(),
        }
    }

    /// Adds `quantity` of a product, merging with an existing line.
    ///
    /// Returns the line's new quantity.
    pub fn add(&mut self, product_id: ProductId, quantity: u32) -> u32 {
        if let Some(line) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            line.quantity += quantity;
            return line.quantity;
        }
        self.items.push(CartItem {
            product_id,
            quantity,
        });
        quantity
    }

    /// Removes a product line. Returns true if it was present.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        self.items.len() != before
    }

    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.items
            .iter()
            .find(|i| i.product_id == product_id)
            .map_or(0, |i| i.quantity)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A cart line priced against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Cart items resolved into priced lines at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    /// Prices every item with the catalog's current price.
    ///
    /// Fails with `ProductNotFound` for the first item whose product is gone.
    pub fn price(items: &[CartItem], products: &[Product]) -> Result<Self, StockError> {
        let lines = items
            .iter()
            .map(|item| {
                let product = products
                    .iter()
                    .find(|p| p.id == item.product_id)
                    .ok_or(StockError::ProductNotFound {
                        product_id: item.product_id,
                    })?;
                Ok(CartLine {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    unit_price: product.price,
                    quantity: item.quantity,
                })
            })
            .collect::<Result<Vec<_>, StockError>>()?;

        Ok(Self { lines })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn stock_requests(&self) -> Vec<StockRequest> {
        self.lines
            .iter()
            .map(|line| StockRequest {
                product_id: line.product_id,
                quantity: line.quantity,
            })
            .collect()
    }

    /// Converts the priced lines into order items with snapshotted prices.
    pub fn order_items(&self) -> Vec<OrderItem> {
        self.lines
            .iter()
            .map(|line| {
                OrderItem::new(
                    line.product_id,
                    line.product_name.clone(),
                    line.quantity,
                    line.unit_price,
                )
            })
            .collect()
    }
}
