//! Product stock slice and all-or-nothing reservation planning.

use std::collections::BTreeMap;

use common::ProductId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;

/// The part of a catalog product that checkout cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    /// Units available for sale. Never negative.
    pub stock: u32,
}

impl Product {
    /// Highest unit price a product may carry (100,000,000.00).
    pub const MAX_PRICE: Money = Money::from_cents(10_000_000_000);
    /// Most units one product may hold in stock.
    pub const MAX_STOCK: u32 = 1_000_000;

    /// Defines a new catalog entry within the price and stock limits.
    ///
    /// The limits keep every line total, and so every order total, far
    /// inside the range of cents.
    pub fn new(name: impl Into<String>, price: Money, stock: u32) -> Result<Self, ProductError> {
        if !price.is_positive() || price > Self::MAX_PRICE {
            return Err(ProductError::InvalidPrice {
                price,
                max: Self::MAX_PRICE,
            });
        }
        if stock > Self::MAX_STOCK {
            return Err(ProductError::InvalidStock {
                stock,
                max: Self::MAX_STOCK,
            });
        }
        Ok(Self {
            id: ProductId::new(),
            name: name.into(),
            price,
            stock,
        })
    }
}

/// Errors raised when defining a product.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProductError {
    #[error("Invalid price {price}: must be positive and at most {max}")]
    InvalidPrice { price: Money, max: Money },

    #[error("Invalid stock {stock}: must be at most {max}")]
    InvalidStock { stock: u32, max: u32 },
}

/// A request to take `quantity` units of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A validated decrement, ready to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Stock left once the decrement is written.
    pub remaining: u32,
}

/// Errors raised while resolving products or reserving their stock.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    #[error("Product {product_id} not found")]
    ProductNotFound { product_id: ProductId },

    #[error("Insufficient stock for {product_name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: u32,
        available: u32,
    },
}

/// Validates every request against `products` before producing any
/// adjustment.
///
/// Requests for the same product are summed. Products are checked in id
/// order, and the first one that cannot cover its request is reported.
pub fn plan_reservation(
    products: &[Product],
    requests: &[StockRequest],
) -> Result<Vec<StockAdjustment>, StockError> {
    let mut wanted: BTreeMap<ProductId, u32> = BTreeMap::new();
    for request in requests {
        let total = wanted.entry(request.product_id).or_default();
        *total = total.saturating_add(request.quantity);
    }

    let mut plan = Vec::with_capacity(wanted.len());
    for (product_id, quantity) in wanted {
        let product = products
            .iter()
            .find(|p| p.id == product_id)
            .ok_or(StockError::ProductNotFound { product_id })?;

        let remaining =
            product
                .stock
                .checked_sub(quantity)
                .ok_or_else(|| StockError::InsufficientStock {
                    product_id,
                    product_name: product.name.clone(),
                    requested: quantity,
                    available: product.stock,
                })?;

        plan.push(StockAdjustment {
            product_id,
            quantity,
            remaining,
        });
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, stock: u32) -> Product {
        Product {
            id: ProductId::new(),
            name: name.to_string(),
            price: Money::from_cents(10_000),
            stock,
        }
    }

    #[test]
    fn test_plan_covers_every_request() {
        let a = product("A", 5);
        let b = product("B", 1);
        let plan = plan_reservation(
            &[a.clone(), b.clone()],
            &[
                StockRequest {
                    product_id: a.id,
                    quantity: 2,
                },
                StockRequest {
                    product_id: b.id,
                    quantity: 1,
                },
            ],
        )
        .unwrap();

        assert_eq!(plan.len(), 2);
        let for_a = plan.iter().find(|adj| adj.product_id == a.id).unwrap();
        assert_eq!(for_a.remaining, 3);
        let for_b = plan.iter().find(|adj| adj.product_id == b.id).unwrap();
        assert_eq!(for_b.remaining, 0);
    }

    #[test]
    fn test_insufficient_stock_reports_product_and_available() {
        let a = product("A", 5);
        let b = product("B", 0);
        let result = plan_reservation(
            &[a.clone(), b.clone()],
            &[
                StockRequest {
                    product_id: a.id,
                    quantity: 2,
                },
                StockRequest {
                    product_id: b.id,
                    quantity: 1,
                },
            ],
        );

        assert_eq!(
            result,
            Err(StockError::InsufficientStock {
                product_id: b.id,
                product_name: "B".to_string(),
                requested: 1,
                available: 0,
            })
        );
    }

    #[test]
    fn test_duplicate_requests_are_summed() {
        let a = product("A", 3);
        let request = StockRequest {
            product_id: a.id,
            quantity: 2,
        };
        let result = plan_reservation(&[a], &[request, request]);
        assert!(matches!(
            result,
            Err(StockError::InsufficientStock {
                requested: 4,
                available: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_new_product_enforces_limits() {
        let product = Product::new("Lamp", Money::from_cents(4_999), 7).unwrap();
        assert_eq!(product.stock, 7);

        assert!(matches!(
            Product::new("Air", Money::zero(), 1),
            Err(ProductError::InvalidPrice { .. })
        ));
        assert!(matches!(
            Product::new("Gold", Money::from_cents(i64::MAX), 1),
            Err(ProductError::InvalidPrice { .. })
        ));
        assert!(Product::new("Ceiling", Product::MAX_PRICE, Product::MAX_STOCK).is_ok());
        assert_eq!(
            Product::new("Sand", Money::from_cents(1), u32::MAX),
            Err(ProductError::InvalidStock {
                stock: u32::MAX,
                max: Product::MAX_STOCK,
            })
        );
    }

    #[test]
    fn test_unknown_product() {
        let missing = ProductId::new();
        let result = plan_reservation(
            &[],
            &[StockRequest {
                product_id: missing,
                quantity: 1,
            }],
        );
        assert_eq!(
            result,
            Err(StockError::ProductNotFound {
                product_id: missing
            })
        );
    }
}
