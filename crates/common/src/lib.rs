//! Shared identifier types used across the checkout workspace.

pub mod ids;

pub use ids::{AddressId, CouponId, OrderId, ProductId, UserId};
