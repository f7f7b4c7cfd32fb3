//! Domain layer for the checkout system.
//!
//! This crate provides the pure business rules:
//! - `Money` arithmetic with half-away-from-zero rounding
//! - Order aggregate with its status state machine and append-only history
//! - Coupon definitions and the read-only discount engine
//! - Product stock planning for all-or-nothing reservations
//! - Cart and its priced snapshot

pub mod address;
pub mod cart;
pub mod catalog;
pub mod coupon;
pub mod money;
pub mod order;

pub use address::Address;
pub use cart::{Cart, CartItem, CartLine, CartSnapshot};
pub use catalog::{Product, ProductError, StockAdjustment, StockError, StockRequest, plan_reservation};
pub use coupon::{Coupon, CouponEngine, CouponError, CouponKind, CouponQuote, CouponType, NewCoupon};
pub use money::Money;
pub use order::{
    NewOrder, Order, OrderError, OrderHeader, OrderItem, OrderStatus, PaymentMethod,
    PaymentOutcome, ShippingAddress, StatusHistoryEntry,
};
