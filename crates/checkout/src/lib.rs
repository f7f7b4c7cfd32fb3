//! Checkout orchestration and payment reconciliation.
//!
//! This crate composes the domain rules into the operations a storefront
//! exposes. Checkout runs these steps in one store transaction:
//! 1. Resolve the cart and shipping address
//! 2. Lock and price the cart's products
//! 3. Apply the coupon
//! 4. Reserve stock
//! 5. Create the `Pending` order, count the redemption, clear the cart
//!
//! The payment gateway is asked for an intent only after that transaction
//! commits. Provider callbacks later move the order to `Completed` or
//! `Failed` through the [`WebhookReconciler`].

pub mod addresses;
pub mod admin;
pub mod cart;
pub mod coupons;
pub mod error;
pub mod orchestrator;
pub mod orders;
pub mod services;
pub mod settings;
pub mod stock;
pub mod webhook;

pub use addresses::{AddressService, NewAddress};
pub use admin::AdminService;
pub use cart::{CartService, CartView};
pub use error::{CheckoutError, ErrorKind, Result};
pub use orchestrator::{CheckoutOrchestrator, CheckoutReceipt, CheckoutRequest};
pub use orders::OrderService;
pub use services::{
    GatewayError, HttpGatewayConfig, HttpPaymentGateway, InMemoryPaymentGateway, PaymentGateway,
    PaymentIntent,
};
pub use settings::CheckoutSettings;
pub use webhook::{
    IgnoredReason, TransactionCallback, WebhookError, WebhookOutcome, WebhookReconciler,
    WebhookVerifier,
};
