//! Tunables shared by the checkout services.

use std::time::Duration;

use domain::Money;

/// Settings for checkout and order operations.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Flat shipping price added to every order.
    pub shipping_price: Money,
    /// Upper bound on one unit of work against the store.
    pub store_timeout: Duration,
    /// Upper bound on one payment gateway call.
    pub gateway_timeout: Duration,
    /// ISO code every order is charged in.
    pub currency: String,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            shipping_price: Money::from_cents(5_000),
            store_timeout: Duration::from_secs(5),
            gateway_timeout: Duration::from_secs(10),
            currency: "EGP".to_string(),
        }
    }
}
