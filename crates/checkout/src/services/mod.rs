//! External collaborators the checkout flow talks to.

pub mod http_gateway;
pub mod payment;

pub use http_gateway::{HttpGatewayConfig, HttpPaymentGateway};
pub use payment::{GatewayError, InMemoryPaymentGateway, PaymentGateway, PaymentIntent};
