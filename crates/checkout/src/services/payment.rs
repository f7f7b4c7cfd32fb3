//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::OrderId;
use domain::Order;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Handoff data the client needs to complete payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub client_secret: String,
    pub checkout_url: String,
}

/// Errors returned by a payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The provider answered with a non-success status.
    #[error("Gateway rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The request never produced a response.
    #[error("Gateway transport error: {0}")]
    Transport(String),

    /// The provider's response could not be understood.
    #[error("Gateway returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Creates payment intents with an external provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Requests a payment intent covering the order's total.
    async fn create_payment_intent(&self, order: &Order) -> Result<PaymentIntent, GatewayError>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    intents: HashMap<OrderId, PaymentIntent>,
    next_id: u32,
    fail_on_create: bool,
    delay: Option<Duration>,
}

/// In-memory payment gateway for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to fail every create call.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_create = fail;
    }

    /// Makes every create call wait before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .delay = delay;
    }

    /// Returns the number of intents issued.
    pub fn intent_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .intents
            .len()
    }

    /// Returns the latest intent issued for an order.
    pub fn intent_for(&self, order_id: OrderId) -> Option<PaymentIntent> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .intents
            .get(&order_id)
            .cloned()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_payment_intent(&self, order: &Order) -> Result<PaymentIntent, GatewayError> {
        let delay = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_create {
            return Err(GatewayError::Rejected {
                status: 503,
                body: "gateway unavailable".to_string(),
            });
        }

        state.next_id += 1;
        let intent = PaymentIntent {
            client_secret: format!("pi_secret_{:04}", state.next_id),
            checkout_url: format!("https://pay.local/checkout/{}", order.id()),
        };
        state.intents.insert(order.id(), intent.clone());

        Ok(intent)
    }
}
