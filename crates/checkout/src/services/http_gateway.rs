//! Payment gateway speaking JSON over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use domain::{Order, PaymentMethod};
use serde::{Deserialize, Serialize};

use super::payment::{GatewayError, PaymentGateway, PaymentIntent};

/// Connection settings for [`HttpPaymentGateway`].
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Provider base URL, without a trailing slash.
    pub base_url: String,
    pub api_key: String,
    /// ISO currency code sent with every intent.
    pub currency: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct BillingData<'a> {
    recipient: &'a str,
    phone: &'a str,
    street: &'a str,
    city: &'a str,
    region: &'a str,
    postal_code: Option<&'a str>,
    country: &'a str,
}

/// Only the order total is sent. Item lines would sum to the subtotal,
/// not to the discounted total plus shipping that is actually charged.
#[derive(Debug, Serialize)]
struct IntentRequest<'a> {
    merchant_order_id: String,
    amount_cents: i64,
    currency: &'a str,
    payment_method: PaymentMethod,
    billing: BillingData<'a>,
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    client_secret: String,
    checkout_url: String,
}

/// Creates payment intents by POSTing to `{base_url}/intentions`.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    config: HttpGatewayConfig,
    client: reqwest::Client,
}

impl HttpPaymentGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn request_body<'a>(&'a self, order: &'a Order) -> IntentRequest<'a> {
        let address = order.shipping_address();
        IntentRequest {
            merchant_order_id: order.id().to_string(),
            amount_cents: order.total().cents(),
            currency: &self.config.currency,
            payment_method: order.payment_method(),
            billing: BillingData {
                recipient: &address.recipient,
                phone: &address.phone,
                street: &address.street,
                city: &address.city,
                region: &address.region,
                postal_code: address.postal_code.as_deref(),
                country: &address.country,
            },
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id()))]
    async fn create_payment_intent(&self, order: &Order) -> Result<PaymentIntent, GatewayError> {
        let url = format!("{}/intentions", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.config.api_key))
            .json(&self.request_body(order))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "payment gateway rejected intent");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let intent: IntentResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        tracing::info!("payment intent created");
        Ok(PaymentIntent {
            client_secret: intent.client_secret,
            checkout_url: intent.checkout_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{OrderId, ProductId, UserId};
    use domain::{Money, NewOrder, OrderItem, ShippingAddress};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn order() -> Order {
        Order::place(NewOrder {
            id: OrderId::new(),
            user_id: UserId::new(),
            shipping_address: ShippingAddress {
                recipient: "Ada".into(),
                phone: "+20100".into(),
                street: "1 Main".into(),
                city: "Cairo".into(),
                region: "Cairo".into(),
                postal_code: None,
                country: "EG".into(),
            },
            items: vec![OrderItem::new(
                ProductId::new(),
                "Widget",
                2,
                Money::from_cents(10_000),
            )],
            discount: Money::from_cents(1_000),
            coupon_id: None,
            shipping_price: Money::from_cents(3_000),
            payment_method: PaymentMethod::Card,
            placed_at: Utc::now(),
        })
        .unwrap()
    }

    fn gateway(server: &MockServer, timeout: Duration) -> HttpPaymentGateway {
        HttpPaymentGateway::new(HttpGatewayConfig {
            base_url: server.uri(),
            api_key: "test-key".into(),
            currency: "EGP".into(),
            timeout,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_creates_intent() {
        let server = MockServer::start().await;
        let order = order();

        Mock::given(method("POST"))
            .and(path("/intentions"))
            .and(header("Authorization", "Token test-key"))
            .and(body_partial_json(serde_json::json!({
                "merchant_order_id": order.id().to_string(),
                "amount_cents": 22_000,
                "currency": "EGP",
                "payment_method": "card",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "client_secret": "secret_123",
                "checkout_url": "https://pay.example/checkout/abc",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let intent = gateway(&server, Duration::from_secs(5))
            .create_payment_intent(&order)
            .await
            .unwrap();

        assert_eq!(intent.client_secret, "secret_123");
        assert_eq!(intent.checkout_url, "https://pay.example/checkout/abc");
    }

    #[tokio::test]
    async fn test_discounted_order_sends_total_without_item_lines() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/intentions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "client_secret": "secret_456",
                "checkout_url": "https://pay.example/checkout/def",
            })))
            .mount(&server)
            .await;

        let order = order();
        assert!(order.discount().is_positive());
        gateway(&server, Duration::from_secs(5))
            .create_payment_intent(&order)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["amount_cents"], order.total().cents());
        assert!(body.get("items").is_none());
        assert_eq!(body["billing"]["city"], "Cairo");
    }

    #[tokio::test]
    async fn test_rejection_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/intentions"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad amount"))
            .mount(&server)
            .await;

        let result = gateway(&server, Duration::from_secs(5))
            .create_payment_intent(&order())
            .await;

        match result {
            Err(GatewayError::Rejected { status, body }) => {
                assert_eq!(status, 422);
                assert_eq!(body, "bad amount");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/intentions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = gateway(&server, Duration::from_secs(5))
            .create_payment_intent(&order())
            .await;
        assert!(matches!(result, Err(GatewayError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/intentions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_json(serde_json::json!({
                        "client_secret": "late",
                        "checkout_url": "https://pay.example/late",
                    })),
            )
            .mount(&server)
            .await;

        let result = gateway(&server, Duration::from_millis(100))
            .create_payment_intent(&order())
            .await;
        assert!(matches!(result, Err(GatewayError::Transport(_))));
    }
}
