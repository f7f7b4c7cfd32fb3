//! Checkout orchestrator: turns a cart into a pending order and a payment intent.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{AddressId, OrderId, UserId};
use domain::{CartSnapshot, Coupon, CouponError, Money, NewOrder, Order, PaymentMethod};
use serde::{Deserialize, Serialize};
use store::{Store, StoreTx, finish, with_timeout};

use crate::coupons::validate_and_calculate_discount;
use crate::error::{CheckoutError, Result};
use crate::services::payment::{PaymentGateway, PaymentIntent};
use crate::settings::CheckoutSettings;
use crate::stock::reserve_stock;

/// Input to [`CheckoutOrchestrator::checkout`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub shipping_address_id: AddressId,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
}

/// A placed order together with the gateway's payment handoff.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub order: Order,
    pub payment: PaymentIntent,
}

/// Composes cart, coupon, stock, and order rules into one checkout.
///
/// Everything up to and including order creation runs in a single store
/// transaction. The payment gateway is called only after that transaction
/// commits, so a gateway failure leaves a payable `Pending` order behind
/// instead of undoing the reservation.
pub struct CheckoutOrchestrator {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    settings: CheckoutSettings,
}

impl CheckoutOrchestrator {
    /// Creates a new checkout orchestrator.
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }

    /// Converts the user's cart into a `Pending` order and requests payment for it.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = Instant::now();

        let result = self.run_checkout(&request).await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(receipt) => {
                tracing::info!(
                    order_id = %receipt.order.id(),
                    total = %receipt.order.total(),
                    "checkout completed"
                );
            }
            Err(err) => {
                metrics::counter!("checkout_failures_total", "code" => err.code()).increment(1);
                tracing::warn!(code = err.code(), error = %err, "checkout failed");
            }
        }

        result
    }

    async fn run_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutReceipt> {
        let order = with_timeout(self.settings.store_timeout, "checkout", async {
            let mut tx = self.store.begin().await?;
            let result = self.place_order(&mut *tx, request, Utc::now()).await;
            finish(tx, result).await
        })
        .await?;

        let payment = self.request_payment(&order).await?;
        Ok(CheckoutReceipt { order, payment })
    }

    /// Steps 1-7 of checkout. Any error aborts the enclosing transaction.
    async fn place_order(
        &self,
        tx: &mut dyn StoreTx,
        request: &CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        let user_id = request.user_id;

        // 1. Resolve the cart
        let items = tx.cart_items(user_id).await?;
        if items.is_empty() {
            return Err(CheckoutError::CartIsEmpty);
        }

        // 2. Resolve the shipping address
        let address = tx
            .address(user_id, request.shipping_address_id)
            .await?
            .ok_or(CheckoutError::AddressNotFound {
                address_id: request.shipping_address_id,
            })?;

        // 3. Lock products and snapshot their prices
        let product_ids: Vec<_> = items.iter().map(|item| item.product_id).collect();
        let products = tx.products_for_update(&product_ids).await?;
        let snapshot = CartSnapshot::price(&items, &products)?;
        let subtotal = snapshot.subtotal();

        // 4. Apply the coupon, if any
        let quote = match request.coupon_code.as_deref() {
            Some(code) => {
                Some(validate_and_calculate_discount(tx, user_id, code, subtotal, now).await?)
            }
            None => None,
        };

        // 5. Reserve stock
        reserve_stock(tx, &products, &snapshot.stock_requests()).await?;

        // 6. Create the order
        let order = Order::place(NewOrder {
            id: OrderId::new(),
            user_id,
            shipping_address: address.snapshot(),
            items: snapshot.order_items(),
            discount: quote.map_or(Money::zero(), |q| q.discount),
            coupon_id: quote.map(|q| q.coupon_id),
            shipping_price: self.settings.shipping_price,
            payment_method: request.payment_method,
            placed_at: now,
        })?;
        tx.insert_order(&order).await?;

        // 7. Count the coupon redemption
        if let Some(quote) = quote
            && !tx
                .record_redemption(quote.coupon_id, user_id, order.id())
                .await?
        {
            let code = request.coupon_code.clone().unwrap_or_default();
            return Err(CouponError::CouponUsageLimitExceeded {
                code: Coupon::normalize_code(&code).unwrap_or(code),
            }
            .into());
        }

        tx.clear_cart(user_id).await?;
        Ok(order)
    }

    /// Requests a new payment intent for the caller's `Pending` order.
    #[tracing::instrument(skip(self))]
    pub async fn retry_payment(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<CheckoutReceipt> {
        let order = with_timeout(self.settings.store_timeout, "load order", async {
            let mut tx = self.store.begin().await?;
            let result = tx.order(order_id).await.map_err(CheckoutError::from);
            finish(tx, result).await
        })
        .await?
        .filter(|order| order.user_id() == user_id)
        .ok_or(CheckoutError::OrderNotFound { order_id })?;

        if !order.status().awaits_payment() {
            return Err(CheckoutError::OrderNotPayable {
                order_id,
                status: order.status(),
            });
        }

        let payment = self.request_payment(&order).await?;
        Ok(CheckoutReceipt { order, payment })
    }

    /// Step 8: ask the gateway for a payment intent, bounded by the gateway timeout.
    ///
    /// Never retried here; the order stays `Pending` on failure.
    async fn request_payment(&self, order: &Order) -> Result<PaymentIntent> {
        let outcome = tokio::time::timeout(
            self.settings.gateway_timeout,
            self.gateway.create_payment_intent(order),
        )
        .await;

        let reason = match outcome {
            Ok(Ok(intent)) => return Ok(intent),
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!(
                "gateway did not answer within {}ms",
                self.settings.gateway_timeout.as_millis()
            ),
        };

        metrics::counter!("payment_intent_failures_total").increment(1);
        tracing::warn!(order_id = %order.id(), %reason, "payment intent failed");
        Err(CheckoutError::PaymentIntentFailed {
            order_id: order.id(),
            reason,
        })
    }
}
