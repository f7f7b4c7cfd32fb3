//! Applies authenticated payment callbacks to orders, exactly once.

use std::sync::Arc;

use chrono::Utc;
use common::OrderId;
use domain::OrderError;
use store::{Store, StoreError, finish, with_timeout};
use thiserror::Error;

use super::payload::{TRANSACTION_TYPE, TransactionCallback};
use super::signature::WebhookVerifier;
use crate::settings::CheckoutSettings;

/// Failures that must not be acknowledged to the provider.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature missing, undecodable, or wrong, or the body is not a callback at all.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl WebhookError {
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::Unauthorized => "UNAUTHORIZED",
            WebhookError::Store(StoreError::Timeout { .. }) => "TIMEOUT",
            WebhookError::Store(_) => "STORE_ERROR",
        }
    }
}

/// Why an authenticated callback changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    UnsupportedType,
    MissingReference,
    UnknownOrder,
    StillPending,
    /// The signed amount or currency is not what the order charges.
    AmountMismatch,
    TransitionNotAllowed,
}

impl IgnoredReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoredReason::UnsupportedType => "unsupported_type",
            IgnoredReason::MissingReference => "missing_reference",
            IgnoredReason::UnknownOrder => "unknown_order",
            IgnoredReason::StillPending => "still_pending",
            IgnoredReason::AmountMismatch => "amount_mismatch",
            IgnoredReason::TransitionNotAllowed => "transition_not_allowed",
        }
    }
}

/// What an acknowledged callback did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The order moved and a history entry was appended.
    Applied,
    /// The order already held the status this callback produces.
    Duplicate,
    Ignored(IgnoredReason),
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Applied => "applied",
            WebhookOutcome::Duplicate => "duplicate",
            WebhookOutcome::Ignored(reason) => reason.as_str(),
        }
    }
}

/// Authenticates provider callbacks and applies their payment outcome.
///
/// The order is re-read under its row lock inside a transaction, so
/// concurrent or repeated deliveries append at most one history entry.
pub struct WebhookReconciler {
    store: Arc<dyn Store>,
    verifier: WebhookVerifier,
    settings: CheckoutSettings,
}

impl WebhookReconciler {
    pub fn new(store: Arc<dyn Store>, verifier: WebhookVerifier, settings: CheckoutSettings) -> Self {
        Self {
            store,
            verifier,
            settings,
        }
    }

    /// Processes one raw callback body with the signature the provider sent.
    #[tracing::instrument(skip(self, body, signature))]
    pub async fn process(
        &self,
        body: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, WebhookError> {
        let result = self.reconcile(body, signature).await;

        let outcome = match &result {
            Ok(outcome) => outcome.as_str(),
            Err(WebhookError::Unauthorized) => "unauthorized",
            Err(WebhookError::Store(_)) => "error",
        };
        metrics::counter!("webhook_callbacks_total", "outcome" => outcome).increment(1);

        result
    }

    async fn reconcile(
        &self,
        body: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, WebhookError> {
        let Ok(callback) = serde_json::from_slice::<TransactionCallback>(body) else {
            tracing::warn!("webhook body is not a transaction callback");
            return Err(WebhookError::Unauthorized);
        };
        if !self.verifier.verify(&callback.obj, signature) {
            tracing::warn!(transaction_id = callback.obj.id, "webhook signature mismatch");
            return Err(WebhookError::Unauthorized);
        }

        if callback.kind != TRANSACTION_TYPE {
            tracing::info!(kind = %callback.kind, "ignoring webhook of unsupported type");
            return Ok(WebhookOutcome::Ignored(IgnoredReason::UnsupportedType));
        }

        let transaction = callback.obj;
        let Some(order_id) = transaction
            .order
            .merchant_order_id
            .as_deref()
            .and_then(|reference| reference.trim().parse::<OrderId>().ok())
        else {
            tracing::warn!(
                transaction_id = transaction.id,
                "webhook carries no usable merchant order reference"
            );
            return Ok(WebhookOutcome::Ignored(IgnoredReason::MissingReference));
        };

        let Some(payment) = transaction.outcome() else {
            tracing::info!(%order_id, transaction_id = transaction.id, "transaction still pending");
            return Ok(WebhookOutcome::Ignored(IgnoredReason::StillPending));
        };

        with_timeout(self.settings.store_timeout, "reconcile payment", async {
            let mut tx = self.store.begin().await?;
            let result: Result<WebhookOutcome, WebhookError> = async {
                let Some(order) = tx.order_for_update(order_id).await? else {
                    tracing::warn!(%order_id, "webhook references an unknown order");
                    return Ok(WebhookOutcome::Ignored(IgnoredReason::UnknownOrder));
                };

                // The merchant reference is not signed; amount and currency are.
                if transaction.amount_cents != order.total().cents()
                    || !transaction
                        .currency
                        .eq_ignore_ascii_case(&self.settings.currency)
                {
                    tracing::warn!(
                        %order_id,
                        transaction_id = transaction.id,
                        amount_cents = transaction.amount_cents,
                        currency = %transaction.currency,
                        expected_cents = order.total().cents(),
                        "payment callback does not match order total"
                    );
                    return Ok(WebhookOutcome::Ignored(IgnoredReason::AmountMismatch));
                }

                let entry = match order.record_payment(
                    payment,
                    Some(transaction.history_note()),
                    Utc::now(),
                ) {
                    Ok(Some(entry)) => entry,
                    Ok(None) => {
                        tracing::debug!(%order_id, "duplicate payment callback");
                        return Ok(WebhookOutcome::Duplicate);
                    }
                    Err(OrderError::InvalidStatusTransition { current, requested }) => {
                        tracing::warn!(
                            %order_id,
                            %current,
                            %requested,
                            "payment callback does not apply to order"
                        );
                        return Ok(WebhookOutcome::Ignored(IgnoredReason::TransitionNotAllowed));
                    }
                    Err(other) => {
                        tracing::warn!(%order_id, error = %other, "payment callback rejected");
                        return Ok(WebhookOutcome::Ignored(IgnoredReason::TransitionNotAllowed));
                    }
                };

                tx.update_order_status(order_id, entry.status, entry.recorded_at)
                    .await?;
                tx.append_history(&entry).await?;
                tracing::info!(%order_id, status = %entry.status, "payment reconciled");
                Ok(WebhookOutcome::Applied)
            }
            .await;
            finish(tx, result).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::payload::fixtures;
    use common::{ProductId, UserId};
    use domain::{
        Money, NewOrder, Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress,
    };
    use store::InMemoryStore;

    const SECRET: &str = "whsec_test";

    fn order_costing(unit_cents: i64) -> Order {
        Order::place(NewOrder {
            id: OrderId::new(),
            user_id: UserId::new(),
            shipping_address: ShippingAddress {
                recipient: "R".into(),
                phone: "1".into(),
                street: "S".into(),
                city: "C".into(),
                region: "R".into(),
                postal_code: None,
                country: "EG".into(),
            },
            items: vec![OrderItem::new(
                ProductId::new(),
                "Widget",
                1,
                Money::from_cents(unit_cents),
            )],
            discount: Money::zero(),
            coupon_id: None,
            shipping_price: Money::from_cents(5_000),
            payment_method: PaymentMethod::Card,
            placed_at: Utc::now(),
        })
        .unwrap()
    }

    async fn insert(store: &InMemoryStore, order: &Order) {
        let mut tx = store.begin().await.unwrap();
        tx.insert_order(order).await.unwrap();
        tx.commit().await.unwrap();
    }

    /// One pending order whose total (210.00) matches the fixture callback.
    async fn setup() -> (WebhookReconciler, InMemoryStore, Order) {
        let store = InMemoryStore::new();
        let order = order_costing(16_000);
        insert(&store, &order).await;

        let reconciler = WebhookReconciler::new(
            Arc::new(store.clone()),
            WebhookVerifier::new(SECRET),
            CheckoutSettings::default(),
        );
        (reconciler, store, order)
    }

    fn signed(callback: &TransactionCallback) -> (Vec<u8>, String) {
        let body = serde_json::to_vec(callback).unwrap();
        let signature = WebhookVerifier::new(SECRET).sign(&callback.obj);
        (body, signature)
    }

    async fn stored(store: &InMemoryStore, order_id: OrderId) -> Order {
        let mut tx = store.begin().await.unwrap();
        tx.order(order_id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_success_completes_order_once() {
        let (reconciler, store, order) = setup().await;
        let callback = fixtures::transaction(Some(order.id().to_string()));
        let (body, signature) = signed(&callback);

        let first = reconciler.process(&body, &signature).await.unwrap();
        let second = reconciler.process(&body, &signature).await.unwrap();
        assert_eq!(first, WebhookOutcome::Applied);
        assert_eq!(second, WebhookOutcome::Duplicate);

        let order = stored(&store, order.id()).await;
        assert_eq!(order.status(), OrderStatus::Completed);
        assert_eq!(order.history().len(), 2);
        assert_eq!(
            order.history()[1].note.as_deref(),
            Some("Payment transaction 192036465: 210.00 EGP")
        );
    }

    #[tokio::test]
    async fn test_error_flag_fails_order() {
        let (reconciler, store, order) = setup().await;
        let mut callback = fixtures::transaction(Some(order.id().to_string()));
        callback.obj.success = false;
        callback.obj.error_occured = true;
        let (body, signature) = signed(&callback);

        let outcome = reconciler.process(&body, &signature).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Applied);
        assert_eq!(stored(&store, order.id()).await.status(), OrderStatus::Failed);
    }

    #[tokio::test]
    async fn test_bad_signature_is_unauthorized_and_changes_nothing() {
        let (reconciler, store, order) = setup().await;
        let callback = fixtures::transaction(Some(order.id().to_string()));
        let (body, _) = signed(&callback);

        let zeros = "00".repeat(64);
        for signature in ["", "zz", zeros.as_str()] {
            let result = reconciler.process(&body, signature).await;
            assert!(matches!(result, Err(WebhookError::Unauthorized)));
        }
        let result = reconciler.process(b"{not json", "00").await;
        assert!(matches!(result, Err(WebhookError::Unauthorized)));

        let order = stored(&store, order.id()).await;
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.history().len(), 1);
    }

    #[tokio::test]
    async fn test_authenticated_but_inapplicable_callbacks_are_ignored() {
        let (reconciler, store, order) = setup().await;

        let mut wrong_type = fixtures::transaction(Some(order.id().to_string()));
        wrong_type.kind = "TOKEN".into();
        let (body, signature) = signed(&wrong_type);
        assert_eq!(
            reconciler.process(&body, &signature).await.unwrap(),
            WebhookOutcome::Ignored(IgnoredReason::UnsupportedType)
        );

        let (body, signature) = signed(&fixtures::transaction(None));
        assert_eq!(
            reconciler.process(&body, &signature).await.unwrap(),
            WebhookOutcome::Ignored(IgnoredReason::MissingReference)
        );

        let (body, signature) = signed(&fixtures::transaction(Some(OrderId::new().to_string())));
        assert_eq!(
            reconciler.process(&body, &signature).await.unwrap(),
            WebhookOutcome::Ignored(IgnoredReason::UnknownOrder)
        );

        let mut pending = fixtures::transaction(Some(order.id().to_string()));
        pending.obj.success = false;
        pending.obj.pending = true;
        let (body, signature) = signed(&pending);
        assert_eq!(
            reconciler.process(&body, &signature).await.unwrap(),
            WebhookOutcome::Ignored(IgnoredReason::StillPending)
        );

        assert_eq!(stored(&store, order.id()).await.history().len(), 1);
    }

    #[tokio::test]
    async fn test_late_decline_after_success_is_not_applied() {
        let (reconciler, store, order) = setup().await;
        let success = fixtures::transaction(Some(order.id().to_string()));
        let (body, signature) = signed(&success);
        reconciler.process(&body, &signature).await.unwrap();

        let mut decline = success.clone();
        decline.obj.success = false;
        let (body, signature) = signed(&decline);
        assert_eq!(
            reconciler.process(&body, &signature).await.unwrap(),
            WebhookOutcome::Ignored(IgnoredReason::TransitionNotAllowed)
        );
        assert_eq!(
            stored(&store, order.id()).await.status(),
            OrderStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_signed_callback_cannot_be_moved_to_another_order() {
        let (reconciler, store, cheap) = setup().await;
        let pricey = order_costing(9_999_900);
        insert(&store, &pricey).await;

        let mut callback = fixtures::transaction(Some(cheap.id().to_string()));
        let (_, signature) = signed(&callback);
        callback.obj.order.merchant_order_id = Some(pricey.id().to_string());
        let body = serde_json::to_vec(&callback).unwrap();

        assert_eq!(
            reconciler.process(&body, &signature).await.unwrap(),
            WebhookOutcome::Ignored(IgnoredReason::AmountMismatch)
        );
        let pricey = stored(&store, pricey.id()).await;
        assert_eq!(pricey.status(), OrderStatus::Pending);
        assert_eq!(pricey.history().len(), 1);
        assert_eq!(
            stored(&store, cheap.id()).await.status(),
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_amount_and_currency_must_match_order() {
        let (reconciler, store, order) = setup().await;

        let mut short = fixtures::transaction(Some(order.id().to_string()));
        short.obj.amount_cents = 20_999;
        let (body, signature) = signed(&short);
        assert_eq!(
            reconciler.process(&body, &signature).await.unwrap(),
            WebhookOutcome::Ignored(IgnoredReason::AmountMismatch)
        );

        let mut dollars = fixtures::transaction(Some(order.id().to_string()));
        dollars.obj.currency = "USD".into();
        let (body, signature) = signed(&dollars);
        assert_eq!(
            reconciler.process(&body, &signature).await.unwrap(),
            WebhookOutcome::Ignored(IgnoredReason::AmountMismatch)
        );
        assert_eq!(stored(&store, order.id()).await.history().len(), 1);

        let mut lower = fixtures::transaction(Some(order.id().to_string()));
        lower.obj.currency = "egp".into();
        let (body, signature) = signed(&lower);
        assert_eq!(
            reconciler.process(&body, &signature).await.unwrap(),
            WebhookOutcome::Applied
        );
    }
}
