//! Concurrent checkout and reconciliation against PostgreSQL.
//!
//! These tests share one PostgreSQL container and truncate all tables
//! before each test, so they are serialized with `serial_test`.
//!
//! ```bash
//! cargo test -p checkout --test postgres_checkout
//! ```

use std::sync::Arc;
use std::time::Duration;

use checkout::webhook::{
    TransactionCallback, TransactionObject, TransactionOrder, TransactionSourceData,
};
use checkout::{
    AddressService, AdminService, CartService, CheckoutError, CheckoutOrchestrator,
    CheckoutRequest, CheckoutSettings, InMemoryPaymentGateway, NewAddress, OrderService,
    WebhookOutcome, WebhookReconciler, WebhookVerifier,
};
use chrono::Utc;
use common::{AddressId, UserId};
use domain::{CouponError, CouponKind, Money, NewCoupon, Order, OrderStatus, PaymentMethod, Product};
use serial_test::serial;
use sqlx::postgres::PgPoolOptions;
use store::{PostgresStore, Store};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

const SECRET: &str = "postgres-secret";

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let pool = PgPoolOptions::new()
                .max_connections(1)
                .connect(&connection_string)
                .await
                .unwrap();
            PostgresStore::new(pool.clone())
                .run_migrations()
                .await
                .unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

struct PgHarness {
    store: PostgresStore,
    checkout: Arc<CheckoutOrchestrator>,
    carts: CartService,
    addresses: AddressService,
    admin: AdminService,
    orders: OrderService,
    webhooks: Arc<WebhookReconciler>,
}

impl PgHarness {
    /// Fresh services over a cleared database.
    async fn new() -> Self {
        let info = get_container_info().await;
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(&info.connection_string)
            .await
            .unwrap();

        sqlx::query(
            "TRUNCATE TABLE coupon_redemptions, order_status_history, order_items, orders, \
             coupons, cart_items, carts, addresses, products",
        )
        .execute(&pool)
        .await
        .unwrap();

        let store = PostgresStore::new(pool);
        let shared: Arc<dyn Store> = Arc::new(store.clone());
        let settings = CheckoutSettings {
            store_timeout: Duration::from_secs(30),
            ..CheckoutSettings::default()
        };

        Self {
            checkout: Arc::new(CheckoutOrchestrator::new(
                shared.clone(),
                Arc::new(InMemoryPaymentGateway::new()),
                settings.clone(),
            )),
            carts: CartService::new(shared.clone(), settings.clone()),
            addresses: AddressService::new(shared.clone(), settings.clone()),
            admin: AdminService::new(shared.clone(), settings.clone()),
            orders: OrderService::new(shared.clone(), settings.clone()),
            webhooks: Arc::new(WebhookReconciler::new(
                shared,
                WebhookVerifier::new(SECRET),
                settings,
            )),
            store,
        }
    }

    async fn shopper(&self, product: &Product, quantity: u32) -> (UserId, AddressId) {
        let user_id = UserId::new();
        let address = self
            .addresses
            .save_address(
                user_id,
                NewAddress {
                    recipient: "Test Shopper".into(),
                    phone: "+201000000000".into(),
                    street: "1 Market St".into(),
                    city: "Cairo".into(),
                    region: "Cairo".into(),
                    postal_code: None,
                    country: "EG".into(),
                },
            )
            .await
            .unwrap();
        self.carts
            .add_item(user_id, product.id, quantity)
            .await
            .unwrap();
        (user_id, address.id)
    }

    async fn stock_of(&self, product: &Product) -> u32 {
        let mut tx = self.store.begin().await.unwrap();
        tx.products(&[product.id]).await.unwrap()[0].stock
    }

    async fn count(&self, table: &str) -> i64 {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        sqlx::query_scalar(&sql)
            .fetch_one(self.store.pool())
            .await
            .unwrap()
    }
}

fn request(user_id: UserId, address_id: AddressId, coupon: Option<&str>) -> CheckoutRequest {
    CheckoutRequest {
        user_id,
        shipping_address_id: address_id,
        payment_method: PaymentMethod::Card,
        coupon_code: coupon.map(str::to_string),
    }
}

fn signed_success(order: &Order) -> (Vec<u8>, String) {
    let callback = TransactionCallback {
        kind: "TRANSACTION".into(),
        obj: TransactionObject {
            id: 9_100,
            pending: false,
            amount_cents: order.total().cents(),
            success: true,
            is_auth: false,
            is_capture: false,
            is_standalone_payment: true,
            is_voided: false,
            is_refunded: false,
            is_3d_secure: true,
            integration_id: 42,
            has_parent_transaction: false,
            owner: 9,
            error_occured: false,
            currency: "EGP".into(),
            created_at: "2024-06-13T11:33:44".into(),
            order: TransactionOrder {
                id: 77,
                merchant_order_id: Some(order.id().to_string()),
            },
            source_data: TransactionSourceData {
                pan: "4242".into(),
                sub_type: "Visa".into(),
                kind: "card".into(),
            },
        },
    };
    let signature = WebhookVerifier::new(SECRET).sign(&callback.obj);
    (serde_json::to_vec(&callback).unwrap(), signature)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn parallel_checkouts_never_oversell() {
    let h = PgHarness::new().await;
    let p = h
        .admin
        .create_product("Limited".into(), Money::from_cents(2_500), 5)
        .await
        .unwrap();

    let mut shoppers = Vec::new();
    for _ in 0..12 {
        shoppers.push(h.shopper(&p, 1).await);
    }

    let handles: Vec<_> = shoppers
        .into_iter()
        .map(|(user_id, address_id)| {
            let checkout = h.checkout.clone();
            tokio::spawn(async move { checkout.checkout(request(user_id, address_id, None)).await })
        })
        .collect();

    let mut placed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(CheckoutError::InsufficientStock { available, .. }) => assert_eq!(available, 0),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(placed, 5);
    assert_eq!(h.stock_of(&p).await, 0);
    assert_eq!(h.count("orders").await, 5);
    assert_eq!(h.count("order_status_history").await, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn parallel_redemptions_respect_usage_limit() {
    let h = PgHarness::new().await;
    let p = h
        .admin
        .create_product("Plenty".into(), Money::from_cents(5_000), 100)
        .await
        .unwrap();
    h.admin
        .create_coupon(NewCoupon {
            code: "FIRST3".into(),
            kind: CouponKind::Fixed {
                amount: Money::from_cents(500),
            },
            expires_at: Utc::now() + chrono::Duration::days(7),
            usage_limit: 3,
            per_user_limit: 1,
        })
        .await
        .unwrap();

    let mut shoppers = Vec::new();
    for _ in 0..10 {
        shoppers.push(h.shopper(&p, 1).await);
    }

    let handles: Vec<_> = shoppers
        .into_iter()
        .map(|(user_id, address_id)| {
            let checkout = h.checkout.clone();
            tokio::spawn(async move {
                checkout
                    .checkout(request(user_id, address_id, Some("FIRST3")))
                    .await
            })
        })
        .collect();

    let mut redeemed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => {
                assert_eq!(receipt.order.discount(), Money::from_cents(500));
                redeemed += 1;
            }
            Err(CheckoutError::Coupon(CouponError::CouponUsageLimitExceeded { .. })) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(redeemed, 3);
    assert_eq!(h.count("coupon_redemptions").await, 3);
    assert_eq!(h.count("orders").await, 3);
    assert_eq!(h.stock_of(&p).await, 97);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn parallel_webhook_deliveries_apply_once() {
    let h = PgHarness::new().await;
    let p = h
        .admin
        .create_product("Product".into(), Money::from_cents(19_000), 2)
        .await
        .unwrap();
    let (user_id, address_id) = h.shopper(&p, 1).await;
    let receipt = h
        .checkout
        .checkout(request(user_id, address_id, None))
        .await
        .unwrap();
    let (body, signature) = signed_success(&receipt.order);

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let webhooks = h.webhooks.clone();
            let body = body.clone();
            let signature = signature.clone();
            tokio::spawn(async move { webhooks.process(&body, &signature).await })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            WebhookOutcome::Applied => applied += 1,
            WebhookOutcome::Duplicate => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!(applied, 1);

    let history = h
        .orders
        .order_history(user_id, receipt.order.id())
        .await
        .unwrap();
    let statuses: Vec<_> = history.iter().map(|entry| entry.status).collect();
    assert_eq!(statuses, vec![OrderStatus::Pending, OrderStatus::Completed]);
}
