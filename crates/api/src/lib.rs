//! HTTP API server for checkout and payment reconciliation.
//!
//! Provides REST endpoints for carts, checkout, orders, provider webhooks,
//! and back-office administration, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use checkout::{
    AddressService, AdminService, CartService, CheckoutOrchestrator, CheckoutSettings,
    OrderService, PaymentGateway, WebhookReconciler, WebhookVerifier,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub checkout: CheckoutOrchestrator,
    pub carts: CartService,
    pub orders: OrderService,
    pub addresses: AddressService,
    pub admin: AdminService,
    pub webhooks: WebhookReconciler,
    /// Required `x-admin-token` value; `None` leaves admin routes open.
    pub admin_token: Option<String>,
}

impl AppState {
    /// Wires every service over one store and gateway.
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        verifier: WebhookVerifier,
        settings: CheckoutSettings,
        admin_token: Option<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            checkout: CheckoutOrchestrator::new(store.clone(), gateway, settings.clone()),
            carts: CartService::new(store.clone(), settings.clone()),
            orders: OrderService::new(store.clone(), settings.clone()),
            addresses: AddressService::new(store.clone(), settings.clone()),
            admin: AdminService::new(store.clone(), settings.clone()),
            webhooks: WebhookReconciler::new(store.clone(), verifier, settings),
            store,
            admin_token,
        })
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/checkout", post(routes::checkout::create))
        .route("/payment-webhook", post(routes::webhook::receive))
        .route("/cart", get(routes::cart::get))
        .route("/cart/items", post(routes::cart::add_item))
        .route("/cart/items/{product_id}", delete(routes::cart::remove_item))
        .route("/addresses", post(routes::addresses::create))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/history", get(routes::orders::history))
        .route("/orders/{id}/payment", post(routes::orders::retry_payment))
        .route("/admin/orders/{id}/status", put(routes::admin::update_status))
        .route("/admin/coupons", post(routes::admin::create_coupon))
        .route("/admin/products", post(routes::admin::create_product))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
