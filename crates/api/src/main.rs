//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use checkout::{HttpPaymentGateway, InMemoryPaymentGateway, PaymentGateway, WebhookVerifier};
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Secret used when no webhook secret is configured and the gateway is in-memory.
const LOCAL_WEBHOOK_SECRET: &str = "local-webhook-secret";

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn connect_store(config: &Config) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using the in-memory store");
        return Ok(Arc::new(InMemoryStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(config.store_timeout)
        .connect(url)
        .await?;
    let store = PostgresStore::new(pool);
    store.run_migrations().await?;
    tracing::info!("connected to PostgreSQL and applied migrations");
    Ok(Arc::new(store))
}

fn build_gateway(config: &Config) -> Result<Arc<dyn PaymentGateway>, Box<dyn std::error::Error>> {
    match config.gateway_config() {
        Some(gateway_config) => {
            tracing::info!(base_url = %gateway_config.base_url, "using HTTP payment gateway");
            Ok(Arc::new(HttpPaymentGateway::new(gateway_config)?))
        }
        None => {
            tracing::warn!("PAYMENT_GATEWAY_URL not set, using the in-memory gateway");
            Ok(Arc::new(InMemoryPaymentGateway::new()))
        }
    }
}

fn webhook_verifier(config: &Config) -> Result<WebhookVerifier, Box<dyn std::error::Error>> {
    match (&config.payment_webhook_secret, &config.payment_gateway_url) {
        (Some(secret), _) => Ok(WebhookVerifier::new(secret.clone())),
        (None, None) => {
            tracing::warn!("PAYMENT_WEBHOOK_SECRET not set, using the local development secret");
            Ok(WebhookVerifier::new(LOCAL_WEBHOOK_SECRET))
        }
        (None, Some(_)) => {
            Err("PAYMENT_WEBHOOK_SECRET is required when PAYMENT_GATEWAY_URL is set".into())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Wire the store, gateway, and services
    let store = connect_store(&config).await?;
    let gateway = build_gateway(&config)?;
    let verifier = webhook_verifier(&config)?;
    let admin_token = config.checked_admin_token()?;
    if admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set, admin routes are open in local mode");
    }
    let state = api::AppState::new(
        store,
        gateway,
        verifier,
        config.checkout_settings(),
        admin_token,
    );

    // 4. Build the application
    let app = api::create_app(state, metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}
