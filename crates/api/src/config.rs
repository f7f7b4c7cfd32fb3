//! Application configuration loaded from environment variables.

use std::time::Duration;

use checkout::{CheckoutSettings, HttpGatewayConfig};
use domain::Money;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `DATABASE_URL` — PostgreSQL URL; unset runs on the in-memory store
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `10`)
/// - `STORE_TIMEOUT_MS` — per unit of work and pool acquire (default: `5000`)
/// - `PAYMENT_GATEWAY_URL` — provider base URL; unset uses the in-memory gateway
/// - `PAYMENT_GATEWAY_API_KEY` — provider API key
/// - `PAYMENT_GATEWAY_TIMEOUT_MS` — per gateway call (default: `10000`)
/// - `PAYMENT_WEBHOOK_SECRET` — HMAC secret for provider callbacks
/// - `SHIPPING_PRICE_CENTS` — flat shipping price (default: `5000`)
/// - `CURRENCY` — ISO currency code (default: `"EGP"`)
/// - `ADMIN_TOKEN` — required `x-admin-token` for admin routes; mandatory outside local mode
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub store_timeout: Duration,
    pub payment_gateway_url: Option<String>,
    pub payment_gateway_api_key: String,
    pub payment_gateway_timeout: Duration,
    pub payment_webhook_secret: Option<String>,
    pub shipping_price: Money,
    pub currency: String,
    pub admin_token: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    ///
    /// Empty values count as unset. Unparseable numbers fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match var("LOG_FORMAT") {
                Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => defaults.log_format,
            },
            database_url: var("DATABASE_URL"),
            database_max_connections: var("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            store_timeout: var("STORE_TIMEOUT_MS")
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),
            payment_gateway_url: var("PAYMENT_GATEWAY_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            payment_gateway_api_key: var("PAYMENT_GATEWAY_API_KEY")
                .unwrap_or(defaults.payment_gateway_api_key),
            payment_gateway_timeout: var("PAYMENT_GATEWAY_TIMEOUT_MS")
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.payment_gateway_timeout),
            payment_webhook_secret: var("PAYMENT_WEBHOOK_SECRET"),
            shipping_price: var("SHIPPING_PRICE_CENTS")
                .and_then(|cents| cents.parse().ok())
                .filter(|cents: &i64| *cents >= 0)
                .map(Money::from_cents)
                .unwrap_or(defaults.shipping_price),
            currency: var("CURRENCY")
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or(defaults.currency),
            admin_token: var("ADMIN_TOKEN"),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True when neither a database nor a payment provider is configured.
    pub fn is_local(&self) -> bool {
        self.database_url.is_none() && self.payment_gateway_url.is_none()
    }

    /// The admin token, which may only be left unset in local mode.
    pub fn checked_admin_token(&self) -> Result<Option<String>, &'static str> {
        match (&self.admin_token, self.is_local()) {
            (Some(token), _) => Ok(Some(token.clone())),
            (None, true) => Ok(None),
            (None, false) => {
                Err("ADMIN_TOKEN is required when DATABASE_URL or PAYMENT_GATEWAY_URL is set")
            }
        }
    }

    /// Settings shared by the checkout services.
    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            shipping_price: self.shipping_price,
            store_timeout: self.store_timeout,
            gateway_timeout: self.payment_gateway_timeout,
            currency: self.currency.clone(),
        }
    }

    /// HTTP gateway settings, when a provider URL is configured.
    pub fn gateway_config(&self) -> Option<HttpGatewayConfig> {
        self.payment_gateway_url
            .as_ref()
            .map(|base_url| HttpGatewayConfig {
                base_url: base_url.clone(),
                api_key: self.payment_gateway_api_key.clone(),
                currency: self.currency.clone(),
                timeout: self.payment_gateway_timeout,
            })
    }
}

impl Default for Config {
    fn default() -> Self {
        let settings = CheckoutSettings::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            store_timeout: settings.store_timeout,
            payment_gateway_url: None,
            payment_gateway_api_key: String::new(),
            payment_gateway_timeout: settings.gateway_timeout,
            payment_webhook_secret: None,
            shipping_price: settings.shipping_price,
            currency: "EGP".to_string(),
            admin_token: None,
        }
    }
}
