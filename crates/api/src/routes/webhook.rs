//! Payment provider callback endpoint.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct WebhookQuery {
    pub hmac: Option<String>,
}

#[derive(Serialize)]
pub struct Acknowledged {
    pub status: &'static str,
}

/// POST /payment-webhook?hmac=<sig> — apply a transaction-processed callback.
///
/// Anything that authenticates is acknowledged, even when it changes nothing,
/// so the provider stops redelivering it.
#[tracing::instrument(skip_all)]
pub async fn receive(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WebhookQuery>,
    body: Bytes,
) -> Result<Json<Acknowledged>, ApiError> {
    let signature = query.hmac.unwrap_or_default();
    let outcome = state.webhooks.process(&body, &signature).await?;
    tracing::debug!(outcome = outcome.as_str(), "webhook acknowledged");

    Ok(Json(Acknowledged {
        status: "acknowledged",
    }))
}
