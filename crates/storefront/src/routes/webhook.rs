//! Payment provider webhook.
//!
//! The raw body is verified against the `Stripe-Signature` header before it
//! is parsed; nothing is read or written for an unsigned delivery.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use chrono::Utc;
use tracing::instrument;

use shopfront_core::lifecycle::WebhookOutcome;

use crate::error::Result;
use crate::state::AppState;

/// Header carrying the `t=...,v1=...` signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Apply a checkout event.
#[instrument(skip_all, fields(body_len = body.len()))]
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookOutcome>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state
        .lifecycle()
        .apply_webhook(&body, signature, Utc::now())
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Webhook rejected"))?;

    Ok(Json(outcome))
}
