//! Checkout route handlers.
//!
//! `POST /checkout` opens a hosted payment page for the session cart.
//! The provider sends the buyer back to `/checkout/success?session_id=...`,
//! where the paid session becomes an order. A refresh of that page finds the
//! order already recorded and changes nothing.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use shopfront_core::Order;
use shopfront_core::lifecycle::{CheckoutStarted, CheckoutUrls, NotificationStatus, RedirectOutcome};

use crate::db::ProductRepository;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::{load_cart, save_cart};
use crate::state::AppState;

/// Placeholder the provider replaces with the real session ID.
const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Query string on the success redirect.
#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

/// Body returned by the success redirect.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    /// `created` or `already_recorded`.
    pub outcome: &'static str,
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationStatus>,
}

impl From<RedirectOutcome> for SuccessResponse {
    fn from(outcome: RedirectOutcome) -> Self {
        match outcome {
            RedirectOutcome::Created {
                order,
                notification,
            } => Self {
                outcome: "created",
                order,
                notification: Some(notification),
            },
            RedirectOutcome::AlreadyRecorded { order } => Self {
                outcome: "already_recorded",
                order,
                notification: None,
            },
        }
    }
}

fn checkout_urls(base_url: &str) -> CheckoutUrls {
    CheckoutUrls {
        success_url: format!("{base_url}/checkout/success?session_id={SESSION_ID_PLACEHOLDER}"),
        cancel_url: format!("{base_url}/cart"),
    }
}

/// Open a checkout session and hand back the page to redirect to.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn start(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CheckoutStarted>> {
    let mut cart = load_cart(&session).await?;
    let catalog = ProductRepository::new(state.pool()).existing_ids().await?;

    let started = state
        .lifecycle()
        .begin_checkout(&user, &mut cart, &catalog, checkout_urls(&state.config().base_url))
        .await;

    // Reconciliation may have dropped lines even if checkout failed.
    save_cart(&session, &cart).await?;
    let started = started?;

    add_breadcrumb(
        "checkout",
        "Checkout session created",
        Some(&[("session_id", started.session_id.as_str())]),
    );
    Ok(Json(started))
}

/// Record the order for a paid session.
#[instrument(skip(state, session, user, query), fields(user_id = %user.id))]
pub async fn success(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Query(query): Query<SuccessQuery>,
) -> Result<Json<SuccessResponse>> {
    let mut cart = load_cart(&session).await?;
    let catalog = ProductRepository::new(state.pool()).existing_ids().await?;
    let session_id = query.session_id.unwrap_or_default();

    let outcome = state
        .lifecycle()
        .complete_from_redirect(&user, &mut cart, &catalog, &session_id)
        .await;

    save_cart(&session, &cart).await?;
    let outcome = outcome?;

    if let RedirectOutcome::Created { order, .. } = &outcome {
        tracing::info!(order_id = %order.id, total = %order.total(), "Order placed");
    }
    Ok(Json(outcome.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_urls_carry_session_placeholder() {
        let urls = checkout_urls("https://shop.test");
        assert_eq!(
            urls.success_url,
            "https://shop.test/checkout/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(urls.cancel_url, "https://shop.test/cart");
    }
}
