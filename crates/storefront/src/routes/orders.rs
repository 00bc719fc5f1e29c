//! Buyer order route handlers.
//!
//! Buyers only ever see their own orders; someone else's order ID answers
//! 404 exactly like a missing one.

use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use serde::Serialize;
use tracing::instrument;

use shopfront_core::{Order, OrderId};

use crate::db::{BuyerSummary, OrderRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::invoice::{INVOICE_CONTENT_TYPE, invoice_filename};
use crate::state::AppState;

/// Buyer dashboard.
#[derive(Debug, Serialize)]
pub struct DashboardView {
    #[serde(flatten)]
    pub summary: BuyerSummary,
    pub recent_orders: Vec<Order>,
}

/// Orders shown on the buyer dashboard.
const DASHBOARD_RECENT: usize = 5;

/// List the buyer's orders, newest first.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(orders))
}

/// Show one of the buyer's orders.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
) -> Result<Json<Order>> {
    let order = own_order(&state, OrderId::new(id), &user).await?;
    Ok(Json(order))
}

/// Download the invoice document for one of the buyer's orders.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn invoice(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let order = own_order(&state, OrderId::new(id), &user).await?;
    let html = state
        .invoices()
        .render_html(&order, &user)
        .map_err(|e| AppError::Internal(format!("invoice render failed: {e}")))?;

    let disposition = format!("attachment; filename=\"{}\"", invoice_filename(&order));
    Ok((
        [
            (header::CONTENT_TYPE, INVOICE_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        html,
    ))
}

/// Spending summary and the latest few orders.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<DashboardView>> {
    let repo = OrderRepository::new(state.pool());
    let summary = repo.buyer_summary(user.id).await?;
    let mut recent_orders = repo.list_for_user(user.id).await?;
    recent_orders.truncate(DASHBOARD_RECENT);

    Ok(Json(DashboardView {
        summary,
        recent_orders,
    }))
}

async fn own_order(state: &AppState, id: OrderId, user: &shopfront_core::User) -> Result<Order> {
    OrderRepository::new(state.pool())
        .get_for_user(id, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}
