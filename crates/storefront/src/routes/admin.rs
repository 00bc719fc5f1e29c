//! Admin route handlers.
//!
//! Catalog maintenance, the order ledger and shipping updates. Every handler
//! takes [`RequireAdmin`], so buyers get 403 and anonymous callers 401.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use shopfront_core::lifecycle::{NotificationStatus, ShippingOutcome};
use shopfront_core::shipping::StageChange;
use shopfront_core::{Order, OrderId, Product, ProductDraft, ProductId};

use crate::db::{OrderRepository, ProductRepository, SalesSummary, UserRepository};
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Orders listed on the admin dashboard.
const DASHBOARD_RECENT: i64 = 10;

/// Store summary for the admin dashboard.
#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub user_count: i64,
    pub product_count: i64,
    #[serde(flatten)]
    pub sales: SalesSummary,
    pub recent_orders: Vec<Order>,
}

/// Body of a shipping update.
#[derive(Debug, Deserialize)]
pub struct ShippingRequest {
    pub status: Option<String>,
}

/// Result of a shipping update.
#[derive(Debug, Serialize)]
pub struct ShippingResponse {
    /// `updated` or `already_in_stage`.
    pub outcome: &'static str,
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<StageChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationStatus>,
}

impl From<ShippingOutcome> for ShippingResponse {
    fn from(outcome: ShippingOutcome) -> Self {
        match outcome {
            ShippingOutcome::Updated {
                order,
                change,
                notification,
            } => Self {
                outcome: "updated",
                order,
                change: Some(change),
                notification: Some(notification),
            },
            ShippingOutcome::AlreadyInStage { order } => Self {
                outcome: "already_in_stage",
                order,
                change: None,
                notification: None,
            },
        }
    }
}

#[instrument(skip(state, _admin))]
pub async fn list_products(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(ProductRepository::new(state.pool()).list().await?))
}

/// Create a product.
#[instrument(skip(state, admin, draft), fields(admin_id = %admin.id))]
pub async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(draft): Json<ProductDraft>,
) -> Result<(StatusCode, Json<Product>)> {
    let draft = draft.validate()?;
    let product = ProductRepository::new(state.pool()).create(&draft).await?;

    tracing::info!(product_id = %product.id, name = %product.name, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Replace a product's fields.
#[instrument(skip(state, admin, draft), fields(admin_id = %admin.id))]
pub async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
    Json(draft): Json<ProductDraft>,
) -> Result<Json<Product>> {
    let draft = draft.validate()?;
    let product = ProductRepository::new(state.pool())
        .update(ProductId::new(id), &draft)
        .await?;

    tracing::info!(product_id = %product.id, "Product updated");
    Ok(Json(product))
}

/// Delete a product. Existing orders keep their snapshots.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool())
        .delete(ProductId::new(id))
        .await?;

    tracing::info!(product_id = id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Every order, newest first.
#[instrument(skip(state, _admin))]
pub async fn list_orders(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(
        OrderRepository::new(state.pool()).list_recent(None).await?,
    ))
}

#[instrument(skip(state, _admin))]
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<AdminDashboard>> {
    let pool = state.pool();
    let orders = OrderRepository::new(pool);

    Ok(Json(AdminDashboard {
        user_count: UserRepository::new(pool).count().await?,
        product_count: ProductRepository::new(pool).count().await?,
        sales: orders.sales_summary().await?,
        recent_orders: orders.list_recent(Some(DASHBOARD_RECENT)).await?,
    }))
}

/// Move an order to the requested shipping stage and email its owner.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn update_shipping(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
    Json(body): Json<ShippingRequest>,
) -> Result<Json<ShippingResponse>> {
    let outcome = state
        .lifecycle()
        .update_shipping(OrderId::new(id), body.status.as_deref(), Utc::now())
        .await?;

    if let ShippingOutcome::Updated { change, .. } = &outcome {
        add_breadcrumb(
            "shipping",
            "Order shipping updated",
            Some(&[("to", change.to.label())]),
        );
    }
    Ok(Json(outcome.into()))
}

/// Result of a confirmation resend.
#[derive(Debug, Serialize)]
pub struct ConfirmationResponse {
    pub order_id: OrderId,
    pub notification: NotificationStatus,
}

/// Send an order's confirmation email again after a failed delivery.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn resend_confirmation(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<Json<ConfirmationResponse>> {
    let order_id = OrderId::new(id);
    let notification = state.lifecycle().resend_confirmation(order_id).await?;

    add_breadcrumb(
        "notification",
        "Order confirmation resent",
        Some(&[("order_id", &order_id.to_string())]),
    );
    Ok(Json(ConfirmationResponse {
        order_id,
        notification,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopfront_core::{Price, ShippingStage, ShippingState, UserId};

    use super::*;

    fn order() -> Order {
        Order::from_storage(
            OrderId::new(3),
            UserId::new(1),
            Utc::now(),
            Price::from_minor_units(900).unwrap(),
            true,
            ShippingState::initial(Utc::now()),
            Some("cs_test_3".to_string()),
            Vec::new(),
        )
    }

    #[test]
    fn test_already_in_stage_serializes_without_change() {
        let response = ShippingResponse::from(ShippingOutcome::AlreadyInStage { order: order() });
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["outcome"], "already_in_stage");
        assert!(json.get("change").is_none());
        assert!(json.get("notification").is_none());
    }

    #[test]
    fn test_updated_reports_change_and_notification() {
        let response = ShippingResponse::from(ShippingOutcome::Updated {
            order: order(),
            change: StageChange {
                from: ShippingStage::Processing,
                to: ShippingStage::Shipped,
                at: Utc::now(),
            },
            notification: NotificationStatus::Sent,
        });
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["outcome"], "updated");
        assert_eq!(json["notification"]["status"], "sent");
    }

    #[test]
    fn test_confirmation_response_reports_failure_reason() {
        let response = ConfirmationResponse {
            order_id: OrderId::new(3),
            notification: NotificationStatus::Failed("smtp down".to_string()),
        };
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["order_id"], 3);
        assert_eq!(json["notification"]["status"], "failed");
        assert_eq!(json["notification"]["reason"], "smtp down");
    }
}
