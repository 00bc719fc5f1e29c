//! Cart route handlers.
//!
//! The cart lives in the session. Every view reconciles it against the
//! catalog first, so products deleted since they were added disappear and the
//! buyer is told which ones went.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use shopfront_core::{Cart, CartLine, Price, ProductId};

use crate::db::ProductRepository;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::{load_cart, save_cart};
use crate::state::AppState;

/// Cart as returned to the client.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub item_count: u32,
    pub total: Price,
    /// Products dropped because they left the catalog.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<ProductId>,
}

impl CartView {
    fn new(cart: &Cart, removed: Vec<ProductId>) -> Self {
        Self {
            lines: cart.lines().to_vec(),
            item_count: cart.item_count(),
            total: cart.total(),
            removed,
        }
    }
}

/// Show the reconciled cart.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    let catalog = ProductRepository::new(state.pool()).existing_ids().await?;

    let removed = cart.reconcile(&catalog);
    if !removed.is_empty() {
        tracing::info!(removed = ?removed, "Dropped unavailable products from cart");
        save_cart(&session, &cart).await?;
    }

    Ok(Json(CartView::new(&cart, removed)))
}

/// Add one unit of a product.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<i64>,
) -> Result<Json<CartView>> {
    let product = ProductRepository::new(state.pool())
        .get(ProductId::new(product_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;

    let mut cart = load_cart(&session).await?;
    cart.add(&product);
    save_cart(&session, &cart).await?;

    add_breadcrumb("cart", "Added product", Some(&[("product", product.name.as_str())]));
    Ok(Json(CartView::new(&cart, Vec::new())))
}

/// Remove a product's line. Removing something not in the cart is a no-op.
#[instrument(skip(session))]
pub async fn remove(session: Session, Path(product_id): Path<i64>) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.remove(ProductId::new(product_id));
    save_cart(&session, &cart).await?;

    Ok(Json(CartView::new(&cart, Vec::new())))
}

/// Empty the cart.
#[instrument(skip(session))]
pub async fn clear(session: Session) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.clear();
    save_cart(&session, &cart).await?;

    Ok(Json(CartView::new(&cart, Vec::new())))
}
