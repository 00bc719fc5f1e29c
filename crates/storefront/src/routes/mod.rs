//! HTTP route handlers for storefront.
//!
//! Every route speaks JSON.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                       - Liveness
//! GET  /health/ready                 - Readiness (database reachable)
//!
//! # Catalog
//! GET  /products                     - Product listing
//! GET  /products/{id}                - Product detail
//!
//! # Cart (session)
//! GET  /cart                         - Reconciled cart
//! POST /cart/add/{product_id}        - Add one unit
//! POST /cart/remove/{product_id}     - Remove the whole line
//! POST /cart/clear                   - Empty the cart
//!
//! # Checkout (requires auth)
//! POST /checkout                     - Open a hosted checkout session
//! GET  /checkout/success             - Return from the hosted page
//!
//! # Payment provider
//! POST /webhooks/stripe              - Signed checkout events
//!
//! # Buyer (requires auth)
//! GET  /orders                       - Own orders, newest first
//! GET  /orders/{id}                  - Own order
//! GET  /orders/{id}/invoice          - Own invoice document
//! GET  /dashboard                    - Spending summary
//!
//! # Admin (requires admin)
//! GET  /admin/products               - Product listing
//! POST /admin/products               - Create product
//! PUT  /admin/products/{id}          - Replace product
//! DELETE /admin/products/{id}        - Delete product
//! GET  /admin/orders                 - All orders, newest first
//! GET  /admin/dashboard              - Store summary
//! POST /admin/orders/{id}/shipping   - Move an order to a shipping stage
//! POST /admin/orders/{id}/confirmation - Resend the confirmation email
//! ```

pub mod admin;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod products;
pub mod webhook;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add/{product_id}", post(cart::add))
        .route("/remove/{product_id}", post(cart::remove))
        .route("/clear", post(cart::clear))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout::start))
        .route("/success", get(checkout::success))
}

/// Create the buyer order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/invoice", get(orders::invoice))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/products",
            get(admin::list_products).post(admin::create_product),
        )
        .route(
            "/products/{id}",
            put(admin::update_product).delete(admin::delete_product),
        )
        .route("/orders", get(admin::list_orders))
        .route("/orders/{id}/shipping", post(admin::update_shipping))
        .route("/orders/{id}/confirmation", post(admin::resend_confirmation))
        .route("/dashboard", get(admin::dashboard))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .route("/webhooks/stripe", post(webhook::stripe))
        .nest("/orders", order_routes())
        .route("/dashboard", get(orders::dashboard))
        .nest("/admin", admin_routes())
}
