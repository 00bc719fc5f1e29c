//! Database operations for storefront `PostgreSQL`.
//!
//! # Database: `shopfront`
//!
//! ## Tables
//!
//! - `users` - Buyers and admins
//! - `products` - Catalog
//! - `orders` - Order headers with paid flag, shipping stage and checkout session id
//! - `order_items` - Line-item snapshots, `product_id` nulled when a product is deleted
//! - `tower_sessions.session` - Tower-sessions storage (carts, current user)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p shopfront-cli -- migrate
//! ```

pub mod orders;
pub mod products;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use shopfront_core::lifecycle::ports::{OrderStore, StoreError, UserDirectory};
use shopfront_core::{NewOrder, Order, OrderId, ShippingStage, ShippingState, User, UserId};

pub use orders::{BuyerSummary, OrderRepository, SalesSummary};
pub use products::ProductRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique checkout session).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, keep everything else.
    pub(crate) fn from_write(err: sqlx::Error, what: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(format!("{what} already exists"))
            }
            _ => Self::Database(err),
        }
    }
}

impl From<RepositoryError> for StoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Backend(Box::new(other)),
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// The order ledger and user directory the lifecycle runs against.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn orders(&self) -> OrderRepository<'_> {
        OrderRepository::new(&self.pool)
    }
}

impl OrderStore for PgStore {
    async fn create_order(&self, order: &NewOrder) -> Result<Order, StoreError> {
        Ok(self.orders().create(order).await?)
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.orders().get(id).await?)
    }

    async fn order_by_payment_session(&self, session_id: &str) -> Result<Option<Order>, StoreError> {
        Ok(self.orders().get_by_payment_session(session_id).await?)
    }

    async fn most_recent_unpaid(&self) -> Result<Option<Order>, StoreError> {
        Ok(self.orders().most_recent_unpaid().await?)
    }

    async fn mark_paid(&self, id: OrderId) -> Result<bool, StoreError> {
        Ok(self.orders().mark_paid(id).await?)
    }

    async fn save_shipping(
        &self,
        id: OrderId,
        expected: ShippingStage,
        state: &ShippingState,
    ) -> Result<bool, StoreError> {
        Ok(self.orders().save_shipping(id, expected, state).await?)
    }
}

impl UserDirectory for PgStore {
    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(UserRepository::new(&self.pool).get_by_id(id).await?)
    }
}
