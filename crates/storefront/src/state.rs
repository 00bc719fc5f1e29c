//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::ExposeSecret;
use sqlx::PgPool;

use shopfront_core::lifecycle::{Lifecycle, LifecycleSettings};

use crate::config::StorefrontConfig;
use crate::db::PgStore;
use crate::services::email::EmailService;
use crate::services::invoice::HtmlInvoiceRenderer;
use crate::services::stripe::{StripeClient, StripeError};

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("stripe client: {0}")]
    Stripe(#[from] StripeError),
    #[error("smtp transport: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// The lifecycle wired to production adapters.
pub type AppLifecycle<'a> = Lifecycle<'a, PgStore, StripeClient, HtmlInvoiceRenderer, EmailService>;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    store: PgStore,
    stripe: StripeClient,
    email: EmailService,
    invoices: HtmlInvoiceRenderer,
    lifecycle_settings: LifecycleSettings,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the Stripe client or SMTP transport cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let stripe = StripeClient::new(&config.stripe)?;
        let email = EmailService::new(&config.email)?;
        let invoices = HtmlInvoiceRenderer::new(config.store.name.clone());
        let lifecycle_settings = LifecycleSettings::new(
            config.store.name.clone(),
            config.store.currency.clone(),
            config.stripe.webhook_secret.expose_secret(),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                store: PgStore::new(pool.clone()),
                config,
                pool,
                stripe,
                email,
                invoices,
                lifecycle_settings,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn invoices(&self) -> &HtmlInvoiceRenderer {
        &self.inner.invoices
    }

    /// The order lifecycle over Postgres, Stripe, askama and SMTP.
    #[must_use]
    pub fn lifecycle(&self) -> AppLifecycle<'_> {
        Lifecycle::new(
            &self.inner.store,
            &self.inner.stripe,
            &self.inner.invoices,
            &self.inner.email,
            &self.inner.lifecycle_settings,
        )
    }
}
