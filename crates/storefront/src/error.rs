//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use shopfront_core::ProductError;
use shopfront_core::lifecycle::LifecycleError;
use thiserror::Error;

use crate::db::RepositoryError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Checkout, payment or shipping operation failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Admin product input was invalid.
    #[error(transparent)]
    Product(#[from] ProductError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error is the server's fault and should reach Sentry.
    fn is_server_error(&self) -> bool {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => true,
            Self::Lifecycle(err) => matches!(
                err,
                LifecycleError::Store(_)
                    | LifecycleError::Gateway(_)
                    | LifecycleError::Price(_)
                    | LifecycleError::UserNotFound(_)
            ),
            _ => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Lifecycle(err) => match err {
                LifecycleError::EmptyCart
                | LifecycleError::MissingSessionId
                | LifecycleError::PaymentIncomplete(_)
                | LifecycleError::InvalidOrder(_)
                | LifecycleError::Shipping(_)
                | LifecycleError::Webhook(_) => StatusCode::BAD_REQUEST,
                LifecycleError::Signature(_) => StatusCode::UNAUTHORIZED,
                LifecycleError::OrderNotFound => StatusCode::NOT_FOUND,
                LifecycleError::ShippingConflict(_) | LifecycleError::OrderUnpaid(_) => {
                    StatusCode::CONFLICT
                }
                LifecycleError::Gateway(_) => StatusCode::BAD_GATEWAY,
                LifecycleError::Price(_)
                | LifecycleError::UserNotFound(_)
                | LifecycleError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Product(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Client-facing message. Internal details are never exposed.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Lifecycle(err) => match err {
                LifecycleError::Signature(_) => "Invalid signature".to_string(),
                LifecycleError::Webhook(_) => "Invalid payload".to_string(),
                LifecycleError::Gateway(_) => "Payment provider error".to_string(),
                LifecycleError::Price(_)
                | LifecycleError::UserNotFound(_)
                | LifecycleError::Store(_) => "Internal server error".to_string(),
                _ => err.to_string(),
            },
            Self::Product(err) => err.to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let status = self.status();
        let body = Json(json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this once the session user is known so errors are associated with them.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for buyer and admin actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
