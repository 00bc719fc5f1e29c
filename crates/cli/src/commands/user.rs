//! User management commands.
//!
//! Sign-in lives outside this service, so the CLI is how accounts (and in
//! particular admin accounts) come into existence.
//!
//! ```bash
//! shopfront-cli user create --username ada --email ada@example.com --admin
//! ```

use sqlx::PgPool;
use thiserror::Error;

use shopfront_core::{Email, User};
use shopfront_storefront::db::{RepositoryError, UserRepository};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Username is blank.
    #[error("Username cannot be empty")]
    EmptyUsername,

    /// Username or email already registered.
    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),
}

/// Create a user.
///
/// # Errors
///
/// Returns an error if the input is invalid, the user already exists, or the
/// insert fails.
pub async fn create(
    pool: &PgPool,
    username: &str,
    email: &str,
    is_admin: bool,
) -> Result<User, UserError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(UserError::EmptyUsername);
    }
    let email = Email::parse(email).map_err(|_| UserError::InvalidEmail(email.to_owned()))?;

    let user = UserRepository::new(pool)
        .create(username, &email, is_admin)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => UserError::UserExists(username.to_owned()),
            other => UserError::Database(other),
        })?;

    tracing::info!(user_id = %user.id, username = %user.username, is_admin, "User created");
    Ok(user)
}
