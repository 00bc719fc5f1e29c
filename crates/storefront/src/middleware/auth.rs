//! Authentication extractors.
//!
//! Sign-in itself happens elsewhere; whatever signs the buyer in stores a
//! [`CurrentUser`] under [`session_keys::CURRENT_USER`] via
//! [`set_current_user`]. These extractors read it back and load the full user
//! so every request sees the current admin flag.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use shopfront_core::User;

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Extractor that requires a signed-in user. Rejects with 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn my_orders(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct RequireAuth(pub User);

/// Extractor that requires a signed-in admin. Rejects with 401 or 403.
pub struct RequireAdmin(pub User);

/// Extractor for routes that behave differently when someone is signed in.
pub struct OptionalAuth(pub Option<User>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(session) = parts.extensions.get::<Session>() else {
            return Ok(Self(None));
        };

        let Some(current) = session
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await?
        else {
            return Ok(Self(None));
        };

        let user = UserRepository::new(state.pool())
            .get_by_id(current.id)
            .await?;

        if user.is_none() {
            // The account is gone; drop the stale identity.
            tracing::warn!(user_id = %current.id, "Session refers to a missing user");
            clear_current_user(session).await?;
        }

        if let Some(user) = &user {
            set_sentry_user(&user.id);
        }

        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let OptionalAuth(user) = OptionalAuth::from_request_parts(parts, state).await?;
        user.map(Self).ok_or_else(|| AppError::Unauthorized("sign in required".to_string()))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.is_admin {
            tracing::warn!(user_id = %user.id, "Non-admin attempted an admin route");
            return Err(AppError::Forbidden("admin access required".to_string()));
        }
        Ok(Self(user))
    }
}

/// Record who is signed in on this session.
///
/// The session ID is cycled first so a pre-login cookie cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &User,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .insert(session_keys::CURRENT_USER, CurrentUser { id: user.id })
        .await
}

/// Forget the signed-in user, keeping the cart.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    Ok(())
}
