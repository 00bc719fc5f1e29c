//! Buyer and admin identity as seen by the lifecycle.

use serde::{Deserialize, Serialize};

use crate::types::{Email, UserId};

/// A store user.
///
/// Login and registration live outside this crate; the lifecycle only needs
/// to know who owns an order, where to mail them, and whether they may run
/// admin operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub username: String,
    /// Notification address.
    pub email: Email,
    /// Whether the user may manage products and orders.
    pub is_admin: bool,
}
