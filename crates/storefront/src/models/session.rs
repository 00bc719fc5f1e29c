//! Session-related types.
//!
//! The session carries two things between requests: who is signed in and
//! their cart. Both are written by handlers and read back on the next request.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use shopfront_core::{Cart, UserId};

/// Session-stored user identity.
///
/// Only the ID is kept; the full user is loaded from the database on each
/// authenticated request so admin changes take effect immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the buyer's cart.
    pub const CART: &str = "cart";
}

/// Load the cart, or an empty one if the session has none yet.
///
/// # Errors
///
/// Returns an error if the session store cannot be read.
pub async fn load_cart(session: &Session) -> Result<Cart, tower_sessions::session::Error> {
    Ok(session.get::<Cart>(keys::CART).await?.unwrap_or_default())
}

/// Write the cart back to the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CART, cart).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use shopfront_core::{Price, Product, ProductId};
    use tower_sessions::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_cart_round_trips_through_session() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        assert!(load_cart(&session).await.unwrap().is_empty());

        let mut cart = Cart::new();
        cart.add(&Product {
            id: ProductId::new(3),
            name: "Mug".to_string(),
            price: Price::from_minor_units(1200).unwrap(),
            description: None,
            image: None,
        });
        save_cart(&session, &cart).await.unwrap();

        assert_eq!(load_cart(&session).await.unwrap(), cart);
    }
}
