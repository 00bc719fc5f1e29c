//! Session-held models for storefront.

pub mod session;

pub use session::{CurrentUser, keys as session_keys, load_cart, save_cart};
