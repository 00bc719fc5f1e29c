//! Shopfront Core - order lifecycle library.
//!
//! This crate holds the part of the storefront that has to be right: turning a
//! session cart into exactly one paid order, walking that order through its
//! shipping stages, and building the notifications each step owes the buyer.
//!
//! # Architecture
//!
//! The core performs no I/O of its own. Storage, the payment provider, the
//! invoice renderer and the mail transport are reached through the port traits
//! in [`lifecycle::ports`]; the `storefront` crate supplies the production
//! implementations and the integration tests supply in-memory ones.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, emails and shipping stages
//! - [`product`] - Catalog product records
//! - [`cart`] - Session cart value and its operations
//! - [`order`] - Orders, line items and construction-time invariants
//! - [`shipping`] - Shipping stage state machine
//! - [`notification`] - Email payload assembly
//! - [`payment`] - Checkout session types, webhook parsing and signature checks
//! - [`lifecycle`] - Payment reconciliation and shipping updates over the ports

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod lifecycle;
pub mod notification;
pub mod order;
pub mod payment;
pub mod product;
pub mod shipping;
pub mod types;
pub mod user;

pub use cart::{Cart, CartLine, Catalog};
pub use product::{Product, ProductDraft, ProductError};
pub use order::{NewOrder, NewOrderItem, Order, OrderError, OrderItem, ShippingState};
pub use types::*;
pub use user::User;
