//! Shopfront Storefront library.
//!
//! The HTTP boundary around `shopfront_core`: Postgres repositories, the
//! Stripe, SMTP and invoice adapters behind the core's ports, session
//! handling and the axum routes. Exposed as a library so the binary and the
//! tests share it.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
