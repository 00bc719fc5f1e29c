//! Payment provider vocabulary.
//!
//! Types the lifecycle exchanges with the payment gateway port, plus the two
//! pieces of webhook handling that need no I/O: signature verification and
//! event parsing.

pub mod event;
pub mod session;
pub mod signature;

pub use event::{CHECKOUT_SESSION_COMPLETED, WebhookError, WebhookEvent};
pub use session::{CheckoutLineItem, CheckoutRequest, CheckoutSession, PaymentStatus};
pub use signature::{DEFAULT_TOLERANCE, SignatureError, verify_signature};
