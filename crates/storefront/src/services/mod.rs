//! Adapters behind the lifecycle ports.
//!
//! # Services
//!
//! - `stripe` - Hosted checkout sessions (`PaymentGateway`)
//! - `email` - SMTP delivery (`MessageSender`)
//! - `invoice` - HTML invoice rendering (`InvoiceRenderer`)

pub mod email;
pub mod invoice;
pub mod stripe;

pub use email::{EmailError, EmailService};
pub use invoice::HtmlInvoiceRenderer;
pub use stripe::{StripeClient, StripeError};
