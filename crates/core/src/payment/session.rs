//! Checkout session requests and responses.

use serde::{Deserialize, Serialize};

use crate::types::Email;

/// Payment state of a checkout session as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
    /// A status this build does not know about.
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// Whether the buyer has completed payment.
    #[must_use]
    pub const fn is_paid(&self) -> bool {
        matches!(self, Self::Paid)
    }
}

/// One line of a checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutLineItem {
    pub name: String,
    /// Unit price in the currency's minor units.
    pub unit_amount: i64,
    pub quantity: u32,
}

/// Everything the gateway needs to open a hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    pub currency: String,
    pub line_items: Vec<CheckoutLineItem>,
    /// Where the buyer lands after paying. May contain the provider's
    /// `{CHECKOUT_SESSION_ID}` placeholder.
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<Email>,
}

/// A checkout session as returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted checkout page; absent once the session is complete.
    #[serde(default)]
    pub url: Option<String>,
    pub payment_status: PaymentStatus,
}
