//! Stripe Checkout API client.
//!
//! Creates hosted checkout sessions and reads them back to confirm payment.
//! Requests are form-encoded with bearer authentication, as the Stripe REST
//! API expects.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use shopfront_core::lifecycle::ports::{GatewayError, PaymentGateway};
use shopfront_core::payment::{CheckoutRequest, CheckoutSession};

use crate::config::StripeConfig;

/// Errors that can occur when talking to Stripe.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Session ID contains characters Stripe never issues.
    #[error("invalid checkout session id")]
    InvalidSessionId,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: SecretString,
    api_base: String,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.clone(),
        })
    }

    /// Create a hosted checkout session in payment mode.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Stripe rejects it.
    pub async fn create_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .form(&checkout_form(request))
            .send()
            .await?;

        Self::parse(response).await
    }

    /// Fetch a checkout session by ID.
    ///
    /// # Errors
    ///
    /// Returns error if the ID is malformed, the request fails, or Stripe
    /// rejects it.
    pub async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, StripeError> {
        if !is_valid_session_id(session_id) {
            return Err(StripeError::InvalidSessionId);
        }

        let url = format!("{}/v1/checkout/sessions/{session_id}", self.api_base);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;

        Self::parse(response).await
    }

    async fn parse(response: reqwest::Response) -> Result<CheckoutSession, StripeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(body);
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

impl PaymentGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        self.create_session(request)
            .await
            .map_err(|e| GatewayError(Box::new(e)))
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, GatewayError> {
        self.retrieve_session(session_id)
            .await
            .map_err(|e| GatewayError(Box::new(e)))
    }
}

/// Flatten a checkout request into Stripe's bracketed form encoding.
fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];

    if let Some(email) = &request.customer_email {
        form.push(("customer_email".to_string(), email.to_string()));
    }

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        form.push((
            format!("{prefix}[price_data][currency]"),
            request.currency.clone(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            item.name.clone(),
        ));
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            item.unit_amount.to_string(),
        ));
        form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
    }

    form
}

fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 255 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopfront_core::Email;
    use shopfront_core::payment::CheckoutLineItem;

    use super::*;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            currency: "usd".to_string(),
            line_items: vec![
                CheckoutLineItem {
                    name: "Mug".to_string(),
                    unit_amount: 1000,
                    quantity: 2,
                },
                CheckoutLineItem {
                    name: "Tea".to_string(),
                    unit_amount: 500,
                    quantity: 1,
                },
            ],
            success_url: "https://shop.test/checkout/success?session_id={CHECKOUT_SESSION_ID}"
                .to_string(),
            cancel_url: "https://shop.test/cart".to_string(),
            customer_email: Some(Email::parse("ada@shop.test").unwrap()),
        }
    }

    fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_checkout_form_encodes_line_items() {
        let form = checkout_form(&request());

        assert_eq!(field(&form, "mode"), Some("payment"));
        assert_eq!(field(&form, "customer_email"), Some("ada@shop.test"));
        assert_eq!(field(&form, "line_items[0][price_data][unit_amount]"), Some("1000"));
        assert_eq!(field(&form, "line_items[0][quantity]"), Some("2"));
        assert_eq!(
            field(&form, "line_items[1][price_data][product_data][name]"),
            Some("Tea")
        );
        assert_eq!(field(&form, "line_items[1][price_data][currency]"), Some("usd"));
        assert!(field(&form, "success_url").unwrap().contains("{CHECKOUT_SESSION_ID}"));
    }

    #[test]
    fn test_session_id_validation() {
        assert!(is_valid_session_id("cs_test_a1B2c3"));
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("cs_test/../../v1/customers"));
        assert!(!is_valid_session_id("cs test"));
    }
}
