//! Webhook event payloads.

use serde::Deserialize;

use super::session::PaymentStatus;

/// The only event type the lifecycle acts on.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// A webhook body that is not a usable event.
#[derive(thiserror::Error, Debug)]
pub enum WebhookError {
    #[error("invalid webhook payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// A verified webhook event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebhookEvent {
    /// Provider event ID, used only for logging.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventData {
    pub object: SessionObject,
}

/// The fields of the nested session object the lifecycle reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

impl WebhookEvent {
    /// Parse a raw webhook body. Call only after the signature has checked out.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Payload` if the body is not an event object.
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Whether this event reports a completed, paid checkout.
    #[must_use]
    pub fn is_paid_checkout(&self) -> bool {
        self.event_type == CHECKOUT_SESSION_COMPLETED
            && self
                .data
                .object
                .payment_status
                .as_ref()
                .is_some_and(PaymentStatus::is_paid)
    }

    /// Checkout session id carried by the event, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.data
            .object
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completed_checkout() {
        let body = br#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_test_1", "object": "checkout.session", "payment_status": "paid"}}
        }"#;

        let event = WebhookEvent::parse(body).unwrap();

        assert!(event.is_paid_checkout());
        assert_eq!(event.session_id(), Some("cs_test_1"));
    }

    #[test]
    fn test_unpaid_or_other_events_are_not_paid_checkouts() {
        let unpaid = br#"{"type":"checkout.session.completed","data":{"object":{"id":"cs_1","payment_status":"unpaid"}}}"#;
        let other = br#"{"type":"invoice.paid","data":{"object":{"id":"in_1","payment_status":"paid"}}}"#;
        let odd = br#"{"type":"checkout.session.completed","data":{"object":{"id":"cs_2","payment_status":"pending_review"}}}"#;

        assert!(!WebhookEvent::parse(unpaid).unwrap().is_paid_checkout());
        assert!(!WebhookEvent::parse(other).unwrap().is_paid_checkout());
        assert!(!WebhookEvent::parse(odd).unwrap().is_paid_checkout());
    }

    #[test]
    fn test_missing_session_id() {
        let body = br#"{"type":"checkout.session.completed","data":{"object":{"payment_status":"paid"}}}"#;
        let event = WebhookEvent::parse(body).unwrap();
        assert!(event.is_paid_checkout());
        assert_eq!(event.session_id(), None);
    }

    #[test]
    fn test_malformed_payload() {
        assert!(WebhookEvent::parse(b"not json").is_err());
        assert!(WebhookEvent::parse(br#"{"type":"x"}"#).is_err());
    }
}
