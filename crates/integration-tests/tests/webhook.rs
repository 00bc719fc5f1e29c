//! Integration tests for the payment webhook.
//!
//! Unsigned or stale deliveries must be turned away before the ledger is
//! touched, and signed ones only ever flip the paid flag.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use shopfront_core::lifecycle::{LifecycleError, WebhookOutcome};
use shopfront_core::payment::SignatureError;
use shopfront_core::{NewOrder, Order};
use shopfront_integration_tests::{Harness, WEBHOOK_SECRET, completed_event, example_cart, sign};

fn pending_order(h: &Harness, session_id: Option<&str>) -> Order {
    let user = h.store.add_user(&format!("buyer{}", h.store.orders().len()), false);
    h.store.insert_order(
        &NewOrder::from_cart(user.id, &example_cart(), session_id.map(str::to_owned)).unwrap(),
    )
}

async fn deliver(h: &Harness, body: &[u8]) -> Result<WebhookOutcome, LifecycleError> {
    let now = Utc::now();
    let header = sign(body, WEBHOOK_SECRET, now.timestamp());
    h.lifecycle().apply_webhook(body, Some(&header), now).await
}

// =============================================================================
// Signature Rejections
// =============================================================================

#[tokio::test]
async fn test_missing_signature_is_rejected() {
    let h = Harness::new();
    pending_order(&h, Some("cs_test_1"));
    let calls = h.store.calls();

    let result = h
        .lifecycle()
        .apply_webhook(&completed_event(Some("cs_test_1"), "paid"), None, Utc::now())
        .await;

    assert!(matches!(
        result,
        Err(LifecycleError::Signature(SignatureError::MissingHeader))
    ));
    assert_eq!(h.store.calls(), calls);
}

#[tokio::test]
async fn test_tampered_body_is_rejected() {
    let h = Harness::new();
    let order = pending_order(&h, Some("cs_test_1"));
    let calls = h.store.calls();

    let now = Utc::now();
    let signed = completed_event(Some("cs_test_1"), "unpaid");
    let header = sign(&signed, WEBHOOK_SECRET, now.timestamp());
    let tampered = completed_event(Some("cs_test_1"), "paid");

    let result = h
        .lifecycle()
        .apply_webhook(&tampered, Some(&header), now)
        .await;

    assert!(matches!(
        result,
        Err(LifecycleError::Signature(SignatureError::Mismatch))
    ));
    assert_eq!(h.store.calls(), calls);
    assert!(!h.store.order(order.id).unwrap().is_paid);
}

#[tokio::test]
async fn test_wrong_secret_is_rejected() {
    let h = Harness::new();
    pending_order(&h, Some("cs_test_1"));

    let now = Utc::now();
    let body = completed_event(Some("cs_test_1"), "paid");
    let header = sign(&body, "whsec_someone_else", now.timestamp());

    let result = h.lifecycle().apply_webhook(&body, Some(&header), now).await;

    assert!(matches!(
        result,
        Err(LifecycleError::Signature(SignatureError::Mismatch))
    ));
}

#[tokio::test]
async fn test_stale_timestamp_is_rejected() {
    let h = Harness::new();
    pending_order(&h, Some("cs_test_1"));

    let now = Utc::now();
    let body = completed_event(Some("cs_test_1"), "paid");
    let header = sign(&body, WEBHOOK_SECRET, (now - Duration::minutes(10)).timestamp());

    let result = h.lifecycle().apply_webhook(&body, Some(&header), now).await;

    assert!(matches!(
        result,
        Err(LifecycleError::Signature(SignatureError::Expired))
    ));
}

#[tokio::test]
async fn test_signed_garbage_is_a_payload_error() {
    let h = Harness::new();

    let result = deliver(&h, b"not json").await;

    assert!(matches!(result, Err(LifecycleError::Webhook(_))));
    assert_eq!(h.store.calls(), 0);
}

// =============================================================================
// Accepted Deliveries
// =============================================================================

#[tokio::test]
async fn test_paid_event_marks_order_paid_once() {
    let h = Harness::new();
    let order = pending_order(&h, Some("cs_test_1"));
    let body = completed_event(Some("cs_test_1"), "paid");

    let first = deliver(&h, &body).await.unwrap();
    let second = deliver(&h, &body).await.unwrap();

    assert_eq!(first, WebhookOutcome::MarkedPaid { order_id: order.id });
    assert_eq!(second, WebhookOutcome::AlreadyPaid { order_id: order.id });
    assert!(h.store.order(order.id).unwrap().is_paid);
    assert!(h.sender.sent().is_empty());
}

#[tokio::test]
async fn test_session_id_picks_the_right_order() {
    let h = Harness::new();
    let target = pending_order(&h, Some("cs_test_1"));
    let newer = pending_order(&h, Some("cs_test_2"));

    let outcome = deliver(&h, &completed_event(Some("cs_test_1"), "paid"))
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::MarkedPaid { order_id: target.id });
    assert!(!h.store.order(newer.id).unwrap().is_paid);
}

#[tokio::test]
async fn test_event_without_session_falls_back_to_most_recent_unpaid() {
    let h = Harness::new();
    let older = pending_order(&h, None);
    let newer = pending_order(&h, None);

    let outcome = deliver(&h, &completed_event(None, "paid")).await.unwrap();

    assert_eq!(outcome, WebhookOutcome::MarkedPaid { order_id: newer.id });
    assert!(!h.store.order(older.id).unwrap().is_paid);
}

#[tokio::test]
async fn test_unknown_session_matches_nothing() {
    let h = Harness::new();
    let order = pending_order(&h, Some("cs_test_1"));

    let outcome = deliver(&h, &completed_event(Some("cs_test_404"), "paid"))
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::NoMatchingOrder);
    assert!(!h.store.order(order.id).unwrap().is_paid);
}

#[tokio::test]
async fn test_unpaid_and_other_events_are_ignored() {
    let h = Harness::new();
    let order = pending_order(&h, Some("cs_test_1"));

    let unpaid = deliver(&h, &completed_event(Some("cs_test_1"), "unpaid"))
        .await
        .unwrap();
    let other = br#"{"type":"payment_intent.created","data":{"object":{"id":"pi_1"}}}"#;
    let ignored = deliver(&h, other).await.unwrap();

    assert_eq!(
        unpaid,
        WebhookOutcome::Ignored {
            event_type: "checkout.session.completed".to_string()
        }
    );
    assert_eq!(
        ignored,
        WebhookOutcome::Ignored {
            event_type: "payment_intent.created".to_string()
        }
    );
    assert!(!h.store.order(order.id).unwrap().is_paid);
}
