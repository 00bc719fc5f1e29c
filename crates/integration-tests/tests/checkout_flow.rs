//! Integration tests for checkout and the success redirect.
//!
//! A cart goes out to the payment provider, comes back through the redirect
//! and must end up as exactly one paid order and one confirmation email,
//! however many times the buyer refreshes and whenever the webhook arrives.

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use shopfront_core::lifecycle::{
    CheckoutUrls, LifecycleError, NotificationStatus, RedirectOutcome, WebhookOutcome,
};
use shopfront_core::{Cart, NewOrder, OrderId, Price, Product, ProductDraft};
use shopfront_integration_tests::{
    Harness, WEBHOOK_SECRET, catalog, completed_event, example_cart, product, sign,
};

fn urls() -> CheckoutUrls {
    CheckoutUrls {
        success_url: "https://shop.test/checkout/success?session_id={CHECKOUT_SESSION_ID}"
            .to_string(),
        cancel_url: "https://shop.test/cart".to_string(),
    }
}

/// Start checkout and pay for the session; returns its id.
async fn paid_session(h: &Harness, user: &shopfront_core::User, cart: &mut Cart) -> String {
    let started = h
        .lifecycle()
        .begin_checkout(user, cart, catalog().as_slice(), urls())
        .await
        .unwrap();
    h.gateway.pay(&started.session_id);
    started.session_id
}

// =============================================================================
// Begin Checkout
// =============================================================================

#[tokio::test]
async fn test_begin_checkout_sends_minor_units() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);
    let mut cart = example_cart();

    let started = h
        .lifecycle()
        .begin_checkout(&user, &mut cart, catalog().as_slice(), urls())
        .await
        .unwrap();

    assert_eq!(started.redirect_url, format!("https://checkout.test/pay/{}", started.session_id));

    let requests = h.gateway.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.currency, "usd");
    assert_eq!(request.customer_email.as_ref().unwrap().as_str(), "ada@shop.test");
    assert_eq!(request.line_items.len(), 2);
    assert_eq!(request.line_items[0].unit_amount, 1000);
    assert_eq!(request.line_items[0].quantity, 2);
    assert_eq!(request.line_items[1].unit_amount, 500);
    assert_eq!(request.line_items[1].quantity, 1);

    // Checkout alone creates nothing.
    assert!(h.store.orders().is_empty());
    assert_eq!(cart, example_cart());
}

#[tokio::test]
async fn test_begin_checkout_rejects_empty_cart() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);

    let result = h
        .lifecycle()
        .begin_checkout(&user, &mut Cart::new(), catalog().as_slice(), urls())
        .await;

    assert!(matches!(result, Err(LifecycleError::EmptyCart)));
    assert!(h.gateway.requests().is_empty());
}

#[tokio::test]
async fn test_begin_checkout_drops_deleted_products() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);
    let mut cart = example_cart();
    let remaining = vec![catalog().remove(1)];

    h.lifecycle()
        .begin_checkout(&user, &mut cart, remaining.as_slice(), urls())
        .await
        .unwrap();

    assert_eq!(cart.line_count(), 1);
    assert_eq!(cart.total(), Price::from_minor_units(500).unwrap());
    assert_eq!(h.gateway.requests()[0].line_items.len(), 1);
}

#[tokio::test]
async fn test_begin_checkout_with_only_deleted_products_is_empty() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);
    let mut cart = example_cart();
    let nothing: Vec<Product> = Vec::new();

    let result = h
        .lifecycle()
        .begin_checkout(&user, &mut cart, nothing.as_slice(), urls())
        .await;

    assert!(matches!(result, Err(LifecycleError::EmptyCart)));
    assert!(cart.is_empty());
}

#[tokio::test]
async fn test_begin_checkout_refuses_free_product_before_payment() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);

    // Zero is a valid catalog price, but not a purchasable one.
    let draft = ProductDraft {
        name: "Free sticker".to_string(),
        price: Price::from_minor_units(0).unwrap(),
        description: None,
        image: None,
    };
    assert!(draft.validate().is_ok());

    let shelf = vec![product(1, "Mug", 1000), product(3, "Free sticker", 0)];
    let mut cart = Cart::new();
    cart.add(&shelf[0]).add(&shelf[1]);

    let result = h
        .lifecycle()
        .begin_checkout(&user, &mut cart, shelf.as_slice(), urls())
        .await;

    assert!(matches!(result, Err(LifecycleError::InvalidOrder(_))));
    assert!(h.gateway.requests().is_empty());
    assert_eq!(cart.line_count(), 2);
}

// =============================================================================
// Success Redirect
// =============================================================================

#[tokio::test]
async fn test_redirect_creates_one_paid_order() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);
    let mut cart = example_cart();
    let session_id = paid_session(&h, &user, &mut cart).await;

    let outcome = h
        .lifecycle()
        .complete_from_redirect(&user, &mut cart, catalog().as_slice(), &session_id)
        .await
        .unwrap();

    let RedirectOutcome::Created {
        order,
        notification,
    } = outcome
    else {
        panic!("expected a new order");
    };
    assert_eq!(notification, NotificationStatus::Sent);
    assert!(order.is_paid);
    assert_eq!(order.total(), Price::from_minor_units(2500).unwrap());
    assert_eq!(order.items().len(), 2);
    assert_eq!(order.items()[0].product_name, "Mug");
    assert_eq!(order.items()[0].quantity, 2);
    assert_eq!(order.payment_session_id.as_deref(), Some(session_id.as_str()));
    assert!(cart.is_empty());

    let stored = h.store.orders();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].is_paid);

    let sent = h.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, format!("Your Shopfront Order #{} Confirmation", order.id));
    assert_eq!(sent[0].recipient.as_str(), "ada@shop.test");
    let invoice = sent[0].attachment.as_ref().unwrap();
    assert_eq!(invoice.filename, format!("invoice_order_{}.html", order.id));
}

#[tokio::test]
async fn test_redirect_replay_changes_nothing() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);
    let mut cart = example_cart();
    let session_id = paid_session(&h, &user, &mut cart).await;

    let first = h
        .lifecycle()
        .complete_from_redirect(&user, &mut cart, catalog().as_slice(), &session_id)
        .await
        .unwrap();
    let second = h
        .lifecycle()
        .complete_from_redirect(&user, &mut cart, catalog().as_slice(), &session_id)
        .await
        .unwrap();

    assert!(matches!(second, RedirectOutcome::AlreadyRecorded { .. }));
    assert_eq!(second.order().id, first.order().id);
    assert_eq!(h.store.orders().len(), 1);
    assert_eq!(h.sender.sent().len(), 1);
}

#[tokio::test]
async fn test_replay_with_refilled_cart_keeps_original_order() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);
    let mut cart = example_cart();
    let session_id = paid_session(&h, &user, &mut cart).await;

    h.lifecycle()
        .complete_from_redirect(&user, &mut cart, catalog().as_slice(), &session_id)
        .await
        .unwrap();

    let mut new_cart = Cart::new();
    new_cart.add(&catalog()[1]);
    let replay = h
        .lifecycle()
        .complete_from_redirect(&user, &mut new_cart, catalog().as_slice(), &session_id)
        .await
        .unwrap();

    assert_eq!(replay.order().total(), Price::from_minor_units(2500).unwrap());
    assert_eq!(h.store.orders().len(), 1);
}

#[tokio::test]
async fn test_concurrent_redirect_losing_insert_race_is_already_recorded() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);
    let mut cart = example_cart();
    let session_id = paid_session(&h, &user, &mut cart).await;

    let first = h
        .lifecycle()
        .complete_from_redirect(&user, &mut cart, catalog().as_slice(), &session_id)
        .await
        .unwrap();

    // The second request looks before the first has committed, then hits the
    // unique session constraint on insert.
    h.store.miss_next_session_lookup();
    let mut racing_cart = example_cart();
    let second = h
        .lifecycle()
        .complete_from_redirect(&user, &mut racing_cart, catalog().as_slice(), &session_id)
        .await
        .unwrap();

    assert!(matches!(second, RedirectOutcome::AlreadyRecorded { .. }));
    assert_eq!(second.order().id, first.order().id);
    assert!(racing_cart.is_empty());
    assert_eq!(h.store.orders().len(), 1);
    assert_eq!(h.sender.sent().len(), 1);
}

#[tokio::test]
async fn test_redirect_writes_order_paid_out_of_webhook_fallback_reach() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);
    let mut cart = example_cart();
    let session_id = paid_session(&h, &user, &mut cart).await;

    h.lifecycle()
        .complete_from_redirect(&user, &mut cart, catalog().as_slice(), &session_id)
        .await
        .unwrap();
    assert!(h.store.orders()[0].is_paid);

    // A paid event without a session id must not find the order as unpaid.
    let body = completed_event(None, "paid");
    let now = Utc::now();
    let outcome = h
        .lifecycle()
        .apply_webhook(&body, Some(&sign(&body, WEBHOOK_SECRET, now.timestamp())), now)
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::NoMatchingOrder);
}

#[tokio::test]
async fn test_redirect_for_unpaid_session_creates_nothing() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);
    let mut cart = example_cart();
    let started = h
        .lifecycle()
        .begin_checkout(&user, &mut cart, catalog().as_slice(), urls())
        .await
        .unwrap();

    let result = h
        .lifecycle()
        .complete_from_redirect(&user, &mut cart, catalog().as_slice(), &started.session_id)
        .await;

    assert!(matches!(result, Err(LifecycleError::PaymentIncomplete(_))));
    assert!(h.store.orders().is_empty());
    assert!(h.sender.sent().is_empty());
    assert!(!cart.is_empty());
}

#[tokio::test]
async fn test_redirect_without_session_id() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);

    for session_id in ["", "   "] {
        let result = h
            .lifecycle()
            .complete_from_redirect(&user, &mut example_cart(), catalog().as_slice(), session_id)
            .await;
        assert!(matches!(result, Err(LifecycleError::MissingSessionId)));
    }
    assert_eq!(h.store.calls(), 0);
}

#[tokio::test]
async fn test_redirect_with_empty_cart() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);
    let mut cart = example_cart();
    let session_id = paid_session(&h, &user, &mut cart).await;

    let result = h
        .lifecycle()
        .complete_from_redirect(&user, &mut Cart::new(), catalog().as_slice(), &session_id)
        .await;

    assert!(matches!(result, Err(LifecycleError::EmptyCart)));
    assert!(h.store.orders().is_empty());
}

#[tokio::test]
async fn test_redirect_for_another_users_session_is_not_found() {
    let h = Harness::new();
    let ada = h.store.add_user("ada", false);
    let eve = h.store.add_user("eve", false);
    let mut cart = example_cart();
    let session_id = paid_session(&h, &ada, &mut cart).await;

    h.lifecycle()
        .complete_from_redirect(&ada, &mut cart, catalog().as_slice(), &session_id)
        .await
        .unwrap();

    let result = h
        .lifecycle()
        .complete_from_redirect(&eve, &mut example_cart(), catalog().as_slice(), &session_id)
        .await;

    assert!(matches!(result, Err(LifecycleError::OrderNotFound)));
}

// =============================================================================
// Dual Trigger
// =============================================================================

#[tokio::test]
async fn test_webhook_before_redirect_yields_one_order_and_one_email() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);
    let mut cart = example_cart();
    let session_id = paid_session(&h, &user, &mut cart).await;

    let body = completed_event(Some(&session_id), "paid");
    let now = Utc::now();
    let early = h
        .lifecycle()
        .apply_webhook(&body, Some(&sign(&body, WEBHOOK_SECRET, now.timestamp())), now)
        .await
        .unwrap();
    assert_eq!(early, WebhookOutcome::NoMatchingOrder);

    let outcome = h
        .lifecycle()
        .complete_from_redirect(&user, &mut cart, catalog().as_slice(), &session_id)
        .await
        .unwrap();

    assert!(matches!(outcome, RedirectOutcome::Created { .. }));
    assert!(outcome.order().is_paid);
    assert_eq!(h.store.orders().len(), 1);
    assert_eq!(h.sender.sent().len(), 1);
}

#[tokio::test]
async fn test_webhook_after_redirect_is_already_paid() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);
    let mut cart = example_cart();
    let session_id = paid_session(&h, &user, &mut cart).await;

    let order_id = h
        .lifecycle()
        .complete_from_redirect(&user, &mut cart, catalog().as_slice(), &session_id)
        .await
        .unwrap()
        .order()
        .id;

    let body = completed_event(Some(&session_id), "paid");
    let now = Utc::now();
    let outcome = h
        .lifecycle()
        .apply_webhook(&body, Some(&sign(&body, WEBHOOK_SECRET, now.timestamp())), now)
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::AlreadyPaid { order_id });
    assert_eq!(h.sender.sent().len(), 1);
}

#[tokio::test]
async fn test_redirect_after_webhook_marked_order_paid() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);
    let mut cart = example_cart();
    let session_id = paid_session(&h, &user, &mut cart).await;

    // An order recorded unpaid for this session.
    let pending = h.store.insert_order(
        &NewOrder::from_cart(user.id, &cart, Some(session_id.clone())).unwrap(),
    );
    let body = completed_event(Some(&session_id), "paid");
    let now = Utc::now();
    h.lifecycle()
        .apply_webhook(&body, Some(&sign(&body, WEBHOOK_SECRET, now.timestamp())), now)
        .await
        .unwrap();

    let outcome = h
        .lifecycle()
        .complete_from_redirect(&user, &mut cart, catalog().as_slice(), &session_id)
        .await
        .unwrap();

    assert!(matches!(outcome, RedirectOutcome::AlreadyRecorded { .. }));
    assert_eq!(outcome.order().id, pending.id);
    assert!(h.store.order(pending.id).unwrap().is_paid);
    assert!(cart.is_empty());
}

// =============================================================================
// Notification Failures
// =============================================================================

#[tokio::test]
async fn test_email_failure_keeps_order_paid() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);
    let mut cart = example_cart();
    let session_id = paid_session(&h, &user, &mut cart).await;
    h.sender.fail();

    let outcome = h
        .lifecycle()
        .complete_from_redirect(&user, &mut cart, catalog().as_slice(), &session_id)
        .await
        .unwrap();

    let RedirectOutcome::Created { order, notification } = outcome else {
        panic!("expected a new order");
    };
    assert!(matches!(notification, NotificationStatus::Failed(_)));
    assert!(h.store.order(order.id).unwrap().is_paid);
    assert!(cart.is_empty());
}

#[tokio::test]
async fn test_invoice_failure_sends_without_attachment() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);
    let mut cart = example_cart();
    let session_id = paid_session(&h, &user, &mut cart).await;
    h.renderer.fail();

    let outcome = h
        .lifecycle()
        .complete_from_redirect(&user, &mut cart, catalog().as_slice(), &session_id)
        .await
        .unwrap();

    let RedirectOutcome::Created { notification, .. } = outcome else {
        panic!("expected a new order");
    };
    assert!(matches!(notification, NotificationStatus::Degraded(_)));

    let sent = h.sender.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].attachment.is_none());
}

#[tokio::test]
async fn test_failed_confirmation_can_be_resent() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);
    let mut cart = example_cart();
    let session_id = paid_session(&h, &user, &mut cart).await;
    h.sender.fail();

    let order_id = h
        .lifecycle()
        .complete_from_redirect(&user, &mut cart, catalog().as_slice(), &session_id)
        .await
        .unwrap()
        .order()
        .id;
    assert!(h.sender.sent().is_empty());

    // A replayed redirect still sends nothing.
    h.sender.recover();
    h.lifecycle()
        .complete_from_redirect(&user, &mut cart, catalog().as_slice(), &session_id)
        .await
        .unwrap();
    assert!(h.sender.sent().is_empty());

    let status = h.lifecycle().resend_confirmation(order_id).await.unwrap();

    assert_eq!(status, NotificationStatus::Sent);
    let sent = h.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, format!("Your Shopfront Order #{order_id} Confirmation"));
    assert!(sent[0].attachment.is_some());
}

#[tokio::test]
async fn test_resend_refuses_unpaid_and_unknown_orders() {
    let h = Harness::new();
    let user = h.store.add_user("ada", false);
    let pending = h.store.insert_order(
        &NewOrder::from_cart(user.id, &example_cart(), Some("cs_test_9".to_string())).unwrap(),
    );

    let unpaid = h.lifecycle().resend_confirmation(pending.id).await;
    assert!(matches!(unpaid, Err(LifecycleError::OrderUnpaid(id)) if id == pending.id));

    let unknown = h.lifecycle().resend_confirmation(OrderId::new(404)).await;
    assert!(matches!(unknown, Err(LifecycleError::OrderNotFound)));

    assert!(h.sender.sent().is_empty());
}
