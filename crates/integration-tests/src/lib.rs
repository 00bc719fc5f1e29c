//! Integration tests for Shopfront.
//!
//! The order lifecycle is exercised end to end against in-memory
//! implementations of its ports, so the suite needs no database, payment
//! provider or mail server.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! # Fakes
//!
//! - [`MemoryStore`] - order ledger and user directory with the same
//!   uniqueness and conditional-update rules as the Postgres schema
//! - [`FakeGateway`] - checkout sessions that start unpaid until [`FakeGateway::pay`]
//! - [`FakeRenderer`] - invoice renderer that can be told to fail
//! - [`RecordingSender`] - mail transport that records or rejects messages

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use shopfront_core::lifecycle::ports::{
    DeliveryError, GatewayError, InvoiceRenderer, MessageSender, OrderStore, RenderError,
    StoreError, UserDirectory,
};
use shopfront_core::lifecycle::{Lifecycle, LifecycleSettings};
use shopfront_core::notification::{Attachment, Notification};
use shopfront_core::payment::{CheckoutRequest, CheckoutSession, PaymentStatus};
use shopfront_core::{
    Cart, Email, NewOrder, Order, OrderId, OrderItem, OrderItemId, Price, Product, ProductId,
    ShippingStage, ShippingState, User, UserId,
};

pub const WEBHOOK_SECRET: &str = "whsec_integration_secret";
pub const STORE_NAME: &str = "Shopfront";

// =============================================================================
// Order Store
// =============================================================================

#[derive(Default)]
struct Ledger {
    users: Vec<User>,
    orders: Vec<Order>,
    next_order: i64,
    next_item: i64,
}

/// In-memory order ledger and user directory.
#[derive(Default)]
pub struct MemoryStore {
    ledger: Mutex<Ledger>,
    calls: AtomicUsize,
    lose_next_shipping_race: AtomicBool,
    miss_next_session_lookup: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user and return it.
    pub fn add_user(&self, username: &str, is_admin: bool) -> User {
        let mut ledger = self.ledger.lock().unwrap();
        let user = User {
            id: UserId::new(i64::try_from(ledger.users.len()).unwrap() + 1),
            username: username.to_string(),
            email: Email::parse(&format!("{username}@shop.test")).unwrap(),
            is_admin,
        };
        ledger.users.push(user.clone());
        user
    }

    /// Insert an order directly, as if a previous request had created it.
    pub fn insert_order(&self, order: &NewOrder) -> Order {
        let mut ledger = self.ledger.lock().unwrap();
        Self::store(&mut ledger, order)
    }

    /// Number of port calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the next guarded shipping save report that someone else won.
    pub fn lose_next_shipping_race(&self) {
        self.lose_next_shipping_race.store(true, Ordering::SeqCst);
    }

    /// Make the next lookup by checkout session find nothing, as when a
    /// concurrent request has not committed yet.
    pub fn miss_next_session_lookup(&self) {
        self.miss_next_session_lookup.store(true, Ordering::SeqCst);
    }

    pub fn orders(&self) -> Vec<Order> {
        self.ledger.lock().unwrap().orders.clone()
    }

    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.orders().into_iter().find(|o| o.id == id)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn store(ledger: &mut Ledger, order: &NewOrder) -> Order {
        ledger.next_order += 1;
        let id = OrderId::new(ledger.next_order);

        let mut items = Vec::with_capacity(order.items().len());
        for item in order.items() {
            ledger.next_item += 1;
            items.push(OrderItem {
                id: OrderItemId::new(ledger.next_item),
                order_id: id,
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                price: item.price,
            });
        }

        let stored = Order::from_storage(
            id,
            order.user_id(),
            Utc::now(),
            order.total(),
            order.is_paid(),
            ShippingState::initial(Utc::now()),
            order.payment_session_id().map(str::to_owned),
            items,
        );
        ledger.orders.push(stored.clone());
        stored
    }
}

impl OrderStore for MemoryStore {
    async fn create_order(&self, order: &NewOrder) -> Result<Order, StoreError> {
        self.touch();
        let mut ledger = self.ledger.lock().unwrap();
        if let Some(session_id) = order.payment_session_id()
            && ledger
                .orders
                .iter()
                .any(|o| o.payment_session_id.as_deref() == Some(session_id))
        {
            return Err(StoreError::Conflict(format!(
                "order for session {session_id} already exists"
            )));
        }
        Ok(Self::store(&mut ledger, order))
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.touch();
        Ok(self.order(id))
    }

    async fn order_by_payment_session(&self, session_id: &str) -> Result<Option<Order>, StoreError> {
        self.touch();
        if self.miss_next_session_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self
            .orders()
            .into_iter()
            .find(|o| o.payment_session_id.as_deref() == Some(session_id)))
    }

    async fn most_recent_unpaid(&self) -> Result<Option<Order>, StoreError> {
        self.touch();
        Ok(self
            .orders()
            .into_iter()
            .filter(|o| !o.is_paid)
            .max_by_key(|o| (o.created_at, o.id.as_i64())))
    }

    async fn mark_paid(&self, id: OrderId) -> Result<bool, StoreError> {
        self.touch();
        let mut ledger = self.ledger.lock().unwrap();
        match ledger.orders.iter_mut().find(|o| o.id == id) {
            Some(order) if !order.is_paid => {
                order.is_paid = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn save_shipping(
        &self,
        id: OrderId,
        expected: ShippingStage,
        state: &ShippingState,
    ) -> Result<bool, StoreError> {
        self.touch();
        if self.lose_next_shipping_race.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        let mut ledger = self.ledger.lock().unwrap();
        match ledger.orders.iter_mut().find(|o| o.id == id) {
            Some(order) if order.shipping.stage() == expected => {
                order.shipping = state.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl UserDirectory for MemoryStore {
    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.touch();
        Ok(self
            .ledger
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }
}

// =============================================================================
// Payment Gateway
// =============================================================================

/// Checkout provider whose sessions stay unpaid until [`FakeGateway::pay`].
#[derive(Default)]
pub struct FakeGateway {
    sessions: Mutex<HashMap<String, PaymentStatus>>,
    requests: Mutex<Vec<CheckoutRequest>>,
}

impl FakeGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete payment for a session.
    pub fn pay(&self, session_id: &str) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session_id.to_string(), PaymentStatus::Paid);
    }

    /// Requests received by `create_checkout_session`.
    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl shopfront_core::lifecycle::ports::PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let mut sessions = self.sessions.lock().unwrap();
        let id = format!("cs_test_{}", sessions.len() + 1);
        sessions.insert(id.clone(), PaymentStatus::Unpaid);
        self.requests.lock().unwrap().push(request.clone());

        Ok(CheckoutSession {
            url: Some(format!("https://checkout.test/pay/{id}")),
            id,
            payment_status: PaymentStatus::Unpaid,
        })
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, GatewayError> {
        let status = self
            .sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| GatewayError(format!("no such session: {session_id}").into()))?;

        Ok(CheckoutSession {
            id: session_id.to_string(),
            url: None,
            payment_status: status,
        })
    }
}

// =============================================================================
// Invoice Renderer & Mail Transport
// =============================================================================

/// Invoice renderer producing a small text document.
#[derive(Default)]
pub struct FakeRenderer {
    fail: AtomicBool,
}

impl FakeRenderer {
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl InvoiceRenderer for FakeRenderer {
    fn render_invoice(&self, order: &Order, _user: &User) -> Result<Attachment, RenderError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RenderError("renderer offline".into()));
        }
        Ok(Attachment {
            filename: format!("invoice_order_{}.html", order.id),
            content_type: "text/html".to_string(),
            data: format!("Invoice #{} total {}", order.id, order.total()).into_bytes(),
        })
    }
}

/// Mail transport that keeps every message it accepts.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<Notification>>,
    fail: AtomicBool,
}

impl RecordingSender {
    /// Reject every message from now on.
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Accept messages again.
    pub fn recover(&self) {
        self.fail.store(false, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl MessageSender for RecordingSender {
    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DeliveryError("smtp unavailable".into()));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

// =============================================================================
// Harness
// =============================================================================

/// All fakes plus settings, ready to build a lifecycle.
pub struct Harness {
    pub store: MemoryStore,
    pub gateway: FakeGateway,
    pub renderer: FakeRenderer,
    pub sender: RecordingSender,
    pub settings: LifecycleSettings,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            gateway: FakeGateway::new(),
            renderer: FakeRenderer::default(),
            sender: RecordingSender::default(),
            settings: LifecycleSettings::new(STORE_NAME, "usd", WEBHOOK_SECRET),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle<'_, MemoryStore, FakeGateway, FakeRenderer, RecordingSender> {
        Lifecycle::new(
            &self.store,
            &self.gateway,
            &self.renderer,
            &self.sender,
            &self.settings,
        )
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn product(id: i64, name: &str, cents: i64) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        price: Price::from_minor_units(cents).unwrap(),
        description: None,
        image: None,
    }
}

/// The catalog used across the suite: a 10.00 mug and a 5.00 tea.
pub fn catalog() -> Vec<Product> {
    vec![product(1, "Mug", 1000), product(2, "Tea", 500)]
}

/// Two mugs and one tea, 25.00 in total.
pub fn example_cart() -> Cart {
    let catalog = catalog();
    let mut cart = Cart::new();
    cart.add(&catalog[0]).add(&catalog[0]).add(&catalog[1]);
    cart
}

/// Sign a webhook body the way the payment provider does.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    )
}

/// A `checkout.session.completed` body for `session_id`.
pub fn completed_event(session_id: Option<&str>, payment_status: &str) -> Vec<u8> {
    let mut object = serde_json::json!({ "payment_status": payment_status });
    if let Some(id) = session_id {
        object["id"] = serde_json::Value::String(id.to_string());
    }
    serde_json::json!({
        "id": "evt_test_1",
        "type": "checkout.session.completed",
        "data": { "object": object }
    })
    .to_string()
    .into_bytes()
}
