//! Order lifecycle service.
//!
//! [`Lifecycle`] ties the pure domain types to the [`ports`]. It owns the
//! rules that make payment confirmation idempotent:
//!
//! - The success redirect is the only path that creates orders, and at most
//!   one order exists per checkout session (the store enforces uniqueness).
//!   The redirect has already seen the payment, so the order is written paid.
//! - The webhook goes through [`OrderStore::mark_paid`], a check-then-set, so
//!   a delivery for an already paid order is a no-op.
//! - Only the call that created the order sends the confirmation email, and
//!   only a real stage change sends a shipping update. A failed confirmation
//!   can be sent again with [`Lifecycle::resend_confirmation`].
//! - Mail and invoice failures never unwind a committed order.

pub mod ports;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::cart::{Cart, Catalog};
use crate::notification::{self, Notification};
use crate::order::{NewOrder, Order, OrderError};
use crate::payment::{
    self, CheckoutLineItem, CheckoutRequest, SignatureError, WebhookError, WebhookEvent,
};
use crate::shipping::{self, Advance, ShippingError, StageChange};
use crate::types::{OrderId, PriceError, UserId};
use crate::user::User;

use ports::{
    GatewayError, InvoiceRenderer, MessageSender, OrderStore, PaymentGateway, StoreError,
    UserDirectory,
};

/// Lifecycle failures. Idempotent no-ops are outcomes, not errors.
#[derive(thiserror::Error, Debug)]
pub enum LifecycleError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("missing checkout session id")]
    MissingSessionId,
    #[error("checkout session {0} has not been paid")]
    PaymentIncomplete(String),
    #[error(transparent)]
    InvalidOrder(#[from] OrderError),
    #[error(transparent)]
    Price(#[from] PriceError),
    #[error(transparent)]
    Shipping(#[from] ShippingError),
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error(transparent)]
    Webhook(#[from] WebhookError),
    #[error("order not found")]
    OrderNotFound,
    #[error("order {0} has not been paid")]
    OrderUnpaid(OrderId),
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error("shipping for order {0} was changed concurrently")]
    ShippingConflict(OrderId),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Store-wide settings the lifecycle needs.
#[derive(Clone)]
pub struct LifecycleSettings {
    /// Shown in email subjects and bodies.
    pub store_name: String,
    /// ISO currency code for checkout sessions.
    pub currency: String,
    /// Shared secret for webhook signatures.
    pub webhook_secret: String,
    pub signature_tolerance: Duration,
}

impl LifecycleSettings {
    #[must_use]
    pub fn new(
        store_name: impl Into<String>,
        currency: impl Into<String>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            store_name: store_name.into(),
            currency: currency.into(),
            webhook_secret: webhook_secret.into(),
            signature_tolerance: payment::DEFAULT_TOLERANCE,
        }
    }
}

impl std::fmt::Debug for LifecycleSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleSettings")
            .field("store_name", &self.store_name)
            .field("currency", &self.currency)
            .field("webhook_secret", &"[REDACTED]")
            .field("signature_tolerance", &self.signature_tolerance)
            .finish()
    }
}

/// Return destinations for a hosted checkout page.
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
}

/// A checkout session the buyer should be redirected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutStarted {
    pub session_id: String,
    pub redirect_url: String,
}

/// What happened to an email the lifecycle tried to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum NotificationStatus {
    Sent,
    /// Delivered, but without the invoice attachment.
    Degraded(String),
    Failed(String),
}

/// Result of the success redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// This call created the order and attempted the confirmation email.
    Created {
        order: Order,
        notification: NotificationStatus,
    },
    /// The session already has an order; nothing was created or sent.
    AlreadyRecorded { order: Order },
}

impl RedirectOutcome {
    #[must_use]
    pub const fn order(&self) -> &Order {
        match self {
            Self::Created { order, .. } | Self::AlreadyRecorded { order } => order,
        }
    }
}

/// Result of a verified webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    MarkedPaid { order_id: OrderId },
    AlreadyPaid { order_id: OrderId },
    NoMatchingOrder,
    Ignored { event_type: String },
}

/// Result of an admin shipping update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShippingOutcome {
    Updated {
        order: Order,
        change: StageChange,
        notification: NotificationStatus,
    },
    /// The order was already in the requested stage; nothing was sent.
    AlreadyInStage { order: Order },
}

/// The order lifecycle over a set of ports.
pub struct Lifecycle<'a, S, G, R, M> {
    store: &'a S,
    gateway: &'a G,
    renderer: &'a R,
    sender: &'a M,
    settings: &'a LifecycleSettings,
}

impl<'a, S, G, R, M> Lifecycle<'a, S, G, R, M>
where
    S: OrderStore + UserDirectory,
    G: PaymentGateway,
    R: InvoiceRenderer,
    M: MessageSender,
{
    #[must_use]
    pub const fn new(
        store: &'a S,
        gateway: &'a G,
        renderer: &'a R,
        sender: &'a M,
        settings: &'a LifecycleSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            renderer,
            sender,
            settings,
        }
    }

    /// Open a hosted checkout session for the buyer's cart.
    ///
    /// The cart is reconciled against `catalog` first; lines for products that
    /// no longer exist are dropped from `cart`.
    ///
    /// # Errors
    ///
    /// `EmptyCart` if nothing is left to buy, `InvalidOrder` if the cart could
    /// not become an order (a zero price, say), `Price` if a price cannot be
    /// expressed in minor units, `Gateway` if the provider call fails.
    #[instrument(skip(self, user, cart, catalog, urls), fields(user_id = %user.id))]
    pub async fn begin_checkout<C>(
        &self,
        user: &User,
        cart: &mut Cart,
        catalog: &C,
        urls: CheckoutUrls,
    ) -> Result<CheckoutStarted, LifecycleError>
    where
        C: Catalog + Sync + ?Sized,
    {
        reconcile(cart, catalog);
        if cart.is_empty() {
            return Err(LifecycleError::EmptyCart);
        }
        // Anything the redirect would refuse must fail before the buyer pays.
        NewOrder::from_cart(user.id, cart, None)?;

        let line_items = cart
            .lines()
            .iter()
            .map(|line| {
                Ok(CheckoutLineItem {
                    name: line.name.clone(),
                    unit_amount: line.price.minor_units()?,
                    quantity: line.quantity,
                })
            })
            .collect::<Result<Vec<_>, PriceError>>()?;

        let request = CheckoutRequest {
            currency: self.settings.currency.clone(),
            line_items,
            success_url: urls.success_url,
            cancel_url: urls.cancel_url,
            customer_email: Some(user.email.clone()),
        };

        let session = self.gateway.create_checkout_session(&request).await?;
        let Some(redirect_url) = session.url else {
            return Err(GatewayError("checkout session has no redirect url".into()).into());
        };

        info!(session_id = %session.id, total = %cart.total(), "Checkout session created");
        Ok(CheckoutStarted {
            session_id: session.id,
            redirect_url,
        })
    }

    /// Record the purchase when the buyer returns from the payment page.
    ///
    /// This is the only path that creates orders. A replayed redirect for a
    /// session that already has an order returns that order, clears the cart
    /// and sends nothing.
    ///
    /// # Errors
    ///
    /// `MissingSessionId`, `EmptyCart` or `PaymentIncomplete` before anything
    /// is written; `OrderNotFound` if the session's order belongs to someone
    /// else; `Store` or `Gateway` for adapter failures. Notification problems
    /// are reported in the outcome instead.
    #[instrument(skip(self, user, cart, catalog), fields(user_id = %user.id))]
    pub async fn complete_from_redirect<C>(
        &self,
        user: &User,
        cart: &mut Cart,
        catalog: &C,
        session_id: &str,
    ) -> Result<RedirectOutcome, LifecycleError>
    where
        C: Catalog + Sync + ?Sized,
    {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(LifecycleError::MissingSessionId);
        }

        if let Some(existing) = self.store.order_by_payment_session(session_id).await? {
            return self.replayed(user, cart, existing).await;
        }

        reconcile(cart, catalog);
        if cart.is_empty() {
            return Err(LifecycleError::EmptyCart);
        }

        let session = self.gateway.retrieve_checkout_session(session_id).await?;
        if !session.payment_status.is_paid() {
            warn!(session_id, status = ?session.payment_status, "Redirect for unpaid session");
            return Err(LifecycleError::PaymentIncomplete(session_id.to_owned()));
        }

        let new_order = NewOrder::from_cart(user.id, cart, Some(session_id.to_owned()))?.paid();
        let order = match self.store.create_order(&new_order).await {
            Ok(order) => order,
            Err(StoreError::Conflict(reason)) => {
                info!(session_id, %reason, "Order already recorded by a concurrent redirect");
                let existing = self
                    .store
                    .order_by_payment_session(session_id)
                    .await?
                    .ok_or(StoreError::Conflict(reason))?;
                return self.replayed(user, cart, existing).await;
            }
            Err(e) => return Err(e.into()),
        };

        cart.clear();

        info!(order_id = %order.id, total = %order.total(), "Order created");

        let notification = self.send_confirmation(&order, user).await;
        Ok(RedirectOutcome::Created {
            order,
            notification,
        })
    }

    /// Apply a payment provider webhook delivery.
    ///
    /// The signature is checked before anything else. The webhook only ever
    /// flips the paid flag on an existing order: it never creates orders and
    /// never sends email.
    ///
    /// # Errors
    ///
    /// `Signature` for an unauthenticated delivery, `Webhook` for a body that
    /// is not an event, `Store` for storage failures.
    #[instrument(skip(self, payload, signature))]
    pub async fn apply_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<WebhookOutcome, LifecycleError> {
        payment::verify_signature(
            payload,
            signature,
            &self.settings.webhook_secret,
            now,
            self.settings.signature_tolerance,
        )?;

        let event = WebhookEvent::parse(payload)?;
        if !event.is_paid_checkout() {
            info!(event_type = %event.event_type, "Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type,
            });
        }

        let order = match event.session_id() {
            Some(session_id) => self.store.order_by_payment_session(session_id).await?,
            None => {
                warn!(event_id = ?event.id, "Paid checkout without session id, using most recent unpaid order");
                self.store.most_recent_unpaid().await?
            }
        };

        let Some(order) = order else {
            info!(session_id = ?event.session_id(), "No order matches paid checkout");
            return Ok(WebhookOutcome::NoMatchingOrder);
        };

        if self.store.mark_paid(order.id).await? {
            info!(order_id = %order.id, "Order marked paid by webhook");
            Ok(WebhookOutcome::MarkedPaid { order_id: order.id })
        } else {
            Ok(WebhookOutcome::AlreadyPaid { order_id: order.id })
        }
    }

    /// Move an order to the requested shipping stage and notify its owner.
    ///
    /// # Errors
    ///
    /// `Shipping` for a missing or unknown stage, `OrderNotFound`,
    /// `ShippingConflict` if another admin moved the order first, `UserNotFound`
    /// if the owner has vanished, `Store` for storage failures.
    #[instrument(skip(self))]
    pub async fn update_shipping(
        &self,
        order_id: OrderId,
        requested: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ShippingOutcome, LifecycleError> {
        let target = shipping::parse_requested(requested)?;
        let mut order = self
            .store
            .order_by_id(order_id)
            .await?
            .ok_or(LifecycleError::OrderNotFound)?;

        let previous = order.shipping.stage();
        let change = match shipping::advance_to(&mut order.shipping, target, now) {
            Advance::AlreadyInStage(stage) => {
                info!(%order_id, %stage, "Order already in requested stage");
                return Ok(ShippingOutcome::AlreadyInStage { order });
            }
            Advance::Moved(change) => change,
        };

        if change.is_regression() {
            warn!(%order_id, from = %change.from, to = %change.to, "Shipping stage moved backwards");
        }

        if !self
            .store
            .save_shipping(order.id, previous, &order.shipping)
            .await?
        {
            return Err(LifecycleError::ShippingConflict(order.id));
        }

        info!(%order_id, from = %change.from, to = %change.to, "Shipping stage updated");

        let user = self
            .store
            .user_by_id(order.user_id)
            .await?
            .ok_or(LifecycleError::UserNotFound(order.user_id))?;

        let notification = match notification::shipping_update(&self.settings.store_name, &order, &user) {
            Ok(message) => self.deliver(&message).await,
            Err(e) => {
                warn!(%order_id, error = %e, "Failed to build shipping update");
                NotificationStatus::Failed(e.to_string())
            }
        };

        Ok(ShippingOutcome::Updated {
            order,
            change,
            notification,
        })
    }

    /// Send the confirmation email for a paid order again.
    ///
    /// Used when the original send failed. The outcome reports delivery the
    /// same way the redirect does.
    ///
    /// # Errors
    ///
    /// `OrderNotFound`, `OrderUnpaid` for an order that was never paid,
    /// `UserNotFound` if the owner has vanished, `Store` for storage failures.
    #[instrument(skip(self))]
    pub async fn resend_confirmation(
        &self,
        order_id: OrderId,
    ) -> Result<NotificationStatus, LifecycleError> {
        let order = self
            .store
            .order_by_id(order_id)
            .await?
            .ok_or(LifecycleError::OrderNotFound)?;
        if !order.is_paid {
            return Err(LifecycleError::OrderUnpaid(order_id));
        }

        let user = self
            .store
            .user_by_id(order.user_id)
            .await?
            .ok_or(LifecycleError::UserNotFound(order.user_id))?;

        info!(%order_id, "Resending order confirmation");
        Ok(self.send_confirmation(&order, &user).await)
    }

    async fn replayed(
        &self,
        user: &User,
        cart: &mut Cart,
        mut existing: Order,
    ) -> Result<RedirectOutcome, LifecycleError> {
        if existing.user_id != user.id {
            warn!(order_id = %existing.id, "Checkout session belongs to another user");
            return Err(LifecycleError::OrderNotFound);
        }
        if !existing.is_paid {
            self.store.mark_paid(existing.id).await?;
            existing.is_paid = true;
        }
        cart.clear();
        info!(order_id = %existing.id, "Redirect replay, order already recorded");
        Ok(RedirectOutcome::AlreadyRecorded { order: existing })
    }

    async fn send_confirmation(&self, order: &Order, user: &User) -> NotificationStatus {
        let (invoice, degraded) = match self.renderer.render_invoice(order, user) {
            Ok(attachment) => (Some(attachment), None),
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Invoice rendering failed, sending without it");
                (None, Some(format!("invoice unavailable: {e}")))
            }
        };

        let message = match notification::order_confirmation(
            &self.settings.store_name,
            order,
            user,
            invoice,
        ) {
            Ok(message) => message,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Failed to build confirmation");
                return NotificationStatus::Failed(e.to_string());
            }
        };

        match (self.deliver(&message).await, degraded) {
            (NotificationStatus::Sent, Some(reason)) => NotificationStatus::Degraded(reason),
            (status, _) => status,
        }
    }

    async fn deliver(&self, message: &Notification) -> NotificationStatus {
        match self.sender.send(message).await {
            Ok(()) => {
                info!(kind = ?message.kind, "Notification sent");
                NotificationStatus::Sent
            }
            Err(e) => {
                warn!(kind = ?message.kind, error = %e, "Notification delivery failed");
                NotificationStatus::Failed(e.to_string())
            }
        }
    }
}

fn reconcile<C: Catalog + ?Sized>(cart: &mut Cart, catalog: &C) {
    let dropped = cart.reconcile(catalog);
    if !dropped.is_empty() {
        info!(?dropped, "Dropped cart lines for removed products");
    }
}
