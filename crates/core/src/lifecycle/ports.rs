//! Boundaries the lifecycle calls into.
//!
//! Every method returns a `Send` future so the lifecycle can run inside axum
//! handlers. Implementations may use `async fn` directly.

use std::future::Future;

use crate::notification::{Attachment, Notification};
use crate::order::{NewOrder, Order, ShippingState};
use crate::payment::{CheckoutRequest, CheckoutSession};
use crate::types::{OrderId, ShippingStage, UserId};
use crate::user::User;

/// Type-erased error from an adapter.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Storage failures.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Backend(BoxError),
}

/// The payment provider could not be reached or refused the request.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct GatewayError(pub BoxError);

/// The invoice could not be produced.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct RenderError(pub BoxError);

/// The notification could not be handed to the mail transport.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct DeliveryError(pub BoxError);

/// Persistent order ledger.
pub trait OrderStore: Send + Sync {
    /// Write the order header and all items in one transaction.
    ///
    /// Returns `StoreError::Conflict` when an order already exists for the
    /// same payment session.
    fn create_order(
        &self,
        order: &NewOrder,
    ) -> impl Future<Output = Result<Order, StoreError>> + Send;

    fn order_by_id(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<Order>, StoreError>> + Send;

    fn order_by_payment_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Option<Order>, StoreError>> + Send;

    /// The newest order with `is_paid = false`.
    fn most_recent_unpaid(&self) -> impl Future<Output = Result<Option<Order>, StoreError>> + Send;

    /// Set `is_paid` if it is not set yet, atomically.
    ///
    /// Returns `true` only for the call that actually flipped the flag.
    fn mark_paid(&self, id: OrderId) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Persist `state` only if the stored stage is still `expected`.
    ///
    /// Returns `false` when another writer moved the order first.
    fn save_shipping(
        &self,
        id: OrderId,
        expected: ShippingStage,
        state: &ShippingState,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// User lookup for notification recipients.
pub trait UserDirectory: Send + Sync {
    fn user_by_id(&self, id: UserId)
    -> impl Future<Output = Result<Option<User>, StoreError>> + Send;
}

/// Hosted checkout provider.
pub trait PaymentGateway: Send + Sync {
    fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> impl Future<Output = Result<CheckoutSession, GatewayError>> + Send;

    fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<CheckoutSession, GatewayError>> + Send;
}

/// Produces the invoice attached to confirmation emails.
pub trait InvoiceRenderer: Send + Sync {
    /// Render `order` for `user`.
    ///
    /// # Errors
    ///
    /// Returns a `RenderError` if the document cannot be produced.
    fn render_invoice(&self, order: &Order, user: &User) -> Result<Attachment, RenderError>;
}

/// Mail transport.
pub trait MessageSender: Send + Sync {
    fn send(
        &self,
        notification: &Notification,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}
