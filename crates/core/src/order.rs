//! Orders and line items.
//!
//! An [`Order`] is created exactly once per successful checkout from a
//! [`NewOrder`], whose constructor is where the total invariant is enforced.
//! After creation only the paid flag and the [`ShippingState`] ever change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::types::{OrderId, OrderItemId, Price, ProductId, ShippingStage, UserId};

/// Errors raised while assembling a new order.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// An order needs at least one line item.
    #[error("an order needs at least one item")]
    NoItems,
    /// A line item has a zero quantity.
    #[error("item {name:?} has a zero quantity")]
    ZeroQuantity { name: String },
    /// A line item has a zero unit price.
    #[error("item {name:?} has a zero price")]
    ZeroPrice { name: String },
    /// The declared total does not equal the sum of the items.
    #[error("order total {declared} does not match item sum {computed}")]
    TotalMismatch { declared: Price, computed: Price },
}

/// A line item waiting to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub quantity: u32,
    pub price: Price,
}

impl NewOrderItem {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// A validated order waiting to be persisted.
///
/// Fields are private so the only way to obtain one is through
/// [`NewOrder::new`] or [`NewOrder::from_cart`], both of which check that
/// every item is positive and that the total equals the item sum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    user_id: UserId,
    total: Price,
    payment_session_id: Option<String>,
    is_paid: bool,
    items: Vec<NewOrderItem>,
}

impl NewOrder {
    /// Validate and assemble a new order.
    ///
    /// # Errors
    ///
    /// Returns an `OrderError` if there are no items, an item has a zero
    /// quantity or price, or `total` differs from the sum of the items.
    pub fn new(
        user_id: UserId,
        items: Vec<NewOrderItem>,
        total: Price,
        payment_session_id: Option<String>,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        for item in &items {
            if item.quantity == 0 {
                return Err(OrderError::ZeroQuantity {
                    name: item.product_name.clone(),
                });
            }
            if !item.price.is_positive() {
                return Err(OrderError::ZeroPrice {
                    name: item.product_name.clone(),
                });
            }
        }

        let computed: Price = items.iter().map(NewOrderItem::line_total).sum();
        if computed != total {
            return Err(OrderError::TotalMismatch {
                declared: total,
                computed,
            });
        }

        Ok(Self {
            user_id,
            total,
            payment_session_id,
            is_paid: false,
            items,
        })
    }

    /// Snapshot a cart into a new order for `user_id`.
    ///
    /// # Errors
    ///
    /// See [`NewOrder::new`]; an empty cart yields `OrderError::NoItems`.
    pub fn from_cart(
        user_id: UserId,
        cart: &Cart,
        payment_session_id: Option<String>,
    ) -> Result<Self, OrderError> {
        let items = cart
            .lines()
            .iter()
            .map(|line| NewOrderItem {
                product_id: Some(line.product_id),
                product_name: line.name.clone(),
                quantity: line.quantity,
                price: line.price,
            })
            .collect();

        Self::new(user_id, items, cart.total(), payment_session_id)
    }

    /// Record the order as already paid, for payments confirmed before the
    /// order is written.
    #[must_use]
    pub const fn paid(mut self) -> Self {
        self.is_paid = true;
        self
    }

    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub const fn total(&self) -> Price {
        self.total
    }

    #[must_use]
    pub fn payment_session_id(&self) -> Option<&str> {
        self.payment_session_id.as_deref()
    }

    #[must_use]
    pub const fn is_paid(&self) -> bool {
        self.is_paid
    }

    #[must_use]
    pub fn items(&self) -> &[NewOrderItem] {
        &self.items
    }
}

/// A persisted, immutable line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// `None` once the product has been deleted from the catalog.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub quantity: u32,
    pub price: Price,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// Where an order is in fulfillment, plus when it first reached each stage.
///
/// The stage is held once, so the stored label and index can never drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingState {
    pub(crate) stage: ShippingStage,
    pub(crate) processing_at: Option<DateTime<Utc>>,
    pub(crate) shipped_at: Option<DateTime<Utc>>,
    pub(crate) in_transit_at: Option<DateTime<Utc>>,
    pub(crate) delivered_at: Option<DateTime<Utc>>,
}

impl ShippingState {
    /// The state of a freshly created order: `Processing`, entered at `at`.
    #[must_use]
    pub const fn initial(at: DateTime<Utc>) -> Self {
        Self {
            stage: ShippingStage::Processing,
            processing_at: Some(at),
            shipped_at: None,
            in_transit_at: None,
            delivered_at: None,
        }
    }

    /// Rebuild a state from stored columns.
    #[must_use]
    pub const fn from_parts(
        stage: ShippingStage,
        processing_at: Option<DateTime<Utc>>,
        shipped_at: Option<DateTime<Utc>>,
        in_transit_at: Option<DateTime<Utc>>,
        delivered_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            stage,
            processing_at,
            shipped_at,
            in_transit_at,
            delivered_at,
        }
    }

    #[must_use]
    pub const fn stage(&self) -> ShippingStage {
        self.stage
    }

    /// The `shipping_status` label.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        self.stage.label()
    }

    /// The `shipping_stage_index` ordinal.
    #[must_use]
    pub const fn stage_index(&self) -> i16 {
        self.stage.index()
    }

    /// When `stage` was first entered, if ever.
    #[must_use]
    pub const fn entered_at(&self, stage: ShippingStage) -> Option<DateTime<Utc>> {
        match stage {
            ShippingStage::Processing => self.processing_at,
            ShippingStage::Shipped => self.shipped_at,
            ShippingStage::InTransit => self.in_transit_at,
            ShippingStage::Delivered => self.delivered_at,
        }
    }

    #[must_use]
    pub const fn processing_at(&self) -> Option<DateTime<Utc>> {
        self.processing_at
    }

    #[must_use]
    pub const fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    #[must_use]
    pub const fn in_transit_at(&self) -> Option<DateTime<Utc>> {
        self.in_transit_at
    }

    #[must_use]
    pub const fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub(crate) const fn slot_mut(&mut self, stage: ShippingStage) -> &mut Option<DateTime<Utc>> {
        match stage {
            ShippingStage::Processing => &mut self.processing_at,
            ShippingStage::Shipped => &mut self.shipped_at,
            ShippingStage::InTransit => &mut self.in_transit_at,
            ShippingStage::Delivered => &mut self.delivered_at,
        }
    }
}

/// A completed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    total: Price,
    pub is_paid: bool,
    pub shipping: ShippingState,
    /// Checkout session that paid for this order, when known.
    pub payment_session_id: Option<String>,
    items: Vec<OrderItem>,
}

impl Order {
    /// Assemble an order from stored data.
    ///
    /// Storage implementations call this after the header and items have been
    /// written or loaded; the total was validated when the [`NewOrder`] was
    /// built and is not recomputed here.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn from_storage(
        id: OrderId,
        user_id: UserId,
        created_at: DateTime<Utc>,
        total: Price,
        is_paid: bool,
        shipping: ShippingState,
        payment_session_id: Option<String>,
        items: Vec<OrderItem>,
    ) -> Self {
        Self {
            id,
            user_id,
            created_at,
            total,
            is_paid,
            shipping,
            payment_session_id,
            items,
        }
    }

    /// Total charged, fixed at creation.
    #[must_use]
    pub const fn total(&self) -> Price {
        self.total
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }
}
