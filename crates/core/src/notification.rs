//! Email payload assembly.
//!
//! Building a [`Notification`] is pure: it renders the subject and bodies for
//! one event and attaches an optional document. Delivery belongs to the
//! [`MessageSender`](crate::lifecycle::ports::MessageSender) port.

use askama::Template;
use serde::Serialize;

use crate::order::Order;
use crate::types::{Email, OrderId, ShippingStage};
use crate::user::User;

/// Errors raised while assembling a notification.
#[derive(thiserror::Error, Debug)]
pub enum NotificationError {
    /// A body template failed to render.
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

/// The event a notification announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationKind {
    OrderConfirmation { order_id: OrderId },
    ShippingUpdate { order_id: OrderId, stage: ShippingStage },
}

/// A binary file attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A fully assembled email, ready for a sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: Email,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub attachment: Option<Attachment>,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    store_name: &'a str,
    order: &'a Order,
    user: &'a User,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    store_name: &'a str,
    order: &'a Order,
    user: &'a User,
}

#[derive(Template)]
#[template(path = "email/shipping_update.html")]
struct ShippingUpdateHtml<'a> {
    store_name: &'a str,
    order: &'a Order,
    user: &'a User,
}

#[derive(Template)]
#[template(path = "email/shipping_update.txt")]
struct ShippingUpdateText<'a> {
    store_name: &'a str,
    order: &'a Order,
    user: &'a User,
}

/// Build the purchase confirmation for `order`, sent to its buyer.
///
/// # Errors
///
/// Returns `NotificationError::Template` if a body fails to render.
pub fn order_confirmation(
    store_name: &str,
    order: &Order,
    user: &User,
    invoice: Option<Attachment>,
) -> Result<Notification, NotificationError> {
    let html_body = OrderConfirmationHtml {
        store_name,
        order,
        user,
    }
    .render()?;
    let text_body = OrderConfirmationText {
        store_name,
        order,
        user,
    }
    .render()?;

    Ok(Notification {
        kind: NotificationKind::OrderConfirmation { order_id: order.id },
        recipient: user.email.clone(),
        subject: format!("Your {store_name} Order #{} Confirmation", order.id),
        text_body,
        html_body,
        attachment: invoice,
    })
}

/// Build the "your order is now …" update for the order's current stage.
///
/// # Errors
///
/// Returns `NotificationError::Template` if a body fails to render.
pub fn shipping_update(
    store_name: &str,
    order: &Order,
    user: &User,
) -> Result<Notification, NotificationError> {
    let stage = order.shipping.stage();
    let html_body = ShippingUpdateHtml {
        store_name,
        order,
        user,
    }
    .render()?;
    let text_body = ShippingUpdateText {
        store_name,
        order,
        user,
    }
    .render()?;

    Ok(Notification {
        kind: NotificationKind::ShippingUpdate {
            order_id: order.id,
            stage,
        },
        recipient: user.email.clone(),
        subject: format!("Your {store_name} Order #{} is now {stage}", order.id),
        text_body,
        html_body,
        attachment: None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::order::{OrderItem, ShippingState};
    use crate::shipping::advance_to;
    use crate::types::{OrderItemId, Price, ProductId, UserId};

    fn user() -> User {
        User {
            id: UserId::new(3),
            username: "ada".to_string(),
            email: Email::parse("ada@example.com").unwrap(),
            is_admin: false,
        }
    }

    fn order() -> Order {
        let items = vec![OrderItem {
            id: OrderItemId::new(1),
            order_id: OrderId::new(12),
            product_id: Some(ProductId::new(4)),
            product_name: "Tea <Tin>".to_string(),
            quantity: 2,
            price: Price::from_minor_units(1000).unwrap(),
        }];
        Order::from_storage(
            OrderId::new(12),
            UserId::new(3),
            Utc::now(),
            Price::from_minor_units(2000).unwrap(),
            true,
            ShippingState::initial(Utc::now()),
            None,
            items,
        )
    }

    #[test]
    fn test_order_confirmation_payload() {
        let invoice = Attachment {
            filename: "invoice_order_12.html".to_string(),
            content_type: "text/html".to_string(),
            data: b"<html></html>".to_vec(),
        };

        let n = order_confirmation("Shopfront", &order(), &user(), Some(invoice)).unwrap();

        assert_eq!(n.subject, "Your Shopfront Order #12 Confirmation");
        assert_eq!(n.recipient.as_str(), "ada@example.com");
        assert_eq!(
            n.kind,
            NotificationKind::OrderConfirmation {
                order_id: OrderId::new(12)
            }
        );
        assert!(n.text_body.contains("$20.00"));
        assert!(n.text_body.contains("Tea <Tin>"));
        // HTML bodies escape product names.
        assert!(n.html_body.contains("Tea &#60;Tin&#62;") || n.html_body.contains("Tea &lt;Tin&gt;"));
        assert!(n.attachment.is_some());
    }

    #[test]
    fn test_shipping_update_payload() {
        let mut order = order();
        advance_to(&mut order.shipping, ShippingStage::InTransit, Utc::now());

        let n = shipping_update("Shopfront", &order, &user()).unwrap();

        assert_eq!(n.subject, "Your Shopfront Order #12 is now In Transit");
        assert!(n.text_body.contains("In Transit"));
        assert!(n.attachment.is_none());
    }
}
