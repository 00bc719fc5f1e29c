//! Invoice documents.
//!
//! Renders a standalone HTML invoice for an order. The same document is
//! attached to confirmation emails and served from `/orders/{id}/invoice`.

use askama::Template;

use shopfront_core::lifecycle::ports::{InvoiceRenderer, RenderError};
use shopfront_core::notification::Attachment;
use shopfront_core::{Order, User};

/// MIME type of rendered invoices.
pub const INVOICE_CONTENT_TYPE: &str = "text/html; charset=utf-8";

#[derive(Template)]
#[template(path = "invoice.html")]
struct InvoiceHtml<'a> {
    store_name: &'a str,
    order: &'a Order,
    user: &'a User,
}

/// Askama-backed invoice renderer.
#[derive(Debug, Clone)]
pub struct HtmlInvoiceRenderer {
    store_name: String,
}

impl HtmlInvoiceRenderer {
    #[must_use]
    pub fn new(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
        }
    }

    /// Render the invoice page.
    ///
    /// # Errors
    ///
    /// Returns `askama::Error` if the template fails to render.
    pub fn render_html(&self, order: &Order, user: &User) -> Result<String, askama::Error> {
        InvoiceHtml {
            store_name: &self.store_name,
            order,
            user,
        }
        .render()
    }
}

/// File name used for an order's invoice.
#[must_use]
pub fn invoice_filename(order: &Order) -> String {
    format!("invoice_order_{}.html", order.id)
}

impl InvoiceRenderer for HtmlInvoiceRenderer {
    fn render_invoice(&self, order: &Order, user: &User) -> Result<Attachment, RenderError> {
        let html = self
            .render_html(order, user)
            .map_err(|e| RenderError(Box::new(e)))?;

        Ok(Attachment {
            filename: invoice_filename(order),
            content_type: INVOICE_CONTENT_TYPE.to_string(),
            data: html.into_bytes(),
        })
    }
}
