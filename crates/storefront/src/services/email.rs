//! Email delivery for order notifications.
//!
//! Uses SMTP via lettre. Subjects and bodies arrive fully rendered from
//! `shopfront_core::notification`; this module only turns them into MIME
//! messages and hands them to the transport.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment as MimeAttachment, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use shopfront_core::lifecycle::ports::{DeliveryError, MessageSender};
use shopfront_core::notification::Notification;

use crate::config::EmailConfig;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Attachment declared an unusable content type.
    #[error("Invalid attachment content type: {0}")]
    InvalidContentType(String),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if SMTP connection fails.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send an assembled notification.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or the SMTP server rejects it.
    pub async fn send_notification(&self, notification: &Notification) -> Result<(), EmailError> {
        let email = build_message(&self.from_address, notification)?;
        self.mailer.send(email).await?;

        tracing::info!(
            to = %notification.recipient,
            subject = %notification.subject,
            "Email sent successfully"
        );
        Ok(())
    }
}

impl MessageSender for EmailService {
    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        self.send_notification(notification)
            .await
            .map_err(|e| DeliveryError(Box::new(e)))
    }
}

/// Build a text+HTML message, wrapped with the attachment when there is one.
fn build_message(from_address: &str, notification: &Notification) -> Result<Message, EmailError> {
    let to = notification.recipient.as_str();
    let builder = Message::builder()
        .from(
            from_address
                .parse()
                .map_err(|_| EmailError::InvalidAddress(from_address.to_string()))?,
        )
        .to(to
            .parse()
            .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
        .subject(&notification.subject);

    let body = MultiPart::alternative()
        .singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_PLAIN)
                .body(notification.text_body.clone()),
        )
        .singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(notification.html_body.clone()),
        );

    let message = match &notification.attachment {
        Some(attachment) => {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|_| EmailError::InvalidContentType(attachment.content_type.clone()))?;
            let part = MimeAttachment::new(attachment.filename.clone())
                .body(attachment.data.clone(), content_type);
            builder.multipart(MultiPart::mixed().multipart(body).singlepart(part))?
        }
        None => builder.multipart(body)?,
    };

    Ok(message)
}
