//! Transactional email.
//!
//! [`EmailService`] delivers over SMTP via lettre. [`Mailer`] is what the
//! binaries hold: it renders a template, then spawns the send so request
//! handlers never wait on SMTP. Without SMTP configuration it logs and
//! skips.

pub mod templates;

use std::sync::Arc;

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use buildmart_core::Email;

pub use templates::RenderedEmail;

use crate::models::{Conversation, Message as ChatMessage, Order, OrderDetail, User};

/// SMTP settings.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
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
    /// Returns error if the SMTP relay can't be configured.
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

    /// Send a rendered email.
    ///
    /// # Errors
    ///
    /// Returns error if the message can't be built or SMTP delivery fails.
    pub async fn send(&self, to: &Email, email: &RenderedEmail) -> Result<(), MailError> {
        self.send_multipart_email(to.as_str(), &email.subject, &email.text, &email.html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), MailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| MailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| MailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

/// Fire-and-forget email dispatch shared by the storefront and admin.
#[derive(Clone)]
pub struct Mailer {
    service: Option<EmailService>,
    shop_url: Arc<str>,
}

impl Mailer {
    /// Build a mailer. `None` config disables delivery.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay can't be configured.
    pub fn new(config: Option<&EmailConfig>, shop_url: &str) -> Result<Self, MailError> {
        let service = config.map(EmailService::new).transpose()?;
        if service.is_none() {
            tracing::warn!("SMTP not configured, transactional email disabled");
        }
        Ok(Self {
            service,
            shop_url: shop_url.into(),
        })
    }

    /// A mailer that never sends.
    #[must_use]
    pub fn disabled(shop_url: &str) -> Self {
        Self {
            service: None,
            shop_url: shop_url.into(),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.service.is_some()
    }

    pub fn send_welcome(&self, user: &User) {
        self.dispatch(user.email.clone(), templates::welcome(user, &self.shop_url));
    }

    pub fn send_order_confirmation(&self, detail: &OrderDetail) {
        self.dispatch(
            detail.order.customer_email.clone(),
            templates::order_confirmation(detail, &self.shop_url),
        );
    }

    pub fn send_order_status(&self, order: &Order) {
        self.dispatch(
            order.customer_email.clone(),
            templates::order_status_update(order, &self.shop_url),
        );
    }

    pub fn send_support_reply(&self, to: &Email, conversation: &Conversation, message: &ChatMessage) {
        self.dispatch(
            to.clone(),
            templates::support_reply(conversation, message, &self.shop_url),
        );
    }

    fn dispatch(&self, to: Email, rendered: Result<RenderedEmail, askama::Error>) {
        let email = match rendered {
            Ok(email) => email,
            Err(e) => {
                tracing::error!(error = %e, to = %to, "Failed to render email");
                return;
            }
        };

        let Some(service) = self.service.clone() else {
            tracing::info!(to = %to, subject = %email.subject, "SMTP not configured, skipping email");
            return;
        };

        tokio::spawn(async move {
            if let Err(e) = service.send(&to, &email).await {
                tracing::error!(error = %e, to = %to, subject = %email.subject, "Failed to send email");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_config_debug_redacts_password() {
        let config = EmailConfig {
            smtp_host: "smtp.example.com".to_owned(),
            smtp_port: 587,
            smtp_username: "mailer".to_owned(),
            smtp_password: SecretString::from("hunter2-but-longer"),
            from_address: "BuildMart <orders@buildmart.example>".to_owned(),
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_disabled_mailer() {
        let mailer = Mailer::disabled("http://localhost:3000");
        assert!(!mailer.is_enabled());
    }
}
