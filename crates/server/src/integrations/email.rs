use async_trait::async_trait;
use form_analytics::Answer;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use super::IntegrationError;
use crate::config::SmtpConfig;
use crate::models::{Form, display_value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Tells the form owner about a new response.
    pub fn new_response(to: &str, form: &Form, answers: &[Answer]) -> Self {
        Self {
            to: to.to_string(),
            subject: format!("New response: {}", form.title),
            body: format!(
                "A new response has been submitted to \"{}\".\n\n{}",
                form.title,
                answer_lines(form, answers)
            ),
        }
    }

    /// Sends the respondent a copy of what they submitted.
    pub fn responder_copy(to: &str, form: &Form, answers: &[Answer]) -> Self {
        let intro = form
            .settings
            .custom_message
            .clone()
            .unwrap_or_else(|| "Thank you for your submission!".to_string());
        Self {
            to: to.to_string(),
            subject: format!("Your response to {}", form.title),
            body: format!("{intro}\n\nHere is a copy of your answers:\n\n{}", answer_lines(form, answers)),
        }
    }
}

fn answer_lines(form: &Form, answers: &[Answer]) -> String {
    answers
        .iter()
        .map(|a| format!("{}: {}", form.label_of(&a.field_id), display_value(&a.value)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), IntegrationError>;
}

/// Delivers over SMTP with STARTTLS.
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSender {
    pub fn new(config: &SmtpConfig) -> Result<Self, IntegrationError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| IntegrationError::Mail(e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(config.user.clone(), config.password.clone()))
            .build();
        let from = config
            .user
            .parse()
            .map_err(|e: lettre::address::AddressError| IntegrationError::Mail(e.to_string()))?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl NotificationSender for SmtpSender {
    async fn send(&self, notification: Notification) -> Result<(), IntegrationError> {
        let to: Mailbox = notification
            .to
            .parse()
            .map_err(|e: lettre::address::AddressError| IntegrationError::Mail(e.to_string()))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notification.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body)
            .map_err(|e| IntegrationError::Mail(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| IntegrationError::Mail(e.to_string()))?;
        Ok(())
    }
}

/// Used when SMTP is not configured: logs and drops every message.
pub struct DisabledSender;

#[async_trait]
impl NotificationSender for DisabledSender {
    async fn send(&self, notification: Notification) -> Result<(), IntegrationError> {
        tracing::info!(to = %notification.to, subject = %notification.subject, "email disabled, dropping message");
        Ok(())
    }
}
