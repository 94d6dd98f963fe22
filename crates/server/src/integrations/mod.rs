//! Outbound adapters: email, webhooks, Slack and Google Sheets.
//!
//! Every adapter reports failures as [`IntegrationError`]. Failures triggered
//! by a submission are logged by [`dispatch`] and never reach the respondent.

pub mod dispatch;
pub mod email;
pub mod sheets;
pub mod slack;
pub mod webhook;

#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("mail delivery failed: {0}")]
    Mail(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("webhook secret cannot key the signature")]
    Signing,
}

impl IntegrationError {
    /// Turns a non-success response into [`IntegrationError::Upstream`].
    pub async fn check(response: reqwest::Response) -> Result<reqwest::Response, IntegrationError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(IntegrationError::Upstream {
            status: status.as_u16(),
            body,
        })
    }
}
