use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use url::Url;
use uuid::Uuid;

pub const MAX_RETRIES_LIMIT: i32 = 10;
pub const MAX_RETRY_DELAY_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookEvent {
    ResponseCreated,
    ResponseUpdated,
    ResponseDeleted,
    FormUpdated,
    /// Sent only by the test endpoint, never subscribed to.
    Test,
}

impl WebhookEvent {
    pub const SUBSCRIBABLE: [WebhookEvent; 4] = [
        Self::ResponseCreated,
        Self::ResponseUpdated,
        Self::ResponseDeleted,
        Self::FormUpdated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResponseCreated => "response.created",
            Self::ResponseUpdated => "response.updated",
            Self::ResponseDeleted => "response.deleted",
            Self::FormUpdated => "form.updated",
            Self::Test => "webhook.test",
        }
    }
}

impl fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SUBSCRIBABLE
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("unknown webhook event: {s}"))
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Webhook {
    pub id: Uuid,
    pub form_id: String,
    pub owner_id: String,
    pub url: String,
    pub events: Vec<String>,
    #[serde(skip_serializing)]
    pub secret: String,
    pub active: bool,
    pub max_retries: i32,
    pub retry_delay_ms: i64,
    pub last_triggered: Option<DateTime<Utc>>,
    pub last_status: Option<String>,
    pub success_count: i64,
    pub failure_count: i64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Webhook {
    pub fn subscribes_to(&self, event: WebhookEvent) -> bool {
        self.events.iter().any(|e| e == event.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: i32,
    pub retry_delay_ms: i64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl RetryConfig {
    fn clamped(self) -> Self {
        Self {
            max_retries: self.max_retries.clamp(0, MAX_RETRIES_LIMIT),
            retry_delay_ms: self.retry_delay_ms.clamp(0, MAX_RETRY_DELAY_MS),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookInput {
    pub form_id: String,
    pub url: String,
    pub events: Vec<String>,
    pub secret: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhookUpdate {
    pub url: Option<String>,
    pub events: Option<Vec<String>>,
    pub active: Option<bool>,
    pub description: Option<String>,
    pub retry: Option<RetryConfig>,
}

/// Accepts only absolute `http` or `https` URLs with a host.
pub fn validate_url(raw: &str) -> Result<String, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("Invalid webhook URL: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err("Webhook URL must be an http(s) URL".to_string());
    }
    Ok(url.to_string())
}

/// Parses a subscription list, requiring at least one known event.
pub fn validate_events(events: &[String]) -> Result<Vec<String>, String> {
    if events.is_empty() {
        return Err("At least one event is required".to_string());
    }
    let mut parsed: Vec<String> = Vec::with_capacity(events.len());
    for raw in events {
        let event: WebhookEvent = raw.parse()?;
        if !parsed.iter().any(|e| e == event.as_str()) {
            parsed.push(event.as_str().to_string());
        }
    }
    Ok(parsed)
}

/// 32 random bytes, hex encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl Webhook {
    pub async fn find(db: &PgPool, id: Uuid) -> Result<Option<Webhook>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM webhooks WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn list_for_form(db: &PgPool, form_id: &str) -> Result<Vec<Webhook>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM webhooks WHERE form_id = $1 ORDER BY created_at DESC")
            .bind(form_id)
            .fetch_all(db)
            .await
    }

    pub async fn active_for_event(
        db: &PgPool,
        form_id: &str,
        event: WebhookEvent,
    ) -> Result<Vec<Webhook>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM webhooks WHERE form_id = $1 AND active AND $2 = ANY(events)")
            .bind(form_id)
            .bind(event.as_str())
            .fetch_all(db)
            .await
    }

    pub async fn insert(
        db: &PgPool,
        owner_id: &str,
        input: WebhookInput,
        url: String,
        events: Vec<String>,
    ) -> Result<Webhook, sqlx::Error> {
        let retry = input.retry.clamped();
        let secret = input
            .secret
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(generate_secret);

        sqlx::query_as(
            "INSERT INTO webhooks (id, form_id, owner_id, url, events, secret, description,
                                   max_retries, retry_delay_ms)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&input.form_id)
        .bind(owner_id)
        .bind(url)
        .bind(events)
        .bind(secret)
        .bind(input.description)
        .bind(retry.max_retries)
        .bind(retry.retry_delay_ms)
        .fetch_one(db)
        .await
    }

    pub async fn update(
        &self,
        db: &PgPool,
        url: Option<String>,
        events: Option<Vec<String>>,
        update: WebhookUpdate,
    ) -> Result<Webhook, sqlx::Error> {
        let retry = update
            .retry
            .map(RetryConfig::clamped)
            .unwrap_or(RetryConfig {
                max_retries: self.max_retries,
                retry_delay_ms: self.retry_delay_ms,
            });

        sqlx::query_as(
            "UPDATE webhooks
             SET url = $2, events = $3, active = $4, description = $5, max_retries = $6,
                 retry_delay_ms = $7, updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(self.id)
        .bind(url.unwrap_or_else(|| self.url.clone()))
        .bind(events.unwrap_or_else(|| self.events.clone()))
        .bind(update.active.unwrap_or(self.active))
        .bind(update.description.or_else(|| self.description.clone()))
        .bind(retry.max_retries)
        .bind(retry.retry_delay_ms)
        .fetch_one(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM webhooks WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn record_delivery(db: &PgPool, id: Uuid, success: bool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE webhooks
             SET last_triggered = NOW(),
                 last_status = CASE WHEN $2 THEN 'success' ELSE 'failed' END,
                 success_count = success_count + CASE WHEN $2 THEN 1 ELSE 0 END,
                 failure_count = failure_count + CASE WHEN $2 THEN 0 ELSE 1 END
             WHERE id = $1",
        )
        .bind(id)
        .bind(success)
        .execute(db)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn urls_must_be_http() {
        assert_eq!(
            validate_url(" https://hooks.example.com/formcraft ").as_deref(),
            Ok("https://hooks.example.com/formcraft")
        );
        assert!(validate_url("ftp://example.com/x").is_err());
        assert!(validate_url("not a url").is_err());
    }

    #[test]
    fn events_are_checked_and_deduplicated() {
        let events = vec!["response.created".to_string(), "response.created".to_string(), "form.updated".to_string()];
        assert_eq!(
            validate_events(&events),
            Ok(vec!["response.created".to_string(), "form.updated".to_string()])
        );
        assert!(validate_events(&[]).is_err());
        assert!(validate_events(&["webhook.test".to_string()]).is_err());
    }

    #[test]
    fn generated_secrets_are_64_hex_chars() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn retry_config_is_clamped() {
        let retry = RetryConfig {
            max_retries: 99,
            retry_delay_ms: -5,
        }
        .clamped();
        assert_eq!(retry, RetryConfig { max_retries: 10, retry_delay_ms: 0 });
    }
}
