use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use super::{ErrorLogEntry, WebhookEvent, push_error_log};

pub const DEFAULT_SLACK_TEMPLATE: &str = "New response received for {{form_title}}";

/// Slack notification settings for one form.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SlackIntegration {
    pub id: Uuid,
    pub form_id: String,
    pub owner_id: String,
    pub workspace_id: Option<String>,
    pub webhook_url: Option<String>,
    pub channel: Option<String>,
    #[serde(skip_serializing)]
    pub bot_token: Option<String>,
    pub active: bool,
    pub notify_on: Vec<String>,
    pub mention_users: Vec<String>,
    pub thread_replies: bool,
    pub include_answers: bool,
    pub message_template: String,
    pub notification_count: i64,
    pub error_count: i64,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub errors: Json<Vec<ErrorLogEntry>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SlackIntegration {
    pub fn notifies_on(&self, event: WebhookEvent) -> bool {
        self.active && self.notify_on.iter().any(|e| e == event.as_str())
    }

    pub fn has_bot_token(&self) -> bool {
        self.bot_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackInput {
    pub form_id: String,
    pub workspace_id: Option<String>,
    pub webhook_url: Option<String>,
    pub bot_token: Option<String>,
    pub channel: Option<String>,
    pub notify_on: Option<Vec<String>>,
    #[serde(default)]
    pub mention_users: Vec<String>,
    #[serde(default)]
    pub thread_replies: bool,
    #[serde(default = "default_true")]
    pub include_answers: bool,
    pub message_template: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SlackUpdate {
    pub webhook_url: Option<String>,
    pub channel: Option<String>,
    pub bot_token: Option<String>,
    pub notify_on: Option<Vec<String>>,
    pub mention_users: Option<Vec<String>>,
    pub thread_replies: Option<bool>,
    pub include_answers: Option<bool>,
    pub message_template: Option<String>,
    pub active: Option<bool>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl SlackInput {
    /// Needs somewhere to post: an incoming webhook or a bot token.
    pub fn normalized(mut self) -> Result<Self, String> {
        self.webhook_url = non_empty(self.webhook_url);
        self.bot_token = non_empty(self.bot_token);
        self.channel = non_empty(self.channel);
        if self.webhook_url.is_none() && self.bot_token.is_none() {
            return Err("Either webhook_url or bot_token is required".to_string());
        }
        if self.webhook_url.is_none() && self.channel.is_none() {
            return Err("A channel is required when posting with a bot token".to_string());
        }
        Ok(self)
    }
}

impl SlackIntegration {
    pub async fn for_form(db: &PgPool, form_id: &str) -> Result<Option<SlackIntegration>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM slack_integrations WHERE form_id = $1")
            .bind(form_id)
            .fetch_optional(db)
            .await
    }

    pub async fn upsert(
        db: &PgPool,
        owner_id: &str,
        input: SlackInput,
        notify_on: Vec<String>,
    ) -> Result<SlackIntegration, sqlx::Error> {
        let template = non_empty(input.message_template).unwrap_or_else(|| DEFAULT_SLACK_TEMPLATE.to_string());

        sqlx::query_as(
            "INSERT INTO slack_integrations (id, form_id, owner_id, workspace_id, webhook_url, channel,
                                             bot_token, notify_on, mention_users, thread_replies,
                                             include_answers, message_template)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (form_id) DO UPDATE
             SET owner_id = $3, workspace_id = $4, webhook_url = $5, channel = $6, bot_token = $7,
                 notify_on = $8, mention_users = $9, thread_replies = $10, include_answers = $11,
                 message_template = $12, active = TRUE, updated_at = NOW()
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&input.form_id)
        .bind(owner_id)
        .bind(input.workspace_id)
        .bind(input.webhook_url)
        .bind(input.channel)
        .bind(input.bot_token)
        .bind(notify_on)
        .bind(input.mention_users)
        .bind(input.thread_replies)
        .bind(input.include_answers)
        .bind(template)
        .fetch_one(db)
        .await
    }

    pub async fn update(
        &self,
        db: &PgPool,
        update: SlackUpdate,
        notify_on: Option<Vec<String>>,
    ) -> Result<SlackIntegration, sqlx::Error> {
        sqlx::query_as(
            "UPDATE slack_integrations
             SET webhook_url = $2, channel = $3, bot_token = $4, notify_on = $5, mention_users = $6,
                 thread_replies = $7, include_answers = $8, message_template = $9, active = $10,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(self.id)
        .bind(non_empty(update.webhook_url).or_else(|| self.webhook_url.clone()))
        .bind(non_empty(update.channel).or_else(|| self.channel.clone()))
        .bind(non_empty(update.bot_token).or_else(|| self.bot_token.clone()))
        .bind(notify_on.unwrap_or_else(|| self.notify_on.clone()))
        .bind(update.mention_users.unwrap_or_else(|| self.mention_users.clone()))
        .bind(update.thread_replies.unwrap_or(self.thread_replies))
        .bind(update.include_answers.unwrap_or(self.include_answers))
        .bind(non_empty(update.message_template).unwrap_or_else(|| self.message_template.clone()))
        .bind(update.active.unwrap_or(self.active))
        .fetch_one(db)
        .await
    }

    pub async fn delete_for_form(db: &PgPool, form_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM slack_integrations WHERE form_id = $1")
            .bind(form_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn record_success(db: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE slack_integrations
             SET notification_count = notification_count + 1, last_notified_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn record_failure(&self, db: &PgPool, message: &str) -> Result<(), sqlx::Error> {
        let mut errors = self.errors.0.clone();
        push_error_log(&mut errors, message, Utc::now());
        sqlx::query(
            "UPDATE slack_integrations
             SET error_count = error_count + 1, errors = $2
             WHERE id = $1",
        )
        .bind(self.id)
        .bind(Json(errors))
        .execute(db)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(webhook_url: Option<&str>, bot_token: Option<&str>, channel: Option<&str>) -> SlackInput {
        SlackInput {
            form_id: "form".into(),
            workspace_id: None,
            webhook_url: webhook_url.map(str::to_string),
            bot_token: bot_token.map(str::to_string),
            channel: channel.map(str::to_string),
            notify_on: None,
            mention_users: vec![],
            thread_replies: false,
            include_answers: true,
            message_template: None,
        }
    }

    #[test]
    fn a_destination_is_required() {
        assert!(input(None, Some("  "), None).normalized().is_err());
        assert!(input(Some("https://hooks.slack.com/services/T/B/X"), None, None).normalized().is_ok());
        assert!(input(None, Some("xoxb-1"), None).normalized().is_err());
        assert!(input(None, Some("xoxb-1"), Some("#forms")).normalized().is_ok());
    }

    #[test]
    fn include_answers_defaults_on() {
        let parsed: SlackInput = serde_json::from_value(serde_json::json!({
            "form_id": "f",
            "webhook_url": "https://hooks.slack.com/services/T/B/X"
        }))
        .unwrap();
        assert!(parsed.include_answers);
        assert!(parsed.mention_users.is_empty());
    }
}
