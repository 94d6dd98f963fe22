use form_analytics::Answer;
use serde::Deserialize;
use serde_json::json;

use super::IntegrationError;
use crate::models::{Form, SlackIntegration, display_value};

pub const SLACK_API_BASE: &str = "https://slack.com/api";

/// Fills in the message template and appends mentions and answers.
pub fn render_message(
    integration: &SlackIntegration,
    form: &Form,
    answers: &[Answer],
    response_count: i64,
) -> String {
    let mut text = integration
        .message_template
        .replace("{{form_title}}", &form.title)
        .replace("{{response_count}}", &response_count.to_string());

    if !integration.mention_users.is_empty() {
        let mentions: Vec<String> = integration
            .mention_users
            .iter()
            .map(|user| format!("<@{}>", user.trim_start_matches('@')))
            .collect();
        text = format!("{} {text}", mentions.join(" "));
    }

    if integration.include_answers && !answers.is_empty() {
        text.push('\n');
        for answer in answers {
            text.push_str(&format!(
                "\n*{}*: {}",
                form.label_of(&answer.field_id),
                display_value(&answer.value)
            ));
        }
    }
    text
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Posts messages through an incoming webhook or the Web API.
#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
}

impl SlackClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_api_base(http, SLACK_API_BASE)
    }

    pub fn with_api_base(http: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
        }
    }

    pub async fn post(&self, integration: &SlackIntegration, text: &str) -> Result<(), IntegrationError> {
        if let Some(url) = integration.webhook_url.as_deref() {
            let mut body = json!({ "text": text });
            if let Some(channel) = integration.channel.as_deref() {
                body["channel"] = json!(channel);
            }
            let response = self.http.post(url).json(&body).send().await?;
            IntegrationError::check(response).await?;
            return Ok(());
        }

        let token = integration
            .bot_token
            .as_deref()
            .ok_or(IntegrationError::NotConfigured("slack destination"))?;
        let channel = integration
            .channel
            .as_deref()
            .ok_or(IntegrationError::NotConfigured("slack channel"))?;

        let response = self
            .http
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(token)
            .json(&json!({ "channel": channel, "text": text }))
            .send()
            .await?;
        let reply: ApiReply = IntegrationError::check(response).await?.json().await?;
        if !reply.ok {
            return Err(IntegrationError::Upstream {
                status: 200,
                body: reply.error.unwrap_or_else(|| "unknown_error".to_string()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DEFAULT_SLACK_TEMPLATE, FormKind, FormSettings};
    use chrono::Utc;
    use form_analytics::{Field, FieldType};
    use pretty_assertions::assert_eq;
    use sqlx::types::Json;
    use uuid::Uuid;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn form() -> Form {
        Form {
            id: "form".into(),
            owner_id: "owner".into(),
            title: "Bug report".into(),
            description: String::new(),
            kind: Json(FormKind::General),
            logo: None,
            header_image: None,
            custom_details: Json(vec![]),
            fields: Json(vec![
                Field::new("sev", FieldType::Radio, "Severity"),
                Field::new("tags", FieldType::Checkbox, "Tags"),
            ]),
            settings: Json(FormSettings::default()),
            source_template: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn integration() -> SlackIntegration {
        SlackIntegration {
            id: Uuid::new_v4(),
            form_id: "form".into(),
            owner_id: "owner".into(),
            workspace_id: None,
            webhook_url: None,
            channel: None,
            bot_token: None,
            active: true,
            notify_on: vec!["response.created".into()],
            mention_users: vec![],
            thread_replies: false,
            include_answers: true,
            message_template: DEFAULT_SLACK_TEMPLATE.into(),
            notification_count: 0,
            error_count: 0,
            last_notified_at: None,
            errors: Json(vec![]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn renders_template_mentions_and_answers() {
        let mut slack = integration();
        slack.message_template = "{{form_title}} has {{response_count}} responses".into();
        slack.mention_users = vec!["U123".into(), "@U456".into()];
        let answers = vec![
            Answer::new("sev", "high"),
            Answer::new("tags", serde_json::json!(["ui", "crash"])),
        ];

        assert_eq!(
            render_message(&slack, &form(), &answers, 7),
            "<@U123> <@U456> Bug report has 7 responses\n\n*Severity*: high\n*Tags*: ui, crash"
        );
    }

    #[test]
    fn answers_can_be_left_out() {
        let mut slack = integration();
        slack.include_answers = false;
        assert_eq!(
            render_message(&slack, &form(), &[Answer::new("sev", "low")], 1),
            "New response received for Bug report"
        );
    }

    #[tokio::test]
    async fn posts_to_incoming_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/T/B/X"))
            .and(body_json(serde_json::json!({"text": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let mut slack = integration();
        slack.webhook_url = Some(format!("{}/services/T/B/X", server.uri()));
        SlackClient::new(reqwest::Client::new())
            .post(&slack, "hello")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn bot_token_uses_chat_post_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": false, "error": "channel_not_found"})))
            .mount(&server)
            .await;

        let mut slack = integration();
        slack.bot_token = Some("xoxb-test".into());
        slack.channel = Some("#nowhere".into());
        let err = SlackClient::with_api_base(reqwest::Client::new(), server.uri())
            .post(&slack, "hello")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("channel_not_found"));
    }
}
