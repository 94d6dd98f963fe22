use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use form_analytics::{FieldAnalytics, FormStats, Granularity, TimelinePoint};
use serde::{Deserialize, de::DeserializeOwned};

#[derive(Debug, Clone, Deserialize)]
pub struct FormSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub fields: Vec<FieldRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldRef {
    pub id: String,
}

impl FormSummary {
    /// Field ids in the order the form presents them.
    pub fn field_order(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.id.as_str()).collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct TimelineReply {
    pub granularity: Granularity,
    pub timeline: Vec<TimelinePoint>,
}

/// Authenticated calls to the FormCraft backend.
pub struct Api {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl Api {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            anyhow::bail!("API error ({}): {}", status, text);
        }
        Ok(response.json().await?)
    }

    pub async fn forms(&self) -> anyhow::Result<Vec<FormSummary>> {
        self.get("/api/forms").await
    }

    pub async fn stats(&self, form_id: &str) -> anyhow::Result<FormStats> {
        self.get(&format!("/api/forms/{form_id}/analytics/stats")).await
    }

    pub async fn fields(&self, form_id: &str) -> anyhow::Result<BTreeMap<String, FieldAnalytics>> {
        self.get(&format!("/api/forms/{form_id}/analytics/fields")).await
    }

    pub async fn timeline(&self, form_id: &str, granularity: Granularity) -> anyhow::Result<TimelineReply> {
        let name = match granularity {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        };
        self.get(&format!("/api/forms/{form_id}/analytics/timeline?granularity={name}"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn lists_forms_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/forms"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": "abc123DEF456",
                "title": "Team lunch",
                "owner_id": "u1",
                "updated_at": "2024-05-01T10:00:00Z",
                "fields": [
                    {"id": "zeta", "type": "short_text", "label": "Name"},
                    {"id": "alpha", "type": "radio", "label": "Dish"}
                ]
            }])))
            .mount(&server)
            .await;

        let forms = Api::new(server.uri(), "tok").forms().await.unwrap();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].title, "Team lunch");
        assert_eq!(forms[0].field_order(), vec!["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn asks_for_the_chosen_granularity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/forms/f1/analytics/timeline"))
            .and(query_param("granularity", "monthly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "granularity": "monthly",
                "timeline": [{"period": "2024-05", "submissions": 3}]
            })))
            .mount(&server)
            .await;

        let reply = Api::new(server.uri(), "tok")
            .timeline("f1", Granularity::Monthly)
            .await
            .unwrap();
        assert_eq!(reply.granularity, Granularity::Monthly);
        assert_eq!(reply.timeline[0].submissions, 3);
    }

    #[tokio::test]
    async fn surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let err = Api::new(server.uri(), "tok").stats("f1").await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }
}
