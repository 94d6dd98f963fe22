use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use form_analytics::Field;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use url::Url;

use super::IntegrationError;
use crate::config::GoogleConfig;
use crate::models::{Form, FormResponse, SheetsIntegration, display_value};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const SHEETS_API: &str = "https://sheets.googleapis.com";
const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Google OAuth and Sheets operations needed to mirror responses into a
/// spreadsheet.
#[async_trait]
pub trait SpreadsheetSyncClient: Send + Sync {
    /// Consent URL; `state` comes back on the callback.
    fn auth_url(&self, state: &str) -> Result<String, IntegrationError>;

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, IntegrationError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, IntegrationError>;

    /// Overwrites the first row of the sheet.
    async fn write_header(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        sheet: &str,
        row: Vec<String>,
    ) -> Result<(), IntegrationError>;

    async fn append_row(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        sheet: &str,
        row: Vec<String>,
    ) -> Result<(), IntegrationError>;
}

#[derive(Debug, Deserialize)]
struct TokenReply {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expiry")]
    expires_in: i64,
}

fn default_expiry() -> i64 {
    3600
}

pub struct GoogleSheetsClient {
    http: reqwest::Client,
    config: GoogleConfig,
    token_endpoint: String,
    sheets_api: String,
}

impl GoogleSheetsClient {
    pub fn new(http: reqwest::Client, config: GoogleConfig) -> Self {
        Self::with_endpoints(http, config, TOKEN_ENDPOINT, SHEETS_API)
    }

    pub fn with_endpoints(
        http: reqwest::Client,
        config: GoogleConfig,
        token_endpoint: impl Into<String>,
        sheets_api: impl Into<String>,
    ) -> Self {
        Self {
            http,
            config,
            token_endpoint: token_endpoint.into(),
            sheets_api: sheets_api.into(),
        }
    }

    fn credentials(&self) -> Result<(&str, &str), IntegrationError> {
        let id = self
            .config
            .client_id
            .as_deref()
            .ok_or(IntegrationError::NotConfigured("GOOGLE_CLIENT_ID"))?;
        let secret = self
            .config
            .client_secret
            .as_deref()
            .ok_or(IntegrationError::NotConfigured("GOOGLE_CLIENT_SECRET"))?;
        Ok((id, secret))
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenGrant, IntegrationError> {
        let response = self.http.post(&self.token_endpoint).form(params).send().await?;
        let reply: TokenReply = IntegrationError::check(response).await?.json().await?;
        Ok(TokenGrant {
            access_token: reply.access_token,
            refresh_token: reply.refresh_token,
            expires_at: Utc::now() + Duration::seconds(reply.expires_in),
        })
    }

    /// `{api}/v4/spreadsheets/{id}/values/{range}` with the range escaped.
    fn values_url(&self, spreadsheet_id: &str, range: &str) -> Result<Url, IntegrationError> {
        let mut url = Url::parse(&self.sheets_api)
            .map_err(|_| IntegrationError::NotConfigured("sheets api url"))?;
        url.path_segments_mut()
            .map_err(|_| IntegrationError::NotConfigured("sheets api url"))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", range]);
        Ok(url)
    }
}

#[async_trait]
impl SpreadsheetSyncClient for GoogleSheetsClient {
    fn auth_url(&self, state: &str) -> Result<String, IntegrationError> {
        let (client_id, _) = self.credentials()?;
        let url = Url::parse_with_params(
            AUTH_ENDPOINT,
            &[
                ("client_id", client_id),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("response_type", "code"),
                ("scope", SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|_| IntegrationError::NotConfigured("google auth url"))?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, IntegrationError> {
        let (client_id, client_secret) = self.credentials()?;
        self.token_request(&[
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", self.config.callback_url.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, IntegrationError> {
        let (client_id, client_secret) = self.credentials()?;
        self.token_request(&[
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn write_header(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        sheet: &str,
        row: Vec<String>,
    ) -> Result<(), IntegrationError> {
        let url = self.values_url(spreadsheet_id, &format!("{sheet}!A1"))?;
        let response = self
            .http
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(access_token)
            .json(&json!({ "values": [row] }))
            .send()
            .await?;
        IntegrationError::check(response).await?;
        Ok(())
    }

    async fn append_row(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        sheet: &str,
        row: Vec<String>,
    ) -> Result<(), IntegrationError> {
        let url = self.values_url(spreadsheet_id, &format!("{sheet}!A:Z:append"))?;
        let response = self
            .http
            .post(url)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .bearer_auth(access_token)
            .json(&json!({ "values": [row] }))
            .send()
            .await?;
        IntegrationError::check(response).await?;
        Ok(())
    }
}

pub fn header_row(fields: &[Field]) -> Vec<String> {
    ["Response ID".to_string(), "Submitted At".to_string()]
        .into_iter()
        .chain(fields.iter().map(|f| f.label.clone()))
        .collect()
}

/// One sheet row: response id, RFC 3339 submission time, then the answer to
/// each form field in order, blank when unanswered.
pub fn response_row(fields: &[Field], response: &FormResponse) -> Vec<String> {
    let mut row = vec![response.id.to_string(), response.submitted_at.to_rfc3339()];
    row.extend(fields.iter().map(|field| {
        response
            .answers
            .iter()
            .find(|a| a.field_id == field.id)
            .map(|a| display_value(&a.value))
            .unwrap_or_default()
    }));
    row
}

/// Appends one response to the integration's sheet, refreshing the token and
/// writing the header first when needed. Failures are added to the
/// integration's error log before being returned.
pub async fn sync_response(
    db: &PgPool,
    client: &dyn SpreadsheetSyncClient,
    integration: &mut SheetsIntegration,
    form: &Form,
    response: &FormResponse,
) -> Result<(), IntegrationError> {
    let result = try_sync(db, client, integration, form, response).await;
    if let Err(err) = &result {
        let message = format!("Sync of response {} failed: {err}", response.id);
        if let Err(log_err) = integration.record_error(db, &message).await {
            tracing::error!("failed to record sheets error: {log_err}");
        }
    }
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BulkSyncReport {
    pub synced_count: usize,
    pub total_responses: usize,
}

/// Appends every stored response of the form, oldest first. A failed row is
/// logged and skipped.
pub async fn bulk_sync(
    db: &PgPool,
    client: &dyn SpreadsheetSyncClient,
    integration: &mut SheetsIntegration,
    form: &Form,
) -> Result<BulkSyncReport, IntegrationError> {
    let responses = FormResponse::all_for_form(db, &form.id).await?;
    let mut synced_count = 0;
    for response in &responses {
        match sync_response(db, client, integration, form, response).await {
            Ok(()) => synced_count += 1,
            Err(err) => tracing::warn!(response = %response.id, "sheets sync failed: {err}"),
        }
    }
    Ok(BulkSyncReport {
        synced_count,
        total_responses: responses.len(),
    })
}

async fn try_sync(
    db: &PgPool,
    client: &dyn SpreadsheetSyncClient,
    integration: &mut SheetsIntegration,
    form: &Form,
    response: &FormResponse,
) -> Result<(), IntegrationError> {
    let spreadsheet_id = integration
        .spreadsheet_id
        .clone()
        .ok_or(IntegrationError::NotConfigured("spreadsheet"))?;

    if integration.token_expired(Utc::now()) {
        let grant = client.refresh(&integration.refresh_token).await?;
        integration
            .store_access_token(db, grant.access_token, grant.expires_at)
            .await?;
    }

    let sheet = integration.sheet_name.clone();
    if !integration.header_row_created {
        client
            .write_header(&integration.access_token, &spreadsheet_id, &sheet, header_row(&form.fields))
            .await?;
        integration.mark_header_written(db).await?;
    }

    client
        .append_row(
            &integration.access_token,
            &spreadsheet_id,
            &sheet,
            response_row(&form.fields, response),
        )
        .await?;
    integration.record_sync(db, response.id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use form_analytics::{Answer, FieldType};
    use pretty_assertions::assert_eq;
    use sqlx::types::Json;
    use uuid::Uuid;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn google() -> GoogleConfig {
        GoogleConfig {
            client_id: Some("client-id".into()),
            client_secret: Some("client-secret".into()),
            callback_url: "http://localhost:3000/api/google-sheets/callback".into(),
        }
    }

    fn fields() -> Vec<Field> {
        vec![
            Field::new("name", FieldType::ShortText, "Name"),
            Field::new("langs", FieldType::Checkbox, "Languages"),
        ]
    }

    #[test]
    fn rows_follow_field_order() {
        let response = FormResponse {
            id: Uuid::from_u128(7),
            form_id: "form".into(),
            answers: Json(vec![
                Answer::new("langs", serde_json::json!(["rust", "go"])),
                Answer::new("orphan", "x"),
            ]),
            ip: None,
            user_agent: None,
            responder_email: None,
            send_copy: false,
            submitted_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
        };

        assert_eq!(header_row(&fields()), vec!["Response ID", "Submitted At", "Name", "Languages"]);
        assert_eq!(
            response_row(&fields(), &response),
            vec![
                Uuid::from_u128(7).to_string(),
                "2024-05-01T08:30:00+00:00".to_string(),
                String::new(),
                "rust, go".to_string(),
            ]
        );
    }

    #[test]
    fn auth_url_requests_offline_spreadsheet_access() {
        let client = GoogleSheetsClient::new(reqwest::Client::new(), google());
        let url = Url::parse(&client.auth_url("form123").unwrap()).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(params["scope"], SCOPE);
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["state"], "form123");
        assert_eq!(params["client_id"], "client-id");
    }

    #[test]
    fn missing_credentials_are_reported() {
        let client = GoogleSheetsClient::new(reqwest::Client::new(), GoogleConfig::default());
        assert!(matches!(
            client.auth_url("f"),
            Err(IntegrationError::NotConfigured("GOOGLE_CLIENT_ID"))
        ));
    }

    #[tokio::test]
    async fn exchanges_code_for_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.token",
                "refresh_token": "1//refresh",
                "expires_in": 3599
            })))
            .mount(&server)
            .await;

        let client = GoogleSheetsClient::with_endpoints(
            reqwest::Client::new(),
            google(),
            format!("{}/token", server.uri()),
            server.uri(),
        );
        let grant = client.exchange_code("abc").await.unwrap();
        assert_eq!(grant.access_token, "ya29.token");
        assert_eq!(grant.refresh_token.as_deref(), Some("1//refresh"));
        assert!(grant.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn appends_rows_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet-1/values/Responses!A:Z:append"))
            .and(query_param("valueInputOption", "RAW"))
            .and(header("authorization", "Bearer ya29.token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = GoogleSheetsClient::with_endpoints(reqwest::Client::new(), google(), server.uri(), server.uri());
        client
            .append_row("ya29.token", "sheet-1", "Responses", vec!["a".into()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn upstream_errors_carry_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = GoogleSheetsClient::with_endpoints(reqwest::Client::new(), google(), server.uri(), server.uri());
        let err = client
            .write_header("t", "sheet-1", "Responses", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, IntegrationError::Upstream { status: 403, .. }));
    }
}
