use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use sqlx::PgPool;

use super::IntegrationError;
use crate::models::{Webhook, WebhookEvent};

pub const EVENT_HEADER: &str = "X-FormCraft-Event";
pub const SIGNATURE_HEADER: &str = "X-FormCraft-Signature";

type HmacSha256 = Hmac<Sha256>;

/// `sha256=<hex hmac>` of the exact request body.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, IntegrationError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| IntegrationError::Signing)?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[derive(Debug, Serialize)]
pub struct Payload<'a> {
    pub event: &'a str,
    pub form_id: &'a str,
    pub timestamp: chrono::DateTime<Utc>,
    pub data: &'a Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub attempts: u32,
    pub status: Option<u16>,
    pub error: Option<String>,
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff(retry_delay_ms: i64, attempt: u32) -> Duration {
    let base = u64::try_from(retry_delay_ms).unwrap_or(0);
    Duration::from_millis(base.saturating_mul(1u64 << (attempt - 1).min(16)))
}

/// POSTs one event to one webhook, retrying failures up to the hook's
/// `max_retries` with exponential backoff.
pub async fn deliver(
    http: &reqwest::Client,
    timeout: Duration,
    hook: &Webhook,
    event: WebhookEvent,
    data: &Value,
) -> DeliveryOutcome {
    let payload = Payload {
        event: event.as_str(),
        form_id: &hook.form_id,
        timestamp: Utc::now(),
        data,
    };
    let body = match serde_json::to_vec(&payload) {
        Ok(body) => body,
        Err(err) => {
            return DeliveryOutcome {
                success: false,
                attempts: 0,
                status: None,
                error: Some(err.to_string()),
            };
        }
    };
    let signature = match sign(&hook.secret, &body) {
        Ok(signature) => signature,
        Err(err) => {
            return DeliveryOutcome {
                success: false,
                attempts: 0,
                status: None,
                error: Some(err.to_string()),
            };
        }
    };
    let max_attempts = 1 + u32::try_from(hook.max_retries).unwrap_or(0);

    let mut outcome = DeliveryOutcome {
        success: false,
        attempts: 0,
        status: None,
        error: None,
    };
    for attempt in 1..=max_attempts {
        if attempt > 1 {
            tokio::time::sleep(backoff(hook.retry_delay_ms, attempt - 1)).await;
        }
        outcome.attempts = attempt;

        let result = http
            .post(&hook.url)
            .timeout(timeout)
            .header("Content-Type", "application/json")
            .header(EVENT_HEADER, event.as_str())
            .header(SIGNATURE_HEADER, &signature)
            .body(body.clone())
            .send()
            .await
            .map_err(IntegrationError::from);

        match result {
            Ok(response) if response.status().is_success() => {
                outcome.status = Some(response.status().as_u16());
                outcome.success = true;
                outcome.error = None;
                return outcome;
            }
            Ok(response) => {
                let status = response.status();
                outcome.status = Some(status.as_u16());
                outcome.error = Some(format!("HTTP {status}"));
            }
            Err(err) => {
                outcome.status = None;
                outcome.error = Some(err.to_string());
            }
        }
        tracing::debug!(webhook = %hook.id, attempt, error = ?outcome.error, "webhook attempt failed");
    }
    outcome
}

/// Delivers `event` to every active webhook of the form subscribed to it and
/// records each outcome.
pub async fn dispatch(
    db: &PgPool,
    http: &reqwest::Client,
    timeout: Duration,
    form_id: &str,
    event: WebhookEvent,
    data: Value,
) -> Result<(), IntegrationError> {
    let hooks = Webhook::active_for_event(db, form_id, event).await?;
    for hook in hooks {
        let outcome = deliver(http, timeout, &hook, event, &data).await;
        if outcome.success {
            tracing::info!(webhook = %hook.id, %event, "webhook delivered");
        } else {
            tracing::warn!(
                webhook = %hook.id,
                %event,
                attempts = outcome.attempts,
                error = ?outcome.error,
                "webhook delivery failed"
            );
        }
        Webhook::record_delivery(db, hook.id, outcome.success).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn hook(url: String, max_retries: i32) -> Webhook {
        Webhook {
            id: Uuid::new_v4(),
            form_id: "form123".into(),
            owner_id: "owner".into(),
            url,
            events: vec!["response.created".into()],
            secret: "topsecret".into(),
            active: true,
            max_retries,
            retry_delay_ms: 1,
            last_triggered: None,
            last_status: None,
            success_count: 0,
            failure_count: 0,
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn signature_is_hex_hmac_sha256() {
        // RFC 4231 test case 2
        let signature = sign("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn any_secret_length_signs() {
        assert!(sign("", b"{}").unwrap().starts_with("sha256="));
        let long = "k".repeat(4096);
        assert_eq!(sign(&long, b"{}").unwrap().len(), "sha256=".len() + 64);
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff(1000, 1), Duration::from_millis(1000));
        assert_eq!(backoff(1000, 2), Duration::from_millis(2000));
        assert_eq!(backoff(1000, 3), Duration::from_millis(4000));
        assert_eq!(backoff(-1, 3), Duration::ZERO);
    }

    #[tokio::test]
    async fn delivers_signed_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header(EVENT_HEADER, "response.created"))
            .and(header_exists(SIGNATURE_HEADER))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let hook = hook(format!("{}/hook", server.uri()), 3);
        let outcome = deliver(
            &reqwest::Client::new(),
            Duration::from_secs(5),
            &hook,
            WebhookEvent::ResponseCreated,
            &json!({"response_id": "r1"}),
        )
        .await;

        assert!(outcome.success);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.status, Some(200));

        let requests = server.received_requests().await.unwrap();
        let body = &requests[0].body;
        let sent = requests[0].headers.get(SIGNATURE_HEADER).unwrap().to_str().unwrap();
        assert_eq!(sent, sign("topsecret", body).unwrap());

        let payload: Value = serde_json::from_slice(body).unwrap();
        assert_eq!(payload["event"], "response.created");
        assert_eq!(payload["form_id"], "form123");
        assert_eq!(payload["data"]["response_id"], "r1");
    }

    #[tokio::test]
    async fn retries_until_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let hook = hook(server.uri(), 2);
        let outcome = deliver(
            &reqwest::Client::new(),
            Duration::from_secs(5),
            &hook,
            WebhookEvent::ResponseCreated,
            &json!({}),
        )
        .await;

        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.status, Some(503));
    }

    #[tokio::test]
    async fn recovers_after_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let outcome = deliver(
            &reqwest::Client::new(),
            Duration::from_secs(5),
            &hook(server.uri(), 3),
            WebhookEvent::FormUpdated,
            &json!({}),
        )
        .await;

        assert!(outcome.success);
        assert_eq!(outcome.attempts, 2);
    }
}
