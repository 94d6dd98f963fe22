use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::access::FormAccess;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::integrations::webhook::{DeliveryOutcome, deliver};
use crate::models::{Webhook, WebhookEvent, WebhookInput, WebhookUpdate, validate_events, validate_url};
use crate::state::AppState;

async fn own_webhook(state: &AppState, id: Uuid, user_id: &str) -> Result<Webhook, AppError> {
    let hook = Webhook::find(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Webhook"))?;
    if hook.owner_id != user_id {
        return Err(AppError::Forbidden("Not authorized to manage this webhook".into()));
    }
    Ok(hook)
}

/// Creation reply: the only time the signing secret is revealed.
#[derive(Debug, Serialize)]
pub struct CreatedWebhook {
    #[serde(flatten)]
    pub webhook: Webhook,
    pub secret: String,
}

pub async fn create_webhook(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<WebhookInput>,
) -> Result<(StatusCode, Json<CreatedWebhook>), AppError> {
    FormAccess::owner(&state.db, &input.form_id, &user_id).await?;
    let url = validate_url(&input.url).map_err(AppError::BadRequest)?;
    let events = validate_events(&input.events).map_err(AppError::BadRequest)?;

    let webhook = Webhook::insert(&state.db, &user_id, input, url, events).await?;
    tracing::info!(webhook = %webhook.id, form = %webhook.form_id, "webhook created");
    let secret = webhook.secret.clone();
    Ok((StatusCode::CREATED, Json(CreatedWebhook { webhook, secret })))
}

pub async fn list_for_form(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
) -> Result<Json<Vec<Webhook>>, AppError> {
    FormAccess::load(&state.db, &form_id, &user_id).await?;
    Ok(Json(Webhook::list_for_form(&state.db, &form_id).await?))
}

pub async fn get_webhook(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Webhook>, AppError> {
    Ok(Json(own_webhook(&state, id, &user_id).await?))
}

pub async fn update_webhook(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(update): Json<WebhookUpdate>,
) -> Result<Json<Webhook>, AppError> {
    let hook = own_webhook(&state, id, &user_id).await?;
    let url = update
        .url
        .as_deref()
        .map(validate_url)
        .transpose()
        .map_err(AppError::BadRequest)?;
    let events = update
        .events
        .as_deref()
        .map(validate_events)
        .transpose()
        .map_err(AppError::BadRequest)?;
    Ok(Json(hook.update(&state.db, url, events, update).await?))
}

pub async fn delete_webhook(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let hook = own_webhook(&state, id, &user_id).await?;
    Webhook::delete(&state.db, hook.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn test_webhook(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOutcome>, AppError> {
    let hook = own_webhook(&state, id, &user_id).await?;
    let data = json!({
        "message": "This is a test webhook from FormCraft",
        "webhook_id": hook.id,
    });
    let outcome = deliver(&state.http, state.config.webhook_timeout, &hook, WebhookEvent::Test, &data).await;
    Webhook::record_delivery(&state.db, hook.id, outcome.success).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Serialize)]
pub struct DeliveryLog {
    pub success_count: i64,
    pub failure_count: i64,
    pub last_triggered: Option<DateTime<Utc>>,
    pub last_status: Option<String>,
}

pub async fn webhook_logs(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryLog>, AppError> {
    let hook = own_webhook(&state, id, &user_id).await?;
    Ok(Json(DeliveryLog {
        success_count: hook.success_count,
        failure_count: hook.failure_count,
        last_triggered: hook.last_triggered,
        last_status: hook.last_status,
    }))
}
