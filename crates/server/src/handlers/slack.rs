use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use crate::access::FormAccess;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{SlackInput, SlackIntegration, SlackUpdate, WebhookEvent, validate_events};
use crate::state::AppState;

async fn integration_for(state: &AppState, form_id: &str) -> Result<SlackIntegration, AppError> {
    SlackIntegration::for_form(&state.db, form_id)
        .await?
        .ok_or_else(|| AppError::not_found("Slack integration"))
}

pub async fn upsert_slack(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<SlackInput>,
) -> Result<Json<SlackIntegration>, AppError> {
    FormAccess::owner(&state.db, &input.form_id, &user_id).await?;
    let input = input.normalized().map_err(AppError::BadRequest)?;
    let notify_on = match &input.notify_on {
        Some(events) => validate_events(events).map_err(AppError::BadRequest)?,
        None => vec![WebhookEvent::ResponseCreated.as_str().to_string()],
    };

    let integration = SlackIntegration::upsert(&state.db, &user_id, input, notify_on).await?;
    tracing::info!(form = %integration.form_id, "slack integration saved");
    Ok(Json(integration))
}

pub async fn get_slack(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
) -> Result<Json<SlackIntegration>, AppError> {
    FormAccess::owner(&state.db, &form_id, &user_id).await?;
    Ok(Json(integration_for(&state, &form_id).await?))
}

pub async fn update_slack(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
    Json(update): Json<SlackUpdate>,
) -> Result<Json<SlackIntegration>, AppError> {
    FormAccess::owner(&state.db, &form_id, &user_id).await?;
    let integration = integration_for(&state, &form_id).await?;
    let notify_on = update
        .notify_on
        .as_deref()
        .map(validate_events)
        .transpose()
        .map_err(AppError::BadRequest)?;
    Ok(Json(integration.update(&state.db, update, notify_on).await?))
}

pub async fn delete_slack(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
) -> Result<StatusCode, AppError> {
    FormAccess::owner(&state.db, &form_id, &user_id).await?;
    if !SlackIntegration::delete_for_form(&state.db, &form_id).await? {
        return Err(AppError::not_found("Slack integration"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn test_slack(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let form = FormAccess::owner(&state.db, &form_id, &user_id).await?;
    let integration = integration_for(&state, &form_id).await?;
    let text = format!("Test notification from FormCraft for \"{}\"", form.title);

    if let Err(err) = state.slack.post(&integration, &text).await {
        if let Err(log_err) = integration.record_failure(&state.db, &err.to_string()).await {
            tracing::error!(form = %form_id, "failed to record slack outcome: {log_err}");
        }
        return Err(err.into());
    }
    SlackIntegration::record_success(&state.db, integration.id).await?;
    Ok(Json(json!({ "message": "Test message sent" })))
}
