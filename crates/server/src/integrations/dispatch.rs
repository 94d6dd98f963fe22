//! Background fan-out of form events to every configured integration.
//!
//! Each entry point spawns its work and returns immediately, so the request
//! that triggered the event is never delayed or failed by an integration.

use serde_json::{Value, json};

use super::email::Notification;
use super::{IntegrationError, sheets, slack, webhook};
use crate::models::{Form, FormResponse, SheetsIntegration, SlackIntegration, WebhookEvent};
use crate::state::AppState;

/// Side effects of a new submission: emails, webhooks, Slack and Sheets.
pub fn response_created(state: &AppState, form: Form, response: FormResponse) {
    let state = state.clone();
    tokio::spawn(async move {
        if let Some(to) = form.settings.notification_target() {
            let mail = Notification::new_response(to, &form, &response.answers);
            if let Err(err) = state.notifier.send(mail).await {
                tracing::warn!(form = %form.id, "owner notification failed: {err}");
            }
        }

        if let Some(to) = response.responder_email.as_deref().filter(|_| response.send_copy) {
            let mail = Notification::responder_copy(to, &form, &response.answers);
            if let Err(err) = state.notifier.send(mail).await {
                tracing::warn!(form = %form.id, "responder copy failed: {err}");
            }
        }

        let data = response_payload(&response);
        webhooks(&state, &form.id, WebhookEvent::ResponseCreated, data).await;
        notify_slack(&state, &form, &response, WebhookEvent::ResponseCreated).await;

        match SheetsIntegration::for_form(&state.db, &form.id).await {
            Ok(Some(mut integration)) if integration.active && integration.sync_on_submit => {
                if let Err(err) =
                    sheets::sync_response(&state.db, state.sheets.as_ref(), &mut integration, &form, &response)
                        .await
                {
                    tracing::warn!(form = %form.id, response = %response.id, "sheets sync failed: {err}");
                }
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(form = %form.id, "failed to load sheets integration: {err}"),
        }
    });
}

pub fn response_deleted(state: &AppState, form: Form, response: FormResponse) {
    let state = state.clone();
    tokio::spawn(async move {
        let data = response_payload(&response);
        webhooks(&state, &form.id, WebhookEvent::ResponseDeleted, data).await;
        notify_slack(&state, &form, &response, WebhookEvent::ResponseDeleted).await;
    });
}

pub fn form_updated(state: &AppState, form: &Form) {
    let state = state.clone();
    let form_id = form.id.clone();
    let data = json!({
        "form_id": form.id,
        "title": form.title,
        "field_count": form.fields.len(),
        "updated_at": form.updated_at,
    });
    tokio::spawn(async move {
        webhooks(&state, &form_id, WebhookEvent::FormUpdated, data).await;
    });
}

fn response_payload(response: &FormResponse) -> Value {
    json!({
        "response_id": response.id,
        "form_id": response.form_id,
        "answers": response.answers,
        "responder_email": response.responder_email,
        "submitted_at": response.submitted_at,
    })
}

async fn webhooks(state: &AppState, form_id: &str, event: WebhookEvent, data: Value) {
    let timeout = state.config.webhook_timeout;
    if let Err(err) = webhook::dispatch(&state.db, &state.http, timeout, form_id, event, data).await {
        tracing::warn!(form = %form_id, %event, "webhook dispatch failed: {err}");
    }
}

async fn notify_slack(state: &AppState, form: &Form, response: &FormResponse, event: WebhookEvent) {
    let integration = match SlackIntegration::for_form(&state.db, &form.id).await {
        Ok(Some(integration)) if integration.notifies_on(event) => integration,
        Ok(_) => return,
        Err(err) => {
            tracing::warn!(form = %form.id, "failed to load slack integration: {err}");
            return;
        }
    };

    let result: Result<(), IntegrationError> = async {
        let count = FormResponse::count_for_form(&state.db, &form.id).await?;
        let text = slack::render_message(&integration, form, &response.answers, count);
        state.slack.post(&integration, &text).await
    }
    .await;

    let recorded = match result {
        Ok(()) => SlackIntegration::record_success(&state.db, integration.id).await,
        Err(err) => {
            tracing::warn!(form = %form.id, %event, "slack notification failed: {err}");
            integration.record_failure(&state.db, &err.to_string()).await
        }
    };
    if let Err(err) = recorded {
        tracing::error!(form = %form.id, "failed to record slack outcome: {err}");
    }
}
