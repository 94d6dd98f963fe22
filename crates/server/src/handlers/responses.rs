use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use super::forms::public_form;
use super::{client_ip, user_agent};
use crate::access::FormAccess;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::integrations::dispatch;
use crate::models::{
    Capability, Form, FormResponse, Pagination, ResponseQuery, SubmissionInput, SubmissionRejected,
    accept_submission, display_value,
};
use crate::state::AppState;

pub async fn submit_response(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Json(input): Json<SubmissionInput>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let form = public_form(&state, &form_id).await?;

    let submission = accept_submission(&form, input).map_err(|rejected| match rejected {
        SubmissionRejected::EmailRequired => AppError::BadRequest("An email address is required".into()),
    })?;

    let ip = client_ip(&headers, peer.as_ref());
    let response = FormResponse::insert(&state.db, &form.id, submission, ip, user_agent(&headers)).await?;
    tracing::info!(form = %form.id, response = %response.id, "response submitted");

    let response_id = response.id;
    dispatch::response_created(&state, form, response);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Response submitted successfully",
            "response_id": response_id,
        })),
    ))
}

#[derive(Debug, Serialize)]
pub struct ResponsePage {
    pub form: Form,
    pub responses: Vec<FormResponse>,
    pub pagination: Pagination,
}

pub async fn list_responses(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
    Query(query): Query<ResponseQuery>,
) -> Result<Json<ResponsePage>, AppError> {
    let access = FormAccess::require(&state.db, &form_id, &user_id, Capability::ViewResponses).await?;
    let (responses, total) = FormResponse::page(&state.db, &form_id, &query).await?;

    Ok(Json(ResponsePage {
        form: access.form,
        responses,
        pagination: Pagination::new(total, query.page(), query.limit()),
    }))
}

pub async fn delete_response(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((form_id, response_id)): Path<(String, Uuid)>,
) -> Result<StatusCode, AppError> {
    let access = FormAccess::require(&state.db, &form_id, &user_id, Capability::DeleteResponses).await?;
    let response = FormResponse::find(&state.db, &form_id, response_id)
        .await?
        .ok_or_else(|| AppError::not_found("Response"))?;

    FormResponse::delete(&state.db, response.id).await?;
    tracing::info!(form = %form_id, response = %response_id, by = %user_id, "response deleted");
    dispatch::response_deleted(&state, access.form, response);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn export_responses(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let access = FormAccess::require(&state.db, &form_id, &user_id, Capability::ViewResponses).await?;
    let responses = FormResponse::all_for_form(&state.db, &form_id).await?;
    let body = export_csv(&access.form, &responses)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"responses-{form_id}.csv\""),
            ),
        ],
        body,
    ))
}

/// Responses as CSV: submission metadata, one column per form field, then
/// one per answered field id that is no longer on the form.
pub fn export_csv(form: &Form, responses: &[FormResponse]) -> anyhow::Result<Vec<u8>> {
    let mut columns: Vec<(&str, &str)> = form
        .fields
        .iter()
        .map(|f| (f.id.as_str(), f.label.as_str()))
        .collect();
    for response in responses {
        for answer in response.answers.iter() {
            if !columns.iter().any(|(id, _)| *id == answer.field_id) {
                columns.push((answer.field_id.as_str(), answer.field_id.as_str()));
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(
        ["submitted_at", "responder_email", "send_copy"]
            .into_iter()
            .chain(columns.iter().map(|(_, label)| *label)),
    )?;

    for response in responses {
        let mut record = vec![
            response.submitted_at.to_rfc3339(),
            response.responder_email.clone().unwrap_or_default(),
            response.send_copy.to_string(),
        ];
        record.extend(columns.iter().map(|(id, _)| {
            response
                .answers
                .iter()
                .find(|a| a.field_id == *id)
                .map(|a| display_value(&a.value))
                .unwrap_or_default()
        }));
        writer.write_record(&record)?;
    }

    writer.into_inner().map_err(|e| anyhow::anyhow!("flushing csv: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FormKind, FormSettings};
    use chrono::{TimeZone, Utc};
    use form_analytics::{Answer, Field, FieldType};
    use pretty_assertions::assert_eq;
    use sqlx::types::Json;

    fn form() -> Form {
        Form {
            id: "f1".into(),
            owner_id: "owner".into(),
            title: "Survey".into(),
            description: String::new(),
            kind: Json(FormKind::General),
            logo: None,
            header_image: None,
            custom_details: Json(vec![]),
            fields: Json(vec![
                Field::new("name", FieldType::ShortText, "Your name"),
                Field::new("colors", FieldType::Checkbox, "Colors"),
            ]),
            settings: Json(FormSettings::default()),
            source_template: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn response(answers: Vec<Answer>, email: Option<&str>) -> FormResponse {
        FormResponse {
            id: Uuid::new_v4(),
            form_id: "f1".into(),
            answers: Json(answers),
            ip: None,
            user_agent: None,
            responder_email: email.map(str::to_string),
            send_copy: false,
            submitted_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn csv_has_field_columns_then_orphans() {
        let responses = vec![
            response(
                vec![
                    Answer::new("name", "Ada, Countess"),
                    Answer::new("colors", serde_json::json!(["red", "blue"])),
                ],
                Some("ada@example.com"),
            ),
            response(vec![Answer::new("legacy", "old value")], None),
        ];

        let csv = String::from_utf8(export_csv(&form(), &responses).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "submitted_at,responder_email,send_copy,Your name,Colors,legacy");
        assert_eq!(
            lines[1],
            "2024-03-01T12:00:00+00:00,ada@example.com,false,\"Ada, Countess\",\"red, blue\","
        );
        assert_eq!(lines[2], "2024-03-01T12:00:00+00:00,,false,,,old value");
    }

    #[test]
    fn csv_without_responses_is_just_a_header() {
        let csv = String::from_utf8(export_csv(&form(), &[]).unwrap()).unwrap();
        assert_eq!(csv, "submitted_at,responder_email,send_copy,Your name,Colors\n");
    }
}
