use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::Serialize;

use super::{client_ip, user_agent};
use crate::access::FormAccess;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::integrations::dispatch;
use crate::models::{Capability, Form, FormInput, FormView, Permissions, PublicForm, ShareRole};
use crate::state::AppState;

/// A form as seen by one of its collaborators.
#[derive(Debug, Serialize)]
pub struct FormWithAccess {
    #[serde(flatten)]
    pub form: Form,
    pub role: ShareRole,
    pub permissions: Permissions,
}

impl From<FormAccess> for FormWithAccess {
    fn from(access: FormAccess) -> Self {
        Self {
            form: access.form,
            role: access.role,
            permissions: access.permissions,
        }
    }
}

pub async fn create_form(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<FormInput>,
) -> Result<(StatusCode, Json<Form>), AppError> {
    input.validate().map_err(AppError::BadRequest)?;
    let form = Form::insert(&state.db, &user_id, input).await?;
    tracing::info!(form = %form.id, owner = %user_id, "form created");
    Ok((StatusCode::CREATED, Json(form)))
}

pub async fn list_forms(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Form>>, AppError> {
    Ok(Json(Form::list_for_owner(&state.db, &user_id).await?))
}

pub async fn get_form(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
) -> Result<Json<FormWithAccess>, AppError> {
    let access = FormAccess::load(&state.db, &form_id, &user_id).await?;
    Ok(Json(access.into()))
}

pub async fn update_form(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
    Json(input): Json<FormInput>,
) -> Result<Json<Form>, AppError> {
    let access = FormAccess::require(&state.db, &form_id, &user_id, Capability::Edit).await?;
    input.validate().map_err(AppError::BadRequest)?;

    let form = access.form.replace(&state.db, input).await?;
    dispatch::form_updated(&state, &form);
    Ok(Json(form))
}

pub async fn delete_form(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
) -> Result<StatusCode, AppError> {
    FormAccess::require(&state.db, &form_id, &user_id, Capability::Delete).await?;
    Form::delete(&state.db, &form_id).await?;
    tracing::info!(form = %form_id, "form deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Loads a form that accepts anonymous visitors.
pub(crate) async fn public_form(state: &AppState, form_id: &str) -> Result<Form, AppError> {
    Form::find(&state.db, form_id)
        .await?
        .filter(|form| form.settings.is_public)
        .ok_or_else(|| AppError::not_found("Form"))
}

pub async fn get_public_form(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Result<Json<PublicForm>, AppError> {
    let form = public_form(&state, &form_id).await?;

    let ip = client_ip(&headers, peer.as_ref());
    let agent = user_agent(&headers);
    if let Err(err) = FormView::record(&state.db, &form.id, ip.as_deref(), agent.as_deref()).await {
        tracing::warn!(form = %form.id, "failed to record view: {err}");
    }
    Ok(Json(form.into()))
}
