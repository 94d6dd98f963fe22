use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::access::FormAccess;
use crate::auth::{AuthUser, MaybeUser};
use crate::error::AppError;
use crate::models::{
    Form, FormInput, NewTemplate, Template, TemplateFromForm, TemplateQuery, TemplateUpdate, UseTemplate,
};
use crate::state::AppState;

async fn visible_template(state: &AppState, id: Uuid, user_id: Option<&str>) -> Result<Template, AppError> {
    Template::find(&state.db, id)
        .await?
        .filter(|t| t.visible_to(user_id))
        .ok_or_else(|| AppError::not_found("Template"))
}

/// Loads a custom template the caller created.
async fn own_template(state: &AppState, id: Uuid, user_id: &str) -> Result<Template, AppError> {
    let template = visible_template(state, id, Some(user_id)).await?;
    if template.is_premade || template.created_by.as_deref() != Some(user_id) {
        return Err(AppError::Forbidden("Premade templates cannot be changed".into()));
    }
    Ok(template)
}

pub async fn list_templates(
    State(state): State<AppState>,
    MaybeUser(user_id): MaybeUser,
    Query(query): Query<TemplateQuery>,
) -> Result<Json<Vec<Template>>, AppError> {
    let templates = Template::list(&state.db, user_id.as_deref(), query.category).await?;
    Ok(Json(templates))
}

pub async fn get_template(
    State(state): State<AppState>,
    MaybeUser(user_id): MaybeUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Template>, AppError> {
    Ok(Json(visible_template(&state, id, user_id.as_deref()).await?))
}

pub async fn create_template(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<TemplateFromForm>,
) -> Result<(StatusCode, Json<Template>), AppError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Template name is required".into()));
    }
    let form = FormAccess::owner(&state.db, &input.form_id, &user_id).await?;

    let template = Template::insert(
        &state.db,
        NewTemplate {
            name: name.to_string(),
            description: input.description,
            category: input.category,
            thumbnail: String::new(),
            is_premade: false,
            fields: form.fields.0,
            settings: form.settings.0,
            created_by: Some(user_id),
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn use_template(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Json<UseTemplate>>,
) -> Result<(StatusCode, Json<Form>), AppError> {
    let template = visible_template(&state, id, Some(&user_id)).await?;
    let Json(options) = body.unwrap_or_default();

    let form = Form::insert(
        &state.db,
        &user_id,
        FormInput {
            title: options.title.or_else(|| Some(template.name.clone())),
            description: options.description.or_else(|| Some(template.description.clone())),
            fields: template.fields.0,
            settings: template.settings.0,
            source_template: Some(template.id.to_string()),
            ..FormInput::default()
        },
    )
    .await?;
    Template::record_use(&state.db, template.id).await?;
    tracing::info!(template = %template.id, form = %form.id, "form created from template");
    Ok((StatusCode::CREATED, Json(form)))
}

pub async fn update_template(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(update): Json<TemplateUpdate>,
) -> Result<Json<Template>, AppError> {
    let template = own_template(&state, id, &user_id).await?;
    if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("Template name is required".into()));
    }
    Ok(Json(template.update(&state.db, update).await?))
}

pub async fn delete_template(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let template = own_template(&state, id, &user_id).await?;
    Template::delete(&state.db, template.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
