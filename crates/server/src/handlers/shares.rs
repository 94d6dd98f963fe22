use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::access::FormAccess;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{
    Capability, FormShare, Profile, ShareInput, ShareRole, ShareSummary, ShareUpdate, SharedForm, normalize_email,
};
use crate::state::AppState;

fn assignable(role: ShareRole) -> Result<ShareRole, AppError> {
    if role == ShareRole::Owner {
        return Err(AppError::BadRequest("Ownership cannot be shared".into()));
    }
    Ok(role)
}

pub async fn share_form(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
    Json(input): Json<ShareInput>,
) -> Result<(StatusCode, Json<FormShare>), AppError> {
    FormAccess::require(&state.db, &form_id, &user_id, Capability::Share).await?;
    assignable(input.role)?;

    let email = normalize_email(&input.email).ok_or_else(|| AppError::BadRequest("Invalid email address".into()))?;
    let target = Profile::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| AppError::not_found("User with this email"))?;
    if target.id == user_id {
        return Err(AppError::BadRequest("You cannot share a form with yourself".into()));
    }

    let share = FormShare::upsert(&state.db, &form_id, &user_id, &target.id, &input).await?;
    tracing::info!(form = %form_id, with = %target.id, role = ?share.role, "form shared");
    Ok((StatusCode::CREATED, Json(share)))
}

pub async fn list_shares(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
) -> Result<Json<Vec<ShareSummary>>, AppError> {
    FormAccess::require(&state.db, &form_id, &user_id, Capability::Share).await?;
    Ok(Json(FormShare::list_for_form(&state.db, &form_id).await?))
}

pub async fn update_share(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((form_id, share_id)): Path<(String, Uuid)>,
    Json(update): Json<ShareUpdate>,
) -> Result<Json<FormShare>, AppError> {
    FormAccess::require(&state.db, &form_id, &user_id, Capability::Share).await?;
    let role = assignable(update.role)?;
    FormShare::set_role(&state.db, &form_id, share_id, role)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Share"))
}

pub async fn remove_share(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((form_id, share_id)): Path<(String, Uuid)>,
) -> Result<StatusCode, AppError> {
    FormAccess::require(&state.db, &form_id, &user_id, Capability::Share).await?;
    if !FormShare::remove(&state.db, &form_id, share_id).await? {
        return Err(AppError::not_found("Share"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn shared_with_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<SharedForm>>, AppError> {
    Ok(Json(FormShare::shared_with(&state.db, &user_id).await?))
}
