use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;

use crate::access::FormAccess;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::integrations::dispatch;
use crate::models::{CompareQuery, Form, FormVersion, VersionComparison, VersionInput, compare_versions};
use crate::state::AppState;

async fn find_version(state: &AppState, form_id: &str, number: i32) -> Result<FormVersion, AppError> {
    FormVersion::find(&state.db, form_id, number)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Version {number} not found")))
}

pub async fn create_version(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
    body: Option<Json<VersionInput>>,
) -> Result<(StatusCode, Json<FormVersion>), AppError> {
    let form = FormAccess::owner(&state.db, &form_id, &user_id).await?;
    let Json(input) = body.unwrap_or_default();

    let version = FormVersion::snapshot(&state.db, &form, &user_id, input.changes_summary.trim(), input.publish).await?;
    tracing::info!(form = %form_id, version = version.version_number, "version saved");
    Ok((StatusCode::CREATED, Json(version)))
}

pub async fn list_versions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
) -> Result<Json<Vec<FormVersion>>, AppError> {
    FormAccess::load(&state.db, &form_id, &user_id).await?;
    Ok(Json(FormVersion::list(&state.db, &form_id).await?))
}

pub async fn get_version(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((form_id, number)): Path<(String, i32)>,
) -> Result<Json<FormVersion>, AppError> {
    FormAccess::load(&state.db, &form_id, &user_id).await?;
    Ok(Json(find_version(&state, &form_id, number).await?))
}

#[derive(Debug, Serialize)]
pub struct RollbackReply {
    pub form: Form,
    /// Snapshot of the state that was replaced.
    pub backup_version: i32,
    pub restored_version: i32,
}

pub async fn rollback(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((form_id, number)): Path<(String, i32)>,
) -> Result<Json<RollbackReply>, AppError> {
    let form = FormAccess::owner(&state.db, &form_id, &user_id).await?;
    let target = find_version(&state, &form_id, number).await?;

    let mut tx = state.db.begin().await?;
    let backup = FormVersion::snapshot(&mut *tx, &form, &user_id, &format!("Rollback from v{number}"), false).await?;
    let restored = target.restore_onto(&mut *tx, &form).await?;
    tx.commit().await?;

    tracing::info!(form = %form_id, restored = number, backup = backup.version_number, "form rolled back");
    dispatch::form_updated(&state, &restored);
    Ok(Json(RollbackReply {
        form: restored,
        backup_version: backup.version_number,
        restored_version: number,
    }))
}

pub async fn compare(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<VersionComparison>, AppError> {
    let (Some(v1), Some(v2)) = (query.v1, query.v2) else {
        return Err(AppError::BadRequest("Both v1 and v2 are required".into()));
    };
    FormAccess::load(&state.db, &form_id, &user_id).await?;
    let first = find_version(&state, &form_id, v1).await?;
    let second = find_version(&state, &form_id, v2).await?;
    Ok(Json(compare_versions(&first, &second)))
}
