use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use crate::access::FormAccess;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::integrations::sheets::{BulkSyncReport, bulk_sync};
use crate::models::{AuthUrlQuery, CallbackQuery, DEFAULT_SHEET_NAME, SheetsIntegration, SheetsSetup, ToggleSync};
use crate::state::AppState;

async fn integration_for(state: &AppState, form_id: &str) -> Result<SheetsIntegration, AppError> {
    SheetsIntegration::for_form(&state.db, form_id)
        .await?
        .ok_or_else(|| AppError::not_found("Google Sheets integration"))
}

pub async fn auth_url(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<AuthUrlQuery>,
) -> Result<Json<Value>, AppError> {
    FormAccess::owner(&state.db, &query.form_id, &user_id).await?;
    let url = state.sheets.auth_url(&query.form_id)?;
    Ok(Json(json!({ "auth_url": url })))
}

pub async fn callback(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<SheetsIntegration>, AppError> {
    FormAccess::owner(&state.db, &query.form_id, &user_id).await?;
    let grant = state.sheets.exchange_code(&query.code).await?;

    let integration = SheetsIntegration::connect(
        &state.db,
        &query.form_id,
        &user_id,
        &grant.access_token,
        grant.refresh_token.as_deref(),
        grant.expires_at,
    )
    .await?;
    tracing::info!(form = %query.form_id, "google sheets connected");
    Ok(Json(integration))
}

pub async fn setup(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<SheetsSetup>,
) -> Result<Json<SheetsIntegration>, AppError> {
    FormAccess::owner(&state.db, &input.form_id, &user_id).await?;
    let spreadsheet_id = input.spreadsheet_id.trim();
    if spreadsheet_id.is_empty() {
        return Err(AppError::BadRequest("spreadsheet_id is required".into()));
    }
    let sheet_name = input
        .sheet_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SHEET_NAME);

    SheetsIntegration::set_target(&state.db, &input.form_id, spreadsheet_id, sheet_name)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Connect Google Sheets before choosing a spreadsheet".into()))
}

pub async fn get_integration(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
) -> Result<Json<SheetsIntegration>, AppError> {
    FormAccess::owner(&state.db, &form_id, &user_id).await?;
    Ok(Json(integration_for(&state, &form_id).await?))
}

pub async fn disconnect(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
) -> Result<StatusCode, AppError> {
    FormAccess::owner(&state.db, &form_id, &user_id).await?;
    if !SheetsIntegration::delete_for_form(&state.db, &form_id).await? {
        return Err(AppError::not_found("Google Sheets integration"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn sync_all(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
) -> Result<Json<BulkSyncReport>, AppError> {
    let form = FormAccess::owner(&state.db, &form_id, &user_id).await?;
    let mut integration = integration_for(&state, &form_id).await?;
    if integration.spreadsheet_id.is_none() {
        return Err(AppError::BadRequest("Choose a spreadsheet before syncing".into()));
    }

    let report = bulk_sync(&state.db, state.sheets.as_ref(), &mut integration, &form).await?;
    tracing::info!(
        form = %form_id,
        synced = report.synced_count,
        total = report.total_responses,
        "bulk sheets sync finished"
    );
    Ok(Json(report))
}

pub async fn toggle_sync(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
    Json(toggle): Json<ToggleSync>,
) -> Result<Json<SheetsIntegration>, AppError> {
    FormAccess::owner(&state.db, &form_id, &user_id).await?;
    SheetsIntegration::set_sync_on_submit(&state.db, &form_id, toggle.sync_on_submit)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Google Sheets integration"))
}
