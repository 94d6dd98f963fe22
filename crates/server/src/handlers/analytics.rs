use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use form_analytics::{FieldAnalytics, FormStats, Granularity, TimelinePoint, aggregate, form_stats, timeline};
use serde::{Deserialize, Serialize};

use crate::access::FormAccess;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{Capability, FormResponse, FormView};
use crate::state::AppState;

pub async fn field_analytics(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
) -> Result<Json<BTreeMap<String, FieldAnalytics>>, AppError> {
    let access = FormAccess::require(&state.db, &form_id, &user_id, Capability::ViewResponses).await?;
    let responses = FormResponse::all_for_form(&state.db, &form_id).await?;
    Ok(Json(aggregate(&access.form, &responses)))
}

#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    pub granularity: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TimelineReply {
    pub granularity: Granularity,
    pub timeline: Vec<TimelinePoint>,
}

pub async fn response_timeline(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<TimelineReply>, AppError> {
    let granularity = match query.granularity.as_deref() {
        None | Some("") => Granularity::default(),
        Some(raw) => raw.parse().map_err(AppError::BadRequest)?,
    };
    FormAccess::require(&state.db, &form_id, &user_id, Capability::ViewResponses).await?;
    let responses = FormResponse::all_for_form(&state.db, &form_id).await?;

    Ok(Json(TimelineReply {
        granularity,
        timeline: timeline(&responses, granularity),
    }))
}

pub async fn stats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(form_id): Path<String>,
) -> Result<Json<FormStats>, AppError> {
    let access = FormAccess::require(&state.db, &form_id, &user_id, Capability::ViewResponses).await?;
    let responses = FormResponse::all_for_form(&state.db, &form_id).await?;
    let views = FormView::all_for_form(&state.db, &form_id).await?;
    Ok(Json(form_stats(&access.form, &responses, &views, Utc::now())))
}
