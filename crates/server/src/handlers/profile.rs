use axum::{Json, extract::State};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{Profile, ProfileInput, normalize_email};
use crate::state::AppState;

pub async fn get_me(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> Result<Json<Profile>, AppError> {
    Profile::find(&state.db, &user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Profile"))
}

pub async fn put_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<ProfileInput>,
) -> Result<Json<Profile>, AppError> {
    let email = normalize_email(&input.email).ok_or_else(|| AppError::BadRequest("Invalid email address".into()))?;
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required".into()));
    }
    let profile = Profile::upsert(&state.db, &user_id, name, &email).await?;
    Ok(Json(profile))
}
