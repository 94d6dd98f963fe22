use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::access::FormAccess;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{
    Capability, Comment, CommentEdit, CommentInput, CommentView, FormResponse, build_threads, clean_text,
};
use crate::state::AppState;

async fn load_response(state: &AppState, form_id: &str, response_id: Uuid) -> Result<FormResponse, AppError> {
    FormResponse::find(&state.db, form_id, response_id)
        .await?
        .ok_or_else(|| AppError::not_found("Response"))
}

/// Loads a comment along with the caller's access to its form.
async fn load_comment(state: &AppState, id: Uuid, user_id: &str) -> Result<(Comment, FormAccess), AppError> {
    let comment = Comment::find(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment"))?;
    let access = FormAccess::load(&state.db, &comment.form_id, user_id).await?;
    Ok((comment, access))
}

pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((form_id, response_id)): Path<(String, Uuid)>,
    Json(input): Json<CommentInput>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    FormAccess::require(&state.db, &form_id, &user_id, Capability::Comment).await?;
    let text = clean_text(&input.text).ok_or_else(|| AppError::BadRequest("Comment text is required".into()))?;
    load_response(&state, &form_id, response_id).await?;

    if let Some(parent_id) = input.parent_comment_id {
        let parent = Comment::find(&state.db, parent_id)
            .await?
            .ok_or_else(|| AppError::not_found("Parent comment"))?;
        if parent.response_id != response_id {
            return Err(AppError::BadRequest("Parent comment belongs to another response".into()));
        }
    }

    let comment = Comment::insert(
        &state.db,
        &form_id,
        response_id,
        &user_id,
        text,
        input.mentions,
        input.parent_comment_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn list_comments(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((form_id, response_id)): Path<(String, Uuid)>,
) -> Result<Json<Vec<CommentView>>, AppError> {
    FormAccess::load(&state.db, &form_id, &user_id).await?;
    load_response(&state, &form_id, response_id).await?;
    let rows = Comment::for_response(&state.db, response_id).await?;
    Ok(Json(build_threads(rows, &user_id)))
}

pub async fn edit_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(edit): Json<CommentEdit>,
) -> Result<Json<Comment>, AppError> {
    let (comment, _) = load_comment(&state, id, &user_id).await?;
    if comment.author_id != user_id {
        return Err(AppError::Forbidden("Only the author can edit this comment".into()));
    }
    let text = clean_text(&edit.text).ok_or_else(|| AppError::BadRequest("Comment text is required".into()))?;
    Ok(Json(Comment::edit(&state.db, id, text).await?))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let (comment, access) = load_comment(&state, id, &user_id).await?;
    if comment.author_id != user_id && !access.is_owner() {
        return Err(AppError::Forbidden("Only the author or the form owner can delete this comment".into()));
    }
    Comment::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_like(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    load_comment(&state, id, &user_id).await?;
    let (likes, is_liked) = Comment::toggle_like(&state.db, id, &user_id).await?;
    Ok(Json(json!({ "likes": likes, "is_liked": is_liked })))
}

pub async fn toggle_resolved(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let (comment, access) = load_comment(&state, id, &user_id).await?;
    if comment.author_id != user_id && !access.is_owner() {
        return Err(AppError::Forbidden("Only the author or the form owner can resolve this comment".into()));
    }
    let is_resolved = Comment::toggle_resolved(&state.db, id).await?;
    Ok(Json(json!({ "is_resolved": is_resolved })))
}
