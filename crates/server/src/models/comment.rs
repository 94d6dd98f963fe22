use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub form_id: String,
    pub response_id: Uuid,
    pub author_id: String,
    pub text: String,
    pub mentions: Json<Vec<String>>,
    pub parent_id: Option<Uuid>,
    pub likes: Vec<String>,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
}

/// A comment joined with its author's display name.
#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    #[sqlx(flatten)]
    pub comment: Comment,
    pub author_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentInput {
    pub text: String,
    #[serde(default)]
    pub mentions: Vec<String>,
    pub parent_comment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentEdit {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommentView {
    pub id: Uuid,
    pub text: String,
    pub author_id: String,
    pub author_name: Option<String>,
    pub mentions: Vec<String>,
    pub likes: usize,
    pub is_liked: bool,
    pub is_resolved: bool,
    pub edited: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<CommentView>,
}

impl CommentView {
    fn new(row: CommentRow, viewer: &str) -> Self {
        let CommentRow { comment, author_name } = row;
        Self {
            id: comment.id,
            is_liked: comment.likes.iter().any(|id| id == viewer),
            likes: comment.likes.len(),
            text: comment.text,
            author_id: comment.author_id,
            author_name,
            mentions: comment.mentions.0,
            is_resolved: comment.is_resolved,
            edited: comment.edited,
            created_at: comment.created_at,
            replies: Vec::new(),
        }
    }
}

/// Trimmed comment text, or `None` when nothing is left.
pub fn clean_text(text: &str) -> Option<&str> {
    Some(text.trim()).filter(|t| !t.is_empty())
}

/// Groups replies under their parents: top-level comments newest first,
/// replies oldest first. Replies whose parent is missing are dropped.
pub fn build_threads(rows: Vec<CommentRow>, viewer: &str) -> Vec<CommentView> {
    let (top, replies): (Vec<_>, Vec<_>) = rows
        .into_iter()
        .partition(|row| row.comment.parent_id.is_none());

    let mut by_parent: HashMap<Uuid, Vec<CommentView>> = HashMap::new();
    for row in replies {
        if let Some(parent) = row.comment.parent_id {
            by_parent.entry(parent).or_default().push(CommentView::new(row, viewer));
        }
    }

    let mut threads: Vec<CommentView> = top
        .into_iter()
        .map(|row| {
            let mut view = CommentView::new(row, viewer);
            let mut children = by_parent.remove(&view.id).unwrap_or_default();
            children.sort_by_key(|c| c.created_at);
            view.replies = children;
            view
        })
        .collect();
    threads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    threads
}

impl Comment {
    pub async fn find(db: &PgPool, id: Uuid) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM comments WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn for_response(db: &PgPool, response_id: Uuid) -> Result<Vec<CommentRow>, sqlx::Error> {
        sqlx::query_as(
            "SELECT c.*, p.name AS author_name
             FROM comments c
             LEFT JOIN profiles p ON p.id = c.author_id
             WHERE c.response_id = $1",
        )
        .bind(response_id)
        .fetch_all(db)
        .await
    }

    pub async fn insert(
        db: &PgPool,
        form_id: &str,
        response_id: Uuid,
        author_id: &str,
        text: &str,
        mentions: Vec<String>,
        parent_id: Option<Uuid>,
    ) -> Result<Comment, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO comments (id, form_id, response_id, author_id, text, mentions, parent_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(form_id)
        .bind(response_id)
        .bind(author_id)
        .bind(text)
        .bind(Json(mentions))
        .bind(parent_id)
        .fetch_one(db)
        .await
    }

    pub async fn edit(db: &PgPool, id: Uuid, text: &str) -> Result<Comment, sqlx::Error> {
        sqlx::query_as(
            "UPDATE comments SET text = $2, edited = TRUE, edited_at = NOW()
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(text)
        .fetch_one(db)
        .await
    }

    /// Deletes the comment; replies go with it.
    pub async fn delete(db: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Adds or removes `user_id` from the likes, returning the new count and
    /// whether the user now likes the comment.
    pub async fn toggle_like(db: &PgPool, id: Uuid, user_id: &str) -> Result<(usize, bool), sqlx::Error> {
        let likes: Vec<String> = sqlx::query_scalar(
            "UPDATE comments
             SET likes = CASE WHEN $2 = ANY(likes) THEN array_remove(likes, $2)
                              ELSE array_append(likes, $2) END
             WHERE id = $1
             RETURNING likes",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(db)
        .await?;
        let liked = likes.iter().any(|l| l == user_id);
        Ok((likes.len(), liked))
    }

    pub async fn toggle_resolved(db: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("UPDATE comments SET is_resolved = NOT is_resolved WHERE id = $1 RETURNING is_resolved")
            .bind(id)
            .fetch_one(db)
            .await
    }
}
