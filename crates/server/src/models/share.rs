use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ShareRole {
    Owner,
    Editor,
    #[default]
    Viewer,
    ResponseManager,
}

impl FromStr for ShareRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "editor" => Ok(Self::Editor),
            "viewer" => Ok(Self::Viewer),
            "response_manager" => Ok(Self::ResponseManager),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// What a role allows on a form. Always derived from the role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Permissions {
    pub can_edit: bool,
    pub can_view_responses: bool,
    pub can_delete_responses: bool,
    pub can_add_comments: bool,
    pub can_share: bool,
    pub can_delete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Edit,
    ViewResponses,
    DeleteResponses,
    Comment,
    Share,
    Delete,
}

impl ShareRole {
    pub fn permissions(self) -> Permissions {
        match self {
            Self::Owner => Permissions {
                can_edit: true,
                can_view_responses: true,
                can_delete_responses: true,
                can_add_comments: true,
                can_share: true,
                can_delete: true,
            },
            Self::Editor => Permissions {
                can_edit: true,
                can_view_responses: true,
                can_add_comments: true,
                ..Permissions::default()
            },
            Self::ResponseManager => Permissions {
                can_view_responses: true,
                can_delete_responses: true,
                can_add_comments: true,
                ..Permissions::default()
            },
            Self::Viewer => Permissions {
                can_view_responses: true,
                ..Permissions::default()
            },
        }
    }
}

impl Permissions {
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::Edit => self.can_edit,
            Capability::ViewResponses => self.can_view_responses,
            Capability::DeleteResponses => self.can_delete_responses,
            Capability::Comment => self.can_add_comments,
            Capability::Share => self.can_share,
            Capability::Delete => self.can_delete,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FormShare {
    pub id: Uuid,
    pub form_id: String,
    pub shared_by: String,
    pub shared_with: String,
    pub role: ShareRole,
    pub message: Option<String>,
    pub shared_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareInput {
    pub email: String,
    #[serde(default)]
    pub role: ShareRole,
    pub message: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareUpdate {
    pub role: ShareRole,
}

/// A share with the recipient's profile, as listed to the owner.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ShareSummary {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: ShareRole,
    pub shared_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    #[sqlx(skip)]
    pub permissions: Permissions,
}

/// A form someone shared with the caller.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SharedForm {
    pub form_id: String,
    pub title: String,
    pub description: String,
    pub shared_by: String,
    pub shared_by_name: Option<String>,
    pub role: ShareRole,
    pub shared_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub permissions: Permissions,
}

impl FormShare {
    /// Role of `user_id` on a form through an unexpired share.
    pub async fn active_role(db: &PgPool, form_id: &str, user_id: &str) -> Result<Option<ShareRole>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT role FROM form_shares
             WHERE form_id = $1 AND shared_with = $2
               AND (expires_at IS NULL OR expires_at > NOW())",
        )
        .bind(form_id)
        .bind(user_id)
        .fetch_optional(db)
        .await
    }

    /// Creates the share, or updates role and message if the pair exists.
    pub async fn upsert(
        db: &PgPool,
        form_id: &str,
        shared_by: &str,
        shared_with: &str,
        input: &ShareInput,
    ) -> Result<FormShare, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO form_shares (id, form_id, shared_by, shared_with, role, message, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (form_id, shared_with)
             DO UPDATE SET role = $5, message = $6, expires_at = $7
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(form_id)
        .bind(shared_by)
        .bind(shared_with)
        .bind(input.role)
        .bind(&input.message)
        .bind(input.expires_at)
        .fetch_one(db)
        .await
    }

    pub async fn list_for_form(db: &PgPool, form_id: &str) -> Result<Vec<ShareSummary>, sqlx::Error> {
        let mut shares: Vec<ShareSummary> = sqlx::query_as(
            "SELECT s.id, s.shared_with AS user_id, p.name, p.email, s.role, s.shared_at, s.expires_at
             FROM form_shares s
             JOIN profiles p ON p.id = s.shared_with
             WHERE s.form_id = $1
             ORDER BY s.shared_at DESC",
        )
        .bind(form_id)
        .fetch_all(db)
        .await?;
        for share in &mut shares {
            share.permissions = share.role.permissions();
        }
        Ok(shares)
    }

    pub async fn shared_with(db: &PgPool, user_id: &str) -> Result<Vec<SharedForm>, sqlx::Error> {
        let mut forms: Vec<SharedForm> = sqlx::query_as(
            "SELECT f.id AS form_id, f.title, f.description, s.shared_by, p.name AS shared_by_name,
                    s.role, s.shared_at
             FROM form_shares s
             JOIN forms f ON f.id = s.form_id
             LEFT JOIN profiles p ON p.id = s.shared_by
             WHERE s.shared_with = $1
               AND (s.expires_at IS NULL OR s.expires_at > NOW())
             ORDER BY s.shared_at DESC",
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        for form in &mut forms {
            form.permissions = form.role.permissions();
        }
        Ok(forms)
    }

    pub async fn set_role(
        db: &PgPool,
        form_id: &str,
        share_id: Uuid,
        role: ShareRole,
    ) -> Result<Option<FormShare>, sqlx::Error> {
        sqlx::query_as("UPDATE form_shares SET role = $3 WHERE id = $1 AND form_id = $2 RETURNING *")
            .bind(share_id)
            .bind(form_id)
            .bind(role)
            .fetch_optional(db)
            .await
    }

    pub async fn remove(db: &PgPool, form_id: &str, share_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM form_shares WHERE id = $1 AND form_id = $2")
            .bind(share_id)
            .bind(form_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn owner_can_do_everything() {
        let p = ShareRole::Owner.permissions();
        assert!(p.can_edit && p.can_view_responses && p.can_delete_responses);
        assert!(p.can_add_comments && p.can_share && p.can_delete);
    }

    #[test]
    fn editor_edits_views_and_comments() {
        assert_eq!(
            ShareRole::Editor.permissions(),
            Permissions {
                can_edit: true,
                can_view_responses: true,
                can_add_comments: true,
                ..Permissions::default()
            }
        );
    }

    #[test]
    fn response_manager_moderates_responses() {
        let p = ShareRole::ResponseManager.permissions();
        assert!(p.allows(Capability::ViewResponses));
        assert!(p.allows(Capability::DeleteResponses));
        assert!(p.allows(Capability::Comment));
        assert!(!p.allows(Capability::Edit));
        assert!(!p.allows(Capability::Share));
    }

    #[test]
    fn viewer_only_views() {
        let p = ShareRole::Viewer.permissions();
        assert!(p.allows(Capability::ViewResponses));
        for capability in [
            Capability::Edit,
            Capability::DeleteResponses,
            Capability::Comment,
            Capability::Share,
            Capability::Delete,
        ] {
            assert!(!p.allows(capability), "{capability:?}");
        }
    }

    #[test]
    fn roles_round_trip_through_strings() {
        assert_eq!("response_manager".parse(), Ok(ShareRole::ResponseManager));
        assert_eq!(
            serde_json::to_value(ShareRole::ResponseManager).unwrap(),
            serde_json::json!("response_manager")
        );
        assert_eq!(ShareRole::default(), ShareRole::Viewer);
    }
}
