use std::collections::HashSet;

use chrono::{DateTime, Utc};
use form_analytics::Field;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool, types::Json};
use uuid::Uuid;

use super::{Form, stamp_fields};

/// A snapshot of a form's fields and headline settings.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FormVersion {
    pub id: Uuid,
    pub form_id: String,
    pub version_number: i32,
    pub title: String,
    pub description: String,
    pub is_public: bool,
    pub fields: Json<Vec<Field>>,
    pub created_by: String,
    pub changes_summary: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VersionInput {
    pub changes_summary: String,
    pub publish: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompareQuery {
    pub v1: Option<i32>,
    pub v2: Option<i32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VersionComparison {
    pub version1: i32,
    pub version2: i32,
    pub created_by_v1: String,
    pub created_by_v2: String,
    pub fields_count_v1: usize,
    pub fields_count_v2: usize,
    /// Field ids present in `version2` but not `version1`.
    pub added_fields: Vec<String>,
    pub removed_fields: Vec<String>,
    pub settings_changed: bool,
    pub changes_summary_v1: String,
    pub changes_summary_v2: String,
}

pub fn compare_versions(v1: &FormVersion, v2: &FormVersion) -> VersionComparison {
    let ids = |v: &FormVersion| -> Vec<String> { v.fields.iter().map(|f| f.id.clone()).collect() };
    let (ids1, ids2) = (ids(v1), ids(v2));
    let set1: HashSet<&String> = ids1.iter().collect();
    let set2: HashSet<&String> = ids2.iter().collect();

    VersionComparison {
        version1: v1.version_number,
        version2: v2.version_number,
        created_by_v1: v1.created_by.clone(),
        created_by_v2: v2.created_by.clone(),
        fields_count_v1: v1.fields.len(),
        fields_count_v2: v2.fields.len(),
        added_fields: ids2.iter().filter(|id| !set1.contains(id)).cloned().collect(),
        removed_fields: ids1.iter().filter(|id| !set2.contains(id)).cloned().collect(),
        settings_changed: (&v1.title, &v1.description, v1.is_public)
            != (&v2.title, &v2.description, v2.is_public),
        changes_summary_v1: v1.changes_summary.clone(),
        changes_summary_v2: v2.changes_summary.clone(),
    }
}

impl FormVersion {
    /// Snapshots `form` as its next version number.
    pub async fn snapshot<'e, E>(
        executor: E,
        form: &Form,
        created_by: &str,
        changes_summary: &str,
        is_published: bool,
    ) -> Result<FormVersion, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            "INSERT INTO form_versions (id, form_id, version_number, title, description, is_public,
                                        fields, created_by, changes_summary, is_published)
             SELECT $1, $2, COALESCE(MAX(version_number), 0) + 1, $3, $4, $5, $6, $7, $8, $9
             FROM form_versions WHERE form_id = $2
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&form.id)
        .bind(&form.title)
        .bind(&form.description)
        .bind(form.settings.is_public)
        .bind(Json(&form.fields.0))
        .bind(created_by)
        .bind(changes_summary)
        .bind(is_published)
        .fetch_one(executor)
        .await
    }

    /// Writes this version's fields, title, description and public flag back
    /// onto `form`. Restored fields keep the addition time they have on the
    /// form now.
    pub async fn restore_onto<'e, E>(&self, executor: E, form: &Form) -> Result<Form, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let now = Utc::now();
        let fields = stamp_fields(&form.fields, self.fields.0.clone(), now);
        let mut settings = form.settings.0.clone();
        settings.is_public = self.is_public;

        sqlx::query_as(
            "UPDATE forms
             SET title = $2, description = $3, fields = $4, settings = $5, updated_at = $6
             WHERE id = $1
             RETURNING *",
        )
        .bind(&form.id)
        .bind(&self.title)
        .bind(&self.description)
        .bind(Json(fields))
        .bind(Json(settings))
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn list(db: &PgPool, form_id: &str) -> Result<Vec<FormVersion>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM form_versions WHERE form_id = $1 ORDER BY version_number DESC")
            .bind(form_id)
            .fetch_all(db)
            .await
    }

    pub async fn find(db: &PgPool, form_id: &str, number: i32) -> Result<Option<FormVersion>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM form_versions WHERE form_id = $1 AND version_number = $2")
            .bind(form_id)
            .bind(number)
            .fetch_optional(db)
            .await
    }
}
