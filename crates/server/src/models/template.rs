use chrono::{DateTime, Utc};
use form_analytics::Field;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use super::FormSettings;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum TemplateCategory {
    Contact,
    Survey,
    Registration,
    Feedback,
    Product,
    Education,
    Travel,
    Appointment,
    Event,
    #[default]
    Other,
}

/// A reusable set of fields and settings. Premade templates are visible to
/// everyone; custom ones only to their creator.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: TemplateCategory,
    pub thumbnail: String,
    pub is_premade: bool,
    pub fields: Json<Vec<Field>>,
    pub settings: Json<FormSettings>,
    pub created_by: Option<String>,
    pub usage_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    pub fn visible_to(&self, user_id: Option<&str>) -> bool {
        self.is_premade || (user_id.is_some() && self.created_by.as_deref() == user_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateQuery {
    pub category: Option<TemplateCategory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateFromForm {
    pub form_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: TemplateCategory,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<TemplateCategory>,
    pub fields: Option<Vec<Field>>,
    pub settings: Option<FormSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UseTemplate {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// A premade template as written by the seeder.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub name: String,
    pub description: String,
    pub category: TemplateCategory,
    pub thumbnail: String,
    pub is_premade: bool,
    pub fields: Vec<Field>,
    pub settings: FormSettings,
    pub created_by: Option<String>,
}

impl Template {
    pub async fn find(db: &PgPool, id: Uuid) -> Result<Option<Template>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM templates WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Premade templates plus the caller's own, premade first, then most
    /// used, then newest.
    pub async fn list(
        db: &PgPool,
        user_id: Option<&str>,
        category: Option<TemplateCategory>,
    ) -> Result<Vec<Template>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM templates
             WHERE (is_premade OR ($1::TEXT IS NOT NULL AND created_by = $1))
               AND ($2::TEXT IS NULL OR category = $2)
             ORDER BY is_premade DESC, usage_count DESC, created_at DESC",
        )
        .bind(user_id)
        .bind(category)
        .fetch_all(db)
        .await
    }

    pub async fn exists_named(db: &PgPool, name: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM templates WHERE name = $1)")
            .bind(name)
            .fetch_one(db)
            .await
    }

    pub async fn insert(db: &PgPool, template: NewTemplate) -> Result<Template, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO templates (id, name, description, category, thumbnail, is_premade,
                                    fields, settings, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(template.name)
        .bind(template.description)
        .bind(template.category)
        .bind(template.thumbnail)
        .bind(template.is_premade)
        .bind(Json(template.fields))
        .bind(Json(template.settings))
        .bind(template.created_by)
        .fetch_one(db)
        .await
    }

    pub async fn update(&self, db: &PgPool, update: TemplateUpdate) -> Result<Template, sqlx::Error> {
        sqlx::query_as(
            "UPDATE templates
             SET name = $2, description = $3, category = $4, fields = $5, settings = $6,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(self.id)
        .bind(update.name.unwrap_or_else(|| self.name.clone()))
        .bind(update.description.unwrap_or_else(|| self.description.clone()))
        .bind(update.category.unwrap_or(self.category))
        .bind(Json(update.fields.unwrap_or_else(|| self.fields.0.clone())))
        .bind(Json(update.settings.unwrap_or_else(|| self.settings.0.clone())))
        .fetch_one(db)
        .await
    }

    pub async fn record_use(db: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE templates SET usage_count = usage_count + 1 WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(is_premade: bool, created_by: Option<&str>) -> Template {
        Template {
            id: Uuid::nil(),
            name: "Contact".into(),
            description: String::new(),
            category: TemplateCategory::Contact,
            thumbnail: String::new(),
            is_premade,
            fields: Json(vec![]),
            settings: Json(FormSettings::default()),
            created_by: created_by.map(str::to_string),
            usage_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn premade_templates_are_public() {
        assert!(template(true, None).visible_to(None));
        assert!(template(true, None).visible_to(Some("anyone")));
    }

    #[test]
    fn custom_templates_are_private() {
        let custom = template(false, Some("alice"));
        assert!(custom.visible_to(Some("alice")));
        assert!(!custom.visible_to(Some("bob")));
        assert!(!custom.visible_to(None));
    }

    #[test]
    fn categories_parse_from_snake_case() {
        let query: TemplateQuery = serde_json::from_value(serde_json::json!({"category": "registration"})).unwrap();
        assert_eq!(query.category, Some(TemplateCategory::Registration));
    }
}
