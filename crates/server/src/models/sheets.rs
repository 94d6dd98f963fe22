use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use super::{ErrorLogEntry, push_error_log};

pub const DEFAULT_SHEET_NAME: &str = "Responses";

/// Google Sheets export target for one form.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SheetsIntegration {
    pub id: Uuid,
    pub form_id: String,
    pub owner_id: String,
    pub spreadsheet_id: Option<String>,
    pub sheet_name: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    pub token_expiry: DateTime<Utc>,
    pub active: bool,
    pub sync_on_submit: bool,
    pub header_row_created: bool,
    pub last_synced_response_id: Option<Uuid>,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub sync_count: i64,
    pub errors: Json<Vec<ErrorLogEntry>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SheetsIntegration {
    pub fn token_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.token_expiry
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUrlQuery {
    pub form_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub form_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetsSetup {
    pub form_id: String,
    pub spreadsheet_id: String,
    pub sheet_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToggleSync {
    pub sync_on_submit: bool,
}

impl SheetsIntegration {
    pub async fn for_form(db: &PgPool, form_id: &str) -> Result<Option<SheetsIntegration>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM google_sheets_integrations WHERE form_id = $1")
            .bind(form_id)
            .fetch_optional(db)
            .await
    }

    /// Stores freshly granted tokens. A missing refresh token keeps the one
    /// already on file.
    pub async fn connect(
        db: &PgPool,
        form_id: &str,
        owner_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        token_expiry: DateTime<Utc>,
    ) -> Result<SheetsIntegration, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO google_sheets_integrations (id, form_id, owner_id, access_token, refresh_token,
                                                     token_expiry)
             VALUES ($1, $2, $3, $4, COALESCE($5, ''), $6)
             ON CONFLICT (form_id) DO UPDATE
             SET owner_id = $3, access_token = $4,
                 refresh_token = COALESCE($5, google_sheets_integrations.refresh_token),
                 token_expiry = $6, active = TRUE, updated_at = NOW()
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(form_id)
        .bind(owner_id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(token_expiry)
        .fetch_one(db)
        .await
    }

    /// Points the integration at a spreadsheet; the header row is rewritten
    /// on the next sync.
    pub async fn set_target(
        db: &PgPool,
        form_id: &str,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> Result<Option<SheetsIntegration>, sqlx::Error> {
        sqlx::query_as(
            "UPDATE google_sheets_integrations
             SET spreadsheet_id = $2, sheet_name = $3, header_row_created = FALSE, updated_at = NOW()
             WHERE form_id = $1
             RETURNING *",
        )
        .bind(form_id)
        .bind(spreadsheet_id)
        .bind(sheet_name)
        .fetch_optional(db)
        .await
    }

    pub async fn set_sync_on_submit(
        db: &PgPool,
        form_id: &str,
        enabled: bool,
    ) -> Result<Option<SheetsIntegration>, sqlx::Error> {
        sqlx::query_as(
            "UPDATE google_sheets_integrations SET sync_on_submit = $2, updated_at = NOW()
             WHERE form_id = $1 RETURNING *",
        )
        .bind(form_id)
        .bind(enabled)
        .fetch_optional(db)
        .await
    }

    pub async fn delete_for_form(db: &PgPool, form_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM google_sheets_integrations WHERE form_id = $1")
            .bind(form_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn store_access_token(
        &mut self,
        db: &PgPool,
        access_token: String,
        expiry: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE google_sheets_integrations SET access_token = $2, token_expiry = $3 WHERE id = $1")
            .bind(self.id)
            .bind(&access_token)
            .bind(expiry)
            .execute(db)
            .await?;
        self.access_token = access_token;
        self.token_expiry = expiry;
        Ok(())
    }

    pub async fn mark_header_written(&mut self, db: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE google_sheets_integrations SET header_row_created = TRUE WHERE id = $1")
            .bind(self.id)
            .execute(db)
            .await?;
        self.header_row_created = true;
        Ok(())
    }

    pub async fn record_sync(&mut self, db: &PgPool, response_id: Uuid) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE google_sheets_integrations
             SET last_synced_response_id = $2, last_sync_time = $3, sync_count = sync_count + 1
             WHERE id = $1",
        )
        .bind(self.id)
        .bind(response_id)
        .bind(now)
        .execute(db)
        .await?;
        self.last_synced_response_id = Some(response_id);
        self.last_sync_time = Some(now);
        self.sync_count += 1;
        Ok(())
    }

    pub async fn record_error(&mut self, db: &PgPool, message: &str) -> Result<(), sqlx::Error> {
        push_error_log(&mut self.errors.0, message, Utc::now());
        sqlx::query("UPDATE google_sheets_integrations SET errors = $2 WHERE id = $1")
            .bind(self.id)
            .bind(&self.errors)
            .execute(db)
            .await?;
        Ok(())
    }
}
