use std::collections::HashSet;

use chrono::{DateTime, Utc};
use form_analytics::{Answer, FieldType, Fingerprint, Submission, Visit};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use super::{CollectEmails, Form};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FormResponse {
    pub id: Uuid,
    pub form_id: String,
    pub answers: Json<Vec<Answer>>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub responder_email: Option<String>,
    pub send_copy: bool,
    pub submitted_at: DateTime<Utc>,
}

impl Submission for FormResponse {
    fn answers(&self) -> &[Answer] {
        &self.answers.0
    }

    fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.ip.as_deref(), self.user_agent.as_deref())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct FormView {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl Visit for FormView {
    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.ip.as_deref(), self.user_agent.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionInput {
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub send_copy: bool,
}

/// A submission checked against its form, ready to store.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedSubmission {
    pub answers: Vec<Answer>,
    pub responder_email: Option<String>,
    pub send_copy: bool,
    /// Stamped from the same clock as field and form timestamps, so
    /// eligibility cutoffs compare like with like.
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionRejected {
    EmailRequired,
}

/// Drops answers for fields the form does not have and derives the
/// responder email and copy preference from the form settings.
pub fn accept_submission(
    form: &Form,
    input: SubmissionInput,
) -> Result<AcceptedSubmission, SubmissionRejected> {
    let known: HashSet<&str> = form.fields.iter().map(|f| f.id.as_str()).collect();
    let answers: Vec<Answer> = input
        .answers
        .into_iter()
        .filter(|a| known.contains(a.field_id.as_str()))
        .collect();

    let responder_email = form
        .fields
        .iter()
        .find(|f| f.field_type == FieldType::Email)
        .and_then(|field| answers.iter().find(|a| a.field_id == field.id))
        .map(|a| display_value(&a.value).trim().to_string())
        .filter(|email| !email.is_empty());

    if responder_email.is_none() && form.settings.collect_emails == CollectEmails::ResponderInput {
        return Err(SubmissionRejected::EmailRequired);
    }

    let send_copy = form.settings.send_response_copy.applies(input.send_copy);
    Ok(AcceptedSubmission {
        answers,
        responder_email,
        send_copy,
        submitted_at: Utc::now(),
    })
}

/// Renders an answer value for people: lists are joined with `", "`.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResponseQuery {
    pub page: i64,
    pub limit: i64,
    pub sort_order: super::SortOrder,
    pub search: Option<String>,
}

impl Default for ResponseQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            sort_order: super::SortOrder::Desc,
            search: None,
        }
    }
}

impl ResponseQuery {
    pub fn page(&self) -> i64 {
        self.page.max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, 100)
    }

    /// Saturates instead of overflowing on absurd page numbers; such pages
    /// are simply empty.
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }

    /// `ILIKE` pattern for the search term with wildcards escaped.
    pub fn search_pattern(&self) -> Option<String> {
        let term = self.search.as_deref()?.trim();
        if term.is_empty() {
            return None;
        }
        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        Some(format!("%{escaped}%"))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        Self {
            total,
            page,
            limit,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

impl FormResponse {
    pub async fn insert(
        db: &PgPool,
        form_id: &str,
        submission: AcceptedSubmission,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<FormResponse, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO responses (id, form_id, answers, ip, user_agent, responder_email, send_copy, submitted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(form_id)
        .bind(Json(submission.answers))
        .bind(ip)
        .bind(user_agent)
        .bind(submission.responder_email)
        .bind(submission.send_copy)
        .bind(submission.submitted_at)
        .fetch_one(db)
        .await
    }

    pub async fn find(db: &PgPool, form_id: &str, id: Uuid) -> Result<Option<FormResponse>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM responses WHERE id = $1 AND form_id = $2")
            .bind(id)
            .bind(form_id)
            .fetch_optional(db)
            .await
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM responses WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// All responses of a form, oldest first.
    pub async fn all_for_form(db: &PgPool, form_id: &str) -> Result<Vec<FormResponse>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM responses WHERE form_id = $1 ORDER BY submitted_at ASC")
            .bind(form_id)
            .fetch_all(db)
            .await
    }

    pub async fn count_for_form(db: &PgPool, form_id: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM responses WHERE form_id = $1")
            .bind(form_id)
            .fetch_one(db)
            .await
    }

    /// One page of a form's responses and the total matching the search.
    pub async fn page(
        db: &PgPool,
        form_id: &str,
        query: &ResponseQuery,
    ) -> Result<(Vec<FormResponse>, i64), sqlx::Error> {
        let pattern = query.search_pattern();
        let filter = "form_id = $1 AND ($2::TEXT IS NULL OR EXISTS (
                SELECT 1 FROM jsonb_array_elements(answers) AS a
                WHERE (a->>'value') ILIKE $2))";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM responses WHERE {filter}"))
            .bind(form_id)
            .bind(&pattern)
            .fetch_one(db)
            .await?;

        let responses = sqlx::query_as(&format!(
            "SELECT * FROM responses WHERE {filter} ORDER BY submitted_at {} LIMIT $3 OFFSET $4",
            query.sort_order.as_sql()
        ))
        .bind(form_id)
        .bind(&pattern)
        .bind(query.limit())
        .bind(query.offset())
        .fetch_all(db)
        .await?;

        Ok((responses, total))
    }
}

impl FormView {
    pub async fn record(
        db: &PgPool,
        form_id: &str,
        ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO views (id, form_id, ip, user_agent) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(form_id)
            .bind(ip)
            .bind(user_agent)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn all_for_form(db: &PgPool, form_id: &str) -> Result<Vec<FormView>, sqlx::Error> {
        sqlx::query_as("SELECT ip, user_agent FROM views WHERE form_id = $1")
            .bind(form_id)
            .fetch_all(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FormKind, FormSettings, ResponseCopy, stamp_fields};
    use form_analytics::Field;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn form(settings: FormSettings) -> Form {
        Form {
            id: "abc123DEF456".into(),
            owner_id: "owner".into(),
            title: "Signup".into(),
            description: String::new(),
            kind: Json(FormKind::General),
            logo: None,
            header_image: None,
            custom_details: Json(vec![]),
            fields: Json(vec![
                Field::new("name", FieldType::ShortText, "Name"),
                Field::new("mail", FieldType::Email, "Email"),
            ]),
            settings: Json(settings),
            source_template: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn input(answers: Vec<Answer>, send_copy: bool) -> SubmissionInput {
        SubmissionInput { answers, send_copy }
    }

    #[test]
    fn unknown_fields_are_dropped() {
        let accepted = accept_submission(
            &form(FormSettings::default()),
            input(vec![Answer::new("name", "Ada"), Answer::new("ghost", "boo")], false),
        )
        .unwrap();

        assert_eq!(accepted.answers, vec![Answer::new("name", "Ada")]);
        assert_eq!(accepted.responder_email, None);
    }

    #[test]
    fn responder_email_comes_from_the_email_field() {
        let accepted = accept_submission(
            &form(FormSettings::default()),
            input(vec![Answer::new("mail", " ada@example.com ")], true),
        )
        .unwrap();
        assert_eq!(accepted.responder_email.as_deref(), Some("ada@example.com"));
        // copies are off unless the form allows them
        assert!(!accepted.send_copy);
    }

    #[test]
    fn responder_input_requires_an_email() {
        let settings = FormSettings {
            collect_emails: CollectEmails::ResponderInput,
            ..FormSettings::default()
        };
        let rejected = accept_submission(&form(settings), input(vec![Answer::new("mail", "")], false));
        assert_eq!(rejected, Err(SubmissionRejected::EmailRequired));
    }

    #[test]
    fn copy_follows_the_form_setting() {
        let settings = FormSettings {
            send_response_copy: ResponseCopy::Always,
            ..FormSettings::default()
        };
        let accepted = accept_submission(&form(settings), input(vec![], false)).unwrap();
        assert!(accepted.send_copy);
    }

    #[test]
    fn submissions_are_stamped_after_fields_added_just_before() {
        let mut form = form(FormSettings::default());
        let mut incoming = form.fields.0.clone();
        incoming.push(Field::new("late", FieldType::ShortText, "Late"));
        form.fields = Json(stamp_fields(&form.fields, incoming, Utc::now()));

        let before = Utc::now();
        let accepted =
            accept_submission(&form, input(vec![Answer::new("late", "yes")], false)).unwrap();
        assert!(accepted.submitted_at >= before);

        let late = form.fields.iter().find(|f| f.id == "late").unwrap();
        assert!(late.created_at.is_some_and(|added| added <= accepted.submitted_at));
    }

    #[test]
    fn display_joins_lists() {
        assert_eq!(display_value(&json!(["red", "blue"])), "red, blue");
        assert_eq!(display_value(&json!(4)), "4");
        assert_eq!(display_value(&Value::Null), "");
    }

    #[test]
    fn search_pattern_escapes_wildcards() {
        let query = ResponseQuery {
            search: Some(" 50%_off ".into()),
            ..ResponseQuery::default()
        };
        assert_eq!(query.search_pattern().as_deref(), Some("%50\\%\\_off%"));
        assert_eq!(ResponseQuery::default().search_pattern(), None);
    }

    #[test]
    fn pagination_rounds_pages_up() {
        assert_eq!(Pagination::new(21, 1, 10).total_pages, 3);
        assert_eq!(Pagination::new(0, 1, 10).total_pages, 0);
        let query = ResponseQuery {
            page: 0,
            limit: 500,
            ..ResponseQuery::default()
        };
        assert_eq!((query.page(), query.limit(), query.offset()), (1, 100, 0));
    }

    #[test]
    fn huge_page_numbers_do_not_overflow_the_offset() {
        let query: ResponseQuery = serde_json::from_value(serde_json::json!({ "page": i64::MAX })).unwrap();
        assert_eq!(query.offset(), i64::MAX);

        let query = ResponseQuery {
            page: 3,
            limit: 25,
            ..ResponseQuery::default()
        };
        assert_eq!(query.offset(), 50);
    }
}
