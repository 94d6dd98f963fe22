use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use form_analytics::{Field, FormSource};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, types::Json};

pub const FORM_ID_LEN: usize = 12;
pub const DEFAULT_FORM_TITLE: &str = "Untitled Form";

pub fn new_form_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(FORM_ID_LEN)
        .map(char::from)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventDetails {
    pub subtitle: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub organizer_name: Option<String>,
    pub organizer_email: Option<String>,
    pub organizer_phone: Option<String>,
    pub event_status: Option<String>,
    pub capacity: Option<u32>,
    pub agenda: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDetails {
    pub location: Option<String>,
    pub salary: Option<String>,
    pub employment_type: Option<String>,
    pub skills: Option<String>,
    pub deadline: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelDetails {
    pub destination: Option<String>,
    pub duration: Option<String>,
    pub price: Option<String>,
    pub itinerary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppointmentDetails {
    pub title: Option<String>,
    pub appointment_type: Option<String>,
    pub date_time: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackDetails {
    pub company_name: Option<String>,
    pub product_service: Option<String>,
    pub customer_type: Option<String>,
    pub feedback_category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EducationDetails {
    pub college_name: Option<String>,
    pub program: Option<String>,
    pub application_deadline: Option<String>,
    pub requirements: Option<String>,
    pub tuition_fees: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportDetails {
    pub department: Option<String>,
    pub urgency_level: Option<String>,
    pub subject_category: Option<String>,
    pub contact_phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyDetails {
    pub survey_type: Option<String>,
    pub target_audience: Option<String>,
    pub estimated_time: Option<String>,
    pub survey_category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductDetails {
    pub product_name: Option<String>,
    pub product_category: Option<String>,
    pub product_price: Option<String>,
    pub stock_quantity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseDetails {
    pub course_name: Option<String>,
    pub course_level: Option<String>,
    pub course_duration: Option<String>,
    pub course_fee: Option<String>,
}

/// What a form is for, with the attributes that only make sense for that
/// kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormKind {
    #[default]
    General,
    Event(EventDetails),
    Job(JobDetails),
    Travel(TravelDetails),
    Appointment(AppointmentDetails),
    Feedback(FeedbackDetails),
    Education(EducationDetails),
    Support(SupportDetails),
    Survey(SurveyDetails),
    Product(ProductDetails),
    Course(CourseDetails),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub primary_color: String,
    pub accent_color: String,
    pub background: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_color: "#6366f1".to_string(),
            accent_color: "#22c55e".to_string(),
            background: "#0f172a".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectEmails {
    #[default]
    None,
    ResponderInput,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCopy {
    #[default]
    Off,
    Requested,
    Always,
}

impl ResponseCopy {
    pub fn applies(self, requested: bool) -> bool {
        match self {
            Self::Off => false,
            Self::Requested => requested,
            Self::Always => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormSettings {
    pub is_public: bool,
    pub notification_email: Option<String>,
    pub notify_on_submission: bool,
    pub theme: Theme,
    pub allow_multiple_submissions: bool,
    pub collect_emails: CollectEmails,
    pub send_response_copy: ResponseCopy,
    pub custom_message: Option<String>,
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            is_public: true,
            notification_email: None,
            notify_on_submission: false,
            theme: Theme::default(),
            allow_multiple_submissions: true,
            collect_emails: CollectEmails::default(),
            send_response_copy: ResponseCopy::default(),
            custom_message: None,
        }
    }
}

impl FormSettings {
    /// Address that should receive submission notifications, if enabled.
    pub fn notification_target(&self) -> Option<&str> {
        if !self.notify_on_submission {
            return None;
        }
        self.notification_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomDetail {
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default = "CustomDetail::default_type")]
    pub detail_type: String,
    #[serde(default)]
    pub value: String,
}

impl CustomDetail {
    fn default_type() -> String {
        "short_text".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Form {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub kind: Json<FormKind>,
    pub logo: Option<String>,
    pub header_image: Option<String>,
    pub custom_details: Json<Vec<CustomDetail>>,
    pub fields: Json<Vec<Field>>,
    pub settings: Json<FormSettings>,
    pub source_template: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FormSource for Form {
    fn fields(&self) -> &[Field] {
        &self.fields.0
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        Some(self.updated_at)
    }
}

/// The form as shown to respondents.
#[derive(Debug, Serialize)]
pub struct PublicForm {
    pub id: String,
    pub title: String,
    pub description: String,
    pub kind: FormKind,
    pub logo: Option<String>,
    pub header_image: Option<String>,
    pub custom_details: Vec<CustomDetail>,
    pub fields: Vec<Field>,
    pub settings: FormSettings,
}

impl From<Form> for PublicForm {
    fn from(form: Form) -> Self {
        Self {
            id: form.id,
            title: form.title,
            description: form.description,
            kind: form.kind.0,
            logo: form.logo,
            header_image: form.header_image,
            custom_details: form.custom_details.0,
            fields: form.fields.0,
            settings: form.settings.0,
        }
    }
}

/// Body of a form create or full-replacement update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub kind: FormKind,
    pub logo: Option<String>,
    pub header_image: Option<String>,
    pub custom_details: Vec<CustomDetail>,
    pub fields: Vec<Field>,
    pub settings: FormSettings,
    pub source_template: Option<String>,
}

impl FormInput {
    pub fn title(&self) -> String {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_FORM_TITLE)
            .to_string()
    }

    /// Field ids must be present and unique within the form.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.id.trim().is_empty() {
                return Err(format!("Field \"{}\" has no id", field.label));
            }
            if !seen.insert(field.id.as_str()) {
                return Err(format!("Duplicate field id: {}", field.id));
            }
        }
        Ok(())
    }
}

/// Assigns each incoming field its addition time. Ids already on the form
/// keep the timestamp they had, new ids get `now`.
pub fn stamp_fields(previous: &[Field], incoming: Vec<Field>, now: DateTime<Utc>) -> Vec<Field> {
    let known: HashMap<&str, Option<DateTime<Utc>>> = previous
        .iter()
        .map(|f| (f.id.as_str(), f.created_at))
        .collect();

    incoming
        .into_iter()
        .map(|mut field| {
            field.created_at = match known.get(field.id.as_str()) {
                Some(existing) => *existing,
                None => Some(now),
            };
            field
        })
        .collect()
}

impl Form {
    pub async fn find(db: &PgPool, id: &str) -> Result<Option<Form>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM forms WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn list_for_owner(db: &PgPool, owner_id: &str) -> Result<Vec<Form>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM forms WHERE owner_id = $1 ORDER BY updated_at DESC")
            .bind(owner_id)
            .fetch_all(db)
            .await
    }

    pub async fn insert(db: &PgPool, owner_id: &str, input: FormInput) -> Result<Form, sqlx::Error> {
        let now = Utc::now();
        let title = input.title();
        let fields = stamp_fields(&[], input.fields, now);

        sqlx::query_as(
            "INSERT INTO forms (id, owner_id, title, description, kind, logo, header_image,
                                custom_details, fields, settings, source_template, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
             RETURNING *",
        )
        .bind(new_form_id())
        .bind(owner_id)
        .bind(title)
        .bind(input.description.unwrap_or_default())
        .bind(Json(input.kind))
        .bind(input.logo)
        .bind(input.header_image)
        .bind(Json(input.custom_details))
        .bind(Json(fields))
        .bind(Json(input.settings))
        .bind(input.source_template)
        .bind(now)
        .fetch_one(db)
        .await
    }

    /// Replaces the form's content, fields and settings.
    pub async fn replace(&self, db: &PgPool, input: FormInput) -> Result<Form, sqlx::Error> {
        let now = Utc::now();
        let title = input.title();
        let fields = stamp_fields(&self.fields.0, input.fields, now);

        sqlx::query_as(
            "UPDATE forms
             SET title = $2, description = $3, kind = $4, logo = $5, header_image = $6,
                 custom_details = $7, fields = $8, settings = $9, source_template = $10,
                 updated_at = $11
             WHERE id = $1
             RETURNING *",
        )
        .bind(&self.id)
        .bind(title)
        .bind(input.description.unwrap_or_default())
        .bind(Json(input.kind))
        .bind(input.logo)
        .bind(input.header_image)
        .bind(Json(input.custom_details))
        .bind(Json(fields))
        .bind(Json(input.settings))
        .bind(input.source_template)
        .bind(now)
        .fetch_one(db)
        .await
    }

    /// Everything hanging off the form goes with it through cascades.
    pub async fn delete(db: &PgPool, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM forms WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Field label by id, for rendering answers.
    pub fn label_of<'a>(&'a self, field_id: &'a str) -> &'a str {
        self.fields
            .iter()
            .find(|f| f.id == field_id)
            .map(|f| f.label.as_str())
            .unwrap_or(field_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use form_analytics::FieldType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn form_ids_are_twelve_alphanumerics() {
        let id = new_form_id();
        assert_eq!(id.len(), FORM_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, new_form_id());
    }

    #[test]
    fn form_kind_is_tagged_by_type() {
        let kind: FormKind = serde_json::from_value(json!({
            "type": "event",
            "location": "Main hall",
            "capacity": 120
        }))
        .unwrap();

        match &kind {
            FormKind::Event(details) => {
                assert_eq!(details.location.as_deref(), Some("Main hall"));
                assert_eq!(details.capacity, Some(120));
                assert_eq!(details.organizer_name, None);
            }
            other => panic!("unexpected kind {other:?}"),
        }

        let general: FormKind = serde_json::from_value(json!({"type": "general"})).unwrap();
        assert_eq!(general, FormKind::General);
        assert_eq!(serde_json::to_value(FormKind::General).unwrap(), json!({"type": "general"}));
    }

    #[test]
    fn settings_fill_in_defaults() {
        let settings: FormSettings = serde_json::from_value(json!({
            "notify_on_submission": true,
            "notification_email": "  owner@example.com ",
            "send_response_copy": "requested"
        }))
        .unwrap();

        assert!(settings.is_public);
        assert!(settings.allow_multiple_submissions);
        assert_eq!(settings.theme.primary_color, "#6366f1");
        assert_eq!(settings.collect_emails, CollectEmails::None);
        assert_eq!(settings.notification_target(), Some("owner@example.com"));
        assert!(settings.send_response_copy.applies(true));
        assert!(!settings.send_response_copy.applies(false));
    }

    #[test]
    fn notification_target_requires_the_toggle() {
        let settings = FormSettings {
            notification_email: Some("owner@example.com".into()),
            ..FormSettings::default()
        };
        assert_eq!(settings.notification_target(), None);
    }

    #[test]
    fn stamping_keeps_existing_field_times() {
        let added = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let now = added + Duration::days(30);
        let previous = vec![
            Field::new("name", FieldType::ShortText, "Name").added_at(added),
            Field::new("legacy", FieldType::ShortText, "Legacy"),
        ];
        let incoming = vec![
            Field::new("name", FieldType::ShortText, "Full name"),
            Field::new("legacy", FieldType::ShortText, "Legacy"),
            Field::new("email", FieldType::Email, "Email").added_at(added),
        ];

        let stamped = stamp_fields(&previous, incoming, now);
        assert_eq!(stamped[0].created_at, Some(added));
        assert_eq!(stamped[0].label, "Full name");
        assert_eq!(stamped[1].created_at, None);
        // client-supplied times on new fields are not trusted
        assert_eq!(stamped[2].created_at, Some(now));
    }

    #[test]
    fn input_rejects_duplicate_field_ids() {
        let input = FormInput {
            fields: vec![
                Field::new("a", FieldType::ShortText, "A"),
                Field::new("a", FieldType::Email, "B"),
            ],
            ..FormInput::default()
        };
        assert!(input.validate().is_err());
        assert_eq!(FormInput::default().title(), DEFAULT_FORM_TITLE);
    }
}
