use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input types a form field can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    ShortText,
    LongText,
    Email,
    Number,
    Date,
    Dropdown,
    Checkbox,
    Radio,
    File,
    Rating,
    Matrix,
    Signature,
    ImageChoice,
}

impl FieldType {
    /// Single or multiple choice among fixed options.
    pub fn is_choice(self) -> bool {
        matches!(self, Self::Radio | Self::Dropdown | Self::Checkbox)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShortText => "short_text",
            Self::LongText => "long_text",
            Self::Email => "email",
            Self::Number => "number",
            Self::Date => "date",
            Self::Dropdown => "dropdown",
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::File => "file",
            Self::Rating => "rating",
            Self::Matrix => "matrix",
            Self::Signature => "signature",
            Self::ImageChoice => "image_choice",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldWidth {
    #[default]
    Full,
    Half,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldValidation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_error_message: Option<String>,
    pub email: bool,
    pub phone: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicOperator {
    Equals,
    NotEquals,
    Contains,
}

/// Show the field only when another field's answer matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldLogic {
    pub show_when_field_id: String,
    pub operator: LogicOperator,
    pub value: String,
}

/// A single input definition on a form.
///
/// `options` holds plain strings for choice and rating fields, and
/// `{id, label, url}` objects for image choices, so it stays untyped JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<Value>,
    #[serde(default)]
    pub validation: FieldValidation,
    #[serde(default)]
    pub width: FieldWidth,
    #[serde(default)]
    pub order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<FieldLogic>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matrix_rows: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matrix_columns: Vec<String>,
    /// When the field was added to the form. Older forms carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Field {
    pub fn new(id: impl Into<String>, field_type: FieldType, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field_type,
            label: label.into(),
            placeholder: None,
            required: false,
            options: Vec::new(),
            validation: FieldValidation::default(),
            width: FieldWidth::default(),
            order: 0,
            logic: None,
            matrix_rows: Vec::new(),
            matrix_columns: Vec::new(),
            created_at: None,
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(|o| Value::String(o.into())).collect();
        self
    }

    pub fn added_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Options rendered as chart labels.
    pub fn option_labels(&self) -> Vec<String> {
        self.options.iter().map(value_key).collect()
    }
}

/// A response's value for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub field_id: String,
    #[serde(default)]
    pub value: Value,
}

impl Answer {
    pub fn new(field_id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field_id: field_id.into(),
            value: value.into(),
        }
    }

    /// Null, the empty string and the empty list all count as "not answered".
    pub fn is_filled(&self) -> bool {
        match &self.value {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        }
    }
}

/// Text key used to count and de-duplicate answer values.
pub fn value_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Client identity approximated by the `(ip, user agent)` pair.
///
/// This is a heuristic, not a visitor identity: clients behind a shared NAT
/// collapse into one fingerprint, and one person switching networks or
/// browsers produces several. Counts built on it are estimates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub ip: String,
    pub user_agent: String,
}

impl Fingerprint {
    pub fn new(ip: Option<&str>, user_agent: Option<&str>) -> Self {
        Self {
            ip: ip.unwrap_or_default().to_string(),
            user_agent: user_agent.unwrap_or_default().to_string(),
        }
    }
}

/// A form as the aggregator sees it.
pub trait FormSource {
    fn fields(&self) -> &[Field];

    /// Last time the form definition changed, used when a field has no
    /// timestamp of its own.
    fn updated_at(&self) -> Option<DateTime<Utc>>;
}

/// A submitted response as the aggregator sees it.
pub trait Submission {
    fn answers(&self) -> &[Answer];

    /// The one canonical submission instant.
    fn submitted_at(&self) -> DateTime<Utc>;

    fn fingerprint(&self) -> Fingerprint;
}

/// An entry of a form's view log.
pub trait Visit {
    fn fingerprint(&self) -> Fingerprint;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormDefinition {
    pub fields: Vec<Field>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FormSource for FormDefinition {
    fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub answers: Vec<Answer>,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub fingerprint: Fingerprint,
}

impl Submission for ResponseRecord {
    fn answers(&self) -> &[Answer] {
        &self.answers
    }

    fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewRecord {
    pub fingerprint: Fingerprint,
    pub viewed_at: DateTime<Utc>,
}

impl Visit for ViewRecord {
    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_answers_are_not_filled() {
        assert!(!Answer::new("a", Value::Null).is_filled());
        assert!(!Answer::new("a", "").is_filled());
        assert!(!Answer::new("a", json!([])).is_filled());
        assert!(Answer::new("a", "x").is_filled());
        assert!(Answer::new("a", 0).is_filled());
        assert!(Answer::new("a", false).is_filled());
    }

    #[test]
    fn field_deserializes_with_defaults() {
        let field: Field = serde_json::from_value(json!({
            "id": "f1",
            "type": "image_choice",
            "label": "Pick one",
            "options": [{"id": "a", "label": "A", "url": "https://img/a.png"}]
        }))
        .unwrap();

        assert_eq!(field.field_type, FieldType::ImageChoice);
        assert_eq!(field.width, FieldWidth::Full);
        assert!(!field.required);
        assert!(field.created_at.is_none());
        assert_eq!(field.options.len(), 1);
    }

    #[test]
    fn missing_fingerprint_parts_are_empty() {
        assert_eq!(Fingerprint::new(None, None), Fingerprint::new(Some(""), Some("")));
        assert_ne!(
            Fingerprint::new(Some("10.0.0.1"), Some("curl")),
            Fingerprint::new(Some("10.0.0.1"), Some("firefox"))
        );
    }
}
