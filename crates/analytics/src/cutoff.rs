use chrono::{DateTime, Utc};

use crate::model::Field;

/// Earliest submission instant that counts toward a field's analytics.
///
/// Resolved in three tiers: the field's own creation time, then the form's
/// last update, then no bound at all. Responses older than the cutoff could
/// not have answered the field, so they are left out of both the numerator
/// and the denominator of its completion rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cutoff {
    Field(DateTime<Utc>),
    Form(DateTime<Utc>),
    Unbounded,
}

impl Cutoff {
    pub fn resolve(field: &Field, form_updated_at: Option<DateTime<Utc>>) -> Self {
        match (field.created_at, form_updated_at) {
            (Some(at), _) => Self::Field(at),
            (None, Some(at)) => Self::Form(at),
            (None, None) => Self::Unbounded,
        }
    }

    pub fn instant(self) -> Option<DateTime<Utc>> {
        match self {
            Self::Field(at) | Self::Form(at) => Some(at),
            Self::Unbounded => None,
        }
    }

    /// Inclusive: a response submitted exactly at the cutoff is eligible.
    pub fn admits(self, submitted_at: DateTime<Utc>) -> bool {
        self.instant().is_none_or(|at| submitted_at >= at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn field_timestamp_wins() {
        let field = Field::new("f", FieldType::ShortText, "Name").added_at(at(9));
        assert_eq!(Cutoff::resolve(&field, Some(at(12))), Cutoff::Field(at(9)));
    }

    #[test]
    fn falls_back_to_form_update() {
        let field = Field::new("f", FieldType::ShortText, "Name");
        assert_eq!(Cutoff::resolve(&field, Some(at(12))), Cutoff::Form(at(12)));
    }

    #[test]
    fn unbounded_without_any_timestamp() {
        let field = Field::new("f", FieldType::ShortText, "Name");
        let cutoff = Cutoff::resolve(&field, None);
        assert_eq!(cutoff, Cutoff::Unbounded);
        assert!(cutoff.admits(Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn admits_is_inclusive() {
        let cutoff = Cutoff::Field(at(9));
        assert!(cutoff.admits(at(9)));
        assert!(cutoff.admits(at(10)));
        assert!(!cutoff.admits(at(8)));
    }
}
