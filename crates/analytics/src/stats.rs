use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Answer, FormSource, Submission, Visit};
use crate::round2;

/// Average open-to-submit duration.
///
/// Responses only record when they were submitted, not when the form was
/// opened, so the figure cannot be computed and is always reported as
/// unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompletionTime {
    #[default]
    Unavailable,
}

/// Form-wide traffic and completion figures.
///
/// `unique_viewers` and `unique_responders` count distinct
/// [`Fingerprint`](crate::Fingerprint)s and are estimates, not visitor counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormStats {
    pub total_views: usize,
    pub unique_viewers: usize,
    pub total_responses: usize,
    pub unique_responders: usize,
    /// Mean share of the form's fields filled per response, as a percentage
    /// formatted with two decimals.
    pub completion_rate: String,
    pub avg_completion_time: CompletionTime,
    pub respondents_today: usize,
    pub respondents_this_week: usize,
    pub respondents_this_month: usize,
}

/// Overall statistics for a form, evaluated at `now`.
pub fn form_stats<F, S, V>(form: &F, responses: &[S], views: &[V], now: DateTime<Utc>) -> FormStats
where
    F: FormSource + ?Sized,
    S: Submission,
    V: Visit,
{
    let field_ids: Vec<&str> = form.fields().iter().map(|f| f.id.as_str()).collect();

    let completion = if responses.is_empty() {
        0.0
    } else {
        let sum: f64 = responses
            .iter()
            .map(|r| filled_fraction(&field_ids, r.answers()))
            .sum();
        sum / responses.len() as f64 * 100.0
    };

    let unique_responders: HashSet<_> = responses.iter().map(|r| r.fingerprint()).collect();
    let unique_viewers: HashSet<_> = views.iter().map(|v| v.fingerprint()).collect();

    FormStats {
        total_views: views.len(),
        unique_viewers: unique_viewers.len(),
        total_responses: responses.len(),
        unique_responders: unique_responders.len(),
        completion_rate: format!("{:.2}", round2(completion)),
        avg_completion_time: CompletionTime::Unavailable,
        respondents_today: submitted_within(responses, now, 1),
        respondents_this_week: submitted_within(responses, now, 7),
        respondents_this_month: submitted_within(responses, now, 30),
    }
}

fn filled_fraction(field_ids: &[&str], answers: &[Answer]) -> f64 {
    if field_ids.is_empty() {
        return 0.0;
    }
    let mut by_field: HashMap<&str, &Answer> = HashMap::new();
    for answer in answers {
        by_field.entry(answer.field_id.as_str()).or_insert(answer);
    }
    let filled = field_ids
        .iter()
        .filter(|id| by_field.get(*id).is_some_and(|a| a.is_filled()))
        .count();
    filled as f64 / field_ids.len() as f64
}

/// Responses submitted in the trailing `days` days before `now`.
fn submitted_within<S: Submission>(responses: &[S], now: DateTime<Utc>, days: i64) -> usize {
    let cutoff = now - Duration::days(days);
    responses
        .iter()
        .filter(|r| r.submitted_at() > cutoff)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, FieldType, Fingerprint, FormDefinition, ResponseRecord, ViewRecord};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    fn form() -> FormDefinition {
        FormDefinition {
            fields: vec![
                Field::new("a", FieldType::ShortText, "A"),
                Field::new("b", FieldType::Email, "B"),
                Field::new("c", FieldType::Number, "C"),
                Field::new("d", FieldType::Checkbox, "D"),
            ],
            updated_at: None,
        }
    }

    fn response(days_ago: i64, ip: &str, answers: Vec<Answer>) -> ResponseRecord {
        ResponseRecord {
            answers,
            submitted_at: now() - Duration::days(days_ago) + Duration::minutes(1),
            fingerprint: Fingerprint::new(Some(ip), Some("agent")),
        }
    }

    fn view(ip: &str, agent: &str) -> ViewRecord {
        ViewRecord {
            fingerprint: Fingerprint::new(Some(ip), Some(agent)),
            viewed_at: now(),
        }
    }

    #[test]
    fn empty_form_history_reports_zeroes() {
        let responses: Vec<ResponseRecord> = vec![];
        let views: Vec<ViewRecord> = vec![];

        let stats = form_stats(&form(), &responses, &views, now());
        assert_eq!(stats.completion_rate, "0.00");
        assert_eq!(stats.total_responses, 0);
        assert_eq!(stats.unique_responders, 0);
        assert_eq!(stats.unique_viewers, 0);
        assert_eq!(stats.total_views, 0);
        assert_eq!(stats.respondents_this_month, 0);
        assert_eq!(stats.avg_completion_time, CompletionTime::Unavailable);
    }

    #[test]
    fn completion_rate_averages_filled_fraction() {
        let responses = vec![
            // 4 of 4
            response(0, "1.1.1.1", vec![
                Answer::new("a", "x"),
                Answer::new("b", "x@y.z"),
                Answer::new("c", 3),
                Answer::new("d", serde_json::json!(["p"])),
            ]),
            // 1 of 4, blanks and orphans do not count
            response(0, "1.1.1.2", vec![
                Answer::new("a", "x"),
                Answer::new("b", ""),
                Answer::new("d", serde_json::json!([])),
                Answer::new("gone", "x"),
            ]),
        ];
        let views: Vec<ViewRecord> = vec![];

        let stats = form_stats(&form(), &responses, &views, now());
        assert_eq!(stats.completion_rate, "62.50");
    }

    #[test]
    fn form_without_fields_has_zero_completion() {
        let responses = vec![response(0, "1.1.1.1", vec![Answer::new("a", "x")])];
        let views: Vec<ViewRecord> = vec![];
        let stats = form_stats(&FormDefinition::default(), &responses, &views, now());
        assert_eq!(stats.completion_rate, "0.00");
    }

    #[test]
    fn uniqueness_is_by_ip_and_user_agent() {
        let responses = vec![
            response(0, "1.1.1.1", vec![]),
            response(0, "1.1.1.1", vec![]),
            response(0, "2.2.2.2", vec![]),
        ];
        let views = vec![
            view("1.1.1.1", "agent"),
            view("1.1.1.1", "other agent"),
            view("1.1.1.1", "agent"),
        ];

        let stats = form_stats(&form(), &responses, &views, now());
        assert_eq!(stats.unique_responders, 2);
        assert_eq!(stats.total_views, 3);
        assert_eq!(stats.unique_viewers, 2);
    }

    #[test]
    fn trailing_windows() {
        let responses = vec![
            response(0, "a", vec![]),
            response(3, "b", vec![]),
            response(10, "c", vec![]),
            response(45, "d", vec![]),
        ];
        let views: Vec<ViewRecord> = vec![];

        let stats = form_stats(&form(), &responses, &views, now());
        assert_eq!(stats.respondents_today, 1);
        assert_eq!(stats.respondents_this_week, 2);
        assert_eq!(stats.respondents_this_month, 3);
    }

    #[test]
    fn completion_time_serializes_as_unavailable() {
        let json = serde_json::to_value(CompletionTime::Unavailable).unwrap();
        assert_eq!(json, serde_json::json!({"status": "unavailable"}));
    }
}
