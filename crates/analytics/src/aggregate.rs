use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cutoff::Cutoff;
use crate::model::{Answer, Field, FieldType, FormSource, Submission, value_key};
use crate::round2;

const DEFAULT_RATING_SCALE: [&str; 5] = ["1", "2", "3", "4", "5"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Pie,
    Bar,
}

/// Chart-ready distribution: `data[i]` is the count for `labels[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub data: Vec<usize>,
    /// The field's configured options, for choice fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    /// Mean rounded to two decimals.
    pub avg: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAnalytics {
    pub field_id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Eligible responses that answered this field.
    pub total_responses: usize,
    /// Responses submitted on or after the field's cutoff.
    pub eligible_responses: usize,
    /// Percentage with two decimals, `0` when nothing was eligible.
    pub completion_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_data: Option<ChartData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<NumericStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_count: Option<usize>,
}

/// Per-field analytics for `form` over `responses`, keyed by field id.
///
/// Answers to fields no longer on the form are ignored.
pub fn aggregate<F, S>(form: &F, responses: &[S]) -> BTreeMap<String, FieldAnalytics>
where
    F: FormSource + ?Sized,
    S: Submission,
{
    let indexed: Vec<(&S, HashMap<&str, &Answer>)> = responses
        .iter()
        .map(|response| {
            let mut by_field = HashMap::new();
            for answer in response.answers() {
                by_field.entry(answer.field_id.as_str()).or_insert(answer);
            }
            (response, by_field)
        })
        .collect();

    form.fields()
        .iter()
        .map(|field| {
            let cutoff = Cutoff::resolve(field, form.updated_at());
            let mut eligible = 0;
            let mut tally = Tally::default();

            for (response, by_field) in &indexed {
                if !cutoff.admits(response.submitted_at()) {
                    continue;
                }
                eligible += 1;
                match by_field.get(field.id.as_str()) {
                    Some(answer) if answer.is_filled() => tally.record(field.field_type, &answer.value),
                    _ => {}
                }
            }

            (field.id.clone(), tally.finish(field, eligible))
        })
        .collect()
}

/// Running counts for one field.
#[derive(Default)]
struct Tally {
    answered: usize,
    counts: BTreeMap<String, usize>,
    unique: BTreeSet<String>,
    numbers: Vec<f64>,
}

impl Tally {
    fn record(&mut self, field_type: FieldType, value: &Value) {
        self.answered += 1;

        if field_type.is_choice() || field_type == FieldType::Rating {
            match value {
                Value::Array(items) => items.iter().for_each(|item| self.count(item)),
                single => self.count(single),
            }
            return;
        }

        self.unique.insert(value_key(value));
        if field_type == FieldType::Number {
            if let Some(n) = parse_number(value) {
                self.numbers.push(n);
            }
        }
    }

    fn count(&mut self, value: &Value) {
        let key = value_key(value);
        *self.counts.entry(key.clone()).or_default() += 1;
        self.unique.insert(key);
    }

    fn finish(self, field: &Field, eligible: usize) -> FieldAnalytics {
        let completion_rate = if eligible == 0 {
            0.0
        } else {
            round2(self.answered as f64 / eligible as f64 * 100.0)
        };

        let mut analytics = FieldAnalytics {
            field_id: field.id.clone(),
            label: field.label.clone(),
            field_type: field.field_type,
            total_responses: self.answered,
            eligible_responses: eligible,
            completion_rate,
            chart_data: None,
            stats: None,
            unique_count: None,
        };

        match field.field_type {
            t if t.is_choice() => {
                let (labels, data) = self.counts.into_iter().unzip();
                analytics.chart_data = Some(ChartData {
                    kind: ChartKind::Pie,
                    labels,
                    data,
                    options: field.options.clone(),
                });
            }
            FieldType::Rating => {
                let labels = if field.options.is_empty() {
                    DEFAULT_RATING_SCALE.iter().map(|s| s.to_string()).collect()
                } else {
                    field.option_labels()
                };
                let data = labels
                    .iter()
                    .map(|label| self.counts.get(label).copied().unwrap_or(0))
                    .collect();
                analytics.chart_data = Some(ChartData {
                    kind: ChartKind::Bar,
                    labels,
                    data,
                    options: Vec::new(),
                });
            }
            FieldType::Number => analytics.stats = numeric_stats(&self.numbers),
            _ => analytics.unique_count = Some(self.unique.len()),
        }

        analytics
    }
}

/// Numbers pass through; strings must parse completely as a finite float.
fn parse_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn numeric_stats(numbers: &[f64]) -> Option<NumericStats> {
    if numbers.is_empty() {
        return None;
    }
    let total: f64 = numbers.iter().sum();
    let avg = round2(total / numbers.len() as f64);
    // A sum past f64::MAX has no meaningful mean either.
    if !total.is_finite() || !avg.is_finite() {
        return None;
    }
    Some(NumericStats {
        min: numbers.iter().copied().fold(f64::INFINITY, f64::min),
        max: numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        avg,
        total,
    })
}
