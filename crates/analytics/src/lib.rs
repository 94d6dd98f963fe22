//! Response analytics for FormCraft forms.
//!
//! Everything in this crate is a pure function over already-fetched data:
//! a form definition, its responses and (optionally) its view log. Nothing
//! here performs I/O or holds state between calls, so the same inputs always
//! produce the same output.
//!
//! - [`aggregate`] builds a per-field summary keyed by field id.
//! - [`timeline`] buckets submissions by day, week or month.
//! - [`form_stats`] computes form-wide traffic and completion figures.

mod aggregate;
mod cutoff;
mod model;
mod stats;
mod timeline;

pub use aggregate::{ChartData, ChartKind, FieldAnalytics, NumericStats, aggregate};
pub use cutoff::Cutoff;
pub use model::{
    Answer, Field, FieldLogic, FieldType, FieldValidation, FieldWidth, Fingerprint,
    FormDefinition, FormSource, LogicOperator, ResponseRecord, Submission, ViewRecord, Visit,
    value_key,
};
pub use stats::{CompletionTime, FormStats, form_stats};
pub use timeline::{Granularity, TimelinePoint, timeline};

/// Round to two decimal places, the precision every percentage and mean is
/// reported with.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
