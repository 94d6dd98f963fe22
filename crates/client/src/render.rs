use std::collections::BTreeMap;
use std::fmt::Write;

use colored::*;
use form_analytics::{ChartData, FieldAnalytics, FormStats, TimelinePoint};

const BAR_WIDTH: usize = 30;

/// Horizontal bar scaled so that `max` fills `width` cells. Any non-zero
/// count gets at least one cell.
pub fn bar(count: usize, max: usize, width: usize) -> String {
    if max == 0 || count == 0 {
        return String::new();
    }
    let cells = (count * width).div_ceil(max).clamp(1, width);
    "█".repeat(cells)
}

pub fn header(title: &str) -> String {
    format!(
        "{}\n{}\n{}",
        "=".repeat(60).bright_cyan(),
        format!("    📊 {title}").bright_yellow().bold(),
        "=".repeat(60).bright_cyan()
    )
}

pub fn stats(stats: &FormStats) -> String {
    let rows = [
        ("Views", stats.total_views.to_string()),
        ("Unique viewers", stats.unique_viewers.to_string()),
        ("Responses", stats.total_responses.to_string()),
        ("Unique responders", stats.unique_responders.to_string()),
        ("Completion rate", format!("{}%", stats.completion_rate)),
        ("Today", stats.respondents_today.to_string()),
        ("Last 7 days", stats.respondents_this_week.to_string()),
        ("Last 30 days", stats.respondents_this_month.to_string()),
    ];
    let mut out = String::new();
    for (label, value) in rows {
        let _ = writeln!(out, "  {:<20} {}", label.bright_black(), value.bright_white().bold());
    }
    out
}

fn chart(out: &mut String, chart: &ChartData) {
    let max = chart.data.iter().copied().max().unwrap_or(0);
    let width = chart.labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    for (label, count) in chart.labels.iter().zip(&chart.data) {
        let _ = writeln!(
            out,
            "    {:<width$}  {} {}",
            label,
            bar(*count, max, BAR_WIDTH).green(),
            count.to_string().bright_cyan(),
        );
    }
}

pub fn field(field: &FieldAnalytics) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {}",
        field.label.bright_white().bold(),
        format!("({})", field.field_type).bright_black()
    );
    let _ = writeln!(
        out,
        "    answered {}/{} eligible, {}% complete",
        field.total_responses, field.eligible_responses, field.completion_rate
    );

    if let Some(data) = &field.chart_data {
        chart(&mut out, data);
    }
    if let Some(numbers) = &field.stats {
        let _ = writeln!(
            out,
            "    min {}  max {}  avg {}  total {}",
            numbers.min, numbers.max, numbers.avg, numbers.total
        );
    }
    if let Some(unique) = field.unique_count {
        let _ = writeln!(out, "    {} unique answers", unique.to_string().bright_cyan());
    }
    out
}

/// Renders fields in `order`, then any the order does not mention.
pub fn fields(analytics: &BTreeMap<String, FieldAnalytics>, order: &[&str]) -> String {
    if analytics.is_empty() {
        return format!("  {}\n", "This form has no fields.".yellow());
    }
    let listed = order.iter().filter_map(|id| analytics.get(*id));
    let rest = analytics
        .iter()
        .filter(|(id, _)| !order.contains(&id.as_str()))
        .map(|(_, a)| a);
    listed.chain(rest).map(field).collect::<Vec<_>>().join("\n")
}

pub fn timeline(points: &[TimelinePoint]) -> String {
    if points.is_empty() {
        return format!("  {}\n", "No submissions yet.".yellow());
    }
    let max = points.iter().map(|p| p.submissions).max().unwrap_or(0);
    let mut out = String::new();
    for point in points {
        let _ = writeln!(
            out,
            "  {:<10}  {} {}",
            point.period,
            bar(point.submissions, max, BAR_WIDTH).blue(),
            point.submissions.to_string().bright_cyan(),
        );
    }
    out
}
