use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::Submission;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    /// First day of the bucket containing `date`. Weeks start on Sunday.
    fn bucket(self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Daily => date,
            Self::Weekly => date - Duration::days(i64::from(date.weekday().num_days_from_sunday())),
            Self::Monthly => date.with_day(1).unwrap_or(date),
        }
    }

    fn label(self, bucket: NaiveDate) -> String {
        match self {
            Self::Daily | Self::Weekly => bucket.format("%Y-%m-%d").to_string(),
            Self::Monthly => bucket.format("%Y-%m").to_string(),
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(format!("unknown granularity: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePoint {
    /// `YYYY-MM-DD` for daily and weekly buckets, `YYYY-MM` for monthly.
    pub period: String,
    pub submissions: usize,
}

/// Submission counts per period, ascending. Periods without submissions are
/// not emitted. All bucketing is done in UTC.
pub fn timeline<S: Submission>(responses: &[S], granularity: Granularity) -> Vec<TimelinePoint> {
    let mut buckets: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for response in responses {
        let date = response.submitted_at().date_naive();
        *buckets.entry(granularity.bucket(date)).or_default() += 1;
    }

    buckets
        .into_iter()
        .map(|(bucket, submissions)| TimelinePoint {
            period: granularity.label(bucket),
            submissions,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResponseRecord;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn submitted(at: DateTime<Utc>) -> ResponseRecord {
        ResponseRecord {
            answers: vec![],
            submitted_at: at,
            fingerprint: Default::default(),
        }
    }

    fn point(period: &str, submissions: usize) -> TimelinePoint {
        TimelinePoint {
            period: period.to_string(),
            submissions,
        }
    }

    #[test]
    fn daily_buckets_split_at_utc_midnight() {
        let responses = vec![
            submitted("2024-01-06T00:01:00Z".parse().unwrap()),
            submitted("2024-01-05T23:59:00Z".parse().unwrap()),
        ];

        assert_eq!(
            timeline(&responses, Granularity::Daily),
            vec![point("2024-01-05", 1), point("2024-01-06", 1)]
        );
    }

    #[test]
    fn offset_timestamps_are_bucketed_in_utc() {
        let local = DateTime::parse_from_rfc3339("2024-01-05T22:30:00-05:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            timeline(&[submitted(local)], Granularity::Daily),
            vec![point("2024-01-06", 1)]
        );
    }

    #[test]
    fn weekly_buckets_start_on_sunday() {
        // 2024-01-07 is a Sunday.
        let responses = vec![
            submitted(Utc.with_ymd_and_hms(2024, 1, 6, 10, 0, 0).unwrap()),
            submitted(Utc.with_ymd_and_hms(2024, 1, 7, 10, 0, 0).unwrap()),
            submitted(Utc.with_ymd_and_hms(2024, 1, 13, 10, 0, 0).unwrap()),
            submitted(Utc.with_ymd_and_hms(2024, 1, 14, 10, 0, 0).unwrap()),
        ];

        assert_eq!(
            timeline(&responses, Granularity::Weekly),
            vec![
                point("2023-12-31", 1),
                point("2024-01-07", 2),
                point("2024-01-14", 1)
            ]
        );
    }

    #[test]
    fn monthly_buckets_sort_across_years() {
        let responses = vec![
            submitted(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
            submitted(Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap()),
            submitted(Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap()),
        ];

        assert_eq!(
            timeline(&responses, Granularity::Monthly),
            vec![point("2023-12", 1), point("2024-02", 2)]
        );
    }

    #[test]
    fn empty_input_gives_empty_timeline() {
        let responses: Vec<ResponseRecord> = vec![];
        assert!(timeline(&responses, Granularity::Weekly).is_empty());
    }

    #[test]
    fn granularity_parses_from_query_strings() {
        assert_eq!("weekly".parse::<Granularity>(), Ok(Granularity::Weekly));
        assert!("hourly".parse::<Granularity>().is_err());
        assert_eq!(Granularity::default(), Granularity::Daily);
    }
}
