//! Chart-ready shapes and the rules every metric transform shares.
//!
//! Derived ratios are `Option<f64>`: `None` means the denominator was zero and
//! the value must not be drawn, so no `NaN`, `Infinity` or placeholder `0`
//! ever reaches a chart.

use crate::range::Granularity;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Conversion rate shown for the first funnel step, which has no predecessor.
pub const FIRST_STEP_RATE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: DateTime<Utc>,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub id: String,
    pub data: Vec<Point>,
}

impl Series {
    /// Builds a time-indexed series sorted by `x`. Rows whose timestamp
    /// cannot be read are dropped.
    pub fn from_rows<'a, I>(id: impl Into<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut data: Vec<Point> = rows
            .into_iter()
            .filter_map(|(time, y)| match parse_instant(time) {
                Some(x) => Some(Point { x, y }),
                None => {
                    debug!(time, "dropping row with unreadable timestamp");
                    None
                }
            })
            .collect();
        data.sort_by_key(|point| point.x);

        Self {
            id: id.into(),
            data,
        }
    }

    /// Sums points that fall into the same bucket.
    pub fn bucketed(self, granularity: Granularity) -> Self {
        let mut buckets: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
        for point in self.data {
            *buckets.entry(granularity.bucket_start(point.x)).or_default() += point.y;
        }

        Self {
            id: self.id,
            data: buckets.into_iter().map(|(x, y)| Point { x, y }).collect(),
        }
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`,
/// `YYYY-MM-DD HH:MM` and bare dates. Naive values are taken as UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|day| Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN)))
}

/// One grouped-bar row. `comparison` is always a number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRow {
    pub category: String,
    pub current: f64,
    pub comparison: f64,
}

/// One row per current-period category, ranked by current value (ties keep
/// API order) and cut to `top_k`. Categories missing from `previous`
/// compare against 0.
pub fn merge_categories<I>(
    current: I,
    previous: &BTreeMap<String, f64>,
    top_k: usize,
) -> Vec<CategoryRow>
where
    I: IntoIterator<Item = (String, f64)>,
{
    let mut ranked: Vec<(String, f64)> = current.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(top_k);

    ranked
        .into_iter()
        .map(|(category, current)| CategoryRow {
            comparison: previous
                .get(&category)
                .copied()
                .filter(|v| v.is_finite())
                .unwrap_or(0.0),
            category,
            current,
        })
        .collect()
}

/// Rows for a fixed label set, in label order; missing values are 0.
pub fn merge_fixed_buckets(
    labels: &[&str],
    current: &BTreeMap<String, f64>,
    previous: &BTreeMap<String, f64>,
) -> Vec<CategoryRow> {
    labels
        .iter()
        .map(|label| CategoryRow {
            category: (*label).to_string(),
            current: current.get(*label).copied().unwrap_or(0.0),
            comparison: previous.get(*label).copied().unwrap_or(0.0),
        })
        .collect()
}

/// Funnel conversion rate: `-` or an empty string marks the first step.
pub fn parse_rate(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return Some(FIRST_STEP_RATE);
    }
    parse_percentage(trimmed)
}

/// `"42.0%"` -> `42.0`. Anything that is not a finite number is `None`.
pub fn parse_percentage(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    number.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// `"1.Browse"` -> `"Browse"`. Labels without an ordinal prefix are unchanged.
pub fn strip_step_ordinal(label: &str) -> &str {
    let rest = label.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == label.len() {
        return label;
    }
    rest.strip_prefix('.').unwrap_or(label)
}

pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return None;
    }
    Some(numerator / denominator).filter(|value| value.is_finite())
}

/// Percentage change from `previous` to `current`.
pub fn change_rate(current: f64, previous: f64) -> Option<f64> {
    ratio(current - previous, previous).map(|r| r * 100.0)
}

pub fn percent_of_total(part: f64, total: f64) -> Option<f64> {
    ratio(part, total).map(|r| r * 100.0)
}

/// A delta computed upstream is only meaningful against a nonzero base.
/// A `null` delta stays undefined.
pub fn trusted_change(reported: Option<f64>, previous: f64) -> Option<f64> {
    reported
        .filter(|value| value.is_finite())
        .filter(|_| previous != 0.0 && previous.is_finite())
}

/// A headline figure with its comparison value and change badge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stat {
    pub current: f64,
    pub previous: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
}

impl Stat {
    /// Uses the change rate the API reported.
    pub fn reported(current: f64, previous: f64, change: Option<f64>) -> Self {
        Self {
            current,
            previous,
            change: trusted_change(change, previous),
        }
    }

    /// Computes the change rate locally.
    pub fn derived(current: f64, previous: f64) -> Self {
        Self {
            current,
            previous,
            change: change_rate(current, previous),
        }
    }
}

/// Seconds as `m:ss`.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
