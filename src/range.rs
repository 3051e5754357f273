use crate::errors::RangeError;
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Preset ranges offered by the range picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RangeToken {
    #[serde(rename = "today")]
    Today,
    #[serde(rename = "yesterday")]
    Yesterday,
    #[serde(rename = "last_7_days")]
    Last7Days,
    #[serde(rename = "last_30_days")]
    Last30Days,
    #[serde(rename = "last_6_months")]
    Last6Months,
}

impl RangeToken {
    pub const ALL: [RangeToken; 5] = [
        Self::Today,
        Self::Yesterday,
        Self::Last7Days,
        Self::Last30Days,
        Self::Last6Months,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::Last7Days => "last_7_days",
            Self::Last30Days => "last_30_days",
            Self::Last6Months => "last_6_months",
        }
    }
}

impl fmt::Display for RangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RangeToken {
    type Err = RangeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|token| token.as_str() == value)
            .ok_or_else(|| RangeError::UnknownToken(value.to_string()))
    }
}

/// Whole UTC days: `from` is 00:00:00 of the first day, `to` is 23:59:59 of the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    pub fn spanning(first: NaiveDate, last: NaiveDate) -> Self {
        let (first, last) = if first <= last { (first, last) } else { (last, first) };
        Self {
            from: start_of_day(first),
            to: end_of_day(last),
        }
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self::spanning(day, day)
    }

    pub fn start_day(&self) -> NaiveDate {
        self.from.date_naive()
    }

    pub fn end_day(&self) -> NaiveDate {
        self.to.date_naive()
    }

    /// Inclusive number of calendar days covered.
    pub fn span_days(&self) -> i64 {
        (self.end_day() - self.start_day()).num_days() + 1
    }

    pub fn is_single_day(&self) -> bool {
        self.start_day() == self.end_day()
    }

    /// The equally long range ending the day before this one starts.
    pub fn comparison(&self) -> DateRange {
        let start = self.start_day();
        if self.is_single_day() {
            return Self::single_day(start - Duration::days(1));
        }

        let to = start - Duration::days(1);
        let from = to - Duration::days(self.span_days() - 1);
        Self::spanning(from, to)
    }

    pub fn query_start_date(&self) -> String {
        date_key(self.start_day())
    }

    pub fn query_end_date(&self) -> String {
        date_key(self.end_day())
    }

    pub fn query_start_datetime(&self) -> String {
        self.from.format("%Y-%m-%dT%H:%M:%S").to_string()
    }

    pub fn query_end_datetime(&self) -> String {
        self.to.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

/// What the user picked: a preset or two calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RangeSelection {
    Token { range: RangeToken },
    Explicit { from: NaiveDate, to: NaiveDate },
}

/// Raw selection as it arrives in a query string or JSON body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectionParams {
    pub range: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl SelectionParams {
    /// Explicit days win over a preset; nothing at all means `today`.
    pub fn into_selection(self) -> Result<RangeSelection, RangeError> {
        match (self.from, self.to) {
            (Some(from), Some(to)) => Ok(RangeSelection::Explicit { from, to }),
            (Some(_), None) | (None, Some(_)) => Err(RangeError::Incomplete),
            (None, None) => {
                let range = match self.range.as_deref() {
                    Some(token) => token.parse()?,
                    None => RangeToken::Today,
                };
                Ok(RangeSelection::Token { range })
            }
        }
    }
}

pub fn resolve(token: RangeToken, now: DateTime<Utc>) -> DateRange {
    let today = now.date_naive();
    match token {
        RangeToken::Today => DateRange::single_day(today),
        RangeToken::Yesterday => DateRange::single_day(today - Duration::days(1)),
        RangeToken::Last7Days => DateRange::spanning(today - Duration::days(6), today),
        RangeToken::Last30Days => DateRange::spanning(today - Duration::days(29), today),
        RangeToken::Last6Months => DateRange::spanning(six_months_start(today), today),
    }
}

/// Validates a calendar pick. A `to` past today is clamped to today.
pub fn resolve_explicit(
    from: NaiveDate,
    to: NaiveDate,
    now: DateTime<Utc>,
) -> Result<DateRange, RangeError> {
    if from > to {
        return Err(RangeError::Inverted { from, to });
    }

    let today = now.date_naive();
    if from > today {
        return Err(RangeError::FutureStart(from));
    }

    Ok(DateRange::spanning(from, to.min(today)))
}

pub fn resolve_selection(
    selection: RangeSelection,
    now: DateTime<Utc>,
) -> Result<DateRange, RangeError> {
    match selection {
        RangeSelection::Token { range } => Ok(resolve(range, now)),
        RangeSelection::Explicit { from, to } => resolve_explicit(from, to, now),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hourly,
    Daily,
    Monthly,
}

impl Granularity {
    pub fn for_range(range: &DateRange) -> Self {
        match range.span_days() {
            i64::MIN..=1 => Self::Hourly,
            2..=31 => Self::Daily,
            _ => Self::Monthly,
        }
    }

    pub fn tick_label(self, at: DateTime<Utc>) -> String {
        match self {
            Self::Hourly => at.format("%H:00").to_string(),
            Self::Daily => at.format("%m/%d").to_string(),
            Self::Monthly => at.format("%Y-%m").to_string(),
        }
    }

    pub fn bucket_start(self, at: DateTime<Utc>) -> DateTime<Utc> {
        let day = at.date_naive();
        match self {
            Self::Hourly => start_of_day(day) + Duration::hours(i64::from(at.hour())),
            Self::Daily => start_of_day(day),
            Self::Monthly => start_of_day(day.with_day(1).unwrap_or(day)),
        }
    }
}

/// Everything a view needs to caption a range and its comparison.
#[derive(Debug, Clone, Serialize)]
pub struct RangeInfo {
    pub current: DateRange,
    pub comparison: DateRange,
    pub span_days: i64,
    pub granularity: Granularity,
    pub label: String,
    pub comparison_label: String,
}

impl RangeInfo {
    pub fn new(range: DateRange, today: NaiveDate) -> Self {
        Self {
            current: range,
            comparison: range.comparison(),
            span_days: range.span_days(),
            granularity: Granularity::for_range(&range),
            label: range_label(&range, today),
            comparison_label: comparison_label(&range),
        }
    }
}

pub fn range_label(range: &DateRange, today: NaiveDate) -> String {
    if range.is_single_day() {
        let day = range.start_day();
        if day == today {
            return "Today".to_string();
        }
        if day == today - Duration::days(1) {
            return "Yesterday".to_string();
        }
        return short_date(day);
    }

    format!("{} - {}", short_date(range.start_day()), short_date(range.end_day()))
}

pub fn comparison_label(range: &DateRange) -> String {
    let comparison = range.comparison();
    if range.is_single_day() {
        return format!("Previous day ({})", short_date(comparison.start_day()));
    }

    format!(
        "{} - {}",
        short_date(comparison.start_day()),
        short_date(comparison.end_day())
    )
}

fn six_months_start(today: NaiveDate) -> NaiveDate {
    let first = today.with_day(1).unwrap_or(today);
    first.checked_sub_months(Months::new(5)).unwrap_or(first)
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    start_of_day(day) + Duration::seconds(86_399)
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn short_date(date: NaiveDate) -> String {
    format!("{}/{}", date.month(), date.day())
}
