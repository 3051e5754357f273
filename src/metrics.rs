use crate::range::DateRange;
use serde::Serialize;

/// Every upstream endpoint the dashboard reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Sales,
    ItemsSold,
    Categories,
    ActiveUsers,
    ActiveUsersByCountry,
    PageViews,
    Sessions,
    ConversionFunnel,
    SearchStats,
    SearchCount,
    SearchCountComparison,
    KeywordRanking,
    DeviceType,
    Registration,
    CategoryViews,
    CartQuantity,
    ConversionTrend,
    ProductConversion,
    ProductConversionComparison,
    Bestsellers,
}

/// Top-level layout of a metric's response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// `{current, previous, comparison}`
    Comparison,
    /// `{current, previous, summary}`, used by the items-sold endpoint.
    Summary,
    /// A single-period object with metric-specific keys.
    Plain(&'static [&'static str]),
}

impl Metric {
    pub fn path(self) -> &'static str {
        match self {
            Self::Sales => "/sales/comparison",
            Self::ItemsSold => "/sales/items-sold/comparison",
            Self::Categories => "/sales/categories/comparison",
            Self::ActiveUsers => "/traffic/active-users/comparison",
            Self::ActiveUsersByCountry => "/traffic/active-users/by-country/comparison",
            Self::PageViews => "/traffic/page-views/comparison",
            Self::Sessions => "/traffic/sessions/comparison",
            Self::ConversionFunnel => "/traffic/conversion-funnel/comparison",
            Self::SearchStats => "/traffic/search-stats/comparison",
            Self::SearchCount => "/search/count",
            Self::SearchCountComparison => "/search/count/comparison",
            Self::KeywordRanking => "/search/keywords/ranking",
            Self::DeviceType => "/traffic/device-type",
            Self::Registration => "/registration/comparison",
            Self::CategoryViews => "/product/category-view/comparison",
            Self::CartQuantity => "/product/cart/quantity/comparison",
            Self::ConversionTrend => "/product/conversion-trend/comparison",
            Self::ProductConversion => "/product/conversion-rate",
            Self::ProductConversionComparison => "/product/conversion-rate/comparison",
            Self::Bestsellers => "/product/bestsellers",
        }
    }

    pub fn envelope(self) -> EnvelopeKind {
        match self {
            Self::ItemsSold => EnvelopeKind::Summary,
            Self::SearchCount => EnvelopeKind::Plain(&["total_searches"]),
            Self::KeywordRanking => EnvelopeKind::Plain(&["keywords"]),
            Self::DeviceType => EnvelopeKind::Plain(&["ios", "android"]),
            Self::ProductConversion | Self::Bestsellers => {
                EnvelopeKind::Plain(&["data", "summary"])
            }
            Self::ProductConversionComparison => EnvelopeKind::Plain(&["comparison"]),
            _ => EnvelopeKind::Comparison,
        }
    }

    /// Keys that must be present before the body is decoded at all.
    pub fn required_keys(self) -> &'static [&'static str] {
        match self.envelope() {
            EnvelopeKind::Comparison => &["current", "previous", "comparison"],
            EnvelopeKind::Summary => &["current", "previous", "summary"],
            EnvelopeKind::Plain(keys) => keys,
        }
    }

    /// The registration endpoint filters on timestamps rather than days.
    pub fn uses_datetime(self) -> bool {
        matches!(self, Self::Registration)
    }
}

/// Ordering of the bestseller list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Quantity,
    Revenue,
    Orders,
}

impl SortBy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quantity => "quantity",
            Self::Revenue => "revenue",
            Self::Orders => "orders",
        }
    }
}

/// One upstream call: which metric, for which range, with an optional row
/// limit and ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricRequest {
    pub metric: Metric,
    pub range: DateRange,
    pub limit: Option<u32>,
    pub sort_by: Option<SortBy>,
}

impl MetricRequest {
    pub fn new(metric: Metric, range: DateRange) -> Self {
        Self {
            metric,
            range,
            limit: None,
            sort_by: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_sort(mut self, sort_by: Option<SortBy>) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        let (start, end) = if self.metric.uses_datetime() {
            (self.range.query_start_datetime(), self.range.query_end_datetime())
        } else {
            (self.range.query_start_date(), self.range.query_end_date())
        };

        let mut query = vec![("start_date", start), ("end_date", end)];
        if let Some(sort_by) = self.sort_by {
            query.push(("sort_by", sort_by.as_str().to_string()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn week() -> DateRange {
        DateRange::spanning(
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        )
    }

    #[test]
    fn query_uses_days_and_optional_limit() {
        let request = MetricRequest::new(Metric::Categories, week()).with_limit(Some(10));
        assert_eq!(
            request.query(),
            vec![
                ("start_date", "2024-03-09".to_string()),
                ("end_date", "2024-03-15".to_string()),
                ("limit", "10".to_string()),
            ]
        );
    }

    #[test]
    fn registration_query_uses_datetimes() {
        let request = MetricRequest::new(Metric::Registration, week());
        assert_eq!(
            request.query(),
            vec![
                ("start_date", "2024-03-09T00:00:00".to_string()),
                ("end_date", "2024-03-15T23:59:59".to_string()),
            ]
        );
    }

    #[test]
    fn required_keys_follow_envelope() {
        assert_eq!(
            Metric::Sales.required_keys(),
            &["current", "previous", "comparison"]
        );
        assert_eq!(
            Metric::ItemsSold.required_keys(),
            &["current", "previous", "summary"]
        );
        assert_eq!(Metric::DeviceType.required_keys(), &["ios", "android"]);
        assert_eq!(
            Metric::Bestsellers.required_keys(),
            &["data", "summary"]
        );
        assert_eq!(
            Metric::ProductConversionComparison.required_keys(),
            &["comparison"]
        );
    }

    #[test]
    fn bestseller_query_carries_sort_and_limit() {
        let request = MetricRequest::new(Metric::Bestsellers, week())
            .with_sort(Some(SortBy::Revenue))
            .with_limit(Some(20));
        assert_eq!(
            request.query(),
            vec![
                ("start_date", "2024-03-09".to_string()),
                ("end_date", "2024-03-15".to_string()),
                ("sort_by", "revenue".to_string()),
                ("limit", "20".to_string()),
            ]
        );
        assert_eq!(SortBy::default(), SortBy::Quantity);
    }
}
