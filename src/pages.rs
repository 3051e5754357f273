//! Dashboard pages as catalogs of sections, and the one pipeline that loads them.

use crate::errors::FetchError;
use crate::fetch::Fetcher;
use crate::metrics::{Metric, MetricRequest, SortBy};
use crate::models::Payload;
use crate::range::{DateRange, RangeInfo};
use crate::transform;
use chrono::NaiveDate;
use futures_util::future::{BoxFuture, FutureExt, join, join_all};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Overview,
    Sales,
    Traffic,
    Conversion,
    Products,
    Search,
}

impl Page {
    pub const ALL: [Page; 6] = [
        Page::Overview,
        Page::Sales,
        Page::Traffic,
        Page::Conversion,
        Page::Products,
        Page::Search,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Sales => "sales",
            Self::Traffic => "traffic",
            Self::Conversion => "conversion",
            Self::Products => "products",
            Self::Search => "search",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|page| page.as_str() == slug)
    }

    pub fn sections(self) -> Vec<Section> {
        let top = Some(transform::TOP_CATEGORIES as u32);
        let top_pages = Some(transform::TOP_PAGES as u32);
        let top_products = Some(transform::TOP_PRODUCTS as u32);

        match self {
            Self::Overview => vec![
                Section::new("sales", transform::sales).primary(),
                Section::new("active_users", transform::active_users),
                Section::new("registrations", transform::registrations),
                Section::new("search_stats", transform::search_stats),
                Section::new("page_views", transform::page_views).limit(top_pages),
                Section::new("funnel", transform::funnel),
                Section::new("sessions", transform::sessions),
            ],
            Self::Sales => vec![
                Section::new("sales", transform::sales).primary(),
                Section::new("items_sold", transform::items_sold),
                Section::new("categories", transform::categories).limit(top),
            ],
            Self::Traffic => vec![
                Section::new("active_users", transform::active_users).primary(),
                Section::new("page_views", transform::page_views).limit(top_pages),
                Section::new("devices", transform::devices),
                Section::new("users_by_country", transform::users_by_country).limit(top),
                Section::new("sessions", transform::sessions),
            ],
            Self::Conversion => vec![
                Section::new("funnel", transform::funnel).primary(),
                Section::new("conversion_trend", transform::conversion_trend),
                Section::with_comparison("product_conversion", transform::product_conversion)
                    .limit(top_products),
            ],
            Self::Products => vec![
                Section::new("items_sold", transform::items_sold).primary(),
                Section::new("categories", transform::categories).limit(top),
                Section::new("category_views", transform::category_views).limit(top),
                Section::new("cart", transform::cart_quantity),
                Section::new("bestsellers", transform::bestsellers)
                    .limit(Some(transform::BESTSELLER_ROWS as u32))
                    .sort_by(SortBy::Quantity),
            ],
            Self::Search => vec![
                Section::new("search_stats", transform::search_stats).primary(),
                Section::new("search_count", transform::search_count),
                Section::new("search_count_comparison", transform::search_count_comparison),
                Section::new("keywords", transform::keyword_ranking).limit(top),
            ],
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Runner = dyn Fn(Fetcher, MetricRequest) -> BoxFuture<'static, Result<Value, FetchError>>
    + Send
    + Sync;

/// One chart or card on a page: a metric, its request options and its transform.
#[derive(Clone)]
pub struct Section {
    pub key: &'static str,
    pub metric: Metric,
    pub limit: Option<u32>,
    pub sort_by: Option<SortBy>,
    pub primary: bool,
    run: Arc<Runner>,
}

impl Section {
    pub fn new<P, O, F>(key: &'static str, transform: F) -> Self
    where
        P: Payload,
        O: Serialize,
        F: Fn(P, &DateRange) -> O + Send + Sync + 'static,
    {
        let transform = Arc::new(transform);
        let run = move |fetcher: Fetcher, request: MetricRequest| {
            let transform = Arc::clone(&transform);
            async move {
                let payload = fetcher.fetch::<P>(&request).await?;
                let view = (*transform)(payload, &request.range);
                serde_json::to_value(view).map_err(|err| FetchError::Shape(err.to_string()))
            }
            .boxed()
        };

        Self::from_runner(key, P::METRIC, Arc::new(run))
    }

    /// Like `new`, but also fetches `Q` for the same request. The section
    /// still renders when only the comparison fails.
    pub fn with_comparison<P, Q, O, F>(key: &'static str, transform: F) -> Self
    where
        P: Payload,
        Q: Payload,
        O: Serialize,
        F: Fn(P, Option<Q>, &DateRange) -> O + Send + Sync + 'static,
    {
        let transform = Arc::new(transform);
        let run = move |fetcher: Fetcher, request: MetricRequest| {
            let transform = Arc::clone(&transform);
            async move {
                let companion = MetricRequest {
                    metric: Q::METRIC,
                    ..request
                };
                let (payload, comparison) =
                    join(fetcher.fetch::<P>(&request), fetcher.fetch::<Q>(&companion)).await;
                let comparison = match comparison {
                    Ok(comparison) => Some(comparison),
                    Err(err) => {
                        warn!(metric = ?Q::METRIC, "comparison unavailable: {err}");
                        None
                    }
                };
                let view = (*transform)(payload?, comparison, &request.range);
                serde_json::to_value(view).map_err(|err| FetchError::Shape(err.to_string()))
            }
            .boxed()
        };

        Self::from_runner(key, P::METRIC, Arc::new(run))
    }

    fn from_runner(key: &'static str, metric: Metric, run: Arc<Runner>) -> Self {
        Self {
            key,
            metric,
            limit: None,
            sort_by: None,
            primary: false,
            run,
        }
    }

    pub fn limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    pub fn sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = Some(sort_by);
        self
    }

    /// A failure of the primary section raises the page banner.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn request(&self, range: DateRange) -> MetricRequest {
        MetricRequest::new(self.metric, range)
            .with_limit(self.limit)
            .with_sort(self.sort_by)
    }

    pub fn run(
        &self,
        fetcher: &Fetcher,
        range: DateRange,
    ) -> BoxFuture<'static, Result<Value, FetchError>> {
        (*self.run)(fetcher.clone(), self.request(range))
    }
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Section")
            .field("key", &self.key)
            .field("metric", &self.metric)
            .field("limit", &self.limit)
            .field("sort_by", &self.sort_by)
            .field("primary", &self.primary)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SectionState {
    Loading,
    Ready { data: Value },
    NoData { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    pub page: Page,
    pub range: RangeInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    pub sections: BTreeMap<&'static str, SectionState>,
}

/// Fetches every section of `page` concurrently. Failures never abort the
/// page: each one becomes `no_data`, and a primary failure sets the banner.
pub async fn load_page(
    fetcher: &Fetcher,
    page: Page,
    range: DateRange,
    today: NaiveDate,
) -> PageReport {
    let sections = page.sections();
    let pending: Vec<_> = sections
        .iter()
        .map(|section| section.run(fetcher, range))
        .collect();
    let results = join_all(pending).await;

    let mut banner = None;
    let mut states = BTreeMap::new();
    for (section, result) in sections.iter().zip(results) {
        let state = match result {
            Ok(data) => SectionState::Ready { data },
            Err(err) => {
                warn!(
                    %page,
                    section = section.key,
                    metric = ?section.metric,
                    "section failed: {err}"
                );
                if section.primary {
                    banner = Some(err.banner().to_string());
                }
                SectionState::NoData {
                    reason: err.to_string(),
                }
            }
        };
        states.insert(section.key, state);
    }

    info!(%page, from = %range.start_day(), to = %range.end_day(), "page loaded");
    PageReport {
        page,
        range: RangeInfo::new(range, today),
        banner,
        sections: states,
    }
}
