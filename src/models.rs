//! Upstream response bodies. Top-level keys are validated before decoding;
//! inner fields fall back to their defaults when the API omits them.

use crate::metrics::Metric;
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use std::collections::BTreeMap;

/// Ties a decoded body to the endpoint that produces it.
pub trait Payload: DeserializeOwned + Send + 'static {
    const METRIC: Metric;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T, C> {
    pub current: T,
    pub previous: T,
    pub comparison: C,
}

/// Change figures as the API reports them for one scalar. `null` means
/// the change is undefined, usually because the previous value was zero.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChangeFigures {
    pub change_rate: Option<f64>,
    pub change_amount: Option<f64>,
}

/// Counts occasionally arrive as `5.0` or `null`; both are accepted.
fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite() && *v > 0.0)
        .map_or(0, |v| v.round() as u64))
}

fn rank<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    count(deserializer).map(|v| u32::try_from(v).unwrap_or(u32::MAX))
}

// Sales

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SalesTimeBucket {
    pub time: String,
    pub total_amount_cny: f64,
    #[serde(deserialize_with = "count")]
    pub orders_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CountryStats {
    #[serde(deserialize_with = "count")]
    pub count: u64,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SalesPeriod {
    #[serde(deserialize_with = "count")]
    pub orders_count: u64,
    pub ave_amount: f64,
    pub total_amount: f64,
    pub payment_stats: BTreeMap<String, f64>,
    pub amount_distribution: BTreeMap<String, f64>,
    pub time_aggregated_sales: Vec<SalesTimeBucket>,
    pub country_stats: BTreeMap<String, CountryStats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SalesChange {
    pub orders_count_change: Option<f64>,
    pub total_amount_change: Option<f64>,
    pub ave_amount_change: Option<f64>,
}

pub type SalesEnvelope = Envelope<SalesPeriod, SalesChange>;

impl Payload for SalesEnvelope {
    const METRIC: Metric = Metric::Sales;
}

// Items sold

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ItemsSoldDay {
    pub date: String,
    pub total_items_sold: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ItemsSoldSummary {
    pub current_total: f64,
    pub previous_total: f64,
    pub total_change_rate: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemsSoldEnvelope {
    pub current: Vec<ItemsSoldDay>,
    pub previous: Vec<ItemsSoldDay>,
    pub summary: ItemsSoldSummary,
}

impl Payload for ItemsSoldEnvelope {
    const METRIC: Metric = Metric::ItemsSold;
}

// Sales by category

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CategorySales {
    pub category_name: String,
    pub order_count: f64,
    pub item_count: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CategoriesPeriod {
    pub categories: Vec<CategorySales>,
    #[serde(deserialize_with = "count")]
    pub total_categories: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CategoriesChange {
    pub total_categories_change: Option<f64>,
}

pub type CategoriesEnvelope = Envelope<CategoriesPeriod, CategoriesChange>;

impl Payload for CategoriesEnvelope {
    const METRIC: Metric = Metric::Categories;
}

// Active users

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DailyActiveUsers {
    pub date: String,
    pub active_users: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ActiveUsersPeriod {
    pub active_users: f64,
    pub daily_data: Vec<DailyActiveUsers>,
}

pub type ActiveUsersEnvelope = Envelope<ActiveUsersPeriod, ChangeFigures>;

impl Payload for ActiveUsersEnvelope {
    const METRIC: Metric = Metric::ActiveUsers;
}

// Ranked comparisons (users by country, views by category)

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RankedChange {
    #[serde(alias = "country", alias = "category_name")]
    pub name: String,
    pub current_count: f64,
    pub previous_count: f64,
    pub change_count: Option<f64>,
    pub change_rate: Option<f64>,
    #[serde(deserialize_with = "rank")]
    pub rank: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CountryUsers {
    pub country: String,
    pub active_users: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CountryUsersPeriod {
    pub countries: Vec<CountryUsers>,
    pub total_users: f64,
}

pub type CountryUsersEnvelope = Envelope<CountryUsersPeriod, Vec<RankedChange>>;

impl Payload for CountryUsersEnvelope {
    const METRIC: Metric = Metric::ActiveUsersByCountry;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CategoryViewPeriod {
    pub total_views: f64,
}

pub type CategoryViewEnvelope = Envelope<CategoryViewPeriod, Vec<RankedChange>>;

impl Payload for CategoryViewEnvelope {
    const METRIC: Metric = Metric::CategoryViews;
}

// Page views

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageView {
    pub page_name: String,
    pub page_views: f64,
    pub percentage: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageViewsPeriod {
    pub pages: Vec<PageView>,
    pub total_page_views: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageViewsChange {
    pub total_change_rate: Option<f64>,
    pub total_change_amount: Option<f64>,
}

pub type PageViewsEnvelope = Envelope<PageViewsPeriod, PageViewsChange>;

impl Payload for PageViewsEnvelope {
    const METRIC: Metric = Metric::PageViews;
}

// Sessions

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionsPeriod {
    pub session_count: f64,
    pub avg_session_duration_seconds: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionsChange {
    pub session_count_change_rate: Option<f64>,
    pub session_count_change_amount: Option<f64>,
    pub duration_change_rate: Option<f64>,
    pub duration_change_amount: Option<f64>,
}

pub type SessionsEnvelope = Envelope<SessionsPeriod, SessionsChange>;

impl Payload for SessionsEnvelope {
    const METRIC: Metric = Metric::Sessions;
}

// Conversion funnel

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FunnelStep {
    pub step: String,
    pub users: f64,
    pub conversion_rate: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FunnelPeriod {
    pub funnel_steps: Vec<FunnelStep>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FunnelStepChange {
    pub step: String,
    pub change_rate: Option<f64>,
    pub change_amount: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FunnelChange {
    pub steps: Vec<FunnelStepChange>,
}

pub type FunnelEnvelope = Envelope<FunnelPeriod, FunnelChange>;

impl Payload for FunnelEnvelope {
    const METRIC: Metric = Metric::ConversionFunnel;
}

// Search

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchKeyword {
    pub keyword: String,
    pub search_count: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchStatsPeriod {
    pub total_search_events: f64,
    pub top_keywords: Vec<SearchKeyword>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchStatsChange {
    pub total_change_rate: Option<f64>,
    pub total_change_amount: Option<f64>,
}

pub type SearchStatsEnvelope = Envelope<SearchStatsPeriod, SearchStatsChange>;

impl Payload for SearchStatsEnvelope {
    const METRIC: Metric = Metric::SearchStats;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchCount {
    pub total_searches: f64,
    pub unique_users: f64,
}

impl Payload for SearchCount {
    const METRIC: Metric = Metric::SearchCount;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchCountChange {
    pub total_searches_change_rate: Option<f64>,
    pub unique_users_change_rate: Option<f64>,
}

pub type SearchCountEnvelope = Envelope<SearchCount, SearchCountChange>;

impl Payload for SearchCountEnvelope {
    const METRIC: Metric = Metric::SearchCountComparison;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RankedKeyword {
    #[serde(deserialize_with = "rank")]
    pub rank: u32,
    pub keyword: String,
    pub search_count: f64,
    pub unique_users: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeywordRanking {
    pub keywords: Vec<RankedKeyword>,
}

impl Payload for KeywordRanking {
    const METRIC: Metric = Metric::KeywordRanking;
}

// Devices

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeviceSplit {
    pub total: f64,
    pub ios: f64,
    pub android: f64,
    pub ios_percentage: String,
    pub android_percentage: String,
}

impl Payload for DeviceSplit {
    const METRIC: Metric = Metric::DeviceType;
}

// Registrations

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationPeriod {
    pub total_registrations: f64,
}

pub type RegistrationEnvelope = Envelope<RegistrationPeriod, ChangeFigures>;

impl Payload for RegistrationEnvelope {
    const METRIC: Metric = Metric::Registration;
}

// Add-to-cart

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CartPeriod {
    pub total_unique_users: f64,
    pub total_cart_events: f64,
    pub total_quantity: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CartFigure {
    pub current: f64,
    pub previous: f64,
    pub change: Option<f64>,
    pub change_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CartChange {
    pub unique_users: CartFigure,
    pub cart_events: CartFigure,
    pub total_quantity: CartFigure,
}

pub type CartQuantityEnvelope = Envelope<CartPeriod, CartChange>;

impl Payload for CartQuantityEnvelope {
    const METRIC: Metric = Metric::CartQuantity;
}

// Conversion trend

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConversionDay {
    pub date: String,
    pub viewed_users: f64,
    pub purchased_users: f64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConversionTrendSummary {
    pub avg_conversion_rate: f64,
    pub total_viewed_users: f64,
    pub total_purchased_users: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConversionTrendPeriod {
    pub daily_data: Vec<ConversionDay>,
    pub summary: ConversionTrendSummary,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConversionTrendChange {
    pub avg_conversion_rate_change: Option<f64>,
    pub avg_conversion_rate_change_rate: Option<f64>,
}

pub type ConversionTrendEnvelope = Envelope<ConversionTrendPeriod, ConversionTrendChange>;

impl Payload for ConversionTrendEnvelope {
    const METRIC: Metric = Metric::ConversionTrend;
}

// Per-product conversion

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductConversionRow {
    #[serde(deserialize_with = "rank")]
    pub rank: u32,
    pub product_id: String,
    pub product_name: String,
    pub viewed_users: f64,
    pub purchased_users: f64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductConversionSummary {
    #[serde(deserialize_with = "count")]
    pub total_products: u64,
    pub avg_conversion_rate: f64,
    pub total_viewed_users: f64,
    pub total_purchased_users: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductConversion {
    pub data: Vec<ProductConversionRow>,
    pub summary: ProductConversionSummary,
}

impl Payload for ProductConversion {
    const METRIC: Metric = Metric::ProductConversion;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductConversionChange {
    pub product_id: String,
    pub product_name: String,
    pub sku_image: String,
    pub current_conversion_rate: f64,
    pub previous_conversion_rate: f64,
    pub rate_change: Option<f64>,
    pub current_viewed_users: f64,
    pub previous_viewed_users: f64,
    pub current_purchased_users: f64,
    pub previous_purchased_users: f64,
    #[serde(deserialize_with = "rank")]
    pub rank: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductConversionComparison {
    pub comparison: Vec<ProductConversionChange>,
}

impl Payload for ProductConversionComparison {
    const METRIC: Metric = Metric::ProductConversionComparison;
}

// Bestsellers

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Bestseller {
    #[serde(deserialize_with = "rank")]
    pub rank: u32,
    pub offer_id: String,
    pub product_name: String,
    pub category_name: String,
    pub product_image: String,
    pub total_quantity: f64,
    pub total_revenue_cny: f64,
    pub total_revenue_original: f64,
    pub original_currency: String,
    #[serde(deserialize_with = "count")]
    pub order_count: u64,
    pub avg_unit_price_cny: f64,
    pub price_range_cny: PriceRange,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BestsellersSummary {
    pub sort_by: String,
    #[serde(deserialize_with = "count")]
    pub total_products: u64,
    pub total_quantity_sold: f64,
    pub total_revenue_cny: f64,
    #[serde(deserialize_with = "count")]
    pub total_orders: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Bestsellers {
    pub data: Vec<Bestseller>,
    pub summary: BestsellersSummary,
}

impl Payload for Bestsellers {
    const METRIC: Metric = Metric::Bestsellers;
}
