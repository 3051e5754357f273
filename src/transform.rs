//! Per-metric reshaping of upstream payloads into chart-ready views.

use crate::models::{
    ActiveUsersEnvelope, Bestsellers, CartQuantityEnvelope, CategoriesEnvelope,
    CategoryViewEnvelope, ConversionTrendEnvelope, CountryUsersEnvelope, DeviceSplit,
    FunnelEnvelope, FunnelStep, ItemsSoldEnvelope, KeywordRanking, PageViewsEnvelope,
    ProductConversion, ProductConversionComparison, RankedChange, RegistrationEnvelope,
    SalesEnvelope, SearchCount, SearchCountEnvelope, SearchStatsEnvelope, SessionsEnvelope,
};
use crate::range::{DateRange, Granularity};
use crate::series::{
    CategoryRow, Series, Stat, format_duration, merge_categories, merge_fixed_buckets,
    parse_percentage, parse_rate, percent_of_total, ratio, strip_step_ordinal, trusted_change,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

pub const TOP_CATEGORIES: usize = 10;
pub const TOP_PAGES: usize = 5;
pub const FUNNEL_STEPS: usize = 4;
pub const TOP_PRODUCTS: usize = 10;
pub const BESTSELLER_ROWS: usize = 20;

const AMOUNT_BUCKETS: [&str; 4] = ["0-100", "100-500", "500-1000", "1000+"];
const UNKNOWN_COUNTRY_KEY: &str = "0";

#[derive(Debug, Clone, Serialize)]
pub struct SalesView {
    pub revenue: Stat,
    pub orders: Stat,
    pub average_order: Stat,
    pub revenue_trend: Vec<Series>,
    pub revenue_by_country: Vec<CategoryRow>,
    pub order_value_distribution: Vec<CategoryRow>,
    pub payment_methods: Vec<CategoryRow>,
}

pub fn sales(payload: SalesEnvelope, range: &DateRange) -> SalesView {
    let SalesEnvelope {
        current,
        previous,
        comparison,
    } = payload;

    let trend = Series::from_rows(
        "current",
        current
            .time_aggregated_sales
            .iter()
            .map(|bucket| (bucket.time.as_str(), bucket.total_amount_cny)),
    )
    .bucketed(Granularity::for_range(range));

    let previous_by_country: BTreeMap<String, f64> = previous
        .country_stats
        .iter()
        .map(|(country, stats)| (country.clone(), stats.amount))
        .collect();
    let mut revenue_by_country = merge_categories(
        current
            .country_stats
            .iter()
            .map(|(country, stats)| (country.clone(), stats.amount)),
        &previous_by_country,
        TOP_CATEGORIES,
    );
    for row in &mut revenue_by_country {
        if row.category == UNKNOWN_COUNTRY_KEY {
            row.category = "Unknown".to_string();
        }
    }

    SalesView {
        revenue: Stat::reported(
            current.total_amount,
            previous.total_amount,
            comparison.total_amount_change,
        ),
        orders: Stat::reported(
            current.orders_count as f64,
            previous.orders_count as f64,
            comparison.orders_count_change,
        ),
        average_order: Stat::reported(
            current.ave_amount,
            previous.ave_amount,
            comparison.ave_amount_change,
        ),
        revenue_trend: vec![trend],
        revenue_by_country,
        order_value_distribution: merge_fixed_buckets(
            &AMOUNT_BUCKETS,
            &current.amount_distribution,
            &previous.amount_distribution,
        ),
        payment_methods: merge_categories(
            current.payment_stats,
            &previous.payment_stats,
            TOP_CATEGORIES,
        ),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemsSoldView {
    pub total: Stat,
    pub trend: Vec<Series>,
}

pub fn items_sold(payload: ItemsSoldEnvelope, _range: &DateRange) -> ItemsSoldView {
    let summary = payload.summary;
    ItemsSoldView {
        total: Stat::reported(
            summary.current_total,
            summary.previous_total,
            summary.total_change_rate,
        ),
        trend: vec![
            Series::from_rows(
                "current",
                payload
                    .current
                    .iter()
                    .map(|day| (day.date.as_str(), day.total_items_sold)),
            ),
            Series::from_rows(
                "previous",
                payload
                    .previous
                    .iter()
                    .map(|day| (day.date.as_str(), day.total_items_sold)),
            ),
        ],
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoriesView {
    pub total_categories: Stat,
    pub items: Vec<CategoryRow>,
    pub orders: Vec<CategoryRow>,
}

pub fn categories(payload: CategoriesEnvelope, _range: &DateRange) -> CategoriesView {
    let current = &payload.current.categories;
    let previous = &payload.previous.categories;

    let previous_items = previous
        .iter()
        .map(|c| (c.category_name.clone(), c.item_count))
        .collect();
    let previous_orders = previous
        .iter()
        .map(|c| (c.category_name.clone(), c.order_count))
        .collect();

    CategoriesView {
        total_categories: Stat::reported(
            payload.current.total_categories as f64,
            payload.previous.total_categories as f64,
            payload.comparison.total_categories_change,
        ),
        items: merge_categories(
            current.iter().map(|c| (c.category_name.clone(), c.item_count)),
            &previous_items,
            TOP_CATEGORIES,
        ),
        orders: merge_categories(
            current.iter().map(|c| (c.category_name.clone(), c.order_count)),
            &previous_orders,
            TOP_CATEGORIES,
        ),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveUsersView {
    pub total: Stat,
    pub daily: Vec<Series>,
}

pub fn active_users(payload: ActiveUsersEnvelope, _range: &DateRange) -> ActiveUsersView {
    let series = |id: &str, period: &crate::models::ActiveUsersPeriod| {
        Series::from_rows(
            id,
            period
                .daily_data
                .iter()
                .map(|day| (day.date.as_str(), day.active_users)),
        )
    };

    ActiveUsersView {
        total: Stat::reported(
            payload.current.active_users,
            payload.previous.active_users,
            payload.comparison.change_rate,
        ),
        daily: vec![
            series("current", &payload.current),
            series("previous", &payload.previous),
        ],
    }
}

/// A ranked row with the upstream change badge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRow {
    #[serde(flatten)]
    pub row: CategoryRow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
}

fn ranked_rows(mut ranked: Vec<RankedChange>, top_k: usize) -> Vec<RankedRow> {
    ranked.sort_by_key(|item| item.rank);
    ranked.truncate(top_k);
    ranked
        .into_iter()
        .map(|item| RankedRow {
            change: trusted_change(item.change_rate, item.previous_count),
            row: CategoryRow {
                category: item.name,
                current: item.current_count,
                comparison: item.previous_count,
            },
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct CountryUsersView {
    pub total: Stat,
    pub countries: Vec<RankedRow>,
}

/// Uses the upstream ranking when present, otherwise merges the two periods.
pub fn users_by_country(payload: CountryUsersEnvelope, _range: &DateRange) -> CountryUsersView {
    let countries = if payload.comparison.is_empty() {
        let previous = payload
            .previous
            .countries
            .iter()
            .map(|c| (c.country.clone(), c.active_users))
            .collect();
        merge_categories(
            payload
                .current
                .countries
                .iter()
                .map(|c| (c.country.clone(), c.active_users)),
            &previous,
            TOP_CATEGORIES,
        )
        .into_iter()
        .map(|row| RankedRow {
            change: crate::series::change_rate(row.current, row.comparison),
            row,
        })
        .collect()
    } else {
        ranked_rows(payload.comparison, TOP_CATEGORIES)
    };

    CountryUsersView {
        total: Stat::derived(payload.current.total_users, payload.previous.total_users),
        countries,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryViewsView {
    pub total: Stat,
    pub categories: Vec<RankedRow>,
}

pub fn category_views(payload: CategoryViewEnvelope, _range: &DateRange) -> CategoryViewsView {
    CategoryViewsView {
        total: Stat::derived(payload.current.total_views, payload.previous.total_views),
        categories: ranked_rows(payload.comparison, TOP_CATEGORIES),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Share {
    pub name: String,
    pub count: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageViewsView {
    pub total: Stat,
    pub pages: Vec<CategoryRow>,
    pub shares: Vec<Share>,
}

pub fn page_views(payload: PageViewsEnvelope, _range: &DateRange) -> PageViewsView {
    let current = &payload.current;
    let previous = payload
        .previous
        .pages
        .iter()
        .map(|p| (p.page_name.clone(), p.page_views))
        .collect();

    let shares = current
        .pages
        .iter()
        .take(TOP_PAGES)
        .map(|page| Share {
            name: page.page_name.clone(),
            count: page.page_views,
            percentage: parse_percentage(&page.percentage)
                .or_else(|| percent_of_total(page.page_views, current.total_page_views)),
        })
        .collect();

    PageViewsView {
        total: Stat::reported(
            current.total_page_views,
            payload.previous.total_page_views,
            payload.comparison.total_change_rate,
        ),
        pages: merge_categories(
            current.pages.iter().map(|p| (p.page_name.clone(), p.page_views)),
            &previous,
            TOP_PAGES,
        ),
        shares,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionsView {
    pub sessions: Stat,
    pub avg_duration_seconds: Stat,
    pub avg_duration_label: String,
}

pub fn sessions(payload: SessionsEnvelope, _range: &DateRange) -> SessionsView {
    let current = &payload.current;
    let previous = &payload.previous;
    SessionsView {
        sessions: Stat::reported(
            current.session_count,
            previous.session_count,
            payload.comparison.session_count_change_rate,
        ),
        avg_duration_seconds: Stat::reported(
            current.avg_session_duration_seconds,
            previous.avg_session_duration_seconds,
            payload.comparison.duration_change_rate,
        ),
        avg_duration_label: format_duration(current.avg_session_duration_seconds),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelPoint {
    pub id: String,
    pub value: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelCard {
    pub title: String,
    pub rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunnelView {
    pub points: Vec<FunnelPoint>,
    pub cards: Vec<FunnelCard>,
    /// Rate of the last step; absent when there is only one step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_rate: Option<f64>,
}

/// Funnel chart input. Steps with an unreadable rate are left out.
pub fn funnel_points(steps: &[FunnelStep]) -> Vec<FunnelPoint> {
    steps
        .iter()
        .take(FUNNEL_STEPS)
        .filter_map(|step| {
            let Some(value) = parse_rate(&step.conversion_rate) else {
                debug!(step = %step.step, rate = %step.conversion_rate, "skipping funnel step");
                return None;
            };
            Some(FunnelPoint {
                id: strip_step_ordinal(&step.step).to_string(),
                value,
                label: format!("{value}%"),
            })
        })
        .collect()
}

pub fn funnel(payload: FunnelEnvelope, _range: &DateRange) -> FunnelView {
    let steps = &payload.current.funnel_steps;
    let previous = &payload.previous.funnel_steps;

    let cards = steps
        .iter()
        .take(FUNNEL_STEPS)
        .filter_map(|step| {
            let rate = parse_rate(&step.conversion_rate)?;
            let previous_users = previous
                .iter()
                .find(|p| p.step == step.step)
                .map_or(0.0, |p| p.users);
            let change = payload
                .comparison
                .steps
                .iter()
                .find(|c| c.step == step.step)
                .and_then(|c| trusted_change(c.change_rate, previous_users));
            Some(FunnelCard {
                title: strip_step_ordinal(&step.step).to_string(),
                rate,
                change,
            })
        })
        .collect();

    let overall_rate = match steps.as_slice() {
        [_, .., last] => parse_rate(&last.conversion_rate),
        _ => None,
    };

    FunnelView {
        points: funnel_points(steps),
        cards,
        overall_rate,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchStatsView {
    pub total: Stat,
    pub keywords: Vec<CategoryRow>,
}

pub fn search_stats(payload: SearchStatsEnvelope, _range: &DateRange) -> SearchStatsView {
    let previous = payload
        .previous
        .top_keywords
        .iter()
        .map(|k| (k.keyword.clone(), k.search_count))
        .collect();

    SearchStatsView {
        total: Stat::reported(
            payload.current.total_search_events,
            payload.previous.total_search_events,
            payload.comparison.total_change_rate,
        ),
        keywords: merge_categories(
            payload
                .current
                .top_keywords
                .iter()
                .map(|k| (k.keyword.clone(), k.search_count)),
            &previous,
            TOP_CATEGORIES,
        ),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchCountView {
    pub total_searches: f64,
    pub unique_users: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searches_per_user: Option<f64>,
}

pub fn search_count(payload: SearchCount, _range: &DateRange) -> SearchCountView {
    SearchCountView {
        searches_per_user: ratio(payload.total_searches, payload.unique_users),
        total_searches: payload.total_searches,
        unique_users: payload.unique_users,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchCountComparisonView {
    pub searches: Stat,
    pub unique_users: Stat,
}

pub fn search_count_comparison(
    payload: SearchCountEnvelope,
    _range: &DateRange,
) -> SearchCountComparisonView {
    SearchCountComparisonView {
        searches: Stat::reported(
            payload.current.total_searches,
            payload.previous.total_searches,
            payload.comparison.total_searches_change_rate,
        ),
        unique_users: Stat::reported(
            payload.current.unique_users,
            payload.previous.unique_users,
            payload.comparison.unique_users_change_rate,
        ),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KeywordRow {
    pub rank: u32,
    pub keyword: String,
    pub search_count: f64,
    pub unique_users: f64,
}

pub fn keyword_ranking(payload: KeywordRanking, _range: &DateRange) -> Vec<KeywordRow> {
    let mut keywords = payload.keywords;
    keywords.sort_by_key(|k| k.rank);
    keywords
        .into_iter()
        .take(TOP_CATEGORIES)
        .map(|k| KeywordRow {
            rank: k.rank,
            keyword: k.keyword,
            search_count: k.search_count,
            unique_users: k.unique_users,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceView {
    pub total: f64,
    pub slices: Vec<Share>,
}

pub fn devices(payload: DeviceSplit, _range: &DateRange) -> DeviceView {
    let total = if payload.total > 0.0 {
        payload.total
    } else {
        payload.ios + payload.android
    };
    let slice = |name: &str, count: f64, percentage: &str| Share {
        name: name.to_string(),
        count,
        percentage: parse_percentage(percentage).or_else(|| percent_of_total(count, total)),
    };

    DeviceView {
        total,
        slices: vec![
            slice("iOS", payload.ios, &payload.ios_percentage),
            slice("Android", payload.android, &payload.android_percentage),
        ],
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationView {
    pub total: Stat,
}

pub fn registrations(payload: RegistrationEnvelope, _range: &DateRange) -> RegistrationView {
    RegistrationView {
        total: Stat::reported(
            payload.current.total_registrations,
            payload.previous.total_registrations,
            payload.comparison.change_rate,
        ),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub quantity: Stat,
    pub events: Stat,
    pub users: Stat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity_per_user: Option<f64>,
}

pub fn cart_quantity(payload: CartQuantityEnvelope, _range: &DateRange) -> CartView {
    let current = &payload.current;
    let previous = &payload.previous;
    let change = &payload.comparison;
    CartView {
        quantity: Stat::reported(
            current.total_quantity,
            previous.total_quantity,
            change.total_quantity.change_rate,
        ),
        events: Stat::reported(
            current.total_cart_events,
            previous.total_cart_events,
            change.cart_events.change_rate,
        ),
        users: Stat::reported(
            current.total_unique_users,
            previous.total_unique_users,
            change.unique_users.change_rate,
        ),
        quantity_per_user: ratio(current.total_quantity, current.total_unique_users),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionTrendView {
    pub average_rate: Stat,
    pub trend: Vec<Series>,
}

pub fn conversion_trend(
    payload: ConversionTrendEnvelope,
    _range: &DateRange,
) -> ConversionTrendView {
    let series = |id: &str, period: &crate::models::ConversionTrendPeriod| {
        Series::from_rows(
            id,
            period
                .daily_data
                .iter()
                .map(|day| (day.date.as_str(), day.conversion_rate)),
        )
    };

    ConversionTrendView {
        average_rate: Stat::reported(
            payload.current.summary.avg_conversion_rate,
            payload.previous.summary.avg_conversion_rate,
            payload.comparison.avg_conversion_rate_change_rate,
        ),
        trend: vec![
            series("current", &payload.current),
            series("previous", &payload.previous),
        ],
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductConversionRow {
    pub rank: u32,
    pub product_id: String,
    pub product_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub viewed_users: f64,
    pub purchased_users: f64,
    pub conversion_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductConversionView {
    pub total_products: u64,
    pub average_rate: f64,
    pub viewed_users: f64,
    pub purchased_users: f64,
    pub products: Vec<ProductConversionRow>,
}

/// Per-product conversion table. Rows are matched to the comparison by
/// product id; a product without a match, or without previous viewers,
/// carries no previous rate or change.
pub fn product_conversion(
    payload: ProductConversion,
    comparison: Option<ProductConversionComparison>,
    _range: &DateRange,
) -> ProductConversionView {
    let comparison = comparison.map(|c| c.comparison).unwrap_or_default();

    let mut rows = payload.data;
    rows.sort_by_key(|row| row.rank);
    rows.truncate(TOP_PRODUCTS);

    let products = rows
        .into_iter()
        .map(|row| {
            let matched = comparison.iter().find(|c| c.product_id == row.product_id);
            let known_base = matched.filter(|c| c.previous_viewed_users > 0.0);
            ProductConversionRow {
                rank: row.rank,
                image: matched
                    .map(|c| c.sku_image.clone())
                    .filter(|image| !image.is_empty()),
                previous_rate: known_base.map(|c| c.previous_conversion_rate),
                change: known_base
                    .and_then(|c| trusted_change(c.rate_change, c.previous_viewed_users)),
                product_id: row.product_id,
                product_name: row.product_name,
                viewed_users: row.viewed_users,
                purchased_users: row.purchased_users,
                conversion_rate: row.conversion_rate,
            }
        })
        .collect();

    let summary = payload.summary;
    ProductConversionView {
        total_products: summary.total_products,
        average_rate: summary.avg_conversion_rate,
        viewed_users: summary.total_viewed_users,
        purchased_users: summary.total_purchased_users,
        products,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BestsellerRow {
    pub rank: u32,
    pub offer_id: String,
    pub product_name: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub quantity: f64,
    pub revenue_cny: f64,
    pub orders: u64,
    pub avg_unit_price_cny: f64,
    pub min_price_cny: f64,
    pub max_price_cny: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BestsellersView {
    pub sort_by: String,
    pub total_products: u64,
    pub total_quantity: f64,
    pub total_revenue_cny: f64,
    pub total_orders: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_per_order: Option<f64>,
    pub items: Vec<BestsellerRow>,
}

pub fn bestsellers(payload: Bestsellers, _range: &DateRange) -> BestsellersView {
    let mut items = payload.data;
    items.sort_by_key(|item| item.rank);

    let summary = payload.summary;
    BestsellersView {
        revenue_per_order: ratio(summary.total_revenue_cny, summary.total_orders as f64),
        sort_by: summary.sort_by,
        total_products: summary.total_products,
        total_quantity: summary.total_quantity_sold,
        total_revenue_cny: summary.total_revenue_cny,
        total_orders: summary.total_orders,
        items: items
            .into_iter()
            .map(|item| BestsellerRow {
                rank: item.rank,
                offer_id: item.offer_id,
                product_name: item.product_name,
                category: item.category_name,
                image: Some(item.product_image).filter(|image| !image.is_empty()),
                quantity: item.total_quantity,
                revenue_cny: item.total_revenue_cny,
                orders: item.order_count,
                avg_unit_price_cny: item.avg_unit_price_cny,
                min_price_cny: item.price_range_cny.min,
                max_price_cny: item.price_range_cny.max,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::decode;
    use crate::metrics::Metric;
    use chrono::NaiveDate;
    use serde_json::json;

    fn week() -> DateRange {
        DateRange::spanning(
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        )
    }

    fn funnel_body() -> serde_json::Value {
        json!({
            "current": { "funnel_steps": [
                { "step": "1.浏览", "users": 1000, "conversion_rate": "-" },
                { "step": "2.加购", "users": 420, "conversion_rate": "42.0%" }
            ]},
            "previous": { "funnel_steps": [
                { "step": "1.浏览", "users": 0, "conversion_rate": "-" },
                { "step": "2.加购", "users": 300, "conversion_rate": "30.0%" }
            ]},
            "comparison": { "steps": [
                { "step": "1.浏览", "change_rate": 999.0, "change_amount": 1000 },
                { "step": "2.加购", "change_rate": 40.0, "change_amount": 120 }
            ]}
        })
    }

    #[test]
    fn funnel_points_match_worked_example() {
        let payload: FunnelEnvelope =
            decode(Metric::ConversionFunnel, &funnel_body().to_string()).unwrap();
        let points = funnel_points(&payload.current.funnel_steps);
        let pairs: Vec<(&str, f64)> = points.iter().map(|p| (p.id.as_str(), p.value)).collect();
        assert_eq!(pairs, vec![("浏览", 100.0), ("加购", 42.0)]);
        assert_eq!(points[1].label, "42%");
    }

    #[test]
    fn funnel_cards_drop_badges_against_zero_base() {
        let payload: FunnelEnvelope =
            decode(Metric::ConversionFunnel, &funnel_body().to_string()).unwrap();
        let view = funnel(payload, &week());
        assert_eq!(view.cards[0].change, None);
        assert_eq!(view.cards[1].change, Some(40.0));
        assert_eq!(view.overall_rate, Some(42.0));
    }

    #[test]
    fn sales_view_merges_countries_and_buckets() {
        let body = json!({
            "current": {
                "orders_count": 3,
                "ave_amount": 100.0,
                "total_amount": 300.0,
                "amount_distribution": { "0-100": 2, "100-500": 1 },
                "payment_stats": { "card": 2, "paypal": 1 },
                "time_aggregated_sales": [
                    { "time": "2024-03-10", "total_amount_cny": 200.0, "orders_count": 2 },
                    { "time": "2024-03-09", "total_amount_cny": 100.0, "orders_count": 1 }
                ],
                "country_stats": {
                    "US": { "count": 2, "amount": 250.0 },
                    "0": { "count": 1, "amount": 50.0 }
                }
            },
            "previous": {
                "orders_count": 0,
                "total_amount": 0.0,
                "country_stats": { "0": { "count": 1, "amount": 10.0 } }
            },
            "comparison": {
                "orders_count_change": 0.0,
                "total_amount_change": 0.0,
                "ave_amount_change": 0.0
            }
        });
        let payload: SalesEnvelope = decode(Metric::Sales, &body.to_string()).unwrap();
        let view = sales(payload, &week());

        assert_eq!(view.revenue.change, None);
        assert_eq!(view.revenue_by_country[0].category, "US");
        assert_eq!(view.revenue_by_country[0].comparison, 0.0);
        assert_eq!(view.revenue_by_country[1].category, "Unknown");
        assert_eq!(view.revenue_by_country[1].comparison, 10.0);
        assert_eq!(view.order_value_distribution.len(), 4);
        assert_eq!(view.order_value_distribution[3].current, 0.0);

        let trend = &view.revenue_trend[0];
        assert_eq!(trend.data.len(), 2);
        assert!(trend.data[0].x < trend.data[1].x);
        assert_eq!(trend.data[0].y, 100.0);
    }

    #[test]
    fn ranked_rows_follow_rank_and_gate_badges() {
        let body = json!({
            "current": { "total_views": 30 },
            "previous": { "total_views": 0 },
            "comparison": [
                { "category_name": "Shoes", "current_count": 10, "previous_count": 0,
                  "change_count": 10, "change_rate": 100.0, "rank": 2 },
                { "category_name": "Hats", "current_count": 20, "previous_count": 10,
                  "change_count": 10, "change_rate": 100.0, "rank": 1 }
            ]
        });
        let payload: CategoryViewEnvelope =
            decode(Metric::CategoryViews, &body.to_string()).unwrap();
        let view = category_views(payload, &week());

        assert_eq!(view.total.change, None);
        assert_eq!(view.categories[0].row.category, "Hats");
        assert_eq!(view.categories[0].change, Some(100.0));
        assert_eq!(view.categories[1].change, None);
    }

    #[test]
    fn device_shares_fall_back_to_counts() {
        let payload = DeviceSplit {
            total: 0.0,
            ios: 25.0,
            android: 75.0,
            ios_percentage: "25.00%".to_string(),
            android_percentage: String::new(),
        };
        let view = devices(payload, &week());
        assert_eq!(view.total, 100.0);
        assert_eq!(view.slices[0].percentage, Some(25.0));
        assert_eq!(view.slices[1].percentage, Some(75.0));
    }

    #[test]
    fn items_sold_series_sorted() {
        let body = json!({
            "current": [
                { "date": "2024-03-10", "total_items_sold": 5 },
                { "date": "2024-03-09", "total_items_sold": 3 }
            ],
            "previous": [],
            "summary": { "current_total": 8, "previous_total": 0, "total_change_rate": 0 }
        });
        let payload: ItemsSoldEnvelope = decode(Metric::ItemsSold, &body.to_string()).unwrap();
        let view = items_sold(payload, &week());
        assert_eq!(view.total.change, None);
        assert_eq!(view.trend[0].data[0].y, 3.0);
        assert!(view.trend[1].data.is_empty());
    }

    #[test]
    fn null_deltas_leave_change_undefined() {
        let body = json!({
            "current": { "orders_count": 5.0, "total_amount": 300.0, "ave_amount": 60.0 },
            "previous": { "orders_count": 4, "total_amount": 200.0, "ave_amount": 50.0 },
            "comparison": {
                "orders_count_change": 25.0,
                "total_amount_change": null,
                "ave_amount_change": null
            }
        });
        let payload: SalesEnvelope = decode(Metric::Sales, &body.to_string()).unwrap();
        assert_eq!(payload.current.orders_count, 5);

        let view = sales(payload, &week());
        assert_eq!(view.orders.change, Some(25.0));
        assert_eq!(view.revenue.change, None);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json["revenue"].get("change").is_none());
        assert_eq!(json["revenue"]["current"], json!(300.0));
    }

    #[test]
    fn null_ranked_fields_still_decode() {
        let body = json!({
            "current": { "total_views": 30 },
            "previous": { "total_views": 10 },
            "comparison": [
                { "category_name": "Hats", "current_count": 20, "previous_count": 10,
                  "change_count": null, "change_rate": null, "rank": 1.0 }
            ]
        });
        let payload: CategoryViewEnvelope =
            decode(Metric::CategoryViews, &body.to_string()).unwrap();
        let view = category_views(payload, &week());
        assert_eq!(view.categories[0].row.category, "Hats");
        assert_eq!(view.categories[0].change, None);
    }

    fn conversion_body() -> serde_json::Value {
        json!({
            "data": [
                { "rank": 2, "product_id": "p2", "product_name": "Scarf",
                  "viewed_users": 50, "purchased_users": 5, "conversion_rate": 10.0 },
                { "rank": 1, "product_id": "p1", "product_name": "Hat",
                  "viewed_users": 40, "purchased_users": 8, "conversion_rate": 20.0 },
                { "rank": 3, "product_id": "p3", "product_name": "Glove",
                  "viewed_users": 10, "purchased_users": 1, "conversion_rate": 10.0 }
            ],
            "summary": { "total_products": 3, "avg_conversion_rate": 14.0,
                         "total_viewed_users": 100, "total_purchased_users": 14 }
        })
    }

    #[test]
    fn product_conversion_matches_comparison_by_id() {
        let payload: ProductConversion =
            decode(Metric::ProductConversion, &conversion_body().to_string()).unwrap();
        let comparison: ProductConversionComparison = decode(
            Metric::ProductConversionComparison,
            &json!({ "comparison": [
                { "product_id": "p1", "sku_image": "https://img/p1.jpg",
                  "current_conversion_rate": 20.0, "previous_conversion_rate": 15.0,
                  "rate_change": 5.0, "previous_viewed_users": 20 },
                { "product_id": "p2", "previous_conversion_rate": 0.0,
                  "rate_change": 10.0, "previous_viewed_users": 0 }
            ]})
            .to_string(),
        )
        .unwrap();

        let view = product_conversion(payload, Some(comparison), &week());
        let ids: Vec<&str> = view.products.iter().map(|p| p.product_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);

        assert_eq!(view.products[0].previous_rate, Some(15.0));
        assert_eq!(view.products[0].change, Some(5.0));
        assert_eq!(view.products[0].image.as_deref(), Some("https://img/p1.jpg"));
        assert_eq!(view.products[1].previous_rate, None);
        assert_eq!(view.products[1].change, None);
        assert_eq!(view.products[2].change, None);
        assert_eq!(view.total_products, 3);
        assert_eq!(view.average_rate, 14.0);
    }

    #[test]
    fn product_conversion_without_comparison_has_no_badges() {
        let payload: ProductConversion =
            decode(Metric::ProductConversion, &conversion_body().to_string()).unwrap();
        let view = product_conversion(payload, None, &week());
        assert_eq!(view.products.len(), 3);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json["products"][0].get("change").is_none());
        assert!(json["products"][0].get("previous_rate").is_none());
    }

    #[test]
    fn bestsellers_follow_rank() {
        let body = json!({
            "data": [
                { "rank": 2, "offer_id": "o2", "product_name": "Scarf", "category_name": "Acc",
                  "total_quantity": 12, "total_revenue_cny": 240.0, "order_count": 6,
                  "avg_unit_price_cny": 20.0, "price_range_cny": { "min": 18.0, "max": 22.0 } },
                { "rank": 1, "offer_id": "o1", "product_name": "Hat", "category_name": "Acc",
                  "product_image": "https://img/o1.jpg", "total_quantity": 30,
                  "total_revenue_cny": 900.0, "order_count": 10.0, "avg_unit_price_cny": 30.0 }
            ],
            "summary": { "sort_by": "quantity", "total_products": 2, "total_quantity_sold": 42,
                         "total_revenue_cny": 1140.0, "total_orders": 16 }
        });
        let payload: Bestsellers = decode(Metric::Bestsellers, &body.to_string()).unwrap();
        let view = bestsellers(payload, &week());

        assert_eq!(view.items[0].offer_id, "o1");
        assert_eq!(view.items[0].orders, 10);
        assert_eq!(view.items[0].image.as_deref(), Some("https://img/o1.jpg"));
        assert_eq!(view.items[1].image, None);
        assert_eq!(view.items[1].max_price_cny, 22.0);
        assert_eq!(view.revenue_per_order, Some(71.25));
        assert_eq!(view.sort_by, "quantity");
    }

    #[test]
    fn bestsellers_without_orders_have_no_average() {
        let body = json!({ "data": [], "summary": { "total_orders": 0 } });
        let payload: Bestsellers = decode(Metric::Bestsellers, &body.to_string()).unwrap();
        let view = bestsellers(payload, &week());
        assert!(view.items.is_empty());
        assert_eq!(view.revenue_per_order, None);
    }
}
