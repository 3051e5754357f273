use crate::errors::AppError;
use crate::pages::{Page, PageReport, load_page};
use crate::range::{RangeInfo, SelectionParams, resolve_selection};
use crate::state::AppState;
use crate::view::{PageController, ViewState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

pub async fn health() -> &'static str {
    "ok"
}

pub async fn get_range(Query(params): Query<SelectionParams>) -> Result<Json<RangeInfo>, AppError> {
    let now = Utc::now();
    let range = resolve_selection(params.into_selection()?, now)?;
    Ok(Json(RangeInfo::new(range, now.date_naive())))
}

/// Loads a whole page for one range and waits for every section.
pub async fn get_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<SelectionParams>,
) -> Result<Json<PageReport>, AppError> {
    let page = parse_page(&slug)?;
    let now = Utc::now();
    let range = resolve_selection(params.into_selection()?, now)?;

    Ok(Json(load_page(&state.fetcher, page, range, now.date_naive()).await))
}

/// Starts loading a new range in the background and returns the view as it
/// stands right after the switch.
pub async fn select_range(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(params): Json<SelectionParams>,
) -> Result<(StatusCode, Json<ViewState>), AppError> {
    let controller = controller(&state, &slug)?;
    let selection = match params.into_selection() {
        Ok(selection) => selection,
        Err(err) => {
            controller.reject(&err).await;
            return Err(err.into());
        }
    };
    let view = controller.select(selection).await?;
    Ok((StatusCode::ACCEPTED, Json(view)))
}

pub async fn get_view(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ViewState>, AppError> {
    let controller = controller(&state, &slug)?;
    Ok(Json(controller.ensure_started().await))
}

fn parse_page(slug: &str) -> Result<Page, AppError> {
    Page::from_slug(slug).ok_or_else(|| AppError::not_found(format!("unknown page '{slug}'")))
}

fn controller<'a>(state: &'a AppState, slug: &str) -> Result<&'a PageController, AppError> {
    let page = parse_page(slug)?;
    state
        .view(page)
        .ok_or_else(|| AppError::not_found(format!("no view for page '{page}'")))
}
