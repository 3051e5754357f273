use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/range", get(handlers::get_range))
        .route("/api/pages/:page", get(handlers::get_page))
        .route("/api/pages/:page/selection", post(handlers::select_range))
        .route("/api/pages/:page/view", get(handlers::get_view))
        .with_state(state)
}
