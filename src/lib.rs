pub mod app;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod pages;
pub mod range;
pub mod series;
pub mod state;
pub mod transform;
pub mod view;

pub use app::router;
pub use config::Config;
pub use fetch::{Fetcher, HttpTransport};
pub use state::AppState;
