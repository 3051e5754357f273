use axum::http::StatusCode;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<RangeError> for AppError {
    fn from(err: RangeError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}

/// A date-range selection the user has to fix before anything is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("unknown range '{0}'")]
    UnknownToken(String),

    #[error("start date {from} is after end date {to}")]
    Inverted { from: NaiveDate, to: NaiveDate },

    #[error("start date {0} is in the future; pick today or an earlier date")]
    FutureStart(NaiveDate),

    #[error("both 'from' and 'to' are required for a custom range")]
    Incomplete,
}

/// Why one metric produced no data. Never fatal to the page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("response is not valid JSON: {0}")]
    Parse(String),

    #[error("response has unexpected shape: {0}")]
    Shape(String),
}

impl FetchError {
    /// Text for the page-level banner when the primary metric fails.
    pub fn banner(&self) -> &'static str {
        match self {
            Self::Transport(_) | Self::Status(_) => "failed to load data, please try again later",
            Self::Parse(_) => "response data could not be parsed",
            Self::Shape(_) => "response data has an unexpected format",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Status(status.as_u16()),
            None => Self::Transport(err.to_string()),
        }
    }
}
