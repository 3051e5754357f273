use crate::errors::FetchError;
use crate::metrics::{Metric, MetricRequest};
use crate::models::Payload;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Status and body of one upstream response, before any decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Issues GET requests against the analytics API.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<RawResponse, FetchError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<RawResponse, FetchError> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, ?query, "upstream request");

        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(RawResponse { status, body })
    }
}

/// Fetches and decodes metric payloads. Cheap to clone.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn fetch<P: Payload>(&self, request: &MetricRequest) -> Result<P, FetchError> {
        debug_assert_eq!(request.metric, P::METRIC);

        let response = self
            .transport
            .get(request.metric.path(), &request.query())
            .await?;
        if !(200..300).contains(&response.status) {
            return Err(FetchError::Status(response.status));
        }

        decode(request.metric, &response.body)
    }
}

/// Parses a body, checks the metric's top-level keys, then decodes it.
pub fn decode<T: DeserializeOwned>(metric: Metric, body: &str) -> Result<T, FetchError> {
    let value: Value =
        serde_json::from_str(body).map_err(|err| FetchError::Parse(err.to_string()))?;

    let Some(object) = value.as_object() else {
        return Err(FetchError::Shape(format!(
            "{} response is not a JSON object",
            metric.path()
        )));
    };

    let missing: Vec<&str> = metric
        .required_keys()
        .iter()
        .copied()
        .filter(|key| !object.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(FetchError::Shape(format!(
            "{} response is missing {}",
            metric.path(),
            missing.join(", ")
        )));
    }

    serde_json::from_value(value).map_err(|err| FetchError::Shape(err.to_string()))
}
