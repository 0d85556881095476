use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::snapshot::{filter_allowlisted, CameraReading, TrafficSnapshot};
use crate::time;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("traffic-images request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("traffic-images returned HTTP {status}")]
    Status { status: StatusCode, body: String },
    #[error("failed to decode traffic-images payload: {0}")]
    Decode(#[source] reqwest::Error),
}

#[derive(Debug, Deserialize)]
pub struct UpstreamPayload {
    pub items: Vec<UpstreamItem>,
    #[serde(default)]
    pub api_info: Option<ApiInfo>,
}

#[derive(Debug, Deserialize)]
pub struct UpstreamItem {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub cameras: Option<Vec<CameraReading>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiInfo {
    pub status: String,
}

/// Client for the data.gov.sg `transport/traffic-images` endpoint.
#[derive(Debug, Clone)]
pub struct TrafficImagesClient {
    http: Client,
    base_url: Url,
    timeout: Option<Duration>,
}

impl TrafficImagesClient {
    pub fn new(http: Client, base_url: Url, timeout: Option<Duration>) -> Self {
        Self {
            http,
            base_url,
            timeout,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub async fn fetch(&self, date_time: &str) -> Result<UpstreamPayload, UpstreamError> {
        let mut request = self
            .http
            .get(self.base_url.clone())
            .query(&[("date_time", date_time)])
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(UpstreamError::Request)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "traffic-images upstream HTTP error");
            return Err(UpstreamError::Status { status, body });
        }

        let payload: UpstreamPayload = response.json().await.map_err(UpstreamError::Decode)?;
        if let Some(info) = payload.api_info.as_ref() {
            if info.status != "healthy" {
                tracing::debug!(status = %info.status, "traffic-images api_info status");
            }
        }
        Ok(payload)
    }

    /// Fetches the batch current at `now` and narrows it to the camera allowlist.
    pub async fn snapshot_at(&self, now: DateTime<Utc>) -> Result<TrafficSnapshot, UpstreamError> {
        let date_time = time::upstream_query_timestamp(now);
        let payload = self.fetch(&date_time).await?;
        Ok(normalize(payload, now))
    }
}

/// Builds the served snapshot from the first upstream batch.
pub fn normalize(payload: UpstreamPayload, now: DateTime<Utc>) -> TrafficSnapshot {
    let first = payload.items.into_iter().next();
    let (timestamp, cameras) = match first {
        Some(item) => (item.timestamp, item.cameras),
        None => (None, None),
    };

    TrafficSnapshot {
        timestamp: timestamp
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        cameras: cameras.map(filter_allowlisted).unwrap_or_default(),
    }
}
