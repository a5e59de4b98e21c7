//! Federal Reserve Economic Data (FRED) adapter for the macro family
//!
//! Rate limit: 120 requests per minute. An entity is a FRED series id such as
//! `UNRATE`; observations are fetched newest first and paged until `limit`
//! points are collected.
//!
//! Query parameters: `limit` (default 12), `start`, `end` (`YYYY-MM-DD`).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{SharedRateLimiter, SourceAdapter, http_client, parse_date, parse_number, per_minute, usize_param};
use crate::config::DataConfig;
use crate::error::{DataError, FetchError};
use crate::key::{ProviderFamily, QueryParams};
use crate::record::{NormalizedRecord, Point};

const FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred";
const PROVIDER: &str = "fred";

/// FRED caps a single observations page well above this; smaller pages keep
/// each request cheap when callers ask for long histories
const PAGE_SIZE: usize = 1000;

/// Series metadata
#[derive(Debug, Clone, Deserialize)]
struct SeriesInfo {
    title: Option<String>,
    units: Option<String>,
    frequency: Option<String>,
    seasonal_adjustment_short: Option<String>,
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    #[serde(default)]
    seriess: Vec<SeriesInfo>,
}

/// Observation as FRED sends it; `value` is "." for a missing period
#[derive(Debug, Clone, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<Observation>,
}

/// Window of observations requested for one series
#[derive(Debug, Clone, PartialEq, Eq)]
struct Window {
    limit: usize,
    start: Option<String>,
    end: Option<String>,
}

impl Window {
    fn from_params(params: &QueryParams) -> Result<Self, FetchError> {
        let limit = usize_param(params, "limit", 12)?.max(1);
        let start = params.get("start").map(str::to_string);
        let end = params.get("end").map(str::to_string);
        for bound in [&start, &end].into_iter().flatten() {
            if parse_date(bound).is_none() {
                return Err(FetchError::fatal(format!(
                    "macro window bound '{bound}' is not a YYYY-MM-DD date"
                )));
            }
        }
        Ok(Self { limit, start, end })
    }
}

/// Adapter for the macro family
pub struct MacroAdapter {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl MacroAdapter {
    pub fn new(api_key: impl Into<String>, config: &DataConfig) -> Result<Self, DataError> {
        Ok(Self {
            client: http_client(config.request_timeout, None)?,
            api_key: api_key.into(),
            base_url: FRED_BASE_URL.to_string(),
            rate_limiter: per_minute(config.rate_limits.fred_per_minute),
        })
    }

    /// Build from configuration; `None` when no FRED key is configured
    pub fn from_config(config: &DataConfig) -> Result<Option<Self>, DataError> {
        config
            .fred_api_key
            .as_deref()
            .map(|key| Self::new(key, config))
            .transpose()
    }

    async fn get(
        &self,
        path: &str,
        series_id: &str,
        extra: &[(&str, String)],
    ) -> Result<reqwest::Response, FetchError> {
        // Wait for rate limiter
        self.rate_limiter.until_ready().await;

        let mut params: Vec<(&str, String)> = vec![
            ("series_id", series_id.to_string()),
            ("api_key", self.api_key.clone()),
            ("file_type", "json".to_string()),
        ];
        params.extend(extra.iter().cloned());

        let url = format!("{}/{path}", self.base_url);
        let response = self.client.get(&url).query(&params).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_fred_status(series_id, status, &body))
    }

    async fn series_info(&self, series_id: &str) -> Result<SeriesInfo, FetchError> {
        let data: SeriesResponse = self.get("series", series_id, &[]).await?.json().await?;
        data.seriess
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::not_found(PROVIDER, series_id))
    }

    async fn observations(
        &self,
        series_id: &str,
        window: &Window,
    ) -> Result<Vec<Observation>, FetchError> {
        let mut collected = Vec::new();

        while collected.len() < window.limit {
            let page = PAGE_SIZE.min(window.limit - collected.len());
            let mut extra = vec![
                ("sort_order", "desc".to_string()),
                ("limit", page.to_string()),
                ("offset", collected.len().to_string()),
            ];
            if let Some(start) = &window.start {
                extra.push(("observation_start", start.clone()));
            }
            if let Some(end) = &window.end {
                extra.push(("observation_end", end.clone()));
            }

            let data: ObservationsResponse = self
                .get("series/observations", series_id, &extra)
                .await?
                .json()
                .await?;

            let received = data.observations.len();
            collected.extend(data.observations);
            if received < page {
                break;
            }
        }

        tracing::debug!(series = series_id, count = collected.len(), "Fetched FRED observations");
        Ok(collected)
    }
}

#[async_trait]
impl SourceAdapter for MacroAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Macro
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch(
        &self,
        entity: &str,
        params: &QueryParams,
    ) -> Result<NormalizedRecord, FetchError> {
        let window = Window::from_params(params)?;
        let info = self.series_info(entity).await?;
        let observations = self.observations(entity, &window).await?;
        Ok(series_record(entity, &info, &observations))
    }
}

/// FRED answers unknown series with 400 "Bad Request. The series does not exist."
fn map_fred_status(series_id: &str, status: StatusCode, body: &str) -> FetchError {
    if status == StatusCode::BAD_REQUEST && body.to_ascii_lowercase().contains("does not exist") {
        return FetchError::not_found(PROVIDER, series_id);
    }
    FetchError::from_status(PROVIDER, series_id, status)
}

fn series_record(
    series_id: &str,
    info: &SeriesInfo,
    observations: &[Observation],
) -> NormalizedRecord {
    let points: Vec<Point> = observations
        .iter()
        .filter_map(|o| parse_date(&o.date).map(|d| Point::new(d, parse_number(&o.value))))
        .collect();

    // newest reported value and the one before it
    let mut reported: Vec<&Point> = points.iter().filter(|p| p.value.is_some()).collect();
    reported.sort_by(|a, b| b.date.cmp(&a.date));
    let latest = reported.first().copied();
    let previous = reported.get(1).copied();
    let change = latest
        .and_then(|l| l.value)
        .zip(previous.and_then(|p| p.value))
        .map(|(l, p)| l - p);

    NormalizedRecord::builder(ProviderFamily::Macro, PROVIDER, series_id)
        .text("title", info.title.clone())
        .text("units", info.units.clone())
        .text("frequency", info.frequency.clone())
        .text("seasonal_adjustment", info.seasonal_adjustment_short.clone())
        .text("last_updated", info.last_updated.clone())
        .number("latest_value", latest.and_then(|p| p.value))
        .date("latest_date", latest.map(|p| p.date))
        .number("change", change)
        .series("observations", points)
        .build()
}
