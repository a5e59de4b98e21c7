//! Source adapters, one per provider family
//!
//! An adapter owns everything provider-specific: transport, credentials,
//! rate limiting, pagination and payload shapes. What leaves an adapter is a
//! [`NormalizedRecord`] or a [`FetchError`]; nothing downstream ever branches
//! on which provider produced a record.

pub mod filings;
pub mod fundamentals;
pub mod macro_series;
pub mod market;

pub use filings::FilingsAdapter;
pub use fundamentals::{FundamentalsSnapshot, SnapshotFundamentalsAdapter};
pub use macro_series::MacroAdapter;
pub use market::{MarketAdapter, StatementKind, StatementPeriod};

use async_trait::async_trait;
use chrono::NaiveDate;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{DataError, FetchError};
use crate::key::{ProviderFamily, QueryParams};
use crate::record::NormalizedRecord;

pub(crate) type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Capability interface implemented once per provider family
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Family whose keys this adapter serves
    fn family(&self) -> ProviderFamily;

    /// Short provider name recorded as provenance
    fn name(&self) -> &'static str;

    /// Fetch one entity and normalize it
    ///
    /// Provider trouble is reported as [`FetchError::ProviderUnavailable`] or
    /// [`FetchError::NotFound`]; anything else is [`FetchError::Fatal`].
    async fn fetch(
        &self,
        entity: &str,
        params: &QueryParams,
    ) -> Result<NormalizedRecord, FetchError>;

    /// Entities this adapter can answer without asking upstream
    ///
    /// Only adapters backed by a local index know this; the rest return
    /// nothing.
    fn known_entities(&self) -> Vec<String> {
        Vec::new()
    }
}

pub(crate) fn per_minute(limit: u32) -> SharedRateLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

pub(crate) fn per_second(limit: u32) -> SharedRateLimiter {
    let quota = Quota::per_second(NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Shared HTTP client construction
pub(crate) fn http_client(timeout: Duration, user_agent: Option<&str>) -> Result<Client, DataError> {
    let mut builder = Client::builder().timeout(timeout);
    if let Some(agent) = user_agent {
        builder = builder.user_agent(agent);
    }
    builder
        .build()
        .map_err(|e| DataError::Config(format!("failed to build HTTP client: {e}")))
}

/// Parse a provider number; providers spell "missing" in many ways
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if matches!(raw, "" | "." | "-" | "None" | "none" | "null" | "N/A") {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an ISO `YYYY-MM-DD` date, ignoring any time suffix
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Read a parameter that must be present
pub(crate) fn required<'a>(
    params: &'a QueryParams,
    name: &str,
    family: ProviderFamily,
) -> Result<&'a str, FetchError> {
    params
        .get(name)
        .ok_or_else(|| FetchError::fatal(format!("{family} request is missing parameter '{name}'")))
}

/// Numeric parameter, where a malformed value is a caller bug
pub(crate) fn usize_param(
    params: &QueryParams,
    name: &str,
    default: usize,
) -> Result<usize, FetchError> {
    params.get_usize(name, default).map_err(FetchError::Fatal)
}
