//! Configuration for data access operations

use crate::error::{DataError, Result};
use finq_utils::{env_duration_secs, env_parse, env_var};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Requests-per-period ceilings for each upstream provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    /// FRED requests per minute
    pub fred_per_minute: u32,
    /// Alpha Vantage requests per minute (free tier is 5)
    pub alpha_vantage_per_minute: u32,
    /// SEC EDGAR requests per second (fair access policy is 10)
    pub sec_per_second: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            fred_per_minute: 120,
            alpha_vantage_per_minute: 5,
            sec_per_second: 10,
        }
    }
}

/// Configuration for the data-access layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Time-to-live applied to every cached record
    pub cache_ttl: Duration,

    /// Maximum number of cached records
    pub cache_capacity: usize,

    /// Maximum number of adapter fetches in flight per manager, shared by
    /// concurrent resolutions
    pub max_in_flight: usize,

    /// Pause before the single retry of a transient failure
    pub retry_backoff: Duration,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// Most recent points rendered per series in the analysis context
    pub max_series_points: usize,

    /// FRED API key (optional; macro adapter is disabled without it)
    pub fred_api_key: Option<String>,

    /// Alpha Vantage API key (optional; statements need it)
    pub alpha_vantage_api_key: Option<String>,

    /// User-Agent sent to SEC EDGAR, which requires a contact address
    pub sec_user_agent: String,

    /// Path to the precomputed fundamentals snapshot (optional)
    pub fundamentals_snapshot: Option<PathBuf>,

    /// Provider rate limits
    pub rate_limits: RateLimits,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),      // 5 minutes
            cache_capacity: 1024,
            max_in_flight: 8,
            retry_backoff: Duration::from_millis(250),
            request_timeout: Duration::from_secs(30),
            max_series_points: 12,
            fred_api_key: None,
            alpha_vantage_api_key: None,
            sec_user_agent: "finq-rs (finq-rs@example.com)".to_string(),
            fundamentals_snapshot: None,
            rate_limits: RateLimits::default(),
        }
    }
}

impl DataConfig {
    /// Create a new configuration builder
    pub fn builder() -> DataConfigBuilder {
        DataConfigBuilder::default()
    }

    /// Load configuration from environment variables on top of the defaults
    ///
    /// Recognized: `FRED_API_KEY`, `ALPHA_VANTAGE_API_KEY`, `SEC_USER_AGENT`,
    /// `FINQ_CACHE_TTL_SECS`, `FINQ_MAX_IN_FLIGHT`, `FINQ_FUNDAMENTALS_SNAPSHOT`.
    pub fn from_env() -> Result<Self> {
        DataConfigBuilder::default().with_env()?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_in_flight == 0 {
            return Err(DataError::Config(
                "max_in_flight must be greater than 0".to_string(),
            ));
        }

        if self.cache_capacity == 0 {
            return Err(DataError::Config(
                "cache_capacity must be greater than 0".to_string(),
            ));
        }

        if self.sec_user_agent.trim().is_empty() {
            return Err(DataError::Config(
                "sec_user_agent must name the application and a contact address".to_string(),
            ));
        }

        let limits = &self.rate_limits;
        if limits.fred_per_minute == 0
            || limits.alpha_vantage_per_minute == 0
            || limits.sec_per_second == 0
        {
            return Err(DataError::Config(
                "rate limits must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for DataConfig
#[derive(Debug, Default)]
pub struct DataConfigBuilder {
    cache_ttl: Option<Duration>,
    cache_capacity: Option<usize>,
    max_in_flight: Option<usize>,
    retry_backoff: Option<Duration>,
    request_timeout: Option<Duration>,
    max_series_points: Option<usize>,
    fred_api_key: Option<String>,
    alpha_vantage_api_key: Option<String>,
    sec_user_agent: Option<String>,
    fundamentals_snapshot: Option<PathBuf>,
    rate_limits: Option<RateLimits>,
}

impl DataConfigBuilder {
    /// Set cache TTL
    pub fn cache_ttl(mut self, duration: Duration) -> Self {
        self.cache_ttl = Some(duration);
        self
    }

    /// Set cache capacity
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    /// Set maximum concurrent fetches
    pub fn max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = Some(max);
        self
    }

    /// Set retry backoff
    pub fn retry_backoff(mut self, duration: Duration) -> Self {
        self.retry_backoff = Some(duration);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    pub fn max_series_points(mut self, points: usize) -> Self {
        self.max_series_points = Some(points);
        self
    }

    /// Set FRED API key
    pub fn fred_api_key(mut self, key: impl Into<String>) -> Self {
        self.fred_api_key = Some(key.into());
        self
    }

    /// Set Alpha Vantage API key
    pub fn alpha_vantage_api_key(mut self, key: impl Into<String>) -> Self {
        self.alpha_vantage_api_key = Some(key.into());
        self
    }

    /// Set SEC EDGAR User-Agent
    pub fn sec_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.sec_user_agent = Some(agent.into());
        self
    }

    /// Set fundamentals snapshot path
    pub fn fundamentals_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.fundamentals_snapshot = Some(path.into());
        self
    }

    pub fn rate_limits(mut self, limits: RateLimits) -> Self {
        self.rate_limits = Some(limits);
        self
    }

    /// Fill unset values from the environment
    pub fn with_env(mut self) -> Result<Self> {
        if self.fred_api_key.is_none() {
            self.fred_api_key = env_var("FRED_API_KEY");
        }
        if self.alpha_vantage_api_key.is_none() {
            self.alpha_vantage_api_key = env_var("ALPHA_VANTAGE_API_KEY");
        }
        if self.sec_user_agent.is_none() {
            self.sec_user_agent = env_var("SEC_USER_AGENT");
        }
        if self.fundamentals_snapshot.is_none() {
            self.fundamentals_snapshot = env_var("FINQ_FUNDAMENTALS_SNAPSHOT").map(PathBuf::from);
        }
        if self.cache_ttl.is_none() {
            self.cache_ttl = env_duration_secs("FINQ_CACHE_TTL_SECS")?;
        }
        if self.max_in_flight.is_none() {
            self.max_in_flight = env_parse("FINQ_MAX_IN_FLIGHT")?;
        }
        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<DataConfig> {
        let defaults = DataConfig::default();

        let config = DataConfig {
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
            cache_capacity: self.cache_capacity.unwrap_or(defaults.cache_capacity),
            max_in_flight: self.max_in_flight.unwrap_or(defaults.max_in_flight),
            retry_backoff: self.retry_backoff.unwrap_or(defaults.retry_backoff),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            max_series_points: self.max_series_points.unwrap_or(defaults.max_series_points),
            fred_api_key: self.fred_api_key,
            alpha_vantage_api_key: self.alpha_vantage_api_key,
            sec_user_agent: self.sec_user_agent.unwrap_or(defaults.sec_user_agent),
            fundamentals_snapshot: self.fundamentals_snapshot,
            rate_limits: self.rate_limits.unwrap_or(defaults.rate_limits),
        };

        config.validate()?;
        Ok(config)
    }
}
