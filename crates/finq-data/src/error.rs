//! Error types for data access operations
//!
//! Two layers: [`FetchError`] is what a single adapter call can produce and is
//! mostly absorbed into a `FetchFailure` by the manager; [`DataError`] is the
//! fatal error that reaches the caller unmodified.

use crate::key::ProviderFamily;
use thiserror::Error;

/// Outcome of a failed adapter fetch
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Network, auth or rate-limit trouble; worth one retry
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable {
        provider: String,
        reason: String,
    },

    /// The entity does not exist at the provider; never retried
    #[error("{entity} not found at {provider}")]
    NotFound {
        provider: String,
        entity: String,
    },

    /// Programming or configuration error surfaced by an adapter
    #[error("{0}")]
    Fatal(String),
}

impl FetchError {
    pub fn unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(provider: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::NotFound {
            provider: provider.into(),
            entity: entity.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    /// Whether the manager should spend its single retry on this error
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ProviderUnavailable { .. })
    }

    /// Map an HTTP status from `provider` into a fetch error
    ///
    /// Only called for non-success statuses.
    pub fn from_status(
        provider: &str,
        entity: &str,
        status: reqwest::StatusCode,
    ) -> Self {
        if status == reqwest::StatusCode::NOT_FOUND {
            Self::not_found(provider, entity)
        } else {
            Self::unavailable(provider, format!("HTTP {status}"))
        }
    }
}

/// Transport failures are always transient from the manager's point of view
impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let provider = err
            .url()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "http".to_string());
        let reason = if err.is_timeout() {
            "request timed out".to_string()
        } else {
            err.to_string()
        };
        Self::ProviderUnavailable { provider, reason }
    }
}

/// Fatal errors for data access operations
#[derive(Debug, Error)]
pub enum DataError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A request named a provider family nobody registered an adapter for
    #[error("No adapter registered for provider family '{0}'")]
    NoAdapter(ProviderFamily),

    /// An adapter reported a non-data failure
    #[error("Adapter error for {key}: {message}")]
    Adapter {
        key: String,
        message: String,
    },

    /// Fundamentals snapshot could not be loaded
    #[error("Snapshot error ({path}): {reason}")]
    Snapshot {
        path: String,
        reason: String,
    },
}

/// Result type alias for data operations
pub type Result<T> = std::result::Result<T, DataError>;

impl From<finq_utils::ConfigError> for DataError {
    fn from(err: finq_utils::ConfigError) -> Self {
        DataError::Config(err.to_string())
    }
}
