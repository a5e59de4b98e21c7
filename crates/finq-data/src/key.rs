//! Canonical request keys
//!
//! A [`SourceKey`] names exactly one fetchable unit and doubles as the cache
//! key, so two requests that mean the same thing must compare and hash equal.
//! All canonicalization happens in the constructors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Provider family owning a key
///
/// Declaration order is the default display order of families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
    /// Quotes, price history, statements and company overview
    Market,
    /// Macro-economic indicator series
    Macro,
    /// Regulatory filings metadata
    Filings,
    /// Precomputed fundamentals snapshot
    Fundamentals,
}

impl ProviderFamily {
    pub const ALL: [ProviderFamily; 4] = [
        ProviderFamily::Market,
        ProviderFamily::Macro,
        ProviderFamily::Filings,
        ProviderFamily::Fundamentals,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderFamily::Market => "market",
            ProviderFamily::Macro => "macro",
            ProviderFamily::Filings => "filings",
            ProviderFamily::Fundamentals => "fundamentals",
        }
    }
}

impl fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market" => Ok(Self::Market),
            "macro" => Ok(Self::Macro),
            "filings" => Ok(Self::Filings),
            "fundamentals" => Ok(Self::Fundamentals),
            other => Err(format!("unknown provider family: {other}")),
        }
    }
}

/// Sorted, normalized query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter; names are lower-cased, blank values are ignored
    pub fn with(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) {
        let name = name.as_ref().trim().to_ascii_lowercase();
        let value = value.as_ref().trim();
        if name.is_empty() || value.is_empty() {
            return;
        }
        self.0.insert(name, value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Parse a numeric parameter, falling back to `default` when absent
    pub fn get_usize(&self, name: &str, default: usize) -> Result<usize, String> {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|_| format!("parameter '{name}' must be a whole number, got {raw:?}")),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

/// One fetchable unit: (provider family, entity, parameters)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceKey {
    family: ProviderFamily,
    entity: String,
    params: QueryParams,
}

impl SourceKey {
    /// Create a canonical key
    ///
    /// Entities are tickers, series codes or CIKs in every family we know of,
    /// all of which are case-insensitive upstream, so they are upper-cased.
    pub fn new(family: ProviderFamily, entity: impl AsRef<str>, params: QueryParams) -> Self {
        Self {
            family,
            entity: entity.as_ref().trim().to_ascii_uppercase(),
            params,
        }
    }

    pub fn family(&self) -> ProviderFamily {
        self.family
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family, self.entity)?;
        if !self.params.is_empty() {
            write!(f, "{{{}}}", self.params)?;
        }
        Ok(())
    }
}
