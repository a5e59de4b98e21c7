//! Precomputed fundamentals snapshot adapter
//!
//! The snapshot is produced by an external batch job and loaded once at
//! start-up; fetches never touch the network. Accepted shape:
//!
//! ```json
//! {
//!   "generated_at": "2025-10-01T06:00:00Z",
//!   "companies": {
//!     "AAPL": {"name": "Apple Inc.", "sector": "Technology", "industry": "Consumer Electronics"}
//!   },
//!   "rows": [
//!     {"ticker": "AAPL", "period_end": "2024-09-30", "fiscal_period": "FY2024",
//!      "metric": "Total Revenue", "category": "IncomeStatement", "value": 391035000000.0}
//!   ]
//! }
//! ```
//!
//! Categories are `IncomeStatement`, `BalanceSheet` and `CashFlow`; `value` may
//! be `null` for a reported period without a number.
//!
//! Query parameters: `category` (prefix match, e.g. `income`), `metrics`
//! (comma list of metric names), `periods` (default 4).

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use super::{SourceAdapter, usize_param};
use crate::error::{DataError, FetchError};
use crate::key::{ProviderFamily, QueryParams};
use crate::record::{NormalizedRecord, Point};

const PROVIDER: &str = "snapshot";

/// Metrics rendered when a request names neither metrics nor a category
pub const DEFAULT_METRICS: [&str; 8] = [
    "Total Revenue",
    "Net Income",
    "Operating Income",
    "Total Assets",
    "Total Liabilities Net Minority Interest",
    "Stockholders Equity",
    "Operating Cash Flow",
    "Free Cash Flow",
];

/// Descriptive company data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
}

/// One tall row: a single metric for a single period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalRow {
    pub ticker: String,
    pub period_end: NaiveDate,
    #[serde(default)]
    pub fiscal_period: Option<String>,
    pub metric: String,
    #[serde(default)]
    pub category: Option<String>,
    pub value: Option<f64>,
}

/// The snapshot file as written by the batch job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundamentalsSnapshot {
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub companies: BTreeMap<String, CompanyProfile>,
    #[serde(default)]
    pub rows: Vec<FundamentalRow>,
}

impl FundamentalsSnapshot {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Adapter for the fundamentals family, backed by an in-memory snapshot
pub struct SnapshotFundamentalsAdapter {
    generated_at: Option<String>,
    companies: HashMap<String, CompanyProfile>,
    rows: HashMap<String, Vec<FundamentalRow>>,
}

impl SnapshotFundamentalsAdapter {
    /// Load a snapshot file
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let snapshot_error = |reason: String| DataError::Snapshot {
            path: path.display().to_string(),
            reason,
        };

        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| snapshot_error(e.to_string()))?;
        let snapshot =
            FundamentalsSnapshot::from_json(&raw).map_err(|e| snapshot_error(e.to_string()))?;

        let adapter = Self::from_snapshot(snapshot);
        tracing::info!(
            path = %path.display(),
            companies = adapter.rows.len(),
            "Loaded fundamentals snapshot"
        );
        Ok(adapter)
    }

    /// Index an already parsed snapshot by ticker
    pub fn from_snapshot(snapshot: FundamentalsSnapshot) -> Self {
        let companies = snapshot
            .companies
            .into_iter()
            .map(|(ticker, profile)| (ticker.trim().to_ascii_uppercase(), profile))
            .collect();

        let mut rows: HashMap<String, Vec<FundamentalRow>> = HashMap::new();
        for row in snapshot.rows {
            rows.entry(row.ticker.trim().to_ascii_uppercase())
                .or_default()
                .push(row);
        }

        Self {
            generated_at: snapshot.generated_at,
            companies,
            rows,
        }
    }

    pub fn tickers(&self) -> BTreeSet<&str> {
        self.companies
            .keys()
            .chain(self.rows.keys())
            .map(String::as_str)
            .collect()
    }
}

#[async_trait]
impl SourceAdapter for SnapshotFundamentalsAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Fundamentals
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch(
        &self,
        entity: &str,
        params: &QueryParams,
    ) -> Result<NormalizedRecord, FetchError> {
        let ticker = entity.trim().to_ascii_uppercase();
        let profile = self.companies.get(&ticker);
        let rows = self.rows.get(&ticker);
        if profile.is_none() && rows.is_none() {
            return Err(FetchError::not_found(PROVIDER, entity));
        }

        let selection = Selection::from_params(params)?;
        let rows = rows.map(Vec::as_slice).unwrap_or_default();
        Ok(fundamentals_record(
            entity,
            profile,
            self.generated_at.as_deref(),
            rows,
            &selection,
        ))
    }

    fn known_entities(&self) -> Vec<String> {
        self.tickers().into_iter().map(str::to_string).collect()
    }
}

/// Which metrics a request wants
#[derive(Debug, Clone, PartialEq, Eq)]
struct Selection {
    metrics: Option<Vec<String>>,
    category: Option<String>,
    periods: usize,
}

impl Selection {
    fn from_params(params: &QueryParams) -> Result<Self, FetchError> {
        let metrics = params.get("metrics").map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });
        Ok(Self {
            metrics: metrics.filter(|m| !m.is_empty()),
            category: params.get("category").map(compact),
            periods: usize_param(params, "periods", 4)?.max(1),
        })
    }

    fn in_category(&self, row: &FundamentalRow) -> bool {
        match (&self.category, &row.category) {
            (None, _) => true,
            (Some(wanted), Some(category)) => compact(category).starts_with(wanted.as_str()),
            (Some(_), None) => false,
        }
    }

    /// Metric names to render, in output order
    fn metric_names(&self, rows: &[FundamentalRow]) -> Vec<String> {
        if let Some(metrics) = &self.metrics {
            return metrics.clone();
        }
        if self.category.is_some() {
            let names: BTreeSet<&str> = rows
                .iter()
                .filter(|r| self.in_category(r))
                .map(|r| r.metric.as_str())
                .collect();
            return names.into_iter().map(str::to_string).collect();
        }
        DEFAULT_METRICS.iter().map(|m| (*m).to_string()).collect()
    }
}

/// Lower-case alphanumerics only, for forgiving comparisons
fn compact(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// `Total Liabilities Net Minority Interest` -> `total_liabilities_net_minority_interest`
fn field_name(metric: &str) -> String {
    let mut name = String::with_capacity(metric.len());
    for c in metric.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_lowercase());
        } else if !name.is_empty() && !name.ends_with('_') {
            name.push('_');
        }
    }
    while name.ends_with('_') {
        name.pop();
    }
    name
}

fn fundamentals_record(
    entity: &str,
    profile: Option<&CompanyProfile>,
    generated_at: Option<&str>,
    rows: &[FundamentalRow],
    selection: &Selection,
) -> NormalizedRecord {
    let mut builder = NormalizedRecord::builder(ProviderFamily::Fundamentals, PROVIDER, entity)
        .text("name", profile.and_then(|p| p.name.clone()))
        .text("sector", profile.and_then(|p| p.sector.clone()))
        .text("industry", profile.and_then(|p| p.industry.clone()))
        .text("generated_at", generated_at);

    for metric in selection.metric_names(rows) {
        let wanted = compact(&metric);
        let mut points: Vec<Point> = rows
            .iter()
            .filter(|r| selection.in_category(r) && compact(&r.metric) == wanted)
            .map(|r| Point::new(r.period_end, r.value))
            .collect();

        // newest periods win; the builder restores ascending order
        points.sort_by(|a, b| b.date.cmp(&a.date));
        points.dedup_by_key(|p| p.date);
        points.truncate(selection.periods);

        builder = builder.series(field_name(&metric), points);
    }

    builder.build()
}
