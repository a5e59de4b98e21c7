//! Request resolution across cache and adapters
//!
//! [`DataSourceManager::resolve`] answers every key of a [`RequestBundle`]:
//! from the cache when a live record exists, otherwise from the adapter that
//! owns the key's family. Misses are fetched concurrently up to
//! `max_in_flight`. A transient failure is retried once; anything that still
//! fails becomes a [`FetchFailure`] entry instead of an error, so one bad key
//! never costs the caller the others.

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{
    FilingsAdapter, MacroAdapter, MarketAdapter, SnapshotFundamentalsAdapter, SourceAdapter,
    StatementKind, StatementPeriod,
};
use crate::cache::RecordCache;
use crate::config::DataConfig;
use crate::context::AnalysisScope;
use crate::error::{DataError, FetchError, Result};
use crate::key::{ProviderFamily, QueryParams, SourceKey};
use crate::record::NormalizedRecord;

/// Attempts per key: the first fetch plus one retry
const MAX_ATTEMPTS: u32 = 2;

/// The caller's composite ask: an analysis scope and the keys to resolve
///
/// Keys are canonical, so asking twice for the same thing keeps one entry;
/// insertion order is otherwise preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBundle {
    scope: AnalysisScope,
    keys: Vec<SourceKey>,
}

impl RequestBundle {
    pub fn new(scope: AnalysisScope) -> Self {
        Self {
            scope,
            keys: Vec::new(),
        }
    }

    pub fn scope(&self) -> AnalysisScope {
        self.scope
    }

    pub fn keys(&self) -> &[SourceKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Add a key; returns false when an equal key is already present
    pub fn push(&mut self, key: SourceKey) -> bool {
        if self.keys.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    /// Chainable form of [`RequestBundle::push`]
    pub fn with_key(mut self, key: SourceKey) -> Self {
        self.push(key);
        self
    }

    fn market(self, ticker: &str, params: QueryParams) -> Self {
        self.with_key(SourceKey::new(ProviderFamily::Market, ticker, params))
    }

    /// A financial statement (`income`, `balance`, `cashflow`)
    pub fn statement(self, ticker: &str, kind: StatementKind, period: StatementPeriod) -> Self {
        let params = QueryParams::new()
            .with("statement", kind.as_str())
            .with("period", period.as_str());
        self.market(ticker, params)
    }

    pub fn quote(self, ticker: &str) -> Self {
        self.market(ticker, QueryParams::new().with("statement", StatementKind::Quote.as_str()))
    }

    /// Daily closes over `range` (e.g. `1mo`, `1y`)
    pub fn history(self, ticker: &str, range: &str) -> Self {
        let params = QueryParams::new()
            .with("statement", StatementKind::History.as_str())
            .with("range", range);
        self.market(ticker, params)
    }

    pub fn overview(self, ticker: &str) -> Self {
        self.market(
            ticker,
            QueryParams::new().with("statement", StatementKind::Overview.as_str()),
        )
    }

    pub fn macro_series(self, code: &str) -> Self {
        self.with_key(SourceKey::new(ProviderFamily::Macro, code, QueryParams::new()))
    }

    /// Recent filings, optionally restricted to one form type
    pub fn filings(self, ticker: &str, form: Option<&str>) -> Self {
        let mut params = QueryParams::new();
        if let Some(form) = form {
            params.insert("form", form);
        }
        self.with_key(SourceKey::new(ProviderFamily::Filings, ticker, params))
    }

    pub fn fundamentals(self, ticker: &str) -> Self {
        self.with_key(SourceKey::new(
            ProviderFamily::Fundamentals,
            ticker,
            QueryParams::new(),
        ))
    }
}

/// How current a resolved record is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Freshness {
    /// Served from the cache; `age` is time since the provider fetch
    Cached { age: Duration },
    /// Fetched during this resolution
    Fetched { attempts: u32 },
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Freshness::Cached { age } => write!(f, "cached ({}s old)", age.as_secs()),
            Freshness::Fetched { attempts: 1 } => f.write_str("fetched"),
            Freshness::Fetched { attempts } => write!(f, "fetched after {attempts} attempts"),
        }
    }
}

/// Why a key produced no record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unavailable,
    NotFound,
}

/// A key that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub family: ProviderFamily,
    pub entity: String,
    pub params: QueryParams,
    pub kind: FailureKind,
    pub reason: String,
    pub attempts: u32,
}

impl FetchFailure {
    fn from_error(key: &SourceKey, err: &FetchError, attempts: u32) -> Self {
        let kind = match err {
            FetchError::NotFound { .. } => FailureKind::NotFound,
            _ => FailureKind::Unavailable,
        };
        Self {
            family: key.family(),
            entity: key.entity().to_string(),
            params: key.params().clone(),
            kind,
            reason: err.to_string(),
            attempts,
        }
    }

    /// Short note for the analysis context, e.g. `[macro] UNRATE unavailable.`
    ///
    /// Parameters follow the entity when present, so two failed keys for the
    /// same ticker never read the same.
    pub fn note(&self) -> String {
        let status = match self.kind {
            FailureKind::Unavailable => "unavailable",
            FailureKind::NotFound => "not found",
        };
        if self.params.is_empty() {
            format!("[{}] {} {status}.", self.family, self.entity)
        } else {
            format!("[{}] {}{{{}}} {status}.", self.family, self.entity, self.params)
        }
    }
}

/// Outcome for one key
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Record {
        record: NormalizedRecord,
        freshness: Freshness,
    },
    Failure(FetchFailure),
}

/// One entry of a [`ResultBundle`]
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedItem {
    pub key: SourceKey,
    pub outcome: Resolution,
}

impl ResolvedItem {
    pub fn record(&self) -> Option<&NormalizedRecord> {
        match &self.outcome {
            Resolution::Record { record, .. } => Some(record),
            Resolution::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FetchFailure> {
        match &self.outcome {
            Resolution::Failure(failure) => Some(failure),
            Resolution::Record { .. } => None,
        }
    }
}

/// Per-key outcomes in request order; always as long as the request
#[derive(Debug, Clone, PartialEq)]
pub struct ResultBundle {
    items: Vec<ResolvedItem>,
}

impl ResultBundle {
    pub fn new(items: Vec<ResolvedItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[ResolvedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &SourceKey) -> Option<&ResolvedItem> {
        self.items.iter().find(|item| &item.key == key)
    }

    pub fn successes(&self) -> impl Iterator<Item = (&SourceKey, &NormalizedRecord)> {
        self.items
            .iter()
            .filter_map(|item| item.record().map(|record| (&item.key, record)))
    }

    pub fn failures(&self) -> impl Iterator<Item = &FetchFailure> {
        self.items.iter().filter_map(ResolvedItem::failure)
    }
}

/// Per-key fetch state; every key leaves `Pending` exactly once
enum FetchState {
    Pending { attempts: u32 },
    Succeeded(NormalizedRecord, u32),
    Failed(FetchFailure),
}

/// Caching façade over the registered adapters
pub struct DataSourceManager {
    adapters: HashMap<ProviderFamily, Arc<dyn SourceAdapter>>,
    cache: RecordCache,
    in_flight: Semaphore,
    retry_backoff: Duration,
}

impl DataSourceManager {
    pub fn builder() -> DataSourceManagerBuilder {
        DataSourceManagerBuilder::default()
    }

    /// Build a manager with every adapter the configuration can support
    ///
    /// Market and filings need no credentials; macro needs a FRED key and
    /// fundamentals needs a snapshot path.
    pub async fn from_config(config: &DataConfig) -> Result<Self> {
        config.validate()?;

        let market = MarketAdapter::new(config)?;
        if !market.has_statements() {
            warn!("ALPHA_VANTAGE_API_KEY not set; statements and overviews are unavailable");
        }
        let mut builder = Self::builder()
            .config(config.clone())
            .adapter(Arc::new(market))
            .adapter(Arc::new(FilingsAdapter::new(config)?));

        match MacroAdapter::from_config(config)? {
            Some(adapter) => builder = builder.adapter(Arc::new(adapter)),
            None => warn!("FRED_API_KEY not set; macro series are unavailable"),
        }

        match &config.fundamentals_snapshot {
            Some(path) => {
                let adapter = SnapshotFundamentalsAdapter::from_path(path).await?;
                builder = builder.adapter(Arc::new(adapter));
            },
            None => warn!("No fundamentals snapshot configured; fundamentals are unavailable"),
        }

        let manager = builder.build();
        info!(families = ?manager.families(), "Data source manager ready");
        Ok(manager)
    }

    /// Families with a registered adapter, in display order
    pub fn families(&self) -> Vec<ProviderFamily> {
        let mut families: Vec<_> = self.adapters.keys().copied().collect();
        families.sort();
        families
    }

    /// Tickers a local index can answer for, sorted and deduplicated
    pub fn available_tickers(&self) -> Vec<String> {
        let tickers: BTreeSet<String> = self
            .adapters
            .values()
            .flat_map(|adapter| adapter.known_entities())
            .collect();
        tickers.into_iter().collect()
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    /// Drop the cached record for `key`; returns whether one existed
    pub async fn invalidate(&self, key: &SourceKey) -> bool {
        self.cache.invalidate(key).await
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Resolve every key of `request`
    ///
    /// The result has one entry per requested key, in request order. Only
    /// fatal conditions are errors: a family without an adapter (checked
    /// before anything is fetched) or an adapter reporting a fatal error.
    /// Dropping the returned future cancels fetches still in flight.
    #[instrument(skip(self, request), fields(scope = %request.scope(), keys = request.len()))]
    pub async fn resolve(&self, request: &RequestBundle) -> Result<ResultBundle> {
        if let Some(key) = request
            .keys()
            .iter()
            .find(|key| !self.adapters.contains_key(&key.family()))
        {
            return Err(DataError::NoAdapter(key.family()));
        }

        let outcomes = join_all(request.keys().iter().map(|key| self.resolve_key(key))).await;

        let items = request
            .keys()
            .iter()
            .cloned()
            .zip(outcomes)
            .map(|(key, outcome)| outcome.map(|outcome| ResolvedItem { key, outcome }))
            .collect::<Result<Vec<_>>>()?;

        let bundle = ResultBundle::new(items);
        info!(
            successes = bundle.successes().count(),
            failures = bundle.failures().count(),
            "Resolved request bundle"
        );
        Ok(bundle)
    }

    #[instrument(skip(self, key), fields(key = %key))]
    async fn resolve_key(&self, key: &SourceKey) -> Result<Resolution> {
        if let Some(record) = self.cache.get(key).await {
            let age = record.age_at(Utc::now());
            return Ok(Resolution::Record {
                record,
                freshness: Freshness::Cached { age },
            });
        }

        let adapter = self
            .adapters
            .get(&key.family())
            .ok_or(DataError::NoAdapter(key.family()))?;

        let mut state = FetchState::Pending { attempts: 0 };
        loop {
            state = match state {
                FetchState::Pending { attempts } => {
                    self.attempt(adapter.as_ref(), key, attempts + 1).await?
                },
                FetchState::Succeeded(record, attempts) => {
                    let record = self.cache.put(key.clone(), record).await;
                    return Ok(Resolution::Record {
                        record,
                        freshness: Freshness::Fetched { attempts },
                    });
                },
                FetchState::Failed(failure) => return Ok(Resolution::Failure(failure)),
            };
        }
    }

    /// One adapter call, holding an in-flight permit only while it runs
    async fn attempt(
        &self,
        adapter: &dyn SourceAdapter,
        key: &SourceKey,
        attempt: u32,
    ) -> Result<FetchState> {
        let result = {
            let _permit = self
                .in_flight
                .acquire()
                .await
                .map_err(|_| DataError::Config("fetch limiter closed".to_string()))?;
            debug!(provider = adapter.name(), attempt, "Fetching");
            adapter.fetch(key.entity(), key.params()).await
        };

        match result {
            Ok(record) => Ok(FetchState::Succeeded(record, attempt)),
            Err(FetchError::Fatal(message)) => Err(DataError::Adapter {
                key: key.to_string(),
                message,
            }),
            Err(err) if err.is_transient() && attempt < MAX_ATTEMPTS => {
                warn!(error = %err, backoff = ?self.retry_backoff, "Provider unavailable, retrying");
                tokio::time::sleep(self.retry_backoff).await;
                Ok(FetchState::Pending { attempts: attempt })
            },
            Err(err) => {
                warn!(error = %err, attempts = attempt, "Fetch failed");
                Ok(FetchState::Failed(FetchFailure::from_error(key, &err, attempt)))
            },
        }
    }
}

impl fmt::Debug for DataSourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceManager")
            .field("families", &self.families())
            .field("cache", &self.cache)
            .field("retry_backoff", &self.retry_backoff)
            .finish_non_exhaustive()
    }
}

/// Builder for [`DataSourceManager`]
#[derive(Default)]
pub struct DataSourceManagerBuilder {
    config: Option<DataConfig>,
    cache: Option<RecordCache>,
    adapters: HashMap<ProviderFamily, Arc<dyn SourceAdapter>>,
}

impl DataSourceManagerBuilder {
    /// Use `config` for concurrency, retry and cache sizing
    pub fn config(mut self, config: DataConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Share an existing cache instead of creating one
    pub fn cache(mut self, cache: RecordCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Register an adapter for its family, replacing any earlier one
    pub fn adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.insert(adapter.family(), adapter);
        self
    }

    pub fn build(self) -> DataSourceManager {
        let config = self.config.unwrap_or_default();
        let cache = self
            .cache
            .unwrap_or_else(|| RecordCache::new(config.cache_ttl, config.cache_capacity));

        DataSourceManager {
            adapters: self.adapters,
            cache,
            in_flight: Semaphore::new(config.max_in_flight.max(1)),
            retry_backoff: config.retry_backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockSourceAdapter;

    fn fast_config() -> DataConfig {
        DataConfig::builder()
            .retry_backoff(Duration::from_millis(1))
            .build()
            .unwrap()
    }

    fn record(family: ProviderFamily, entity: &str) -> NormalizedRecord {
        NormalizedRecord::builder(family, "mock", entity)
            .number("value", Some(1.0))
            .build()
    }

    fn mock(family: ProviderFamily) -> MockSourceAdapter {
        let mut adapter = MockSourceAdapter::new();
        adapter.expect_family().return_const(family);
        adapter.expect_name().return_const("mock");
        adapter
    }

    fn manager(adapters: Vec<MockSourceAdapter>) -> DataSourceManager {
        adapters
            .into_iter()
            .fold(DataSourceManager::builder().config(fast_config()), |builder, adapter| {
                builder.adapter(Arc::new(adapter))
            })
            .build()
    }

    #[test]
    fn test_request_bundle_dedups() {
        let request = RequestBundle::new(AnalysisScope::Company)
            .statement("aapl", StatementKind::Income, StatementPeriod::Annual)
            .macro_series("UNRATE")
            .statement(" AAPL ", StatementKind::Income, StatementPeriod::Annual)
            .macro_series("unrate");

        assert_eq!(request.len(), 2);
        assert_eq!(request.keys()[0].family(), ProviderFamily::Market);
        assert_eq!(request.keys()[1].entity(), "UNRATE");
    }

    #[test]
    fn test_failure_note() {
        let key = SourceKey::new(ProviderFamily::Macro, "UNRATE", QueryParams::new());
        let failure = FetchFailure::from_error(&key, &FetchError::unavailable("fred", "HTTP 503"), 2);
        assert_eq!(failure.note(), "[macro] UNRATE unavailable.");

        let failure = FetchFailure::from_error(&key, &FetchError::not_found("fred", "UNRATE"), 1);
        assert_eq!(failure.kind, FailureKind::NotFound);
        assert_eq!(failure.note(), "[macro] UNRATE not found.");
    }

    #[test]
    fn test_failure_note_names_params() {
        let income = RequestBundle::new(AnalysisScope::Company)
            .statement("AAPL", StatementKind::Income, StatementPeriod::Annual);
        let balance = RequestBundle::new(AnalysisScope::Company)
            .statement("AAPL", StatementKind::Balance, StatementPeriod::Annual);
        let err = FetchError::unavailable("alpha_vantage", "HTTP 503");

        let income = FetchFailure::from_error(&income.keys()[0], &err, 2).note();
        let balance = FetchFailure::from_error(&balance.keys()[0], &err, 2).note();
        assert_eq!(income, "[market] AAPL{period=annual,statement=income} unavailable.");
        assert_ne!(income, balance);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_adapter() {
        let mut adapter = mock(ProviderFamily::Macro);
        adapter
            .expect_fetch()
            .times(1)
            .returning(|entity, _| Ok(record(ProviderFamily::Macro, entity)));
        let manager = manager(vec![adapter]);
        let request = RequestBundle::new(AnalysisScope::Macro).macro_series("UNRATE");

        let first = manager.resolve(&request).await.unwrap();
        let second = manager.resolve(&request).await.unwrap();

        assert!(matches!(
            first.items()[0].outcome,
            Resolution::Record { freshness: Freshness::Fetched { attempts: 1 }, .. }
        ));
        assert!(matches!(
            second.items()[0].outcome,
            Resolution::Record { freshness: Freshness::Cached { .. }, .. }
        ));
        assert_eq!(first.items()[0].record(), second.items()[0].record());
    }

    #[tokio::test]
    async fn test_unavailable_retried_once() {
        let mut adapter = mock(ProviderFamily::Macro);
        adapter
            .expect_fetch()
            .times(2)
            .returning(|_, _| Err(FetchError::unavailable("fred", "HTTP 503")));
        let manager = manager(vec![adapter]);

        let bundle = manager
            .resolve(&RequestBundle::new(AnalysisScope::Macro).macro_series("UNRATE"))
            .await
            .unwrap();

        let failure = bundle.items()[0].failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Unavailable);
        assert_eq!(failure.attempts, 2);
        assert!(manager.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_retry_can_succeed() {
        let mut adapter = mock(ProviderFamily::Macro);
        let mut seq = mockall::Sequence::new();
        adapter
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(FetchError::unavailable("fred", "timeout")));
        adapter
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|entity, _| Ok(record(ProviderFamily::Macro, entity)));
        let manager = manager(vec![adapter]);

        let bundle = manager
            .resolve(&RequestBundle::new(AnalysisScope::Macro).macro_series("UNRATE"))
            .await
            .unwrap();

        assert!(matches!(
            bundle.items()[0].outcome,
            Resolution::Record { freshness: Freshness::Fetched { attempts: 2 }, .. }
        ));
    }

    #[tokio::test]
    async fn test_not_found_not_retried() {
        let mut adapter = mock(ProviderFamily::Filings);
        adapter
            .expect_fetch()
            .times(1)
            .returning(|entity, _| Err(FetchError::not_found("sec_edgar", entity)));
        let manager = manager(vec![adapter]);

        let bundle = manager
            .resolve(&RequestBundle::new(AnalysisScope::Filings).filings("ZZZZ", None))
            .await
            .unwrap();

        let failure = bundle.items()[0].failure().unwrap();
        assert_eq!(failure.kind, FailureKind::NotFound);
        assert_eq!(failure.attempts, 1);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_order() {
        let mut market = mock(ProviderFamily::Market);
        market
            .expect_fetch()
            .returning(|entity, _| Ok(record(ProviderFamily::Market, entity)));
        let mut macro_adapter = mock(ProviderFamily::Macro);
        macro_adapter
            .expect_fetch()
            .returning(|_, _| Err(FetchError::unavailable("fred", "HTTP 429")));
        let manager = manager(vec![market, macro_adapter]);

        let request = RequestBundle::new(AnalysisScope::Company)
            .macro_series("UNRATE")
            .quote("AAPL");
        let bundle = manager.resolve(&request).await.unwrap();

        assert_eq!(bundle.len(), request.len());
        assert!(bundle.items()[0].failure().is_some());
        assert_eq!(bundle.items()[1].record().unwrap().entity(), "AAPL");
        assert_eq!(bundle.successes().count(), 1);
    }

    #[tokio::test]
    async fn test_missing_adapter_is_fatal_before_fetching() {
        let mut market = mock(ProviderFamily::Market);
        market.expect_fetch().never();
        let manager = manager(vec![market]);

        let request = RequestBundle::new(AnalysisScope::Company)
            .quote("AAPL")
            .fundamentals("AAPL");
        let err = manager.resolve(&request).await.unwrap_err();
        assert!(matches!(err, DataError::NoAdapter(ProviderFamily::Fundamentals)));
    }

    #[tokio::test]
    async fn test_fatal_adapter_error_propagates() {
        let mut market = mock(ProviderFamily::Market);
        market
            .expect_fetch()
            .times(1)
            .returning(|_, _| Err(FetchError::fatal("market request is missing parameter 'statement'")));
        let manager = manager(vec![market]);

        let request = RequestBundle::new(AnalysisScope::Company).with_key(SourceKey::new(
            ProviderFamily::Market,
            "AAPL",
            QueryParams::new(),
        ));
        let err = manager.resolve(&request).await.unwrap_err();
        assert!(matches!(err, DataError::Adapter { .. }));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let mut adapter = mock(ProviderFamily::Macro);
        adapter
            .expect_fetch()
            .times(2)
            .returning(|entity, _| Ok(record(ProviderFamily::Macro, entity)));
        let manager = manager(vec![adapter]);
        let request = RequestBundle::new(AnalysisScope::Macro).macro_series("UNRATE");

        manager.resolve(&request).await.unwrap();
        assert!(manager.invalidate(&request.keys()[0]).await);
        manager.resolve(&request).await.unwrap();
    }

    #[tokio::test]
    async fn test_later_adapter_replaces_earlier() {
        let mut first = mock(ProviderFamily::Macro);
        first.expect_fetch().never();
        let mut second = mock(ProviderFamily::Macro);
        second
            .expect_fetch()
            .times(1)
            .returning(|entity, _| Ok(record(ProviderFamily::Macro, entity)));
        let manager = manager(vec![first, second]);

        assert_eq!(manager.families(), vec![ProviderFamily::Macro]);
        let bundle = manager
            .resolve(&RequestBundle::new(AnalysisScope::Macro).macro_series("GDP"))
            .await
            .unwrap();
        assert_eq!(bundle.successes().count(), 1);
    }

    #[test]
    fn test_available_tickers_from_indexed_adapters() {
        let mut market = mock(ProviderFamily::Market);
        market.expect_known_entities().returning(Vec::new);
        let mut snapshot = mock(ProviderFamily::Fundamentals);
        snapshot
            .expect_known_entities()
            .returning(|| vec!["MSFT".to_string(), "AAPL".to_string(), "MSFT".to_string()]);

        let manager = manager(vec![market, snapshot]);
        assert_eq!(manager.available_tickers(), vec!["AAPL", "MSFT"]);
    }

    #[tokio::test]
    async fn test_empty_request() {
        let manager = manager(vec![]);
        let bundle = manager
            .resolve(&RequestBundle::new(AnalysisScope::Company))
            .await
            .unwrap();
        assert!(bundle.is_empty());
    }
}
