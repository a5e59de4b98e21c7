//! End-to-end resolution scenarios with counting fake adapters

use async_trait::async_trait;
use finq_data::{
    AnalysisInput, AnalysisScope, ContextBuilder, DataConfig, DataSourceManager, FailureKind,
    FetchError, Freshness, NormalizedRecord, ProviderFamily, QueryParams, RecordCache,
    RequestBundle, Resolution, SizeBudget, SourceAdapter, SourceKey, StatementKind,
    StatementPeriod,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Succeed,
    Unavailable,
    NotFound,
}

/// Adapter that counts calls and tracks how many run at once
struct CountingAdapter {
    family: ProviderFamily,
    behavior: Behavior,
    delay: Duration,
    calls: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingAdapter {
    fn new(family: ProviderFamily, behavior: Behavior) -> Arc<Self> {
        Self::with_delay(family, behavior, Duration::ZERO)
    }

    fn with_delay(family: ProviderFamily, behavior: Behavior, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            family,
            behavior,
            delay,
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for CountingAdapter {
    fn family(&self) -> ProviderFamily {
        self.family
    }

    fn name(&self) -> &'static str {
        "counting"
    }

    async fn fetch(
        &self,
        entity: &str,
        params: &QueryParams,
    ) -> Result<NormalizedRecord, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        match self.behavior {
            Behavior::Succeed => Ok(NormalizedRecord::builder(self.family, "counting", entity)
                .number("latest_value", Some(4.3))
                .text("statement", params.get("statement"))
                .build()),
            Behavior::Unavailable => Err(FetchError::unavailable("counting", "HTTP 503")),
            Behavior::NotFound => Err(FetchError::not_found("counting", entity)),
        }
    }
}

fn config() -> DataConfig {
    DataConfig::builder()
        .retry_backoff(Duration::from_millis(1))
        .cache_ttl(Duration::from_secs(300))
        .build()
        .unwrap()
}

fn manager(adapters: &[Arc<CountingAdapter>]) -> DataSourceManager {
    adapters
        .iter()
        .fold(DataSourceManager::builder().config(config()), |builder, adapter| {
            builder.adapter(adapter.clone())
        })
        .build()
}

fn company_request() -> RequestBundle {
    RequestBundle::new(AnalysisScope::Company)
        .statement("AAPL", StatementKind::Income, StatementPeriod::Annual)
        .macro_series("UNRATE")
}

fn fragment_entities(bundle: &finq_data::ResultBundle, scope: AnalysisScope) -> Vec<String> {
    ContextBuilder::default()
        .build(bundle, scope, SizeBudget::Chars(10_000))
        .fragments()
        .iter()
        .map(|f| f.key.entity().to_string())
        .collect()
}

#[tokio::test]
async fn both_succeed_and_scope_decides_order() {
    let market = CountingAdapter::new(ProviderFamily::Market, Behavior::Succeed);
    let fred = CountingAdapter::new(ProviderFamily::Macro, Behavior::Succeed);
    let manager = manager(&[market.clone(), fred.clone()]);

    let bundle = manager.resolve(&company_request()).await.unwrap();

    assert_eq!(bundle.len(), 2);
    assert_eq!(bundle.successes().count(), 2);
    assert_eq!(fragment_entities(&bundle, AnalysisScope::Company), vec!["AAPL", "UNRATE"]);
    assert_eq!(fragment_entities(&bundle, AnalysisScope::Macro), vec!["UNRATE", "AAPL"]);
}

#[tokio::test]
async fn macro_unavailable_after_retry_degrades_to_note() {
    let market = CountingAdapter::new(ProviderFamily::Market, Behavior::Succeed);
    let fred = CountingAdapter::new(ProviderFamily::Macro, Behavior::Unavailable);
    let manager = manager(&[market.clone(), fred.clone()]);

    let bundle = manager.resolve(&company_request()).await.unwrap();

    assert_eq!(bundle.len(), 2);
    assert_eq!(bundle.successes().count(), 1);
    let failure = bundle.failures().next().unwrap();
    assert_eq!(failure.kind, FailureKind::Unavailable);
    assert_eq!(fred.calls(), 2);
    assert_eq!(market.calls(), 1);

    let context =
        ContextBuilder::default().build(&bundle, AnalysisScope::Company, SizeBudget::Tokens(1_000));
    let rendered = context.render();
    assert!(rendered.contains("market:AAPL"));
    assert!(rendered.contains("UNRATE unavailable."));

    let input = AnalysisInput::new("How is Apple doing?", context);
    assert!(input.user_prompt().contains("UNRATE unavailable."));
}

#[tokio::test]
async fn repeat_within_ttl_makes_no_adapter_calls() {
    let market = CountingAdapter::new(ProviderFamily::Market, Behavior::Succeed);
    let fred = CountingAdapter::new(ProviderFamily::Macro, Behavior::Succeed);
    let manager = manager(&[market.clone(), fred.clone()]);
    let builder = ContextBuilder::default();
    let budget = SizeBudget::Chars(2_000);

    let first = manager.resolve(&company_request()).await.unwrap();
    let second = manager.resolve(&company_request()).await.unwrap();

    assert_eq!(market.calls(), 1);
    assert_eq!(fred.calls(), 1);
    assert!(second.items().iter().all(|item| matches!(
        item.outcome,
        Resolution::Record { freshness: Freshness::Cached { .. }, .. }
    )));
    assert_eq!(
        builder.build(&first, AnalysisScope::Company, budget).render(),
        builder.build(&second, AnalysisScope::Company, budget).render()
    );
}

#[tokio::test]
async fn bundle_length_matches_request() {
    let market = CountingAdapter::new(ProviderFamily::Market, Behavior::Succeed);
    let fred = CountingAdapter::new(ProviderFamily::Macro, Behavior::NotFound);
    let sec = CountingAdapter::new(ProviderFamily::Filings, Behavior::Unavailable);
    let manager = manager(&[market, fred.clone(), sec]);

    let request = RequestBundle::new(AnalysisScope::Filings)
        .quote("AAPL")
        .quote("aapl")
        .macro_series("NOPE")
        .filings("AAPL", Some("10-K"))
        .history("MSFT", "6mo");

    let bundle = manager.resolve(&request).await.unwrap();

    assert_eq!(request.len(), 4);
    assert_eq!(bundle.len(), request.len());
    for (item, key) in bundle.items().iter().zip(request.keys()) {
        assert_eq!(&item.key, key);
    }
    // not found is never retried
    assert_eq!(fred.calls(), 1);
}

#[tokio::test]
async fn unavailable_key_does_not_block_others() {
    let slow_fail = CountingAdapter::with_delay(
        ProviderFamily::Macro,
        Behavior::Unavailable,
        Duration::from_millis(20),
    );
    let market = CountingAdapter::new(ProviderFamily::Market, Behavior::Succeed);
    let manager = manager(&[slow_fail, market]);

    let request = RequestBundle::new(AnalysisScope::Company)
        .macro_series("UNRATE")
        .quote("AAPL");
    let bundle = manager.resolve(&request).await.unwrap();

    let quote = bundle.get(&request.keys()[1]).unwrap();
    assert!(quote.record().is_some());
}

#[tokio::test]
async fn in_flight_fetches_are_bounded() {
    let market = CountingAdapter::with_delay(
        ProviderFamily::Market,
        Behavior::Succeed,
        Duration::from_millis(10),
    );
    let manager = DataSourceManager::builder()
        .config(DataConfig::builder().max_in_flight(2).build().unwrap())
        .adapter(market.clone())
        .build();

    let request = ["AAPL", "MSFT", "NVDA", "AMZN", "GOOG", "META"]
        .iter()
        .fold(RequestBundle::new(AnalysisScope::Company), |request, ticker| {
            request.quote(ticker)
        });
    let bundle = manager.resolve(&request).await.unwrap();

    assert_eq!(bundle.successes().count(), 6);
    assert!(market.peak() <= 2);
}

#[tokio::test]
async fn dropping_resolve_cancels_pending_fetches() {
    let fast = CountingAdapter::new(ProviderFamily::Market, Behavior::Succeed);
    let slow = CountingAdapter::with_delay(
        ProviderFamily::Macro,
        Behavior::Succeed,
        Duration::from_secs(30),
    );
    let cache = RecordCache::new(Duration::from_secs(300), 16);
    let manager = DataSourceManager::builder()
        .config(config())
        .cache(cache.clone())
        .adapter(fast)
        .adapter(slow)
        .build();

    let request = company_request();
    let result = tokio::time::timeout(Duration::from_millis(50), manager.resolve(&request)).await;
    assert!(result.is_err());

    // the completed fetch was cached before the cancellation
    assert!(cache.get(&request.keys()[0]).await.is_some());
    assert!(cache.get(&request.keys()[1]).await.is_none());
}

#[tokio::test]
async fn shared_cache_serves_second_manager() {
    let cache = RecordCache::default();
    let first = CountingAdapter::new(ProviderFamily::Macro, Behavior::Succeed);
    let second = CountingAdapter::new(ProviderFamily::Macro, Behavior::Succeed);

    let request = RequestBundle::new(AnalysisScope::Macro).macro_series("UNRATE");
    for adapter in [&first, &second] {
        let manager = DataSourceManager::builder()
            .cache(cache.clone())
            .adapter(adapter.clone())
            .build();
        manager.resolve(&request).await.unwrap();
    }

    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 0);
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn request_keys_are_canonical() {
    let key = SourceKey::new(
        ProviderFamily::Market,
        " aapl ",
        QueryParams::new().with("Statement", "income").with("period", "annual"),
    );
    let request = RequestBundle::new(AnalysisScope::Company).statement(
        "AAPL",
        StatementKind::Income,
        StatementPeriod::Annual,
    );
    assert_eq!(request.keys(), &[key]);
}

#[test]
fn resolve_runs_on_a_plain_executor() {
    let market = CountingAdapter::new(ProviderFamily::Market, Behavior::Succeed);
    let manager = manager(&[market.clone()]);
    let request = RequestBundle::new(AnalysisScope::Company).overview("AAPL");

    let bundle = tokio_test::block_on(manager.resolve(&request)).unwrap();
    assert_eq!(bundle.len(), 1);
    assert_eq!(market.calls(), 1);
}
