//! Financial data access and analysis context assembly
//!
//! This crate puts several heterogeneous financial data providers behind one
//! caching façade and packages what they return into a bounded, reproducible
//! context for a single AI analysis call. It includes:
//!
//! - Source adapters for market data (Yahoo Finance, Alpha Vantage), macro
//!   series (FRED), filings metadata (SEC EDGAR) and a precomputed
//!   fundamentals snapshot
//! - A time-boxed record cache with per-key invalidation
//! - A resolver that fans out cache misses concurrently, retries transient
//!   failures once and tolerates partial failure
//! - A context builder that orders evidence by analysis scope and honors a
//!   size budget
//!
//! The crate performs no analysis itself; [`AnalysisInput`] is as far as it
//! goes.
//!
//! # Example
//!
//! ```rust,ignore
//! use finq_data::{
//!     AnalysisInput, AnalysisScope, ContextBuilder, DataConfig, DataSourceManager,
//!     RequestBundle, SizeBudget, StatementKind, StatementPeriod,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DataConfig::from_env()?;
//!     let manager = DataSourceManager::from_config(&config).await?;
//!
//!     let request = RequestBundle::new(AnalysisScope::Company)
//!         .statement("AAPL", StatementKind::Income, StatementPeriod::Annual)
//!         .macro_series("UNRATE");
//!     let bundle = manager.resolve(&request).await?;
//!
//!     let context = ContextBuilder::new(config.max_series_points)
//!         .build(&bundle, request.scope(), SizeBudget::Tokens(2_000));
//!     let input = AnalysisInput::new("How exposed is Apple to a slowdown?", context);
//!     println!("{}", input.user_prompt());
//!
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod analysis;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod key;
pub mod manager;
pub mod record;

// Re-export main types for convenience
pub use adapters::{
    FilingsAdapter, FundamentalsSnapshot, MacroAdapter, MarketAdapter, SnapshotFundamentalsAdapter,
    SourceAdapter, StatementKind, StatementPeriod,
};
pub use analysis::{AnalysisEngine, AnalysisInput};
pub use cache::{CacheStats, RecordCache};
pub use config::{DataConfig, RateLimits};
pub use context::{AnalysisScope, Context, ContextBuilder, ContextFragment, SizeBudget};
pub use error::{DataError, FetchError, Result};
pub use key::{ProviderFamily, QueryParams, SourceKey};
pub use manager::{
    DataSourceManager, FailureKind, FetchFailure, Freshness, RequestBundle, Resolution,
    ResolvedItem, ResultBundle,
};
pub use record::{FieldValue, NormalizedRecord, Point};
