//! Command-line interface for finq-rs
//!
//! Resolves a request bundle described by flags, prints a summary of what
//! came back and the bounded context (or the full analysis input).

use anyhow::{Context as _, bail};
use clap::Parser;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use finq_data::{
    AnalysisInput, AnalysisScope, ContextBuilder, DataConfig, DataSourceManager, RequestBundle,
    Resolution, ResultBundle, SizeBudget, StatementKind, StatementPeriod,
};
use finq_utils::LogFormat;
use tracing::info;

const DEFAULT_BUDGET_TOKENS: usize = 2_000;

#[derive(Parser, Debug)]
#[command(name = "finq")]
#[command(about = "Gather financial evidence and assemble a bounded analysis context", long_about = None)]
struct Args {
    /// Financial statement as TICKER:KIND[:PERIOD], e.g. AAPL:income:annual
    #[arg(long = "statement", value_name = "TICKER:KIND")]
    statements: Vec<String>,

    /// Latest quote for a ticker
    #[arg(long = "quote", value_name = "TICKER")]
    quotes: Vec<String>,

    /// Price history as TICKER[:RANGE], e.g. AAPL:6mo
    #[arg(long = "history", value_name = "TICKER:RANGE")]
    history: Vec<String>,

    /// Company overview for a ticker
    #[arg(long = "overview", value_name = "TICKER")]
    overviews: Vec<String>,

    /// FRED series code, e.g. UNRATE
    #[arg(long = "macro", value_name = "SERIES")]
    macro_series: Vec<String>,

    /// Recent filings as TICKER[:FORM], e.g. AAPL:10-K
    #[arg(long = "filings", value_name = "TICKER:FORM")]
    filings: Vec<String>,

    /// Fundamentals snapshot entry for a ticker
    #[arg(long = "fundamentals", value_name = "TICKER")]
    fundamentals: Vec<String>,

    /// Analysis scope: company, macro, filings or fundamentals
    #[arg(long, default_value = "company")]
    scope: AnalysisScope,

    /// Context budget in characters
    #[arg(long, conflicts_with = "budget_tokens")]
    budget_chars: Option<usize>,

    /// Context budget in estimated tokens (default 2000)
    #[arg(long)]
    budget_tokens: Option<usize>,

    /// Question to package with the context; prints the full analysis input
    #[arg(long)]
    prompt: Option<String>,

    /// Print the analysis input as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Log format: pretty or json (falls back to FINQ_LOG_FORMAT)
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Args {
    fn budget(&self) -> SizeBudget {
        match (self.budget_chars, self.budget_tokens) {
            (Some(chars), _) => SizeBudget::Chars(chars),
            (None, Some(tokens)) => SizeBudget::Tokens(tokens),
            (None, None) => SizeBudget::Tokens(DEFAULT_BUDGET_TOKENS),
        }
    }

    fn request(&self) -> anyhow::Result<RequestBundle> {
        let mut request = RequestBundle::new(self.scope);

        for arg in &self.statements {
            let (ticker, kind, period) = parse_statement(arg)?;
            request = match kind {
                StatementKind::Quote => request.quote(ticker),
                StatementKind::History => request.history(ticker, "1mo"),
                StatementKind::Overview => request.overview(ticker),
                _ => request.statement(ticker, kind, period),
            };
        }
        for ticker in &self.quotes {
            request = request.quote(ticker);
        }
        for arg in &self.history {
            let (ticker, range) = split_arg(arg);
            request = request.history(ticker, range.unwrap_or("1mo"));
        }
        for ticker in &self.overviews {
            request = request.overview(ticker);
        }
        for code in &self.macro_series {
            request = request.macro_series(code);
        }
        for arg in &self.filings {
            let (ticker, form) = split_arg(arg);
            request = request.filings(ticker, form);
        }
        for ticker in &self.fundamentals {
            request = request.fundamentals(ticker);
        }

        if request.is_empty() {
            bail!(
                "nothing to resolve; pass at least one of --statement, --quote, --history, \
                 --overview, --macro, --filings or --fundamentals"
            );
        }
        Ok(request)
    }
}

/// `TICKER[:REST]`
fn split_arg(arg: &str) -> (&str, Option<&str>) {
    match arg.split_once(':') {
        Some((ticker, rest)) if !rest.trim().is_empty() => (ticker, Some(rest.trim())),
        Some((ticker, _)) => (ticker, None),
        None => (arg, None),
    }
}

/// `TICKER:KIND[:PERIOD]`
fn parse_statement(arg: &str) -> anyhow::Result<(&str, StatementKind, StatementPeriod)> {
    let mut parts = arg.split(':');
    let ticker = parts.next().unwrap_or_default();
    let (Some(kind), period) = (parts.next(), parts.next()) else {
        bail!("statement '{arg}' must look like TICKER:KIND[:PERIOD]");
    };
    if ticker.trim().is_empty() {
        bail!("statement '{arg}' is missing a ticker");
    }

    let kind = kind.parse::<StatementKind>().map_err(anyhow::Error::msg)?;
    let period = match period {
        Some(p) => p.parse::<StatementPeriod>().map_err(anyhow::Error::msg)?,
        None => StatementPeriod::default(),
    };
    Ok((ticker, kind, period))
}

fn summary_table(bundle: &ResultBundle) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Key", "Provider", "Status", "Detail"]);

    for item in bundle.items() {
        match &item.outcome {
            Resolution::Record { record, freshness } => table.add_row(vec![
                item.key.to_string(),
                record.provider().to_string(),
                "ok".to_string(),
                freshness.to_string(),
            ]),
            Resolution::Failure(failure) => table.add_row(vec![
                item.key.to_string(),
                "-".to_string(),
                failure.note(),
                failure.reason.clone(),
            ]),
        };
    }
    table
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_format = match args.log_format {
        Some(format) => format,
        None => finq_utils::env_var("FINQ_LOG_FORMAT")
            .map(|raw| raw.parse::<LogFormat>())
            .transpose()
            .map_err(anyhow::Error::msg)?
            .unwrap_or_default(),
    };
    finq_utils::init_tracing_with(log_format);

    let request = args.request()?;
    let environment = finq_utils::Environment::from_env()?;
    let config = DataConfig::from_env().context("invalid configuration")?;
    info!(
        ?environment,
        keys = request.len(),
        scope = %request.scope(),
        "Starting finq"
    );

    let manager = DataSourceManager::from_config(&config).await?;
    let bundle = manager.resolve(&request).await?;

    let context = ContextBuilder::new(config.max_series_points).build(
        &bundle,
        request.scope(),
        args.budget(),
    );
    info!(
        size = context.size(),
        budget = %context.budget(),
        omitted = context.omitted().len(),
        "Context assembled"
    );

    println!("{}", summary_table(&bundle));

    match &args.prompt {
        Some(question) => {
            let input = AnalysisInput::new(question.as_str(), context)
                .with_available_companies(manager.available_tickers());
            if args.json {
                println!("{}", serde_json::to_string_pretty(&input)?);
            } else {
                println!("\n=== System ===\n{}", input.system_prompt());
                println!("\n=== User ===\n{}", input.user_prompt());
            }
        },
        None if args.json => println!("{}", serde_json::to_string_pretty(&context)?),
        None => println!("\n{}", context.render()),
    }

    Ok(())
}
