//! Market and company data adapter
//!
//! Quotes and price history come from Yahoo Finance (no key required);
//! financial statements and the company overview come from Alpha Vantage.
//!
//! Query parameters:
//! - `statement`: `quote`, `history`, `income`, `balance`, `cashflow` or `overview` (required)
//! - `period`: `annual` (default) or `quarterly`, for statements
//! - `periods`: number of reporting periods per line item (default 4)
//! - `range`: history window such as `1mo`, `6mo`, `1y` (default `1mo`)

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

use super::{
    SharedRateLimiter, SourceAdapter, http_client, parse_date, parse_number, per_minute,
    required, usize_param,
};
use crate::config::DataConfig;
use crate::error::{DataError, FetchError};
use crate::key::{ProviderFamily, QueryParams};
use crate::record::{NormalizedRecord, Point, RecordBuilder};

const ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co/query";

const YAHOO: &str = "yahoo";
const ALPHA_VANTAGE: &str = "alpha_vantage";

/// Which slice of market data a key asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Quote,
    History,
    Income,
    Balance,
    CashFlow,
    Overview,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Quote => "quote",
            StatementKind::History => "history",
            StatementKind::Income => "income",
            StatementKind::Balance => "balance",
            StatementKind::CashFlow => "cashflow",
            StatementKind::Overview => "overview",
        }
    }

    fn alpha_vantage_function(&self) -> Option<&'static str> {
        match self {
            StatementKind::Income => Some("INCOME_STATEMENT"),
            StatementKind::Balance => Some("BALANCE_SHEET"),
            StatementKind::CashFlow => Some("CASH_FLOW"),
            StatementKind::Overview => Some("OVERVIEW"),
            StatementKind::Quote | StatementKind::History => None,
        }
    }

    /// Canonical line items as (field name, Alpha Vantage report key)
    fn line_items(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            StatementKind::Income => &[
                ("total_revenue", "totalRevenue"),
                ("gross_profit", "grossProfit"),
                ("operating_income", "operatingIncome"),
                ("net_income", "netIncome"),
                ("ebitda", "ebitda"),
                ("research_and_development", "researchAndDevelopment"),
                ("interest_expense", "interestExpense"),
            ],
            StatementKind::Balance => &[
                ("total_assets", "totalAssets"),
                ("total_liabilities", "totalLiabilities"),
                ("shareholder_equity", "totalShareholderEquity"),
                ("cash_and_equivalents", "cashAndCashEquivalentsAtCarryingValue"),
                ("current_assets", "totalCurrentAssets"),
                ("current_liabilities", "totalCurrentLiabilities"),
                ("long_term_debt", "longTermDebt"),
                ("shares_outstanding", "commonStockSharesOutstanding"),
            ],
            StatementKind::CashFlow => &[
                ("operating_cash_flow", "operatingCashflow"),
                ("capital_expenditures", "capitalExpenditures"),
                ("dividend_payout", "dividendPayout"),
                ("net_income", "netIncome"),
            ],
            _ => &[],
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quote" => Ok(Self::Quote),
            "history" | "price" => Ok(Self::History),
            "income" | "income_statement" | "income-statement" => Ok(Self::Income),
            "balance" | "balance_sheet" | "balance-sheet" => Ok(Self::Balance),
            "cashflow" | "cash_flow" | "cash-flow" => Ok(Self::CashFlow),
            "overview" => Ok(Self::Overview),
            other => Err(format!("unknown market statement: {other}")),
        }
    }
}

/// Reporting period of a statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatementPeriod {
    #[default]
    Annual,
    Quarterly,
}

impl StatementPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementPeriod::Annual => "annual",
            StatementPeriod::Quarterly => "quarterly",
        }
    }

    fn reports_key(&self) -> &'static str {
        match self {
            StatementPeriod::Annual => "annualReports",
            StatementPeriod::Quarterly => "quarterlyReports",
        }
    }
}

impl FromStr for StatementPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "annual" | "yearly" => Ok(Self::Annual),
            "quarterly" | "quarter" => Ok(Self::Quarterly),
            other => Err(format!("unknown statement period: {other}")),
        }
    }
}

/// Alpha Vantage transport
struct AlphaVantage {
    client: Client,
    api_key: String,
    rate_limiter: SharedRateLimiter,
}

impl AlphaVantage {
    async fn query(&self, function: &str, symbol: &str) -> Result<Value, FetchError> {
        // Wait for rate limiter
        self.rate_limiter.until_ready().await;

        let params = [
            ("function", function),
            ("symbol", symbol),
            ("apikey", self.api_key.as_str()),
        ];
        let response = self.client.get(ALPHA_VANTAGE_URL).query(&params).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::from_status(ALPHA_VANTAGE, symbol, response.status()));
        }

        let data: Value = response.json().await?;
        check_alpha_vantage_payload(symbol, &data)?;
        Ok(data)
    }
}

/// Adapter for the market family
pub struct MarketAdapter {
    alpha_vantage: Option<AlphaVantage>,
}

impl MarketAdapter {
    /// Build from configuration; statements are unavailable without an
    /// Alpha Vantage key
    pub fn new(config: &DataConfig) -> Result<Self, DataError> {
        let alpha_vantage = match &config.alpha_vantage_api_key {
            Some(key) => Some(AlphaVantage {
                client: http_client(config.request_timeout, None)?,
                api_key: key.clone(),
                rate_limiter: per_minute(config.rate_limits.alpha_vantage_per_minute),
            }),
            None => None,
        };
        Ok(Self { alpha_vantage })
    }

    pub fn has_statements(&self) -> bool {
        self.alpha_vantage.is_some()
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<NormalizedRecord, FetchError> {
        let provider = yahoo::YahooConnector::new().map_err(|e| map_yahoo_error(symbol, &e))?;

        let response = provider
            .get_latest_quotes(symbol, "1d")
            .await
            .map_err(|e| map_yahoo_error(symbol, &e))?;

        let quote = response
            .last_quote()
            .map_err(|e| map_yahoo_error(symbol, &e))?;

        let as_of = DateTime::from_timestamp(quote.timestamp as i64, 0)
            .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true));

        Ok(market_builder(YAHOO, symbol)
            .text("statement", Some(StatementKind::Quote.as_str()))
            .number("open", Some(quote.open))
            .number("high", Some(quote.high))
            .number("low", Some(quote.low))
            .number("close", Some(quote.close))
            .number("adjusted_close", Some(quote.adjclose))
            .integer("volume", i64::try_from(quote.volume).ok())
            .text("as_of", as_of)
            .build())
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        range: &str,
    ) -> Result<NormalizedRecord, FetchError> {
        let end = Utc::now();
        let start = range_start(range, end).map_err(FetchError::Fatal)?;

        // Convert chrono DateTime to time OffsetDateTime
        let start_odt = OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| FetchError::fatal(format!("invalid start timestamp: {e}")))?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| FetchError::fatal(format!("invalid end timestamp: {e}")))?;

        let provider = yahoo::YahooConnector::new().map_err(|e| map_yahoo_error(symbol, &e))?;
        let response = provider
            .get_quote_history(symbol, start_odt, end_odt)
            .await
            .map_err(|e| map_yahoo_error(symbol, &e))?;
        let quotes = response.quotes().map_err(|e| map_yahoo_error(symbol, &e))?;

        let closes = quotes
            .iter()
            .filter_map(|q| {
                DateTime::from_timestamp(q.timestamp as i64, 0)
                    .map(|t| Point::new(t.date_naive(), Some(q.close)))
            })
            .collect();

        history_record(symbol, range, closes)
    }

    async fn fetch_alpha_vantage(
        &self,
        symbol: &str,
        kind: StatementKind,
        params: &QueryParams,
    ) -> Result<NormalizedRecord, FetchError> {
        let client = self.alpha_vantage.as_ref().ok_or_else(|| {
            FetchError::fatal(format!(
                "market statement '{kind}' requires an Alpha Vantage API key"
            ))
        })?;
        let function = kind
            .alpha_vantage_function()
            .ok_or_else(|| FetchError::fatal(format!("'{kind}' is not an Alpha Vantage statement")))?;

        let data = client.query(function, symbol).await?;

        if kind == StatementKind::Overview {
            return Ok(overview_record(symbol, &data));
        }

        let period = match params.get("period") {
            Some(raw) => raw.parse::<StatementPeriod>().map_err(FetchError::Fatal)?,
            None => StatementPeriod::default(),
        };
        let periods = usize_param(params, "periods", 4)?;
        statement_record(symbol, kind, period, periods, &data)
    }
}

#[async_trait]
impl SourceAdapter for MarketAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Market
    }

    fn name(&self) -> &'static str {
        "market"
    }

    async fn fetch(
        &self,
        entity: &str,
        params: &QueryParams,
    ) -> Result<NormalizedRecord, FetchError> {
        let kind = required(params, "statement", ProviderFamily::Market)?
            .parse::<StatementKind>()
            .map_err(FetchError::Fatal)?;

        tracing::debug!(symbol = entity, statement = %kind, "Fetching market data");

        match kind {
            StatementKind::Quote => self.fetch_quote(entity).await,
            StatementKind::History => {
                self.fetch_history(entity, params.get("range").unwrap_or("1mo"))
                    .await
            },
            _ => self.fetch_alpha_vantage(entity, kind, params).await,
        }
    }
}

fn market_builder(provider: &str, symbol: &str) -> RecordBuilder {
    NormalizedRecord::builder(ProviderFamily::Market, provider, symbol)
}

/// Yahoo reports unknown symbols as an empty data set or a chart error coded
/// "Not Found"; everything else is treated as transient
fn map_yahoo_error(symbol: &str, err: &yahoo::YahooError) -> FetchError {
    match err {
        yahoo::YahooError::NoResult | yahoo::YahooError::NoQuotes => {
            FetchError::not_found(YAHOO, symbol)
        },
        yahoo::YahooError::ApiError(message)
            if message
                .code
                .as_deref()
                .is_some_and(|code| code.eq_ignore_ascii_case("not found")) =>
        {
            FetchError::not_found(YAHOO, symbol)
        },
        other => FetchError::unavailable(YAHOO, other.to_string()),
    }
}

/// Start of a named history window ending at `end`
fn range_start(range: &str, end: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    let days = match range {
        "1d" => 1,
        "5d" => 5,
        "1mo" => 30,
        "3mo" => 90,
        "6mo" => 180,
        "1y" => 365,
        "2y" => 730,
        "5y" => 1825,
        "10y" => 3650,
        "ytd" => {
            return NaiveDate::from_ymd_opt(end.year(), 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc())
                .ok_or_else(|| "invalid ytd start".to_string());
        },
        "max" => 36500,
        other => return Err(format!("invalid history range: {other}")),
    };
    Ok(end - chrono::Duration::days(days))
}

fn history_record(
    symbol: &str,
    range: &str,
    closes: Vec<Point>,
) -> Result<NormalizedRecord, FetchError> {
    if closes.is_empty() {
        return Err(FetchError::not_found(YAHOO, symbol));
    }

    let mut closes = closes;
    closes.sort_by_key(|p| p.date);
    let first = closes.first().and_then(|p| p.value.map(|v| (p.date, v)));
    let last = closes.last().and_then(|p| p.value.map(|v| (p.date, v)));
    let change_pct = match (first, last) {
        (Some((_, a)), Some((_, b))) if a != 0.0 => Some((b - a) / a * 100.0),
        _ => None,
    };

    Ok(market_builder(YAHOO, symbol)
        .text("statement", Some(StatementKind::History.as_str()))
        .text("range", Some(range))
        .date("start", closes.first().map(|p| p.date))
        .date("end", closes.last().map(|p| p.date))
        .integer("points", i64::try_from(closes.len()).ok())
        .number("change_pct", change_pct)
        .series("closes", closes)
        .build())
}

/// Alpha Vantage reports problems inside a 200 response
fn check_alpha_vantage_payload(symbol: &str, data: &Value) -> Result<(), FetchError> {
    if data.get("Error Message").is_some() {
        return Err(FetchError::not_found(ALPHA_VANTAGE, symbol));
    }

    if let Some(note) = data.get("Note").or_else(|| data.get("Information")) {
        return Err(FetchError::unavailable(
            ALPHA_VANTAGE,
            format!("rate limited: {}", note.as_str().unwrap_or("throttled")),
        ));
    }

    if data.as_object().is_none_or(serde_json::Map::is_empty) {
        return Err(FetchError::not_found(ALPHA_VANTAGE, symbol));
    }

    Ok(())
}

fn report_number(report: &Value, key: &str) -> Option<f64> {
    report.get(key).and_then(Value::as_str).and_then(parse_number)
}

/// Normalize an Alpha Vantage statement payload into one series per line item
fn statement_record(
    symbol: &str,
    kind: StatementKind,
    period: StatementPeriod,
    periods: usize,
    data: &Value,
) -> Result<NormalizedRecord, FetchError> {
    let reports: Vec<(NaiveDate, &Value)> = data
        .get(period.reports_key())
        .and_then(Value::as_array)
        .map(|reports| {
            reports
                .iter()
                .filter_map(|r| {
                    r.get("fiscalDateEnding")
                        .and_then(Value::as_str)
                        .and_then(parse_date)
                        .map(|d| (d, r))
                })
                .collect()
        })
        .unwrap_or_default();

    let mut reports = reports;
    // newest first, then keep the requested number of periods
    reports.sort_by(|a, b| b.0.cmp(&a.0));
    reports.truncate(periods.max(1));

    let Some((latest_date, latest)) = reports.first().copied() else {
        return Err(FetchError::not_found(ALPHA_VANTAGE, symbol));
    };

    let mut builder = market_builder(ALPHA_VANTAGE, symbol)
        .text("statement", Some(kind.as_str()))
        .text("period", Some(period.as_str()))
        .date("fiscal_date_ending", Some(latest_date))
        .text(
            "reported_currency",
            latest.get("reportedCurrency").and_then(Value::as_str),
        );

    for (field, report_key) in kind.line_items() {
        let points = reports
            .iter()
            .map(|(date, report)| Point::new(*date, report_number(report, report_key)))
            .collect();
        builder = builder.series(*field, points);
    }

    if kind == StatementKind::CashFlow {
        // capitalExpenditures is reported as a positive outflow
        let points = reports
            .iter()
            .map(|(date, report)| {
                let fcf = report_number(report, "operatingCashflow")
                    .zip(report_number(report, "capitalExpenditures"))
                    .map(|(ocf, capex)| ocf - capex.abs());
                Point::new(*date, fcf)
            })
            .collect();
        builder = builder.series("free_cash_flow", points);
    }

    Ok(builder.build())
}

fn overview_record(symbol: &str, data: &Value) -> NormalizedRecord {
    let text = |key: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .filter(|s| !matches!(*s, "None" | "-"))
            .map(str::to_string)
    };
    let number = |key: &str| data.get(key).and_then(Value::as_str).and_then(parse_number);

    market_builder(ALPHA_VANTAGE, symbol)
        .text("statement", Some(StatementKind::Overview.as_str()))
        .text("name", text("Name"))
        .text("exchange", text("Exchange"))
        .text("sector", text("Sector"))
        .text("industry", text("Industry"))
        .number("market_cap", number("MarketCapitalization"))
        .number("pe_ratio", number("PERatio"))
        .number("eps", number("EPS"))
        .number("dividend_yield", number("DividendYield"))
        .number("book_value", number("BookValue"))
        .build()
}
