//! SEC EDGAR adapter for the filings family
//!
//! No API key is needed, but the SEC requires a User-Agent naming the
//! application and a contact address, and allows 10 requests per second.
//! An entity is a ticker (resolved through the SEC ticker map) or a CIK.
//!
//! Query parameters: `form` (e.g. `10-K`, default any), `limit` (default 5).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::OnceCell;

use super::{SharedRateLimiter, SourceAdapter, http_client, parse_date, per_second, usize_param};
use crate::config::DataConfig;
use crate::error::{DataError, FetchError};
use crate::key::{ProviderFamily, QueryParams};
use crate::record::NormalizedRecord;

const SEC_BASE_URL: &str = "https://data.sec.gov";
const SEC_COMPANY_TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";
const SEC_ARCHIVES_URL: &str = "https://www.sec.gov/Archives/edgar/data";
const PROVIDER: &str = "sec_edgar";

/// SEC submissions response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompanySubmissions {
    name: Option<String>,
    sic_description: Option<String>,
    fiscal_year_end: Option<String>,
    filings: FilingsData,
}

#[derive(Debug, Clone, Deserialize)]
struct FilingsData {
    recent: RecentFilings,
}

/// Column-oriented list of recent filings, newest first
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RecentFilings {
    accession_number: Vec<String>,
    filing_date: Vec<String>,
    report_date: Vec<Option<String>>,
    form: Vec<String>,
    primary_document: Vec<String>,
}

/// One filing row
#[derive(Debug, Clone, PartialEq, Eq)]
struct Filing {
    form: String,
    filing_date: String,
    report_date: Option<String>,
    url: String,
}

impl Filing {
    fn describe(&self) -> String {
        match &self.report_date {
            Some(period) => format!(
                "{} {} (period {period}): {}",
                self.filing_date, self.form, self.url
            ),
            None => format!("{} {}: {}", self.filing_date, self.form, self.url),
        }
    }
}

/// Adapter for the filings family
pub struct FilingsAdapter {
    client: Client,
    rate_limiter: SharedRateLimiter,
    /// Ticker -> CIK map, loaded once per adapter
    tickers: OnceCell<HashMap<String, String>>,
}

impl FilingsAdapter {
    pub fn new(config: &DataConfig) -> Result<Self, DataError> {
        Ok(Self {
            client: http_client(config.request_timeout, Some(&config.sec_user_agent))?,
            rate_limiter: per_second(config.rate_limits.sec_per_second),
            tickers: OnceCell::new(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        entity: &str,
    ) -> Result<T, FetchError> {
        self.rate_limiter.until_ready().await;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::from_status(PROVIDER, entity, response.status()));
        }
        Ok(response.json().await?)
    }

    /// Resolve a ticker to its unpadded CIK; numeric entities are CIKs already
    async fn resolve_cik(&self, entity: &str) -> Result<String, FetchError> {
        if !entity.is_empty() && entity.chars().all(|c| c.is_ascii_digit()) {
            return Ok(unpadded_cik(entity));
        }

        let tickers = self
            .tickers
            .get_or_try_init(|| async {
                let data: Value = self.get_json(SEC_COMPANY_TICKERS_URL, entity).await?;
                Ok::<_, FetchError>(ticker_map(&data))
            })
            .await?;

        tickers
            .get(&entity.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| FetchError::not_found(PROVIDER, entity))
    }
}

#[async_trait]
impl SourceAdapter for FilingsAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Filings
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch(
        &self,
        entity: &str,
        params: &QueryParams,
    ) -> Result<NormalizedRecord, FetchError> {
        let limit = usize_param(params, "limit", 5)?.max(1);
        let form = params.get("form");

        let cik = self.resolve_cik(entity).await?;
        let url = format!("{SEC_BASE_URL}/submissions/CIK{cik:0>10}.json");
        let submissions: CompanySubmissions = self.get_json(&url, entity).await?;

        tracing::debug!(entity, cik = %cik, form, "Fetched SEC submissions");
        Ok(filings_record(entity, &cik, &submissions, form, limit))
    }
}

fn unpadded_cik(raw: &str) -> String {
    let trimmed = raw.trim_start_matches('0');
    if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() }
}

/// `company_tickers.json` is an object of `{"cik_str": 320193, "ticker": "AAPL", ...}`
fn ticker_map(data: &Value) -> HashMap<String, String> {
    let Some(companies) = data.as_object() else {
        return HashMap::new();
    };

    companies
        .values()
        .filter_map(|company| {
            let ticker = company.get("ticker")?.as_str()?.to_ascii_uppercase();
            let cik = match company.get("cik_str")? {
                Value::Number(n) => n.to_string(),
                Value::String(s) => unpadded_cik(s),
                _ => return None,
            };
            Some((ticker, cik))
        })
        .collect()
}

fn select_filings(cik: &str, recent: &RecentFilings, form: Option<&str>, limit: usize) -> Vec<Filing> {
    recent
        .form
        .iter()
        .enumerate()
        .filter(|(_, f)| form.is_none_or(|wanted| f.eq_ignore_ascii_case(wanted)))
        .filter_map(|(i, f)| {
            let accession = recent.accession_number.get(i)?;
            let document = recent.primary_document.get(i)?;
            Some(Filing {
                form: f.clone(),
                filing_date: recent.filing_date.get(i)?.clone(),
                report_date: recent
                    .report_date
                    .get(i)
                    .cloned()
                    .flatten()
                    .filter(|d| !d.is_empty()),
                url: format!(
                    "{SEC_ARCHIVES_URL}/{cik}/{}/{document}",
                    accession.replace('-', "")
                ),
            })
        })
        .take(limit)
        .collect()
}

fn filings_record(
    entity: &str,
    cik: &str,
    submissions: &CompanySubmissions,
    form: Option<&str>,
    limit: usize,
) -> NormalizedRecord {
    let filings = select_filings(cik, &submissions.filings.recent, form, limit);
    let latest = filings.first();

    NormalizedRecord::builder(ProviderFamily::Filings, PROVIDER, entity)
        .text("company_name", submissions.name.clone())
        .text("cik", Some(cik))
        .text("form_filter", form)
        .text("sic_description", submissions.sic_description.clone())
        .text("fiscal_year_end", submissions.fiscal_year_end.clone())
        .integer("filing_count", i64::try_from(filings.len()).ok())
        .text("latest_form", latest.map(|f| f.form.clone()))
        .date(
            "latest_filing_date",
            latest.and_then(|f| parse_date(&f.filing_date)),
        )
        .list("filings", filings.iter().map(Filing::describe).collect())
        .build()
}
