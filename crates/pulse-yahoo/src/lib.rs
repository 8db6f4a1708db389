#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/phronesis/pulse/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Yahoo Finance data provider.
//!
//! This crate provides a Yahoo Finance data provider that implements the
//! [`DataProvider`], [`ProfileProvider`], and [`FinancialsProvider`]
//! traits from `pulse-core`.
//!
//! # Features
//!
//! - Company profile lookup (name, sector, industry, headcount, contact details)
//! - Annual and quarterly income statement line items
//! - Cookie and crumb session handshake for the quote summary endpoint
//! - Optional request spacing (off by default)
//!
//! # Example
//!
//! ```no_run
//! use pulse_yahoo::YahooProvider;
//! use pulse_core::{FinancialsProvider, Symbol};
//!
//! # async fn example() -> pulse_core::Result<()> {
//! let provider = YahooProvider::new();
//! let symbol = Symbol::new("AAPL");
//!
//! let annual = provider.fetch_annual_financials(&symbol).await?;
//! println!("Fetched {} periods", annual.period_count());
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use pulse_core::{
    DataError, DataProvider, FinancialsProvider, PeriodType, ProfileInfo, ProfileProvider,
    Result, StatementTable, Symbol,
};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Answers with the session cookie the crumb is bound to.
const COOKIE_URL: &str = "https://fc.yahoo.com";

/// Returns the crumb token for the current cookie.
const CRUMB_URL: &str = "https://query2.finance.yahoo.com/v1/test/getcrumb";

/// Yahoo Finance quote summary API base URL.
const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

/// Yahoo Finance fundamentals time series API base URL.
const TIMESERIES_URL: &str =
    "https://query2.finance.yahoo.com/ws/fundamentals-timeseries/v1/finance/timeseries";

/// Quote summary modules merged into one profile mapping, in precedence order.
const PROFILE_MODULES: &[&str] = &["assetProfile", "price", "financialData"];

/// Income statement line items requested from the time series API.
const INCOME_STATEMENT_KEYS: &[&str] = &[
    "TotalRevenue",
    "OperatingRevenue",
    "CostOfRevenue",
    "GrossProfit",
    "OperatingExpense",
    "SellingGeneralAndAdministration",
    "ResearchAndDevelopment",
    "OperatingIncome",
    "InterestExpense",
    "PretaxIncome",
    "TaxProvision",
    "NetIncome",
    "NetIncomeCommonStockholders",
    "EBIT",
    "EBITDA",
    "NormalizedEBITDA",
    "BasicEPS",
    "DilutedEPS",
    "BasicAverageShares",
    "DilutedAverageShares",
];

/// Start of the time series window (1985-08-23), early enough for any filing.
const TIMESERIES_START: i64 = 493_590_046;

/// Default rate limit delay in milliseconds; zero disables spacing.
const DEFAULT_RATE_LIMIT_MS: u64 = 0;

/// Default HTTP timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent for HTTP requests.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Yahoo Finance data provider.
///
/// Implements [`DataProvider`], [`ProfileProvider`], and [`FinancialsProvider`].
#[derive(Debug)]
pub struct YahooProvider {
    client: reqwest::Client,
    rate_limit_ms: u64,
    last_request_time: AtomicU64,
    crumb: Mutex<Option<String>>,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider with default settings.
    ///
    /// Requests are not spaced.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(
            Duration::from_millis(DEFAULT_RATE_LIMIT_MS),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Create a new Yahoo Finance provider with custom rate limiting and timeout.
    ///
    /// A zero `rate_limit` sends requests back to back.
    #[must_use]
    pub fn with_settings(rate_limit: Duration, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to configure HTTP client, using defaults");
                reqwest::Client::new()
            });

        Self {
            client,
            rate_limit_ms: rate_limit.as_millis() as u64,
            last_request_time: AtomicU64::new(0),
            crumb: Mutex::new(None),
        }
    }

    /// Apply rate limiting before making a request.
    async fn apply_rate_limit(&self) {
        if self.rate_limit_ms == 0 {
            return;
        }

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let last = self.last_request_time.load(Ordering::Relaxed);
        let elapsed = now.saturating_sub(last);

        if elapsed < self.rate_limit_ms {
            let wait_time = self.rate_limit_ms - elapsed;
            debug!("Rate limiting: waiting {}ms", wait_time);
            sleep(Duration::from_millis(wait_time)).await;
        }

        self.last_request_time.store(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            Ordering::Relaxed,
        );
    }

    /// Issue a rate-limited GET and decode the JSON body.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        symbol: &Symbol,
        url: Url,
    ) -> Result<T> {
        self.apply_rate_limit().await;
        debug!("Fetching: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited {
                provider: "Yahoo Finance".to_string(),
                retry_after: Some(Duration::from_secs(60)),
            });
        }

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound(symbol.to_string()));
        }

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DataError::Unauthorized(format!(
                "HTTP {} for {}",
                response.status(),
                symbol
            )));
        }

        if !response.status().is_success() {
            return Err(DataError::Network(format!(
                "HTTP {} for {}",
                response.status(),
                symbol
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DataError::Parse(e.to_string()))
    }

    /// The crumb for the client's cookie session, fetched on first use.
    ///
    /// The cookie request usually answers with an error status but still
    /// sets the cookie, so only a transport failure there is logged.
    async fn crumb(&self) -> Result<String> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        self.apply_rate_limit().await;
        if let Err(e) = self.client.get(COOKIE_URL).send().await {
            debug!(error = %e, "Cookie request failed");
        }

        self.apply_rate_limit().await;
        let response = self
            .client
            .get(CRUMB_URL)
            .send()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited {
                provider: "Yahoo Finance".to_string(),
                retry_after: Some(Duration::from_secs(60)),
            });
        }

        if !response.status().is_success() {
            return Err(DataError::Unauthorized(format!(
                "HTTP {} fetching crumb",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;
        let crumb = parse_crumb(&body)?;
        debug!("Obtained Yahoo crumb");
        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    /// Drops the cached crumb so the next profile request starts a new session.
    async fn reset_crumb(&self) {
        self.crumb.lock().await.take();
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    fn description(&self) -> &str {
        "Yahoo Finance provider for company profiles and income statements"
    }
}

#[async_trait]
impl ProfileProvider for YahooProvider {
    async fn fetch_profile(&self, symbol: &Symbol) -> Result<ProfileInfo> {
        let crumb = self.crumb().await?;
        let url = build_quote_summary_url(symbol, &crumb)?;
        let response: QuoteSummaryResponse = match self.get_json(symbol, url).await {
            Err(e @ DataError::Unauthorized(_)) => {
                warn!(symbol = %symbol, "Crumb rejected, starting a new session");
                self.reset_crumb().await;
                return Err(e);
            }
            other => other?,
        };
        flatten_quote_summary(symbol, response)
    }
}

#[async_trait]
impl FinancialsProvider for YahooProvider {
    async fn fetch_financials(
        &self,
        symbol: &Symbol,
        period_type: PeriodType,
    ) -> Result<StatementTable> {
        let url = build_timeseries_url(symbol, period_type, Utc::now().timestamp())?;
        let response: TimeseriesResponse = self.get_json(symbol, url).await?;
        parse_timeseries(symbol, period_type, response)
    }
}

/// Append the symbol as the last path segment of `base`.
fn symbol_url(base: &str, symbol: &Symbol) -> Result<Url> {
    let mut url = Url::parse(base).map_err(|e| DataError::Other(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| DataError::Other(format!("cannot append path to {base}")))?
        .push(symbol.as_str());
    Ok(url)
}

/// Build the quote summary URL for a symbol.
fn build_quote_summary_url(symbol: &Symbol, crumb: &str) -> Result<Url> {
    let mut url = symbol_url(QUOTE_SUMMARY_URL, symbol)?;
    url.query_pairs_mut()
        .append_pair("modules", &PROFILE_MODULES.join(","))
        .append_pair("crumb", crumb);
    Ok(url)
}

/// Validate a crumb response body.
///
/// Yahoo answers a cookie-less crumb request with an HTML or JSON error page
/// instead of a token.
fn parse_crumb(body: &str) -> Result<String> {
    let crumb = body.trim();
    if crumb.is_empty()
        || crumb.contains(|c: char| c.is_whitespace() || matches!(c, '<' | '{'))
    {
        return Err(DataError::Unauthorized(
            "Yahoo Finance returned no crumb".to_string(),
        ));
    }
    Ok(crumb.to_string())
}

/// Build the fundamentals time series URL for a symbol and period type.
fn build_timeseries_url(symbol: &Symbol, period_type: PeriodType, until: i64) -> Result<Url> {
    let types = INCOME_STATEMENT_KEYS
        .iter()
        .map(|key| format!("{}{key}", period_type.series_prefix()))
        .collect::<Vec<_>>()
        .join(",");

    let mut url = symbol_url(TIMESERIES_URL, symbol)?;
    url.query_pairs_mut()
        .append_pair("symbol", symbol.as_str())
        .append_pair("type", &types)
        .append_pair("period1", &TIMESERIES_START.to_string())
        .append_pair("period2", &until.to_string());
    Ok(url)
}

/// Convert a time series key such as `SellingGeneralAndAdministration` into
/// the spaced display name `Selling General And Administration`.
///
/// Runs of capitals are kept together (`NormalizedEBITDA` becomes
/// `Normalized EBITDA`).
fn display_name(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut name = String::with_capacity(key.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || (prev.is_uppercase() && next_is_lower) {
                name.push(' ');
            }
        }
        name.push(c);
    }
    name
}

/// Unwrap Yahoo's `{raw, fmt}` value wrappers.
///
/// Returns `None` for empty objects, which Yahoo uses for "no value".
fn unwrap_value(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(mut obj) => {
            if let Some(raw) = obj.remove("raw") {
                Some(raw)
            } else if obj.is_empty() {
                None
            } else {
                Some(Value::Object(obj))
            }
        }
        other => Some(other),
    }
}

/// Merge the profile modules of a quote summary response into one mapping.
///
/// Earlier modules in [`PROFILE_MODULES`] win on key collisions.
fn flatten_quote_summary(symbol: &Symbol, response: QuoteSummaryResponse) -> Result<ProfileInfo> {
    if let Some(error) = response.quote_summary.error {
        if error.code == "Not Found" {
            return Err(DataError::SymbolNotFound(symbol.to_string()));
        }
        return Err(DataError::Other(format!(
            "{}: {}",
            error.code, error.description
        )));
    }

    let mut modules = response
        .quote_summary
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| DataError::SymbolNotFound(symbol.to_string()))?;

    let mut info = ProfileInfo::new();
    for module in PROFILE_MODULES {
        let Some(Value::Object(fields)) = modules.remove(*module) else {
            continue;
        };
        for (key, value) in fields {
            if info.get(&key).is_some() {
                continue;
            }
            if let Some(value) = unwrap_value(value) {
                info.insert(key, value);
            }
        }
    }

    Ok(info)
}

/// Assemble a statement table from a time series response.
///
/// Periods are the union of all line items' report dates, most recent first.
/// Line items keep the order of [`INCOME_STATEMENT_KEYS`]; keys the API did
/// not answer are left out.
fn parse_timeseries(
    symbol: &Symbol,
    period_type: PeriodType,
    response: TimeseriesResponse,
) -> Result<StatementTable> {
    if let Some(error) = response.timeseries.error {
        return Err(DataError::Other(format!(
            "{}: {}",
            error.code, error.description
        )));
    }

    let prefix = period_type.series_prefix();
    let mut series: BTreeMap<&str, BTreeMap<NaiveDate, Option<f64>>> = BTreeMap::new();
    let mut dates = BTreeSet::new();

    for mut result in response.timeseries.result.unwrap_or_default() {
        let Some(series_type) = result
            .get("meta")
            .and_then(|m| m.get("type"))
            .and_then(|t| t.get(0))
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            continue;
        };
        let Some(key) = series_type.strip_prefix(prefix) else {
            continue;
        };
        let Some(known) = INCOME_STATEMENT_KEYS.iter().find(|k| **k == key) else {
            continue;
        };
        let Some(Value::Array(points)) = result.remove(&series_type) else {
            continue;
        };

        let values = series.entry(*known).or_default();
        for point in points {
            let Ok(point) = serde_json::from_value::<TimeseriesPoint>(point) else {
                continue;
            };
            let Ok(date) = NaiveDate::parse_from_str(&point.as_of_date, "%Y-%m-%d") else {
                warn!(symbol = %symbol, date = %point.as_of_date, "Skipping unparseable period");
                continue;
            };
            dates.insert(date);
            values.insert(date, point.reported_value.and_then(|v| v.raw));
        }
    }

    let periods: Vec<NaiveDate> = dates.into_iter().rev().collect();
    let mut table = StatementTable::new(periods.clone());
    for key in INCOME_STATEMENT_KEYS {
        let Some(values) = series.get(key) else {
            continue;
        };
        let row = periods
            .iter()
            .map(|d| values.get(d).copied().flatten())
            .collect();
        table.push_line_item(display_name(key), row)?;
    }

    debug!(
        symbol = %symbol,
        %period_type,
        periods = table.period_count(),
        line_items = table.line_items().len(),
        "Parsed statement table"
    );
    Ok(table)
}

// ============================================================================
// Yahoo Finance API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

/// Quote Summary API response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummaryResult,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    result: Option<Vec<Map<String, Value>>>,
    error: Option<ApiError>,
}

/// Fundamentals time series API response.
#[derive(Debug, Deserialize)]
struct TimeseriesResponse {
    timeseries: TimeseriesResult,
}

#[derive(Debug, Deserialize)]
struct TimeseriesResult {
    result: Option<Vec<Map<String, Value>>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeseriesPoint {
    as_of_date: String,
    reported_value: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}
