//! Exchange HTTP source.
//!
//! Fetches index payloads from the exchanges' JSON endpoints with a blocking
//! client. Every request is retried a fixed number of times with linearly
//! increasing backoff; whatever still fails is handed back as a `FetchError`
//! for the controller to treat as an empty result.
//!
//! Both exchanges publish without an official schema contract, and the OTC
//! bulk endpoint sometimes answers with an HTML error page instead of JSON.

use super::provider::{FetchError, RemoteSource};
use crate::domain::{Market, TradingDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const TAIEX_PRIMARY: &str = "https://www.twse.com.tw/rwd/zh/afterTrading/MI_INDEX?date={date}&type=IND";
const OTC_PRIMARY: &str = "https://www.tpex.org.tw/openapi/v1/tpex_mainboard_index?date={date}";
const OTC_BULK: &str = "https://www.tpex.org.tw/openapi/v1/tpex_mainboard_index";

/// Placeholder substituted with the `YYYYMMDD` trading date.
pub const DATE_PLACEHOLDER: &str = "{date}";

/// Endpoint pair for one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// URL template containing `{date}`.
    pub primary: String,
    /// Undated bulk collection, filtered client-side.
    #[serde(default)]
    pub bulk: Option<String>,
}

impl Endpoints {
    pub fn defaults_for(market: Market) -> Self {
        match market {
            Market::Taiex => Self {
                primary: TAIEX_PRIMARY.to_string(),
                bulk: None,
            },
            Market::Otc => Self {
                primary: OTC_PRIMARY.to_string(),
                bulk: Some(OTC_BULK.to_string()),
            },
        }
    }

    pub fn primary_url(&self, date: TradingDate) -> String {
        self.primary.replace(DATE_PLACEHOLDER, &date.compact())
    }
}

/// HTTP client settings shared by all markets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub timeout: Duration,
    /// Total attempts per request (at least one is always made).
    pub retries: u32,
    /// Attempt `n + 1` waits `backoff * n`.
    pub backoff: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            retries: 3,
            backoff: Duration::from_millis(1500),
            user_agent: default_user_agent(),
        }
    }
}

pub fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; indexfeed/{})",
        env!("CARGO_PKG_VERSION")
    )
}

/// Blocking HTTP source for one market.
pub struct ExchangeSource {
    name: String,
    client: reqwest::blocking::Client,
    endpoints: Endpoints,
    attempts: u32,
    backoff: Duration,
}

impl ExchangeSource {
    pub fn new(market: Market, endpoints: Endpoints, settings: &HttpSettings) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            name: format!("{}-http", market.id()),
            client,
            endpoints,
            attempts: settings.retries.max(1),
            backoff: settings.backoff,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// One GET, no retry.
    fn get_once(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.client.get(url).send().map_err(classify)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        resp.text().map_err(classify)
    }

    /// GET and parse with linear backoff between attempts.
    fn get_with_retry<T>(
        &self,
        url: &str,
        parse: impl Fn(&str) -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        let mut last_error = None;

        for attempt in 0..self.attempts {
            if attempt > 0 {
                std::thread::sleep(self.backoff * attempt);
            }

            match self.get_once(url).and_then(|body| parse(&body)) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::debug!(
                        source = %self.name,
                        url,
                        attempt,
                        error = %e,
                        "request failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| FetchError::NetworkUnreachable(format!("no attempt made for {url}"))))
    }
}

impl RemoteSource for ExchangeSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_dated(&self, date: TradingDate) -> Result<Value, FetchError> {
        let url = self.endpoints.primary_url(date);
        self.get_with_retry(&url, parse_json_body)
    }

    fn fetch_bulk(&self) -> Result<Option<Value>, FetchError> {
        let Some(url) = self.endpoints.bulk.as_deref() else {
            return Ok(None);
        };
        self.get_with_retry(url, |body| Ok(parse_bulk_body(body)))
            .map(Some)
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(e.to_string())
    } else {
        FetchError::NetworkUnreachable(e.to_string())
    }
}

fn strip_bom(body: &str) -> &str {
    body.trim_start_matches('\u{feff}').trim()
}

fn parse_json_body(body: &str) -> Result<Value, FetchError> {
    serde_json::from_str(strip_bom(body)).map_err(|e| FetchError::InvalidBody(e.to_string()))
}

/// Bulk bodies that are not JSON documents read as an empty collection.
fn parse_bulk_body(body: &str) -> Value {
    let trimmed = strip_bom(body);
    if !(trimmed.starts_with('[') || trimmed.starts_with('{')) {
        return Value::Array(Vec::new());
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::Array(Vec::new()))
}
