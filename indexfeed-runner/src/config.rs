//! Pipeline configuration.
//!
//! Resolution order: built-in defaults, then an optional TOML file, then
//! `INDEXFEED_*` environment variables. The result is validated once; an
//! invalid value is an error at startup, never silently defaulted.

use chrono_tz::Tz;
use indexfeed_core::data::{
    BacktrackConfig, Endpoints, HttpSettings, DEFAULT_MAX_BACKTRACK, WEIGHTED_INDEX_KEYWORD,
};
use indexfeed_core::domain::Market;
use indexfeed_core::TradingDayCalculator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "INDEXFEED_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidEnv {
        var: String,
        value: String,
        reason: String,
    },

    #[error("invalid {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Output format(s) for the canonical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    #[default]
    Csv,
    Parquet,
    Both,
}

impl TableFormat {
    pub fn writes_csv(self) -> bool {
        matches!(self, TableFormat::Csv | TableFormat::Both)
    }

    pub fn writes_parquet(self) -> bool {
        matches!(self, TableFormat::Parquet | TableFormat::Both)
    }
}

impl FromStr for TableFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(TableFormat::Csv),
            "parquet" => Ok(TableFormat::Parquet),
            "both" => Ok(TableFormat::Both),
            other => Err(format!("expected csv, parquet or both, got {other:?}")),
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TableFormat::Csv => "csv",
            TableFormat::Parquet => "parquet",
            TableFormat::Both => "both",
        })
    }
}

/// Per-market endpoint overrides. Missing entries keep the built-in URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarketEndpoints {
    pub primary: Option<String>,
    pub bulk: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub timeout_secs: u64,
    /// Attempts per request.
    pub retries: u32,
    pub retry_backoff_ms: u64,
    pub max_backtrack: usize,
    /// Local hour after which the current day's figures are published.
    pub announce_hour: u32,
    /// IANA zone name.
    pub timezone: String,
    pub output_dir: PathBuf,
    pub use_cache: bool,
    pub table_format: TableFormat,
    pub user_agent: String,
    /// Title keyword of the weighted-index table.
    pub weighted_keyword: String,
    /// Keyed by market id (`taiex`, `otc`).
    pub markets: BTreeMap<String, MarketEndpoints>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let http = HttpSettings::default();
        Self {
            timeout_secs: http.timeout.as_secs(),
            retries: http.retries,
            retry_backoff_ms: http.backoff.as_millis() as u64,
            max_backtrack: DEFAULT_MAX_BACKTRACK,
            announce_hour: indexfeed_core::calendar::DEFAULT_ANNOUNCE_HOUR,
            timezone: "Asia/Taipei".to_string(),
            output_dir: PathBuf::from("data"),
            use_cache: true,
            table_format: TableFormat::Csv,
            user_agent: http.user_agent,
            weighted_keyword: WEIGHTED_INDEX_KEYWORD.to_string(),
            markets: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document over the defaults. Not validated.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML file over the defaults. Not validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Defaults, then `path` if given, then the process environment; validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `INDEXFEED_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            let var = format!("{ENV_PREFIX}{key}");
            lookup(&var).map(|value| (var, value))
        };

        if let Some((var, v)) = get("TIMEOUT_SECS") {
            self.timeout_secs = parse_env(&var, &v)?;
        }
        if let Some((var, v)) = get("RETRIES") {
            self.retries = parse_env(&var, &v)?;
        }
        if let Some((var, v)) = get("RETRY_BACKOFF_MS") {
            self.retry_backoff_ms = parse_env(&var, &v)?;
        }
        if let Some((var, v)) = get("MAX_BACKTRACK") {
            self.max_backtrack = parse_env(&var, &v)?;
        }
        if let Some((var, v)) = get("ANNOUNCE_HOUR") {
            self.announce_hour = parse_env(&var, &v)?;
        }
        if let Some((_, v)) = get("TIMEZONE") {
            self.timezone = v;
        }
        if let Some((_, v)) = get("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some((var, v)) = get("USE_CACHE") {
            self.use_cache = parse_bool(&var, &v)?;
        }
        if let Some((var, v)) = get("TABLE_FORMAT") {
            self.table_format = v.parse().map_err(|reason| ConfigError::InvalidEnv {
                var,
                value: v.clone(),
                reason,
            })?;
        }
        if let Some((_, v)) = get("USER_AGENT") {
            self.user_agent = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::invalid("timeout_secs", "must be positive"));
        }
        if self.announce_hour > 23 {
            return Err(ConfigError::invalid("announce_hour", "must be 0..=23"));
        }
        self.tz()?;
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("output_dir", "must not be empty"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::invalid("user_agent", "must not be empty"));
        }
        if self.weighted_keyword.trim().is_empty() {
            return Err(ConfigError::invalid("weighted_keyword", "must not be empty"));
        }

        for (id, endpoints) in &self.markets {
            let market: Market = id
                .parse()
                .map_err(|e| ConfigError::invalid(format!("markets.{id}"), format!("{e}")))?;
            let resolved = self.endpoints(market);
            if !resolved.primary.contains(indexfeed_core::data::exchange::DATE_PLACEHOLDER) {
                return Err(ConfigError::invalid(
                    format!("markets.{id}.primary"),
                    "URL template must contain {date}",
                ));
            }
            // bulk rows are a bare list; the weighted index only reads titled tables
            if market == Market::Taiex && endpoints.bulk.is_some() {
                return Err(ConfigError::invalid(
                    format!("markets.{id}.bulk"),
                    "the weighted index has no bulk tier",
                ));
            }
            if endpoints.bulk.as_deref().is_some_and(|b| b.trim().is_empty()) {
                return Err(ConfigError::invalid(format!("markets.{id}.bulk"), "must not be empty"));
            }
        }
        Ok(())
    }

    fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::invalid("timezone", e.to_string()))
    }

    pub fn calendar(&self) -> Result<TradingDayCalculator, ConfigError> {
        Ok(TradingDayCalculator::new(self.tz()?, self.announce_hour))
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            retries: self.retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn backtrack(&self) -> BacktrackConfig {
        BacktrackConfig {
            max_backtrack: self.max_backtrack,
            use_cache: self.use_cache,
        }
    }

    /// Built-in endpoints for `market` with any configured overrides applied.
    pub fn endpoints(&self, market: Market) -> Endpoints {
        let mut endpoints = Endpoints::defaults_for(market);
        let overrides = self
            .markets
            .iter()
            .find(|(id, _)| id.parse::<Market>().is_ok_and(|m| m == market))
            .map(|(_, o)| o);
        if let Some(o) = overrides {
            if let Some(primary) = &o.primary {
                endpoints.primary = primary.clone();
            }
            if let Some(bulk) = &o.bulk {
                endpoints.bulk = Some(bulk.clone());
            }
        }
        endpoints
    }
}

fn parse_env<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_published_behavior() {
        let c = PipelineConfig::default();
        assert_eq!(c.timeout_secs, 20);
        assert_eq!(c.retries, 3);
        assert_eq!(c.retry_backoff_ms, 1500);
        assert_eq!(c.max_backtrack, 10);
        assert_eq!(c.announce_hour, 16);
        assert_eq!(c.output_dir, PathBuf::from("data"));
        assert!(c.use_cache);
        assert_eq!(c.table_format, TableFormat::Csv);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn toml_overrides_some_fields() {
        let c = PipelineConfig::from_toml(
            r#"
            max_backtrack = 5
            table_format = "both"

            [markets.otc]
            bulk = "http://localhost/bulk"
            "#,
        )
        .unwrap();
        assert_eq!(c.max_backtrack, 5);
        assert_eq!(c.retries, 3);
        assert_eq!(c.table_format, TableFormat::Both);

        let otc = c.endpoints(Market::Otc);
        assert_eq!(otc.bulk.as_deref(), Some("http://localhost/bulk"));
        assert!(otc.primary.contains("tpex"));
        assert_eq!(c.endpoints(Market::Taiex), Endpoints::defaults_for(Market::Taiex));
    }

    #[test]
    fn unknown_toml_keys_are_rejected() {
        assert!(matches!(
            PipelineConfig::from_toml("max_bactrack = 5"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn env_overrides_file() {
        let mut c = PipelineConfig::from_toml("retries = 5").unwrap();
        c.apply_env(env(&[
            ("INDEXFEED_RETRIES", "2"),
            ("INDEXFEED_USE_CACHE", "false"),
            ("INDEXFEED_TABLE_FORMAT", "parquet"),
            ("INDEXFEED_OUTPUT_DIR", "/tmp/feed"),
        ]))
        .unwrap();
        assert_eq!(c.retries, 2);
        assert!(!c.use_cache);
        assert_eq!(c.table_format, TableFormat::Parquet);
        assert_eq!(c.output_dir, PathBuf::from("/tmp/feed"));
    }

    #[test]
    fn bad_env_values_are_errors() {
        let mut c = PipelineConfig::default();
        let err = c
            .apply_env(env(&[("INDEXFEED_MAX_BACKTRACK", "ten")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref var, .. } if var == "INDEXFEED_MAX_BACKTRACK"));

        let mut c = PipelineConfig::default();
        assert!(c.apply_env(env(&[("INDEXFEED_USE_CACHE", "maybe")])).is_err());
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut c = PipelineConfig::default();
        c.timezone = "Mars/Olympus".into();
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.announce_hour = 24;
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.markets.insert(
            "otc".into(),
            MarketEndpoints {
                primary: Some("http://localhost/no-date".into()),
                bulk: None,
            },
        );
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.markets.insert("nasdaq".into(), MarketEndpoints::default());
        assert!(c.validate().is_err());
    }

    #[test]
    fn taiex_bulk_override_is_rejected() {
        let mut c = PipelineConfig::default();
        c.markets.insert(
            "taiex".into(),
            MarketEndpoints {
                primary: None,
                bulk: Some("http://localhost/all".into()),
            },
        );
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("markets.taiex.bulk"));

        let mut c = PipelineConfig::default();
        c.markets.insert(
            "otc".into(),
            MarketEndpoints {
                primary: None,
                bulk: Some("http://localhost/all".into()),
            },
        );
        assert!(c.validate().is_ok());
    }

    #[test]
    fn derived_settings() {
        let mut c = PipelineConfig::default();
        c.retry_backoff_ms = 250;
        c.use_cache = false;
        assert_eq!(c.http_settings().backoff, Duration::from_millis(250));
        assert_eq!(c.http_settings().timeout, Duration::from_secs(20));
        assert!(!c.backtrack().use_cache);
        assert_eq!(c.calendar().unwrap().announce_hour(), 16);
    }
}
