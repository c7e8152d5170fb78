//! Runtime settings from environment variables.

use crate::error::ConfigError;
use crate::query::MAX_WINDOW;
use axum::http::StatusCode;

/// Cache tier toggles. Every tier is off unless enabled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheSettings {
    pub identifiers: bool,
    pub content: bool,
    pub headers: bool,
    /// Freshness lifetime advertised through `Cache-Control` and `Expires`.
    pub max_age_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            identifiers: false,
            content: false,
            headers: false,
            max_age_secs: 86_400,
        }
    }
}

impl CacheSettings {
    pub fn all_enabled() -> Self {
        CacheSettings {
            identifiers: true,
            content: true,
            headers: true,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceSettings {
    pub cache: CacheSettings,
    /// Status used for the `no_results` outcome.
    pub no_results_status: StatusCode,
    /// Upper bound applied to any effective page size.
    pub max_limit: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings {
            cache: CacheSettings::default(),
            no_results_status: StatusCode::NO_CONTENT,
            max_limit: 1000,
        }
    }
}

impl ServiceSettings {
    /// Reads `RESTAPI_CACHE_COLLECTIONS`, `RESTAPI_CACHE_CONTENT`, `RESTAPI_CACHE_HEADERS`,
    /// `RESTAPI_CACHE_MAX_AGE`, `RESTAPI_NO_RESULTS_STATUS` and `RESTAPI_MAX_LIMIT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServiceSettings::default();
        let cache = CacheSettings {
            identifiers: parse_flag(&lookup, "RESTAPI_CACHE_COLLECTIONS")?,
            content: parse_flag(&lookup, "RESTAPI_CACHE_CONTENT")?,
            headers: parse_flag(&lookup, "RESTAPI_CACHE_HEADERS")?,
            max_age_secs: parse_number(&lookup, "RESTAPI_CACHE_MAX_AGE")?
                .unwrap_or(defaults.cache.max_age_secs),
        };
        let no_results_status = match parse_number(&lookup, "RESTAPI_NO_RESULTS_STATUS")? {
            Some(code) => u16::try_from(code)
                .ok()
                .and_then(|c| StatusCode::from_u16(c).ok())
                .ok_or_else(|| ConfigError::Load(format!("RESTAPI_NO_RESULTS_STATUS: invalid status {}", code)))?,
            None => defaults.no_results_status,
        };
        let max_limit = match parse_number(&lookup, "RESTAPI_MAX_LIMIT")? {
            Some(0) => return Err(ConfigError::Load("RESTAPI_MAX_LIMIT: must be positive".into())),
            Some(n) if n > MAX_WINDOW => {
                return Err(ConfigError::Load(format!("RESTAPI_MAX_LIMIT: {} exceeds {}", n, MAX_WINDOW)))
            }
            Some(n) => n,
            None => defaults.max_limit,
        };
        Ok(ServiceSettings {
            cache,
            no_results_status,
            max_limit,
        })
    }
}

fn parse_flag<F>(lookup: &F, key: &str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(false),
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" | "no" | "off" => Ok(false),
            "1" | "true" | "yes" | "on" => Ok(true),
            other => Err(ConfigError::Load(format!("{}: expected a boolean, got '{}'", key, other))),
        },
    }
}

fn parse_number<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| {
            v.trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::Load(format!("{}: expected a number, got '{}'", key, v)))
        })
        .transpose()
}
