use std::{net::SocketAddr, str::FromStr, time::Duration};

use chrono_tz::Tz;
use quotecache_core::quotes::{
    constants::{DATA_SOURCE_ALPHA_VANTAGE, DATA_SOURCE_FINNHUB, DATA_SOURCE_YAHOO},
    ProviderConfig, QuoteCacheConfig, StalePolicy,
};
use quotecache_market_data::RateLimitConfig;
use thiserror::Error;

/// `QC_DB_PATH` value that keeps snapshots in memory only.
pub const IN_MEMORY_DB: &str = ":memory:";

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DB_PATH: &str = "./db/quotes.db";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_RATE_WINDOW_SECS: u64 = 60;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {key}={value}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// SQLite file, or [`IN_MEMORY_DB`].
    pub db_path: String,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub providers: Vec<ProviderConfig>,
    pub cache: QuoteCacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            db_path: DEFAULT_DB_PATH.to_string(),
            cors_allow: vec!["*".to_string()],
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            providers: Vec::new(),
            cache: QuoteCacheConfig::default(),
        }
    }
}

impl Config {
    /// Reads `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let listen_addr: SocketAddr = env
            .parse("QC_LISTEN_ADDR")?
            .unwrap_or(parse_value("QC_LISTEN_ADDR", DEFAULT_LISTEN_ADDR)?);
        let db_path = env.get("QC_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.into());
        let cors_allow = env
            .get("QC_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = env
            .parse("QC_REQUEST_TIMEOUT_MS")?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);

        let defaults = QuoteCacheConfig::default();
        let mut session_ttls = defaults.session_ttls;
        if let Some(secs) = env.parse("QC_TTL_OPEN_SECS")? {
            session_ttls.open_secs = secs;
        }
        if let Some(secs) = env.parse("QC_TTL_EXTENDED_SECS")? {
            session_ttls.extended_secs = secs;
        }
        if let Some(secs) = env.parse("QC_TTL_CLOSED_SECS")? {
            session_ttls.closed_secs = secs;
        }

        let stale_policy = match env.parse_bool("QC_STALE_FALLBACK")? {
            Some(true) => StalePolicy::ServeStale,
            _ => StalePolicy::Unavailable,
        };

        let cache = QuoteCacheConfig {
            exchange_tz: env.parse::<Tz>("QC_EXCHANGE_TZ")?.unwrap_or(defaults.exchange_tz),
            session_ttls,
            stale_policy,
            max_batch_size: env.parse("QC_MAX_BATCH")?.unwrap_or(defaults.max_batch_size),
            batch_concurrency: env
                .parse("QC_BATCH_CONCURRENCY")?
                .unwrap_or(defaults.batch_concurrency),
            provider_timeout: env
                .parse("QC_PROVIDER_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.provider_timeout),
        };

        let providers = vec![
            env.provider(DATA_SOURCE_FINNHUB, Some("FINNHUB_API_KEY"))?,
            env.provider(DATA_SOURCE_ALPHA_VANTAGE, Some("ALPHA_VANTAGE_API_KEY"))?,
            env.provider(DATA_SOURCE_YAHOO, None)?,
        ];

        Ok(Self {
            listen_addr,
            db_path,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            providers,
            cache,
        })
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path == IN_MEMORY_DB
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key).map(|v| parse_value(key, &v)).transpose()
    }

    fn parse_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" => Ok(Some(false)),
                _ => Err(invalid(key, &v, "expected a boolean")),
            },
        }
    }

    /// `QC_<ID>_DISABLED`, `QC_<ID>_PRIORITY`, `QC_<ID>_MAX_CALLS` and
    /// `QC_<ID>_WINDOW_SECS` for one provider. `QC_DISABLE_YAHOO` is
    /// accepted as an alias for the keyless provider.
    fn provider(&self, id: &str, key_var: Option<&str>) -> Result<ProviderConfig, ConfigError> {
        let mut config = ProviderConfig::new(id);
        if let Some(var) = key_var {
            config = config.with_api_key(self.get(var));
        }

        let disabled = self.parse_bool(&format!("QC_{}_DISABLED", id))?.unwrap_or(false)
            || (id == DATA_SOURCE_YAHOO
                && self.parse_bool("QC_DISABLE_YAHOO")?.unwrap_or(false));
        if disabled {
            config = config.disabled();
        }

        if let Some(priority) = self.parse(&format!("QC_{}_PRIORITY", id))? {
            config = config.with_priority(priority);
        }

        if let Some(max_calls) = self.parse::<u32>(&format!("QC_{}_MAX_CALLS", id))? {
            if max_calls == 0 {
                return Err(invalid(
                    &format!("QC_{}_MAX_CALLS", id),
                    "0",
                    "budget must be positive",
                ));
            }
            let window_secs = self
                .parse(&format!("QC_{}_WINDOW_SECS", id))?
                .unwrap_or(DEFAULT_RATE_WINDOW_SECS);
            if window_secs == 0 {
                return Err(invalid(
                    &format!("QC_{}_WINDOW_SECS", id),
                    "0",
                    "window must be positive",
                ));
            }
            config = config.with_rate_limit(RateLimitConfig {
                max_calls,
                window: Duration::from_secs(window_secs),
            });
        }

        Ok(config)
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| invalid(key, value, &e.to_string()))
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.db_path, DEFAULT_DB_PATH);
        assert_eq!(config.cache.session_ttls.open_secs, 60);
        assert_eq!(config.cache.stale_policy, StalePolicy::Unavailable);

        // Keyed providers have no key; Yahoo is enabled
        assert!(config.providers[0].api_key.is_none());
        assert!(config.providers[2].enabled);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("QC_TTL_OPEN_SECS", "30"),
            ("QC_STALE_FALLBACK", "true"),
            ("QC_EXCHANGE_TZ", "Europe/London"),
            ("FINNHUB_API_KEY", "fh-key"),
            ("QC_FINNHUB_MAX_CALLS", "30"),
            ("QC_DISABLE_YAHOO", "1"),
        ])
        .unwrap();

        assert_eq!(config.cache.session_ttls.open_secs, 30);
        assert_eq!(config.cache.stale_policy, StalePolicy::ServeStale);
        assert_eq!(config.cache.exchange_tz, chrono_tz::Europe::London);

        let finnhub = &config.providers[0];
        assert_eq!(finnhub.api_key.as_deref(), Some("fh-key"));
        assert_eq!(
            finnhub.rate_limit,
            Some(RateLimitConfig {
                max_calls: 30,
                window: Duration::from_secs(60),
            })
        );
        assert!(!config.providers[2].enabled);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = config(&[("QC_MAX_BATCH", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "QC_MAX_BATCH"));

        assert!(config(&[("QC_EXCHANGE_TZ", "Mars/Olympus")]).is_err());
        assert!(config(&[("QC_STALE_FALLBACK", "maybe")]).is_err());
        assert!(config(&[("QC_YAHOO_MAX_CALLS", "5"), ("QC_YAHOO_WINDOW_SECS", "0")]).is_err());
    }

    #[test]
    fn test_zero_call_budget_is_rejected() {
        let err = config(&[("QC_FINNHUB_MAX_CALLS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "QC_FINNHUB_MAX_CALLS"));
    }
}
