use std::time::Duration;

use serde::Deserialize;

/// Notifier configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    /// CloudEvents sink URL. Without it no transport is configured.
    pub sink_url: Option<String>,

    /// Delay before the first retry, in milliseconds (default: 10)
    pub retry_base_ms: u64,

    /// Total send attempts per notification (default: 10)
    pub max_attempts: u32,

    /// Upper bound for a single backoff delay, in milliseconds (default: 5000)
    pub max_delay_ms: u64,

    /// Per-request HTTP timeout in milliseconds (default: 5000)
    pub http_timeout_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            sink_url: None,
            retry_base_ms: 10,
            max_attempts: 10,
            max_delay_ms: 5000,
            http_timeout_ms: 5000,
        }
    }
}

impl NotifierConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            sink_url: lookup("CLOUD_EVENTS_SINK").filter(|s| !s.trim().is_empty()),
            retry_base_ms: parse_or(&lookup, "CLOUD_EVENTS_RETRY_BASE_MS", defaults.retry_base_ms)?,
            max_attempts: parse_or(&lookup, "CLOUD_EVENTS_MAX_ATTEMPTS", defaults.max_attempts)?,
            max_delay_ms: parse_or(&lookup, "CLOUD_EVENTS_MAX_DELAY_MS", defaults.max_delay_ms)?,
            http_timeout_ms: parse_or(
                &lookup,
                "CLOUD_EVENTS_HTTP_TIMEOUT_MS",
                defaults.http_timeout_ms,
            )?,
        };

        if config.max_attempts == 0 {
            anyhow::bail!("CLOUD_EVENTS_MAX_ATTEMPTS must be at least 1");
        }

        Ok(config)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got {:?}", key, raw)),
        None => Ok(default),
    }
}
