//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Human readable text
    Text,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Port of the metrics and probe server
    pub metrics_port: u16,
    /// How long to wait for the HTTP server to report ready (seconds)
    pub server_startup_timeout_secs: u64,
    /// Readiness poll interval while waiting for the HTTP server (milliseconds)
    pub server_poll_interval_ms: u64,
    /// Restrict watches to this namespace; `None` watches all namespaces
    pub watch_namespace: Option<String>,
    /// Base URL of the email provider API
    pub mailer_api_base_url: String,
    /// Timeout of one outbound send request (seconds)
    pub mailer_request_timeout_secs: u64,
    /// Key inside the referenced Secret that holds the API token
    pub api_token_key: String,
    /// Smallest requeue delay after a store failure (seconds)
    pub backoff_min_secs: u64,
    /// Largest requeue delay after repeated store failures (seconds)
    pub backoff_max_secs: u64,
    /// Delay before restarting a watch stream that ended (seconds)
    pub watch_restart_delay_secs: u64,
    /// Field manager recorded on status patches
    pub field_manager: String,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            server_startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            server_poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
            watch_namespace: None,
            mailer_api_base_url: DEFAULT_MAILER_API_BASE_URL.to_string(),
            mailer_request_timeout_secs: DEFAULT_MAILER_REQUEST_TIMEOUT_SECS,
            api_token_key: DEFAULT_API_TOKEN_KEY.to_string(),
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// `from_env` is this with the process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backoff_min_secs = parse_or(&lookup, "BACKOFF_MIN_SECS", defaults.backoff_min_secs);
        let backoff_max_secs =
            parse_or(&lookup, "BACKOFF_MAX_SECS", defaults.backoff_max_secs).max(backoff_min_secs);

        Self {
            metrics_port: parse_or(&lookup, "METRICS_PORT", defaults.metrics_port),
            server_startup_timeout_secs: parse_or(
                &lookup,
                "SERVER_STARTUP_TIMEOUT_SECS",
                defaults.server_startup_timeout_secs,
            ),
            server_poll_interval_ms: parse_or(
                &lookup,
                "SERVER_POLL_INTERVAL_MS",
                defaults.server_poll_interval_ms,
            ),
            watch_namespace: string("WATCH_NAMESPACE"),
            mailer_api_base_url: string("MAILER_API_BASE_URL")
                .unwrap_or(defaults.mailer_api_base_url),
            mailer_request_timeout_secs: parse_or(
                &lookup,
                "MAILER_REQUEST_TIMEOUT_SECS",
                defaults.mailer_request_timeout_secs,
            ),
            api_token_key: string("API_TOKEN_KEY").unwrap_or(defaults.api_token_key),
            backoff_min_secs,
            backoff_max_secs,
            watch_restart_delay_secs: parse_or(
                &lookup,
                "WATCH_RESTART_DELAY_SECS",
                defaults.watch_restart_delay_secs,
            ),
            field_manager: string("FIELD_MANAGER").unwrap_or(defaults.field_manager),
            log_format: lookup("LOG_FORMAT")
                .map_or(defaults.log_format, |v| LogFormat::parse(&v)),
        }
    }

    /// Get outbound request timeout
    pub fn mailer_request_timeout(&self) -> Duration {
        Duration::from_secs(self.mailer_request_timeout_secs)
    }

    /// Get server startup timeout
    pub fn server_startup_timeout(&self) -> Duration {
        Duration::from_secs(self.server_startup_timeout_secs)
    }

    /// Get server readiness poll interval
    pub fn server_poll_interval(&self) -> Duration {
        Duration::from_millis(self.server_poll_interval_ms)
    }

    /// Get watch restart delay
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

/// Read a value through `lookup` and parse it, or return the default
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ControllerConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ControllerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_environment_empty() {
        let config = config_from(&[]);
        assert_eq!(config.metrics_port, 5000);
        assert_eq!(config.mailer_api_base_url, "https://api.mailersend.com");
        assert_eq!(config.api_token_key, "apiToken");
        assert_eq!(config.watch_namespace, None);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_overrides_from_environment() {
        let config = config_from(&[
            ("METRICS_PORT", "9090"),
            ("WATCH_NAMESPACE", "mail"),
            ("MAILER_API_BASE_URL", "http://localhost:8080"),
            ("MAILER_REQUEST_TIMEOUT_SECS", "3"),
            ("API_TOKEN_KEY", "token"),
            ("LOG_FORMAT", "JSON"),
        ]);
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.watch_namespace.as_deref(), Some("mail"));
        assert_eq!(config.mailer_api_base_url, "http://localhost:8080");
        assert_eq!(config.mailer_request_timeout(), Duration::from_secs(3));
        assert_eq!(config.api_token_key, "token");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_unparseable_values_fall_back_to_defaults() {
        let config = config_from(&[("METRICS_PORT", "not-a-port"), ("WATCH_NAMESPACE", "  ")]);
        assert_eq!(config.metrics_port, 5000);
        assert_eq!(config.watch_namespace, None);
    }

    #[test]
    fn test_backoff_max_never_below_min() {
        let config = config_from(&[("BACKOFF_MIN_SECS", "60"), ("BACKOFF_MAX_SECS", "10")]);
        assert_eq!(config.backoff_min_secs, 60);
        assert_eq!(config.backoff_max_secs, 60);
    }
}
