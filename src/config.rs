use std::time::Duration;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Forum
    pub discourse_url: String,
    pub filter_keywords: String,

    // Polling
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub fetch_error_policy: FetchErrorPolicy,
    pub deduplicate_posts: bool,

    // Notifications
    pub notify_sink: SinkKind,
}

/// What the checker does when a fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorPolicy {
    /// Stop polling and report the error to the caller
    FailFast,
    /// Log the error and keep polling
    Continue,
}

/// Where matched posts are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// One line per hit on stdout
    Console,
    /// A structured tracing event per hit
    Log,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Forum
            discourse_url: required_env("DISCOURSE_URL")?,
            filter_keywords: std::env::var("FILTER_KEYWORDS").unwrap_or_default(),

            // Polling
            poll_interval: Duration::from_secs(parse_env_u64("POLL_INTERVAL_SECS", 60)?),
            request_timeout: Duration::from_secs(parse_env_u64("REQUEST_TIMEOUT_SECS", 10)?),
            fetch_error_policy: parse_fetch_error_policy(&env_or_default(
                "FETCH_ERROR_POLICY",
                "fail-fast",
            ))?,
            deduplicate_posts: parse_env_bool("DEDUPLICATE_POSTS", false)?,

            // Notifications
            notify_sink: parse_sink_kind(&env_or_default("NOTIFY_SINK", "console"))?,
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discourse_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "DISCOURSE_URL".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        let url = Url::parse(&self.discourse_url).map_err(|e| ConfigError::InvalidValue {
            name: "DISCOURSE_URL".to_string(),
            message: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                name: "DISCOURSE_URL".to_string(),
                message: format!("scheme must be http or https, got '{}'", url.scheme()),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "POLL_INTERVAL_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "REQUEST_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout >= self.poll_interval {
            return Err(ConfigError::InvalidValue {
                name: "REQUEST_TIMEOUT_SECS".to_string(),
                message: format!(
                    "must be shorter than the poll interval ({}s)",
                    self.poll_interval.as_secs()
                ),
            });
        }
        Ok(())
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}

fn parse_fetch_error_policy(value: &str) -> Result<FetchErrorPolicy, ConfigError> {
    match value.to_lowercase().as_str() {
        "fail-fast" | "fail_fast" => Ok(FetchErrorPolicy::FailFast),
        "continue" => Ok(FetchErrorPolicy::Continue),
        _ => Err(ConfigError::InvalidValue {
            name: "FETCH_ERROR_POLICY".to_string(),
            message: format!("must be 'fail-fast' or 'continue', got '{value}'"),
        }),
    }
}

fn parse_sink_kind(value: &str) -> Result<SinkKind, ConfigError> {
    match value.to_lowercase().as_str() {
        "console" => Ok(SinkKind::Console),
        "log" => Ok(SinkKind::Log),
        _ => Err(ConfigError::InvalidValue {
            name: "NOTIFY_SINK".to_string(),
            message: format!("must be 'console' or 'log', got '{value}'"),
        }),
    }
}
