//! Live Quote Client Settings
//!
//! Configuration types for the client, loaded from environment variables.

use std::time::Duration;

use crate::application::services::formatting::DEFAULT_LOCALE;
use crate::infrastructure::sse::decoder::DEFAULT_MAX_FRAME_BYTES;

/// Backoff settings for reconnecting the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectSettings {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Growth factor per failed attempt.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.0 = deterministic).
    pub jitter_factor: f64,
    /// Maximum consecutive failures before going offline (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1500),
            max_delay: Duration::from_millis(30_000),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts: 0, // Unlimited
        }
    }
}

/// HTTP stream settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Time allowed to establish the connection.
    pub connect_timeout: Duration,
    /// Silence after which the stream is considered dead (`None` = never).
    pub idle_timeout: Option<Duration>,
    /// Largest pending event the decoder buffers before dropping the stream.
    pub max_frame_bytes: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(45)),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Health check HTTP port (0 = disabled).
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Server-push endpoint.
    pub feed_url: String,
    /// Locale used when rendering quotes.
    pub locale: String,
    /// Backoff settings.
    pub reconnect: ReconnectSettings,
    /// HTTP stream settings.
    pub transport: TransportSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl StreamConfig {
    /// Configuration with defaults for everything but the endpoint.
    #[must_use]
    pub fn new(feed_url: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            locale: DEFAULT_LOCALE.to_string(),
            reconnect: ReconnectSettings::default(),
            transport: TransportSettings::default(),
            server: ServerSettings::default(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `LIVE_MARKET_FEED_URL` is missing or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `LIVE_MARKET_FEED_URL` is missing or empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let feed_url = lookup("LIVE_MARKET_FEED_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("LIVE_MARKET_FEED_URL".to_string()))?;

        let feed_url = feed_url.trim().to_string();
        if feed_url.is_empty() {
            return Err(ConfigError::EmptyValue("LIVE_MARKET_FEED_URL".to_string()));
        }

        let locale = lookup("LIVE_MARKET_LOCALE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string());

        let defaults = ReconnectSettings::default();
        let reconnect = ReconnectSettings {
            initial_delay: parse_duration_millis(
                &lookup,
                "LIVE_MARKET_RECONNECT_BASE_MS",
                defaults.initial_delay,
            ),
            max_delay: parse_duration_millis(
                &lookup,
                "LIVE_MARKET_RECONNECT_MAX_MS",
                defaults.max_delay,
            ),
            multiplier: parse_or(&lookup, "LIVE_MARKET_RECONNECT_MULTIPLIER", defaults.multiplier),
            jitter_factor: lookup("LIVE_MARKET_RECONNECT_JITTER")
                .and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|f| f.is_finite())
                .unwrap_or(defaults.jitter_factor)
                .clamp(0.0, 1.0),
            max_attempts: parse_or(
                &lookup,
                "LIVE_MARKET_MAX_RECONNECT_ATTEMPTS",
                defaults.max_attempts,
            ),
        };

        let transport_defaults = TransportSettings::default();
        let transport = TransportSettings {
            connect_timeout: parse_duration_secs(
                &lookup,
                "LIVE_MARKET_CONNECT_TIMEOUT_SECS",
                transport_defaults.connect_timeout,
            ),
            idle_timeout: match parse_or(
                &lookup,
                "LIVE_MARKET_IDLE_TIMEOUT_SECS",
                transport_defaults.idle_timeout.map_or(0, |d| d.as_secs()),
            ) {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            max_frame_bytes: match parse_or(
                &lookup,
                "LIVE_MARKET_MAX_FRAME_BYTES",
                transport_defaults.max_frame_bytes,
            ) {
                0 => transport_defaults.max_frame_bytes,
                bytes => bytes,
            },
        };

        let server = ServerSettings {
            health_port: parse_or(
                &lookup,
                "LIVE_MARKET_HEALTH_PORT",
                ServerSettings::default().health_port,
            ),
        };

        Ok(Self {
            feed_url,
            locale,
            reconnect,
            transport,
            server,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<StreamConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StreamConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn feed_url_is_required() {
        assert_eq!(
            load(&[]),
            Err(ConfigError::MissingEnvVar("LIVE_MARKET_FEED_URL".to_string()))
        );
        assert_eq!(
            load(&[("LIVE_MARKET_FEED_URL", "  ")]),
            Err(ConfigError::EmptyValue("LIVE_MARKET_FEED_URL".to_string()))
        );
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("LIVE_MARKET_FEED_URL", "http://localhost/stream")]).unwrap();

        assert_eq!(config, StreamConfig::new("http://localhost/stream"));
        assert_eq!(config.locale, "en-US");
        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(1500));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(30));
        assert_eq!(config.reconnect.max_attempts, 0);
        assert_eq!(config.transport.idle_timeout, Some(Duration::from_secs(45)));
        assert_eq!(config.transport.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.transport.max_frame_bytes, 1024 * 1024);
        assert_eq!(config.server.health_port, 8083);
    }

    #[test]
    fn overrides_apply() {
        let config = load(&[
            ("LIVE_MARKET_FEED_URL", "http://feed"),
            ("LIVE_MARKET_LOCALE", "ar-SA"),
            ("LIVE_MARKET_RECONNECT_BASE_MS", "250"),
            ("LIVE_MARKET_RECONNECT_MAX_MS", "5000"),
            ("LIVE_MARKET_RECONNECT_MULTIPLIER", "3"),
            ("LIVE_MARKET_RECONNECT_JITTER", "0.2"),
            ("LIVE_MARKET_MAX_RECONNECT_ATTEMPTS", "4"),
            ("LIVE_MARKET_IDLE_TIMEOUT_SECS", "0"),
            ("LIVE_MARKET_CONNECT_TIMEOUT_SECS", "3"),
            ("LIVE_MARKET_MAX_FRAME_BYTES", "4096"),
            ("LIVE_MARKET_HEALTH_PORT", "0"),
        ])
        .unwrap();

        assert_eq!(config.locale, "ar-SA");
        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(250));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(5));
        assert!((config.reconnect.multiplier - 3.0).abs() < f64::EPSILON);
        assert!((config.reconnect.jitter_factor - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.reconnect.max_attempts, 4);
        assert_eq!(config.transport.idle_timeout, None);
        assert_eq!(config.transport.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.transport.max_frame_bytes, 4096);
        assert_eq!(config.server.health_port, 0);
    }

    #[test]
    fn unparseable_values_fall_back() {
        let config = load(&[
            ("LIVE_MARKET_FEED_URL", "http://feed"),
            ("LIVE_MARKET_RECONNECT_BASE_MS", "soon"),
            ("LIVE_MARKET_HEALTH_PORT", "99999"),
            ("LIVE_MARKET_RECONNECT_JITTER", "7"),
        ])
        .unwrap();

        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(1500));
        assert_eq!(config.server.health_port, 8083);
        assert!((config.reconnect.jitter_factor - 1.0).abs() < f64::EPSILON);
    }

    #[test_case("NaN" ; "nan")]
    #[test_case("inf" ; "infinity")]
    #[test_case("-inf" ; "negative infinity")]
    #[test_case("later" ; "garbage")]
    fn non_finite_jitter_falls_back_to_default(raw: &str) {
        let config = load(&[
            ("LIVE_MARKET_FEED_URL", "http://feed"),
            ("LIVE_MARKET_RECONNECT_JITTER", raw),
        ])
        .unwrap();

        assert!(config.reconnect.jitter_factor.is_finite());
        assert!(config.reconnect.jitter_factor.abs() < f64::EPSILON);
    }
}
