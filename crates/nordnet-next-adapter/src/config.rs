/*
[INPUT]:  Caller or file supplied client settings
[OUTPUT]: Validated configuration for the REST client, session manager and feeds
[POS]:    Configuration layer - client construction
[UPDATE]: When adding new configuration options
*/

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::LoginEncryptor;
use crate::feed::{DEFAULT_EVENT_CAPACITY, DEFAULT_MAX_FRAME_BYTES};
use crate::http::{ClientConfig, Result};
use crate::types::{Environment, FeedTransport};

const DEFAULT_SHORTEN_EXPIRES_MS: u64 = 1000;

/// Where the login RSA public key comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicKeySource {
    /// PEM text
    Pem(String),
    /// PEM file read at client construction
    Path(PathBuf),
}

impl PublicKeySource {
    /// Parse the key; fails with `KeyFormat` when unreadable or not an RSA public key
    pub fn load(&self) -> Result<LoginEncryptor> {
        match self {
            PublicKeySource::Pem(pem) => LoginEncryptor::from_pem(pem),
            PublicKeySource::Path(path) => LoginEncryptor::from_pem_file(path),
        }
    }
}

/// Feed socket configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub transport: FeedTransport,
    pub connect_timeout_ms: u64,
    /// Upper bound on writing and flushing one command
    pub write_timeout_ms: u64,
    pub max_frame_bytes: usize,
    /// Events buffered per feed kind for slow listeners
    pub event_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            transport: FeedTransport::Tls,
            connect_timeout_ms: 10_000,
            write_timeout_ms: 10_000,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl FeedConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NordnetConfig {
    #[serde(default)]
    pub environment: Environment,
    /// Overrides the environment's base URL
    #[serde(default)]
    pub base_url: Option<String>,
    /// Pre-existing session key; lets REST calls work before `authenticate`
    #[serde(default)]
    pub session_key: Option<String>,
    /// Milliseconds before session expiry at which to re-authenticate
    #[serde(default = "default_shorten_expires_ms")]
    pub shorten_expires_ms: u64,
    pub public_key: PublicKeySource,
    #[serde(default)]
    pub http: ClientConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

impl NordnetConfig {
    pub fn new(public_key: PublicKeySource) -> Self {
        Self {
            environment: Environment::default(),
            base_url: None,
            session_key: None,
            shorten_expires_ms: DEFAULT_SHORTEN_EXPIRES_MS,
            public_key,
            http: ClientConfig::default(),
            feed: FeedConfig::default(),
        }
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_session_key(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = Some(session_key.into());
        self
    }

    #[must_use]
    pub fn with_shorten_expires(mut self, shorten_expires: Duration) -> Self {
        self.shorten_expires_ms = u64::try_from(shorten_expires.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_feed_transport(mut self, transport: FeedTransport) -> Self {
        self.feed.transport = transport;
        self
    }

    /// REST base URL in effect
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }

    pub fn shorten_expires(&self) -> Duration {
        Duration::from_millis(self.shorten_expires_ms)
    }
}

fn default_shorten_expires_ms() -> u64 {
    DEFAULT_SHORTEN_EXPIRES_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NordnetConfig::new(PublicKeySource::Pem(String::new()));
        assert_eq!(config.environment, Environment::Test);
        assert_eq!(config.base_url(), "https://api.test.nordnet.se/next/2/");
        assert_eq!(config.shorten_expires(), Duration::from_millis(1000));
        assert_eq!(config.http.timeout(), Duration::from_secs(10));
        assert_eq!(config.feed.transport, FeedTransport::Tls);
    }

    #[test]
    fn test_builders() {
        let config = NordnetConfig::new(PublicKeySource::Path("key.pem".into()))
            .with_environment(Environment::Live)
            .with_session_key("sk")
            .with_shorten_expires(Duration::from_secs(30))
            .with_feed_transport(FeedTransport::Plain);

        assert_eq!(config.base_url(), "https://api.nordnet.se/next/2/");
        assert_eq!(config.session_key.as_deref(), Some("sk"));
        assert_eq!(config.shorten_expires_ms, 30_000);
        assert_eq!(config.feed.transport, FeedTransport::Plain);

        let config = config.with_base_url("http://127.0.0.1:8080/next/2/");
        assert_eq!(config.base_url(), "http://127.0.0.1:8080/next/2/");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let raw = serde_json::json!({
            "environment": "live",
            "public_key": { "path": "/etc/nextapi/NEXTAPI_public.pem" },
            "feed": { "transport": "plain" }
        });
        let config: NordnetConfig = serde_json::from_value(raw).unwrap();

        assert_eq!(config.environment, Environment::Live);
        assert_eq!(
            config.public_key,
            PublicKeySource::Path("/etc/nextapi/NEXTAPI_public.pem".into())
        );
        assert_eq!(config.shorten_expires_ms, 1000);
        assert_eq!(config.feed.transport, FeedTransport::Plain);
        assert_eq!(config.feed.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
        assert_eq!(config.feed.write_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_public_key_source_load_failure() {
        let err = PublicKeySource::Pem("garbage".to_string()).load().unwrap_err();
        assert!(matches!(err, crate::http::NordnetError::KeyFormat(_)));
    }
}
