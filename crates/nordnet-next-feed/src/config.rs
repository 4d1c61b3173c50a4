/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed client settings and feed subscriptions
[POS]:    Configuration layer - runner setup
[UPDATE]: When adding new configuration options
*/

use std::path::Path;

use anyhow::{Context, bail};
use nordnet_next_adapter::{NordnetConfig, PublicKeySource};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level configuration for the feed runner
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// nExt client settings
    pub client: NordnetConfig,
    /// Public feed subscriptions applied after every feed login
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,
}

/// One public feed subscription
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubscriptionConfig {
    /// Event type, e.g. "price", "trade", "depth"
    #[serde(rename = "type")]
    pub event_type: String,
    /// Arguments such as `{i: "101", m: 11}`
    #[serde(default)]
    pub args: Value,
}

impl RunnerConfig {
    /// Load configuration from YAML file.
    ///
    /// A relative public key path is resolved against the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        let mut config = Self::from_yaml(&content)?;

        if let PublicKeySource::Path(key_path) = &mut config.client.public_key
            && key_path.is_relative()
            && let Some(dir) = path.parent()
        {
            *key_path = dir.join(&*key_path);
        }
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("parse YAML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for (index, subscription) in self.subscriptions.iter().enumerate() {
            if subscription.event_type.trim().is_empty() {
                bail!("subscription {index} has an empty type");
            }
            if !(subscription.args.is_object() || subscription.args.is_null()) {
                bail!(
                    "subscription {index} ({}) args must be a mapping",
                    subscription.event_type
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nordnet_next_adapter::{Environment, FeedTransport};
    use serde_json::json;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
client:
  environment: live
  shorten_expires_ms: 5000
  public_key:
    path: /etc/nextapi/NEXTAPI_public.pem
  feed:
    transport: tls
    max_frame_bytes: 65536
subscriptions:
  - type: price
    args: { i: "101", m: 11 }
  - type: indicator
    args: { i: "SIX-IDX-DJI", m: "SIX" }
"#;
        let config = RunnerConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.client.environment, Environment::Live);
        assert_eq!(config.client.shorten_expires_ms, 5000);
        assert_eq!(config.client.feed.transport, FeedTransport::Tls);
        assert_eq!(config.client.feed.max_frame_bytes, 65536);
        assert_eq!(config.subscriptions.len(), 2);
        assert_eq!(config.subscriptions[0].event_type, "price");
        assert_eq!(config.subscriptions[0].args, json!({"i": "101", "m": 11}));
    }

    #[test]
    fn test_subscriptions_default_to_empty() {
        let yaml = "client:\n  public_key:\n    pem: x\n";
        let config = RunnerConfig::from_yaml(yaml).unwrap();
        assert!(config.subscriptions.is_empty());
        assert_eq!(config.client.environment, Environment::Test);
    }

    #[test]
    fn test_rejects_non_mapping_args() {
        let yaml = r#"
client:
  public_key: { pem: x }
subscriptions:
  - type: price
    args: [1, 2]
"#;
        let err = RunnerConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("args must be a mapping"));
    }

    #[test]
    fn test_rejects_missing_public_key() {
        assert!(RunnerConfig::from_yaml("client: {}\n").is_err());
    }

    #[test]
    fn test_from_file_resolves_key_next_to_config() {
        let dir = std::env::temp_dir().join(format!("nordnet-next-feed-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feed.yaml");
        std::fs::write(&path, "client:\n  public_key:\n    path: keys/public.pem\n").unwrap();

        let config = RunnerConfig::from_file(&path).unwrap();
        assert_eq!(
            config.client.public_key,
            PublicKeySource::Path(dir.join("keys/public.pem"))
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_from_file_accepts_non_utf8_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = std::env::temp_dir().join(format!("nordnet-next-feed-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(OsStr::from_bytes(b"feed-\xff.yaml"));
        if std::fs::write(&path, "client:\n  public_key: { pem: x }\n").is_err() {
            // Filesystem rejects non UTF-8 names
            std::fs::remove_dir_all(&dir).unwrap();
            return;
        }

        let config = RunnerConfig::from_file(&path).unwrap();
        assert_eq!(config.client.public_key, PublicKeySource::Pem("x".to_string()));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_from_file_missing_names_path() {
        let err = RunnerConfig::from_file("/nonexistent/feed.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/feed.yaml"));
    }
}
