//! Relay configuration file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use meshfilter_core::TopicMapper;

use crate::error::ConfigError;

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Hostname or IP address. Required.
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "meshtastic_filter".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: None,
            password: None,
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

/// Subscription pattern and output prefix. Both required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicsConfig {
    /// Pattern to subscribe to, e.g. `msh/US/#`.
    #[serde(default)]
    pub input: String,

    /// Prefix to republish under, e.g. `filtered/msh/US`.
    #[serde(default)]
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionConfig {
    /// Try the well-known preset key on the preset channel.
    #[serde(default = "default_true")]
    pub use_default_key: bool,

    /// Base64 channel keys (16 or 32 bytes), tried in order.
    #[serde(default)]
    pub channel_keys: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for DecryptionConfig {
    fn default() -> Self {
        Self {
            use_default_key: true,
            channel_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Senders forwarded unconditionally, in any accepted node id form.
    #[serde(default)]
    pub exempt_nodes: Vec<String>,

    /// Forward decoded packets from firmware that predates the bitfield.
    #[serde(default)]
    pub allow_no_bitfield: bool,
}

/// Statistics reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Also report on a timer, not only every `every_messages`.
    #[serde(default)]
    pub show_stats: bool,

    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_every")]
    pub every_messages: u64,
}

fn default_interval() -> u64 {
    30
}

fn default_every() -> u64 {
    10
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            show_stats: false,
            interval_secs: default_interval(),
            every_messages: default_every(),
        }
    }
}

/// Top-level relay configuration.
///
/// Loaded from a TOML file; command-line flags override individual values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub topics: TopicsConfig,

    #[serde(default)]
    pub decryption: DecryptionConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub stats: StatsConfig,

    /// Append a JSON line per rejected message to this file.
    #[serde(default)]
    pub reject_log: Option<PathBuf>,
}

impl RelayConfig {
    /// Load configuration from a TOML file. Not validated, since flags may
    /// still fill in required values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Check that the configuration describes a runnable relay.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.host.trim().is_empty() {
            return Err(ConfigError::Invalid("broker host is required".into()));
        }
        if self.topics.input.is_empty() {
            return Err(ConfigError::Invalid("input topic is required".into()));
        }
        if self.topics.output.is_empty() {
            return Err(ConfigError::Invalid("output topic is required".into()));
        }
        if self.stats.interval_secs == 0 {
            return Err(ConfigError::Invalid("stats interval must be positive".into()));
        }
        if self.stats.every_messages == 0 {
            return Err(ConfigError::Invalid(
                "stats message threshold must be positive".into(),
            ));
        }
        self.topic_mapper()?;
        Ok(())
    }

    pub fn topic_mapper(&self) -> Result<TopicMapper, ConfigError> {
        Ok(TopicMapper::new(&self.topics.input, &self.topics.output)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshfilter_core::TopicError;

    fn minimal() -> RelayConfig {
        RelayConfig::from_toml(
            r#"
            [broker]
            host = "mqtt.example.org"

            [topics]
            input = "msh/US/#"
            output = "filtered/msh/US"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = minimal();
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.broker.client_id, "meshtastic_filter");
        assert_eq!(config.broker.keep_alive_secs, 60);
        assert!(config.decryption.use_default_key);
        assert!(!config.filter.allow_no_bitfield);
        assert_eq!(config.stats.interval_secs, 30);
        assert_eq!(config.stats.every_messages, 10);
        assert!(config.reject_log.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_full_file() {
        let config = RelayConfig::from_toml(
            r#"
            reject_log = "/var/log/meshfilter/rejected.jsonl"

            [broker]
            host = "localhost"
            port = 8883
            username = "relay"
            password = "secret"

            [topics]
            input = "msh/EU_868/#"
            output = "public/msh/EU_868"

            [decryption]
            use_default_key = false
            channel_keys = ["1PG7OiApB1nwvP+rz05pAQ=="]

            [filter]
            exempt_nodes = ["!12345678", "0x87654321"]
            allow_no_bitfield = true

            [stats]
            show_stats = true
            interval_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.broker.port, 8883);
        assert_eq!(config.broker.username.as_deref(), Some("relay"));
        assert!(!config.decryption.use_default_key);
        assert_eq!(config.decryption.channel_keys.len(), 1);
        assert_eq!(config.filter.exempt_nodes.len(), 2);
        assert!(config.stats.show_stats);
        assert_eq!(config.stats.every_messages, 10);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_requires_host_and_topics() {
        let mut config = minimal();
        config.broker.host = " ".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = minimal();
        config.topics.output.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = minimal();
        config.stats.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_wildcard_output() {
        let mut config = minimal();
        config.topics.output = "filtered/+/US".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Topic(TopicError::WildcardInOutput(_)))
        ));
    }

    #[test]
    fn test_unknown_field_type_is_parse_error() {
        let err = RelayConfig::from_toml("[broker]\nport = \"high\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = RelayConfig::load(Path::new("/nonexistent/meshfilter.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
