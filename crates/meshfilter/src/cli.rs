//! Command-line interface.

use clap::Parser;
use std::path::PathBuf;

use crate::config::RelayConfig;
use crate::error::ConfigError;

/// Filter mesh radio MQTT traffic on the sender's "ok to MQTT" flag.
///
/// Messages are republished under the output topic only when the sending
/// node allowed relaying, or when the sender is exempt.
#[derive(Parser, Debug, Default)]
#[command(name = "meshfilter", version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// MQTT broker hostname or IP
    #[arg(long)]
    pub broker: Option<String>,

    /// MQTT broker port [default: 1883]
    #[arg(long)]
    pub port: Option<u16>,

    /// MQTT username
    #[arg(long)]
    pub username: Option<String>,

    /// MQTT password
    #[arg(long)]
    pub password: Option<String>,

    /// Input topic to subscribe to (e.g. msh/US/#)
    #[arg(long)]
    pub input_topic: Option<String>,

    /// Output topic prefix for forwarded messages (e.g. filtered/msh/US)
    #[arg(long)]
    pub output_topic: Option<String>,

    /// MQTT client ID [default: meshtastic_filter]
    #[arg(long)]
    pub client_id: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Log a statistics summary on a timer
    #[arg(long)]
    pub show_stats: bool,

    /// Do not try the default LongFast key
    #[arg(long)]
    pub no_decrypt_default: bool,

    /// Additional channel key (base64); repeatable
    #[arg(long = "channel-key", value_name = "KEY")]
    pub channel_keys: Vec<String>,

    /// Node always forwarded (!xxxxxxxx, 0x..., hex or decimal); repeatable
    #[arg(long = "exempt-node", value_name = "NODE")]
    pub exempt_nodes: Vec<String>,

    /// Forward decoded packets that carry no bitfield
    #[arg(long)]
    pub allow_no_bitfield: bool,

    /// Append rejected messages as JSON lines to this file
    #[arg(long, value_name = "PATH")]
    pub reject_log: Option<PathBuf>,
}

impl Cli {
    /// Load the config file if given, apply flag overrides, and validate.
    pub fn load_config(&self) -> Result<RelayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::load(path)?,
            None => RelayConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Override `config` with every flag that was given.
    pub fn apply(&self, config: &mut RelayConfig) {
        let broker = &mut config.broker;
        if let Some(host) = &self.broker {
            broker.host = host.clone();
        }
        if let Some(port) = self.port {
            broker.port = port;
        }
        if let Some(username) = &self.username {
            broker.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            broker.password = Some(password.clone());
        }
        if let Some(client_id) = &self.client_id {
            broker.client_id = client_id.clone();
        }

        if let Some(input) = &self.input_topic {
            config.topics.input = input.clone();
        }
        if let Some(output) = &self.output_topic {
            config.topics.output = output.clone();
        }

        if self.no_decrypt_default {
            config.decryption.use_default_key = false;
        }
        config
            .decryption
            .channel_keys
            .extend(self.channel_keys.iter().cloned());

        config
            .filter
            .exempt_nodes
            .extend(self.exempt_nodes.iter().cloned());
        if self.allow_no_bitfield {
            config.filter.allow_no_bitfield = true;
        }

        if self.show_stats {
            config.stats.show_stats = true;
        }
        if let Some(path) = &self.reject_log {
            config.reject_log = Some(path.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("meshfilter").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_only() {
        let cli = parse(&[
            "--broker",
            "localhost",
            "--input-topic",
            "msh/US/#",
            "--output-topic",
            "filtered/msh/US",
            "--channel-key",
            "AAAAAAAAAAAAAAAAAAAAAA==",
            "--channel-key",
            "1PG7OiApB1nwvP+rz05pAQ==",
            "--exempt-node",
            "!12345678",
            "--no-decrypt-default",
        ]);
        let config = cli.load_config().unwrap();

        assert_eq!(config.broker.host, "localhost");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.broker.client_id, "meshtastic_filter");
        assert_eq!(config.decryption.channel_keys.len(), 2);
        assert!(!config.decryption.use_default_key);
        assert_eq!(config.filter.exempt_nodes, vec!["!12345678".to_string()]);
    }

    #[test]
    fn test_missing_required_values() {
        let cli = parse(&["--broker", "localhost"]);
        assert!(matches!(cli.load_config(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [broker]
            host = "file-host"
            port = 1884

            [topics]
            input = "msh/EU/#"
            output = "filtered/msh/EU"

            [filter]
            exempt_nodes = ["!00000001"]
            "#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let cli = parse(&[
            "--config",
            &path,
            "--port",
            "1999",
            "--exempt-node",
            "!00000002",
            "--show-stats",
            "--allow-no-bitfield",
        ]);
        let config = cli.load_config().unwrap();

        assert_eq!(config.broker.host, "file-host");
        assert_eq!(config.broker.port, 1999);
        assert_eq!(config.filter.exempt_nodes.len(), 2);
        assert!(config.filter.allow_no_bitfield);
        assert!(config.stats.show_stats);
        assert!(config.decryption.use_default_key);
    }
}
