//! # Mesh Filter
//!
//! A relay for mesh-radio MQTT traffic that only republishes what the
//! sending node allowed to be relayed.
//!
//! ## Overview
//!
//! This crate wires the pure pipeline from [`meshfilter_core`] to a message
//! bus:
//!
//! - [`RelayConfig`] - TOML configuration with defaults, overridden by [`Cli`]
//! - [`Bus`] - subscribe/receive/publish, implemented by [`MqttBus`] and
//!   [`bus::memory::MemoryBus`]
//! - [`Relay`] - the receive, process, publish loop
//! - [`StatsReporter`] - periodic counter summaries
//! - [`JsonLinesRejectLog`] - optional audit trail of rejected messages
//!
//! ## Example
//!
//! ```rust,no_run
//! use meshfilter::{MqttBus, Relay, RelayConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RelayConfig::load("meshfilter.toml".as_ref())?;
//! let relay = Relay::from_config(&config)?;
//! let bus = MqttBus::connect(&config.broker);
//!
//! let totals = relay.run(&bus).await?;
//! println!("forwarded {} of {}", totals.forwarded, totals.total);
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod cli;
pub mod config;
pub mod error;
pub mod mqtt;
pub mod relay;
pub mod reject_log;
pub mod report;

pub use bus::{Bus, InboundMessage};
pub use cli::Cli;
pub use config::{
    BrokerConfig, DecryptionConfig, FilterConfig, RelayConfig, StatsConfig, TopicsConfig,
};
pub use error::{BusError, ConfigError, RelayError, Result};
pub use mqtt::MqttBus;
pub use reject_log::JsonLinesRejectLog;
pub use relay::Relay;
pub use report::{summary_lines, StatsReporter};
