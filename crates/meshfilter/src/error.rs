//! Error types for the relay service.

use std::path::PathBuf;

use thiserror::Error;

use meshfilter_core::TopicError;

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`crate::RelayConfig`].
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is present but unusable.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// The topic pair cannot be mapped.
    #[error("invalid topics: {0}")]
    Topic(#[from] TopicError),
}

/// Errors from the message bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// The MQTT client rejected a request.
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// The bus is no longer accepting requests.
    #[error("bus closed")]
    Closed,
}

/// Errors that stop the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bus(#[from] BusError),

    /// The reject log could not be opened.
    #[error("failed to open reject log {path}: {source}")]
    RejectLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
