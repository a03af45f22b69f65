//! Error types for the mesh filter core.

use thiserror::Error;

use crate::authz::Outcome;

/// Errors raised while turning raw bus bytes into an [`Envelope`](crate::Envelope).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] prost::DecodeError),

    #[error("envelope carries no packet")]
    MissingPacket,
}

/// A node identifier string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid node id {input:?}: {reason}")]
pub struct InvalidNodeId {
    pub input: String,
    pub reason: &'static str,
}

/// Errors from key configuration.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid base64 key material: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("unsupported key length: {0} bytes (expected 16 or 32)")]
    InvalidLength(usize),
}

/// Topic remapping failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("topic {topic:?} does not start with subscribed prefix {prefix:?}")]
    PrefixMismatch { topic: String, prefix: String },

    #[error("pattern {0:?} has a wildcard before its end")]
    InteriorWildcard(String),

    #[error("output prefix {0:?} must not contain wildcards")]
    WildcardInOutput(String),
}

/// Errors surfaced by [`Pipeline::process`](crate::Pipeline::process).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The message never reached a classifiable state and was not counted.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The message was classified and counted, but could not be routed.
    #[error("topic mapping failed for {outcome:?} message: {source}")]
    TopicMapping {
        outcome: Outcome,
        #[source]
        source: TopicError,
    },
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
