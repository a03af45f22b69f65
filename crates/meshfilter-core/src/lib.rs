//! # Mesh Filter Core
//!
//! The message pipeline of a bus relay for a mesh-radio network: decide,
//! per message, whether the original sender allowed it to be republished.
//!
//! This crate contains no I/O and no networking. It takes raw message
//! bytes and the topic they arrived on, and returns a classification plus
//! an optional publish instruction.
//!
//! ## Pipeline
//!
//! ```text
//! bytes ─ Envelope::parse ─ decrypt (if encrypted) ─ evaluate ─ record ─┬─ Publish
//!                                                                      └─ (dropped)
//! ```
//!
//! - [`KeyRegistry`] - ordered keys and per-channel key derivation
//! - [`crypto::decrypt`] - AES-CTR trial decryption over candidate keys
//! - [`authz::evaluate`] - exemption and bitfield rules
//! - [`TopicMapper`] - input-prefix to output-prefix rewriting
//! - [`OutcomeRecorder`] - thread-safe counters with consistent snapshots
//! - [`Pipeline`] - composes the above
//!
//! ## Usage
//!
//! ```rust
//! use bytes::Bytes;
//! use meshfilter_core::{ExemptNodeSet, KeyRegistry, Pipeline, Policy, TopicMapper};
//!
//! let pipeline = Pipeline::new(
//!     KeyRegistry::default(),
//!     Policy::new(ExemptNodeSet::from_entries(["!12345678"]), false),
//!     TopicMapper::new("msh/US/#", "filtered/msh/US").unwrap(),
//! );
//!
//! // Not a valid envelope: reported as a parse error and not counted.
//! assert!(pipeline.process(Bytes::from_static(b"\xff"), "msh/US/2/e").is_err());
//! assert_eq!(pipeline.recorder().snapshot().total, 0);
//! ```

pub mod authz;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod pipeline;
pub mod proto;
pub mod reject;
pub mod stats;
pub mod topic;
pub mod types;

pub use authz::{evaluate, ExemptNodeSet, Outcome, Policy, RejectReason, OK_TO_MQTT_MASK};
pub use crypto::{apply_keystream, decrypt, DecryptionFailed, Decrypted, Nonce};
pub use envelope::{DecodedData, Envelope, Packet, Payload, Port};
pub use error::{InvalidNodeId, KeyError, ParseError, PipelineError, TopicError};
pub use keys::{
    CandidateKey, ChannelKey, CipherKey, KeyMaterial, KeyRegistry, KeyRegistryBuilder,
    DEFAULT_KEY, DEFAULT_PRESET_NAME,
};
pub use pipeline::{Decision, Pipeline, Publish};
pub use proto::PortNum;
pub use reject::{RejectRecord, RejectSink, TracingRejectSink};
pub use stats::{DecryptStatus, OutcomeRecorder, Snapshot};
pub use topic::TopicMapper;
pub use types::NodeId;
