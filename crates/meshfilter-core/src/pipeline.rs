//! The pipeline: parse, decrypt if needed, authorize, record, route.
//!
//! [`Pipeline::process`] handles one bus message synchronously and to
//! completion. It never publishes; the caller gets a [`Publish`]
//! instruction back and owns the actual send.

use bytes::Bytes;
use std::sync::Arc;

use crate::authz::{Outcome, Policy};
use crate::crypto::decrypt;
use crate::envelope::{Envelope, Payload};
use crate::error::{PipelineError, Result};
use crate::keys::KeyRegistry;
use crate::reject::{RejectRecord, RejectSink};
use crate::stats::{DecryptStatus, OutcomeRecorder, Snapshot};
use crate::topic::TopicMapper;

/// Instruction to publish the original message bytes under a new topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub topic: String,
    pub payload: Bytes,
}

/// Result of processing one classifiable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Outcome,
    pub publish: Option<Publish>,
    /// Counters right after this message was recorded.
    pub counters: Snapshot,
}

/// Per-message coordinator.
///
/// All configuration is fixed at construction. Shared state is limited to
/// the recorder, so a `Pipeline` can sit behind an `Arc` and be called from
/// the bus callback while a reporter reads the counters.
pub struct Pipeline {
    keys: KeyRegistry,
    policy: Policy,
    topics: TopicMapper,
    recorder: Arc<OutcomeRecorder>,
    reject_sink: Option<Arc<dyn RejectSink>>,
}

impl Pipeline {
    pub fn new(keys: KeyRegistry, policy: Policy, topics: TopicMapper) -> Self {
        Self {
            keys,
            policy,
            topics,
            recorder: Arc::new(OutcomeRecorder::new()),
            reject_sink: None,
        }
    }

    /// Use an existing recorder, e.g. one shared with a reporter.
    pub fn with_recorder(mut self, recorder: Arc<OutcomeRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Send a record for every rejected message to `sink`.
    pub fn with_reject_sink(mut self, sink: Arc<dyn RejectSink>) -> Self {
        self.reject_sink = Some(sink);
        self
    }

    pub fn recorder(&self) -> &Arc<OutcomeRecorder> {
        &self.recorder
    }

    pub fn keys(&self) -> &KeyRegistry {
        &self.keys
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn topics(&self) -> &TopicMapper {
        &self.topics
    }

    /// Process one message received on `topic`.
    ///
    /// Parse failures are not counted. Topic mapping failures happen after
    /// the message was counted and carry its outcome.
    pub fn process(&self, raw: Bytes, topic: &str) -> Result<Decision> {
        let mut envelope = Envelope::parse(&raw)?;
        let packet = &envelope.packet;

        tracing::debug!(
            topic,
            len = raw.len(),
            channel = %envelope.channel_id,
            gateway = %envelope.gateway_id,
            from = %packet.from,
            to = %packet.to,
            id = packet.packet_id,
            encrypted = packet.payload().is_encrypted(),
            "received message"
        );

        let decrypt_status = self.decrypt_in_place(&mut envelope);
        let outcome = self.policy.evaluate(&envelope.packet);
        let counters = self.recorder.record_with(outcome, decrypt_status);

        let from = envelope.packet.from;
        match outcome {
            Outcome::Forwarded { exempt } => {
                let mapped = self
                    .topics
                    .map(topic)
                    .map_err(|source| PipelineError::TopicMapping { outcome, source })?;
                tracing::debug!(from = %from, exempt, to_topic = %mapped, "forward");
                Ok(Decision {
                    outcome,
                    publish: Some(Publish {
                        topic: mapped,
                        payload: raw,
                    }),
                    counters,
                })
            }
            Outcome::Rejected { reason } => {
                tracing::debug!(from = %from, %reason, "discard");
                if let Some(sink) = &self.reject_sink {
                    sink.record(&RejectRecord::new(&envelope, topic, reason, now_millis()));
                }
                Ok(Decision {
                    outcome,
                    publish: None,
                    counters,
                })
            }
        }
    }

    fn decrypt_in_place(&self, envelope: &mut Envelope) -> DecryptStatus {
        let packet = &envelope.packet;
        let ciphertext = match packet.payload() {
            Payload::Encrypted(bytes) => bytes,
            Payload::Decoded(_) => return DecryptStatus::NotNeeded,
        };

        let candidates = self.keys.resolve(&envelope.channel_id);
        // Only count a failure once a key has been tried on real ciphertext.
        if ciphertext.is_empty() || candidates.is_empty() {
            tracing::debug!(
                from = %packet.from,
                ciphertext_len = ciphertext.len(),
                keys = candidates.len(),
                "nothing to decrypt"
            );
            return DecryptStatus::NotNeeded;
        }
        match decrypt(ciphertext, packet.from, packet.packet_id, &candidates) {
            Ok(decrypted) => {
                tracing::debug!(
                    from = %packet.from,
                    key = decrypted.key_label,
                    derived = decrypted.derived,
                    "decrypted packet"
                );
                let data = decrypted.data;
                envelope.packet.set_decoded(data);
                DecryptStatus::Decrypted
            }
            Err(failed) => {
                tracing::debug!(
                    from = %packet.from,
                    attempts = failed.attempts,
                    "failed to decrypt packet with any available key"
                );
                DecryptStatus::Failed
            }
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("keys", &self.keys.len())
            .field("exempt", &self.policy.exempt.len())
            .field("allow_no_bitfield", &self.policy.allow_no_bitfield)
            .field("topics", &self.topics)
            .field("reject_sink", &self.reject_sink.is_some())
            .finish()
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
