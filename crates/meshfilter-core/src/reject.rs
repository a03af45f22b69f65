//! Structured records of rejected messages for audit sinks.

use serde::{Deserialize, Serialize};

use crate::authz::RejectReason;
use crate::envelope::Envelope;

/// One rejected message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectRecord {
    /// Unix time in milliseconds.
    pub timestamp: i64,
    pub reason: RejectReason,
    pub from: String,
    pub to: String,
    pub packet_id: u32,
    pub topic: String,
    pub channel: String,
    pub gateway: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitfield: Option<u8>,
}

impl RejectRecord {
    pub fn new(envelope: &Envelope, topic: &str, reason: RejectReason, timestamp: i64) -> Self {
        let packet = &envelope.packet;
        let decoded = packet.payload().decoded();
        Self {
            timestamp,
            reason,
            from: packet.from.to_string(),
            to: packet.to.to_string(),
            packet_id: packet.packet_id,
            topic: topic.to_string(),
            channel: envelope.channel_id.clone(),
            gateway: envelope.gateway_id.clone(),
            port: decoded.map(|d| d.port.name()),
            payload: decoded.map(|d| d.summary()),
            bitfield: decoded.and_then(|d| d.bitfield),
        }
    }
}

/// Destination for rejection records.
///
/// Implementations must be thread-safe (Send + Sync) and must not fail the
/// pipeline; errors are theirs to log.
pub trait RejectSink: Send + Sync {
    fn record(&self, record: &RejectRecord);
}

/// Sink that emits each record as a debug-level tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRejectSink;

impl RejectSink for TracingRejectSink {
    fn record(&self, record: &RejectRecord) {
        tracing::debug!(
            target: "meshfilter::rejected",
            reason = %record.reason,
            from = %record.from,
            to = %record.to,
            topic = %record.topic,
            channel = %record.channel,
            port = record.port.as_deref().unwrap_or("-"),
            bitfield = ?record.bitfield,
            "rejected"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{DecodedData, Packet, Payload, Port};
    use crate::proto::PortNum;
    use crate::types::NodeId;

    fn envelope(payload: Payload) -> Envelope {
        Envelope {
            channel_id: "LongFast".into(),
            gateway_id: "!87654321".into(),
            packet: Packet::new(NodeId(0x12345678), NodeId::BROADCAST, 42, payload),
        }
    }

    #[test]
    fn test_record_for_decoded_packet() {
        let env = envelope(Payload::Decoded(DecodedData {
            port: Port::Known(PortNum::TextMessageApp),
            bitfield: Some(0),
            payload: b"secret plans".to_vec(),
        }));
        let record = RejectRecord::new(&env, "msh/US/2/e", RejectReason::BitfieldDisabled, 1000);

        assert_eq!(record.from, "!12345678");
        assert_eq!(record.to, "!ffffffff");
        assert_eq!(record.port.as_deref(), Some("TEXT_MESSAGE_APP"));
        assert_eq!(record.payload.as_deref(), Some("secret plans"));
        assert_eq!(record.bitfield, Some(0));
    }

    #[test]
    fn test_record_for_encrypted_packet_omits_decoded_fields() {
        let env = envelope(Payload::Encrypted(vec![1, 2, 3]));
        let record = RejectRecord::new(&env, "t", RejectReason::Encrypted, 0);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["reason"], "encrypted");
        assert_eq!(json["channel"], "LongFast");
        assert!(json.get("port").is_none());
        assert!(json.get("bitfield").is_none());
    }
}
