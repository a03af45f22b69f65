//! Envelope: the parsed, domain-level view of one bus message.
//!
//! Parsed once from the wire bytes and dropped when the message has been
//! classified. The payload of a [`Packet`] is either still encrypted or
//! decoded, never both; decryption only moves it from the former to the
//! latter.

use prost::Message;

use crate::error::ParseError;
use crate::proto::{self, PayloadVariant, PortNum};
use crate::types::NodeId;

/// Application port of decoded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    Known(PortNum),
    Other(i32),
}

impl Port {
    pub fn from_wire(value: i32) -> Self {
        match PortNum::try_from(value) {
            Ok(port) => Port::Known(port),
            Err(_) => Port::Other(value),
        }
    }

    pub fn to_wire(self) -> i32 {
        match self {
            Port::Known(port) => port as i32,
            Port::Other(value) => value,
        }
    }

    /// Port zero is never sent by real firmware.
    pub fn is_unknown(&self) -> bool {
        self.to_wire() == PortNum::UnknownApp as i32
    }

    pub fn name(&self) -> String {
        match self {
            Port::Known(port) => port.as_str_name().to_string(),
            Port::Other(value) => format!("PORT_{value}"),
        }
    }
}

/// Decoded application data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedData {
    pub port: Port,
    /// `None` means the sending firmware predates the field.
    pub bitfield: Option<u8>,
    pub payload: Vec<u8>,
}

impl DecodedData {
    /// Parse cleartext `Data` bytes, as produced by a successful decryption.
    pub fn decode(bytes: &[u8]) -> Result<Self, prost::DecodeError> {
        proto::Data::decode(bytes).map(Self::from)
    }

    /// Whether the sender set the "ok to relay" bit.
    pub fn relay_allowed(&self) -> Option<bool> {
        self.bitfield.map(|b| b & crate::authz::OK_TO_MQTT_MASK != 0)
    }

    /// Short human-readable description of the payload for audit logs.
    pub fn summary(&self) -> String {
        const MAX_TEXT: usize = 100;
        match self.port {
            Port::Known(PortNum::TextMessageApp) => {
                let text = String::from_utf8_lossy(&self.payload);
                if text.chars().count() > MAX_TEXT {
                    let truncated: String = text.chars().take(MAX_TEXT).collect();
                    format!("{truncated}...")
                } else {
                    text.into_owned()
                }
            }
            _ => format!("<{} bytes>", self.payload.len()),
        }
    }
}

impl From<proto::Data> for DecodedData {
    fn from(data: proto::Data) -> Self {
        Self {
            port: Port::from_wire(data.portnum),
            bitfield: data.bitfield.map(|b| (b & 0xff) as u8),
            payload: data.payload,
        }
    }
}

/// Packet payload state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Encrypted(Vec<u8>),
    Decoded(DecodedData),
}

impl Payload {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Payload::Encrypted(_))
    }

    pub fn decoded(&self) -> Option<&DecodedData> {
        match self {
            Payload::Decoded(data) => Some(data),
            Payload::Encrypted(_) => None,
        }
    }
}

/// A mesh packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub from: NodeId,
    pub to: NodeId,
    pub packet_id: u32,
    pub channel_index: u32,
    payload: Payload,
}

impl Packet {
    pub fn new(from: NodeId, to: NodeId, packet_id: u32, payload: Payload) -> Self {
        Self {
            from,
            to,
            packet_id,
            channel_index: 0,
            payload,
        }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Replace an encrypted payload with its decoded form.
    ///
    /// A payload that is already decoded is left untouched.
    pub fn set_decoded(&mut self, data: DecodedData) {
        if self.payload.is_encrypted() {
            self.payload = Payload::Decoded(data);
        }
    }
}

impl From<proto::MeshPacket> for Packet {
    fn from(packet: proto::MeshPacket) -> Self {
        let payload = match packet.payload_variant {
            Some(PayloadVariant::Decoded(data)) => Payload::Decoded(data.into()),
            Some(PayloadVariant::Encrypted(bytes)) => Payload::Encrypted(bytes),
            // nothing decodable: classify like an undecryptable payload
            None => Payload::Encrypted(Vec::new()),
        };
        Self {
            from: NodeId(packet.from_node),
            to: NodeId(packet.to),
            packet_id: packet.id,
            channel_index: packet.channel,
            payload,
        }
    }
}

/// The outer bus message: channel and gateway metadata plus one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub channel_id: String,
    pub gateway_id: String,
    pub packet: Packet,
}

impl Envelope {
    /// Parse an envelope from the raw bytes received on the bus.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let envelope = proto::ServiceEnvelope::decode(bytes)?;
        let packet = envelope.packet.ok_or(ParseError::MissingPacket)?;
        Ok(Self {
            channel_id: envelope.channel_id,
            gateway_id: envelope.gateway_id,
            packet: packet.into(),
        })
    }
}
