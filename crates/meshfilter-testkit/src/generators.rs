//! Proptest generators for property-based testing.

use proptest::prelude::*;

use meshfilter_core::{CipherKey, NodeId, PortNum, DEFAULT_KEY};

use crate::fixtures::EnvelopeBuilder;

/// Generate a random NodeId.
pub fn node_id() -> impl Strategy<Value = NodeId> {
    any::<u32>().prop_map(NodeId)
}

/// Generate a 128- or 256-bit key.
pub fn cipher_key() -> impl Strategy<Value = CipherKey> {
    prop_oneof![
        any::<[u8; 16]>().prop_map(CipherKey::Aes128),
        any::<[u8; 32]>().prop_map(CipherKey::Aes256),
    ]
}

/// Generate a port that real firmware sends (never port 0).
pub fn port() -> impl Strategy<Value = PortNum> {
    prop_oneof![
        Just(PortNum::TextMessageApp),
        Just(PortNum::PositionApp),
        Just(PortNum::NodeinfoApp),
        Just(PortNum::RoutingApp),
        Just(PortNum::TelemetryApp),
        Just(PortNum::TracerouteApp),
        Just(PortNum::NeighborinfoApp),
        Just(PortNum::MapReportApp),
    ]
}

/// Generate an optional bitfield.
pub fn bitfield() -> impl Strategy<Value = Option<u8>> {
    prop::option::of(any::<u8>())
}

/// Generate a channel name, sometimes the preset or empty.
pub fn channel_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("LongFast".to_string()),
        "[A-Za-z][A-Za-z0-9]{0,11}".prop_map(String::from),
    ]
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate how a message travels: cleartext, under the default key, or
/// under a random key that test pipelines do not hold.
pub fn encryption() -> impl Strategy<Value = Option<CipherKey>> {
    prop_oneof![
        Just(None),
        Just(Some(CipherKey::Aes128(DEFAULT_KEY))),
        cipher_key().prop_map(Some),
    ]
}

/// Parameters for a cleartext message.
#[derive(Debug, Clone)]
pub struct MessageParams {
    pub from: NodeId,
    pub packet_id: u32,
    pub port: PortNum,
    pub bitfield: Option<u8>,
    pub payload: Vec<u8>,
}

impl MessageParams {
    pub fn builder(&self) -> EnvelopeBuilder {
        let builder = EnvelopeBuilder::new(self.from.as_u32())
            .packet_id(self.packet_id)
            .port(self.port)
            .payload(self.payload.clone());
        match self.bitfield {
            Some(bits) => builder.bitfield(u32::from(bits)),
            None => builder.no_bitfield(),
        }
    }
}

impl Arbitrary for MessageParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (node_id(), any::<u32>(), port(), bitfield(), payload(64))
            .prop_map(|(from, packet_id, port, bitfield, payload)| MessageParams {
                from,
                packet_id,
                port,
                bitfield,
                payload,
            })
            .boxed()
    }
}

/// A message and the key it is encrypted with on the wire, if any.
#[derive(Debug, Clone)]
pub struct WireParams {
    pub message: MessageParams,
    pub encrypted: Option<CipherKey>,
}

impl WireParams {
    pub fn builder(&self) -> EnvelopeBuilder {
        let builder = self.message.builder();
        match &self.encrypted {
            Some(key) => builder.encrypted_with(key.clone()),
            None => builder,
        }
    }
}

impl Arbitrary for WireParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (any::<MessageParams>(), encryption())
            .prop_map(|(message, encrypted)| WireParams { message, encrypted })
            .boxed()
    }
}
