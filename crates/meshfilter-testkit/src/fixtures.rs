//! Test fixtures and helpers.
//!
//! Builders for wire envelopes, in cleartext or encrypted with a given key.

use bytes::Bytes;
use prost::Message;
use rand::RngCore;

use meshfilter_core::proto::{self, PayloadVariant};
use meshfilter_core::{
    apply_keystream, CipherKey, ExemptNodeSet, KeyRegistry, NodeId, Nonce, Pipeline, Policy,
    PortNum, TopicMapper, DEFAULT_KEY,
};

/// Builder for serialized envelopes.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    channel_id: String,
    gateway_id: String,
    from: u32,
    to: u32,
    packet_id: u32,
    data: proto::Data,
    encrypt_with: Option<CipherKey>,
    raw_encrypted: Option<Vec<u8>>,
}

impl EnvelopeBuilder {
    /// A text message from `from` to broadcast on LongFast, no bitfield.
    pub fn new(from: u32) -> Self {
        Self {
            channel_id: "LongFast".to_string(),
            gateway_id: "!87654321".to_string(),
            from,
            to: NodeId::BROADCAST.as_u32(),
            packet_id: 123456,
            data: proto::Data {
                portnum: PortNum::TextMessageApp as i32,
                payload: b"Test message".to_vec(),
                ..Default::default()
            },
            encrypt_with: None,
            raw_encrypted: None,
        }
    }

    pub fn channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self
    }

    pub fn gateway(mut self, gateway_id: impl Into<String>) -> Self {
        self.gateway_id = gateway_id.into();
        self
    }

    pub fn to(mut self, to: u32) -> Self {
        self.to = to;
        self
    }

    pub fn packet_id(mut self, id: u32) -> Self {
        self.packet_id = id;
        self
    }

    pub fn port(mut self, port: PortNum) -> Self {
        self.data.portnum = port as i32;
        self
    }

    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.data.payload = payload.into();
        self
    }

    pub fn bitfield(mut self, bits: u32) -> Self {
        self.data.bitfield = Some(bits);
        self
    }

    pub fn no_bitfield(mut self) -> Self {
        self.data.bitfield = None;
        self
    }

    /// Encrypt the data with `key`, exactly as the firmware would.
    pub fn encrypted_with(mut self, key: CipherKey) -> Self {
        self.encrypt_with = Some(key);
        self
    }

    /// Encrypt with the default preset key.
    pub fn encrypted_default(self) -> Self {
        self.encrypted_with(CipherKey::Aes128(DEFAULT_KEY))
    }

    /// Use these bytes as the encrypted payload verbatim.
    pub fn raw_encrypted(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.raw_encrypted = Some(bytes.into());
        self
    }

    /// The cleartext `Data` bytes.
    pub fn data_bytes(&self) -> Vec<u8> {
        self.data.encode_to_vec()
    }

    fn payload_variant(&self) -> PayloadVariant {
        if let Some(raw) = &self.raw_encrypted {
            return PayloadVariant::Encrypted(raw.clone());
        }
        match &self.encrypt_with {
            Some(key) => PayloadVariant::Encrypted(encrypt_data(
                &self.data_bytes(),
                key,
                self.packet_id,
                NodeId(self.from),
            )),
            None => PayloadVariant::Decoded(self.data.clone()),
        }
    }

    pub fn build_proto(&self) -> proto::ServiceEnvelope {
        proto::ServiceEnvelope {
            packet: Some(proto::MeshPacket {
                from_node: self.from,
                to: self.to,
                id: self.packet_id,
                payload_variant: Some(self.payload_variant()),
                ..Default::default()
            }),
            channel_id: self.channel_id.clone(),
            gateway_id: self.gateway_id.clone(),
        }
    }

    pub fn build(&self) -> Bytes {
        Bytes::from(self.build_proto().encode_to_vec())
    }
}

/// Encrypt cleartext `Data` bytes the way a sending node does.
pub fn encrypt_data(cleartext: &[u8], key: &CipherKey, packet_id: u32, from: NodeId) -> Vec<u8> {
    let mut buf = cleartext.to_vec();
    apply_keystream(key, &Nonce::new(packet_id, from), &mut buf);
    buf
}

/// A fresh random 128-bit key.
pub fn random_key() -> CipherKey {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    CipherKey::Aes128(bytes)
}

/// A pipeline over `msh/test/#` to `filtered/test` with the default key.
pub fn test_pipeline(exempt: &[&str], allow_no_bitfield: bool) -> Pipeline {
    pipeline_with_keys(KeyRegistry::default(), exempt, allow_no_bitfield)
}

/// Same as [`test_pipeline`] with an explicit key registry.
pub fn pipeline_with_keys(keys: KeyRegistry, exempt: &[&str], allow_no_bitfield: bool) -> Pipeline {
    let topics = match TopicMapper::new("msh/test/#", "filtered/test") {
        Ok(topics) => topics,
        Err(e) => panic!("fixture topics are valid: {e}"),
    };
    Pipeline::new(
        keys,
        Policy::new(ExemptNodeSet::from_entries(exempt), allow_no_bitfield),
        topics,
    )
}

/// Topic a gateway would publish a packet from `from` on.
pub fn test_topic(from: u32) -> String {
    format!("msh/test/2/e/LongFast/{}", NodeId(from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshfilter_core::{Envelope, Payload};

    #[test]
    fn test_builder_decoded() {
        let bytes = EnvelopeBuilder::new(0x12345678).bitfield(1).build();
        let env = Envelope::parse(&bytes).unwrap();
        assert_eq!(env.channel_id, "LongFast");
        assert_eq!(env.packet.payload().decoded().unwrap().bitfield, Some(1));
    }

    #[test]
    fn test_builder_encrypted_is_not_cleartext() {
        let builder = EnvelopeBuilder::new(0x12345678).bitfield(1).encrypted_default();
        let env = Envelope::parse(&builder.build()).unwrap();
        match env.packet.payload() {
            Payload::Encrypted(ct) => {
                assert_eq!(ct.len(), builder.data_bytes().len());
                assert_ne!(ct, &builder.data_bytes());
            }
            other => panic!("expected encrypted payload, got {other:?}"),
        }
    }

    #[test]
    fn test_topic_format() {
        assert_eq!(test_topic(0xa1b2c3d4), "msh/test/2/e/LongFast/!a1b2c3d4");
    }
}
