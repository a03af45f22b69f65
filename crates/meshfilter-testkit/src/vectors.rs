//! Golden test vectors for the firmware-compatible crypto.
//!
//! Computed independently of this crate. Any change here means the relay
//! no longer decrypts what real nodes send.

use meshfilter_core::{CipherKey, NodeId, Nonce, DEFAULT_KEY};

use crate::fixtures::encrypt_data;

/// Cleartext `Data{port: 1, payload: "hi", bitfield: 1}`.
pub const HELLO_DATA: &str = "0801120268694801";

/// Packet id used by every ciphertext vector.
pub const PACKET_ID: u32 = 0xbeef;

/// Sender used by every ciphertext vector.
pub const FROM: NodeId = NodeId(0xa1b2_c3d4);

/// Nonce for [`PACKET_ID`] from [`FROM`].
pub const NONCE: &str = "efbe000000000000d4c3b2a100000000";

/// SHA-256 of the default key followed by "Test".
pub const DERIVED_TEST_KEY: &str =
    "43479c5150cd63fd65fb4bd7364a1da78b84e1f0163f64a5c06051ff49fdf870";

/// How a vector's key is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorKey {
    /// The default preset key, used as is.
    Default,
    /// The default key derived for a channel name.
    DerivedFrom(&'static str),
    /// A fixed 16-byte key filled with one byte.
    Filled(u8),
}

impl VectorKey {
    pub fn key(&self) -> CipherKey {
        match self {
            VectorKey::Default => CipherKey::Aes128(DEFAULT_KEY),
            VectorKey::DerivedFrom(channel) => {
                CipherKey::Aes128(DEFAULT_KEY).derive_for_channel(channel)
            }
            VectorKey::Filled(byte) => CipherKey::Aes128([*byte; 16]),
        }
    }
}

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Key used to encrypt.
    pub key: VectorKey,
    /// Cleartext (hex).
    pub cleartext: &'static str,
    /// Expected ciphertext (hex).
    pub expected_ciphertext: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "hello with default key",
            key: VectorKey::Default,
            cleartext: HELLO_DATA,
            expected_ciphertext: "0c905032e971182d",
        },
        GoldenVector {
            name: "hello with key derived for Test",
            key: VectorKey::DerivedFrom("Test"),
            cleartext: HELLO_DATA,
            expected_ciphertext: "d67fad17158de814",
        },
    ]
}

/// Encrypt a vector's cleartext, returning hex.
pub fn encrypt_vector(vector: &GoldenVector) -> String {
    let cleartext = hex::decode(vector.cleartext).unwrap_or_default();
    hex::encode(encrypt_data(&cleartext, &vector.key.key(), PACKET_ID, FROM))
}

/// Verify all vectors, returning the names of those that fail.
pub fn verify_all_vectors() -> Vec<&'static str> {
    all_vectors()
        .into_iter()
        .filter(|v| encrypt_vector(v) != v.expected_ciphertext)
        .map(|v| v.name)
        .collect()
}

/// The nonce for the vector packet, as hex.
pub fn vector_nonce() -> String {
    hex::encode(Nonce::new(PACKET_ID, FROM).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_verify() {
        assert!(verify_all_vectors().is_empty(), "failed: {:?}", verify_all_vectors());
    }

    #[test]
    fn test_nonce_vector() {
        assert_eq!(vector_nonce(), NONCE);
    }

    #[test]
    fn test_derived_key_vector() {
        let key = VectorKey::DerivedFrom("Test").key();
        assert_eq!(hex::encode(key.as_bytes()), DERIVED_TEST_KEY);
    }

    #[test]
    fn test_filled_key_differs_from_default() {
        assert_ne!(VectorKey::Filled(0x11).key(), VectorKey::Default.key());
    }
}
