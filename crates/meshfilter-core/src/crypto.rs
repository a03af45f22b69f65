//! Packet decryption: AES-CTR with a nonce built from packet and sender id.
//!
//! The wire format has no authentication tag, so the only evidence that a
//! key is right is that the cleartext decodes as well-formed `Data` with a
//! non-zero port. Candidates are tried in registry order and the first
//! success wins.

use aes::{Aes128, Aes256};
use ctr::cipher::{KeyIvInit, StreamCipher};
use std::fmt;

use crate::envelope::DecodedData;
use crate::keys::{CandidateKey, CipherKey};
use crate::types::NodeId;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// 16-byte CTR initial counter block.
///
/// `packet_id` as a little-endian u64 followed by the sender id as a
/// little-endian u64.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Nonce(pub [u8; 16]);

impl Nonce {
    pub fn new(packet_id: u32, from: NodeId) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&u64::from(packet_id).to_le_bytes());
        bytes[8..].copy_from_slice(&from.to_le_bytes_u64());
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", hex::encode(self.0))
    }
}

/// Apply the AES-CTR keystream in place. Encryption and decryption are the
/// same operation.
pub fn apply_keystream(key: &CipherKey, nonce: &Nonce, buf: &mut [u8]) {
    match key {
        CipherKey::Aes128(k) => Aes128Ctr::new(&(*k).into(), &nonce.0.into()).apply_keystream(buf),
        CipherKey::Aes256(k) => Aes256Ctr::new(&(*k).into(), &nonce.0.into()).apply_keystream(buf),
    }
}

/// No candidate key produced well-formed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptionFailed {
    pub attempts: usize,
}

/// A successful decryption and the key that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted<'a> {
    pub data: DecodedData,
    pub key_label: &'a str,
    pub derived: bool,
}

fn try_candidate(
    ciphertext: &[u8],
    nonce: &Nonce,
    candidate: &CandidateKey<'_>,
) -> Option<DecodedData> {
    let mut buf = ciphertext.to_vec();
    apply_keystream(&candidate.key, nonce, &mut buf);

    match DecodedData::decode(&buf) {
        Ok(data) if data.port.is_unknown() => {
            tracing::debug!(key = candidate.label, "decrypted data has port 0, likely wrong key");
            None
        }
        Ok(data) => Some(data),
        Err(e) => {
            tracing::debug!(key = candidate.label, error = %e, "decryption failed with key");
            None
        }
    }
}

/// Decrypt `ciphertext` with the first candidate that yields valid data.
pub fn decrypt<'a>(
    ciphertext: &[u8],
    from: NodeId,
    packet_id: u32,
    candidates: &[CandidateKey<'a>],
) -> Result<Decrypted<'a>, DecryptionFailed> {
    if ciphertext.is_empty() {
        return Err(DecryptionFailed { attempts: 0 });
    }

    let nonce = Nonce::new(packet_id, from);
    tracing::debug!(
        packet_id,
        from = %from,
        len = ciphertext.len(),
        candidates = candidates.len(),
        "attempting decryption"
    );

    candidates
        .iter()
        .find_map(|candidate| {
            try_candidate(ciphertext, &nonce, candidate).map(|data| Decrypted {
                data,
                key_label: candidate.label,
                derived: candidate.derived,
            })
        })
        .ok_or(DecryptionFailed {
            attempts: candidates.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Port;
    use crate::keys::DEFAULT_KEY;
    use crate::proto::PortNum;

    // Reference ciphertexts of Data{port=1, payload="hi", bitfield=1}
    // for packet 0xbeef from !a1b2c3d4.
    const PLAINTEXT: [u8; 8] = [0x08, 0x01, 0x12, 0x02, b'h', b'i', 0x48, 0x01];
    const CT_DEFAULT: &str = "0c905032e971182d";
    const CT_DERIVED_TEST: &str = "d67fad17158de814";

    fn candidate(key: CipherKey) -> CandidateKey<'static> {
        CandidateKey {
            label: "test",
            key,
            derived: false,
        }
    }

    #[test]
    fn test_nonce_layout() {
        let nonce = Nonce::new(0xbeef, NodeId(0xa1b2c3d4));
        assert_eq!(hex::encode(nonce.0), "efbe000000000000d4c3b2a100000000");
    }

    #[test]
    fn test_keystream_matches_reference() {
        let nonce = Nonce::new(0xbeef, NodeId(0xa1b2c3d4));

        let mut buf = PLAINTEXT;
        apply_keystream(&CipherKey::Aes128(DEFAULT_KEY), &nonce, &mut buf);
        assert_eq!(hex::encode(buf), CT_DEFAULT);

        let derived = CipherKey::Aes128(DEFAULT_KEY).derive_for_channel("Test");
        let mut buf = PLAINTEXT;
        apply_keystream(&derived, &nonce, &mut buf);
        assert_eq!(hex::encode(buf), CT_DERIVED_TEST);
    }

    #[test]
    fn test_decrypt_first_valid_candidate_wins() {
        let ciphertext = hex::decode(CT_DEFAULT).unwrap();
        let candidates = [
            candidate(CipherKey::Aes128([0x11; 16])),
            CandidateKey {
                label: "default",
                key: CipherKey::Aes128(DEFAULT_KEY),
                derived: false,
            },
        ];

        let decrypted = decrypt(&ciphertext, NodeId(0xa1b2c3d4), 0xbeef, &candidates).unwrap();
        assert_eq!(decrypted.key_label, "default");
        assert_eq!(decrypted.data.port, Port::Known(PortNum::TextMessageApp));
        assert_eq!(decrypted.data.payload, b"hi");
        assert_eq!(decrypted.data.bitfield, Some(1));
    }

    #[test]
    fn test_wrong_nonce_fails() {
        let ciphertext = hex::decode(CT_DEFAULT).unwrap();
        let candidates = [candidate(CipherKey::Aes128(DEFAULT_KEY))];
        let result = decrypt(&ciphertext, NodeId(0xa1b2c3d5), 0xbeef, &candidates);
        // A flipped nonce byte can only succeed if garbage happens to decode
        if let Ok(decrypted) = result {
            assert_ne!(decrypted.data.payload, b"hi");
        }
    }

    #[test]
    fn test_empty_inputs_fail_immediately() {
        let candidates = [candidate(CipherKey::Aes128(DEFAULT_KEY))];
        assert_eq!(
            decrypt(&[], NodeId(1), 1, &candidates),
            Err(DecryptionFailed { attempts: 0 })
        );
        assert_eq!(
            decrypt(&[1, 2, 3], NodeId(1), 1, &[]),
            Err(DecryptionFailed { attempts: 0 })
        );
    }

    #[test]
    fn test_port_zero_is_rejected() {
        // Data{portnum=0, payload="x"} encrypts fine but must not be accepted
        let nonce = Nonce::new(5, NodeId(6));
        let mut buf = vec![0x12, 0x01, b'x'];
        apply_keystream(&CipherKey::Aes128(DEFAULT_KEY), &nonce, &mut buf);

        let candidates = [candidate(CipherKey::Aes128(DEFAULT_KEY))];
        assert_eq!(
            decrypt(&buf, NodeId(6), 5, &candidates),
            Err(DecryptionFailed { attempts: 1 })
        );
    }
}
