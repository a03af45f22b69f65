//! Key registry: the ordered set of channel keys and per-channel derivation.
//!
//! Derivation must match the firmware exactly: a key configured for a
//! named channel is `SHA-256(raw_key || channel_name)`, used as an AES-256
//! key. The preset channel and the empty channel name use the raw key.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::KeyError;

/// Name of the preset channel whose key is used without derivation.
pub const DEFAULT_PRESET_NAME: &str = "LongFast";

/// The publicly known key of the default preset channel
/// (`1PG7OiApB1nwvP+rz05pAQ==`).
pub const DEFAULT_KEY: [u8; 16] = [
    0xd4, 0xf1, 0xbb, 0x3a, 0x20, 0x29, 0x07, 0x59, 0xf0, 0xbc, 0xff, 0xab, 0xcf, 0x4e, 0x69, 0x01,
];

/// Raw AES key bytes, sized for the cipher variant.
#[derive(Clone, PartialEq, Eq)]
pub enum CipherKey {
    Aes128([u8; 16]),
    Aes256([u8; 32]),
}

impl CipherKey {
    /// Build from a slice of 16 or 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        match bytes.len() {
            16 => {
                let mut arr = [0u8; 16];
                arr.copy_from_slice(bytes);
                Ok(CipherKey::Aes128(arr))
            }
            32 => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(bytes);
                Ok(CipherKey::Aes256(arr))
            }
            n => Err(KeyError::InvalidLength(n)),
        }
    }

    /// Decode a base64 key as written in configuration.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let bytes = STANDARD.decode(encoded.trim())?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            CipherKey::Aes128(k) => k,
            CipherKey::Aes256(k) => k,
        }
    }

    pub fn bits(&self) -> usize {
        self.as_bytes().len() * 8
    }

    /// Derive the key for a named channel: `SHA-256(self || channel_name)`.
    pub fn derive_for_channel(&self, channel_name: &str) -> CipherKey {
        let mut hasher = Sha256::new();
        hasher.update(self.as_bytes());
        hasher.update(channel_name.as_bytes());
        CipherKey::Aes256(hasher.finalize().into())
    }

    /// Loggable identifier that does not reveal the key.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.as_bytes());
        hex::encode(&digest[..4])
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CipherKey(aes{}, {})", self.bits(), self.fingerprint())
    }
}

/// How a configured key becomes candidate key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// Base key, derived per channel name at resolve time.
    Base(CipherKey),
    /// Already final; used as-is for every channel.
    Final(CipherKey),
}

impl KeyMaterial {
    pub fn key(&self) -> &CipherKey {
        match self {
            KeyMaterial::Base(key) | KeyMaterial::Final(key) => key,
        }
    }
}

/// A labeled key in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelKey {
    pub label: String,
    pub material: KeyMaterial,
}

/// A key to try during one decryption attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateKey<'a> {
    pub label: &'a str,
    pub key: CipherKey,
    pub derived: bool,
}

/// Ordered, immutable set of decryption keys.
#[derive(Debug, Clone)]
pub struct KeyRegistry {
    preset_name: String,
    default_key: Option<ChannelKey>,
    keys: Vec<ChannelKey>,
}

impl KeyRegistry {
    /// Start building a registry. The default preset key is enabled.
    pub fn builder() -> KeyRegistryBuilder {
        KeyRegistryBuilder::default()
    }

    /// A registry with no keys at all.
    pub fn empty() -> Self {
        Self::builder().use_default(false).build()
    }

    /// Build from configuration: the default-key switch plus base64
    /// channel keys. Keys that fail to decode are logged and skipped.
    pub fn from_config<S: AsRef<str>>(use_default: bool, channel_keys: &[S]) -> Self {
        let mut builder = Self::builder().use_default(use_default);
        if use_default {
            tracing::info!("encryption: using default {} key", DEFAULT_PRESET_NAME);
        }
        for (i, encoded) in channel_keys.iter().enumerate() {
            match CipherKey::from_base64(encoded.as_ref()) {
                Ok(key) => {
                    tracing::info!(
                        index = i,
                        bits = key.bits(),
                        fingerprint = %key.fingerprint(),
                        "encryption: added custom key"
                    );
                    builder = builder.base_key(format!("custom-{i}"), key);
                }
                Err(e) => tracing::error!(index = i, error = %e, "failed to decode custom key"),
            }
        }
        builder.build()
    }

    pub fn preset_name(&self) -> &str {
        &self.preset_name
    }

    /// Number of configured keys, including the default key when enabled.
    pub fn len(&self) -> usize {
        self.keys.len() + usize::from(self.default_key.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Labels in resolution order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.default_key
            .iter()
            .chain(self.keys.iter())
            .map(|k| k.label.as_str())
    }

    fn uses_raw_key(&self, channel_name: &str) -> bool {
        channel_name.is_empty() || channel_name == self.preset_name
    }

    /// Candidate keys for a message on `channel_name`, in trial order.
    ///
    /// The default preset key comes first, and only for the preset or
    /// empty channel. Base keys are derived for any other channel name.
    pub fn resolve(&self, channel_name: &str) -> Vec<CandidateKey<'_>> {
        let raw = self.uses_raw_key(channel_name);
        let mut candidates = Vec::with_capacity(self.len());

        if let Some(default) = self.default_key.as_ref().filter(|_| raw) {
            candidates.push(CandidateKey {
                label: &default.label,
                key: default.material.key().clone(),
                derived: false,
            });
        }

        for entry in &self.keys {
            let candidate = match &entry.material {
                KeyMaterial::Base(key) if !raw => CandidateKey {
                    label: &entry.label,
                    key: key.derive_for_channel(channel_name),
                    derived: true,
                },
                KeyMaterial::Base(key) | KeyMaterial::Final(key) => CandidateKey {
                    label: &entry.label,
                    key: key.clone(),
                    derived: false,
                },
            };
            candidates.push(candidate);
        }

        candidates
    }
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`KeyRegistry`].
#[derive(Debug)]
pub struct KeyRegistryBuilder {
    preset_name: String,
    use_default: bool,
    keys: Vec<ChannelKey>,
}

impl Default for KeyRegistryBuilder {
    fn default() -> Self {
        Self {
            preset_name: DEFAULT_PRESET_NAME.to_string(),
            use_default: true,
            keys: Vec::new(),
        }
    }
}

impl KeyRegistryBuilder {
    /// Enable or suppress the default preset key.
    pub fn use_default(mut self, enabled: bool) -> Self {
        self.use_default = enabled;
        self
    }

    /// Override the preset channel name.
    pub fn preset_name(mut self, name: impl Into<String>) -> Self {
        self.preset_name = name.into();
        self
    }

    /// Add a key that is derived per channel name.
    pub fn base_key(mut self, label: impl Into<String>, key: CipherKey) -> Self {
        self.keys.push(ChannelKey {
            label: label.into(),
            material: KeyMaterial::Base(key),
        });
        self
    }

    /// Add a key that is used as-is.
    pub fn final_key(mut self, label: impl Into<String>, key: CipherKey) -> Self {
        self.keys.push(ChannelKey {
            label: label.into(),
            material: KeyMaterial::Final(key),
        });
        self
    }

    pub fn build(self) -> KeyRegistry {
        let default_key = self.use_default.then(|| ChannelKey {
            label: "default".to_string(),
            material: KeyMaterial::Final(CipherKey::Aes128(DEFAULT_KEY)),
        });
        KeyRegistry {
            preset_name: self.preset_name,
            default_key,
            keys: self.keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DERIVED_TEST: &str = "43479c5150cd63fd65fb4bd7364a1da78b84e1f0163f64a5c06051ff49fdf870";

    #[test]
    fn test_default_key_matches_base64() {
        let key = CipherKey::from_base64("1PG7OiApB1nwvP+rz05pAQ==").unwrap();
        assert_eq!(key, CipherKey::Aes128(DEFAULT_KEY));
    }

    #[test]
    fn test_derivation_is_sha256_of_key_and_name() {
        let key = CipherKey::Aes128(DEFAULT_KEY);
        let derived = key.derive_for_channel("Test");
        assert_eq!(hex::encode(derived.as_bytes()), DERIVED_TEST);
        assert_eq!(derived.bits(), 256);
    }

    #[test]
    fn test_default_only_for_preset_or_empty() {
        let registry = KeyRegistry::default();
        assert_eq!(registry.len(), 1);

        for channel in ["", "LongFast"] {
            let candidates = registry.resolve(channel);
            assert_eq!(candidates.len(), 1);
            assert_eq!(candidates[0].label, "default");
            assert_eq!(candidates[0].key, CipherKey::Aes128(DEFAULT_KEY));
            assert!(!candidates[0].derived);
        }

        assert!(registry.resolve("Test").is_empty());
    }

    #[test]
    fn test_base_keys_are_derived_for_named_channels() {
        let base = CipherKey::Aes128(DEFAULT_KEY);
        let registry = KeyRegistry::builder()
            .use_default(false)
            .base_key("custom-0", base.clone())
            .build();

        let named = registry.resolve("Test");
        assert_eq!(named.len(), 1);
        assert!(named[0].derived);
        assert_eq!(hex::encode(named[0].key.as_bytes()), DERIVED_TEST);

        let preset = registry.resolve("LongFast");
        assert_eq!(preset[0].key, base);
        assert!(!preset[0].derived);

        let empty = registry.resolve("");
        assert_eq!(empty[0].key, base);
    }

    #[test]
    fn test_final_keys_are_never_derived() {
        let key = CipherKey::Aes256([7u8; 32]);
        let registry = KeyRegistry::builder()
            .use_default(false)
            .final_key("pre-derived", key.clone())
            .build();
        assert_eq!(registry.resolve("Anything")[0].key, key);
    }

    #[test]
    fn test_resolution_order() {
        let registry = KeyRegistry::builder()
            .base_key("custom-0", CipherKey::Aes128([1; 16]))
            .final_key("custom-1", CipherKey::Aes128([2; 16]))
            .build();
        let labels: Vec<_> = registry.resolve("").iter().map(|c| c.label).collect();
        assert_eq!(labels, ["default", "custom-0", "custom-1"]);
        assert_eq!(registry.labels().collect::<Vec<_>>(), labels);
    }

    #[test]
    fn test_custom_preset_name() {
        let registry = KeyRegistry::builder().preset_name("MediumSlow").build();
        assert_eq!(registry.resolve("MediumSlow").len(), 1);
        assert!(registry.resolve("LongFast").is_empty());
    }

    #[test]
    fn test_from_config_skips_invalid_keys() {
        let valid = STANDARD.encode(b"0123456789abcdef");
        let registry = KeyRegistry::from_config(
            true,
            &[valid.as_str(), "invalid-base64!@#", "AQ=="],
        );
        assert_eq!(registry.labels().collect::<Vec<_>>(), ["default", "custom-0"]);

        let none = KeyRegistry::from_config::<&str>(false, &[]);
        assert!(none.is_empty());
        assert!(none.resolve("").is_empty());
    }

    #[test]
    fn test_invalid_lengths() {
        assert!(matches!(
            CipherKey::from_slice(&[0u8; 24]),
            Err(KeyError::InvalidLength(24))
        ));
        assert!(matches!(
            CipherKey::from_base64("%%%"),
            Err(KeyError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_debug_hides_key_bytes() {
        let key = CipherKey::Aes128(DEFAULT_KEY);
        let debug = format!("{key:?}");
        assert!(debug.starts_with("CipherKey(aes128, "));
        assert!(!debug.contains("d4f1bb3a"));
    }
}
