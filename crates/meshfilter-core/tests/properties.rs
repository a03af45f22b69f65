//! Property-based tests over generated traffic.

use proptest::prelude::*;

use meshfilter_core::{
    decrypt, CipherKey, DecodedData, KeyRegistry, Outcome, Port, RejectReason, DEFAULT_KEY,
    DEFAULT_PRESET_NAME,
};
use meshfilter_testkit::fixtures::{encrypt_data, pipeline_with_keys, test_pipeline, test_topic};
use meshfilter_testkit::generators::{channel_name, cipher_key, MessageParams, WireParams};

/// The key a node on `channel` encrypts with when configured with `key`.
fn wire_key(key: &CipherKey, channel: &str) -> CipherKey {
    if channel.is_empty() || channel == DEFAULT_PRESET_NAME {
        key.clone()
    } else {
        key.derive_for_channel(channel)
    }
}

proptest! {
    #[test]
    fn exempt_sender_is_always_forwarded(params: MessageParams, encrypted: bool) {
        let exempt = params.from.to_string();
        let pipeline = pipeline_with_keys(KeyRegistry::empty(), &[exempt.as_str()], false);
        let mut builder = params.builder();
        if encrypted {
            builder = builder.encrypted_default();
        }

        let decision = pipeline
            .process(builder.build(), &test_topic(params.from.as_u32()))
            .unwrap();

        prop_assert_eq!(decision.outcome, Outcome::Forwarded { exempt: true });
        prop_assert!(decision.publish.is_some());
    }

    #[test]
    fn cleartext_outcome_follows_low_bit(params: MessageParams) {
        let pipeline = test_pipeline(&[], false);
        let decision = pipeline
            .process(params.builder().build(), &test_topic(params.from.as_u32()))
            .unwrap();

        let expected = match params.bitfield {
            None => Outcome::Rejected { reason: RejectReason::NoBitfield },
            Some(bits) if bits & 1 == 1 => Outcome::Forwarded { exempt: false },
            Some(_) => Outcome::Rejected { reason: RejectReason::BitfieldDisabled },
        };
        prop_assert_eq!(decision.outcome, expected);
        prop_assert_eq!(decision.publish.is_some(), expected.is_forwarded());
    }

    #[test]
    fn encryption_with_a_known_key_round_trips(
        params: MessageParams,
        key in cipher_key(),
        channel in channel_name(),
    ) {
        let keys = KeyRegistry::builder()
            .use_default(false)
            .base_key("custom-0", key.clone())
            .build();
        let pipeline = pipeline_with_keys(keys, &[], true);
        let raw = params
            .builder()
            .channel(channel.as_str())
            .encrypted_with(wire_key(&key, &channel))
            .build();

        let decision = pipeline.process(raw, &test_topic(params.from.as_u32())).unwrap();

        prop_assert_eq!(decision.counters.decrypted, 1);
        prop_assert_ne!(decision.outcome, Outcome::Rejected { reason: RejectReason::Encrypted });
    }

    #[test]
    fn decrypt_recovers_the_encrypted_data(
        params: MessageParams,
        key in cipher_key(),
        channel in channel_name(),
    ) {
        let keys = KeyRegistry::builder()
            .use_default(false)
            .base_key("custom-0", key.clone())
            .build();
        let cleartext = params.builder().data_bytes();
        let ciphertext = encrypt_data(
            &cleartext,
            &wire_key(&key, &channel),
            params.packet_id,
            params.from,
        );

        let candidates = keys.resolve(&channel);
        let decrypted = decrypt(&ciphertext, params.from, params.packet_id, &candidates).unwrap();

        let expected = DecodedData::decode(&cleartext).unwrap();
        prop_assert_eq!(&decrypted.data, &expected);
        prop_assert_eq!(decrypted.data.port, Port::Known(params.port));
        prop_assert_eq!(decrypted.data.bitfield, params.bitfield);
        prop_assert_eq!(&decrypted.data.payload[..], &params.payload[..]);
        prop_assert_eq!(decrypted.key_label, "custom-0");
    }

    #[test]
    fn counters_stay_consistent(batch in prop::collection::vec(any::<WireParams>(), 1..20)) {
        let exempt = batch[0].message.from.to_string();
        let pipeline = test_pipeline(&[exempt.as_str()], false);

        for params in &batch {
            pipeline
                .process(params.builder().build(), &test_topic(params.message.from.as_u32()))
                .unwrap();
        }

        let encrypted = batch.iter().filter(|p| p.encrypted.is_some()).count() as u64;
        let default_keyed = batch
            .iter()
            .filter(|p| p.encrypted == Some(CipherKey::Aes128(DEFAULT_KEY)))
            .count() as u64;

        let s = pipeline.recorder().snapshot();
        prop_assert_eq!(s.total, batch.len() as u64);
        prop_assert_eq!(
            s.forwarded
                + s.rejected_encrypted
                + s.rejected_no_bitfield
                + s.rejected_bitfield_disabled,
            s.total
        );
        prop_assert!(s.forwarded_exempt >= 1);
        prop_assert!(s.forwarded_exempt <= s.forwarded);
        prop_assert_eq!(s.decrypted + s.decryption_failed, encrypted);
        prop_assert!(s.decrypted >= default_keyed);
        prop_assert!(s.rejected_encrypted <= s.decryption_failed);
    }
}
