//! # Mesh Filter Testkit
//!
//! Testing utilities for the mesh filter.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known ciphertexts for firmware-compatible decryption
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Envelope builders and ready-made pipelines
//!
//! ## Golden Vectors
//!
//! ```rust
//! use meshfilter_testkit::vectors::{all_vectors, encrypt_vector};
//!
//! for vector in all_vectors() {
//!     assert_eq!(encrypt_vector(&vector), vector.expected_ciphertext);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use meshfilter_testkit::generators::MessageParams;
//! use meshfilter_testkit::fixtures::{test_pipeline, test_topic};
//!
//! proptest! {
//!     #[test]
//!     fn exempt_is_always_forwarded(params: MessageParams) {
//!         let exempt = params.from.to_string();
//!         let pipeline = test_pipeline(&[exempt.as_str()], false);
//!         let topic = test_topic(params.from.as_u32());
//!         let decision = pipeline.process(params.builder().build(), &topic).unwrap();
//!         prop_assert!(decision.outcome.is_forwarded());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use meshfilter_testkit::fixtures::{test_pipeline, test_topic, EnvelopeBuilder};
//!
//! let pipeline = test_pipeline(&[], false);
//! let bytes = EnvelopeBuilder::new(0x12345678).bitfield(1).encrypted_default().build();
//! let decision = pipeline.process(bytes, &test_topic(0x12345678)).unwrap();
//! assert_eq!(decision.publish.unwrap().topic, "filtered/test/2/e/LongFast/!12345678");
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    encrypt_data, pipeline_with_keys, random_key, test_pipeline, test_topic, EnvelopeBuilder,
};
pub use generators::{MessageParams, WireParams};
pub use vectors::{all_vectors, encrypt_vector, verify_all_vectors, GoldenVector};
