//! `decdid-core` — the biometric-to-DID cryptographic core.
//!
//! Turns a set of noisy per-finger minutiae captures into a reproducible
//! `did:<method>:<network>:<hash>` identifier, plus the helper data that
//! lets a later, noisy recapture reproduce the same identifier without the
//! raw biometric ever being stored. Six dependency-ordered components:
//! quantizer -> BCH codec -> fuzzy extractor -> aggregator -> DID deriver,
//! coordinated by the [`orchestrator`]'s `enroll`/`verify` entry points.
//!
//! Zero network, zero async, zero storage: this crate is pure, in-process
//! cryptography. Callers own persistence, transport, and the ledger
//! transaction that anchors the resulting [`types::MetadataEnvelope`].

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod aggregator;
pub mod bch;
pub mod config;
pub mod did;
pub mod error;
pub mod fuzzy_extractor;
pub mod gf256;
pub mod kdf;
pub mod memory;
pub mod orchestrator;
pub mod quantizer;
pub mod shamir;
pub mod types;

pub use config::DecDidConfig;
pub use error::{
    DecDidError, EnrollError, FingerRecoveryError, QualityIssue, VerifyError,
};
pub use memory::{disable_core_dumps, SecretBuffer, SecretBytes};
pub use orchestrator::{enroll, verify, EnrollContext, EnrollOutput, VerifyContext, VerifyResult};
pub use types::{
    BiometricBlock, FingerCapture, FingerId, HelperRecord, HelperStorage, LegacyEnvelopeV1_0,
    MetadataEnvelope, Minutia, QuantizedTemplate, QuantizerParams, ThresholdParams,
};
