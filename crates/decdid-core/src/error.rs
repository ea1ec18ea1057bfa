//! Error taxonomy for `decdid-core`.
//!
//! Every fallible operation in this crate returns one of the variants below —
//! there is no exception-for-control-flow path. Panics are reserved for
//! genuine programmer errors (e.g. a corrupted finger vocabulary table) and
//! are not part of the public contract.

use thiserror::Error;

use crate::types::FingerId;

/// Reason a [`EnrollError::PoorQuality`] / per-finger quality rejection fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityIssue {
    /// Fewer than 12 minutiae were supplied.
    TooFewMinutiae,
    /// More than 200 minutiae were supplied.
    TooManyMinutiae,
    /// Mean minutia quality was below 50.
    MeanQualityTooLow,
}

impl std::fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TooFewMinutiae => "fewer than 12 minutiae",
            Self::TooManyMinutiae => "more than 200 minutiae",
            Self::MeanQualityTooLow => "mean quality below 50",
        };
        f.write_str(s)
    }
}

/// Errors produced while enrolling a set of fingerprints into a DID.
#[derive(Debug, Error)]
pub enum EnrollError {
    /// `finger_id` is not one of the ten recognized vocabulary entries.
    #[error("unknown finger id: {0}")]
    UnknownFingerId(String),

    /// The same finger was presented more than once in a single enrollment.
    #[error("duplicate finger id: {0:?}")]
    DuplicateFingerId(FingerId),

    /// `|fingers|` was 0 or greater than 10.
    #[error("invalid finger count: {0} (expected 1..=10)")]
    InvalidFingerCount(usize),

    /// `(k, n)` threshold parameters violate §4.4's bounds.
    #[error("invalid threshold ({k} of {n})")]
    InvalidThreshold {
        /// Requested reconstruction threshold.
        k: u8,
        /// Total enrolled fingers.
        n: u8,
    },

    /// A `FingerCapture` was structurally invalid (malformed minutia fields).
    #[error("malformed capture for {finger_id:?}: {reason}")]
    MalformedCapture {
        /// The finger whose capture was malformed.
        finger_id: FingerId,
        /// Human-readable detail.
        reason: String,
    },

    /// A finger's capture failed the quality gate (§3).
    #[error("poor quality capture for {finger_id:?}: {reason}")]
    PoorQuality {
        /// The offending finger.
        finger_id: FingerId,
        /// Which quality invariant failed.
        reason: QualityIssue,
    },

    /// The configuration (method/network) was malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The OS CSPRNG failed to supply randomness.
    #[error("randomness unavailable: {0}")]
    RandomnessUnavailable(String),

    /// HKDF/HMAC derivation failed. Should be unreachable for well-formed
    /// input — HKDF itself cannot fail on correctly-sized salts/keys — but
    /// is surfaced rather than unwrapped, per this crate's no-panic policy.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
}

/// Per-finger recovery outcome recorded during Verify (§4.3, §7).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FingerRecoveryError {
    /// BCH decoding exceeded the correctable error budget (`t=18` per half).
    #[error("BCH decode exceeded correctable error budget")]
    RecoveryFailed,

    /// BCH decoded successfully but the recovered secret's auth tag does not
    /// match the helper record — almost certainly a different finger/person.
    #[error("auth tag mismatch")]
    AuthTagMismatch,
}

/// Errors produced while verifying a recapture against a stored envelope.
///
/// This taxonomy covers envelope-level failures only. Business-level
/// outcomes that are not malformed input — insufficient matches, identity
/// mismatch, revocation — are variants of [`crate::orchestrator::VerifyResult`]
/// instead, since they are expected terminal states of the Verify state
/// machine (§4.6) rather than exceptional conditions.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The envelope's `version` field is neither `"1.1"` nor `"1.0"`.
    #[error("unsupported envelope version: {found}")]
    UnsupportedVersion {
        /// The version string actually found.
        found: String,
    },

    /// The envelope failed structural validation.
    #[error("malformed envelope field `{field}`: {reason}")]
    MalformedEnvelope {
        /// The offending field.
        field: String,
        /// Human-readable detail.
        reason: String,
    },
}

/// Top-level error type covering both `Enroll` and `Verify` plus the shared
/// cryptographic primitives (§7's closed taxonomy, collected).
#[derive(Debug, Error)]
pub enum DecDidError {
    /// See [`EnrollError`].
    #[error("enroll error: {0}")]
    Enroll(#[from] EnrollError),

    /// See [`VerifyError`].
    #[error("verify error: {0}")]
    Verify(#[from] VerifyError),

    /// Secure memory allocation failure (mlock, CSPRNG).
    #[error("secure memory error: {0}")]
    SecureMemory(String),

    /// HKDF/HMAC key derivation failure (should only occur on malformed
    /// input lengths, since HKDF itself cannot fail on well-formed input).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// BCH encode/decode received a message/codeword of the wrong bit width.
    #[error("BCH codec error: {0}")]
    BchCodec(String),

    /// Canonical JSON (de)serialization of a `MetadataEnvelope` failed.
    #[error("envelope serialization error: {0}")]
    Serialization(String),
}
