//! Core data model: the fixed finger vocabulary and the records that flow
//! between components (§3).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One of the ten recognized fingers. `Ord` follows the canonical
/// enumeration order used by the aggregator (§4.4) — this ordering, not
/// insertion order, is what makes `Commitment` derivation order-independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerId {
    LeftThumb,
    LeftIndex,
    LeftMiddle,
    LeftRing,
    LeftLittle,
    RightThumb,
    RightIndex,
    RightMiddle,
    RightRing,
    RightLittle,
}

impl FingerId {
    /// All ten variants in canonical order.
    pub const ALL: [Self; 10] = [
        Self::LeftThumb,
        Self::LeftIndex,
        Self::LeftMiddle,
        Self::LeftRing,
        Self::LeftLittle,
        Self::RightThumb,
        Self::RightIndex,
        Self::RightMiddle,
        Self::RightRing,
        Self::RightLittle,
    ];

    /// Parse the wire representation (`"left_thumb"`, ...). Returns `None`
    /// for anything outside the fixed vocabulary.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }

    /// The wire representation, matching the `snake_case` serde rename.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LeftThumb => "left_thumb",
            Self::LeftIndex => "left_index",
            Self::LeftMiddle => "left_middle",
            Self::LeftRing => "left_ring",
            Self::LeftLittle => "left_little",
            Self::RightThumb => "right_thumb",
            Self::RightIndex => "right_index",
            Self::RightMiddle => "right_middle",
            Self::RightRing => "right_ring",
            Self::RightLittle => "right_little",
        }
    }
}

impl std::fmt::Display for FingerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single fingerprint feature point, produced externally by the minutiae
/// extractor (out of scope here — the core only consumes these).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Minutia {
    /// Normalized horizontal position, `[0, 1]`.
    pub x: f64,
    /// Normalized vertical position, `[0, 1]`.
    pub y: f64,
    /// Ridge orientation in radians, `[0, 2*pi)`.
    pub theta: f64,
    /// Extractor-reported confidence, `[0, 100]`.
    pub quality: u8,
}

/// A finger's minutia set as presented to `Enroll`/`Verify` (§3).
#[derive(Debug, Clone)]
pub struct FingerCapture {
    pub finger_id: FingerId,
    pub minutiae: Vec<Minutia>,
}

/// Minimum number of minutiae a capture must contain (§3).
pub const MIN_MINUTIAE: usize = 12;
/// Maximum number of minutiae a capture may contain (§3).
pub const MAX_MINUTIAE: usize = 200;
/// Minimum mean quality, inclusive (§3).
pub const MIN_MEAN_QUALITY: f64 = 50.0;

/// Quantizer parameters. Defaults match §4.1; the verify path must use the
/// values recorded in the stored `HelperRecord`, never these defaults,
/// once a helper exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantizerParams {
    /// Spatial bin width, default `0.05` (a 20x20 grid).
    pub grid_size: f64,
    /// Number of angular buckets, default `32`.
    pub angle_bins: u32,
}

impl Default for QuantizerParams {
    fn default() -> Self {
        Self {
            grid_size: 0.05,
            angle_bins: 32,
        }
    }
}

/// Width in bits of a [`QuantizedTemplate`].
pub const TEMPLATE_BITS: usize = 512;
/// Width in bytes of a [`QuantizedTemplate`].
pub const TEMPLATE_BYTES: usize = TEMPLATE_BITS / 8;

/// The opaque, fixed-width output of the minutiae quantizer (§3, §4.1).
/// Not secret on its own, but never persisted — only its XOR with a BCH
/// codeword (the `sketch`) is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizedTemplate(pub [u8; TEMPLATE_BYTES]);

impl QuantizedTemplate {
    #[must_use]
    pub fn hamming_distance(&self, other: &Self) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    #[must_use]
    pub fn xor(&self, other: &Self) -> Self {
        let mut out = [0u8; TEMPLATE_BYTES];
        for i in 0..TEMPLATE_BYTES {
            out[i] = self.0[i] ^ other.0[i];
        }
        Self(out)
    }
}

/// The on-disk/on-metadata artifact emitted at enrollment and consumed at
/// verification (§3). Not secret — no zeroization required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelperRecord {
    pub finger_id: FingerId,
    /// 16 random bytes, base64 on the wire.
    #[serde(with = "base64_bytes")]
    pub salt: Vec<u8>,
    /// 64 bytes: `W XOR BCH-encode(inner_seed)`.
    #[serde(with = "base64_bytes")]
    pub sketch: Vec<u8>,
    /// 16 bytes: keyed MAC binding the record to `(finger_id, salt, sketch, params)`.
    #[serde(with = "base64_bytes")]
    pub auth_tag: Vec<u8>,
    pub grid_size: f64,
    pub angle_bins: u32,
    /// Present only in threshold (`k`-of-`n`) mode: this finger's Shamir
    /// share of the per-finger secret.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[serde(with = "base64_bytes_opt")]
    pub share: Option<Vec<u8>>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

mod base64_bytes_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_str(&STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let s: Option<String> = Option::deserialize(d)?;
        s.map(|s| STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Where a `MetadataEnvelope`'s helper data physically lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelperStorage {
    Inline,
    External,
}

/// Recorded `k`-of-`n` threshold parameters (§4.4's optional extension).
/// Not part of spec.md's §3 `HelperRecord` field list — that schema is only
/// allowed to grow a `share` field — so the `(k, n)` pair that the
/// aggregator needs at Verify time to know how many matches are required is
/// recorded once here, at the envelope level, rather than duplicated into
/// every finger's helper record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdParams {
    /// Reconstruction threshold.
    pub k: u8,
    /// Total enrolled fingers.
    pub n: u8,
}

/// `biometric` sub-block of [`MetadataEnvelope`] (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiometricBlock {
    pub id_hash: String,
    pub helper_storage: HelperStorage,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub helper_data: Option<BTreeMap<String, HelperRecord>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub helper_uri: Option<String>,
    /// Present only when this enrollment used `k`-of-`n` threshold mode.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub threshold: Option<ThresholdParams>,
}

/// The stable external artifact produced by `Enroll` and consumed by
/// `Verify` (§3, §6). Field order here is serialization order: `serde_json`
/// preserves struct-declaration order, which combined with sorted map keys
/// in `helper_data` (a `BTreeMap`) gives byte-stable canonical JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataEnvelope {
    pub version: String,
    pub did: String,
    pub controllers: Vec<String>,
    pub enrollment_timestamp: String,
    pub revoked: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revoked_at: Option<String>,
    pub biometric: BiometricBlock,
}

/// Read-only shim for the legacy v1.0 envelope shape (§6, §9): no
/// `controllers`/`enrollment_timestamp`/`revoked`, a single
/// `wallet_address` field instead. Accepted on `Verify`, never written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyEnvelopeV1_0 {
    pub version: String,
    pub did: String,
    pub wallet_address: String,
    pub biometric: BiometricBlock,
}

impl LegacyEnvelopeV1_0 {
    /// Lift a legacy envelope into the current in-memory shape so the
    /// orchestrator only has one representation to reason about. The
    /// synthesized `controllers` carries the single legacy wallet address;
    /// `enrollment_timestamp` is unknown and set to the Unix epoch rather
    /// than guessed.
    #[must_use]
    pub fn into_current(self) -> MetadataEnvelope {
        MetadataEnvelope {
            version: self.version,
            did: self.did,
            controllers: vec![self.wallet_address],
            enrollment_timestamp: "1970-01-01T00:00:00Z".to_string(),
            revoked: false,
            revoked_at: None,
            biometric: self.biometric,
        }
    }
}
