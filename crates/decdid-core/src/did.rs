//! DID Deriver (C5, §4.5): hashes a Commitment into a canonical DID string
//! and assembles the on-chain metadata envelope (v1.1).

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use subtle::ConstantTimeEq;

use crate::error::{DecDidError, VerifyError};
use crate::types::{
    BiometricBlock, HelperStorage, LegacyEnvelopeV1_0, MetadataEnvelope, ThresholdParams,
};
use std::collections::BTreeMap;

/// Domain-separation string folded into the `id_hash` derivation, fixing
/// it to this crate's construction independent of `method`/`network`.
const DID_DOMAIN: &[u8] = b"decdid:did:v1";

/// Current envelope format version written by `Enroll`.
pub const ENVELOPE_VERSION: &str = "1.1";

/// `id_hash_bytes = BLAKE2b-256(C || "decdid:did:v1" || network)` (§4.5 step 1).
#[must_use]
pub fn id_hash_bytes(commitment: &[u8], network: &str) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(commitment);
    hasher.update(DID_DOMAIN);
    hasher.update(network.as_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Derive `(did, id_hash_base58)` from a Commitment and configuration
/// (§4.5 steps 1-3). Pure and deterministic in `(commitment, method,
/// network)`.
#[must_use]
pub fn derive(commitment: &[u8], method: &str, network: &str) -> (String, String) {
    let hash = id_hash_bytes(commitment, network);
    let id_hash = bs58::encode(hash).into_string();
    let did = format!("did:{method}:{network}:{id_hash}");
    (did, id_hash)
}

/// Constant-time check that `stored_id_hash` (base58) matches the
/// recomputed hash of `commitment` under `network`.
#[must_use]
pub fn id_hash_matches(commitment: &[u8], network: &str, stored_id_hash: &str) -> bool {
    let Ok(stored) = bs58::decode(stored_id_hash).into_vec() else {
        return false;
    };
    if stored.len() != 32 {
        return false;
    }
    let computed = id_hash_bytes(commitment, network);
    computed.ct_eq(stored.as_slice()).unwrap_u8() == 1
}

/// Assemble the MetadataEnvelope v1.1 (§3, §6) from a derived DID and the
/// enrollment context. Inline helper storage is the only mode this crate
/// produces; `external` with a `helper_uri` is accepted on read but never
/// written here (the caller owns off-chain helper storage, §1).
#[must_use]
pub fn build_envelope(
    did: String,
    id_hash: String,
    controllers: Vec<String>,
    enrollment_timestamp: String,
    helper_data: BTreeMap<String, crate::types::HelperRecord>,
    threshold: Option<ThresholdParams>,
) -> MetadataEnvelope {
    MetadataEnvelope {
        version: ENVELOPE_VERSION.to_string(),
        did,
        controllers,
        enrollment_timestamp,
        revoked: false,
        revoked_at: None,
        biometric: BiometricBlock {
            id_hash,
            helper_storage: HelperStorage::Inline,
            helper_data: Some(helper_data),
            helper_uri: None,
            threshold,
        },
    }
}

/// Serialize a `MetadataEnvelope` to canonical JSON: UTF-8, sorted keys
/// (via `BTreeMap` for `helper_data`), no insignificant whitespace.
/// `serde_json`'s struct serialization already preserves field-declaration
/// order for everything else, which combined with sorted map keys gives
/// byte-stable output (§6, §8 "Envelope canonicality").
///
/// # Errors
///
/// Returns `DecDidError::Serialization` if the envelope contains a
/// non-finite `grid_size` (JSON cannot represent `NaN`/`Infinity`).
pub fn to_canonical_json(envelope: &MetadataEnvelope) -> Result<String, DecDidError> {
    serde_json::to_string(envelope).map_err(|e| DecDidError::Serialization(e.to_string()))
}

/// Parse a stored envelope, dispatching on `version` (§4.6 step 1).
/// Accepts `"1.1"` directly and `"1.0"` via the legacy read-only shim;
/// anything else is `VerifyError::UnsupportedVersion`.
///
/// # Errors
///
/// Returns `VerifyError::MalformedEnvelope` if the JSON is structurally
/// invalid, or `VerifyError::UnsupportedVersion` for any version other
/// than `"1.1"`/`"1.0"`.
pub fn parse_envelope(json: &str) -> Result<MetadataEnvelope, VerifyError> {
    let value: serde_json::Value = serde_json::from_str(json).map_err(|e| VerifyError::MalformedEnvelope {
        field: "<root>".to_string(),
        reason: e.to_string(),
    })?;
    let version = value
        .get("version")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| VerifyError::MalformedEnvelope {
            field: "version".to_string(),
            reason: "missing or not a string".to_string(),
        })?
        .to_string();

    match version.as_str() {
        "1.1" => serde_json::from_value(value).map_err(|e| VerifyError::MalformedEnvelope {
            field: "<root>".to_string(),
            reason: e.to_string(),
        }),
        "1.0" => {
            let legacy: LegacyEnvelopeV1_0 =
                serde_json::from_value(value).map_err(|e| VerifyError::MalformedEnvelope {
                    field: "<root>".to_string(),
                    reason: e.to_string(),
                })?;
            Ok(legacy.into_current())
        }
        other => Err(VerifyError::UnsupportedVersion {
            found: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        let commitment = [7u8; 32];
        let (did_a, hash_a) = derive(&commitment, "cardano", "mainnet");
        let (did_b, hash_b) = derive(&commitment, "cardano", "mainnet");
        assert_eq!(did_a, did_b);
        assert_eq!(hash_a, hash_b);
    }

    #[test]
    fn derive_differs_by_network() {
        let commitment = [7u8; 32];
        let (mainnet_did, _) = derive(&commitment, "cardano", "mainnet");
        let (testnet_did, _) = derive(&commitment, "cardano", "testnet");
        assert_ne!(mainnet_did, testnet_did);
    }

    #[test]
    fn did_has_expected_shape() {
        let commitment = [1u8; 32];
        let (did, id_hash) = derive(&commitment, "cardano", "mainnet");
        assert_eq!(did, format!("did:cardano:mainnet:{id_hash}"));
        assert!(bs58::decode(&id_hash).into_vec().is_ok());
    }

    #[test]
    fn id_hash_matches_round_trips() {
        let commitment = [3u8; 32];
        let (_, id_hash) = derive(&commitment, "cardano", "mainnet");
        assert!(id_hash_matches(&commitment, "mainnet", &id_hash));
        assert!(!id_hash_matches(&commitment, "testnet", &id_hash));
    }

    #[test]
    fn id_hash_matches_rejects_garbage_input() {
        assert!(!id_hash_matches(&[0u8; 32], "mainnet", "not-base58-!!!"));
    }

    #[test]
    fn parse_envelope_accepts_v1_1() {
        let commitment = [5u8; 32];
        let (did, id_hash) = derive(&commitment, "cardano", "mainnet");
        let envelope = build_envelope(
            did,
            id_hash,
            vec!["addr1".to_string()],
            "2025-01-01T00:00:00Z".to_string(),
            BTreeMap::new(),
            None,
        );
        let json = to_canonical_json(&envelope).expect("serialize");
        let parsed = parse_envelope(&json).expect("parse");
        assert_eq!(parsed.version, "1.1");
        assert_eq!(parsed.did, envelope.did);
    }

    #[test]
    fn parse_envelope_accepts_legacy_v1_0() {
        let json = serde_json::json!({
            "version": "1.0",
            "did": "did:cardano:mainnet:abc123",
            "wallet_address": "addr1legacy",
            "biometric": {
                "id_hash": "abc123",
                "helper_storage": "inline",
                "helper_data": {}
            }
        })
        .to_string();
        let parsed = parse_envelope(&json).expect("parse legacy");
        assert_eq!(parsed.controllers, vec!["addr1legacy".to_string()]);
    }

    #[test]
    fn parse_envelope_rejects_unknown_version() {
        let json = r#"{"version":"1.2"}"#;
        let err = parse_envelope(json).expect_err("unsupported version");
        assert!(matches!(err, VerifyError::UnsupportedVersion { found } if found == "1.2"));
    }

    #[test]
    fn canonical_json_has_no_insignificant_whitespace() {
        let commitment = [9u8; 32];
        let (did, id_hash) = derive(&commitment, "cardano", "mainnet");
        let envelope = build_envelope(
            did,
            id_hash,
            vec![],
            "2025-01-01T00:00:00Z".to_string(),
            BTreeMap::new(),
            None,
        );
        let json = to_canonical_json(&envelope).expect("serialize");
        assert!(!json.contains('\n'));
        assert!(!json.contains("  "));
    }
}
