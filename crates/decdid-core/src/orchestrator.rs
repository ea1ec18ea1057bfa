//! Enroll/Verify Orchestrator (C6, §4.6): the crate's only public entry
//! points. `enroll` drives C1 -> C3 per finger, then C4 -> C5 once; `verify`
//! walks the state machine `ReadEnvelope -> CheckRevocation ->
//! PerFingerRecovery* -> Aggregate -> DeriveAndCompare -> {Success, Failure}`
//! described in §4.6.
//!
//! Per-finger work within a single call is independent until aggregation
//! (§5) — nothing here relies on the order fingers were presented in; the
//! aggregator re-sorts into canonical order regardless.

use std::collections::BTreeMap;

use crate::aggregator;
use crate::bch::Bch;
use crate::config::DecDidConfig;
use crate::did;
use crate::error::{EnrollError, FingerRecoveryError, VerifyError};
use crate::fuzzy_extractor;
use crate::memory::SecretBuffer;
use crate::quantizer;
use crate::types::{
    FingerCapture, FingerId, HelperRecord, MetadataEnvelope, ThresholdParams, MAX_MINUTIAE,
    MIN_MEAN_QUALITY, MIN_MINUTIAE,
};

/// Per-call context for [`enroll`] (§4.6, §6). `method`/`network`/default
/// quantizer parameters live in [`DecDidConfig`] instead, since they are
/// process-wide configuration rather than per-enrollment input (§9).
#[derive(Debug, Clone)]
pub struct EnrollContext {
    /// Opaque account identifiers that will control the resulting DID.
    pub controllers: Vec<String>,
    /// Caller-supplied RFC 3339 UTC timestamp for `enrollment_timestamp`.
    pub now: String,
    /// Optional `k`-of-`n` threshold mode; `None` means all enrolled
    /// fingers are required at Verify time.
    pub threshold: Option<(u8, u8)>,
}

/// Per-call context for [`verify`]. The core performs no time-based logic
/// of its own (§5); `now` is accepted only so callers have a single place
/// to thread a clock through, matching §6's input shape.
#[derive(Debug, Clone)]
pub struct VerifyContext {
    pub now: String,
}

/// The output of a successful `Enroll` call (§6's Output shape).
#[derive(Debug, Clone)]
pub struct EnrollOutput {
    pub did: String,
    pub envelope: MetadataEnvelope,
    pub helper_records: Vec<HelperRecord>,
    /// Set when exactly one finger was enrolled (§4.6 step 1): not an
    /// error, but single-finger mode carries only ~64 bits of biometric
    /// entropy and the caller should surface this to the user.
    pub single_finger_warning: bool,
}

/// The outcome of a `Verify` call (§4.6, §7). Per-finger recovery failures
/// never abort the call early — only envelope-level and aggregation-level
/// conditions do (§7's propagation policy).
#[derive(Debug, Clone)]
pub enum VerifyResult {
    /// All required fingers recovered and the reassembled DID matches.
    Success {
        did: String,
        matched_fingers: Vec<FingerId>,
        unmatched_fingers: Vec<(FingerId, FingerRecoveryError)>,
    },
    /// The envelope was marked revoked; no biometric work was performed.
    Revoked { revoked_at: Option<String> },
    /// Fewer than the required number of fingers matched.
    InsufficientMatches { matched: usize, required: usize },
    /// Every required finger matched, but the reassembled DID does not
    /// match the envelope's `id_hash`. Represents a bug or a tampered
    /// envelope (§4.6 step 7) — should be unreachable for honest input.
    IdentityMismatch,
}

/// `Enroll(fingers, context) -> DidBundle` (§4.6).
///
/// # Errors
///
/// Returns [`EnrollError`] on the first validation, quality, or
/// cryptographic failure; no partial helpers are returned on error (§7).
pub fn enroll(
    fingers: &[FingerCapture],
    context: &EnrollContext,
    config: &DecDidConfig,
) -> Result<EnrollOutput, EnrollError> {
    validate_finger_set(fingers)?;
    validate_timestamp(&context.now)?;
    let single_finger_warning = fingers.len() == 1;

    let threshold = match context.threshold {
        Some((k, n)) => {
            if usize::from(n) != fingers.len() {
                return Err(EnrollError::InvalidThreshold { k, n });
            }
            aggregator::validate_threshold(k, n)?;
            Some((k, n))
        }
        None => None,
    };

    let bch = Bch::new();
    let params = config.default_quantizer_params;

    let mut enrolled: Vec<(FingerId, HelperRecord, SecretBuffer)> = Vec::with_capacity(fingers.len());
    for capture in fingers {
        validate_capture(capture)?;
        let template = quantizer::quantize(capture, params);
        let (helper, secret) = fuzzy_extractor::enroll(
            &template,
            capture.finger_id,
            params.grid_size,
            params.angle_bins,
            &bch,
        )?;
        enrolled.push((capture.finger_id, helper, secret));
    }

    let (commitment, mut helpers_by_finger) = match threshold {
        Some((k, n)) => {
            let (commitment, raw_shares) = aggregator::new_threshold_commitment(k, n)
                .map_err(|e| EnrollError::KeyDerivation(e.to_string()))?;
            enrolled.sort_by_key(|(id, _, _)| *id);
            if raw_shares.len() != enrolled.len() {
                return Err(EnrollError::KeyDerivation(
                    "Shamir share count did not match enrolled finger count".to_string(),
                ));
            }
            let mut by_finger = BTreeMap::new();
            for ((finger_id, mut helper, secret), raw_share) in
                enrolled.into_iter().zip(raw_shares.into_iter())
            {
                let wrapped = aggregator::wrap_share(&raw_share, &helper.salt, secret.expose())
                    .map_err(|e| EnrollError::KeyDerivation(e.to_string()))?;
                helper.share = Some(wrapped);
                by_finger.insert(finger_id.as_str().to_string(), helper);
            }
            (commitment, by_finger)
        }
        None => {
            let entries: Vec<(FingerId, SecretBuffer)> = enrolled
                .iter()
                .map(|(id, _, secret)| clone_secret(secret).map(|s| (*id, s)))
                .collect::<Result<_, _>>()?;
            let commitment = aggregator::aggregate_default(&entries)
                .map_err(|e| EnrollError::KeyDerivation(e.to_string()))?;
            let by_finger = enrolled
                .into_iter()
                .map(|(id, helper, _secret)| (id.as_str().to_string(), helper))
                .collect();
            (commitment, by_finger)
        }
    };

    let (did_string, id_hash) = did::derive(commitment.expose(), &config.method, &config.network);
    let threshold_params = threshold.map(|(k, n)| ThresholdParams { k, n });
    let envelope = did::build_envelope(
        did_string.clone(),
        id_hash,
        context.controllers.clone(),
        context.now.clone(),
        helpers_by_finger.clone(),
        threshold_params,
    );
    let helper_records: Vec<HelperRecord> = std::mem::take(&mut helpers_by_finger)
        .into_values()
        .collect();

    Ok(EnrollOutput {
        did: did_string,
        envelope,
        helper_records,
        single_finger_warning,
    })
}

/// Validate finger-count and duplicate-id invariants (§4.6 step 1).
fn validate_finger_set(fingers: &[FingerCapture]) -> Result<(), EnrollError> {
    if fingers.is_empty() || fingers.len() > 10 {
        return Err(EnrollError::InvalidFingerCount(fingers.len()));
    }
    let mut seen = std::collections::BTreeSet::new();
    for capture in fingers {
        if !seen.insert(capture.finger_id) {
            return Err(EnrollError::DuplicateFingerId(capture.finger_id));
        }
    }
    Ok(())
}

/// `enrollment_timestamp` must be a well-formed RFC 3339 UTC instant (§3).
/// `chrono` is used only to validate the caller-supplied clock string, not
/// to generate timestamps — the core has no notion of "now" of its own
/// (§5, §9).
fn validate_timestamp(now: &str) -> Result<(), EnrollError> {
    chrono::DateTime::parse_from_rfc3339(now)
        .map(|_| ())
        .map_err(|e| EnrollError::InvalidConfig(format!("`now` is not RFC 3339: {e}")))
}

/// Quality gate (§3, §4.6 step 1): `|minutiae| in [12, 200]` and mean
/// quality `>= 50`.
fn validate_capture(capture: &FingerCapture) -> Result<(), EnrollError> {
    use crate::error::QualityIssue;

    let n = capture.minutiae.len();
    if n < MIN_MINUTIAE {
        return Err(EnrollError::PoorQuality {
            finger_id: capture.finger_id,
            reason: QualityIssue::TooFewMinutiae,
        });
    }
    if n > MAX_MINUTIAE {
        return Err(EnrollError::PoorQuality {
            finger_id: capture.finger_id,
            reason: QualityIssue::TooManyMinutiae,
        });
    }
    #[allow(clippy::cast_precision_loss)]
    let mean_quality =
        capture.minutiae.iter().map(|m| f64::from(m.quality)).sum::<f64>() / n as f64;
    if mean_quality < MIN_MEAN_QUALITY {
        return Err(EnrollError::PoorQuality {
            finger_id: capture.finger_id,
            reason: QualityIssue::MeanQualityTooLow,
        });
    }
    Ok(())
}

/// Copy a [`SecretBuffer`]'s contents into a fresh one. `SecretBuffer` is
/// intentionally not `Clone` (copies of secret material should be explicit
/// and visible at the call site) — this helper is that explicit copy,
/// needed because default-mode aggregation consumes owned secrets while
/// the enrolled helper records must also survive past that point.
fn clone_secret(secret: &SecretBuffer) -> Result<SecretBuffer, EnrollError> {
    SecretBuffer::new(secret.expose())
        .map_err(|e| EnrollError::KeyDerivation(format!("secret copy failed: {e}")))
}

/// `Verify(fingers, stored, context) -> VerifyResult` (§4.6).
///
/// # Errors
///
/// Returns [`VerifyError`] for envelope-level failures (unsupported
/// version, malformed structure). Per-finger recovery failures are
/// reported inside [`VerifyResult::Success::unmatched_fingers`], not as an
/// `Err` — only envelope-level and aggregation-level conditions terminate
/// early (§7).
pub fn verify(
    fingers: &[FingerCapture],
    stored: &MetadataEnvelope,
    _context: &VerifyContext,
) -> Result<VerifyResult, VerifyError> {
    if stored.version != "1.1" && stored.version != "1.0" {
        return Err(VerifyError::UnsupportedVersion {
            found: stored.version.clone(),
        });
    }

    if stored.revoked {
        return Ok(VerifyResult::Revoked {
            revoked_at: stored.revoked_at.clone(),
        });
    }

    let helper_data = stored.biometric.helper_data.as_ref().ok_or_else(|| {
        VerifyError::MalformedEnvelope {
            field: "biometric.helper_data".to_string(),
            reason: "external helper storage was not resolved before calling Verify".to_string(),
        }
    })?;

    let mut matched_fingers = Vec::new();
    let mut unmatched_fingers = Vec::new();
    let mut recovered: Vec<(FingerId, SecretBuffer)> = Vec::new();
    let mut recovered_shares: Vec<(FingerId, &HelperRecord, SecretBuffer)> = Vec::new();

    for capture in fingers {
        let Some(helper) = helper_data.get(capture.finger_id.as_str()) else {
            continue;
        };
        let params = crate::types::QuantizerParams {
            grid_size: helper.grid_size,
            angle_bins: helper.angle_bins,
        };
        let recapture = quantizer::quantize(capture, params);
        match fuzzy_extractor::recover(helper, &recapture) {
            Ok(secret) => {
                matched_fingers.push(capture.finger_id);
                if stored.biometric.threshold.is_some() {
                    recovered_shares.push((capture.finger_id, helper, secret));
                } else {
                    recovered.push((capture.finger_id, secret));
                }
            }
            Err(e) => unmatched_fingers.push((capture.finger_id, e)),
        }
    }

    let required = match stored.biometric.threshold {
        Some(ThresholdParams { k, .. }) => usize::from(k),
        None => helper_data.len(),
    };
    if matched_fingers.len() < required {
        return Ok(VerifyResult::InsufficientMatches {
            matched: matched_fingers.len(),
            required,
        });
    }

    let commitment = match stored.biometric.threshold {
        Some(ThresholdParams { k, .. }) => {
            let mut raw_shares = Vec::with_capacity(recovered_shares.len());
            for (_, helper, secret) in &recovered_shares {
                let Some(wrapped) = helper.share.as_ref() else {
                    return Err(VerifyError::MalformedEnvelope {
                        field: "biometric.helper_data[].share".to_string(),
                        reason: "threshold mode requires a share on every helper record"
                            .to_string(),
                    });
                };
                let raw = aggregator::wrap_share(wrapped, &helper.salt, secret.expose())
                    .map_err(|e| VerifyError::MalformedEnvelope {
                        field: "biometric.helper_data[].share".to_string(),
                        reason: e.to_string(),
                    })?;
                raw_shares.push(raw);
            }
            aggregator::reconstruct_commitment(k, &raw_shares).map_err(|e| {
                VerifyError::MalformedEnvelope {
                    field: "biometric.threshold".to_string(),
                    reason: e.to_string(),
                }
            })?
        }
        None => aggregator::aggregate_default(&recovered).map_err(|e| {
            VerifyError::MalformedEnvelope {
                field: "biometric".to_string(),
                reason: e.to_string(),
            }
        })?,
    };

    let (_method, network) = split_did(&stored.did).ok_or_else(|| VerifyError::MalformedEnvelope {
        field: "did".to_string(),
        reason: format!("not a well-formed did:<method>:<network>:<hash> string: {}", stored.did),
    })?;

    if did::id_hash_matches(commitment.expose(), network, &stored.biometric.id_hash) {
        Ok(VerifyResult::Success {
            did: stored.did.clone(),
            matched_fingers,
            unmatched_fingers,
        })
    } else {
        Ok(VerifyResult::IdentityMismatch)
    }
}

/// Split a `did:<method>:<network>:<hash>` string into `(method, network)`.
fn split_did(did: &str) -> Option<(&str, &str)> {
    let mut parts = did.splitn(4, ':');
    let scheme = parts.next()?;
    if scheme != "did" {
        return None;
    }
    let method = parts.next()?;
    let network = parts.next()?;
    let _hash = parts.next()?;
    Some((method, network))
}
