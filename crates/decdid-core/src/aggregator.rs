//! Multi-Finger Aggregator (C4, §4.4): combines per-finger secrets into a
//! single 256-bit Commitment, deterministically and order-independently.
//!
//! Default mode XORs a per-finger hash of each `S_i` together. Threshold
//! (`k`-of-`n`) mode instead generates an independent random Commitment at
//! enrollment, Shamir-splits it into `n` shares (one per finger), and
//! wraps each share with a keystream derived from that finger's `S_i` so
//! the wrapped share is meaningless without first recovering `S_i` via the
//! fuzzy extractor.

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

use crate::error::{DecDidError, EnrollError};
use crate::kdf::hkdf_derive;
use crate::memory::SecretBuffer;
use crate::shamir;
use crate::types::FingerId;

const SHARE_WRAP_INFO: &[u8] = b"decdid:share:v1";

/// Validate a `(k, n)` threshold pair against §4.4's bounds.
///
/// # Errors
///
/// Returns `EnrollError::InvalidThreshold` if `n` is outside `[2, 10]` or
/// `k` is outside `[min_threshold(n), n]`.
pub fn validate_threshold(k: u8, n: u8) -> Result<(), EnrollError> {
    if !(2..=10).contains(&n) {
        return Err(EnrollError::InvalidThreshold { k, n });
    }
    let min_k = strict_majority(n);
    if k < min_k || k > n {
        return Err(EnrollError::InvalidThreshold { k, n });
    }
    Ok(())
}

/// Smallest `k` that is a strict majority of `n`: `ceil((n + 1) / 2)`.
///
/// This resolves a contradiction in the source material: §4.4's stated
/// bound formula and its own worked 3-of-5 example disagree for odd `n`.
/// This crate follows the worked example (documented in `DESIGN.md`).
const fn strict_majority(n: u8) -> u8 {
    (n + 1).div_ceil(2)
}

fn finger_hash(secret: &[u8], finger_id: FingerId) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(secret);
    hasher.update(finger_id.as_str().as_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Default-mode aggregation: `C = XOR_i BLAKE2b-256(S_i || finger_id_i)`
/// over `entries` in canonical finger order.
///
/// # Errors
///
/// Returns `DecDidError::SecureMemory` if the output's secure buffer
/// allocation fails.
pub fn aggregate_default(entries: &[(FingerId, SecretBuffer)]) -> Result<SecretBuffer, DecDidError> {
    let mut ordered: Vec<&(FingerId, SecretBuffer)> = entries.iter().collect();
    ordered.sort_by_key(|(id, _)| *id);

    let mut commitment = [0u8; 32];
    for (id, secret) in ordered {
        let t = finger_hash(secret.expose(), *id);
        for (c, t) in commitment.iter_mut().zip(t.iter()) {
            *c ^= t;
        }
    }
    let result = SecretBuffer::new(&commitment)
        .map_err(|e| DecDidError::SecureMemory(format!("commitment buffer allocation failed: {e}")))?;
    commitment.zeroize();
    Ok(result)
}

/// Threshold-mode setup performed once at enrollment: sample a fresh
/// random Commitment and Shamir-split it into `n` raw shares.
///
/// # Errors
///
/// Returns `DecDidError::SecureMemory` if the CSPRNG or secure buffer
/// allocation fails.
pub fn new_threshold_commitment(
    k: u8,
    n: u8,
) -> Result<(SecretBuffer, Vec<Vec<u8>>), DecDidError> {
    let mut seed = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut seed)
        .map_err(|e| DecDidError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
    let commitment = SecretBuffer::new(&seed)
        .map_err(|e| DecDidError::SecureMemory(format!("commitment buffer allocation failed: {e}")))?;
    let shares = shamir::split(&seed, k, n);
    seed.zeroize();
    Ok((commitment, shares))
}

/// Wrap (or, symmetrically, unwrap) a raw Shamir share for storage inside
/// a `HelperRecord`, keyed by that finger's recovered secret. XOR with an
/// HKDF keystream is its own inverse, so the same function serves both
/// enrollment (wrap) and verification (unwrap).
///
/// # Errors
///
/// Returns `DecDidError::KeyDerivation` if the keystream derivation fails.
pub fn wrap_share(raw_share: &[u8], salt: &[u8], finger_secret: &[u8]) -> Result<Vec<u8>, DecDidError> {
    let keystream = hkdf_derive(salt, finger_secret, SHARE_WRAP_INFO, raw_share.len())?;
    let mut wrapped = raw_share.to_vec();
    for (w, k) in wrapped.iter_mut().zip(keystream.expose().iter()) {
        *w ^= *k;
    }
    Ok(wrapped)
}

/// Reconstruct the threshold Commitment from at least `k` unwrapped raw
/// shares.
///
/// # Errors
///
/// Returns `DecDidError::KeyDerivation` if fewer than `k` shares are
/// supplied or a share fails to parse, or `SecureMemory` if the
/// reconstructed commitment's secure buffer allocation fails.
pub fn reconstruct_commitment(k: u8, raw_shares: &[Vec<u8>]) -> Result<SecretBuffer, DecDidError> {
    let mut bytes = shamir::recover(k, raw_shares)?;
    let result = SecretBuffer::new(&bytes)
        .map_err(|e| DecDidError::SecureMemory(format!("commitment buffer allocation failed: {e}")))?;
    bytes.zeroize();
    Ok(result)
}
