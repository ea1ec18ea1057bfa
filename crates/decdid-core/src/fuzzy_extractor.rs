//! Per-Finger Fuzzy Extractor (C3, §4.3) — the heart of the core.
//!
//! A "code-offset" secure sketch: enrollment XORs the quantized template
//! with a BCH-encoded random codeword to produce a `sketch` that reveals
//! nothing about the template beyond its BCH coset, then derives a
//! per-finger secret from the same randomness via HKDF. Verification
//! recovers the randomness from a noisy recapture (BCH decode tolerates up
//! to `t=18` bit errors per half) and checks a keyed auth tag to catch
//! both clean mismatches and BCH miscorrections.

use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::bch::{self, Bch};
use crate::error::{EnrollError, FingerRecoveryError};
use crate::kdf::{hkdf_derive, hmac_blake2b_128};
use crate::memory::{SecretBuffer, SecretBytes};
use crate::types::{FingerId, HelperRecord, QuantizedTemplate, TEMPLATE_BYTES};

const FINGER_INFO: &[u8] = b"decdid:finger:v1";
const AUTH_INFO: &[u8] = b"decdid:auth:v1";

/// Enroll a single finger's quantized template: sample fresh randomness,
/// build the secure sketch, and derive the per-finger secret.
///
/// # Errors
///
/// Returns `EnrollError::RandomnessUnavailable` if the OS CSPRNG fails.
pub fn enroll(
    template: &QuantizedTemplate,
    finger_id: FingerId,
    grid_size: f64,
    angle_bins: u32,
    bch: &Bch,
) -> Result<(HelperRecord, SecretBuffer), EnrollError> {
    let salt = random_bytes(16)?;
    let inner_seed = SecretBytes::<32>::random()
        .map_err(|e| EnrollError::RandomnessUnavailable(format!("CSPRNG fill failed: {e}")))?;

    let codeword_a = bch.encode(&build_message(&inner_seed.expose()[0..16]));
    let codeword_b = bch.encode(&build_message(&inner_seed.expose()[16..32]));
    let c = build_c(&codeword_a, &codeword_b);
    let sketch = template.xor(&c);

    let secret = derive_secret(&salt, inner_seed.expose(), finger_id)
        .map_err(|e| EnrollError::KeyDerivation(format!("secret derivation failed: {e}")))?;
    let k_auth = derive_auth_key(&salt, secret.expose())
        .map_err(|e| EnrollError::KeyDerivation(format!("auth key derivation failed: {e}")))?;
    let auth_tag = compute_auth_tag(
        k_auth.expose(),
        finger_id,
        &salt,
        &sketch.0,
        grid_size,
        angle_bins,
    )
    .map_err(|e| EnrollError::KeyDerivation(format!("auth tag derivation failed: {e}")))?;

    let helper = HelperRecord {
        finger_id,
        salt,
        sketch: sketch.0.to_vec(),
        auth_tag: auth_tag.to_vec(),
        grid_size,
        angle_bins,
        share: None,
    };
    Ok((helper, secret))
}

/// Recover the per-finger secret from a stored `HelperRecord` and a noisy
/// recapture's quantized template.
///
/// # Errors
///
/// Returns `FingerRecoveryError::RecoveryFailed` if either BCH half
/// decodes with more than `t=18` errors, or `AuthTagMismatch` if decoding
/// succeeds but the recomputed auth tag does not match — almost always a
/// different finger or a BCH miscorrection.
pub fn recover(
    helper: &HelperRecord,
    recapture: &QuantizedTemplate,
) -> Result<SecretBuffer, FingerRecoveryError> {
    let bch = Bch::new();
    let mut sketch = [0u8; TEMPLATE_BYTES];
    sketch.copy_from_slice(&helper.sketch);
    let c_prime = recapture.xor(&QuantizedTemplate(sketch));

    let (cw_a, cw_b) = split_c(&c_prime);
    let msg_a = bch
        .decode(&cw_a)
        .map_err(|_| FingerRecoveryError::RecoveryFailed)?;
    let msg_b = bch
        .decode(&cw_b)
        .map_err(|_| FingerRecoveryError::RecoveryFailed)?;

    let mut inner_seed_bytes = [0u8; 32];
    inner_seed_bytes[0..16].copy_from_slice(&extract_seed_half(&msg_a));
    inner_seed_bytes[16..32].copy_from_slice(&extract_seed_half(&msg_b));
    let inner_seed = SecretBytes::<32>::new(inner_seed_bytes);

    let secret = derive_secret(&helper.salt, inner_seed.expose(), helper.finger_id)
        .map_err(|_| FingerRecoveryError::RecoveryFailed)?;
    let k_auth = derive_auth_key(&helper.salt, secret.expose())
        .map_err(|_| FingerRecoveryError::RecoveryFailed)?;
    let auth_tag = compute_auth_tag(
        k_auth.expose(),
        helper.finger_id,
        &helper.salt,
        &helper.sketch,
        helper.grid_size,
        helper.angle_bins,
    )
    .map_err(|_| FingerRecoveryError::RecoveryFailed)?;

    if auth_tag.ct_eq(helper.auth_tag.as_slice()).unwrap_u8() == 1 {
        Ok(secret)
    } else {
        Err(FingerRecoveryError::AuthTagMismatch)
    }
}

fn derive_secret(
    salt: &[u8],
    inner_seed: &[u8],
    finger_id: FingerId,
) -> Result<SecretBuffer, crate::error::DecDidError> {
    let mut ikm = inner_seed.to_vec();
    ikm.extend_from_slice(finger_id.as_str().as_bytes());
    hkdf_derive(salt, &ikm, FINGER_INFO, 32)
}

fn derive_auth_key(
    salt: &[u8],
    secret: &[u8],
) -> Result<SecretBuffer, crate::error::DecDidError> {
    hkdf_derive(salt, secret, AUTH_INFO, 16)
}

fn compute_auth_tag(
    k_auth: &[u8],
    finger_id: FingerId,
    salt: &[u8],
    sketch: &[u8],
    grid_size: f64,
    angle_bins: u32,
) -> Result<[u8; 16], crate::error::DecDidError> {
    let mut msg = Vec::with_capacity(finger_id.as_str().len() + salt.len() + sketch.len() + 12);
    msg.extend_from_slice(finger_id.as_str().as_bytes());
    msg.extend_from_slice(salt);
    msg.extend_from_slice(sketch);
    msg.extend_from_slice(&grid_size.to_le_bytes());
    msg.extend_from_slice(&angle_bins.to_le_bytes());
    hmac_blake2b_128(k_auth, &msg)
}

fn random_bytes(len: usize) -> Result<Vec<u8>, EnrollError> {
    let mut buf = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| EnrollError::RandomnessUnavailable(format!("CSPRNG fill failed: {e}")))?;
    Ok(buf)
}

/// Pack a 16-byte seed half into a 131-bit BCH message: 128 data bits
/// followed by 3 zero reserved bits (§4.2's fixed bit-packing).
fn build_message(half: &[u8]) -> [u8; bch::K] {
    let mut bits = bitstring_from_bytes(half);
    bits.extend_from_slice(&[0, 0, 0]);
    let mut msg = [0u8; bch::K];
    msg.copy_from_slice(&bits);
    msg
}

fn extract_seed_half(message: &[u8; bch::K]) -> [u8; 16] {
    let bytes = bytes_from_bitstring(&message[0..128]);
    let mut out = [0u8; 16];
    out.copy_from_slice(&bytes);
    out
}

/// Concatenate two 255-bit codewords plus 2 zero padding bits into the
/// 512-bit field `C` (§4.2).
fn build_c(codeword_a: &[u8; bch::N], codeword_b: &[u8; bch::N]) -> QuantizedTemplate {
    let mut bits = Vec::with_capacity(512);
    bits.extend_from_slice(codeword_a);
    bits.extend_from_slice(codeword_b);
    bits.push(0);
    bits.push(0);
    let bytes = bytes_from_bitstring(&bits);
    let mut arr = [0u8; TEMPLATE_BYTES];
    arr.copy_from_slice(&bytes);
    QuantizedTemplate(arr)
}

fn split_c(c: &QuantizedTemplate) -> ([u8; bch::N], [u8; bch::N]) {
    let bits = bitstring_from_bytes(&c.0);
    let mut a = [0u8; bch::N];
    a.copy_from_slice(&bits[0..bch::N]);
    let mut b = [0u8; bch::N];
    b.copy_from_slice(&bits[bch::N..2 * bch::N]);
    (a, b)
}

fn bitstring_from_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1);
        }
    }
    bits
}

fn bytes_from_bitstring(bits: &[u8]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &b| (acc << 1) | b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_template(seed: u8) -> QuantizedTemplate {
        let mut bytes = [0u8; TEMPLATE_BYTES];
        let mut state = seed;
        for b in &mut bytes {
            state = state.wrapping_mul(101).wrapping_add(59);
            *b = state;
        }
        QuantizedTemplate(bytes)
    }

    fn flip_bits(template: &QuantizedTemplate, count: usize) -> QuantizedTemplate {
        let mut bytes = template.0;
        for i in 0..count {
            let byte = (i * 37) % TEMPLATE_BYTES;
            let bit = i % 8;
            bytes[byte] ^= 1 << bit;
        }
        QuantizedTemplate(bytes)
    }

    #[test]
    fn enroll_then_recover_with_no_noise_succeeds() {
        let bch = Bch::new();
        let template = sample_template(1);
        let (helper, secret) =
            enroll(&template, FingerId::LeftThumb, 0.05, 32, &bch).expect("enroll");
        let recovered = recover(&helper, &template).expect("recover");
        assert_eq!(secret.expose(), recovered.expose());
    }

    #[test]
    fn enroll_then_recover_tolerates_bounded_noise() {
        let bch = Bch::new();
        let template = sample_template(2);
        let (helper, secret) =
            enroll(&template, FingerId::RightIndex, 0.05, 32, &bch).expect("enroll");
        // 10 bits flipped, spread across both halves — comfortably under t=18 each.
        let noisy = flip_bits(&template, 10);
        let recovered = recover(&helper, &noisy).expect("recover within noise budget");
        assert_eq!(secret.expose(), recovered.expose());
    }

    #[test]
    fn recover_rejects_wrong_finger_template() {
        let bch = Bch::new();
        let template = sample_template(3);
        let (helper, _secret) =
            enroll(&template, FingerId::LeftIndex, 0.05, 32, &bch).expect("enroll");
        let unrelated = sample_template(200);
        let result = recover(&helper, &unrelated);
        assert!(matches!(
            result,
            Err(FingerRecoveryError::RecoveryFailed) | Err(FingerRecoveryError::AuthTagMismatch)
        ));
    }

    #[test]
    fn recover_rejects_tampered_sketch() {
        let bch = Bch::new();
        let template = sample_template(4);
        let (mut helper, _secret) =
            enroll(&template, FingerId::RightThumb, 0.05, 32, &bch).expect("enroll");
        helper.sketch[0] ^= 0xFF;
        let result = recover(&helper, &template);
        assert!(result.is_err());
    }
}
