//! HKDF-Extract-then-Expand and HMAC key derivation, both instantiated over
//! BLAKE2b (§4.3).
//!
//! This module provides:
//! - [`hkdf_derive`] — derive an arbitrary-length key from input key
//!   material and a salt, via `HKDF-Extract` then `HKDF-Expand`
//! - [`hmac_blake2b_128`] — a 128-bit keyed MAC, used for the fuzzy
//!   extractor's `auth_tag` (§4.3 step 7) and nowhere else
//!
//! # Where these are used
//!
//! - `S = hkdf_derive(salt, inner_seed || finger_id, "decdid:finger:v1", 32)`
//! - `K_auth = hkdf_derive(salt, S, "decdid:auth:v1", 16)`
//! - `auth_tag = hmac_blake2b_128(K_auth, finger_id || salt || sketch || params)`

use blake2::digest::consts::{U16, U32};
use blake2::Blake2b;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use zeroize::Zeroize;

use crate::error::DecDidError;
use crate::memory::SecretBuffer;

type Blake2b256 = Blake2b<U32>;
type Blake2b128 = Blake2b<U16>;
type HmacBlake2b128 = Hmac<Blake2b128>;

/// Derive `length` bytes of key material from `ikm` (input key material)
/// and `salt`, binding the output to `info` via `HKDF-Expand`.
///
/// Returns a [`SecretBuffer`] — the intermediate output buffer is
/// zeroized after the copy.
///
/// # Errors
///
/// Returns `DecDidError::KeyDerivation` if `length` exceeds HKDF's maximum
/// output for BLAKE2b-256 (`255 * 32` bytes — never hit in this crate,
/// whose longest derived value is 32 bytes) or if secure buffer allocation
/// fails.
pub fn hkdf_derive(
    salt: &[u8],
    ikm: &[u8],
    info: &[u8],
    length: usize,
) -> Result<SecretBuffer, DecDidError> {
    let hk = Hkdf::<Blake2b256>::new(Some(salt), ikm);
    let mut okm = vec![0u8; length];
    hk.expand(info, &mut okm)
        .map_err(|e| DecDidError::KeyDerivation(format!("HKDF expand failed: {e}")))?;
    let result = SecretBuffer::new(&okm)
        .map_err(|e| DecDidError::KeyDerivation(format!("secure buffer allocation failed: {e}")))?;
    okm.zeroize();
    Ok(result)
}

/// Compute `HMAC-BLAKE2b-128(key, data)`.
///
/// # Errors
///
/// Returns `DecDidError::KeyDerivation` if `key` is empty (HMAC requires a
/// nonempty key; callers here always pass a 16-byte `K_auth`, so this is
/// unreachable in practice).
pub fn hmac_blake2b_128(key: &[u8], data: &[u8]) -> Result<[u8; 16], DecDidError> {
    let mut mac = HmacBlake2b128::new_from_slice(key)
        .map_err(|e| DecDidError::KeyDerivation(format!("HMAC key error: {e}")))?;
    mac.update(data);
    let tag = mac.finalize().into_bytes();
    let mut out = [0u8; 16];
    out.copy_from_slice(&tag);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hkdf_derive_produces_requested_length() {
        let key = hkdf_derive(b"salt1234salt1234", b"ikm", b"info", 32).expect("derive");
        assert_eq!(key.len(), 32);
    }

    #[test]
    fn hkdf_derive_is_deterministic() {
        let a = hkdf_derive(b"salt1234salt1234", b"ikm", b"info", 32).expect("derive");
        let b = hkdf_derive(b"salt1234salt1234", b"ikm", b"info", 32).expect("derive");
        assert_eq!(a.expose(), b.expose());
    }

    #[test]
    fn hkdf_derive_different_info_differs() {
        let a = hkdf_derive(b"salt1234salt1234", b"ikm", b"info-a", 32).expect("derive");
        let b = hkdf_derive(b"salt1234salt1234", b"ikm", b"info-b", 32).expect("derive");
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn hkdf_derive_different_ikm_differs() {
        let a = hkdf_derive(b"salt1234salt1234", b"ikm-a", b"info", 32).expect("derive");
        let b = hkdf_derive(b"salt1234salt1234", b"ikm-b", b"info", 32).expect("derive");
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn hmac_blake2b_128_is_deterministic() {
        let a = hmac_blake2b_128(b"0123456789abcdef", b"data").expect("hmac");
        let b = hmac_blake2b_128(b"0123456789abcdef", b"data").expect("hmac");
        assert_eq!(a, b);
    }

    #[test]
    fn hmac_blake2b_128_differs_by_key() {
        let a = hmac_blake2b_128(b"0123456789abcdef", b"data").expect("hmac");
        let b = hmac_blake2b_128(b"fedcba9876543210", b"data").expect("hmac");
        assert_ne!(a, b);
    }

    #[test]
    fn hmac_blake2b_128_differs_by_message() {
        let a = hmac_blake2b_128(b"0123456789abcdef", b"data-a").expect("hmac");
        let b = hmac_blake2b_128(b"0123456789abcdef", b"data-b").expect("hmac");
        assert_ne!(a, b);
    }
}
