//! Thin wrapper around `sharks`' `GF(256)` byte-wise Shamir secret sharing
//! (§4.4's `k`-of-`n` threshold mode).

use sharks::{Share, Sharks};

use crate::error::DecDidError;

/// Split `secret` into `shares` shares with reconstruction threshold
/// `threshold`. Each returned `Vec<u8>` is a self-contained serialized
/// share (`sharks`' wire format: one coordinate byte followed by the
/// share's `y`-values).
#[must_use]
pub fn split(secret: &[u8], threshold: u8, shares: u8) -> Vec<Vec<u8>> {
    let sharks = Sharks(threshold);
    sharks
        .dealer(secret)
        .take(shares as usize)
        .map(|share| Vec::from(&share))
        .collect()
}

/// Reconstruct the original secret from at least `threshold` shares.
///
/// # Errors
///
/// Returns `DecDidError::KeyDerivation` if a share fails to parse or if
/// fewer than `threshold` valid shares are supplied.
pub fn recover(threshold: u8, serialized_shares: &[Vec<u8>]) -> Result<Vec<u8>, DecDidError> {
    let shares = serialized_shares
        .iter()
        .map(|bytes| Share::try_from(bytes.as_slice()))
        .collect::<Result<Vec<Share>, _>>()
        .map_err(|e| DecDidError::KeyDerivation(format!("invalid Shamir share: {e}")))?;

    let sharks = Sharks(threshold);
    sharks
        .recover(shares.iter())
        .map_err(|e| DecDidError::KeyDerivation(format!("Shamir recovery failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_then_recover_with_threshold_shares_round_trips() {
        let secret = b"0123456789abcdef0123456789abcdef".to_vec();
        let shares = split(&secret, 3, 5);
        assert_eq!(shares.len(), 5);
        let recovered = recover(3, &shares[0..3]).expect("recover with exactly k shares");
        assert_eq!(recovered, secret);
    }

    #[test]
    fn recover_with_a_different_k_subset_agrees() {
        let secret = b"fedcba9876543210fedcba9876543210".to_vec();
        let shares = split(&secret, 3, 5);
        let a = recover(3, &[shares[0].clone(), shares[1].clone(), shares[2].clone()])
            .expect("recover subset a");
        let b = recover(3, &[shares[1].clone(), shares[3].clone(), shares[4].clone()])
            .expect("recover subset b");
        assert_eq!(a, b);
    }

    #[test]
    fn recover_with_fewer_than_threshold_shares_is_wrong_or_fails() {
        let secret = b"0123456789abcdef0123456789abcdef".to_vec();
        let shares = split(&secret, 3, 5);
        // With only 2 of 3 required shares, recovery either errors or
        // silently returns a wrong value — both are acceptable here since
        // the caller (aggregator) is responsible for enforcing the count
        // before calling recover.
        if let Ok(wrong) = recover(3, &shares[0..2]) {
            assert_ne!(wrong, secret);
        }
    }
}
