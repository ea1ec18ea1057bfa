//! Binary BCH(255, 131, 18) codec over `GF(2^8)` (§4.2).
//!
//! Systematic encoding: the 131 message bits appear verbatim in the
//! high-order positions of the 255-bit codeword; the low-order 124 bits
//! are the parity check computed by dividing the shifted message by the
//! generator polynomial. Decoding runs Berlekamp-Massey to find the
//! error-locator polynomial from the syndromes, then Chien search to
//! find its roots (the error positions).
//!
//! The generator polynomial is not hard-coded: it is built once, from the
//! field's log/antilog tables, as the product of the minimal polynomials
//! of `alpha^1 .. alpha^36` (the `2*t` consecutive roots the BCH bound
//! requires for `t=18`), following the construction in §4.2.

use crate::gf256::Gf256;

/// Codeword length.
pub const N: usize = 255;
/// Message length.
pub const K: usize = 131;
/// Correctable errors per codeword.
pub const T: usize = 18;
/// Generator polynomial degree (parity length).
const PARITY: usize = N - K;

/// Decoding failure: more than `t` bit errors were present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("BCH decode exceeded correctable error budget")]
    TooManyErrors,
}

/// A configured BCH(255,131,18) encoder/decoder. Stateless beyond its
/// field tables and generator polynomial; safe to share across threads
/// (construct once, e.g. as part of `DecDidConfig`'s lazily-built state).
#[derive(Debug, Clone)]
pub struct Bch {
    gf: Gf256,
    /// Generator polynomial coefficients, index = degree, `generator[PARITY] == 1`.
    generator: Vec<u8>,
}

impl Bch {
    #[must_use]
    pub fn new() -> Self {
        let gf = Gf256::new();
        let generator = build_generator(&gf);
        debug_assert_eq!(
            generator.len(),
            PARITY + 1,
            "BCH(255,131,18) generator polynomial must have degree {PARITY}"
        );
        Self { gf, generator }
    }

    /// Systematic encode: `message` bits appear verbatim at codeword
    /// indices `[PARITY, N)`; indices `[0, PARITY)` are parity.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)]
    pub fn encode(&self, message: &[u8; K]) -> [u8; N] {
        let mut shifted = vec![0u8; N];
        shifted[PARITY..].copy_from_slice(message);
        let remainder = poly_mod(&shifted, &self.generator);
        let mut codeword = [0u8; N];
        codeword[..PARITY].copy_from_slice(&remainder);
        codeword[PARITY..].copy_from_slice(message);
        codeword
    }

    /// Decode a (possibly noisy) codeword back to its 131-bit message,
    /// correcting up to `t=18` bit errors.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::TooManyErrors` if the error-locator degree
    /// exceeds `t`, if Chien search does not find exactly that many
    /// distinct roots, or if the corrected word's syndromes are not all
    /// zero — each a sign of a miscorrection rather than a clean decode.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn decode(&self, received: &[u8; N]) -> Result<[u8; K], DecodeError> {
        let syndromes = self.syndromes(received);
        if syndromes.iter().all(|&s| s == 0) {
            let mut msg = [0u8; K];
            msg.copy_from_slice(&received[PARITY..]);
            return Ok(msg);
        }

        let sigma = berlekamp_massey(&self.gf, &syndromes);
        let degree = sigma.len() - 1;
        if degree == 0 || degree > T {
            return Err(DecodeError::TooManyErrors);
        }

        let positions = self.chien_search(&sigma);
        if positions.len() != degree {
            return Err(DecodeError::TooManyErrors);
        }

        let mut corrected = *received;
        for p in positions {
            corrected[p] ^= 1;
        }

        let post = self.syndromes(&corrected);
        if post.iter().any(|&s| s != 0) {
            return Err(DecodeError::TooManyErrors);
        }

        let mut msg = [0u8; K];
        msg.copy_from_slice(&corrected[PARITY..]);
        Ok(msg)
    }

    /// `S_j = r(alpha^j)` for `j` in `1..=2t`, evaluated over `GF(256)`.
    #[allow(clippy::arithmetic_side_effects)]
    fn syndromes(&self, codeword: &[u8; N]) -> Vec<u8> {
        (1..=2 * T)
            .map(|j| {
                let mut s = 0u8;
                for (i, &bit) in codeword.iter().enumerate() {
                    if bit != 0 {
                        #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
                        s ^= self.gf.exp((i as i32) * (j as i32));
                    }
                }
                s
            })
            .collect()
    }

    /// Find the roots of the error-locator polynomial `sigma` by testing
    /// every candidate position; a root at `alpha^{-p}` means position `p`
    /// of the codeword is in error.
    #[allow(clippy::arithmetic_side_effects, clippy::cast_possible_wrap)]
    fn chien_search(&self, sigma: &[u8]) -> Vec<usize> {
        let mut positions = Vec::new();
        for p in 0..N {
            let x_inv = self.gf.exp(-(p as i32));
            let mut val = sigma[0];
            for (j, &coef) in sigma.iter().enumerate().skip(1) {
                val ^= self.gf.mul(coef, self.gf.pow(x_inv, j as i32));
            }
            if val == 0 {
                positions.push(p);
            }
        }
        positions
    }
}

impl Default for Bch {
    fn default() -> Self {
        Self::new()
    }
}

/// Berlekamp-Massey: find the shortest linear-feedback shift register that
/// generates the syndrome sequence — equivalently, the error-locator
/// polynomial `sigma` with `sigma[0] = 1`.
#[allow(clippy::arithmetic_side_effects, clippy::many_single_char_names)]
fn berlekamp_massey(gf: &Gf256, syndromes: &[u8]) -> Vec<u8> {
    let n = syndromes.len();
    let mut c = vec![0u8; n + 1];
    let mut b = vec![0u8; n + 1];
    c[0] = 1;
    b[0] = 1;
    let mut l = 0usize;
    let mut m = 1usize;
    let mut last_discrepancy = 1u8;

    for round in 0..n {
        let mut delta = syndromes[round];
        for i in 1..=l {
            delta ^= gf.mul(c[i], syndromes[round - i]);
        }

        if delta == 0 {
            m += 1;
        } else if 2 * l <= round {
            let snapshot = c.clone();
            let coef = gf.div(delta, last_discrepancy).unwrap_or(0);
            for (i, &bi) in b.iter().enumerate() {
                if i + m < c.len() {
                    c[i + m] ^= gf.mul(coef, bi);
                }
            }
            l = round + 1 - l;
            b = snapshot;
            last_discrepancy = delta;
            m = 1;
        } else {
            let coef = gf.div(delta, last_discrepancy).unwrap_or(0);
            for (i, &bi) in b.iter().enumerate() {
                if i + m < c.len() {
                    c[i + m] ^= gf.mul(coef, bi);
                }
            }
            m += 1;
        }
    }

    c.truncate(l + 1);
    c
}

/// Remainder of binary-coefficient polynomial division (`GF(2)[x]`).
/// Both `dividend` and `divisor` are stored index-as-degree, `divisor`
/// monic (`divisor.last() == Some(&1)`).
#[allow(clippy::arithmetic_side_effects)]
fn poly_mod(dividend: &[u8], divisor: &[u8]) -> Vec<u8> {
    let dd = divisor.len() - 1;
    let mut rem = dividend.to_vec();
    for i in (dd..rem.len()).rev() {
        if rem[i] != 0 {
            for (j, &dj) in divisor.iter().enumerate() {
                rem[i - dd + j] ^= dj;
            }
        }
    }
    rem.truncate(dd);
    rem
}

/// Binary-coefficient polynomial multiplication (`GF(2)[x]`).
#[allow(clippy::arithmetic_side_effects)]
fn gf2_poly_mul(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; a.len() + b.len() - 1];
    for (i, &ai) in a.iter().enumerate() {
        if ai != 0 {
            for (j, &bj) in b.iter().enumerate() {
                out[i + j] ^= bj;
            }
        }
    }
    out
}

/// Multiply a `GF(256)`-coefficient polynomial by the linear factor
/// `(x + root)`. Used to build minimal polynomials root-by-root; when
/// `root` ranges over a full cyclotomic coset the result collapses to
/// coefficients in `{0, 1}` (the prime subfield).
#[allow(clippy::arithmetic_side_effects)]
fn mul_by_linear(poly: &[u8], root: u8, gf: &Gf256) -> Vec<u8> {
    let mut out = vec![0u8; poly.len() + 1];
    for (i, &coef) in poly.iter().enumerate() {
        out[i + 1] ^= coef;
        out[i] ^= gf.mul(coef, root);
    }
    out
}

/// Minimal polynomial of `alpha^e` for `e` in `coset`, as `GF(2)` bits.
fn minimal_polynomial(coset: &[i32], gf: &Gf256) -> Vec<u8> {
    let mut poly = vec![1u8];
    for &e in coset {
        let root = gf.exp(e);
        poly = mul_by_linear(&poly, root, gf);
    }
    poly
}

/// Build the BCH(255,131,18) generator polynomial as the product of the
/// minimal polynomials of `alpha^1 .. alpha^36`, skipping exponents already
/// covered by an earlier root's cyclotomic coset.
#[allow(clippy::arithmetic_side_effects, clippy::cast_sign_loss)]
fn build_generator(gf: &Gf256) -> Vec<u8> {
    let mut covered = [false; N];
    let mut g = vec![1u8];

    for start in 1..=(2 * T as i32) {
        let start = start.rem_euclid(N as i32);
        if covered[start as usize] {
            continue;
        }
        let mut coset = Vec::new();
        let mut e = start;
        loop {
            covered[e as usize] = true;
            coset.push(e);
            e = (2 * e).rem_euclid(N as i32);
            if e == start {
                break;
            }
        }
        let mp = minimal_polynomial(&coset, gf);
        g = gf2_poly_mul(&g, &mp);
    }
    g
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message(seed: u8) -> [u8; K] {
        let mut msg = [0u8; K];
        let mut state = seed;
        for bit in &mut msg {
            state = state.wrapping_mul(37).wrapping_add(11);
            *bit = state & 1;
        }
        msg
    }

    #[test]
    fn generator_has_expected_degree() {
        let bch = Bch::new();
        assert_eq!(bch.generator.len(), PARITY + 1);
        assert_eq!(bch.generator[PARITY], 1);
    }

    #[test]
    fn encode_is_systematic() {
        let bch = Bch::new();
        let msg = sample_message(7);
        let cw = bch.encode(&msg);
        assert_eq!(&cw[PARITY..], &msg[..]);
    }

    #[test]
    fn decode_with_no_errors_round_trips() {
        let bch = Bch::new();
        for seed in 0..5 {
            let msg = sample_message(seed);
            let cw = bch.encode(&msg);
            let decoded = bch.decode(&cw).expect("clean codeword must decode");
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn decode_corrects_t_errors() {
        let bch = Bch::new();
        let msg = sample_message(3);
        let mut cw = bch.encode(&msg);
        for i in 0..T {
            cw[i * 7 % N] ^= 1;
        }
        let decoded = bch.decode(&cw).expect("t errors must be correctable");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn decode_fails_above_error_budget() {
        let bch = Bch::new();
        let msg = sample_message(9);
        let mut cw = bch.encode(&msg);
        // Flip a large, spread-out set of bits — well beyond t=18.
        for i in 0..40 {
            cw[i * 5 % N] ^= 1;
        }
        // Either a clean failure or (rarely, for a pathological pattern) a
        // decode to the wrong message — but never a silent no-op success.
        match bch.decode(&cw) {
            Err(DecodeError::TooManyErrors) => {}
            Ok(decoded) => assert_ne!(decoded, msg),
        }
    }
}
