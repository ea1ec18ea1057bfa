//! Minutiae Quantizer (C1, §4.1): canonicalizes a variable-length minutia
//! list and projects it into a fixed 512-bit [`QuantizedTemplate`].
//!
//! `quantize` is a pure, deterministic function: same `(capture, params)`
//! always produces the same bitstring, byte for byte, regardless of
//! platform or minutiae ordering. Quality gating (`|minutiae| in [12,
//! 200]`, mean quality >= 50) is the orchestrator's job (§4.6) — by the
//! time a capture reaches this module it is assumed already valid.

use std::f64::consts::PI;
use std::sync::Once;

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

use crate::types::{FingerCapture, Minutia, QuantizedTemplate, QuantizerParams, TEMPLATE_BYTES};

const TEMPLATE_BITS: usize = TEMPLATE_BYTES * 8;

/// Run the full quantization pipeline: canonicalize, bin, project.
#[must_use]
pub fn quantize(capture: &FingerCapture, params: QuantizerParams) -> QuantizedTemplate {
    let canonical = canonicalize(&capture.minutiae);
    let occupancy = occupancy_grid(&canonical, params.grid_size, params.angle_bins);
    let key = projection_key(params.grid_size, params.angle_bins);
    let total_minutiae = u32::try_from(canonical.len()).unwrap_or(u32::MAX);
    QuantizedTemplate(project(&occupancy, &key, total_minutiae))
}

/// Translate the centroid to `(0.5, 0.5)` and rotate so the circular mean
/// orientation aligns with `0` (§4.1 step 1).
fn canonicalize(minutiae: &[Minutia]) -> Vec<Minutia> {
    if minutiae.is_empty() {
        return Vec::new();
    }
    let n = f64::from(u32::try_from(minutiae.len()).unwrap_or(u32::MAX));
    let cx = minutiae.iter().map(|m| m.x).sum::<f64>() / n;
    let cy = minutiae.iter().map(|m| m.y).sum::<f64>() / n;

    let sum_sin: f64 = minutiae.iter().map(|m| m.theta.sin()).sum();
    let sum_cos: f64 = minutiae.iter().map(|m| m.theta.cos()).sum();

    let mean_angle = if sum_sin.abs() < 1e-12 && sum_cos.abs() < 1e-12 {
        warn_degenerate_orientation();
        0.0
    } else {
        sum_sin.atan2(sum_cos)
    };

    let (sin_r, cos_r) = (-mean_angle).sin_cos();
    minutiae
        .iter()
        .map(|m| {
            let tx = m.x - cx;
            let ty = m.y - cy;
            Minutia {
                x: tx.mul_add(cos_r, -(ty * sin_r)) + 0.5,
                y: tx.mul_add(sin_r, ty * cos_r) + 0.5,
                theta: (m.theta - mean_angle).rem_euclid(2.0 * PI),
                quality: m.quality,
            }
        })
        .collect()
}

fn warn_degenerate_orientation() {
    static WARNED: Once = Once::new();
    WARNED.call_once(|| {
        eprintln!(
            "[decdid-core] WARNING: degenerate minutiae orientation (all angles coincident) \
             — rotation alignment skipped, falling back to an unrotated centroid"
        );
    });
}

/// Build the `grid_dim x grid_dim x angle_bins` occupancy grid (§4.1 steps
/// 2-3). Out-of-range coordinates produced by canonicalization's rotation
/// are clamped into the nearest valid cell rather than discarded.
fn occupancy_grid(minutiae: &[Minutia], grid_size: f64, angle_bins: u32) -> Vec<u32> {
    let grid_dim = (1.0 / grid_size).ceil().max(1.0) as usize;
    let angle_bins = angle_bins.max(1) as usize;
    let mut grid = vec![0u32; grid_dim * grid_dim * angle_bins];
    let angle_bin_width = 2.0 * PI / angle_bins as f64;

    for m in minutiae {
        let cx = cell_index(m.x, grid_size, grid_dim);
        let cy = cell_index(m.y, grid_size, grid_dim);
        let theta = m.theta.rem_euclid(2.0 * PI);
        let ab = ((theta / angle_bin_width) as usize).min(angle_bins - 1);
        let idx = (cx * grid_dim + cy) * angle_bins + ab;
        grid[idx] = grid[idx].saturating_add(1);
    }
    grid
}

fn cell_index(coord: f64, grid_size: f64, grid_dim: usize) -> usize {
    let clamped = coord.clamp(0.0, 0.999_999_999);
    ((clamped / grid_size) as usize).min(grid_dim - 1)
}

/// Derive the 128-bit `SipHash` key from `(grid_size, angle_bins)`, per the
/// documented resolution of §9's bit-projection open question.
fn projection_key(grid_size: f64, angle_bins: u32) -> [u8; 16] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(grid_size.to_le_bytes());
    hasher.update(angle_bins.to_le_bytes());
    let digest = hasher.finalize();
    let mut key = [0u8; 16];
    key.copy_from_slice(&digest[..16]);
    key
}

/// Deterministic subset selection and threshold for bit position `i` (§4.1
/// step 4): hash `i` under the projection key to seed a `SplitMix64`
/// stream, then include each occupancy cell with probability 1/2 (odd
/// stream output). Bit `i` is set iff the *sum* of counts over the
/// included cells reaches the position's threshold — half of
/// `total_minutiae`, since each cell is independently included with
/// probability 1/2 and the counts across all cells sum to exactly
/// `total_minutiae`.
///
/// A first-hit rule ("1 iff any included cell is occupied") was tried
/// first and rejected: with `total_minutiae >= 12` occupied `(cell,
/// angle)` bins, the chance that *none* of them land in a given bit's
/// ~50%-included subset is astronomically small, so nearly every bit
/// would be 1 for every finger. The sum-vs-threshold rule instead gives
/// each bit an output that is a near-median split of the actual minutiae,
/// so it carries discriminating information between different fingers
/// while still changing only a bounded fraction of bits when a minutia
/// drifts across a cell boundary.
fn project(occupancy: &[u32], key: &[u8; 16], total_minutiae: u32) -> [u8; TEMPLATE_BYTES] {
    let k0 = u64::from_le_bytes(key[0..8].try_into().unwrap_or_default());
    let k1 = u64::from_le_bytes(key[8..16].try_into().unwrap_or_default());
    let threshold = f64::from(total_minutiae) / 2.0;

    let mut out = [0u8; TEMPLATE_BYTES];
    for bit_index in 0..TEMPLATE_BITS {
        let mut hasher = SipHasher13::new_with_keys(k0, k1);
        hasher.write_u64(bit_index as u64);
        let mut state = hasher.finish();

        let mut included_sum: u32 = 0;
        for &count in occupancy {
            let r = splitmix64_next(&mut state);
            if r & 1 == 1 {
                included_sum = included_sum.saturating_add(count);
            }
        }
        if f64::from(included_sum) >= threshold {
            out[bit_index / 8] |= 1 << (bit_index % 8);
        }
    }
    out
}

fn splitmix64_next(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FingerId;

    fn sample_capture(offset_x: f64, offset_y: f64, rotate: f64, n: usize) -> FingerCapture {
        let minutiae = (0..n)
            .map(|i| {
                let angle = (i as f64) * 0.37;
                let raw_x = 0.5 + 0.2 * angle.cos();
                let raw_y = 0.5 + 0.2 * angle.sin();
                let tx = raw_x - 0.5;
                let ty = raw_y - 0.5;
                let (sin_r, cos_r) = rotate.sin_cos();
                Minutia {
                    x: (tx * cos_r - ty * sin_r) + 0.5 + offset_x,
                    y: (tx * sin_r + ty * cos_r) + 0.5 + offset_y,
                    theta: (angle * 0.5 + rotate).rem_euclid(2.0 * PI),
                    quality: 80,
                }
            })
            .collect();
        FingerCapture {
            finger_id: FingerId::RightIndex,
            minutiae,
        }
    }

    #[test]
    fn quantize_is_deterministic() {
        let capture = sample_capture(0.0, 0.0, 0.0, 40);
        let params = QuantizerParams::default();
        let a = quantize(&capture, params);
        let b = quantize(&capture, params);
        assert_eq!(a, b);
    }

    #[test]
    fn quantize_is_order_independent() {
        let mut capture = sample_capture(0.0, 0.0, 0.3, 30);
        let params = QuantizerParams::default();
        let original = quantize(&capture, params);
        capture.minutiae.reverse();
        let reordered = quantize(&capture, params);
        assert_eq!(original, reordered);
    }

    #[test]
    fn quantize_is_translation_and_rotation_invariant() {
        let params = QuantizerParams::default();
        let baseline = quantize(&sample_capture(0.0, 0.0, 0.0, 40), params);
        let shifted = quantize(&sample_capture(0.05, -0.03, 0.9, 40), params);
        assert_eq!(baseline, shifted);
    }

    #[test]
    fn different_fingers_usually_differ() {
        let params = QuantizerParams::default();
        let a = quantize(&sample_capture(0.0, 0.0, 0.0, 40), params);
        let b = quantize(&sample_capture(0.0, 0.0, 0.0, 15), params);
        assert_ne!(a, b);
    }
}
