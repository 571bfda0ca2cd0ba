//! Content fingerprint extraction.
//!
//! Maps the raw bytes of an image file to a 128-dimensional unit vector.
//! Three 32-bit accumulators are driven by the same byte stream with
//! different mixing rules, then expanded round-robin through an LCG into
//! the output components. The result is a pure function of its inputs.

use crate::types::{Fingerprint, FINGERPRINT_DIM};
use std::path::Path;
use thiserror::Error;

/// Files smaller than this are rejected as too small to fingerprint.
pub const MIN_FINGERPRINT_BYTES: u64 = 1024;

const CHUNK_COUNT: usize = 32;

// Accumulator seeds
const ROTATE_SEED: u32 = 0x811C_9DC5;
const POLY_SEED: u32 = 0x0000_1505;
const MULT_SEED: u32 = 0x9E37_79B9;

// Mixing constants
const ROTATE_PRIME: u32 = 0x0100_0193;
const POLY_BASE: u32 = 31;
const MULT_PRIME: u32 = 0x5BD1_E995;

// Numerical Recipes LCG
const LCG_MULTIPLIER: u32 = 1_664_525;
const LCG_INCREMENT: u32 = 1_013_904_223;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no fingerprint: {size} bytes is below the {min}-byte minimum")]
    NoFingerprint { size: u64, min: u64 },
}

/// Extract a fingerprint from file content.
///
/// `size` is the file's byte length and drives the quality gate; `bytes`
/// may be the full content or a representative read of it. `path` is
/// never opened. Only its final component feeds the seeds, so the same
/// file fingerprints identically from any directory.
pub fn extract(path: &str, bytes: &[u8], size: u64) -> Result<Fingerprint, ExtractError> {
    if size < MIN_FINGERPRINT_BYTES {
        return Err(ExtractError::NoFingerprint {
            size,
            min: MIN_FINGERPRINT_BYTES,
        });
    }

    let mut acc = Accumulators::seeded(size, name_len(path));
    if !bytes.is_empty() {
        let chunk_len = bytes.len().div_ceil(CHUNK_COUNT);
        for (chunk_idx, chunk) in bytes.chunks(chunk_len).enumerate() {
            for &byte in chunk {
                acc.mix(byte, chunk_idx as u32);
            }
        }
    }

    let mut values = acc.expand(FINGERPRINT_DIM);
    l2_normalize(&mut values);

    tracing::trace!(path, size, "fingerprint extracted");
    Ok(Fingerprint::new(values))
}

/// Divide every component by the vector's norm. A zero vector is left untouched.
pub fn l2_normalize(values: &mut [f32]) {
    let norm = values
        .iter()
        .map(|&v| f64::from(v) * f64::from(v))
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 {
        for v in values.iter_mut() {
            *v = (f64::from(*v) / norm) as f32;
        }
    }
}

fn name_len(path: &str) -> u32 {
    Path::new(path)
        .file_name()
        .map(|n| n.len())
        .unwrap_or(path.len()) as u32
}

struct Accumulators {
    rotating: u32,
    poly: u32,
    mult: u32,
}

impl Accumulators {
    fn seeded(size: u64, name_len: u32) -> Self {
        let size = (size ^ (size >> 32)) as u32;
        Self {
            rotating: ROTATE_SEED ^ size ^ name_len.rotate_left(16),
            poly: POLY_SEED
                .wrapping_mul(POLY_BASE)
                .wrapping_add(size)
                .wrapping_add(name_len),
            mult: MULT_SEED ^ size.wrapping_mul(name_len | 1),
        }
    }

    fn mix(&mut self, byte: u8, chunk: u32) {
        let b = u32::from(byte);

        // rotate-multiply-add
        self.rotating = self
            .rotating
            .rotate_left(5)
            .wrapping_mul(ROTATE_PRIME)
            .wrapping_add(b ^ chunk);

        // polynomial
        self.poly = self
            .poly
            .wrapping_mul(POLY_BASE)
            .wrapping_add(b)
            .wrapping_add(chunk << 8);

        // multiplicative xor
        self.mult = (self.mult ^ b).wrapping_mul(MULT_PRIME);
        self.mult ^= self.mult >> 15;
    }

    /// Generate `dim` components in [-1, 1], advancing accumulator `i % 3`
    /// for component `i`.
    fn expand(self, dim: usize) -> Vec<f32> {
        let mut state = [self.rotating, self.poly, self.mult];
        (0..dim)
            .map(|i| {
                let s = &mut state[i % 3];
                *s = s.wrapping_mul(LCG_MULTIPLIER).wrapping_add(LCG_INCREMENT);
                (f64::from(*s) / f64::from(u32::MAX) * 2.0 - 1.0) as f32
            })
            .collect()
    }
}
