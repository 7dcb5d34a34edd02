//! Base-2 log-space probabilities for numerically stable computation.
//!
//! Profile HMM scores are bits: transitions, emissions and alignment scores
//! all live in `log2` space. [`Log2Prob`] wraps a single value and
//! [`log2_add`] is the scalar kernel behind every log-sum-exp in the
//! alignment engines.

use crate::{CyaneaError, Result};

/// A probability stored as its base-2 logarithm: `log2(p)`.
///
/// All values are ≤ 0, with 0.0 representing certainty (p = 1) and negative
/// infinity representing impossibility (p = 0).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Log2Prob(pub f64);

impl Log2Prob {
    /// Create a [`Log2Prob`] from a raw probability in `[0, 1]`.
    ///
    /// Zero maps to `-∞`; transition tables routinely contain forbidden
    /// moves.
    ///
    /// # Errors
    ///
    /// Returns an error if `p` is not in `[0, 1]` or is NaN.
    pub fn from_prob(p: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&p) {
            return Err(CyaneaError::InvalidInput(format!(
                "Log2Prob::from_prob: p must be in [0, 1], got {p}"
            )));
        }
        Ok(Self(p.log2()))
    }
}

/// Single-precision `log2(2^a + 2^b)`.
///
/// Either operand may be `-∞`; the result is `-∞` only when both are.
#[inline]
pub fn log2_add(a: f32, b: f32) -> f32 {
    let (max, min) = if a >= b { (a, b) } else { (b, a) };
    if min == f32::NEG_INFINITY {
        return max;
    }
    max + (min - max).exp2().ln_1p() * core::f32::consts::LOG2_E
}
