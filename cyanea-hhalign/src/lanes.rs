//! Fixed-width lane vectors.
//!
//! One DP cell is evaluated for [`LANES`] templates at once. The vectors are
//! plain arrays processed element-wise so the compiler can auto-vectorise the
//! loops; results never depend on the lane width.

use std::ops::{Add, Sub};

use cyanea_core::log2_add;

/// Number of templates aligned per engine invocation.
pub const LANES: usize = if cfg!(feature = "wide-lanes") { 8 } else { 4 };

/// `LANES` single-precision scores, one per template.
///
/// Aligned to its own width, so a matrix of lane vectors carries no padding.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(not(feature = "wide-lanes"), repr(C, align(16)))]
#[cfg_attr(feature = "wide-lanes", repr(C, align(32)))]
pub struct F32Lanes(pub [f32; LANES]);

/// Per-lane boolean mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LaneMask(pub [bool; LANES]);

impl F32Lanes {
    /// All lanes `-∞`.
    pub const NEG_INF: Self = Self([f32::NEG_INFINITY; LANES]);
    /// All lanes `0.0`.
    pub const ZERO: Self = Self([0.0; LANES]);

    #[inline]
    pub fn splat(v: f32) -> Self {
        Self([v; LANES])
    }

    #[inline]
    pub fn lane(self, k: usize) -> f32 {
        self.0[k]
    }

    #[inline]
    pub fn set_lane(&mut self, k: usize, v: f32) {
        self.0[k] = v;
    }

    /// Element-wise `self > other`.
    #[inline]
    pub fn gt(self, other: Self) -> LaneMask {
        let mut m = LaneMask::default();
        for k in 0..LANES {
            m.0[k] = self.0[k] > other.0[k];
        }
        m
    }

    /// Element-wise `self >= other`.
    #[inline]
    pub fn ge(self, other: Self) -> LaneMask {
        let mut m = LaneMask::default();
        for k in 0..LANES {
            m.0[k] = self.0[k] >= other.0[k];
        }
        m
    }

    /// Element-wise `self == other`.
    #[inline]
    pub fn eq_mask(self, other: Self) -> LaneMask {
        let mut m = LaneMask::default();
        for k in 0..LANES {
            m.0[k] = self.0[k] == other.0[k];
        }
        m
    }

    /// Element-wise `log2(2^self + 2^other)`.
    #[inline]
    pub fn log2_add(self, other: Self) -> Self {
        let mut out = self;
        for k in 0..LANES {
            out.0[k] = log2_add(self.0[k], other.0[k]);
        }
        out
    }

    /// Lanes holding a finite value.
    #[inline]
    pub fn finite(self) -> LaneMask {
        let mut m = LaneMask::default();
        for k in 0..LANES {
            m.0[k] = self.0[k].is_finite();
        }
        m
    }
}

impl Default for F32Lanes {
    fn default() -> Self {
        Self::NEG_INF
    }
}

impl Add for F32Lanes {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        let mut out = self;
        for k in 0..LANES {
            out.0[k] += rhs.0[k];
        }
        out
    }
}

impl Sub for F32Lanes {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        let mut out = self;
        for k in 0..LANES {
            out.0[k] -= rhs.0[k];
        }
        out
    }
}

impl LaneMask {
    #[inline]
    pub fn splat(v: bool) -> Self {
        Self([v; LANES])
    }

    #[inline]
    pub fn get(self, k: usize) -> bool {
        self.0[k]
    }

    #[inline]
    pub fn set(&mut self, k: usize, v: bool) {
        self.0[k] = v;
    }

    #[inline]
    pub fn any(self) -> bool {
        self.0.iter().any(|&b| b)
    }

    #[inline]
    pub fn all(self) -> bool {
        self.0.iter().all(|&b| b)
    }

    #[inline]
    pub fn and(self, other: Self) -> Self {
        let mut m = self;
        for k in 0..LANES {
            m.0[k] &= other.0[k];
        }
        m
    }

    #[inline]
    pub fn or(self, other: Self) -> Self {
        let mut m = self;
        for k in 0..LANES {
            m.0[k] |= other.0[k];
        }
        m
    }

    #[inline]
    pub fn not(self) -> Self {
        let mut m = self;
        for b in m.0.iter_mut() {
            *b = !*b;
        }
        m
    }

    /// Per lane: `a` where the mask is set, `b` elsewhere.
    #[inline]
    pub fn select(self, a: F32Lanes, b: F32Lanes) -> F32Lanes {
        let mut out = b;
        for k in 0..LANES {
            if self.0[k] {
                out.0[k] = a.0[k];
            }
        }
        out
    }

    /// Per lane: `a` where the mask is set, `b` elsewhere.
    #[inline]
    pub fn select_u8(self, a: [u8; LANES], b: [u8; LANES]) -> [u8; LANES] {
        let mut out = b;
        for k in 0..LANES {
            if self.0[k] {
                out[k] = a[k];
            }
        }
        out
    }
}
