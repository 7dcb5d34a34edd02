//! Rolling score rows.
//!
//! The recurrences only ever look one row back, so the five state scores are
//! kept for the previous and the current row; history survives only as codes
//! in the backtrace matrix.

use crate::lanes::{F32Lanes, LaneMask};

/// Scores of the five pair-states in one cell, per lane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateScores {
    pub mm: F32Lanes,
    pub gd: F32Lanes,
    pub im: F32Lanes,
    pub dg: F32Lanes,
    pub mi: F32Lanes,
}

impl StateScores {
    /// Every state unreachable.
    pub const UNREACHABLE: StateScores = StateScores {
        mm: F32Lanes::NEG_INF,
        gd: F32Lanes::NEG_INF,
        im: F32Lanes::NEG_INF,
        dg: F32Lanes::NEG_INF,
        mi: F32Lanes::NEG_INF,
    };

    /// Boundary cell: `MM` at `mm`, every gap state unreachable.
    #[inline]
    pub fn boundary(mm: F32Lanes) -> Self {
        Self {
            mm,
            ..Self::UNREACHABLE
        }
    }

    /// Keep lanes where `keep` is set, `-∞` elsewhere.
    #[inline]
    pub fn masked(self, keep: LaneMask) -> Self {
        let n = F32Lanes::NEG_INF;
        Self {
            mm: keep.select(self.mm, n),
            gd: keep.select(self.gd, n),
            im: keep.select(self.im, n),
            dg: keep.select(self.dg, n),
            mi: keep.select(self.mi, n),
        }
    }
}

impl Default for StateScores {
    fn default() -> Self {
        Self::UNREACHABLE
    }
}

/// Previous and current DP rows; storage grows only.
#[derive(Debug, Default)]
pub struct ScoreRows {
    pub prev: Vec<StateScores>,
    pub cur: Vec<StateScores>,
}

impl ScoreRows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size both rows to `cols` cells, all unreachable.
    pub fn reset(&mut self, cols: usize) {
        for row in [&mut self.prev, &mut self.cur] {
            if row.len() < cols {
                row.resize(cols, StateScores::UNREACHABLE);
            }
            row[..cols].fill(StateScores::UNREACHABLE);
        }
    }

    /// The current row becomes the previous one.
    #[inline]
    pub fn advance(&mut self) {
        std::mem::swap(&mut self.prev, &mut self.cur);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_and_mask() {
        let b = StateScores::boundary(F32Lanes::splat(-3.0));
        assert_eq!(b.mm, F32Lanes::splat(-3.0));
        assert_eq!(b.gd, F32Lanes::NEG_INF);

        let mut keep = LaneMask::splat(true);
        keep.set(0, false);
        let m = b.masked(keep);
        assert_eq!(m.mm.lane(0), f32::NEG_INFINITY);
        assert_eq!(m.mm.lane(crate::lanes::LANES - 1), -3.0);
    }

    #[test]
    fn reset_and_advance() {
        let mut rows = ScoreRows::new();
        rows.reset(4);
        rows.cur[2] = StateScores::boundary(F32Lanes::ZERO);
        rows.advance();
        assert_eq!(rows.prev[2].mm, F32Lanes::ZERO);
        assert_eq!(rows.cur[2], StateScores::UNREACHABLE);
        rows.reset(2);
        assert_eq!(rows.prev[2].mm, F32Lanes::ZERO); // beyond the active width
        assert_eq!(rows.prev[1], StateScores::UNREACHABLE);
    }
}
