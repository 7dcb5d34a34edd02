//! Bit-packed backtrace and cell-exclusion matrix.
//!
//! Every DP cell stores one byte per lane:
//!
//! | bits | meaning |
//! |------|---------|
//! | 0–2  | predecessor of `MM`: 0 restart, 1 MM, 2 GD, 3 IM, 4 DG, 5 MI |
//! | 3    | `GD` opened from `MM` (otherwise extended from `GD`) |
//! | 4    | `IM` opened from `MM` |
//! | 5    | `DG` opened from `MM` |
//! | 6    | `MI` opened from `MM` |
//! | 7    | cell switched off |
//!
//! Predecessor values 6 and 7 never occur in a well-formed matrix.

use cyanea_core::{CyaneaError, Result};

use crate::lanes::{LaneMask, LANES};
use crate::types::PairState;

pub const MM_PREDECESSOR_MASK: u8 = 0b0000_0111;
pub const GD_FROM_MM: u8 = 1 << 3;
pub const IM_FROM_MM: u8 = 1 << 4;
pub const DG_FROM_MM: u8 = 1 << 5;
pub const MI_FROM_MM: u8 = 1 << 6;
pub const CELL_OFF: u8 = 1 << 7;

/// Decision byte of one cell in one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellCode(pub u8);

impl CellCode {
    /// Restart, no gap opened, cell on.
    pub const STOP: CellCode = CellCode(0);

    /// Gap-open flag bit of a gap state; 0 for `MM`.
    #[inline]
    pub fn open_flag(state: PairState) -> u8 {
        match state {
            PairState::MM => 0,
            PairState::GD => GD_FROM_MM,
            PairState::IM => IM_FROM_MM,
            PairState::DG => DG_FROM_MM,
            PairState::MI => MI_FROM_MM,
        }
    }

    /// Predecessor of `MM`; `None` means the alignment restarts here.
    ///
    /// # Errors
    ///
    /// Returns an internal error for the invalid predecessor codes 6 and 7.
    pub fn mm_predecessor(self) -> Result<Option<PairState>> {
        match self.0 & MM_PREDECESSOR_MASK {
            0 => Ok(None),
            c => PairState::from_code(c).map(Some).ok_or_else(|| {
                CyaneaError::Internal(format!("invalid MM predecessor code {c}"))
            }),
        }
    }

    /// Whether gap state `state` was entered from `MM` in this cell.
    #[inline]
    pub fn opened_from_mm(self, state: PairState) -> bool {
        self.0 & Self::open_flag(state) != 0
    }

    #[inline]
    pub fn is_off(self) -> bool {
        self.0 & CELL_OFF != 0
    }
}

/// Dense `(rows) × (cols) × LANES` byte matrix, reused across batches.
///
/// The backing storage only grows; [`BacktraceMatrix::reset`] re-shapes it
/// for a new batch and clears every code and exclusion bit.
#[derive(Debug, Default)]
pub struct BacktraceMatrix {
    data: Vec<u8>,
    rows: usize,
    cols: usize,
}

impl BacktraceMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shape the matrix as `rows × cols` and zero it.
    pub fn reset(&mut self, rows: usize, cols: usize) {
        let needed = rows * cols * LANES;
        if needed > self.data.len() {
            log::debug!(
                "growing backtrace matrix to {rows}x{cols}x{LANES} ({} bytes)",
                needed
            );
            self.data.resize(needed, 0);
        }
        self.data[..needed].fill(0);
        self.rows = rows;
        self.cols = cols;
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Bytes currently reserved.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn index(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < self.rows && j < self.cols);
        (i * self.cols + j) * LANES
    }

    /// Store one DP row of codes, keeping existing exclusion bits.
    pub fn write_row(&mut self, i: usize, codes: &[[u8; LANES]]) {
        let start = self.index(i, 0);
        let row = &mut self.data[start..start + codes.len() * LANES];
        for (cell, code) in row.chunks_exact_mut(LANES).zip(codes) {
            for (b, &c) in cell.iter_mut().zip(code) {
                *b = (*b & CELL_OFF) | (c & !CELL_OFF);
            }
        }
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize, lane: usize) -> CellCode {
        CellCode(self.data[self.index(i, j) + lane])
    }

    #[inline]
    pub fn is_off(&self, i: usize, j: usize, lane: usize) -> bool {
        self.get(i, j, lane).is_off()
    }

    /// Exclusion bits of cell `(i, j)` across lanes.
    #[inline]
    pub fn off_mask(&self, i: usize, j: usize) -> LaneMask {
        let start = self.index(i, j);
        let mut m = LaneMask::default();
        for (k, &b) in self.data[start..start + LANES].iter().enumerate() {
            m.set(k, b & CELL_OFF != 0);
        }
        m
    }

    /// Switch cell `(i, j)` off in `lane`.
    #[inline]
    pub fn set_off(&mut self, i: usize, j: usize, lane: usize) {
        let idx = self.index(i, j) + lane;
        self.data[idx] |= CELL_OFF;
    }

    /// Number of cells switched off in `lane`.
    pub fn count_off(&self, lane: usize) -> usize {
        let len = self.rows * self.cols * LANES;
        self.data[..len]
            .chunks_exact(LANES)
            .filter(|c| c[lane] & CELL_OFF != 0)
            .count()
    }
}
