//! Posterior probability matrix.
//!
//! Holds, for every cell `(i, j)` and lane, the probability that query column
//! `i` is aligned to template column `j` in state `MM`. Forward stores its
//! `MM` log-scores here; Backward overwrites them with posteriors, which the
//! MAC engine then reads.

use cyanea_core::{CyaneaError, Result};

use crate::lanes::F32Lanes;

/// Lane-vector matrix of posterior probabilities.
#[derive(Debug, Default)]
pub struct PosteriorMatrix {
    data: Vec<F32Lanes>,
    rows: usize,
    cols: usize,
    allocated: bool,
}

impl PosteriorMatrix {
    /// An unallocated matrix; storage is reserved on first [`allocate`].
    ///
    /// [`allocate`]: PosteriorMatrix::allocate
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `(max_query_len + 1) × (max_template_len + 1)` cells, all zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the matrix is already allocated; call
    /// [`deallocate`](PosteriorMatrix::deallocate) first.
    pub fn allocate(&mut self, max_query_len: usize, max_template_len: usize) -> Result<()> {
        if self.allocated {
            return Err(CyaneaError::InvalidInput(format!(
                "posterior matrix already allocated as {}x{}",
                self.rows, self.cols
            )));
        }
        self.rows = max_query_len + 1;
        self.cols = max_template_len + 1;
        log::debug!("allocating posterior matrix {}x{}", self.rows, self.cols);
        self.data = vec![F32Lanes::ZERO; self.rows * self.cols];
        self.allocated = true;
        Ok(())
    }

    /// Release the storage.
    pub fn deallocate(&mut self) {
        self.data = Vec::new();
        self.rows = 0;
        self.cols = 0;
        self.allocated = false;
    }

    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    /// Largest query length this allocation holds.
    pub fn max_query_len(&self) -> usize {
        self.rows.saturating_sub(1)
    }

    /// Largest template length this allocation holds.
    pub fn max_template_len(&self) -> usize {
        self.cols.saturating_sub(1)
    }

    /// `true` when allocated and at least `query_len × template_len`.
    pub fn fits(&self, query_len: usize, template_len: usize) -> bool {
        self.allocated && query_len < self.rows && template_len < self.cols
    }

    /// Row `i`, columns `0..=max_template_len`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is outside the allocation.
    pub fn row(&self, i: usize) -> &[F32Lanes] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [F32Lanes] {
        let cols = self.cols;
        &mut self.data[i * cols..(i + 1) * cols]
    }

    #[inline]
    pub fn value(&self, i: usize, j: usize) -> F32Lanes {
        self.data[i * self.cols + j]
    }

    #[inline]
    pub fn set_value(&mut self, i: usize, j: usize, v: F32Lanes) {
        let cols = self.cols;
        self.data[i * cols + j] = v;
    }

    #[inline]
    pub fn single_value(&self, i: usize, j: usize, lane: usize) -> f32 {
        self.data[i * self.cols + j].lane(lane)
    }

    #[inline]
    pub fn set_single_value(&mut self, i: usize, j: usize, lane: usize, v: f32) {
        let cols = self.cols;
        self.data[i * cols + j].set_lane(lane, v);
    }
}
