//! The alignment engine and its per-batch setup.
//!
//! An [`HmmAligner`] owns every buffer the recurrences touch: the backtrace
//! matrix, the rolling score rows, the code and column-score scratch rows and
//! the posterior matrix. One engine serves one worker; buffers are reused
//! across batches and grow only when a larger problem arrives.
//!
//! A batch goes through [`HmmAligner::prepare`] once, which shapes the
//! backtrace matrix and switches off the cells forbidden by the minimum
//! overlap and the excluded query ranges. Viterbi, Forward/Backward, MAC and
//! traceback then run against that preparation; exclusion bits accumulate
//! across Viterbi passes until the next `prepare`.

use cyanea_core::{Annotated, CyaneaError, Result};

use crate::batch::TemplateBatch;
use crate::config::AlignConfig;
use crate::lanes::{F32Lanes, LANES};
use crate::matrix::BacktraceMatrix;
use crate::posterior::PosteriorMatrix;
use crate::profile::Profile;
use crate::rows::ScoreRows;
use crate::types::AlignmentPath;

/// Query length and per-lane template lengths of the prepared batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Shape {
    pub query_len: usize,
    pub lengths: [usize; LANES],
    pub max_len: usize,
}

impl Shape {
    fn of(query: &Profile, batch: &TemplateBatch<'_>) -> Self {
        Self {
            query_len: query.len(),
            lengths: *batch.lengths(),
            max_len: batch.max_len(),
        }
    }
}

/// Reusable profile–profile alignment engine.
#[derive(Debug, Default)]
pub struct HmmAligner {
    pub(crate) backtrace: BacktraceMatrix,
    pub(crate) rows: ScoreRows,
    pub(crate) codes: Vec<[u8; LANES]>,
    pub(crate) scores: Vec<F32Lanes>,
    pub(crate) next_scores: Vec<F32Lanes>,
    pub(crate) posterior: PosteriorMatrix,
    pub(crate) shape: Option<Shape>,
    /// Shape and per-lane totals of the last Forward pass.
    pub(crate) forward: Option<(Shape, F32Lanes)>,
}

impl HmmAligner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set up the engine for aligning `query` against `batch`.
    ///
    /// Clears all codes and exclusion bits, then switches off the cells
    /// forbidden by `config.min_overlap` and `config.excluded_query_ranges`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query and templates use different alphabets.
    pub fn prepare(
        &mut self,
        query: &Profile,
        batch: &TemplateBatch<'_>,
        config: &AlignConfig,
    ) -> Result<()> {
        if query.alphabet() != batch.alphabet() {
            return Err(CyaneaError::InvalidInput(format!(
                "query '{}' uses {:?}, templates use {:?}",
                query.name(),
                query.alphabet(),
                batch.alphabet()
            )));
        }
        let shape = Shape::of(query, batch);
        log::debug!(
            "preparing '{}' (L={}) against {} templates, max length {}",
            query.name(),
            shape.query_len,
            batch.len(),
            shape.max_len
        );
        self.backtrace.reset(shape.query_len + 1, shape.max_len + 1);
        self.forward = None;
        self.shape = Some(shape);

        if config.min_overlap > 0 {
            self.exclude_min_overlap(batch.len(), config.min_overlap);
        }
        if !config.excluded_query_ranges.is_empty() {
            self.exclude_query_ranges(batch.len(), &config.excluded_query_ranges);
        }
        Ok(())
    }

    /// The shape `prepare` established, checked against `query` and `batch`.
    pub(crate) fn prepared_shape(
        &self,
        query: &Profile,
        batch: &TemplateBatch<'_>,
    ) -> Result<Shape> {
        let expected = Shape::of(query, batch);
        match self.shape {
            Some(shape) if shape == expected && query.alphabet() == batch.alphabet() => {
                Ok(shape)
            }
            _ => Err(CyaneaError::InvalidInput(format!(
                "engine is not prepared for query '{}' and this batch",
                query.name()
            ))),
        }
    }

    /// Read-only view of the backtrace matrix.
    pub fn backtrace(&self) -> &BacktraceMatrix {
        &self.backtrace
    }

    pub fn posterior(&self) -> &PosteriorMatrix {
        &self.posterior
    }

    /// Mutable posterior matrix, for callers that supply posteriors directly.
    pub fn posterior_mut(&mut self) -> &mut PosteriorMatrix {
        &mut self.posterior
    }

    /// Make sure the posterior matrix holds `query_len × template_len`.
    pub(crate) fn ensure_posterior(&mut self, query_len: usize, template_len: usize) -> Result<()> {
        if !self.posterior.fits(query_len, template_len) {
            let rows = query_len.max(self.posterior.max_query_len());
            let cols = template_len.max(self.posterior.max_template_len());
            self.posterior.deallocate();
            self.posterior.allocate(rows, cols)?;
        }
        Ok(())
    }

    /// Switch off the corners where query and template overlap by fewer
    /// than `min_overlap` columns.
    fn exclude_min_overlap(&mut self, lanes: usize, min_overlap: usize) {
        let Some(shape) = self.shape else { return };
        let lq = shape.query_len as i64;
        for lane in 0..lanes {
            let lt = shape.lengths[lane] as i64;
            let m = (min_overlap as i64).min(lq.min(lt) / 3 + 1);
            for i in 1..m.min(lq + 1) {
                for j in (i - m + lt + 1).max(1)..=lt {
                    self.backtrace.set_off(i as usize, j as usize, lane);
                }
            }
            for i in (lq - m + 1).max(1)..=lq {
                for j in 1..(i + m - lq).min(lt + 1) {
                    self.backtrace.set_off(i as usize, j as usize, lane);
                }
            }
        }
    }

    fn exclude_query_ranges(&mut self, lanes: usize, ranges: &[(usize, usize)]) {
        let Some(shape) = self.shape else { return };
        for &(start, end) in ranges {
            for i in start.max(1)..=end.min(shape.query_len) {
                for lane in 0..lanes {
                    for j in 1..=shape.lengths[lane] {
                        self.backtrace.set_off(i, j, lane);
                    }
                }
            }
        }
    }

    /// Switch off every path cell of `lane` and its neighbours within
    /// `margin` rows or columns, so later Viterbi passes avoid them.
    ///
    /// Does nothing before [`HmmAligner::prepare`] or for a lane outside the
    /// lane width.
    pub fn exclude_path(&mut self, lane: usize, path: &AlignmentPath, margin: usize) {
        let Some(shape) = self.shape else { return };
        if lane >= LANES {
            return;
        }
        let lq = shape.query_len;
        let lt = shape.lengths[lane];
        for step in path.iter() {
            let (i, j) = (step.i, step.j);
            if i == 0 || j == 0 || i > lq || j > lt {
                continue;
            }
            for ii in i.saturating_sub(margin).max(1)..=(i + margin).min(lq) {
                self.backtrace.set_off(ii, j, lane);
            }
            for jj in j.saturating_sub(margin).max(1)..=(j + margin).min(lt) {
                self.backtrace.set_off(i, jj, lane);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Alphabet;
    use crate::test_util::flat_profile;
    use crate::types::{PairState, Step};

    #[test]
    fn prepare_rejects_alphabet_mismatch() {
        let q = flat_profile("q", 4, Alphabet::Dna);
        let t = flat_profile("t", 4, Alphabet::Protein);
        let batch = TemplateBatch::new(&[&t]).unwrap();
        let mut engine = HmmAligner::new();
        assert!(engine.prepare(&q, &batch, &AlignConfig::default()).is_err());
    }

    #[test]
    fn prepared_shape_must_match() {
        let q = flat_profile("q", 4, Alphabet::Dna);
        let t = flat_profile("t", 6, Alphabet::Dna);
        let u = flat_profile("u", 7, Alphabet::Dna);
        let batch = TemplateBatch::new(&[&t]).unwrap();
        let other = TemplateBatch::new(&[&u]).unwrap();
        let mut engine = HmmAligner::new();
        assert!(engine.prepared_shape(&q, &batch).is_err());
        engine.prepare(&q, &batch, &AlignConfig::default()).unwrap();
        assert!(engine.prepared_shape(&q, &batch).is_ok());
        assert!(engine.prepared_shape(&q, &other).is_err());
        assert_eq!(engine.backtrace().rows(), 5);
        assert_eq!(engine.backtrace().cols(), 7);
    }

    #[test]
    fn min_overlap_switches_off_corners() {
        // Lq = Lt = 9, min_overlap 3 -> m = min(3, 9/3 + 1) = 3
        let q = flat_profile("q", 9, Alphabet::Dna);
        let t = flat_profile("t", 9, Alphabet::Dna);
        let batch = TemplateBatch::new(&[&t]).unwrap();
        let mut engine = HmmAligner::new();
        engine
            .prepare(&q, &batch, &AlignConfig::default().with_min_overlap(3))
            .unwrap();
        let m = engine.backtrace();
        // top-right corner: i = 1 -> j >= 8, i = 2 -> j >= 9
        assert!(m.is_off(1, 8, 0));
        assert!(m.is_off(1, 9, 0));
        assert!(!m.is_off(1, 7, 0));
        assert!(m.is_off(2, 9, 0));
        assert!(!m.is_off(2, 8, 0));
        // bottom-left corner: i = 8 -> j < 2, i = 9 -> j < 3
        assert!(m.is_off(8, 1, 0));
        assert!(!m.is_off(8, 2, 0));
        assert!(m.is_off(9, 2, 0));
        assert!(!m.is_off(9, 3, 0));
        assert_eq!(m.count_off(0), 6);
    }

    #[test]
    fn excluded_ranges_switch_off_rows() {
        let q = flat_profile("q", 6, Alphabet::Dna);
        let t = flat_profile("t", 3, Alphabet::Dna);
        let batch = TemplateBatch::new(&[&t]).unwrap();
        let mut engine = HmmAligner::new();
        let config = AlignConfig::default().with_excluded_query_ranges(vec![(2, 3), (6, 10)]);
        engine.prepare(&q, &batch, &config).unwrap();
        let m = engine.backtrace();
        for j in 1..=3 {
            assert!(m.is_off(2, j, 0));
            assert!(m.is_off(3, j, 0));
            assert!(m.is_off(6, j, 0));
            assert!(!m.is_off(1, j, 0));
            assert!(!m.is_off(4, j, 0));
        }
        assert_eq!(m.count_off(0), 9);
    }

    #[test]
    fn exclude_path_marks_neighbourhood() {
        let q = flat_profile("q", 10, Alphabet::Dna);
        let t = flat_profile("t", 10, Alphabet::Dna);
        let batch = TemplateBatch::new(&[&t]).unwrap();
        let mut engine = HmmAligner::new();
        engine.prepare(&q, &batch, &AlignConfig::default()).unwrap();
        let path = AlignmentPath {
            steps: vec![Step::new(5, 5, PairState::MM)],
        };
        engine.exclude_path(0, &path, 2);
        let m = engine.backtrace();
        for d in 3..=7 {
            assert!(m.is_off(d, 5, 0));
            assert!(m.is_off(5, d, 0));
        }
        assert!(!m.is_off(4, 4, 0));
        assert!(!m.is_off(5, 8, 0));
        assert_eq!(m.count_off(0), 9);
    }

    #[test]
    fn exclude_path_ignores_unknown_lane() {
        let q = flat_profile("q", 3, Alphabet::Dna);
        let t = flat_profile("t", 3, Alphabet::Dna);
        let batch = TemplateBatch::new(&[&t]).unwrap();
        let mut engine = HmmAligner::new();
        engine.prepare(&q, &batch, &AlignConfig::default()).unwrap();
        let path = AlignmentPath {
            steps: vec![Step::new(2, 2, PairState::MM)],
        };
        engine.exclude_path(LANES, &path, 1);
        for lane in 0..LANES {
            assert_eq!(engine.backtrace().count_off(lane), 0);
        }
    }

    #[test]
    fn exclude_path_clips_at_edges() {
        let q = flat_profile("q", 3, Alphabet::Dna);
        let t = flat_profile("t", 3, Alphabet::Dna);
        let batch = TemplateBatch::new(&[&t]).unwrap();
        let mut engine = HmmAligner::new();
        engine.prepare(&q, &batch, &AlignConfig::default()).unwrap();
        let path = AlignmentPath {
            steps: vec![Step::new(1, 1, PairState::MM)],
        };
        engine.exclude_path(0, &path, 2);
        assert_eq!(engine.backtrace().count_off(0), 5);
        assert!(!engine.backtrace().is_off(0, 1, 0));
    }
}
