//! Path reconstruction and alternative alignments.

use cyanea_core::{CyaneaError, Result};

use crate::aligner::HmmAligner;
use crate::batch::TemplateBatch;
use crate::config::AlignConfig;
use crate::lanes::LANES;
use crate::profile::Profile;
use crate::scoring::ColumnScore;
use crate::types::{Alignment, AlignmentPath, PairState, Step};

fn internal(msg: String) -> CyaneaError {
    log::error!("traceback: {msg}");
    CyaneaError::Internal(msg)
}

impl HmmAligner {
    /// Reconstruct the path of `lane` ending in state `MM` at `(i, j)`.
    ///
    /// Follows the codes of the last Viterbi or MAC pass. The path starts at
    /// an `MM` cell in row 1 or column 1, at a restart, or right after the
    /// virtual begin cell.
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error if `(i, j)` lies outside the lane's
    /// matrix, and an internal error if the codes are inconsistent: an
    /// invalid predecessor, a gap state running into row or column 0, or a
    /// walk longer than `Lq + Lt` steps.
    pub fn traceback(&self, lane: usize, i: usize, j: usize) -> Result<AlignmentPath> {
        let shape = self.shape.ok_or_else(|| {
            CyaneaError::InvalidInput("traceback before any alignment".into())
        })?;
        if lane >= LANES || i == 0 || j == 0 || i > shape.query_len || j > shape.lengths[lane] {
            return Err(CyaneaError::InvalidInput(format!(
                "end cell ({i}, {j}) outside lane {lane}"
            )));
        }

        let limit = shape.query_len + shape.lengths[lane];
        let mut steps = Vec::new();
        let (mut i, mut j, mut state) = (i, j, PairState::MM);
        loop {
            if i == 0 || j == 0 {
                if state == PairState::MM {
                    break;
                }
                return Err(internal(format!(
                    "lane {lane}: state {state} reached boundary cell ({i}, {j})"
                )));
            }
            if steps.len() >= limit {
                return Err(internal(format!(
                    "lane {lane}: path exceeds {limit} steps"
                )));
            }
            steps.push(Step::new(i, j, state));

            let code = self.backtrace.get(i, j, lane);
            match state {
                PairState::MM => {
                    if i == 1 || j == 1 {
                        break;
                    }
                    match code.mm_predecessor() {
                        Ok(None) => break,
                        Ok(Some(prev)) => {
                            i -= 1;
                            j -= 1;
                            state = prev;
                        }
                        Err(e) => {
                            log::error!("traceback: lane {lane} at ({i}, {j}): {e}");
                            return Err(e);
                        }
                    }
                }
                gap => {
                    if code.opened_from_mm(gap) {
                        state = PairState::MM;
                    }
                    if gap.is_horizontal() {
                        j -= 1;
                    } else {
                        i -= 1;
                    }
                }
            }
        }

        steps.reverse();
        Ok(AlignmentPath { steps })
    }

    /// Enumerate up to `config.alternatives` non-overlapping alignments per
    /// lane.
    ///
    /// Each round runs Viterbi, traces back every live lane and switches off
    /// the path neighbourhood. A lane drops out once its best score is not
    /// finite or, after the first round, falls below
    /// `config.min_alternative_score`. Element `k` of the result holds the
    /// alignments of lane `k`, best first.
    ///
    /// # Errors
    ///
    /// Propagates preparation and traceback errors.
    pub fn alternatives(
        &mut self,
        query: &Profile,
        batch: &TemplateBatch<'_>,
        config: &AlignConfig,
        scorer: &dyn ColumnScore,
    ) -> Result<Vec<Vec<Alignment>>> {
        self.prepare(query, batch, config)?;
        let mut out: Vec<Vec<Alignment>> = vec![Vec::new(); batch.len()];
        let mut live = batch.active();

        for round in 0..config.alternatives {
            let results = self.viterbi(query, batch, config, scorer)?;
            for (lane, r) in results.iter().enumerate().take(batch.len()) {
                if !live.get(lane) {
                    continue;
                }
                if !r.is_found() || (round > 0 && r.score < config.min_alternative_score) {
                    live.set(lane, false);
                    continue;
                }
                let path = self.traceback(lane, r.i, r.j)?;
                self.exclude_path(lane, &path, config.exclusion_margin);
                out[lane].push(Alignment {
                    score: r.score,
                    i: r.i,
                    j: r.j,
                    path,
                });
            }
            if !live.any() {
                break;
            }
        }

        log::trace!(
            "alternatives: {:?} alignments per lane",
            out.iter().map(Vec::len).collect::<Vec<_>>()
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lanes::LANES;
    use crate::matrix::CellCode;
    use crate::test_util::{argmax_scorer, one_hot};
    use crate::types::AlignmentMode;

    fn unit_gaps() -> AlignConfig {
        AlignConfig::default()
            .with_mode(AlignmentMode::Local)
            .with_end_gaps(1.0, 1.0)
            .with_shift(0.0)
    }

    #[test]
    fn traceback_rejects_cells_outside_lane() {
        let q = one_hot("q", b"ACG");
        let t = one_hot("t", b"AC");
        let batch = TemplateBatch::new(&[&t]).unwrap();
        let mut engine = HmmAligner::new();
        assert!(engine.traceback(0, 1, 1).is_err());
        engine
            .align(&q, &batch, &unit_gaps(), &argmax_scorer(2.0, 0.0))
            .unwrap();
        assert!(engine.traceback(0, 3, 3).is_err());
        assert!(engine.traceback(0, 0, 1).is_err());
        assert!(engine.traceback(0, 3, 2).is_ok());
    }

    #[test]
    fn invalid_code_is_internal_error() {
        let q = one_hot("q", b"ACG");
        let t = one_hot("t", b"ACG");
        let batch = TemplateBatch::new(&[&t]).unwrap();
        let mut engine = HmmAligner::new();
        engine
            .align(&q, &batch, &unit_gaps(), &argmax_scorer(2.0, 0.0))
            .unwrap();
        engine.backtrace.write_row(3, &[[6u8; LANES]; 4]);
        assert!(matches!(
            engine.traceback(0, 3, 3),
            Err(CyaneaError::Internal(_))
        ));
    }

    #[test]
    fn gap_state_at_boundary_is_internal_error() {
        let q = one_hot("q", b"ACG");
        let t = one_hot("t", b"ACG");
        let batch = TemplateBatch::new(&[&t]).unwrap();
        let mut engine = HmmAligner::new();
        engine
            .align(&q, &batch, &unit_gaps(), &argmax_scorer(2.0, 0.0))
            .unwrap();
        // (3,2) MM <- GD at (2,1), which extends from (2,0)
        engine
            .backtrace
            .write_row(3, &[[PairState::GD.code(); LANES]; 4]);
        engine.backtrace.write_row(2, &[[CellCode::STOP.0; LANES]; 4]);
        assert!(matches!(
            engine.traceback(0, 3, 2),
            Err(CyaneaError::Internal(_))
        ));
    }

    #[test]
    fn path_may_open_gap_from_begin_column() {
        // A-A at (2,2) is reached cheapest through GD(1,1), opened from the
        // free column-0 boundary MM(1,0); IM ties and loses to GD.
        let q = one_hot("q", b"GA");
        let t = one_hot("t", b"TA");
        let batch = TemplateBatch::new(&[&t]).unwrap();
        let config = AlignConfig::global().with_end_gaps(0.0, 1.0).with_shift(0.0);
        let mut engine = HmmAligner::new();
        let r = engine
            .align(&q, &batch, &config, &argmax_scorer(2.0, -5.0))
            .unwrap()[0];
        assert_eq!(r.score, 1.0);
        assert_eq!((r.i, r.j), (2, 2));
        let path = engine.traceback(0, r.i, r.j).unwrap();
        assert_eq!(
            path.steps,
            vec![Step::new(1, 1, PairState::GD), Step::new(2, 2, PairState::MM)]
        );
    }

    #[test]
    fn alternatives_are_disjoint_and_ordered() {
        let q = one_hot("q", b"ACGTTTTACG");
        let t = one_hot("t", b"ACG");
        let batch = TemplateBatch::new(&[&t]).unwrap();
        let mut engine = HmmAligner::new();
        let config = unit_gaps().with_alternatives(5, 0.0);
        let alts = engine
            .alternatives(&q, &batch, &config, &argmax_scorer(2.0, -1.0))
            .unwrap();

        assert_eq!(alts.len(), 1);
        let lane = &alts[0];
        assert_eq!(lane.len(), 2);
        assert_eq!(lane[0].score, 6.0);
        assert_eq!((lane[0].i, lane[0].j), (3, 3));
        assert_eq!(lane[1].score, 6.0);
        assert_eq!((lane[1].i, lane[1].j), (10, 3));
        assert!(lane[1].score <= lane[0].score);
        assert!(lane[0].is_disjoint(&lane[1]));
        assert_eq!(lane[1].path.aligned_pairs(), vec![(8, 1), (9, 2), (10, 3)]);
    }

    #[test]
    fn alternatives_respect_round_limit() {
        let q = one_hot("q", b"ACGTTTTACG");
        let t = one_hot("t", b"ACG");
        let batch = TemplateBatch::new(&[&t]).unwrap();
        let mut engine = HmmAligner::new();
        let config = unit_gaps().with_alternatives(1, 0.0);
        let alts = engine
            .alternatives(&q, &batch, &config, &argmax_scorer(2.0, -1.0))
            .unwrap();
        assert_eq!(alts[0].len(), 1);
    }
}
