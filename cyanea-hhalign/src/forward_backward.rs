//! Forward/Backward over the five pair-states and MM posteriors.
//!
//! Forward follows the Viterbi recurrence with `log2(2^a + 2^b)` in place of
//! `max`, except that local alignments begin through the restart term only,
//! never at the virtual begin cells. Its `MM` scores are parked in the
//! posterior matrix. Backward sums over the successors of every state, and
//! each cell's posterior `2^(F_MM + B_MM - total)` overwrites the parked
//! Forward score.

use cyanea_core::{CyaneaError, Result};

use crate::aligner::HmmAligner;
use crate::batch::TemplateBatch;
use crate::config::AlignConfig;
use crate::lanes::{F32Lanes, LANES};
use crate::profile::{Profile, Transition};
use crate::rows::StateScores;
use crate::scoring::ColumnScore;
use crate::types::AlignmentMode;
use crate::viterbi::end_candidates;

impl HmmAligner {
    /// Forward pass over the prepared batch.
    ///
    /// Returns the per-lane log2 sum over all admissible alignments; idle or
    /// fully excluded lanes get `-∞`. Cells switched off in the backtrace
    /// matrix are unreachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is not prepared for this query and
    /// batch.
    pub fn forward(
        &mut self,
        query: &Profile,
        batch: &TemplateBatch<'_>,
        config: &AlignConfig,
        scorer: &dyn ColumnScore,
    ) -> Result<[f64; LANES]> {
        let shape = self.prepared_shape(query, batch)?;
        let lq = shape.query_len;
        let cols = shape.max_len + 1;
        self.ensure_posterior(lq, shape.max_len)?;
        let restart = match config.mode {
            AlignmentMode::Local => F32Lanes::ZERO,
            AlignmentMode::Global => F32Lanes::NEG_INF,
        };

        // In local mode the restart term is the only way to begin.
        let begin = |k: usize, gap: f32| match config.mode {
            AlignmentMode::Local => StateScores::UNREACHABLE,
            AlignmentMode::Global => StateScores::boundary(F32Lanes::splat(-(k as f32) * gap)),
        };

        self.rows.reset(cols);
        for (j, cell) in self.rows.prev[..cols].iter_mut().enumerate() {
            *cell = begin(j, config.gap_template);
        }

        let mut total = F32Lanes::NEG_INF;
        for i in 1..=lq {
            batch.score_row(query.emission(i), scorer, config.shift, &mut self.scores);
            let qp = query.transitions(i - 1);
            let qc = query.transitions(i);
            let q_m2m = F32Lanes::splat(qp[Transition::M2M.index()]);
            let q_m2d = F32Lanes::splat(qp[Transition::M2D.index()]);
            let q_i2m = F32Lanes::splat(qp[Transition::I2M.index()]);
            let q_d2m = F32Lanes::splat(qp[Transition::D2M.index()]);
            let q_d2d = F32Lanes::splat(qp[Transition::D2D.index()]);
            let q_m2i = F32Lanes::splat(qc[Transition::M2I.index()]);
            let q_i2i = F32Lanes::splat(qc[Transition::I2I.index()]);
            let last_row = i == lq;

            self.rows.cur[0] = begin(i, config.gap_query);
            self.posterior.set_value(i, 0, F32Lanes::ZERO);

            for j in 1..cols {
                let d = self.rows.prev[j - 1];
                let u = self.rows.prev[j];
                let l = self.rows.cur[j - 1];
                let tp = batch.transitions(j - 1);
                let tc = batch.transitions(j);
                let t_m2m = tp[Transition::M2M.index()];

                let mm = restart
                    .log2_add(d.mm + q_m2m + t_m2m)
                    .log2_add(d.gd + q_m2m + tp[Transition::D2M.index()])
                    .log2_add(d.im + q_i2m + t_m2m)
                    .log2_add(d.dg + q_d2m + t_m2m)
                    .log2_add(d.mi + q_m2m + tp[Transition::I2M.index()]);
                let cell = StateScores {
                    mm: mm + self.scores[j],
                    gd: (l.mm + tp[Transition::M2D.index()])
                        .log2_add(l.gd + tp[Transition::D2D.index()]),
                    im: (l.mm + q_m2i + t_m2m).log2_add(l.im + q_i2i + t_m2m),
                    dg: (u.mm + q_m2d).log2_add(u.dg + q_d2d),
                    mi: (u.mm + q_m2m + tc[Transition::M2I.index()])
                        .log2_add(u.mi + q_m2m + tc[Transition::I2I.index()]),
                };

                let keep = batch
                    .column_valid(j)
                    .and(self.backtrace.off_mask(i, j).not());
                let cell = cell.masked(keep);
                let ends = end_candidates(config.mode, keep, last_row, batch, j);
                total = ends.select(total.log2_add(cell.mm), total);

                self.posterior.set_value(i, j, cell.mm);
                self.rows.cur[j] = cell;
            }
            self.rows.advance();
        }

        self.forward = Some((shape, total));
        let mut out = [f64::NEG_INFINITY; LANES];
        for (k, o) in out.iter_mut().enumerate().take(batch.len()) {
            *o = f64::from(total.lane(k));
        }
        log::trace!("forward {}x{}: totals {:?}", lq, shape.max_len, out);
        Ok(out)
    }

    /// Backward pass; turns the parked Forward scores into MM posteriors.
    ///
    /// Afterwards `posterior().single_value(i, j, lane)` is the probability
    /// that query column `i` aligns to template column `j` in lane `lane`,
    /// in `[0, 1]`; lanes with a Forward total of `-∞` get 0 everywhere.
    ///
    /// # Errors
    ///
    /// Returns an error unless [`HmmAligner::forward`] ran on the same
    /// prepared batch.
    pub fn backward(
        &mut self,
        query: &Profile,
        batch: &TemplateBatch<'_>,
        config: &AlignConfig,
        scorer: &dyn ColumnScore,
    ) -> Result<()> {
        let shape = self.prepared_shape(query, batch)?;
        let total = match self.forward {
            Some((s, total)) if s == shape => total,
            _ => {
                return Err(CyaneaError::InvalidInput(
                    "backward needs a forward pass over the same batch".into(),
                ))
            }
        };
        let lq = shape.query_len;
        let cols = shape.max_len + 1;
        let live = total.finite();

        // `prev` holds row i + 1, `cur` fills row i from right to left.
        self.rows.reset(cols);
        for i in (1..=lq).rev() {
            let has_next = i < lq;
            if has_next {
                batch.score_row(query.emission(i + 1), scorer, config.shift, &mut self.next_scores);
            }
            let qc = query.transitions(i);
            let q_m2m = F32Lanes::splat(qc[Transition::M2M.index()]);
            let q_m2i = F32Lanes::splat(qc[Transition::M2I.index()]);
            let q_m2d = F32Lanes::splat(qc[Transition::M2D.index()]);
            let q_i2m = F32Lanes::splat(qc[Transition::I2M.index()]);
            let q_i2i = F32Lanes::splat(qc[Transition::I2I.index()]);
            let q_d2m = F32Lanes::splat(qc[Transition::D2M.index()]);
            let q_d2d = F32Lanes::splat(qc[Transition::D2D.index()]);
            let last_row = i == lq;

            for j in (1..cols).rev() {
                let tc = batch.transitions(j);
                let t_m2m = tc[Transition::M2M.index()];
                let right = if j + 1 < cols {
                    self.rows.cur[j + 1]
                } else {
                    StateScores::UNREACHABLE
                };
                let down = self.rows.prev[j];
                // S(i+1, j+1) + B_MM(i+1, j+1)
                let diag = if has_next && j + 1 < cols {
                    self.next_scores[j + 1] + self.rows.prev[j + 1].mm
                } else {
                    F32Lanes::NEG_INF
                };

                let keep = batch
                    .column_valid(j)
                    .and(self.backtrace.off_mask(i, j).not());
                let end = end_candidates(config.mode, keep, last_row, batch, j)
                    .select(F32Lanes::ZERO, F32Lanes::NEG_INF);

                let cell = StateScores {
                    mm: end
                        .log2_add(diag + q_m2m + t_m2m)
                        .log2_add(right.gd + tc[Transition::M2D.index()])
                        .log2_add(right.im + q_m2i + t_m2m)
                        .log2_add(down.dg + q_m2d)
                        .log2_add(down.mi + q_m2m + tc[Transition::M2I.index()]),
                    gd: (diag + q_m2m + tc[Transition::D2M.index()])
                        .log2_add(right.gd + tc[Transition::D2D.index()]),
                    im: (diag + q_i2m + t_m2m).log2_add(right.im + q_i2i + t_m2m),
                    dg: (diag + q_d2m + t_m2m).log2_add(down.dg + q_d2d),
                    mi: (diag + q_m2m + tc[Transition::I2M.index()])
                        .log2_add(down.mi + q_m2m + tc[Transition::I2I.index()]),
                }
                .masked(keep);

                let f = self.posterior.value(i, j);
                let mut p = F32Lanes::ZERO;
                for k in 0..LANES {
                    if keep.get(k) && live.get(k) {
                        let v = (f.lane(k) + cell.mm.lane(k) - total.lane(k)).exp2();
                        p.set_lane(k, v.clamp(0.0, 1.0));
                    }
                }
                self.posterior.set_value(i, j, p);
                self.rows.cur[j] = cell;
            }
            self.rows.advance();
        }
        Ok(())
    }
}
