//! Lane-parallel Viterbi recurrence over the five pair-states.
//!
//! For query row `i` and template column `j` (both 1-based):
//!
//! ```text
//! MM(i,j) = max(smin,
//!               MM(i-1,j-1) + q.M2M(i-1) + t.M2M(j-1),
//!               GD(i-1,j-1) + q.M2M(i-1) + t.D2M(j-1),
//!               IM(i-1,j-1) + q.I2M(i-1) + t.M2M(j-1),
//!               DG(i-1,j-1) + q.D2M(i-1) + t.M2M(j-1),
//!               MI(i-1,j-1) + q.M2M(i-1) + t.I2M(j-1)) + S(i,j)
//! GD(i,j) = max(MM(i,j-1) + t.M2D(j-1),              GD(i,j-1) + t.D2D(j-1))
//! IM(i,j) = max(MM(i,j-1) + q.M2I(i) + t.M2M(j-1),   IM(i,j-1) + q.I2I(i) + t.M2M(j-1))
//! DG(i,j) = max(MM(i-1,j) + q.M2D(i-1),              DG(i-1,j) + q.D2D(i-1))
//! MI(i,j) = max(MM(i-1,j) + q.M2M(i-1) + t.M2I(j),   MI(i-1,j) + q.M2M(i-1) + t.I2I(j))
//! ```
//!
//! `smin` is 0 for local and `-∞` for global alignment. Ties resolve as
//! MM > GD > IM > DG > MI, a predecessor beats the restart, and a gap state
//! prefers opening from `MM` over extending.

use cyanea_core::Result;

use crate::aligner::HmmAligner;
use crate::batch::TemplateBatch;
use crate::config::AlignConfig;
use crate::lanes::{F32Lanes, LaneMask, LANES};
use crate::matrix::{DG_FROM_MM, GD_FROM_MM, IM_FROM_MM, MI_FROM_MM};
use crate::profile::{Profile, Transition};
use crate::rows::StateScores;
use crate::scoring::ColumnScore;
use crate::types::{AlignmentMode, LaneResult};

/// Best of the `MM` predecessors `[MM, GD, IM, DG, MI]` and its code, with
/// earlier entries winning ties.
#[inline]
pub(crate) fn best_predecessor(cands: [F32Lanes; 5]) -> (F32Lanes, [u8; LANES]) {
    let mut best = cands[4];
    let mut code = [5u8; LANES];
    for idx in (0..4).rev() {
        let take = cands[idx].ge(best);
        best = take.select(cands[idx], best);
        code = take.select_u8([idx as u8 + 1; LANES], code);
    }
    (best, code)
}

/// Apply the restart value: it replaces the predecessor only when strictly
/// better. Lanes left unreachable are coded as restarts.
#[inline]
pub(crate) fn with_restart(
    best: F32Lanes,
    code: [u8; LANES],
    restart: F32Lanes,
) -> (F32Lanes, [u8; LANES]) {
    let take = restart.gt(best).or(best.eq_mask(F32Lanes::NEG_INF));
    (take.select(restart, best), take.select_u8([0; LANES], code))
}

/// Gap state value; the mask marks lanes that opened from `MM`.
#[inline]
pub(crate) fn open_or_extend(open: F32Lanes, extend: F32Lanes) -> (F32Lanes, LaneMask) {
    let opened = open.ge(extend);
    (opened.select(open, extend), opened)
}

/// Pack the `MM` predecessor and the four gap-open flags into cell codes.
#[inline]
pub(crate) fn pack_codes(mm: [u8; LANES], opened: [LaneMask; 4]) -> [u8; LANES] {
    const FLAGS: [u8; 4] = [GD_FROM_MM, IM_FROM_MM, DG_FROM_MM, MI_FROM_MM];
    let mut out = mm;
    for (mask, flag) in opened.iter().zip(FLAGS) {
        for (k, c) in out.iter_mut().enumerate() {
            if mask.get(k) {
                *c |= flag;
            }
        }
    }
    out
}

/// Per-lane best-cell tracker; strictly greater candidates replace the
/// current best, so the first cell in row-major order wins ties.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BestCells {
    score: F32Lanes,
    i: [usize; LANES],
    j: [usize; LANES],
}

impl BestCells {
    pub fn new() -> Self {
        Self {
            score: F32Lanes::NEG_INF,
            i: [0; LANES],
            j: [0; LANES],
        }
    }

    #[inline]
    pub fn offer(&mut self, candidates: LaneMask, mm: F32Lanes, i: usize, j: usize) {
        let better = candidates.and(mm.gt(self.score));
        if !better.any() {
            return;
        }
        self.score = better.select(mm, self.score);
        for k in 0..LANES {
            if better.get(k) {
                self.i[k] = i;
                self.j[k] = j;
            }
        }
    }

    pub fn results(&self, active: LaneMask) -> [LaneResult; LANES] {
        let mut out = [LaneResult::UNREACHABLE; LANES];
        for (k, r) in out.iter_mut().enumerate() {
            let s = self.score.lane(k);
            if active.get(k) && s > f32::NEG_INFINITY {
                *r = LaneResult {
                    score: f64::from(s),
                    i: self.i[k],
                    j: self.j[k],
                };
            }
        }
        out
    }
}

/// Cells that may end an alignment in row `i`, column `j`.
#[inline]
pub(crate) fn end_candidates(
    mode: AlignmentMode,
    keep: LaneMask,
    last_row: bool,
    batch: &TemplateBatch<'_>,
    j: usize,
) -> LaneMask {
    match mode {
        AlignmentMode::Local => keep,
        AlignmentMode::Global if last_row => keep,
        AlignmentMode::Global => keep.and(batch.last_column(j)),
    }
}

impl HmmAligner {
    /// Prepare the engine for `batch` and run one Viterbi pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the query and templates use different alphabets.
    pub fn align(
        &mut self,
        query: &Profile,
        batch: &TemplateBatch<'_>,
        config: &AlignConfig,
        scorer: &dyn ColumnScore,
    ) -> Result<[LaneResult; LANES]> {
        self.prepare(query, batch, config)?;
        self.viterbi(query, batch, config, scorer)
    }

    /// Run the Viterbi recurrence for every lane of the prepared batch.
    ///
    /// Writes one backtrace code per cell and lane; cells switched off in the
    /// backtrace matrix are unreachable. Idle lanes report
    /// [`LaneResult::UNREACHABLE`].
    ///
    /// # Errors
    ///
    /// Returns an error if [`HmmAligner::prepare`] was not called for this
    /// query and batch.
    pub fn viterbi(
        &mut self,
        query: &Profile,
        batch: &TemplateBatch<'_>,
        config: &AlignConfig,
        scorer: &dyn ColumnScore,
    ) -> Result<[LaneResult; LANES]> {
        let shape = self.prepared_shape(query, batch)?;
        let lq = shape.query_len;
        let cols = shape.max_len + 1;
        let smin = match config.mode {
            AlignmentMode::Local => F32Lanes::ZERO,
            AlignmentMode::Global => F32Lanes::NEG_INF,
        };

        self.rows.reset(cols);
        self.codes.clear();
        self.codes.resize(cols, [0; LANES]);
        for (j, cell) in self.rows.prev[..cols].iter_mut().enumerate() {
            *cell = StateScores::boundary(F32Lanes::splat(-(j as f32) * config.gap_template));
        }

        let mut best = BestCells::new();
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

            self.rows.cur[0] = StateScores::boundary(F32Lanes::splat(-(i as f32) * config.gap_query));
            self.codes[0] = [0; LANES];

            for j in 1..cols {
                let d = self.rows.prev[j - 1];
                let u = self.rows.prev[j];
                let l = self.rows.cur[j - 1];
                let tp = batch.transitions(j - 1);
                let t_m2m = tp[Transition::M2M.index()];

                let (mm, mm_code) = best_predecessor([
                    d.mm + q_m2m + t_m2m,
                    d.gd + q_m2m + tp[Transition::D2M.index()],
                    d.im + q_i2m + t_m2m,
                    d.dg + q_d2m + t_m2m,
                    d.mi + q_m2m + tp[Transition::I2M.index()],
                ]);
                let (mm, mm_code) = with_restart(mm, mm_code, smin);

                let (gd, gd_open) = open_or_extend(
                    l.mm + tp[Transition::M2D.index()],
                    l.gd + tp[Transition::D2D.index()],
                );
                let (im, im_open) = open_or_extend(l.mm + q_m2i + t_m2m, l.im + q_i2i + t_m2m);
                let (dg, dg_open) = open_or_extend(u.mm + q_m2d, u.dg + q_d2d);
                let tc = batch.transitions(j);
                let (mi, mi_open) = open_or_extend(
                    u.mm + q_m2m + tc[Transition::M2I.index()],
                    u.mi + q_m2m + tc[Transition::I2I.index()],
                );

                let keep = batch
                    .column_valid(j)
                    .and(self.backtrace.off_mask(i, j).not());
                let cell = StateScores {
                    mm: mm + self.scores[j],
                    gd,
                    im,
                    dg,
                    mi,
                }
                .masked(keep);

                self.codes[j] = pack_codes(mm_code, [gd_open, im_open, dg_open, mi_open]);
                best.offer(
                    end_candidates(config.mode, keep, last_row, batch, j),
                    cell.mm,
                    i,
                    j,
                );
                self.rows.cur[j] = cell;
            }

            self.backtrace.write_row(i, &self.codes[..cols]);
            self.rows.advance();
        }

        let results = best.results(batch.active());
        log::trace!(
            "viterbi {}x{}: scores {:?}",
            lq,
            shape.max_len,
            results.iter().map(|r| r.score).collect::<Vec<_>>()
        );
        Ok(results)
    }
}
