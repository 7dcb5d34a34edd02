//! Maximum accuracy (MAC) alignment.
//!
//! Runs the five-state skeleton over posterior probabilities instead of
//! log-odds scores. An `MM` cell contributes `posterior(i, j) - mact`, every
//! `MM` cell may restart at 0, and each gap column costs
//! `0.5 * (1 - macins) * mact` whether it opens or extends a gap. Larger
//! `mact` makes the alignment greedier for high-posterior cells only.

use cyanea_core::{CyaneaError, Result};

use crate::aligner::HmmAligner;
use crate::batch::TemplateBatch;
use crate::config::AlignConfig;
use crate::lanes::{F32Lanes, LANES};
use crate::profile::Profile;
use crate::rows::StateScores;
use crate::types::LaneResult;
use crate::viterbi::{
    best_predecessor, end_candidates, open_or_extend, pack_codes, with_restart, BestCells,
};

impl HmmAligner {
    /// MAC pass over the posterior matrix of the prepared batch.
    ///
    /// Writes codes into the backtrace matrix, so [`HmmAligner::traceback`]
    /// afterwards reconstructs the MAC path. Scores are expected accuracies,
    /// not bits.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is not prepared for this query and
    /// batch, or the posterior matrix does not cover it.
    pub fn mac(
        &mut self,
        query: &Profile,
        batch: &TemplateBatch<'_>,
        config: &AlignConfig,
    ) -> Result<[LaneResult; LANES]> {
        let shape = self.prepared_shape(query, batch)?;
        let lq = shape.query_len;
        let cols = shape.max_len + 1;
        if !self.posterior.fits(lq, shape.max_len) {
            return Err(CyaneaError::InvalidInput(format!(
                "posterior matrix does not cover {lq}x{}",
                shape.max_len
            )));
        }
        let mact = F32Lanes::splat(config.mact);
        let gap = F32Lanes::splat(0.5 * (1.0 - config.macins) * config.mact);

        self.rows.reset(cols);
        self.codes.clear();
        self.codes.resize(cols, [0; LANES]);

        let mut best = BestCells::new();
        for i in 1..=lq {
            let last_row = i == lq;
            self.rows.cur[0] = StateScores::UNREACHABLE;
            for j in 1..cols {
                let d = self.rows.prev[j - 1];
                let u = self.rows.prev[j];
                let l = self.rows.cur[j - 1];

                let (mm, mm_code) = best_predecessor([d.mm, d.gd, d.im, d.dg, d.mi]);
                let (mm, mm_code) = with_restart(mm, mm_code, F32Lanes::ZERO);
                let (gd, gd_open) = open_or_extend(l.mm - gap, l.gd - gap);
                let (im, im_open) = open_or_extend(l.mm - gap, l.im - gap);
                let (dg, dg_open) = open_or_extend(u.mm - gap, u.dg - gap);
                let (mi, mi_open) = open_or_extend(u.mm - gap, u.mi - gap);

                let keep = batch
                    .column_valid(j)
                    .and(self.backtrace.off_mask(i, j).not());
                let cell = StateScores {
                    mm: mm + self.posterior.value(i, j) - mact,
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

        Ok(best.results(batch.active()))
    }
}
