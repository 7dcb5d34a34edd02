//! Grouping templates into lanes.
//!
//! A [`TemplateBatch`] holds up to [`LANES`] templates aligned against the
//! same query in one engine invocation. Template transitions are gathered
//! into per-column lane vectors once, and columns beyond a lane's own length
//! read as `-∞` so shorter templates never contribute cells past their end.

use cyanea_core::{Annotated, CyaneaError, Result};

use crate::lanes::{F32Lanes, LaneMask, LANES};
use crate::profile::{Alphabet, Profile, Transition, NUM_TRANSITIONS};
use crate::scoring::ColumnScore;

/// Up to [`LANES`] templates sharing one engine invocation.
#[derive(Debug, Clone)]
pub struct TemplateBatch<'a> {
    templates: Vec<&'a Profile>,
    lengths: [usize; LANES],
    max_len: usize,
    alphabet: Alphabet,
    /// Lane-gathered transitions for columns `0..=max_len`.
    transitions: Vec<[F32Lanes; NUM_TRANSITIONS]>,
}

impl<'a> TemplateBatch<'a> {
    /// Group `templates` into one batch; lane `k` holds `templates[k]`.
    ///
    /// Lanes beyond `templates.len()` stay idle and report unreachable
    /// results.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch is empty, holds more than [`LANES`]
    /// templates, or mixes alphabets.
    pub fn new(templates: &[&'a Profile]) -> Result<Self> {
        let first = templates.first().ok_or_else(|| {
            CyaneaError::InvalidInput("template batch is empty".into())
        })?;
        if templates.len() > LANES {
            return Err(CyaneaError::InvalidInput(format!(
                "template batch holds {} templates, lane width is {LANES}",
                templates.len()
            )));
        }
        let alphabet = first.alphabet();
        if let Some(t) = templates.iter().find(|t| t.alphabet() != alphabet) {
            return Err(CyaneaError::InvalidInput(format!(
                "template '{}' uses {:?}, batch uses {:?}",
                t.name(),
                t.alphabet(),
                alphabet
            )));
        }

        let mut lengths = [0usize; LANES];
        for (k, t) in templates.iter().enumerate() {
            lengths[k] = t.len();
        }
        let max_len = lengths.iter().copied().max().unwrap_or(0);

        let mut transitions = vec![[F32Lanes::NEG_INF; NUM_TRANSITIONS]; max_len + 1];
        for (j, col) in transitions.iter_mut().enumerate() {
            for (k, t) in templates.iter().enumerate() {
                if j <= t.len() {
                    for tr in Transition::ALL {
                        col[tr.index()].set_lane(k, t.transition(j, tr));
                    }
                }
            }
        }

        Ok(Self {
            templates: templates.to_vec(),
            lengths,
            max_len,
            alphabet,
            transitions,
        })
    }

    /// Number of occupied lanes.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Length of the longest template in the batch.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    /// Template length of lane `k`; 0 for idle lanes.
    #[inline]
    pub fn lane_len(&self, k: usize) -> usize {
        self.lengths[k]
    }

    pub fn lengths(&self) -> &[usize; LANES] {
        &self.lengths
    }

    pub fn template(&self, k: usize) -> Option<&'a Profile> {
        self.templates.get(k).copied()
    }

    /// Lanes holding a template.
    pub fn active(&self) -> LaneMask {
        let mut m = LaneMask::default();
        for k in 0..self.len() {
            m.set(k, true);
        }
        m
    }

    /// Transition `t` leaving template column `j`, per lane.
    #[inline]
    pub fn transition(&self, j: usize, t: Transition) -> F32Lanes {
        self.transitions[j][t.index()]
    }

    /// All transitions leaving template column `j`, per lane.
    #[inline]
    pub fn transitions(&self, j: usize) -> &[F32Lanes; NUM_TRANSITIONS] {
        &self.transitions[j]
    }

    /// Lanes for which `j` is a real template column.
    #[inline]
    pub fn column_valid(&self, j: usize) -> LaneMask {
        let mut m = LaneMask::default();
        for k in 0..LANES {
            m.set(k, j >= 1 && j <= self.lengths[k]);
        }
        m
    }

    /// Lanes whose last template column is `j`.
    #[inline]
    pub fn last_column(&self, j: usize) -> LaneMask {
        let mut m = LaneMask::default();
        for k in 0..self.len() {
            m.set(k, j == self.lengths[k]);
        }
        m
    }

    /// Fill `out[j]` with `S(i, j) = score(query column, template column j) + shift`
    /// for `j` in `1..=max_len`; cells beyond a lane's template are `-∞`.
    pub fn score_row(
        &self,
        query_column: &[f32],
        scorer: &dyn ColumnScore,
        shift: f32,
        out: &mut Vec<F32Lanes>,
    ) {
        out.clear();
        out.resize(self.max_len + 1, F32Lanes::NEG_INF);
        for (j, cell) in out.iter_mut().enumerate().skip(1) {
            for (k, t) in self.templates.iter().enumerate() {
                if j <= t.len() {
                    cell.set_lane(k, scorer.score(query_column, t.emission(j)) + shift);
                }
            }
        }
    }
}
