//! Column–column scoring functions.
//!
//! The engines never look inside a profile column themselves: the score of
//! aligning query column `i` with template column `j` comes from a
//! [`ColumnScore`] passed explicitly to each call. The configured shift is
//! added by the engine, not by the scorer.

use cyanea_core::{CyaneaError, Result};

use crate::profile::Alphabet;

/// Score of aligning two profile columns, in bits.
///
/// Implementations must be pure: the same pair of columns always yields the
/// same score. Closures `Fn(&[f32], &[f32]) -> f32` implement this trait.
pub trait ColumnScore: Send + Sync {
    /// Score query emissions `query` against template emissions `template`.
    fn score(&self, query: &[f32], template: &[f32]) -> f32;
}

impl<F> ColumnScore for F
where
    F: Fn(&[f32], &[f32]) -> f32 + Send + Sync,
{
    #[inline]
    fn score(&self, query: &[f32], template: &[f32]) -> f32 {
        self(query, template)
    }
}

/// Log-odds profile–profile score: `log2(Σ_a q(a) · t(a) / f(a))`.
///
/// `f` is the background distribution. Columns with no overlapping mass
/// score `-∞`.
#[derive(Debug, Clone)]
pub struct Log2OddsScore {
    inv_background: Vec<f32>,
}

impl Log2OddsScore {
    /// Build from an explicit background distribution.
    ///
    /// # Errors
    ///
    /// Returns an error if the background is empty or contains a value that
    /// is not strictly positive and finite.
    pub fn new(background: &[f32]) -> Result<Self> {
        if background.is_empty() {
            return Err(CyaneaError::InvalidInput(
                "background distribution is empty".into(),
            ));
        }
        if let Some(bad) = background.iter().find(|f| !f.is_finite() || **f <= 0.0) {
            return Err(CyaneaError::InvalidInput(format!(
                "background frequency must be positive, got {bad}"
            )));
        }
        Ok(Self {
            inv_background: background.iter().map(|f| 1.0 / f).collect(),
        })
    }

    /// Uniform background over `alphabet`.
    pub fn uniform(alphabet: Alphabet) -> Self {
        let k = alphabet.size();
        Self {
            inv_background: vec![k as f32; k],
        }
    }
}

impl ColumnScore for Log2OddsScore {
    fn score(&self, query: &[f32], template: &[f32]) -> f32 {
        let sum: f32 = query
            .iter()
            .zip(template)
            .zip(&self.inv_background)
            .map(|((q, t), w)| q * t * w)
            .sum();
        sum.log2()
    }
}
