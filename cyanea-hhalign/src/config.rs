//! Alignment configuration.

use cyanea_core::{CyaneaError, Result};

use crate::types::AlignmentMode;

/// Upper bound for `mact` and `macins` after clamping.
pub const MAC_PARAM_MAX: f32 = 0.999;

/// Smallest accepted realignment memory budget (1 GiB).
pub const MIN_MEMORY_BYTES: usize = 1 << 30;

/// Parameters shared by the Viterbi, Forward/Backward and MAC engines and the
/// batch driver.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlignConfig {
    /// Local or global alignment.
    pub mode: AlignmentMode,
    /// Penalty in bits per end gap aligned to query columns (column 0 init).
    pub gap_query: f32,
    /// Penalty in bits per end gap aligned to template columns (row 0 init).
    pub gap_template: f32,
    /// Score offset added to every column–column score.
    pub shift: f32,
    /// Minimum overlap between query and template; 0 disables the corner
    /// exclusion.
    pub min_overlap: usize,
    /// MAC greediness threshold in `[0, 1)`.
    pub mact: f32,
    /// MAC internal gap cost factor in `[0, 1)`.
    pub macins: f32,
    /// Neighbourhood switched off around each reported path.
    pub exclusion_margin: usize,
    /// Query rows excluded from every alignment, 1-based inclusive.
    pub excluded_query_ranges: Vec<(usize, usize)>,
    /// Maximum number of alignments reported per template.
    pub alternatives: usize,
    /// Alternative alignments (beyond the first) must score at least this.
    pub min_alternative_score: f64,
    /// Memory budget of the realignment stage.
    pub max_memory_bytes: usize,
    /// Worker threads of the batch driver; 0 uses the global pool.
    pub threads: usize,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            mode: AlignmentMode::Local,
            gap_query: 0.0,
            gap_template: 0.1,
            shift: -0.03,
            min_overlap: 0,
            mact: 0.35,
            macins: 0.0,
            exclusion_margin: 2,
            excluded_query_ranges: Vec::new(),
            alternatives: 2,
            min_alternative_score: 0.0,
            max_memory_bytes: 3 * MIN_MEMORY_BYTES,
            threads: 0,
        }
    }
}

impl AlignConfig {
    /// Local alignment with default parameters.
    pub fn local() -> Self {
        Self::default()
    }

    /// Global alignment with default parameters.
    pub fn global() -> Self {
        Self {
            mode: AlignmentMode::Global,
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: AlignmentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_end_gaps(mut self, gap_query: f32, gap_template: f32) -> Self {
        self.gap_query = gap_query;
        self.gap_template = gap_template;
        self
    }

    pub fn with_shift(mut self, shift: f32) -> Self {
        self.shift = shift;
        self
    }

    pub fn with_min_overlap(mut self, min_overlap: usize) -> Self {
        self.min_overlap = min_overlap;
        self
    }

    pub fn with_mac(mut self, mact: f32, macins: f32) -> Self {
        self.mact = mact;
        self.macins = macins;
        self
    }

    pub fn with_exclusion_margin(mut self, margin: usize) -> Self {
        self.exclusion_margin = margin;
        self
    }

    pub fn with_excluded_query_ranges(mut self, ranges: Vec<(usize, usize)>) -> Self {
        self.excluded_query_ranges = ranges;
        self
    }

    pub fn with_alternatives(mut self, alternatives: usize, min_score: f64) -> Self {
        self.alternatives = alternatives;
        self.min_alternative_score = min_score;
        self
    }

    pub fn with_max_memory_bytes(mut self, bytes: usize) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Normalise out-of-range parameters and reject unusable ones.
    ///
    /// `mact` and `macins` are clamped into `[0, 0.999]` and the memory
    /// budget is raised to 1 GiB, each with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error for NaN or negative gap penalties, a non-finite
    /// shift, NaN MAC parameters, `alternatives == 0`, or an excluded range
    /// whose start is 0 or exceeds its end.
    pub fn validate(&mut self) -> Result<()> {
        for (label, v) in [("gap_query", self.gap_query), ("gap_template", self.gap_template)] {
            if v.is_nan() || v < 0.0 {
                return Err(CyaneaError::InvalidInput(format!(
                    "{label} must be a non-negative number, got {v}"
                )));
            }
        }
        if !self.shift.is_finite() {
            return Err(CyaneaError::InvalidInput(format!(
                "shift must be finite, got {}",
                self.shift
            )));
        }
        self.mact = clamp_mac_param("mact", self.mact)?;
        self.macins = clamp_mac_param("macins", self.macins)?;
        if self.alternatives == 0 {
            return Err(CyaneaError::InvalidInput(
                "alternatives must be at least 1".into(),
            ));
        }
        if self.max_memory_bytes < MIN_MEMORY_BYTES {
            log::warn!(
                "max_memory_bytes {} below minimum, using {}",
                self.max_memory_bytes,
                MIN_MEMORY_BYTES
            );
            self.max_memory_bytes = MIN_MEMORY_BYTES;
        }
        for &(start, end) in &self.excluded_query_ranges {
            if start == 0 || start > end {
                return Err(CyaneaError::InvalidInput(format!(
                    "excluded query range {start}-{end} is not a 1-based ascending range"
                )));
            }
        }
        Ok(())
    }

    /// Longest template the realignment stage will accept for a query of
    /// `query_len` columns: `max_memory_bytes / 8 / query_len / threads`.
    pub fn max_realign_template_len(&self, query_len: usize) -> usize {
        let threads = self.effective_threads();
        self.max_memory_bytes / 8 / query_len.max(1) / threads
    }

    fn effective_threads(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        #[cfg(feature = "parallel")]
        {
            rayon::current_num_threads().max(1)
        }
        #[cfg(not(feature = "parallel"))]
        {
            1
        }
    }
}

fn clamp_mac_param(label: &str, v: f32) -> Result<f32> {
    if v.is_nan() {
        return Err(CyaneaError::InvalidInput(format!("{label} is NaN")));
    }
    if v > MAC_PARAM_MAX {
        log::warn!("{label} {v} clamped to {MAC_PARAM_MAX}");
        return Ok(MAC_PARAM_MAX);
    }
    if v < 0.0 {
        log::warn!("{label} {v} clamped to 0");
        return Ok(0.0);
    }
    Ok(v)
}

/// Parse excluded query ranges such as `"1-33,97-168"`.
///
/// Ranges are 1-based and inclusive; a single number excludes one row.
///
/// # Errors
///
/// Returns a parse error for malformed numbers or a range whose start is 0
/// or exceeds its end.
pub fn parse_excluded_ranges(s: &str) -> Result<Vec<(usize, usize)>> {
    let mut out = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (a, b) = match part.split_once('-') {
            Some((a, b)) => (a.trim(), b.trim()),
            None => (part, part),
        };
        let start: usize = a
            .parse()
            .map_err(|_| CyaneaError::Parse(format!("bad range start '{a}' in '{part}'")))?;
        let end: usize = b
            .parse()
            .map_err(|_| CyaneaError::Parse(format!("bad range end '{b}' in '{part}'")))?;
        if start == 0 || start > end {
            return Err(CyaneaError::Parse(format!(
                "range '{part}' must be 1-based and ascending"
            )));
        }
        out.push((start, end));
    }
    Ok(out)
}
