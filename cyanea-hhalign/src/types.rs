//! Core types for profile–profile alignment results.

use core::fmt;

use cyanea_core::Scored;

/// Where an alignment may start and end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AlignmentMode {
    /// Local alignment: any cell may start or end an alignment.
    #[default]
    Local,
    /// Global alignment: paths run from the virtual begin cell to the last
    /// query row or the last template column.
    Global,
}

/// One of the five pair-states of the profile–profile HMM.
///
/// `GD` and `IM` consume a template column (horizontal moves); `DG` and `MI`
/// consume a query column (vertical moves). Every non-`MM` state is entered
/// from and left to `MM` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PairState {
    /// Match in query, match in template.
    MM,
    /// Gap in query, delete in template.
    GD,
    /// Insert in query, match in template.
    IM,
    /// Delete in query, gap in template.
    DG,
    /// Match in query, insert in template.
    MI,
}

impl PairState {
    /// The four gap states in tie-break order.
    pub const GAPS: [PairState; 4] = [PairState::GD, PairState::IM, PairState::DG, PairState::MI];

    /// Backtrace code of this state as an `MM` predecessor (`1..=5`).
    #[inline]
    pub fn code(self) -> u8 {
        match self {
            PairState::MM => 1,
            PairState::GD => 2,
            PairState::IM => 3,
            PairState::DG => 4,
            PairState::MI => 5,
        }
    }

    /// Inverse of [`PairState::code`]; `None` for anything outside `1..=5`.
    #[inline]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(PairState::MM),
            2 => Some(PairState::GD),
            3 => Some(PairState::IM),
            4 => Some(PairState::DG),
            5 => Some(PairState::MI),
            _ => None,
        }
    }

    /// `true` for states that advance the template index only.
    #[inline]
    pub fn is_horizontal(self) -> bool {
        matches!(self, PairState::GD | PairState::IM)
    }

    /// `true` for states that advance the query index only.
    #[inline]
    pub fn is_vertical(self) -> bool {
        matches!(self, PairState::DG | PairState::MI)
    }
}

impl fmt::Display for PairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PairState::MM => "MM",
            PairState::GD => "GD",
            PairState::IM => "IM",
            PairState::DG => "DG",
            PairState::MI => "MI",
        };
        f.write_str(s)
    }
}

/// One aligned position: query column `i`, template column `j`, pair-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Step {
    pub i: usize,
    pub j: usize,
    pub state: PairState,
}

impl Step {
    pub fn new(i: usize, j: usize, state: PairState) -> Self {
        Self { i, j, state }
    }
}

/// An alignment path, ordered from its first to its last step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlignmentPath {
    pub steps: Vec<Step>,
}

impl AlignmentPath {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn first(&self) -> Option<&Step> {
        self.steps.first()
    }

    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Number of `MM` steps.
    pub fn match_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.state == PairState::MM)
            .count()
    }

    /// `(i, j)` of every `MM` step.
    pub fn aligned_pairs(&self) -> Vec<(usize, usize)> {
        self.steps
            .iter()
            .filter(|s| s.state == PairState::MM)
            .map(|s| (s.i, s.j))
            .collect()
    }

    /// Compact state string, e.g. `"3MM2GD1MM"`.
    pub fn state_string(&self) -> String {
        let mut out = String::new();
        let mut iter = self.steps.iter().map(|s| s.state).peekable();
        while let Some(state) = iter.next() {
            let mut run = 1;
            while iter.peek() == Some(&state) {
                iter.next();
                run += 1;
            }
            out.push_str(&format!("{run}{state}"));
        }
        out
    }
}

/// Best score and end cell of one lane.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaneResult {
    /// Best score in bits; `-∞` when no admissible end cell exists.
    pub score: f64,
    /// Query row of the best end cell.
    pub i: usize,
    /// Template column of the best end cell.
    pub j: usize,
}

impl LaneResult {
    pub const UNREACHABLE: LaneResult = LaneResult {
        score: f64::NEG_INFINITY,
        i: 0,
        j: 0,
    };

    /// `true` when the lane found an admissible end cell.
    pub fn is_found(&self) -> bool {
        self.score.is_finite()
    }
}

impl Scored for LaneResult {
    fn score(&self) -> f64 {
        self.score
    }
}

/// One alignment reported for a lane: score, end cell and path.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Alignment {
    pub score: f64,
    pub i: usize,
    pub j: usize,
    pub path: AlignmentPath,
}

impl Alignment {
    /// `true` when no cell of `self` is also a cell of `other`.
    pub fn is_disjoint(&self, other: &Alignment) -> bool {
        self.path
            .iter()
            .all(|a| other.path.iter().all(|b| (a.i, a.j) != (b.i, b.j)))
    }
}

impl Scored for Alignment {
    fn score(&self) -> f64 {
        self.score
    }
}
