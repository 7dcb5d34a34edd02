//! Profile HMMs as consumed by the alignment engines.
//!
//! A [`Profile`] of length `L` is addressed 1-based: columns `1..=L` are real
//! match columns, column `0` is the virtual begin state and column `L + 1` the
//! virtual end state. Both virtual columns have only a Match state, so their
//! emission vectors are all zero.
//!
//! Transitions are stored in `log2` space, seven per column, anchored at the
//! column they leave from: `transition(k, Transition::M2D)` is the score of
//! moving from `M_k` to `D_{k+1}`.

use cyanea_core::{Annotated, CyaneaError, Log2Prob, Result};

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Number of transition scores per profile column.
pub const NUM_TRANSITIONS: usize = 7;

/// Index of a transition score within a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Transition {
    M2M = 0,
    M2I = 1,
    M2D = 2,
    I2M = 3,
    I2I = 4,
    D2M = 5,
    D2D = 6,
}

impl Transition {
    /// All transitions in storage order.
    pub const ALL: [Transition; NUM_TRANSITIONS] = [
        Transition::M2M,
        Transition::M2I,
        Transition::M2D,
        Transition::I2M,
        Transition::I2I,
        Transition::D2M,
        Transition::D2D,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Alphabet
// ---------------------------------------------------------------------------

/// Residue alphabet of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Alphabet {
    /// DNA alphabet: A, C, G, T
    Dna,
    /// RNA alphabet: A, C, G, U
    Rna,
    /// Protein alphabet: 20 standard amino acids
    Protein,
}

impl Alphabet {
    /// Number of symbols in the alphabet.
    pub fn size(self) -> usize {
        match self {
            Alphabet::Dna | Alphabet::Rna => 4,
            Alphabet::Protein => 20,
        }
    }

    /// Encode a byte to its index in the alphabet, or `None` if invalid.
    pub fn encode(self, b: u8) -> Option<usize> {
        let upper = b.to_ascii_uppercase();
        match self {
            Alphabet::Dna => b"ACGT".iter().position(|&c| c == upper),
            Alphabet::Rna => b"ACGU".iter().position(|&c| c == upper),
            Alphabet::Protein => b"ARNDCQEGHILKMFPSTWYV".iter().position(|&c| c == upper),
        }
    }

    /// Uniform background distribution for this alphabet.
    pub fn uniform_background(self) -> Vec<f32> {
        let k = self.size();
        vec![1.0 / k as f32; k]
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// An immutable profile HMM.
#[derive(Debug, Clone)]
pub struct Profile {
    name: String,
    description: Option<String>,
    alphabet: Alphabet,
    len: usize,
    /// Match emission probabilities, `(len + 2) * K`, indexed as `k * K + sym`.
    emissions: Vec<f32>,
    /// Log2 transition scores for columns `0..=len + 1`.
    transitions: Vec<[f32; NUM_TRANSITIONS]>,
}

impl Profile {
    /// Create a profile from emission probabilities and log2 transitions.
    ///
    /// `emissions` holds one vector per real column (`1..=L`), each of the
    /// alphabet's size. `transitions` holds one row per column `0..=L`; the
    /// virtual end column is appended with `M2M = 0` and every other move
    /// impossible.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile is empty, an emission vector has the
    /// wrong size or holds a negative or non-finite value, the transition table
    /// has the wrong number of rows, or a transition is NaN or `+∞`.
    pub fn new(
        name: impl Into<String>,
        alphabet: Alphabet,
        emissions: Vec<Vec<f32>>,
        transitions: Vec<[f32; NUM_TRANSITIONS]>,
    ) -> Result<Self> {
        let name = name.into();
        let len = emissions.len();
        let k = alphabet.size();
        if len == 0 {
            return Err(CyaneaError::InvalidInput(format!(
                "profile '{name}' has no match columns"
            )));
        }
        if transitions.len() != len + 1 {
            return Err(CyaneaError::InvalidInput(format!(
                "profile '{name}': transitions length {} != profile length + 1 ({})",
                transitions.len(),
                len + 1
            )));
        }

        let mut flat = vec![0.0f32; (len + 2) * k];
        for (col, e) in emissions.iter().enumerate() {
            if e.len() != k {
                return Err(CyaneaError::InvalidInput(format!(
                    "profile '{name}': column {} has {} emissions, alphabet needs {k}",
                    col + 1,
                    e.len()
                )));
            }
            if let Some(bad) = e.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(CyaneaError::InvalidInput(format!(
                    "profile '{name}': column {} has invalid emission {bad}",
                    col + 1
                )));
            }
            flat[(col + 1) * k..(col + 2) * k].copy_from_slice(e);
        }

        for (col, row) in transitions.iter().enumerate() {
            if row.iter().any(|v| v.is_nan() || *v == f32::INFINITY) {
                return Err(CyaneaError::InvalidInput(format!(
                    "profile '{name}': column {col} has a NaN or +inf transition"
                )));
            }
        }

        let mut transitions = transitions;
        let mut end = [f32::NEG_INFINITY; NUM_TRANSITIONS];
        end[Transition::M2M.index()] = 0.0;
        transitions.push(end);

        Ok(Self {
            name,
            description: None,
            alphabet,
            len,
            emissions: flat,
            transitions,
        })
    }

    /// Create a profile from linear-space transition probabilities.
    ///
    /// # Errors
    ///
    /// As [`Profile::new`], plus an error for any probability outside `[0, 1]`.
    pub fn from_probabilities(
        name: impl Into<String>,
        alphabet: Alphabet,
        emissions: Vec<Vec<f32>>,
        transitions: &[[f64; NUM_TRANSITIONS]],
    ) -> Result<Self> {
        let mut log2 = Vec::with_capacity(transitions.len());
        for row in transitions {
            let mut out = [0.0f32; NUM_TRANSITIONS];
            for (o, &p) in out.iter_mut().zip(row.iter()) {
                *o = Log2Prob::from_prob(p)?.0 as f32;
            }
            log2.push(out);
        }
        Self::new(name, alphabet, emissions, log2)
    }

    /// Attach a free-text description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Number of real match columns.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`; empty profiles are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    /// Emission probabilities of column `k` (`0..=len + 1`).
    #[inline]
    pub fn emission(&self, k: usize) -> &[f32] {
        let n = self.alphabet.size();
        &self.emissions[k * n..(k + 1) * n]
    }

    /// Log2 score of transition `t` leaving column `k` (`0..=len + 1`).
    #[inline]
    pub fn transition(&self, k: usize, t: Transition) -> f32 {
        self.transitions[k][t.index()]
    }

    /// All seven log2 transition scores leaving column `k`.
    #[inline]
    pub fn transitions(&self, k: usize) -> &[f32; NUM_TRANSITIONS] {
        &self.transitions[k]
    }
}

impl Annotated for Profile {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}
