//! Small profiles and scorers shared by the unit tests.

use crate::profile::{Alphabet, Profile, NUM_TRANSITIONS};

/// M2M 0, M2I -1, M2D -1, I2M 0, I2I -1, D2M 0, D2D -1.
const TOY_TRANSITIONS: [f32; NUM_TRANSITIONS] = [0.0, -1.0, -1.0, 0.0, -1.0, 0.0, -1.0];

/// Uniform emissions with toy transitions.
pub(crate) fn flat_profile(name: &str, len: usize, alphabet: Alphabet) -> Profile {
    let emissions = vec![alphabet.uniform_background(); len];
    Profile::new(name, alphabet, emissions, vec![TOY_TRANSITIONS; len + 1]).unwrap()
}

/// DNA profile emitting exactly the residues of `seq`, with toy transitions.
pub(crate) fn one_hot(name: &str, seq: &[u8]) -> Profile {
    let emissions = seq
        .iter()
        .map(|&b| {
            let mut col = vec![0.0f32; 4];
            col[Alphabet::Dna.encode(b).unwrap()] = 1.0;
            col
        })
        .collect();
    Profile::new(name, Alphabet::Dna, emissions, vec![TOY_TRANSITIONS; seq.len() + 1]).unwrap()
}

/// DNA profile peaked on the residues of `seq` with HMM-like transitions.
pub(crate) fn sequence_profile(name: &str, seq: &[u8]) -> Profile {
    let emissions = seq
        .iter()
        .map(|&b| {
            let mut col = vec![0.01f32; 4];
            col[Alphabet::Dna.encode(b).unwrap()] = 0.97;
            col
        })
        .collect();
    let m2m = 0.9f32.log2();
    let m2x = 0.05f32.log2();
    let x2m = 0.6f32.log2();
    let x2x = 0.4f32.log2();
    let row = [m2m, m2x, m2x, x2m, x2x, x2m, x2x];
    Profile::new(name, Alphabet::Dna, emissions, vec![row; seq.len() + 1]).unwrap()
}

fn argmax(v: &[f32]) -> usize {
    v.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (k, &x)| {
            if x > best.1 {
                (k, x)
            } else {
                best
            }
        })
        .0
}

/// `hit` when both columns peak on the same residue, `miss` otherwise.
pub(crate) fn argmax_scorer(hit: f32, miss: f32) -> impl Fn(&[f32], &[f32]) -> f32 + Send + Sync {
    move |q: &[f32], t: &[f32]| if argmax(q) == argmax(t) { hit } else { miss }
}
