//! Lane-parallel profile–profile HMM alignment for the Cyanea ecosystem.
//!
//! Aligns one query profile against up to [`LANES`] template profiles at a
//! time over five pair-states (`MM`, `GD`, `IM`, `DG`, `MI`):
//!
//! - [`HmmAligner::viterbi`]: best-scoring path with a bit-packed backtrace
//! - [`HmmAligner::forward`] / [`HmmAligner::backward`]: posterior match
//!   probabilities
//! - [`HmmAligner::mac`]: maximum accuracy alignment over the posteriors
//! - [`HmmAligner::traceback`] and [`HmmAligner::alternatives`]: paths and
//!   non-overlapping suboptimal alignments
//!
//! [`search`] and [`realign`] drive the engine over many templates, one
//! engine per rayon worker under the `parallel` feature.
//!
//! # Quick start
//!
//! ```
//! use cyanea_hhalign::{search, AlignConfig, Alphabet, Log2OddsScore, Profile};
//!
//! fn peaked(name: &str, seq: &[u8]) -> Profile {
//!     let emissions = seq
//!         .iter()
//!         .map(|&b| {
//!             let mut col = vec![0.01f32; 4];
//!             col[Alphabet::Dna.encode(b).unwrap()] = 0.97;
//!             col
//!         })
//!         .collect();
//!     let row = [-0.15f32, -4.3, -4.3, -0.7, -1.3, -0.7, -1.3];
//!     Profile::new(name, Alphabet::Dna, emissions, vec![row; seq.len() + 1]).unwrap()
//! }
//!
//! let query = peaked("q", b"ACGTACGT");
//! let templates = vec![peaked("t1", b"ACGTACGT"), peaked("t2", b"TTGACG")];
//! let scorer = Log2OddsScore::uniform(Alphabet::Dna);
//! let hits = search(&query, &templates, &AlignConfig::local(), &scorer).unwrap();
//! assert!(hits.iter().any(|h| h.template == 0 && h.rank == 0));
//! ```

pub mod lanes;
pub mod profile;
pub mod scoring;
pub mod config;
pub mod types;
pub mod batch;
pub mod matrix;
pub mod posterior;
pub mod rows;
pub mod aligner;
pub mod viterbi;
pub mod forward_backward;
pub mod mac;
pub mod traceback;
pub mod search;

#[cfg(test)]
pub(crate) mod test_util;

pub use aligner::HmmAligner;
pub use batch::TemplateBatch;
pub use config::{parse_excluded_ranges, AlignConfig};
pub use lanes::{F32Lanes, LaneMask, LANES};
pub use matrix::{BacktraceMatrix, CellCode};
pub use posterior::PosteriorMatrix;
pub use profile::{Alphabet, Profile, Transition, NUM_TRANSITIONS};
pub use scoring::{ColumnScore, Log2OddsScore};
pub use search::{realign, search, Hit, Realignment};
pub use types::{Alignment, AlignmentMode, AlignmentPath, LaneResult, PairState, Step};

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::test_util::sequence_profile;
    use proptest::prelude::*;

    fn dna_seq(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')], 1..=max_len)
    }

    fn scorer() -> Log2OddsScore {
        Log2OddsScore::uniform(Alphabet::Dna)
    }

    proptest! {
        #[test]
        fn viterbi_is_deterministic(q in dna_seq(30), t in dna_seq(30)) {
            let (q, t) = (sequence_profile("q", &q), sequence_profile("t", &t));
            let batch = TemplateBatch::new(&[&t]).unwrap();
            let config = AlignConfig::local();
            let mut a = HmmAligner::new();
            let mut b = HmmAligner::new();
            let ra = a.align(&q, &batch, &config, &scorer()).unwrap();
            let rb = b.align(&q, &batch, &config, &scorer()).unwrap();
            prop_assert_eq!(ra, rb);
        }

        #[test]
        fn local_score_at_least_global(q in dna_seq(30), t in dna_seq(30)) {
            let (q, t) = (sequence_profile("q", &q), sequence_profile("t", &t));
            let batch = TemplateBatch::new(&[&t]).unwrap();
            let mut engine = HmmAligner::new();
            let local = engine.align(&q, &batch, &AlignConfig::local(), &scorer()).unwrap()[0];
            let global = engine.align(&q, &batch, &AlignConfig::global(), &scorer()).unwrap()[0];
            prop_assert!(local.score >= global.score - 1e-3,
                "local {} < global {}", local.score, global.score);
        }

        #[test]
        fn lanes_are_independent(
            q in dna_seq(20),
            ts in proptest::collection::vec(dna_seq(20), 1..=LANES),
        ) {
            let q = sequence_profile("q", &q);
            let ts: Vec<Profile> = ts.iter().map(|s| sequence_profile("t", s)).collect();
            let refs: Vec<&Profile> = ts.iter().collect();
            let batch = TemplateBatch::new(&refs).unwrap();
            let config = AlignConfig::local();
            let mut engine = HmmAligner::new();
            let joint = engine.align(&q, &batch, &config, &scorer()).unwrap();
            for (lane, t) in ts.iter().enumerate() {
                let single = TemplateBatch::new(&[t]).unwrap();
                let alone = engine.align(&q, &single, &config, &scorer()).unwrap()[0];
                prop_assert_eq!(joint[lane], alone);
            }
        }

        #[test]
        fn traceback_is_monotone(q in dna_seq(25), t in dna_seq(25)) {
            let (q, t) = (sequence_profile("q", &q), sequence_profile("t", &t));
            let batch = TemplateBatch::new(&[&t]).unwrap();
            let mut engine = HmmAligner::new();
            for config in [AlignConfig::local(), AlignConfig::global()] {
                let r = engine.align(&q, &batch, &config, &scorer()).unwrap()[0];
                prop_assume!(r.is_found());
                let path = engine.traceback(0, r.i, r.j).unwrap();
                prop_assert!(path.len() <= q.len() + t.len());
                // gap states may open straight from the virtual begin cells
                let first = path.steps[0];
                prop_assert!(
                    first.state == PairState::MM
                        || (first.state.is_horizontal() && first.j == 1)
                        || (first.state.is_vertical() && first.i == 1),
                    "path starts with {} at ({}, {})", first.state, first.i, first.j
                );
                prop_assert_eq!(path.last().map(|s| (s.i, s.j)), Some((r.i, r.j)));
                for w in path.steps.windows(2) {
                    prop_assert!(w[0].i <= w[1].i && w[0].j <= w[1].j);
                    prop_assert!((w[0].i, w[0].j) != (w[1].i, w[1].j));
                }
            }
        }

        #[test]
        fn posteriors_stay_in_unit_interval(q in dna_seq(20), t in dna_seq(20)) {
            let (q, t) = (sequence_profile("q", &q), sequence_profile("t", &t));
            let batch = TemplateBatch::new(&[&t]).unwrap();
            let config = AlignConfig::local();
            let mut engine = HmmAligner::new();
            engine.prepare(&q, &batch, &config).unwrap();
            let fwd = engine.forward(&q, &batch, &config, &scorer()).unwrap()[0];
            engine.backward(&q, &batch, &config, &scorer()).unwrap();
            prop_assert!(fwd.is_finite());
            for i in 1..=q.len() {
                for j in 1..=t.len() {
                    let p = engine.posterior().single_value(i, j, 0);
                    prop_assert!((0.0..=1.0).contains(&p), "P({}, {}) = {}", i, j, p);
                }
            }
        }

        #[test]
        fn forward_at_least_viterbi(q in dna_seq(20), t in dna_seq(20)) {
            let (q, t) = (sequence_profile("q", &q), sequence_profile("t", &t));
            let batch = TemplateBatch::new(&[&t]).unwrap();
            let config = AlignConfig::local();
            let mut engine = HmmAligner::new();
            let vit = engine.align(&q, &batch, &config, &scorer()).unwrap()[0];
            let fwd = engine.forward(&q, &batch, &config, &scorer()).unwrap()[0];
            prop_assert!(fwd >= vit.score - 1e-2, "forward {} < viterbi {}", fwd, vit.score);
        }
    }
}
