//! Batch driver: one query against many templates.
//!
//! Templates are cut into [`LANES`]-wide batches in input order. Under the
//! `parallel` feature each rayon worker owns one [`HmmAligner`] (via
//! `map_init`) and claims whole batches, so no engine is shared; without it
//! a single engine walks the batches in turn. Results come back in template
//! order regardless of scheduling.

use cyanea_core::{Annotated, CyaneaError, Result, Scored, Summarizable};

use crate::aligner::HmmAligner;
use crate::batch::TemplateBatch;
use crate::config::AlignConfig;
use crate::lanes::LANES;
use crate::profile::Profile;
use crate::scoring::ColumnScore;
use crate::types::{AlignmentPath, PairState};

/// One alignment of the query to one template.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hit {
    /// Index of the template in the searched slice.
    pub template: usize,
    /// 0 for the best alignment of the template, then alternatives in order.
    pub rank: usize,
    /// Viterbi score in bits.
    pub score: f64,
    /// End cell of the Viterbi path.
    pub i: usize,
    pub j: usize,
    pub path: AlignmentPath,
    /// Filled in by [`realign`].
    pub realigned: Option<Realignment>,
}

impl Scored for Hit {
    fn score(&self) -> f64 {
        self.score
    }
}

impl Summarizable for Hit {
    fn summary(&self) -> String {
        format!(
            "template {} rank {}: {:.2} bits ending at ({}, {}), {}",
            self.template,
            self.rank,
            self.score,
            self.i,
            self.j,
            self.path.state_string()
        )
    }
}

/// Forward/Backward + MAC result for a hit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Realignment {
    /// Log2 sum over all alignments (Forward total).
    pub forward_score: f64,
    /// Expected-accuracy score of the MAC path.
    pub mac_score: f64,
    pub path: AlignmentPath,
    /// Posterior probability of every `MM` step of `path`, in order.
    pub posteriors: Vec<f32>,
}

fn validated(config: &AlignConfig) -> Result<AlignConfig> {
    let mut config = config.clone();
    config.validate()?;
    Ok(config)
}

#[cfg(feature = "parallel")]
fn run_batches<T, F>(templates: &[usize], config: &AlignConfig, job: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&mut HmmAligner, &[usize]) -> Result<Vec<T>> + Send + Sync,
{
    use rayon::prelude::*;

    if templates.is_empty() {
        return Ok(Vec::new());
    }
    let run = || {
        templates
            .par_chunks(LANES)
            .map_init(HmmAligner::new, |engine, chunk| job(engine, chunk))
            .collect::<Vec<_>>()
    };
    let per_batch = if config.threads > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .map_err(|e| CyaneaError::Other(format!("cannot build thread pool: {e}")))?;
        pool.install(run)
    } else {
        run()
    };
    let mut out = Vec::new();
    for batch in per_batch {
        out.extend(batch?);
    }
    Ok(out)
}

#[cfg(not(feature = "parallel"))]
fn run_batches<T, F>(templates: &[usize], _config: &AlignConfig, job: F) -> Result<Vec<T>>
where
    F: Fn(&mut HmmAligner, &[usize]) -> Result<Vec<T>>,
{
    let mut engine = HmmAligner::new();
    let mut out = Vec::new();
    for chunk in templates.chunks(LANES) {
        out.extend(job(&mut engine, chunk)?);
    }
    Ok(out)
}

/// Align `query` against every template.
///
/// Each template yields up to `config.alternatives` non-overlapping hits,
/// ordered by template index, then rank. Templates without an admissible
/// alignment yield none.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, a template's alphabet
/// differs from the query's, or the engine reports an internal failure.
pub fn search(
    query: &Profile,
    templates: &[Profile],
    config: &AlignConfig,
    scorer: &dyn ColumnScore,
) -> Result<Vec<Hit>> {
    let config = validated(config)?;
    let indices: Vec<usize> = (0..templates.len()).collect();
    log::debug!(
        "searching '{}' (L={}) against {} templates in batches of {LANES}",
        query.name(),
        query.len(),
        templates.len()
    );

    let hits = run_batches(&indices, &config, |engine, chunk| {
        let refs: Vec<&Profile> = chunk.iter().map(|&t| &templates[t]).collect();
        let batch = TemplateBatch::new(&refs)?;
        let alternatives = engine.alternatives(query, &batch, &config, scorer)?;
        let mut hits = Vec::new();
        for (lane, alignments) in alternatives.into_iter().enumerate() {
            for (rank, a) in alignments.into_iter().enumerate() {
                hits.push(Hit {
                    template: chunk[lane],
                    rank,
                    score: a.score,
                    i: a.i,
                    j: a.j,
                    path: a.path,
                    realigned: None,
                });
            }
        }
        Ok(hits)
    })?;

    log::debug!("'{}': {} hits", query.name(), hits.len());
    Ok(hits)
}

/// Realign the best hit of every template with Forward/Backward + MAC.
///
/// Templates longer than [`AlignConfig::max_realign_template_len`] are
/// skipped with a warning and keep `realigned == None`. Returns the number of
/// hits realigned.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, a hit refers to a
/// template outside `templates`, or an engine pass fails.
pub fn realign(
    query: &Profile,
    templates: &[Profile],
    hits: &mut [Hit],
    config: &AlignConfig,
    scorer: &dyn ColumnScore,
) -> Result<usize> {
    let config = validated(config)?;
    let max_len = config.max_realign_template_len(query.len());

    let mut targets = Vec::new();
    for hit in hits.iter().filter(|h| h.rank == 0) {
        let template = templates.get(hit.template).ok_or_else(|| {
            CyaneaError::InvalidInput(format!(
                "hit refers to template {} of {}",
                hit.template,
                templates.len()
            ))
        })?;
        if template.len() > max_len {
            log::warn!(
                "not realigning '{}': length {} exceeds memory limit {}",
                template.name(),
                template.len(),
                max_len
            );
            continue;
        }
        targets.push(hit.template);
    }

    let results = run_batches(&targets, &config, |engine, chunk| {
        let refs: Vec<&Profile> = chunk.iter().map(|&t| &templates[t]).collect();
        let batch = TemplateBatch::new(&refs)?;
        engine.prepare(query, &batch, &config)?;
        let forward = engine.forward(query, &batch, &config, scorer)?;
        engine.backward(query, &batch, &config, scorer)?;
        let mac = engine.mac(query, &batch, &config)?;

        let mut out = Vec::with_capacity(chunk.len());
        for (lane, &template) in chunk.iter().enumerate() {
            let r = mac[lane];
            let path = if r.is_found() {
                engine.traceback(lane, r.i, r.j)?
            } else {
                AlignmentPath::default()
            };
            let posteriors = path
                .iter()
                .filter(|s| s.state == PairState::MM)
                .map(|s| engine.posterior().single_value(s.i, s.j, lane))
                .collect();
            out.push((
                template,
                Realignment {
                    forward_score: forward[lane],
                    mac_score: r.score,
                    path,
                    posteriors,
                },
            ));
        }
        Ok(out)
    })?;

    let realigned = results.len();
    for (template, realignment) in results {
        if let Some(hit) = hits
            .iter_mut()
            .find(|h| h.template == template && h.rank == 0)
        {
            hit.realigned = Some(realignment);
        }
    }
    log::debug!("'{}': realigned {realigned} hits", query.name());
    Ok(realigned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_MEMORY_BYTES;
    use crate::profile::Alphabet;
    use crate::scoring::Log2OddsScore;
    use crate::test_util::{argmax_scorer, one_hot, sequence_profile};

    fn templates() -> Vec<Profile> {
        [
            &b"ACGTACGT"[..],
            b"TTTT",
            b"ACGTTGCAACGT",
            b"GCA",
            b"CGTACG",
            b"AAAAACGTAAAA",
        ]
        .iter()
        .enumerate()
        .map(|(k, s)| sequence_profile(&format!("t{k}"), s))
        .collect()
    }

    #[test]
    fn hits_match_single_lane_alignment() {
        let query = sequence_profile("q", b"ACGTACGT");
        let templates = templates();
        let scorer = Log2OddsScore::uniform(Alphabet::Dna);
        let config = AlignConfig::local().with_alternatives(1, 0.0);
        let hits = search(&query, &templates, &config, &scorer).unwrap();

        let mut engine = HmmAligner::new();
        let mut expected = 0;
        for (k, t) in templates.iter().enumerate() {
            let batch = TemplateBatch::new(&[t]).unwrap();
            let r = engine.align(&query, &batch, &config, &scorer).unwrap()[0];
            if !r.is_found() {
                continue;
            }
            let hit = hits.iter().find(|h| h.template == k).unwrap();
            assert_eq!(hit.score, r.score);
            assert_eq!((hit.i, hit.j), (r.i, r.j));
            expected += 1;
        }
        assert_eq!(hits.len(), expected);
    }

    #[test]
    fn hits_are_in_template_order() {
        let query = sequence_profile("q", b"ACGTACGT");
        let templates = templates();
        let scorer = Log2OddsScore::uniform(Alphabet::Dna);
        let hits = search(&query, &templates, &AlignConfig::local(), &scorer).unwrap();
        for w in hits.windows(2) {
            assert!((w[0].template, w[0].rank) < (w[1].template, w[1].rank));
        }
        for h in hits.iter().filter(|h| h.rank > 0) {
            let best = hits
                .iter()
                .find(|b| b.template == h.template && b.rank == 0)
                .unwrap();
            assert!(h.score <= best.score);
        }
    }

    #[test]
    fn hit_summary() {
        let query = one_hot("q", b"ACG");
        let scorer = argmax_scorer(2.0, -1.0);
        let config = AlignConfig::local()
            .with_end_gaps(1.0, 1.0)
            .with_shift(0.0)
            .with_alternatives(1, 0.0);
        let hits = search(&query, &[one_hot("t", b"ACG")], &config, &scorer).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].summary(), "template 0 rank 0: 6.00 bits ending at (3, 3), 3MM");
    }

    #[test]
    fn search_rejects_mixed_alphabets() {
        let query = one_hot("q", b"ACGT");
        let protein = Profile::new(
            "p",
            Alphabet::Protein,
            vec![vec![0.05; 20]; 3],
            vec![[0.0; 7]; 4],
        )
        .unwrap();
        let scorer = argmax_scorer(1.0, -1.0);
        assert!(search(&query, &[protein], &AlignConfig::local(), &scorer).is_err());
    }

    #[test]
    fn search_rejects_invalid_config() {
        let query = one_hot("q", b"ACGT");
        let scorer = argmax_scorer(1.0, -1.0);
        let config = AlignConfig::local().with_alternatives(0, 0.0);
        assert!(search(&query, &[one_hot("t", b"ACGT")], &config, &scorer).is_err());
    }

    #[test]
    fn realign_fills_best_hits() {
        let query = sequence_profile("q", b"ACGTACGT");
        let templates = templates();
        let scorer = Log2OddsScore::uniform(Alphabet::Dna);
        let config = AlignConfig::local();
        let mut hits = search(&query, &templates, &config, &scorer).unwrap();
        let n = realign(&query, &templates, &mut hits, &config, &scorer).unwrap();
        assert_eq!(n, hits.iter().filter(|h| h.rank == 0).count());
        for h in &hits {
            match &h.realigned {
                Some(r) => {
                    assert_eq!(h.rank, 0);
                    assert!(r.forward_score >= h.score - 1e-3);
                    assert_eq!(r.posteriors.len(), r.path.match_count());
                    assert!(r.posteriors.iter().all(|p| (0.0..=1.0).contains(p)));
                }
                None => assert!(h.rank > 0),
            }
        }
    }

    #[test]
    fn realign_skips_oversized_templates() {
        let query = sequence_profile("q", b"ACGT");
        let templates = vec![sequence_profile("t", b"ACGT")];
        let scorer = Log2OddsScore::uniform(Alphabet::Dna);
        let config = AlignConfig::local();
        let mut hits = search(&query, &templates, &config, &scorer).unwrap();
        assert!(!hits.is_empty());
        // 1 GiB / 8 / Lq=4 / 2^25 threads leaves room for one column.
        let tiny = config
            .clone()
            .with_max_memory_bytes(MIN_MEMORY_BYTES)
            .with_threads(1 << 25);
        assert_eq!(tiny.max_realign_template_len(query.len()), 1);
        let n = realign(&query, &templates, &mut hits, &tiny, &scorer).unwrap();
        assert_eq!(n, 0);
        assert!(hits.iter().all(|h| h.realigned.is_none()));
    }

    #[test]
    fn realign_rejects_unknown_template() {
        let query = one_hot("q", b"ACGT");
        let scorer = argmax_scorer(1.0, -1.0);
        let mut hits = vec![Hit {
            template: 3,
            rank: 0,
            score: 1.0,
            i: 1,
            j: 1,
            path: AlignmentPath::default(),
            realigned: None,
        }];
        assert!(realign(&query, &[], &mut hits, &AlignConfig::local(), &scorer).is_err());
    }
}
