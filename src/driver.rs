//! Top-level entry points.
//!
//! [`CacheJob`] is the low-level single-strand entry point: it owns a cache
//! and a cancellation handle a caller can use to cancel it from another
//! thread, and backs the [`partition_function`]/[`minimum_free_energy`]/
//! [`sample_one`] convenience functions.
//!
//! [`Job`]/[`JobKind`] is the batch-oriented envelope: a `(complex, kind)`
//! pair describing one computation to run, dispatched by [`run_job`] and
//! fanned out over a slice by [`submit_batch`] with a sink callback so a
//! caller can stream results (or partial failures) without collecting the
//! whole batch in memory first.

use rand::SeedableRng;
use rand_pcg::Pcg64;

use crate::block::Block;
use crate::cached_model::CachedModel;
use crate::concentration::{self, ComplexSpec, Method};
use crate::constants::Config;
use crate::dotparen;
use crate::error::Result;
use crate::matrix::Matrix;
use crate::model::Model;
use crate::pairlist::{PairList, Structure};
use crate::pairmatrix::{self, Sparsity};
use crate::recursions::Engine;
use crate::rig::{Mfe, Pf, Rig};
use crate::sample;
use crate::schedule::{fill_scheduled, Cancellation};
use crate::sequence::{Complex, Sequence};
use crate::subopt;

/// A single single-strand engine invocation: owns the cache, the config,
/// and a handle a caller can use to cancel it from another thread.
pub struct CacheJob<R: Rig> {
    model: CachedModel<R>,
    config: Config,
    cancellation: Cancellation,
}

impl<R: Rig + Sync> CacheJob<R> {
    /// Start a job over `model` with `config`.
    #[must_use]
    pub fn new(model: Model, config: Config) -> Self {
        log::info!("starting job at {:.2}K", model.conditions().temperature);
        Self {
            model: CachedModel::new(model),
            config,
            cancellation: Cancellation::new(),
        }
    }

    /// A handle that can cancel this job from another thread.
    #[must_use]
    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }

    /// Fill the full ensemble (or MFE table) for `seq`.
    pub fn fill(&mut self, seq: &Sequence) -> Result<Block<R::Value>>
    where
        R::Value: Send,
    {
        fill_scheduled(&mut self.model, seq, &self.config, &self.cancellation)
    }
}

/// Compute the partition function value for `seq` under `model`.
pub fn partition_function(model: Model, seq: &Sequence, config: &Config) -> Result<f64> {
    let mut job = CacheJob::<Pf>::new(model, config.clone());
    let block = job.fill(seq)?;
    let n = seq.len();
    Ok(job.model.free_energy(block.q[(0, n.saturating_sub(1))]))
}

/// Compute the minimum free energy for `seq` under `model`.
pub fn minimum_free_energy(model: Model, seq: &Sequence, config: &Config) -> Result<f64> {
    let mut job = CacheJob::<Mfe>::new(model, config.clone());
    let block = job.fill(seq)?;
    let n = seq.len();
    Ok(block.q[(0, n.saturating_sub(1))])
}

/// Draw one Boltzmann-distributed structure for `seq`, rendered as
/// dot-parens-plus, seeded deterministically from `seed` for reproducible
/// sampling.
pub fn sample_one(model: Model, seq: &Sequence, config: &Config, seed: u64) -> Result<String> {
    let mut job = CacheJob::<Pf>::new(model, config.clone());
    let block = job.fill(seq)?;
    let mut rng = Pcg64::seed_from_u64(seed);
    let state = sample::sample_structure(&mut rng, &job.model, seq, &block)?;
    let structure = Structure::new(state.pairs, vec![0, seq.len()])?;
    Ok(dotparen::render(&structure))
}

/// One batch computation: what complex to fold, and what to compute about
/// it.
#[derive(Debug, Clone)]
pub struct Job {
    /// The complex (one or more strands) this job is about.
    pub complex: Complex,
    /// What to compute.
    pub kind: JobKind,
}

/// What a [`Job`] asks [`run_job`] to compute, matching the envelope
/// `(complex, kind)` with `kind` one of a fixed set of operations.
#[derive(Debug, Clone)]
pub enum JobKind {
    /// The partition function's free energy.
    Pf,
    /// The minimum free energy.
    Mfe,
    /// The pair-probability matrix, pruned by `sparsity`.
    Pairs {
        /// Sparsity controls applied to the returned matrix.
        sparsity: Sparsity,
    },
    /// Every structure within `gap` of the minimum free energy, capped at
    /// `max_number` if given.
    Subopt {
        /// Energy window above the MFE to enumerate within.
        gap: f64,
        /// Cap on the number of structures returned.
        max_number: Option<usize>,
    },
    /// `number` independent Boltzmann samples, seeded deterministically
    /// from `seed`.
    Sample {
        /// How many structures to draw.
        number: usize,
        /// Seed for the deterministic RNG; sample `k` uses `seed + k`.
        seed: u64,
    },
    /// A quick energetic summary without the full ensemble or structure
    /// list.
    Costs,
}

/// A quick energetic summary for a complex: its minimum free energy and the
/// partition function's free energy, without materializing the full
/// ensemble, pair matrix, or structure list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostSummary {
    /// Minimum free energy.
    pub mfe: f64,
    /// `-RT ln Q`, the partition function expressed as a free energy.
    pub pf_free_energy: f64,
}

/// What [`run_job`] hands back for each [`JobKind`].
#[derive(Debug, Clone)]
pub enum JobOutput {
    /// [`JobKind::Pf`]'s result.
    Pf(f64),
    /// [`JobKind::Mfe`]'s result.
    Mfe(f64),
    /// [`JobKind::Pairs`]'s result.
    Pairs(Matrix<f64>),
    /// [`JobKind::Subopt`]'s result, each structure rendered as
    /// dot-parens-plus.
    Subopt(Vec<String>),
    /// [`JobKind::Sample`]'s result, each draw rendered as dot-parens-plus.
    Sample(Vec<String>),
    /// [`JobKind::Costs`]'s result.
    Costs(CostSummary),
}

fn fill_complex<R: Rig>(model: &Model, complex: &Complex) -> Result<(CachedModel<R>, Block<R::Value>)> {
    let mut cache: CachedModel<R> = CachedModel::new(model.clone());
    let block = Engine::new(&mut cache).fill_complex(complex)?;
    Ok((cache, block))
}

fn render_pairs(pairs: &[(usize, usize)], n: usize, nicks: &[usize]) -> Result<String> {
    let mut list = PairList::unpaired(n);
    for &(i, j) in pairs {
        list.set_pair(i, j);
    }
    let structure = Structure::new(list, nicks.to_vec())?;
    Ok(dotparen::render(&structure))
}

/// Run one [`Job`] to completion against `model`.
pub fn run_job(model: &Model, job: &Job) -> Result<JobOutput> {
    let n = job.complex.len();
    let nicks = job.complex.nicks();

    match &job.kind {
        JobKind::Pf => {
            let (cache, block) = fill_complex::<Pf>(model, &job.complex)?;
            let value = if n == 0 { Pf::one() } else { block.q[(0, n - 1)] };
            Ok(JobOutput::Pf(cache.free_energy(value)))
        }
        JobKind::Mfe => {
            let (_, block) = fill_complex::<Mfe>(model, &job.complex)?;
            let value = if n == 0 { Mfe::one() } else { block.q[(0, n - 1)] };
            Ok(JobOutput::Mfe(value))
        }
        JobKind::Pairs { sparsity } => {
            let (_, block) = fill_complex::<Pf>(model, &job.complex)?;
            Ok(JobOutput::Pairs(pairmatrix::pair_probabilities::<Pf>(&block, n, *sparsity)))
        }
        JobKind::Subopt { gap, max_number } => {
            let (cache, block) = fill_complex::<Mfe>(model, &job.complex)?;
            let seq = job.complex.flattened();
            let structures = subopt::enumerate::<Mfe>(&cache, &seq, &block, *gap, *max_number);
            let rendered = structures
                .iter()
                .map(|pairs| render_pairs(pairs, n, &nicks))
                .collect::<Result<Vec<_>>>()?;
            Ok(JobOutput::Subopt(rendered))
        }
        JobKind::Sample { number, seed } => {
            let (cache, block) = fill_complex::<Pf>(model, &job.complex)?;
            let seq = job.complex.flattened();
            let mut rendered = Vec::with_capacity(*number);
            for k in 0..*number {
                let mut rng = Pcg64::seed_from_u64(seed.wrapping_add(k as u64));
                let state = sample::sample_structure(&mut rng, &cache, &seq, &block)?;
                let structure = Structure::new(state.pairs, nicks.clone())?;
                rendered.push(dotparen::render(&structure));
            }
            Ok(JobOutput::Sample(rendered))
        }
        JobKind::Costs => {
            let (_, mfe_block) = fill_complex::<Mfe>(model, &job.complex)?;
            let (pf_cache, pf_block) = fill_complex::<Pf>(model, &job.complex)?;
            let mfe = if n == 0 { Mfe::one() } else { mfe_block.q[(0, n - 1)] };
            let pf_value = if n == 0 { Pf::one() } else { pf_block.q[(0, n - 1)] };
            Ok(JobOutput::Costs(CostSummary {
                mfe,
                pf_free_energy: pf_cache.free_energy(pf_value),
            }))
        }
    }
}

/// Run every job in `jobs` in order, reporting each result to `sink` as
/// `(index, result)` rather than collecting them, so a caller can stream
/// progress through a batch without holding every output in memory and can
/// keep going past individual job failures.
pub fn submit_batch(model: &Model, jobs: &[Job], mut sink: impl FnMut(usize, Result<JobOutput>)) {
    for (idx, job) in jobs.iter().enumerate() {
        let result = run_job(model, job);
        sink(idx, result);
    }
}

/// Solve for equilibrium complex concentrations in a tube, given total
/// per-strand concentrations and the candidate complexes present (each
/// described by its strand composition and equilibrium constant).
pub fn equilibrium_concentrations(
    total_strand_concentration: &[f64],
    complexes: &[ComplexSpec],
    config: &Config,
    method: Method,
) -> Result<Vec<f64>> {
    concentration::solve(total_strand_concentration, complexes, config.max_iters, config.tolerance, method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;
    use crate::model::{Conditions, ParameterTable};

    fn model() -> Model {
        let table = ParameterTable {
            stack: vec![vec![0.0; 4]; 4],
            hairpin_length: vec![5.0, 5.0, 5.0, 4.5, 4.0],
            bulge_length: (0..40).map(|i| 4.0 - i as f64 * 0.01).collect(),
            interior_length: (0..40).map(|i| i as f64 * 0.1).collect(),
            ninio: 0.5,
            ninio_cap: 3.0,
            log_loop_penalty: 1.75,
            multi_init: 3.4,
            multi_base: 0.0,
            multi_pair: 0.4,
            terminal_penalty: 0.5,
            join_penalty: 1.96,
            dangle5: vec![vec![0.0; 4]; 4],
            dangle3: vec![vec![0.0; 4]; 4],
            coaxial: vec![vec![0.0; 4]; 4],
        };
        Model::from_table(Alphabet::rna(), table, Conditions::default()).unwrap()
    }

    #[test]
    fn minimum_free_energy_of_unpairable_sequence_is_zero() {
        let seq = Alphabet::rna().sequence("AAAAAAAA").unwrap();
        let config = Config::default();
        let e = minimum_free_energy(model(), &seq, &config).unwrap();
        assert_eq!(e, 0.0);
    }

    #[test]
    fn sampled_structure_has_the_right_length() {
        let seq = Alphabet::rna().sequence("ACGUACGU").unwrap();
        let config = Config::default();
        let dp = sample_one(model(), &seq, &config, 42).unwrap();
        assert_eq!(dp.chars().count(), seq.len());
    }

    #[test]
    fn cache_job_can_be_cancelled_before_filling() {
        let mut job = CacheJob::<Pf>::new(model(), Config::default());
        job.cancellation().cancel();
        let seq = Alphabet::rna().sequence("ACGUACGU").unwrap();
        assert!(job.fill(&seq).is_err());
    }

    #[test]
    fn run_job_pf_and_mfe_agree_in_sign() {
        let a = Alphabet::rna();
        let complex = Complex::new(vec![a.sequence("ACGUACGUACGU").unwrap()]);
        let pf = run_job(&model(), &Job { complex: complex.clone(), kind: JobKind::Pf }).unwrap();
        let mfe = run_job(&model(), &Job { complex, kind: JobKind::Mfe }).unwrap();
        match (pf, mfe) {
            (JobOutput::Pf(pf), JobOutput::Mfe(mfe)) => assert!(pf <= mfe + 1e-6),
            _ => panic!("unexpected output variant"),
        }
    }

    #[test]
    fn run_job_pairs_rows_sum_to_one() {
        let a = Alphabet::rna();
        let complex = Complex::new(vec![a.sequence("ACGUACGUACGU").unwrap()]);
        let out = run_job(&model(), &Job { complex, kind: JobKind::Pairs { sparsity: Sparsity::default() } }).unwrap();
        let JobOutput::Pairs(p) = out else { panic!("unexpected output variant") };
        for i in 0..p.rows() {
            let row_sum: f64 = (0..p.cols()).map(|j| p[(i, j)]).sum();
            assert!((row_sum - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn run_job_subopt_includes_the_mfe_structure() {
        let a = Alphabet::rna();
        let complex = Complex::new(vec![a.sequence("ACGUACGUACGUACGU").unwrap()]);
        let out = run_job(
            &model(),
            &Job { complex, kind: JobKind::Subopt { gap: 0.0, max_number: Some(20) } },
        )
        .unwrap();
        let JobOutput::Subopt(structures) = out else { panic!("unexpected output variant") };
        assert!(!structures.is_empty());
    }

    #[test]
    fn run_job_sample_draws_the_requested_number() {
        let a = Alphabet::rna();
        let complex = Complex::new(vec![a.sequence("ACGUACGUACGU").unwrap()]);
        let out = run_job(&model(), &Job { complex, kind: JobKind::Sample { number: 4, seed: 1 } }).unwrap();
        let JobOutput::Sample(draws) = out else { panic!("unexpected output variant") };
        assert_eq!(draws.len(), 4);
    }

    #[test]
    fn run_job_costs_matches_pf_and_mfe_jobs() {
        let a = Alphabet::rna();
        let complex = Complex::new(vec![a.sequence("ACGUACGUACGU").unwrap()]);
        let costs = run_job(&model(), &Job { complex: complex.clone(), kind: JobKind::Costs }).unwrap();
        let JobOutput::Costs(summary) = costs else { panic!("unexpected output variant") };
        let mfe = run_job(&model(), &Job { complex, kind: JobKind::Mfe }).unwrap();
        let JobOutput::Mfe(mfe) = mfe else { panic!("unexpected output variant") };
        assert_eq!(summary.mfe, mfe);
    }

    #[test]
    fn submit_batch_reports_every_job_in_order() {
        let a = Alphabet::rna();
        let complex = Complex::new(vec![a.sequence("ACGUACGU").unwrap()]);
        let jobs = vec![
            Job { complex: complex.clone(), kind: JobKind::Pf },
            Job { complex, kind: JobKind::Mfe },
        ];
        let mut seen = Vec::new();
        submit_batch(&model(), &jobs, |idx, result| seen.push((idx, result.is_ok())));
        assert_eq!(seen, vec![(0, true), (1, true)]);
    }

    #[test]
    fn equilibrium_concentrations_conserves_mass() {
        let complexes = vec![
            ComplexSpec { counts: vec![1], equilibrium_constant: 1.0 },
            ComplexSpec { counts: vec![2], equilibrium_constant: 1e6 },
        ];
        let config = Config::default();
        let out = equilibrium_concentrations(&[1e-6], &complexes, &config, Method::Dogleg).unwrap();
        let conservation = out[0].exp() + 2.0 * out[1].exp();
        assert!((conservation - 1e-6).abs() / 1e-6 < 1e-3);
    }
}
