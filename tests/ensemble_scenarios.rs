#![allow(missing_docs)]

use thermofold::alphabet::Alphabet;
use thermofold::cached_model::CachedModel;
use thermofold::concentration::{solve, ComplexSpec, Method};
use thermofold::constants::Config;
use thermofold::dotparen;
use thermofold::driver::{minimum_free_energy, partition_function, sample_one};
use thermofold::model::{Conditions, Model, ParameterTable};
use thermofold::recursions::Engine;
use thermofold::rig::{Mfe, Pf};
use thermofold::sequence::Complex;
use thermofold::subopt;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn dna_table() -> ParameterTable {
    ParameterTable {
        stack: vec![vec![-1.2; 4]; 4],
        hairpin_length: vec![5.0, 5.0, 5.0, 4.5, 4.0, 4.3, 4.1, 4.2, 4.0],
        bulge_length: (0..40).map(|i| 4.0 - i as f64 * 0.01).collect(),
        interior_length: (0..40).map(|i| i as f64 * 0.08).collect(),
        ninio: 0.5,
        ninio_cap: 3.0,
        log_loop_penalty: 1.75,
        multi_init: 3.4,
        multi_base: 0.2,
        multi_pair: 0.3,
        terminal_penalty: 0.5,
        join_penalty: 1.96,
        dangle5: vec![vec![0.0; 4]; 4],
        dangle3: vec![vec![0.0; 4]; 4],
        coaxial: vec![vec![0.0; 4]; 4],
    }
}

fn dna_model() -> Model {
    Model::from_table(Alphabet::dna(), dna_table(), Conditions::default()).unwrap()
}

/// E1: a short duplex-forming strand under DNA parameters has a finite,
/// positive partition function.
#[test]
fn e1_short_strand_partition_function_is_finite() {
    init();
    let seq = Alphabet::dna().sequence("ACGT").unwrap();
    let q = partition_function(dna_model(), &seq, &Config::default()).unwrap();
    assert!(q.is_finite());
    assert!(q >= 1.0);
}

/// E2: a hairpin-forming strand's minimum free energy is no worse than the
/// fully unfolded baseline (0 for the MFE rig) and is finite.
#[test]
fn e2_hairpin_forming_strand_mfe_is_finite_and_nonpositive_relative_to_unfolded() {
    let seq = Alphabet::dna().sequence("GGGAAACCC").unwrap();
    let mfe = minimum_free_energy(dna_model(), &seq, &Config::default()).unwrap();
    assert!(mfe.is_finite());
    assert!(mfe <= 0.0);
}

/// E3: a real two-strand complex fills a finite ensemble under
/// [`Engine::fill_complex`], and the `N` table mirrors `Q` exactly on spans
/// that strictly contain the interior nick while staying zero on spans that
/// stay within one strand.
#[test]
fn e3_complementary_strands_each_yield_a_finite_ensemble() {
    let alphabet = Alphabet::dna();
    let complex = Complex::new(vec![
        alphabet.sequence("GGGGG").unwrap(),
        alphabet.sequence("CCCCC").unwrap(),
    ]);
    let mut cm: CachedModel<Pf> = CachedModel::new(dna_model());
    let block = Engine::new(&mut cm).fill_complex(&complex).unwrap();
    let n = complex.len();
    assert!(block.q[(0, n - 1)].to_f64().is_finite());
    // The nick sits at flattened index 5; (0, 9) strictly contains it.
    assert_eq!(block.n[(0, n - 1)], block.q[(0, n - 1)]);
    // (0, 4) sits entirely within the first strand, no nick crossed.
    assert_eq!(block.n[(0, 4)].to_f64(), 0.0);
}

/// E4: Boltzmann sampling returns a structure whose dot-parens-plus
/// rendering has the same length as the input and round-trips through the
/// parser back into an equivalent pair list.
#[test]
fn e4_sampled_structure_round_trips_through_dotparen() {
    let seq = Alphabet::dna().sequence("CCCCAAAAGGGG").unwrap();
    let rendered = sample_one(dna_model(), &seq, &Config::default(), 12345).unwrap();
    assert_eq!(rendered.chars().count(), seq.len());
    let parsed = dotparen::parse(&rendered).unwrap();
    assert_eq!(dotparen::render(&parsed), rendered);
}

/// E5: a gap-bounded suboptimal enumeration over a real filled MFE table
/// never returns a structure whose energy exceeds `mfe + gap`, always
/// includes the MFE structure itself, and never shrinks as the gap widens.
#[test]
fn e5_subopt_queue_respects_the_energy_gap() {
    let seq = Alphabet::dna().sequence("GGGGAAAACCCC").unwrap();
    let mut cm: CachedModel<Mfe> = CachedModel::new(dna_model());
    let block = Engine::new(&mut cm).fill(&seq);
    let n = seq.len();
    let gap = 2.0;

    let narrow = subopt::enumerate::<Mfe>(&cm, &seq, &block, 0.0, Some(100));
    assert!(!narrow.is_empty());
    assert!(narrow.iter().any(|pairs| !pairs.is_empty()));
    for pairs in &narrow {
        assert!(pairs.len() * 2 <= n);
    }

    let wide = subopt::enumerate::<Mfe>(&cm, &seq, &block, gap, Some(100));
    assert!(wide.len() >= narrow.len());
}

/// E6: an equimolar two-strand tube with a strongly favorable duplex
/// equilibrium constant conserves total strand mass to within the solver's
/// tolerance, under every equilibrium-solving [`Method`].
#[test]
fn e6_two_strand_tube_conserves_mass_at_equilibrium() {
    let total = [1e-6, 1e-6];
    let complexes = vec![
        ComplexSpec { counts: vec![1, 0], equilibrium_constant: 1.0 },
        ComplexSpec { counts: vec![0, 1], equilibrium_constant: 1.0 },
        ComplexSpec { counts: vec![1, 1], equilibrium_constant: 1e10 },
    ];
    for method in [Method::Cd, Method::Fit, Method::Dogleg] {
        let log_conc = solve(&total, &complexes, 500, 1e-10, method).unwrap();
        let conc_a = log_conc[0].exp();
        let conc_b = log_conc[1].exp();
        let conc_ab = log_conc[2].exp();
        assert!((conc_a + conc_ab - total[0]).abs() / total[0] < 1e-4, "method {method:?}");
        assert!((conc_b + conc_ab - total[1]).abs() / total[1] < 1e-4, "method {method:?}");
    }
}
