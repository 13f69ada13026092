//! Boltzmann sampling: draw structures from the equilibrium ensemble
//! described by a filled [`Block`], replaying the same forward
//! decomposition the recursion used to fill each matrix — see
//! [`crate::decomposition`] — using the standard stochastic-traceback
//! technique: weight each decomposition alternative by its contribution to
//! the parent cell's value, then draw and recurse.

use rand::Rng;

use crate::backtrack::{BacktrackState, Source};
use crate::block::Block;
use crate::cached_model::CachedModel;
use crate::decomposition::alternatives;
use crate::error::{Error, Result};
use crate::rig::Rig;
use crate::sequence::Sequence;

/// How many times to retry a draw whose cumulative weight comes out
/// non-positive (can happen with extreme energies and floating-point
/// cancellation) before giving up.
const RETRY_LIMIT: usize = 3;

/// One weighted alternative in a sampling decomposition: `weight` is this
/// alternative's unnormalized contribution, `follow_up` describes what to
/// push onto the backtrack stack if it is chosen.
pub struct Choice {
    /// Unnormalized Boltzmann weight of this alternative.
    pub weight: f64,
    /// Segments to push if this alternative is drawn.
    pub follow_up: Vec<(usize, usize, Source)>,
    /// Base pair to commit if this alternative is drawn, if any.
    pub pair: Option<(usize, usize)>,
}

/// Given the total weight of a cell and its enumerated alternatives, draw
/// one according to its relative weight.
pub fn sample_choice<RNG: Rng + ?Sized>(rng: &mut RNG, total: f64, choices: &[Choice]) -> Result<usize> {
    for _ in 0..RETRY_LIMIT {
        if total <= 0.0 || !total.is_finite() {
            break;
        }
        let draw = rng.gen_range(0.0..total);
        let mut acc = 0.0;
        for (idx, choice) in choices.iter().enumerate() {
            acc += choice.weight;
            if draw < acc {
                return Ok(idx);
            }
        }
        // Floating-point rounding let the draw exceed the accumulated sum;
        // retry with a fresh draw rather than silently picking the last
        // alternative, which would bias sampling toward it.
    }
    Err(Error::EquilibriumSolve {
        iterations: RETRY_LIMIT,
        reason: "sampling weights summed to a non-positive or non-finite total".into(),
    })
}

/// Draw one structure from the ensemble described by `block`, for `seq`,
/// using `rng`. Replays the hairpin/stack/bulge/interior/multiloop forward
/// contributions the recursion computed, not just the trivial
/// unpaired-vs-single-stem split.
pub fn sample_structure<R: Rig, RNG: Rng + ?Sized>(
    rng: &mut RNG,
    model: &CachedModel<R>,
    seq: &Sequence,
    block: &Block<R::Value>,
) -> Result<BacktrackState> {
    let n = seq.len();
    let mut state = BacktrackState::new(n, Source::Total);
    while let Some(seg) = state.pop() {
        if seg.is_empty() {
            continue;
        }
        let choices: Vec<Choice> = alternatives::<R>(model, seq, block, &seg)
            .into_iter()
            .map(|alt| Choice {
                weight: alt.value.into(),
                follow_up: alt.follow_up,
                pair: alt.pair,
            })
            .collect();
        let total: f64 = choices.iter().map(|c| c.weight).sum();
        if choices.is_empty() || total <= 0.0 {
            continue;
        }
        let picked = sample_choice(rng, total, &choices)?;
        for (i, j, src) in &choices[picked].follow_up {
            state.push(*i, *j, *src);
        }
        if let Some((i, j)) = choices[picked].pair {
            state.commit_pair(i, j);
        }
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;
    use crate::model::{Conditions, Model, ParameterTable};
    use crate::recursions::Engine;
    use crate::rig::Pf;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn model() -> Model {
        let table = ParameterTable {
            stack: vec![vec![0.0; 4]; 4],
            hairpin_length: vec![5.0, 5.0, 5.0, 4.5, 4.0, 4.3, 4.1],
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
    fn sample_choice_picks_the_only_nonzero_alternative() {
        let mut rng = Pcg64::seed_from_u64(7);
        let choices = [
            Choice { weight: 0.0, follow_up: vec![], pair: None },
            Choice { weight: 5.0, follow_up: vec![], pair: None },
        ];
        let idx = sample_choice(&mut rng, 5.0, &choices).unwrap();
        assert_eq!(idx, 1);
    }

    #[test]
    fn sample_choice_rejects_nonpositive_total() {
        let mut rng = Pcg64::seed_from_u64(1);
        let choices: [Choice; 0] = [];
        assert!(sample_choice(&mut rng, 0.0, &choices).is_err());
    }

    #[test]
    fn sampled_structure_covers_every_position() {
        let mut cm: CachedModel<Pf> = CachedModel::new(model());
        let seq = Alphabet::rna().sequence("ACGUACGUACGU").unwrap();
        let block = Engine::new(&mut cm).fill(&seq);
        let mut rng = Pcg64::seed_from_u64(42);
        let state = sample_structure(&mut rng, &cm, &seq, &block).unwrap();
        assert_eq!(state.pairs.as_slice().len(), seq.len());
    }

    #[test]
    fn sampled_pairs_are_mutually_consistent() {
        let mut cm: CachedModel<Pf> = CachedModel::new(model());
        let seq = Alphabet::rna().sequence("ACGUACGUACGUACGU").unwrap();
        let block = Engine::new(&mut cm).fill(&seq);
        let mut rng = Pcg64::seed_from_u64(3);
        let state = sample_structure(&mut rng, &cm, &seq, &block).unwrap();
        for i in 0..seq.len() {
            if let Some(j) = state.pairs.partner(i) {
                assert_eq!(state.pairs.partner(j), Some(i));
            }
        }
    }
}
