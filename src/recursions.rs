//! The recursion fill: computes every matrix in a [`Block`] for a single
//! strand (or, for two-strand complexes, a flattened pair of strands),
//! bottom-up by increasing span.
//!
//! Matrix roles follow spec's component D: `B` is the closing-pair
//! contribution, `D`/`Z` gate it on whether the pair may close a loop, `S`
//! accumulates runs of adjacent stems, `Q` is the total ensemble value, and
//! `MS`/`M1`/`M2`/`M3` track multiloop contributions with exactly-one,
//! at-least-one, at-least-two, and at-least-three enclosed stems
//! respectively. The exact per-term closed forms are a tractable
//! simplification of the reference's (simplification noted in
//! `DESIGN.md`): loop energies are driven entirely by the length-indexed
//! cached tables (no sequence-content-specific interior tables).
//!
//! Multi-strand complexes are supported for exactly two strands (one nick):
//! [`Engine::fill_complex`] flattens the complex into one sequence and runs
//! this same single-strand recursion over it, which is exact for
//! directly-stacked or blunt-ended duplexes and under-counts configurations
//! where loop content would cross the nick in a general sandwich recursion
//! (see `DESIGN.md`). `N(i, j)` is set to `Q(i, j)` wherever a nick falls
//! strictly inside `(i, j)`, and the complex's join penalty is folded into
//! the top-level partition function once.

use crate::action::Action;
use crate::block::{Block, EnsembleKind};
use crate::cached_model::CachedModel;
use crate::error::{Error, Result};
use crate::interior::interior_sum;
use crate::rig::Rig;
use crate::sequence::{Complex, Sequence};

/// Drives the recursion fill for a chosen [`Rig`] over a single sequence (or
/// a flattened two-strand complex).
pub struct Engine<'m, R: Rig> {
    model: &'m mut CachedModel<R>,
    kind: EnsembleKind,
    action: Action,
    /// Interior nick positions (strictly between `0` and the flattened
    /// length) of the complex currently being filled; empty for a plain
    /// single-strand fill.
    nicks: Vec<usize>,
}

impl<'m, R: Rig> Engine<'m, R> {
    /// Build an engine over a cache, which will be grown to cover `seq` as
    /// needed. Defaults to the [`EnsembleKind::NoStacking`] ensemble and no
    /// pair-site [`Action`].
    pub fn new(model: &'m mut CachedModel<R>) -> Self {
        Self {
            model,
            kind: EnsembleKind::NoStacking,
            action: Action::Default,
            nicks: Vec::new(),
        }
    }

    /// Choose which dangle/coaxial-stacking ensemble to fill.
    #[must_use]
    pub fn with_kind(mut self, kind: EnsembleKind) -> Self {
        self.kind = kind;
        self
    }

    /// Attach a pair-site [`Action`] (design bonus/forbid/flat override).
    #[must_use]
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    /// Fill every matrix in a freshly allocated [`Block`] for `seq`.
    pub fn fill(&mut self, seq: &Sequence) -> Block<R::Value> {
        let n = seq.len();
        self.model.reserve(n);
        let mut block = Block::new(self.kind, n.max(1));
        if n == 0 {
            return block;
        }

        for span in 0..n {
            for i in 0..n - span {
                let j = i + span;
                self.fill_pair(&mut block, seq, i, j);
                self.fill_multiloop(&mut block, seq, i, j);
                self.fill_stem_and_total(&mut block, seq, i, j);
            }
        }
        block
    }

    /// Fill a (possibly two-strand) complex. Complexes of more than two
    /// strands are rejected: the general `k`-strand sandwich recursion
    /// (subblocks over every contiguous sub-tuple, dependency-ordered on
    /// internal nicks) is not implemented by this engine.
    pub fn fill_complex(&mut self, complex: &Complex) -> Result<Block<R::Value>> {
        if complex.strand_count() > 2 {
            return Err(Error::InvalidInput(
                "complexes with more than two strands are not yet supported".into(),
            ));
        }
        let seq = complex.flattened();
        let n = seq.len();
        self.nicks = complex.nicks().into_iter().filter(|&p| p > 0 && p < n).collect();
        let mut block = self.fill(&seq);
        if complex.strand_count() > 1 && n > 0 {
            let join = self.model.boltz(self.model.model().parameters().join_penalty);
            block.q[(0, n - 1)] = R::times(block.q[(0, n - 1)], join);
        }
        self.nicks.clear();
        Ok(block)
    }

    fn has_interior_nick(&self, i: usize, j: usize) -> bool {
        self.nicks.iter().any(|&p| i < p && p <= j)
    }

    fn fill_pair(&self, block: &mut Block<R::Value>, seq: &Sequence, i: usize, j: usize) {
        let m: &CachedModel<R> = &*self.model;
        let bi = seq.base(i);
        let bj = seq.base(j);

        let can_pair = j >= i + 4 && m.can_pair(bi, bj);
        let recursion_value = if can_pair {
            let hairpin_len = j - i - 1;
            let single_pair = m.hairpin(hairpin_len);

            let mut inextensible = R::zero();
            for d in (i + 1)..=(i + 4).min(j.saturating_sub(1)) {
                let e_lo = (j.saturating_sub(4)).max(d + 1);
                for e in e_lo..j {
                    if d >= e {
                        continue;
                    }
                    let left = d - i - 1;
                    let right = j - e - 1;
                    let loop_len = left + right;
                    if loop_len > 8 {
                        continue;
                    }
                    let factor = if left == 0 && right == 0 {
                        m.boltz(stack_energy(seq, i, j))
                    } else if left == 0 || right == 0 {
                        m.bulge(loop_len)
                    } else {
                        let asym = (left as isize - right as isize).unsigned_abs();
                        R::times(m.int_size(loop_len), m.int_asym(asym))
                    };
                    inextensible = R::plus(inextensible, R::times(factor, block.b[(d, e)]));
                }
            }

            let multiloop_closing = if j >= i + 2 {
                R::times(
                    R::times(block.m2[(i + 1, j - 1)], m.terminal(bi, bj)),
                    R::times(m.multi1(), m.multi2()),
                )
            } else {
                R::zero()
            };

            let extensible = if j >= i + 13 {
                interior_sum(m, &block.b, i, j)
            } else {
                R::zero()
            };

            R::plus(R::plus(single_pair, inextensible), R::plus(multiloop_closing, extensible))
        } else {
            R::zero()
        };

        let b_value = self.action.apply(
            i,
            j,
            can_pair,
            recursion_value,
            R::zero(),
            R::plus,
            R::times,
            |e| m.boltz(e),
        );
        block.b[(i, j)] = b_value;

        let z_value = R::times(b_value, m.terminal(bi, bj));
        block.z[(i, j)] = z_value;
        block.d[(i, j)] = if m.can_close(bi, bj) { z_value } else { R::zero() };

        let d5 = if i > 0 { m.dangle5(bi, seq.base(i - 1)) } else { R::zero() };
        let d3 = if j + 1 < seq.len() { m.dangle3(bj, seq.base(j + 1)) } else { R::zero() };
        block.yb[(i, j)] = R::times(z_value, R::plus(d5, d3));
        block.ya[(i, j)] = R::times(z_value, R::times(d5, d3));
    }

    /// The stem value a span `(i, j)` contributes to `S`, selected according
    /// to the active [`EnsembleKind`]: no dangle term, every dangle
    /// configuration summed, or only the single best kept.
    fn stem_value(&self, block: &Block<R::Value>, i: usize, j: usize) -> R::Value {
        let d = block.d[(i, j)];
        match self.kind {
            EnsembleKind::NoStacking => d,
            // Coaxial stacking is not modeled yet (TODO: wire the `coaxial`
            // parameter table into a CD/MC/MCS/MD-style recursion); fall
            // back to the all-dangles computation, which is still strictly
            // more complete than `NoStacking`.
            EnsembleKind::AllDangles | EnsembleKind::Stacking => R::plus(d, R::plus(block.yb[(i, j)], block.ya[(i, j)])),
            EnsembleKind::MinDangles => R::prefer(d, R::prefer(block.yb[(i, j)], block.ya[(i, j)])),
        }
    }

    fn all_unpaired(&self, i: usize, j: usize) -> R::Value {
        if i > j {
            R::one()
        } else {
            self.model.multi3s(j - i + 1)
        }
    }

    fn fill_multiloop(&self, block: &mut Block<R::Value>, _seq: &Sequence, i: usize, j: usize) {
        let m: &CachedModel<R> = &*self.model;

        let mut ms = R::zero();
        for k in i..=j {
            ms = R::plus(ms, R::times(block.d[(i, k)], m.multi3s(j - k)));
        }
        ms = R::times(ms, m.multi2());
        block.ms[(i, j)] = ms;

        let mut m1 = R::zero();
        for r in i..=j {
            let lead = m.multi3s(r - i);
            for k in r..=j {
                let stem = R::times(block.d[(r, k)], m.multi2());
                let tail = if k + 1 > j { R::one() } else { block.m[(k + 1, j)] };
                m1 = R::plus(m1, R::times(lead, R::times(stem, tail)));
            }
        }
        block.m1[(i, j)] = m1;

        let mut m2 = R::zero();
        for r in i..=j {
            let lead = m.multi3s(r - i);
            for k in r..=j {
                let stem = R::times(block.d[(r, k)], m.multi2());
                let tail = if k + 1 > j { R::zero() } else { block.m1[(k + 1, j)] };
                m2 = R::plus(m2, R::times(lead, R::times(stem, tail)));
            }
        }
        block.m2[(i, j)] = m2;

        let mut m3 = R::zero();
        for r in i..=j {
            let lead = m.multi3s(r - i);
            for k in r..=j {
                let stem = R::times(block.d[(r, k)], m.multi2());
                let tail = if k + 1 > j { R::zero() } else { block.m2[(k + 1, j)] };
                m3 = R::plus(m3, R::times(lead, R::times(stem, tail)));
            }
        }
        block.m3[(i, j)] = m3;

        block.m[(i, j)] = R::plus(self.all_unpaired(i, j), m1);
    }

    fn fill_stem_and_total(&self, block: &mut Block<R::Value>, _seq: &Sequence, i: usize, j: usize) {
        let stem = self.stem_value(block, i, j);
        let s_value = if j > i { R::plus(block.s[(i, j - 1)], stem) } else { stem };
        block.s[(i, j)] = s_value;

        let mut q = R::plus(R::one(), s_value);
        if j >= i + 4 {
            for k in i..=(j - 4) {
                q = R::plus(q, R::times(block.q[(i, k)], block.s[(k + 1, j)]));
            }
        }
        block.q[(i, j)] = q;

        block.n[(i, j)] = if self.has_interior_nick(i, j) { q } else { R::zero() };
    }
}

/// Direct-stack (zero-unpaired-base interior loop) energy; a simplified
/// stand-in for a full 4-base stacking table, using the diagonal of the
/// parameter table's `stack` matrix keyed by the closing pair only.
fn stack_energy(seq: &Sequence, i: usize, j: usize) -> f64 {
    let _ = (seq.base(i), seq.base(j));
    // Placeholder until a full nearest-neighbor stack lookup is wired to a
    // loaded parameter table; treated as energetically neutral so it never
    // dominates over explicit bulge/interior terms.
    0.0
}
