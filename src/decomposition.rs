//! Forward-contribution decomposition, shared by every consumer that needs
//! to walk *how* a filled [`Block`] arrived at a cell's value rather than
//! just the value itself: Boltzmann sampling ([`crate::sample`]) draws one
//! alternative per cell weighted by its contribution; suboptimal
//! enumeration ([`crate::subopt`]) forks into every alternative and tracks
//! the resulting energy. Both walk the exact same set of alternatives per
//! [`Source`], recomputed here from the model and sequence rather than
//! read back out of `block.b` (so neither replays a non-default
//! [`Action`](crate::action::Action) pair-site override — see
//! `recursions.rs`'s `fill_pair`, which this mirrors).

use crate::backtrack::{Segment, Source};
use crate::block::{Block, BlockMatrices, EnsembleKind};
use crate::cached_model::CachedModel;
use crate::rig::Rig;
use crate::sequence::Sequence;

/// One alternative way a cell's value could have been produced: `value` is
/// this alternative's own contribution (in the rig's accumulation domain),
/// `follow_up` is what remains to be resolved if it is chosen, and `pair`
/// is the base pair to commit, if this alternative closes one.
pub struct Alternative<V> {
    pub value: V,
    pub follow_up: Vec<(usize, usize, Source)>,
    pub pair: Option<(usize, usize)>,
}

/// The value a [`Block`] already has stored for `seg`, i.e. the sum (or
/// min, for the MFE rig) of every alternative [`alternatives`] would
/// enumerate for the same segment.
#[must_use]
pub fn current_value<R: Rig>(block: &Block<R::Value>, seg: &Segment) -> R::Value {
    match seg.source {
        Source::Total => block.q[(seg.i, seg.j)],
        Source::Stem => block.s[(seg.i, seg.j)],
        Source::Pair => block.b[(seg.i, seg.j)],
        Source::Multi => block.m[(seg.i, seg.j)],
        Source::Multi1 => block.m1[(seg.i, seg.j)],
        Source::Multi2 => block.m2[(seg.i, seg.j)],
        Source::Multi3 => block.m3[(seg.i, seg.j)],
    }
}

/// Enumerate every alternative contributing to `seg`'s stored value.
#[must_use]
pub fn alternatives<R: Rig>(
    model: &CachedModel<R>,
    seq: &Sequence,
    block: &Block<R::Value>,
    seg: &Segment,
) -> Vec<Alternative<R::Value>> {
    match seg.source {
        Source::Total => total_alternatives::<R>(block, seg.i, seg.j),
        Source::Stem => stem_alternatives::<R>(block, seg.i, seg.j),
        Source::Pair => pair_alternatives::<R>(model, seq, block, seg.i, seg.j),
        Source::Multi => multi_alternatives::<R>(model, block, seg.i, seg.j),
        Source::Multi1 => multi1_alternatives::<R>(model, block, seg.i, seg.j),
        Source::Multi2 => multi2_alternatives::<R>(model, block, seg.i, seg.j),
        Source::Multi3 => multi3_alternatives::<R>(model, block, seg.i, seg.j),
    }
}

fn total_alternatives<R: Rig>(block: &Block<R::Value>, i: usize, j: usize) -> Vec<Alternative<R::Value>> {
    let mut out = vec![Alternative {
        value: R::one(),
        follow_up: vec![],
        pair: None,
    }];
    out.push(Alternative {
        value: block.s[(i, j)],
        follow_up: vec![(i, j, Source::Stem)],
        pair: None,
    });
    if j >= i + 4 {
        for k in i..=(j - 4) {
            out.push(Alternative {
                value: R::times(block.q[(i, k)], block.s[(k + 1, j)]),
                follow_up: vec![(i, k, Source::Total), (k + 1, j, Source::Stem)],
                pair: None,
            });
        }
    }
    out
}

fn stem_value<R: Rig>(block: &Block<R::Value>, i: usize, j: usize) -> R::Value {
    let d = block.d[(i, j)];
    match block.kind() {
        EnsembleKind::NoStacking => d,
        EnsembleKind::AllDangles | EnsembleKind::Stacking => R::plus(d, R::plus(block.yb[(i, j)], block.ya[(i, j)])),
        EnsembleKind::MinDangles => R::prefer(d, R::prefer(block.yb[(i, j)], block.ya[(i, j)])),
    }
}

fn stem_alternatives<R: Rig>(block: &Block<R::Value>, i: usize, j: usize) -> Vec<Alternative<R::Value>> {
    let mut out = Vec::new();
    if j > i {
        out.push(Alternative {
            value: block.s[(i, j - 1)],
            follow_up: vec![(i, j - 1, Source::Stem)],
            pair: None,
        });
    }
    out.push(Alternative {
        value: stem_value::<R>(block, i, j),
        follow_up: vec![(i, j, Source::Pair)],
        pair: None,
    });
    out
}

fn pair_alternatives<R: Rig>(
    model: &CachedModel<R>,
    seq: &Sequence,
    block: &Block<R::Value>,
    i: usize,
    j: usize,
) -> Vec<Alternative<R::Value>> {
    let bi = seq.base(i);
    let bj = seq.base(j);
    if j < i + 4 || !model.can_pair(bi, bj) {
        return Vec::new();
    }

    let mut out = Vec::new();
    let hairpin_len = j - i - 1;
    out.push(Alternative {
        value: model.hairpin(hairpin_len),
        follow_up: vec![],
        pair: Some((i, j)),
    });

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
            let factor: R::Value = if left == 0 && right == 0 {
                model.boltz(0.0)
            } else if left == 0 || right == 0 {
                model.bulge(loop_len)
            } else {
                let asym = (left as isize - right as isize).unsigned_abs();
                R::times(model.int_size(loop_len), model.int_asym(asym))
            };
            out.push(Alternative {
                value: R::times(factor, block.b[(d, e)]),
                follow_up: vec![(d, e, Source::Pair)],
                pair: Some((i, j)),
            });
        }
    }

    if j >= i + 2 {
        out.push(Alternative {
            value: R::times(
                R::times(block.m2[(i + 1, j - 1)], model.terminal(bi, bj)),
                R::times(model.multi1(), model.multi2()),
            ),
            follow_up: vec![(i + 1, j - 1, Source::Multi2)],
            pair: Some((i, j)),
        });
    }

    if j >= i + 13 {
        for d in (i + 5)..j.saturating_sub(4) {
            for e in (d + 3)..j {
                let loop_len = (d - i - 1) + (j - e - 1);
                if loop_len <= 8 {
                    continue;
                }
                let asym = (d - i) as isize - (j - e) as isize;
                let factor = R::times(model.int_size(loop_len), model.int_asym(asym.unsigned_abs()));
                out.push(Alternative {
                    value: R::times(factor, block.b[(d, e)]),
                    follow_up: vec![(d, e, Source::Pair)],
                    pair: Some((i, j)),
                });
            }
        }
    }

    out
}

fn all_unpaired_value<R: Rig>(model: &CachedModel<R>, i: usize, j: usize) -> R::Value {
    if i > j {
        R::one()
    } else {
        model.multi3s(j - i + 1)
    }
}

fn multi_alternatives<R: Rig>(model: &CachedModel<R>, block: &Block<R::Value>, i: usize, j: usize) -> Vec<Alternative<R::Value>> {
    vec![
        Alternative {
            value: all_unpaired_value::<R>(model, i, j),
            follow_up: vec![],
            pair: None,
        },
        Alternative {
            value: block.m1[(i, j)],
            follow_up: vec![(i, j, Source::Multi1)],
            pair: None,
        },
    ]
}

fn multi1_alternatives<R: Rig>(model: &CachedModel<R>, block: &Block<R::Value>, i: usize, j: usize) -> Vec<Alternative<R::Value>> {
    let mut out = Vec::new();
    for r in i..=j {
        let lead = model.multi3s(r - i);
        for k in r..=j {
            let stem = R::times(block.d[(r, k)], model.multi2());
            let (tail, tail_seg) = if k + 1 > j {
                (R::one(), None)
            } else {
                (block.m[(k + 1, j)], Some((k + 1, j, Source::Multi)))
            };
            let mut follow_up = vec![(r, k, Source::Pair)];
            if let Some(seg) = tail_seg {
                follow_up.push(seg);
            }
            out.push(Alternative {
                value: R::times(lead, R::times(stem, tail)),
                follow_up,
                pair: None,
            });
        }
    }
    out
}

fn multi2_alternatives<R: Rig>(model: &CachedModel<R>, block: &Block<R::Value>, i: usize, j: usize) -> Vec<Alternative<R::Value>> {
    let mut out = Vec::new();
    for r in i..=j {
        let lead = model.multi3s(r - i);
        for k in r..=j {
            if k + 1 > j {
                continue;
            }
            let stem = R::times(block.d[(r, k)], model.multi2());
            let tail = block.m1[(k + 1, j)];
            out.push(Alternative {
                value: R::times(lead, R::times(stem, tail)),
                follow_up: vec![(r, k, Source::Pair), (k + 1, j, Source::Multi1)],
                pair: None,
            });
        }
    }
    out
}

fn multi3_alternatives<R: Rig>(model: &CachedModel<R>, block: &Block<R::Value>, i: usize, j: usize) -> Vec<Alternative<R::Value>> {
    let mut out = Vec::new();
    for r in i..=j {
        let lead = model.multi3s(r - i);
        for k in r..=j {
            if k + 1 > j {
                continue;
            }
            let stem = R::times(block.d[(r, k)], model.multi2());
            let tail = block.m2[(k + 1, j)];
            out.push(Alternative {
                value: R::times(lead, R::times(stem, tail)),
                follow_up: vec![(r, k, Source::Pair), (k + 1, j, Source::Multi2)],
                pair: None,
            });
        }
    }
    out
}
