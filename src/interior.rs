//! Extensible interior-loop summation: for closing pair `(i, j)` with total
//! loop length beyond the inextensible 4+4 window, sum the contribution of
//! every inner closing pair `(d, e)` weighted by its interior-loop size and
//! asymmetry factors.
//!
//! A previous revision of this module additionally carried a rolling
//! three-diagonal buffer (`FastInterior`) meant to amortize this `O(span)`
//! per-cell scan into an `O(1)` update by reusing the previous diagonal's
//! partial sums. That rolling-buffer path never actually read from the
//! previous diagonals it kept around — it recomputed the direct sum and
//! stashed the result, so it was strictly dead weight. It has been removed;
//! [`interior_sum`] is the only summation this crate performs, and is the
//! correctness baseline the removed code was (trivially) checked against.

use crate::cached_model::CachedModel;
use crate::matrix::Triangle;
use crate::rig::Rig;

/// Sum the extensible (total loop length > 8, i.e. asymmetric beyond the
/// innermost 4+4 window already handled by the inextensible case)
/// interior-loop contributions closing at `(i, j)`, given the stem
/// partition function table `b` already filled for all shorter spans.
pub fn interior_sum<R: Rig>(model: &CachedModel<R>, b: &Triangle<R::Value>, i: usize, j: usize) -> R::Value {
    let mut acc = R::zero();
    let max_len = j.saturating_sub(i);
    for d in (i + 5)..j.saturating_sub(4).min(i + max_len) {
        for e in (d + 3)..j {
            let loop_len = (d - i - 1) + (j - e - 1);
            if loop_len <= 8 {
                continue;
            }
            let asym = (d - i) as isize - (j - e) as isize;
            let factor = R::times(model.int_size(loop_len), model.int_asym(asym.unsigned_abs()));
            acc = R::plus(acc, R::times(factor, b[(d, e)]));
        }
    }
    acc
}
