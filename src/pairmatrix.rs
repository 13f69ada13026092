//! Pair-probability matrices: McCaskill-style posterior base-pairing
//! probabilities derived from a filled partition-function block.
//!
//! This crate's `D` table only carries the "inside" partition function for
//! a closing pair, not the reference's full outside (`dplus`) recursion, so
//! this module computes the exact formula only for pairs reachable directly
//! from the exterior loop (neither `i` nor `j` enclosed by another pair):
//! `P(i, j) = Q(0, i-1) * D(i, j) * Q(j+1, n-1) / Q(0, n-1)`. Pairs nested
//! inside another closing pair (e.g. a stacked or interior-loop pair) are
//! under-counted by this formula; a full treatment needs the reference's
//! outside recursion, which is not implemented here (see `DESIGN.md`).

use crate::block::Block;
use crate::matrix::Matrix;
use crate::rig::Rig;

/// How to prune a computed pair-probability matrix before returning it to a
/// caller, trading completeness for a bounded response size.
#[derive(Debug, Clone, Copy)]
pub struct Sparsity {
    /// Entries at or below this probability are dropped (set to `0.0`).
    pub threshold: f64,
    /// Keep at most this many entries per row, closest to the diagonal
    /// first. `0` means unbounded.
    pub row_size: usize,
    /// Clamp values that round fractionally above `1.0` back down to
    /// `1.0`.
    pub clamp: bool,
    /// Only compute each position's unpaired probability (the matrix
    /// diagonal), skipping the off-diagonal pair matrix entirely.
    pub diagonal_only: bool,
}

impl Default for Sparsity {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            row_size: 0,
            clamp: true,
            diagonal_only: false,
        }
    }
}

/// Compute the pair-probability matrix for a block filled over a sequence
/// of length `n`, with `P(i, i)` holding the unpaired probability (`1 -
/// sum_j P(i, j)`). `sparsity` is applied to the off-diagonal entries
/// before the diagonal residual is taken, so the diagonal always restores
/// row-sum-to-one regardless of pruning.
#[must_use]
pub fn pair_probabilities<R: Rig>(block: &Block<R::Value>, n: usize, sparsity: Sparsity) -> Matrix<f64> {
    let mut out = Matrix::new(n, n);
    if n == 0 {
        return out;
    }
    let total: f64 = block.q[(0, n - 1)].into();
    if total <= 0.0 || !total.is_finite() {
        for i in 0..n {
            out[(i, i)] = 1.0;
        }
        return out;
    }

    if !sparsity.diagonal_only {
        for i in 0..n {
            let left: f64 = if i == 0 { 1.0 } else { block.q[(0, i - 1)].into() };
            let mut row: Vec<(usize, f64)> = Vec::new();
            for j in i..n {
                let right: f64 = if j + 1 >= n { 1.0 } else { block.q[(j + 1, n - 1)].into() };
                let d: f64 = block.d[(i, j)].into();
                let mut p = left * d * right / total;
                if sparsity.clamp {
                    p = p.min(1.0);
                }
                if p > sparsity.threshold {
                    row.push((j, p));
                }
            }
            if sparsity.row_size > 0 && row.len() > sparsity.row_size {
                row.sort_by_key(|&(j, _)| j.abs_diff(i));
                row.truncate(sparsity.row_size);
            }
            for (j, p) in row {
                out[(i, j)] = p;
                out[(j, i)] = p;
            }
        }
    }

    for i in 0..n {
        let paired: f64 = (0..n).filter(|&j| j != i).map(|j| out[(i, j)]).sum();
        out[(i, i)] = (1.0 - paired).max(0.0);
    }
    out
}
