//! Sequences (single strands) and complexes (ordered groups of strands).

use std::sync::Arc;

use itertools::Itertools;

use crate::base::Base;

/// An immutable, cheaply-cloneable strand of bases.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sequence {
    bases: Arc<[Base]>,
}

impl Sequence {
    /// Wrap a base buffer as a sequence.
    #[must_use]
    pub fn new(bases: Vec<Base>) -> Self {
        Self {
            bases: Arc::from(bases),
        }
    }

    /// Number of bases in this strand.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    /// Whether this strand has zero bases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Base at position `i`.
    #[must_use]
    pub fn base(&self, i: usize) -> Base {
        self.bases[i]
    }

    /// All bases, in 5'->3' order.
    #[must_use]
    pub fn bases(&self) -> &[Base] {
        &self.bases
    }
}

impl std::ops::Index<usize> for Sequence {
    type Output = Base;
    fn index(&self, i: usize) -> &Base {
        &self.bases[i]
    }
}

/// An ordered group of strands forming a single multi-stranded molecule.
/// Ordering matters for nick positions but the *rotational class* of a
/// complex (which strand is "first") does not change its physics; see
/// [`Complex::canonical_rotation`] and [`Complex::symmetry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Complex {
    strands: Vec<Sequence>,
}

impl Complex {
    /// Build a complex from an explicit strand order.
    #[must_use]
    pub fn new(strands: Vec<Sequence>) -> Self {
        Self { strands }
    }

    /// Number of strands.
    #[must_use]
    pub fn strand_count(&self) -> usize {
        self.strands.len()
    }

    /// The strands, in their given order.
    #[must_use]
    pub fn strands(&self) -> &[Sequence] {
        &self.strands
    }

    /// Total number of bases across all strands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strands.iter().map(Sequence::len).sum()
    }

    /// Whether the complex has zero strands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strands.is_empty()
    }

    /// Cumulative strand-boundary offsets ("nicks"): `nicks()[0] == 0`, and
    /// `nicks()[k]` is the index of the first base of strand `k`, with a
    /// final sentinel equal to the total length.
    #[must_use]
    pub fn nicks(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.strands.len() + 1);
        let mut acc = 0;
        out.push(0);
        for s in &self.strands {
            acc += s.len();
            out.push(acc);
        }
        out
    }

    /// Concatenate every strand's bases, 5'->3' in strand order, into a
    /// single flattened [`Sequence`]. Used by engines that run a
    /// single-strand-shaped recursion over a multi-strand complex; nick
    /// positions within the flattened result are given by [`Self::nicks`].
    #[must_use]
    pub fn flattened(&self) -> Sequence {
        let bases = self.strands.iter().flat_map(|s| s.bases().iter().copied()).collect();
        Sequence::new(bases)
    }

    /// Rotate the strand order by `k` positions (cyclically).
    #[must_use]
    fn rotated(&self, k: usize) -> Self {
        let n = self.strands.len();
        if n == 0 {
            return self.clone();
        }
        let strands = self.strands.iter().cloned().cycle().skip(k % n).take(n).collect_vec();
        Self { strands }
    }

    /// The lexicographically smallest strand rotation, used as the
    /// canonical representative of a complex's rotational equivalence
    /// class (a complex and its cyclic strand permutations describe the
    /// same physical species).
    #[must_use]
    pub fn canonical_rotation(&self) -> Self {
        let n = self.strands.len();
        if n <= 1 {
            return self.clone();
        }
        (0..n)
            .map(|k| self.rotated(k))
            .min_by(|a, b| {
                a.strands
                    .iter()
                    .map(Sequence::bases)
                    .cmp(b.strands.iter().map(Sequence::bases))
            })
            .expect("n > 1 guarantees at least one rotation")
    }

    /// The rotational symmetry number: the number of distinct cyclic
    /// rotations of this complex that reproduce the same strand sequence,
    /// i.e. `strand_count() / (number of distinct rotations)`. A symmetric
    /// homodimer has symmetry 2.
    #[must_use]
    pub fn symmetry(&self) -> usize {
        let n = self.strands.len();
        if n == 0 {
            return 1;
        }
        let canonical = self.canonical_rotation();
        (1..n)
            .filter(|&k| canonical.rotated(k) == canonical)
            .count()
            + 1
    }
}
