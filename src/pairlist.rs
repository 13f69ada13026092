//! Secondary structures: pair lists and their strand-nick context.

use crate::error::{Error, Result};

/// Sentinel meaning "this position is unpaired".
pub const UNPAIRED: usize = usize::MAX;

/// A pseudoknot-free secondary structure over a fixed-length sequence,
/// represented as an involution: `pairs[i] == j` and `pairs[j] == i`
/// whenever `i` and `j` are paired, `pairs[i] == UNPAIRED` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairList {
    pairs: Vec<usize>,
}

impl PairList {
    /// An all-unpaired structure of length `n`.
    #[must_use]
    pub fn unpaired(n: usize) -> Self {
        Self {
            pairs: vec![UNPAIRED; n],
        }
    }

    /// Build directly from a raw involution, validating it.
    pub fn from_raw(pairs: Vec<usize>) -> Result<Self> {
        let s = Self { pairs };
        s.validate()?;
        Ok(s)
    }

    /// Number of positions (paired or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether there are zero positions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The partner of position `i`, or `None` if unpaired.
    #[must_use]
    pub fn partner(&self, i: usize) -> Option<usize> {
        let p = self.pairs[i];
        (p != UNPAIRED).then_some(p)
    }

    /// Form the pair `(i, j)`, overwriting any previous pairing at either
    /// position. Callers are responsible for ensuring `i != j`.
    pub fn set_pair(&mut self, i: usize, j: usize) {
        self.pairs[i] = j;
        self.pairs[j] = i;
    }

    /// Clear the pairing at `i` (and its partner, if any).
    pub fn unset(&mut self, i: usize) {
        if let Some(j) = self.partner(i) {
            self.pairs[j] = UNPAIRED;
        }
        self.pairs[i] = UNPAIRED;
    }

    /// Raw involution array.
    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.pairs
    }

    /// Check the involution invariant: every pair is mutual, no
    /// self-pairing, and no crossing (pseudoknot) pairs.
    pub fn validate(&self) -> Result<()> {
        let n = self.pairs.len();
        for (i, &p) in self.pairs.iter().enumerate() {
            if p == UNPAIRED {
                continue;
            }
            if p >= n {
                return Err(Error::InvalidInput(format!(
                    "pair partner {p} out of range for length {n}"
                )));
            }
            if p == i {
                return Err(Error::InvalidInput(format!("position {i} paired with itself")));
            }
            if self.pairs[p] != i {
                return Err(Error::InvalidInput(format!(
                    "pairing is not mutual at positions {i} and {p}"
                )));
            }
        }
        for (i, &pi) in self.pairs.iter().enumerate() {
            if pi == UNPAIRED || pi < i {
                continue;
            }
            for (k, &pk) in self.pairs.iter().enumerate().skip(i + 1).take(pi - i - 1) {
                if pk != UNPAIRED && (pk < i || pk > pi) {
                    return Err(Error::InvalidInput(format!(
                        "pseudoknot: pair ({i}, {pi}) crosses pair ({k}, {pk})"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A [`PairList`] together with the strand-boundary offsets of the complex
/// it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Structure {
    pairs: PairList,
    nicks: Vec<usize>,
}

impl Structure {
    /// Pair `pairs` with `nicks` (cumulative strand-boundary offsets, as
    /// produced by [`crate::sequence::Complex::nicks`]).
    pub fn new(pairs: PairList, nicks: Vec<usize>) -> Result<Self> {
        if nicks.last().copied() != Some(pairs.len()) {
            return Err(Error::InvalidInput(
                "nicks must terminate at the structure's length".into(),
            ));
        }
        Ok(Self { pairs, nicks })
    }

    /// The underlying pair list.
    #[must_use]
    pub fn pairs(&self) -> &PairList {
        &self.pairs
    }

    /// Strand-boundary offsets.
    #[must_use]
    pub fn nicks(&self) -> &[usize] {
        &self.nicks
    }

    /// Index of the strand containing position `i`.
    #[must_use]
    pub fn strand_of(&self, i: usize) -> usize {
        self.nicks.windows(2).position(|w| i >= w[0] && i < w[1]).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_asymmetric_pairing() {
        let mut raw = vec![UNPAIRED; 4];
        raw[0] = 3;
        raw[3] = UNPAIRED;
        assert!(PairList::from_raw(raw).is_err());
    }

    #[test]
    fn rejects_self_pair() {
        let mut raw = vec![UNPAIRED; 4];
        raw[1] = 1;
        assert!(PairList::from_raw(raw).is_err());
    }

    #[test]
    fn rejects_pseudoknot() {
        // (0,2) and (1,3) cross.
        let raw = vec![2, 3, 0, 1];
        assert!(PairList::from_raw(raw).is_err());
    }

    #[test]
    fn accepts_nested_structure() {
        // (0,3) and (1,2) are nested, not crossing.
        let raw = vec![3, 2, 1, 0];
        assert!(PairList::from_raw(raw).is_ok());
    }

    #[test]
    fn set_and_unset_round_trip() {
        let mut p = PairList::unpaired(4);
        p.set_pair(0, 3);
        assert_eq!(p.partner(0), Some(3));
        assert_eq!(p.partner(3), Some(0));
        p.unset(0);
        assert_eq!(p.partner(3), None);
    }
}
