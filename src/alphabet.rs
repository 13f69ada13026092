//! Alphabets: the letter table, complement map, and degenerate-letter
//! wildcard table that together define how annotated sequence strings parse
//! into [`Base`]/[`Wildcard`] values.

use std::collections::HashMap;
use std::sync::Arc;

use crate::base::{Base, BasePairing, Wildcard};
use crate::error::{Error, Result};
use crate::sequence::Sequence;

/// The immutable letter/complement/wildcard tables shared by every
/// [`Alphabet`] clone. Wrapped in `Arc` so alphabets are cheap to copy
/// around, mirroring how sequences share their base buffer.
#[derive(Debug)]
struct AlphabetData {
    letters: Vec<char>,
    complements: Vec<Base>,
    wildcards: HashMap<char, Wildcard>,
    pairing: BasePairing,
}

/// A named set of bases, their complements, and the pairing rules between
/// them (e.g. the standard four-letter RNA alphabet with Watson-Crick plus
/// wobble pairing).
#[derive(Debug, Clone)]
pub struct Alphabet {
    data: Arc<AlphabetData>,
}

impl Alphabet {
    /// Number of canonical (non-wildcard) bases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.letters.len()
    }

    /// Whether this alphabet defines any bases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.letters.is_empty()
    }

    /// Canonical letter for a base.
    #[must_use]
    pub fn letter(&self, b: Base) -> char {
        self.data.letters[b.index() as usize]
    }

    /// Watson-Crick (or alphabet-defined) complement of a base.
    #[must_use]
    pub fn complement(&self, b: Base) -> Base {
        self.data.complements[b.index() as usize]
    }

    /// Pairing rules for this alphabet.
    #[must_use]
    pub fn pairing(&self) -> &BasePairing {
        &self.data.pairing
    }

    /// Look up the base (or wildcard, widened to a base only if determined)
    /// for a single letter.
    fn base_for(&self, c: char) -> Result<Base> {
        if let Some(i) = self.data.letters.iter().position(|&l| l == c) {
            return Ok(Base::from_index(i as u8));
        }
        if let Some(w) = self.data.wildcards.get(&c) {
            return Ok(w.first());
        }
        Err(Error::InvalidInput(format!(
            "letter '{c}' is not in this alphabet"
        )))
    }

    /// Parse one strand (no `+`/`,`/newline separators) into a [`Sequence`].
    pub fn sequence(&self, s: &str) -> Result<Sequence> {
        let bases = s
            .trim()
            .chars()
            .map(|c| self.base_for(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(Sequence::new(bases))
    }

    /// Parse a `+`/newline/comma-delimited multi-strand string into a list
    /// of sequences, one per strand, per spec's annotated-sequence grammar.
    pub fn sequences(&self, s: &str) -> Result<Vec<Sequence>> {
        split_strands(s)
            .into_iter()
            .map(|strand| self.sequence(strand))
            .collect()
    }

    /// Builder for a fresh alphabet.
    #[must_use]
    pub fn builder(letters: &[char]) -> AlphabetBuilder {
        AlphabetBuilder {
            letters: letters.to_vec(),
            complements: vec![None; letters.len()],
            wildcards: HashMap::new(),
            pairs: Vec::new(),
        }
    }

    /// The standard four-letter RNA alphabet (A, C, G, U) with canonical
    /// Watson-Crick and wobble pairing, plus the `N` wildcard.
    #[must_use]
    pub fn rna() -> Self {
        Self::builder(&['A', 'C', 'G', 'U'])
            .complement('A', 'U')
            .complement('C', 'G')
            .pair('A', 'U', true)
            .pair('C', 'G', true)
            .pair('G', 'U', false)
            .wildcard('N', &['A', 'C', 'G', 'U'])
            .build()
            .expect("built-in RNA alphabet is internally consistent")
    }

    /// The standard four-letter DNA alphabet (A, C, G, T).
    #[must_use]
    pub fn dna() -> Self {
        Self::builder(&['A', 'C', 'G', 'T'])
            .complement('A', 'T')
            .complement('C', 'G')
            .pair('A', 'T', true)
            .pair('C', 'G', true)
            .wildcard('N', &['A', 'C', 'G', 'T'])
            .build()
            .expect("built-in DNA alphabet is internally consistent")
    }
}

/// Splits a multi-strand annotated sequence string on `+`, `,`, or newlines.
fn split_strands(s: &str) -> Vec<&str> {
    s.split(|c: char| c == '+' || c == ',' || c == '\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Incrementally constructs an [`Alphabet`].
pub struct AlphabetBuilder {
    letters: Vec<char>,
    complements: Vec<Option<char>>,
    wildcards: HashMap<char, Vec<char>>,
    pairs: Vec<(char, char, bool)>,
}

impl AlphabetBuilder {
    /// Register `a` and `b` as each other's complement.
    #[must_use]
    pub fn complement(mut self, a: char, b: char) -> Self {
        let ia = self.index_of(a);
        let ib = self.index_of(b);
        self.complements[ia] = Some(b);
        self.complements[ib] = Some(a);
        self
    }

    /// Register that `a` and `b` may pair; `closing` additionally allows the
    /// pair to close a loop.
    #[must_use]
    pub fn pair(mut self, a: char, b: char, closing: bool) -> Self {
        self.pairs.push((a, b, closing));
        self
    }

    /// Register `letter` as a wildcard standing for any of `expands_to`.
    #[must_use]
    pub fn wildcard(mut self, letter: char, expands_to: &[char]) -> Self {
        self.wildcards.insert(letter, expands_to.to_vec());
        self
    }

    fn index_of(&self, c: char) -> usize {
        self.letters
            .iter()
            .position(|&l| l == c)
            .unwrap_or_else(|| panic!("letter '{c}' was not declared in Alphabet::builder"))
    }

    /// Finalize the alphabet.
    pub fn build(self) -> Result<Alphabet> {
        let n = self.letters.len();
        let complements = self
            .complements
            .into_iter()
            .enumerate()
            .map(|(i, c)| match c {
                Some(c) => Ok(Base::from_index(self.letters.iter().position(|&l| l == c).unwrap() as u8)),
                None => Err(Error::ParameterLoad(format!(
                    "letter '{}' has no declared complement",
                    self.letters[i]
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut pairing = BasePairing::new(n);
        for (a, b, closing) in &self.pairs {
            let ia = Base::from_index(self.letters.iter().position(|l| l == a).unwrap() as u8);
            let ib = Base::from_index(self.letters.iter().position(|l| l == b).unwrap() as u8);
            pairing.set_pair(ia, ib, *closing);
            pairing.set_pair(ib, ia, *closing);
        }
        pairing.debug_check_invariant();

        let wildcards = self
            .wildcards
            .into_iter()
            .map(|(letter, expands)| {
                let indices = expands
                    .iter()
                    .map(|c| self.letters.iter().position(|l| l == c).unwrap() as u8);
                (letter, Wildcard::from_indices(indices))
            })
            .collect();

        Ok(Alphabet {
            data: Arc::new(AlphabetData {
                letters: self.letters,
                complements,
                wildcards,
                pairing,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rna_sequence_parses() {
        let a = Alphabet::rna();
        let seq = a.sequence("ACGU").unwrap();
        assert_eq!(seq.len(), 4);
    }

    #[test]
    fn rejects_unknown_letter() {
        let a = Alphabet::rna();
        assert!(a.sequence("ACGZ").is_err());
    }

    #[test]
    fn multi_strand_split() {
        let a = Alphabet::rna();
        let strands = a.sequences("ACGU+UGCA").unwrap();
        assert_eq!(strands.len(), 2);
    }

    #[test]
    fn wobble_pair_is_pairing_not_closing() {
        let a = Alphabet::rna();
        let g = Base::from_index(2);
        let u = Base::from_index(3);
        assert!(a.pairing().can_pair(g, u));
        assert!(!a.pairing().can_close(g, u));
    }

    #[test]
    fn wildcard_letter_resolves_to_a_member_base() {
        let a = Alphabet::rna();
        let seq = a.sequence("ACGN").unwrap();
        assert_eq!(seq.len(), 4);
    }
}
