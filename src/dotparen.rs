//! Dot-parens-plus notation: the standard textual structure format, with
//! `+` marking strand breaks so multi-strand complexes round-trip.
//!
//! Nested pairs use `(` `)`; this crate does not emit or accept the
//! bracket/brace pseudoknot extensions some tools use, since [`PairList`]
//! itself is pseudoknot-free by construction.
//!
//! [`parse`] additionally accepts run-length-encoded runs: a decimal count
//! immediately before `.`, `(`, or `)` repeats that character the given
//! number of times (e.g. `"12."` is twelve unpaired bases), which keeps long
//! unstructured runs compact on the wire. [`render`] always emits the
//! expanded form.

use crate::error::{Error, Result};
use crate::pairlist::{PairList, Structure, UNPAIRED};

/// Render a [`Structure`] as dot-parens-plus.
#[must_use]
pub fn render(structure: &Structure) -> String {
    let pairs = structure.pairs();
    let n = pairs.len();
    let mut out = String::with_capacity(n + structure.nicks().len());
    for i in 0..n {
        if structure.nicks().iter().any(|&nick| nick == i) && i != 0 {
            out.push('+');
        }
        out.push(match pairs.partner(i) {
            None => '.',
            Some(j) if j > i => '(',
            Some(_) => ')',
        });
    }
    out
}

/// Parse dot-parens-plus notation into a [`Structure`], validating bracket
/// matching and nesting. Accepts run-length-encoded runs: a decimal count
/// immediately before `.`, `(`, or `)` repeats that character `count`
/// times; a bare character is equivalent to a count of `1`.
pub fn parse(text: &str) -> Result<Structure> {
    let mut pairs_raw = Vec::new();
    let mut nicks = vec![0usize];
    let mut stack = Vec::new();

    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        let count = if c.is_ascii_digit() {
            let mut value: usize = 0;
            while let Some(&d) = chars.peek() {
                match d.to_digit(10) {
                    Some(digit) => {
                        value = value
                            .checked_mul(10)
                            .and_then(|v| v.checked_add(digit as usize))
                            .ok_or_else(|| Error::InvalidInput("run-length count overflowed".into()))?;
                        chars.next();
                    }
                    None => break,
                }
            }
            if value == 0 {
                return Err(Error::InvalidInput("run-length count must be at least 1".into()));
            }
            value
        } else {
            1
        };

        let ch = chars.next().ok_or_else(|| {
            Error::InvalidInput("run-length count not followed by a structure character".into())
        })?;

        if ch == '+' && count != 1 {
            return Err(Error::InvalidInput("'+' cannot be run-length encoded".into()));
        }

        for _ in 0..count {
            match ch {
                '.' => pairs_raw.push(UNPAIRED),
                '(' => {
                    stack.push(pairs_raw.len());
                    pairs_raw.push(UNPAIRED);
                }
                ')' => {
                    let i = stack.pop().ok_or_else(|| {
                        Error::InvalidInput("unmatched ')' in dot-parens-plus structure".into())
                    })?;
                    let j = pairs_raw.len();
                    pairs_raw[i] = j;
                    pairs_raw.push(i);
                }
                '+' => nicks.push(pairs_raw.len()),
                other => {
                    return Err(Error::InvalidInput(format!(
                        "unexpected character '{other}' in dot-parens-plus structure"
                    )))
                }
            }
        }
    }
    if !stack.is_empty() {
        return Err(Error::InvalidInput("unmatched '(' in dot-parens-plus structure".into()));
    }
    nicks.push(pairs_raw.len());
    nicks.dedup();

    let pairs = PairList::from_raw(pairs_raw)?;
    Structure::new(pairs, nicks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_hairpin() {
        let structure = parse("((((....))))").unwrap();
        assert_eq!(render(&structure), "((((....))))");
    }

    #[test]
    fn round_trips_multi_strand_with_nick() {
        let structure = parse("((+))").unwrap();
        assert_eq!(render(&structure), "((+))");
    }

    #[test]
    fn run_length_dots_expand_correctly() {
        let structure = parse("4(4.4)").unwrap();
        assert_eq!(render(&structure), "((((....))))");
    }

    #[test]
    fn run_length_equivalent_to_spelled_out_form() {
        let a = parse("3(2.2(2.5)").unwrap();
        let b = parse("(((..((..)))))").unwrap();
        assert_eq!(render(&a), render(&b));
    }

    #[test]
    fn zero_run_length_is_rejected() {
        assert!(parse("0.").is_err());
    }

    #[test]
    fn run_length_plus_is_rejected() {
        assert!(parse("2+").is_err());
    }

    #[test]
    fn rejects_unmatched_close() {
        assert!(parse("(..))").is_err());
    }

    #[test]
    fn rejects_unmatched_open() {
        assert!(parse("((...)").is_err());
    }

    #[test]
    fn rejects_unknown_character() {
        assert!(parse("(.x.)").is_err());
    }
}
