//! Recursion-modifying actions for design and constrained-MFE callers.
//!
//! The reference implementation injects caller-supplied behavior into a
//! recursion site through an open `std::function`-holding functor object.
//! Rust has no open-world dynamic dispatch of that shape without `dyn`
//! overhead at every recursion cell, and the set of things a caller can
//! plausibly want to do at a pairing site is closed (bias it, replace it,
//! or forbid it) — so this crate collapses the functor into a plain enum.

/// A position-dependent modifier applied at a potential base-pair site
/// during a recursion, used by design/constrained-MFE callers that need to
/// bias, override, or exclude particular pairings without rewriting the
/// recursion itself.
#[derive(Clone, Copy)]
pub enum Action {
    /// No modification: use the recursion's ordinary value.
    Default,
    /// Add a bonus energy (in the current rig's domain, already a Boltzmann
    /// factor for `Pf`, already additive for `Mfe`) on top of the ordinary
    /// recursive contribution at `(i, j)`, only when `(i, j)` can pair.
    Bonus(fn(usize, usize) -> f64),
    /// Replace the contribution at `(i, j)` with a flat value, regardless of
    /// whether `(i, j)` can pair.
    Flat(fn(usize, usize) -> f64),
    /// Force the contribution at `(i, j)` to the rig's zero, excluding that
    /// pairing from the ensemble entirely.
    Forbid(fn(usize, usize) -> bool),
}

impl Default for Action {
    fn default() -> Self {
        Self::Default
    }
}

impl Action {
    /// Apply this action to a recursion cell's computed value. `can_pair`
    /// indicates whether the site is already energetically pairable, `zero`
    /// is the current rig's additive identity, `plus`/`times` are the rig's
    /// operators, and `boltz` converts an action-supplied raw energy (always
    /// `f64`, regardless of the rig in use) into the rig's accumulation
    /// domain `T`.
    #[allow(clippy::too_many_arguments)]
    pub fn apply<T: Copy>(
        &self,
        i: usize,
        j: usize,
        can_pair: bool,
        recursion_value: T,
        zero: T,
        plus: impl Fn(T, T) -> T,
        times: impl Fn(T, T) -> T,
        boltz: impl Fn(f64) -> T,
    ) -> T {
        match self {
            Self::Default => recursion_value,
            Self::Bonus(f) => {
                if can_pair {
                    times(recursion_value, boltz(f(i, j)))
                } else {
                    zero
                }
            }
            Self::Flat(f) => boltz(f(i, j)),
            Self::Forbid(f) => {
                if f(i, j) {
                    zero
                } else {
                    plus(recursion_value, zero)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_action_is_identity() {
        let a = Action::Default;
        let out = a.apply(0, 1, true, 5.0, 0.0, |x, y| x + y, |x, y| x * y, |e| e);
        assert_eq!(out, 5.0);
    }

    #[test]
    fn forbid_action_zeroes_matching_sites() {
        let a = Action::Forbid(|i, j| i == 0 && j == 1);
        let out = a.apply(0, 1, true, 5.0, -1.0, |x, y| x + y, |x, y| x * y, |e| e);
        assert_eq!(out, -1.0);
    }

    #[test]
    fn bonus_action_multiplies_in_extra_factor() {
        let a = Action::Bonus(|_i, _j| 2.0);
        let out = a.apply(0, 1, true, 3.0, 0.0, |x, y| x + y, |x, y| x * y, |e| e * 10.0);
        assert_eq!(out, 60.0);
    }

    #[test]
    fn bonus_action_is_zero_when_site_cannot_pair() {
        let a = Action::Bonus(|_i, _j| 2.0);
        let out = a.apply(0, 1, false, 3.0, 0.0, |x, y| x + y, |x, y| x * y, |e| e);
        assert_eq!(out, 0.0);
    }
}
