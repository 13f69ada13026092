//! Algebraic rigs: the `(⊕, ⊗)` pairs that let the same recursion code
//! compute either a partition function (sum-of-products) or a minimum free
//! energy (min-of-sums) by swapping which rig is plugged in.
//!
//! Each rig additionally defines how a raw free energy is converted into
//! the rig's accumulation domain (`boltz`) and how accumulated values are
//! converted back into a free energy (`free_energy`), since that mapping
//! differs (`exp(-βE)` for the partition function rig, the identity for the
//! minimum-free-energy rig). The accumulation domain itself is an associated
//! [`Rig::Value`] rather than a bare `f64`: the partition-function rig
//! accumulates in [`Big`] so long sequences don't silently overflow `f64`,
//! while the MFE and LSE rigs stay in plain `f64`.

use crate::big::Big;

/// A semiring used to drive one family of dynamic-programming recursions.
pub trait Rig: Copy + Send + Sync + 'static {
    /// The type recursion cells of this rig accumulate.
    type Value: Copy + Default + Send + Sync + Into<f64> + From<f64> + 'static;

    /// Additive identity (`⊕`'s neutral element).
    fn zero() -> Self::Value;
    /// Multiplicative identity (`⊗`'s neutral element).
    fn one() -> Self::Value;
    /// The `⊕` operator.
    fn plus(a: Self::Value, b: Self::Value) -> Self::Value;
    /// The `⊗` operator.
    fn times(a: Self::Value, b: Self::Value) -> Self::Value;
    /// Whether `t` is a valid accumulated value (finite, and non-negative
    /// for the partition-function rig).
    fn valid(t: Self::Value) -> bool {
        t.into().is_finite()
    }
    /// Scale factor applied to a raw free energy before exponentiating, a
    /// function of inverse temperature `beta`.
    fn energy_scale(beta: f64) -> f64;
    /// Convert a free energy (in the cached model's units) into this rig's
    /// accumulation domain.
    fn boltz(energy: f64, scale: f64) -> Self::Value;
    /// Convert an accumulated value back into a free energy.
    fn free_energy(value: Self::Value, scale: f64) -> f64;
    /// Pick the "better" of two alternatives under this rig's preference
    /// order: the larger Boltzmann weight for `Pf`/`Lse`, the smaller energy
    /// for `Mfe`. Used by ensemble variants (e.g. `MinDangles`) that choose
    /// among otherwise-equivalent forward terms rather than summing them.
    fn prefer(a: Self::Value, b: Self::Value) -> Self::Value;
}

/// The partition-function rig: `⊕ = +`, `⊗ = ×`, `boltz(E) = 2^(E·scale)`
/// with `scale = -β / ln 2`, accumulated in [`Big`] so partition functions
/// for long strands don't overflow `f64`'s exponent range.
#[derive(Debug, Clone, Copy)]
pub struct Pf;

impl Rig for Pf {
    type Value = Big;

    fn zero() -> Big {
        Big::ZERO
    }
    fn one() -> Big {
        Big::ONE
    }
    fn plus(a: Big, b: Big) -> Big {
        a + b
    }
    fn times(a: Big, b: Big) -> Big {
        a * b
    }
    fn valid(t: Big) -> bool {
        t.is_valid()
    }
    fn energy_scale(beta: f64) -> f64 {
        -beta / std::f64::consts::LN_2
    }
    fn boltz(energy: f64, scale: f64) -> Big {
        Big::from_f64((energy * scale).exp2())
    }
    fn free_energy(value: Big, scale: f64) -> f64 {
        value.ln() / std::f64::consts::LN_2 / scale
    }
    fn prefer(a: Big, b: Big) -> Big {
        if a.ln() >= b.ln() {
            a
        } else {
            b
        }
    }
}

/// The fast partition-function rig: identical formulas to [`Pf`] but
/// accumulated directly in `f64`, used as the low-cost first stage of the
/// precision-fallback protocol in `schedule::fill_pf_adaptive` — cheaper per
/// cell than [`Big`] arithmetic, but prone to overflow on long or highly
/// structured sequences, which is exactly the condition that triggers
/// escalation to the exact [`Pf`] rig.
#[derive(Debug, Clone, Copy)]
pub struct PfFast;

impl Rig for PfFast {
    type Value = f64;

    fn zero() -> f64 {
        0.0
    }
    fn one() -> f64 {
        1.0
    }
    fn plus(a: f64, b: f64) -> f64 {
        a + b
    }
    fn times(a: f64, b: f64) -> f64 {
        a * b
    }
    fn valid(t: f64) -> bool {
        t.is_finite() && t >= 0.0
    }
    fn energy_scale(beta: f64) -> f64 {
        -beta / std::f64::consts::LN_2
    }
    fn boltz(energy: f64, scale: f64) -> f64 {
        (energy * scale).exp2()
    }
    fn free_energy(value: f64, scale: f64) -> f64 {
        value.log2() / scale
    }
    fn prefer(a: f64, b: f64) -> f64 {
        a.max(b)
    }
}

/// The log-sum-exp rig: same information content as [`Pf`] but accumulated
/// in log space to delay overflow, at the cost of needing `logsumexp` for
/// `⊕` instead of plain addition.
#[derive(Debug, Clone, Copy)]
pub struct Lse;

impl Rig for Lse {
    type Value = f64;

    fn zero() -> f64 {
        f64::MIN * 0.00390625
    }
    fn one() -> f64 {
        0.0
    }
    fn plus(a: f64, b: f64) -> f64 {
        if a == Self::zero() {
            return b;
        }
        if b == Self::zero() {
            return a;
        }
        let m = a.max(b);
        m + ((a - m).exp() + (b - m).exp()).ln()
    }
    fn times(a: f64, b: f64) -> f64 {
        a + b
    }
    fn energy_scale(beta: f64) -> f64 {
        -beta
    }
    fn boltz(energy: f64, scale: f64) -> f64 {
        (energy * scale).max(Self::zero())
    }
    fn free_energy(value: f64, scale: f64) -> f64 {
        value / scale
    }
    fn prefer(a: f64, b: f64) -> f64 {
        a.max(b)
    }
}

/// The minimum-free-energy rig: `⊕ = min`, `⊗ = +`, `boltz` and
/// `free_energy` are the identity since there is no exponentiation in an
/// energy-minimization recursion.
#[derive(Debug, Clone, Copy)]
pub struct Mfe;

impl Rig for Mfe {
    type Value = f64;

    fn zero() -> f64 {
        f64::INFINITY
    }
    fn one() -> f64 {
        0.0
    }
    fn plus(a: f64, b: f64) -> f64 {
        a.min(b)
    }
    fn times(a: f64, b: f64) -> f64 {
        a + b
    }
    fn valid(t: f64) -> bool {
        !t.is_nan()
    }
    fn energy_scale(_beta: f64) -> f64 {
        1.0
    }
    fn boltz(energy: f64, _scale: f64) -> f64 {
        energy
    }
    fn free_energy(value: f64, _scale: f64) -> f64 {
        value
    }
    fn prefer(a: f64, b: f64) -> f64 {
        a.min(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pf_boltz_of_zero_energy_is_one() {
        let scale = Pf::energy_scale(1.0);
        assert!((Pf::boltz(0.0, scale).to_f64() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mfe_plus_picks_minimum() {
        assert_eq!(Mfe::plus(3.0, -1.0), -1.0);
    }

    #[test]
    fn mfe_times_adds_energies() {
        assert_eq!(Mfe::times(3.0, 2.0), 5.0);
    }

    #[test]
    fn lse_plus_matches_log_of_sum_of_exp() {
        let a = 2.0_f64;
        let b = 3.0_f64;
        let got = Lse::plus(a, b);
        let want = (a.exp() + b.exp()).ln();
        assert!((got - want).abs() < 1e-9);
    }

    #[test]
    fn lse_zero_is_additive_identity() {
        assert_eq!(Lse::plus(Lse::zero(), 4.0), 4.0);
    }

    #[test]
    fn pf_prefer_picks_larger_weight() {
        let small = Pf::boltz(-1.0, 1.0);
        let large = Pf::boltz(1.0, 1.0);
        assert_eq!(Pf::prefer(small, large).to_f64(), large.to_f64());
    }

    #[test]
    fn mfe_prefer_picks_lower_energy() {
        assert_eq!(Mfe::prefer(-2.0, 1.0), -2.0);
    }

    #[test]
    fn pf_fast_matches_pf_for_ordinary_magnitudes() {
        let scale = PfFast::energy_scale(1.0);
        let fast = PfFast::boltz(-2.0, scale);
        let exact = Pf::boltz(-2.0, Pf::energy_scale(1.0)).to_f64();
        assert!((fast - exact).abs() < 1e-9);
    }

    #[test]
    fn pf_fast_overflows_where_big_does_not() {
        let scale = PfFast::energy_scale(1.0);
        let huge = PfFast::times(PfFast::boltz(-900.0, scale), PfFast::boltz(-900.0, scale));
        assert!(!PfFast::valid(huge));
        let exact = Pf::times(Pf::boltz(-900.0, Pf::energy_scale(1.0)), Pf::boltz(-900.0, Pf::energy_scale(1.0)));
        assert!(Pf::valid(exact));
    }
}
