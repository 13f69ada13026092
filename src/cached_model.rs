//! Length-indexed Boltzmann-factor cache over a [`Model`], lifted into a
//! chosen [`Rig`]'s accumulation domain.
//!
//! Computing `boltz(energy)` from scratch at every recursion cell is the
//! dominant cost of a naive implementation; every quantity that depends
//! only on loop *length* (not sequence content) is precomputed once, up to
//! the longest sequence seen so far, and reused across all recursion cells
//! that share that length. Capacity only grows — `reserve` is a no-op once
//! a long-enough sequence has already been processed.

use std::marker::PhantomData;

use crate::base::Base;
use crate::matrix::Matrix;
use crate::model::Model;
use crate::rig::Rig;

/// Length-indexed Boltzmann-factor tables, generic over the active [`Rig`].
pub struct CachedModel<R: Rig> {
    model: Model,
    energy_scale: f64,
    multi1: R::Value,
    multi2: R::Value,
    multi3: R::Value,
    multi12: R::Value,
    multi22: R::Value,
    multi122: R::Value,
    /// Multiloop per-branch factor tables: row 0 = forward, row 1 = reversed.
    alpha: Matrix<R::Value>,
    /// Interior-loop factor tables, 13 rows as in the reference layout:
    /// rows 0-3 forward / 4-7 reversed (ninio-capped size terms by
    /// asymmetry class), 8 bulge / 9 reverse-bulge, 10 `int_scale`,
    /// 11 `int_asym`, 12 `int_size`.
    gamma: Matrix<R::Value>,
    asymmetry: Vec<R::Value>,
    capacity: usize,
    _rig: PhantomData<R>,
}

impl<R: Rig> CachedModel<R> {
    /// Build an empty cache over `model`, with zero reserved capacity.
    #[must_use]
    pub fn new(model: Model) -> Self {
        let mut out = Self {
            model,
            energy_scale: 0.0,
            multi1: R::zero(),
            multi2: R::zero(),
            multi3: R::zero(),
            multi12: R::zero(),
            multi22: R::zero(),
            multi122: R::zero(),
            alpha: Matrix::new(0, 0),
            gamma: Matrix::new(0, 0),
            asymmetry: Vec::new(),
            capacity: 0,
            _rig: PhantomData,
        };
        out.force_reserve(1);
        out
    }

    /// Access to the underlying model (alphabet, parameters, conditions).
    #[must_use]
    pub const fn model(&self) -> &Model {
        &self.model
    }

    /// Boltzmann factor of a raw free energy, clamped to the rig's zero if
    /// the result would be non-finite (guards against perturbed parameters
    /// producing an unrepresentable factor, e.g. during design optimization).
    #[must_use]
    pub fn boltz(&self, energy: f64) -> R::Value {
        let v = R::boltz(energy, self.energy_scale);
        if R::valid(v) {
            v
        } else {
            R::zero()
        }
    }

    /// Inverse of [`Self::boltz`].
    #[must_use]
    pub fn free_energy(&self, value: R::Value) -> f64 {
        R::free_energy(value, self.energy_scale)
    }

    /// Whether `b` and `c` may pair.
    #[must_use]
    pub fn can_pair(&self, b: Base, c: Base) -> bool {
        self.model.alphabet().pairing().can_pair(b, c)
    }

    /// Whether `b` and `c` may close a loop.
    #[must_use]
    pub fn can_close(&self, b: Base, c: Base) -> bool {
        self.model.alphabet().pairing().can_close(b, c)
    }

    /// Terminal AU/GU-type penalty Boltzmann factor for a closing pair.
    #[must_use]
    pub fn terminal(&self, i: Base, j: Base) -> R::Value {
        let canonical = self
            .model
            .parameters()
            .dangle5
            .first()
            .map(|r| r.len())
            .unwrap_or(4);
        let penalty = if (i.index() as usize) < canonical && (j.index() as usize) < canonical {
            self.model.parameters().terminal_penalty
        } else {
            0.0
        };
        self.boltz(penalty)
    }

    /// 5' dangle (terminal mismatch) Boltzmann factor: `closing` is the base
    /// at the paired position whose dangling neighbor is `unpaired`.
    #[must_use]
    pub fn dangle5(&self, closing: Base, unpaired: Base) -> R::Value {
        self.dangle_lookup(&self.model.parameters().dangle5, closing, unpaired)
    }

    /// As [`Self::dangle5`], for the 3' overhang.
    #[must_use]
    pub fn dangle3(&self, closing: Base, unpaired: Base) -> R::Value {
        self.dangle_lookup(&self.model.parameters().dangle3, closing, unpaired)
    }

    fn dangle_lookup(&self, table: &[Vec<f64>], closing: Base, unpaired: Base) -> R::Value {
        let row = table.get(closing.index() as usize);
        let energy = row
            .and_then(|r| r.get(unpaired.index() as usize))
            .copied()
            .unwrap_or(0.0);
        self.boltz(energy)
    }

    /// Hairpin loop Boltzmann factor for a loop of length `len`.
    #[must_use]
    pub fn hairpin(&self, len: usize) -> R::Value {
        let table = &self.model.parameters().hairpin_length;
        let e = *table.get(len).or_else(|| table.last()).unwrap_or(&0.0);
        self.boltz(e)
    }

    /// Per-multiloop-initiation Boltzmann factor.
    #[must_use]
    pub const fn multi1(&self) -> R::Value {
        self.multi1
    }
    /// Per-branch multiloop Boltzmann factor.
    #[must_use]
    pub const fn multi2(&self) -> R::Value {
        self.multi2
    }
    /// Per-unpaired-base multiloop Boltzmann factor.
    #[must_use]
    pub const fn multi3(&self) -> R::Value {
        self.multi3
    }
    /// `multi1 * multi2` precomputed.
    #[must_use]
    pub const fn multi12(&self) -> R::Value {
        self.multi12
    }
    /// `multi2^2` precomputed.
    #[must_use]
    pub const fn multi22(&self) -> R::Value {
        self.multi22
    }
    /// `multi1 * multi2^2` precomputed.
    #[must_use]
    pub const fn multi122(&self) -> R::Value {
        self.multi122
    }

    /// Per-base multiloop-dangle scaling factor for `i` unpaired bases,
    /// forward direction.
    #[must_use]
    pub fn multi3s(&self, i: usize) -> R::Value {
        self.alpha[(0, i.min(self.alpha.cols() - 1))]
    }
    /// As [`Self::multi3s`], reversed direction.
    #[must_use]
    pub fn multi3rs(&self, i: usize) -> R::Value {
        self.alpha[(1, i.min(self.alpha.cols() - 1))]
    }

    /// Bulge-loop length factor.
    #[must_use]
    pub fn bulge(&self, size: usize) -> R::Value {
        self.gamma[(8, size.min(self.gamma.cols() - 1))]
    }
    /// Reversed-direction bulge-loop length factor.
    #[must_use]
    pub fn rbulge(&self, size: usize) -> R::Value {
        self.gamma[(9, size.min(self.gamma.cols() - 1))]
    }
    /// Interior-loop incremental size factor (difference between
    /// consecutive symmetric interior loop lengths).
    #[must_use]
    pub fn int_scale(&self, i: usize) -> R::Value {
        self.gamma[(10, i.min(self.gamma.cols() - 1))]
    }
    /// Interior-loop asymmetry factor for total loop length `i`.
    #[must_use]
    pub fn int_asym(&self, i: usize) -> R::Value {
        let idx = i.saturating_sub(4).min(self.gamma.cols() - 1);
        self.gamma[(11, idx)]
    }
    /// Interior-loop base size factor for total loop length `i`.
    #[must_use]
    pub fn int_size(&self, i: usize) -> R::Value {
        self.gamma[(12, i.min(self.gamma.cols() - 1))]
    }

    /// Current reserved capacity (max sequence length this cache supports
    /// without recomputation).
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grow the cache to support sequences up to length `m`, if it does not
    /// already. Monotonic: never shrinks.
    pub fn reserve(&mut self, m: usize) -> bool {
        if m > self.capacity {
            self.force_reserve(m);
            true
        } else {
            false
        }
    }

    fn force_reserve(&mut self, m: usize) {
        let p = self.model.parameters();
        self.energy_scale = R::energy_scale(self.model.beta());
        self.multi1 = self.boltz(p.multi_init);
        self.multi2 = self.boltz(p.multi_pair);
        self.multi3 = self.boltz(p.multi_base);
        self.multi12 = self.boltz(p.multi_pair + p.multi_init);
        self.multi22 = self.boltz(p.multi_pair * 2.0);
        self.multi122 = self.boltz(2.0 * p.multi_pair + p.multi_init);

        self.alpha.resize(2, m.max(1));
        self.gamma.resize(13, m.max(1));
        self.asymmetry.resize(2 * m.max(1), R::zero());

        for i in 0..m {
            self.alpha[(0, i)] = self.boltz((i as f64) * p.multi_base);
        }
        for i in 0..m {
            self.alpha[(1, i)] = self.alpha[(0, m - 1 - i)];
        }

        let interior_len = |n: usize| -> f64 {
            *p.interior_length
                .get(n)
                .or_else(|| p.interior_length.last())
                .unwrap_or(&0.0)
        };

        for i in 0..m {
            self.gamma[(10, i)] = if i == 0 {
                self.boltz(0.0)
            } else {
                self.boltz(interior_len(i + 2) - interior_len(i))
            };
            self.gamma[(11, i)] = self.boltz(ninio_asymmetry(p.ninio, p.ninio_cap, i, 4) + interior_len(i + 4));
            self.gamma[(12, i)] = if i == 0 { self.boltz(0.0) } else { self.boltz(interior_len(i)) };
        }

        let bulge_len = |n: usize| -> f64 {
            *p.bulge_length
                .get(n)
                .or_else(|| p.bulge_length.last())
                .unwrap_or(&0.0)
        };
        for s in 1..m.min(30) {
            self.gamma[(8, s)] = self.boltz(bulge_len(s - 1));
        }
        for s in 30.min(m)..m {
            let base = bulge_len(29);
            let extrapolated = base + (s as f64 / 30.0).ln() * p.log_loop_penalty;
            self.gamma[(8, s)] = self.boltz(extrapolated);
        }
        for s in 0..m {
            self.gamma[(9, s)] = self.gamma[(8, m - 1 - s)];
        }

        for i in 0..2 * m {
            let arg = if i > m { 4 + i - m } else { 4 + m.saturating_sub(i) };
            self.asymmetry[i] = self.boltz(ninio_asymmetry(p.ninio, p.ninio_cap, arg, 4));
        }

        self.capacity = m;
    }
}

fn ninio_asymmetry(ninio: f64, cap: f64, n1: usize, n2: usize) -> f64 {
    let diff = (n1 as f64 - n2 as f64).abs();
    (diff * ninio).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;
    use crate::model::{Conditions, ParameterTable};
    use crate::rig::Pf;

    fn model() -> Model {
        let table = ParameterTable {
            stack: vec![vec![0.0; 4]; 4],
            hairpin_length: vec![5.0, 5.0, 5.0, 4.5, 4.0, 4.3, 4.1],
            bulge_length: (0..40).map(|i| 4.0 - i as f64 * 0.01).collect(),
            interior_length: (0..40).map(|i| i as f64 * 0.1).collect(),
            ninio: 0.5,
            ninio_cap: 3.0,
            log_loop_penalty: 1.75,
            multi_init: 3.4,
            multi_base: 0.0,
            multi_pair: 0.4,
            terminal_penalty: 0.5,
            join_penalty: 1.96,
            dangle5: vec![vec![0.0; 4]; 4],
            dangle3: vec![vec![0.0; 4]; 4],
            coaxial: vec![vec![0.0; 4]; 4],
        };
        Model::from_table(Alphabet::rna(), table, Conditions::default()).unwrap()
    }

    #[test]
    fn reserve_is_monotonic() {
        let mut c: CachedModel<Pf> = CachedModel::new(model());
        assert!(c.reserve(50));
        assert_eq!(c.capacity(), 50);
        assert!(!c.reserve(10));
        assert_eq!(c.capacity(), 50);
        assert!(c.reserve(100));
        assert_eq!(c.capacity(), 100);
    }

    #[test]
    fn multiloop_factors_are_positive_boltzmann_factors() {
        let c: CachedModel<Pf> = CachedModel::new(model());
        assert!(c.multi1().to_f64() > 0.0);
        assert!(c.multi2().to_f64() > 0.0);
        assert!((c.multi12().to_f64() - c.multi1().to_f64() * c.multi2().to_f64()).abs() < 1e-9);
    }

    #[test]
    fn bulge_table_reversed_is_consistent() {
        let mut c: CachedModel<Pf> = CachedModel::new(model());
        c.reserve(60);
        for s in 1..59 {
            assert!((c.bulge(s).to_f64() - c.rbulge(59 - s).to_f64()).abs() < 1e-9);
        }
    }

    #[test]
    fn dangle_lookup_falls_back_to_zero_outside_table() {
        let c: CachedModel<Pf> = CachedModel::new(model());
        let base = crate::base::Base::from_index(0);
        assert!((c.dangle5(base, base).to_f64() - 1.0).abs() < 1e-9);
    }
}
