//! Energy parameters and environmental conditions.
//!
//! [`ParameterTable`] is a plain value type populated by an external loader
//! (parameter-file parsing is explicitly out of scope for this crate, see
//! `SPEC_FULL.md` §6); [`Model`] combines a table with an [`Alphabet`] and
//! the conditions (temperature, ion concentrations) under which energies
//! are evaluated.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::alphabet::Alphabet;
use crate::error::{Error, Result};

bitflags! {
    /// Which ionic corrections [`salt_correct`] applies. Disabling a term is
    /// useful when comparing against parameter sets fit without it, or when
    /// a caller supplies energies that already include one correction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CorrectionTerms: u8 {
        /// Apply the monovalent (sodium-equivalent) correction.
        const SODIUM = 0b01;
        /// Fold magnesium into the sodium-equivalent concentration.
        const MAGNESIUM = 0b10;
        /// Both corrections, the default.
        const ALL = Self::SODIUM.bits() | Self::MAGNESIUM.bits();
    }
}

impl Default for CorrectionTerms {
    fn default() -> Self {
        Self::ALL
    }
}

/// Raw thermodynamic parameters for one ensemble (e.g. RNA at 37C), as
/// loaded from an external parameter file. All energies are in kcal/mol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterTable {
    /// Per-base-pair stacking energies, indexed `[5' base][3' base]`.
    pub stack: Vec<Vec<f64>>,
    /// Hairpin loop initiation energy by loop length (index = length).
    pub hairpin_length: Vec<f64>,
    /// Bulge loop initiation energy by loop length.
    pub bulge_length: Vec<f64>,
    /// Interior loop initiation energy by total loop length.
    pub interior_length: Vec<f64>,
    /// Ninio asymmetry penalty coefficient.
    pub ninio: f64,
    /// Maximum total per-loop asymmetry penalty.
    pub ninio_cap: f64,
    /// Per-nucleotide penalty applied above `log_loop_penalty` extrapolation
    /// length (Jacobson-Stockmayer extrapolation coefficient).
    pub log_loop_penalty: f64,
    /// Multiloop initiation penalty.
    pub multi_init: f64,
    /// Multiloop per-unpaired-base penalty.
    pub multi_base: f64,
    /// Multiloop per-branch penalty.
    pub multi_pair: f64,
    /// Terminal AU/GU penalty.
    pub terminal_penalty: f64,
    /// Cost of joining two strands into one complex (entropic, per join).
    pub join_penalty: f64,
    /// Dangle / terminal-mismatch energies, by (closing pair, unpaired base).
    pub dangle5: Vec<Vec<f64>>,
    /// As `dangle5`, for the 3' overhang.
    pub dangle3: Vec<Vec<f64>>,
    /// Coaxial stacking bonus by adjoining pair indices.
    pub coaxial: Vec<Vec<f64>>,
}

impl ParameterTable {
    /// Check that every numeric table is non-empty and free of NaNs.
    pub fn validate(&self) -> Result<()> {
        let all_finite = |name: &str, v: &[f64]| -> Result<()> {
            if v.iter().any(|x| x.is_nan()) {
                return Err(Error::ParameterLoad(format!("{name} contains NaN")));
            }
            Ok(())
        };
        all_finite("hairpin_length", &self.hairpin_length)?;
        all_finite("bulge_length", &self.bulge_length)?;
        all_finite("interior_length", &self.interior_length)?;
        if self.hairpin_length.is_empty() {
            return Err(Error::ParameterLoad("hairpin_length table is empty".into()));
        }
        Ok(())
    }
}

/// Environmental conditions under which the model's energies are evaluated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Conditions {
    /// Temperature in Kelvin.
    pub temperature: f64,
    /// Sodium ion concentration in molar.
    pub sodium: f64,
    /// Magnesium ion concentration in molar.
    pub magnesium: f64,
}

impl Default for Conditions {
    fn default() -> Self {
        Self {
            temperature: 310.15,
            sodium: 1.0,
            magnesium: 0.0,
        }
    }
}

const GAS_CONSTANT_KCAL: f64 = 1.987_204e-3;

/// Applies the standard salt-concentration correction to a loop initiation
/// energy: a logarithmic correction in effective monovalent-equivalent salt
/// concentration, kept as model semantics (not file-parsing) per
/// `SPEC_FULL.md` §6. `terms` selects which ionic contributions are folded
/// into the effective concentration.
#[must_use]
pub fn salt_correct(energy: f64, conditions: Conditions, loop_len: f64, terms: CorrectionTerms) -> f64 {
    let mut effective_na = 0.0;
    if terms.contains(CorrectionTerms::SODIUM) {
        effective_na += conditions.sodium;
    }
    if terms.contains(CorrectionTerms::MAGNESIUM) {
        effective_na += 3.3 * conditions.magnesium.sqrt();
    }
    if effective_na <= 0.0 {
        return energy;
    }
    let correction = -0.114 * loop_len * effective_na.ln();
    energy + correction
}

/// A complete energy model: parameters, alphabet, and conditions, immutable
/// once constructed. Changing temperature requires building a new `Model`
/// rather than mutating this one, matching the reference's "clear cache and
/// rebuild" temperature-change behavior expressed as value replacement.
#[derive(Debug, Clone)]
pub struct Model {
    alphabet: Alphabet,
    parameters: ParameterTable,
    conditions: Conditions,
    beta: f64,
}

impl Model {
    /// Construct a model from a validated parameter table.
    pub fn from_table(alphabet: Alphabet, parameters: ParameterTable, conditions: Conditions) -> Result<Self> {
        parameters.validate()?;
        let beta = 1.0 / (GAS_CONSTANT_KCAL * conditions.temperature);
        Ok(Self {
            alphabet,
            parameters,
            conditions,
            beta,
        })
    }

    /// The alphabet this model was built against.
    #[must_use]
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Raw parameter table.
    #[must_use]
    pub fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    /// Environmental conditions.
    #[must_use]
    pub fn conditions(&self) -> Conditions {
        self.conditions
    }

    /// Inverse temperature `1/(R*T)`.
    #[must_use]
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Build a copy of this model at a different temperature.
    #[must_use]
    pub fn at_temperature(&self, kelvin: f64) -> Self {
        let conditions = Conditions {
            temperature: kelvin,
            ..self.conditions
        };
        Self {
            alphabet: self.alphabet.clone(),
            parameters: self.parameters.clone(),
            conditions,
            beta: 1.0 / (GAS_CONSTANT_KCAL * kelvin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ParameterTable {
        ParameterTable {
            stack: vec![vec![0.0; 4]; 4],
            hairpin_length: vec![5.0, 5.0, 5.0, 4.5, 4.0],
            bulge_length: vec![4.0, 3.5, 3.0],
            interior_length: vec![0.0, 0.0, 1.0, 1.5],
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
        }
    }

    #[test]
    fn model_builds_from_valid_table() {
        let m = Model::from_table(Alphabet::rna(), table(), Conditions::default());
        assert!(m.is_ok());
    }

    #[test]
    fn salt_correction_lowers_energy_with_more_salt() {
        let low = Conditions { sodium: 0.05, magnesium: 0.0, temperature: 310.15 };
        let high = Conditions { sodium: 1.0, magnesium: 0.0, temperature: 310.15 };
        assert!(
            salt_correct(5.0, high, 4.0, CorrectionTerms::ALL)
                < salt_correct(5.0, low, 4.0, CorrectionTerms::ALL)
        );
    }

    #[test]
    fn disabling_magnesium_term_ignores_magnesium_concentration() {
        let conditions = Conditions { sodium: 1.0, magnesium: 10.0, temperature: 310.15 };
        let sodium_only = salt_correct(5.0, conditions, 4.0, CorrectionTerms::SODIUM);
        let without_mg = salt_correct(5.0, Conditions { magnesium: 0.0, ..conditions }, 4.0, CorrectionTerms::ALL);
        assert!((sodium_only - without_mg).abs() < 1e-12);
    }

    #[test]
    fn rejects_nan_parameters() {
        let mut t = table();
        t.hairpin_length[0] = f64::NAN;
        let m = Model::from_table(Alphabet::rna(), t, Conditions::default());
        assert!(m.is_err());
    }
}
