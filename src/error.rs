//! Crate-wide error type.

use thiserror::Error;

/// Errors produced by the thermodynamic engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A sequence, structure, or alphabet string failed to parse or violates
    /// a structural invariant (unbalanced parens, unknown letter, mismatched
    /// strand count, non-involutive pair list).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A supplied `ParameterTable` is incomplete or internally inconsistent
    /// (missing entries, non-finite energies) for the requested ensemble.
    #[error("invalid parameter table: {0}")]
    ParameterLoad(String),

    /// A Boltzmann factor or partition function exceeded the numeric range
    /// of `T` even after `Big<T>` renormalization, or decayed to zero when a
    /// nonzero probability was expected.
    #[error("numeric overflow during {0}")]
    Overflow(String),

    /// The equilibrium concentration solver failed to converge within the
    /// configured iteration budget.
    #[error("equilibrium solver did not converge after {iterations} iterations: {reason}")]
    EquilibriumSolve {
        /// Iterations attempted before giving up.
        iterations: usize,
        /// Human-readable explanation (stagnated step, non-finite objective).
        reason: String,
    },

    /// A caller-supplied cancellation flag was observed mid-computation.
    #[error("computation cancelled")]
    Cancelled,

    /// An internal invariant was violated; indicates a defect in this crate
    /// rather than bad caller input.
    #[error("internal error: {0}")]
    Bug(String),
}

/// Convenience alias for fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;
