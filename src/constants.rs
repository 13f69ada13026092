//! Engine-wide tunable constants, bundled into a [`Config`] threaded
//! explicitly through the driver rather than living as module-level
//! statics — the crate holds no process-global mutable state.

/// Tunable limits and defaults for a single engine invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Worker-pool thread count. `0` means "let rayon pick".
    pub threads: usize,
    /// Soft byte budget for the block cache before LRU eviction kicks in.
    pub cache_bytes: usize,
    /// Maximum iterations for the equilibrium concentration solver.
    pub max_iters: usize,
    /// Trust-region minimum radius (dogleg solver).
    pub delta_min: f64,
    /// Trust-region maximum radius (dogleg solver).
    pub delta_max: f64,
    /// Initial trust-region radius.
    pub delta_init: f64,
    /// Convergence tolerance on the normalized gradient infinity-norm.
    pub tolerance: f64,
    /// Number of diagonals between cooperative-cancellation checks.
    pub cancellation_check_period: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: 0,
            cache_bytes: 512 * 1024 * 1024,
            max_iters: 10_000,
            delta_min: 1e-4,
            delta_max: 1e3,
            delta_init: 1.0,
            tolerance: 1e-9,
            cancellation_check_period: 16,
        }
    }
}
