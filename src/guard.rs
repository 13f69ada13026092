//! Lock-free stage guard for cached block data shared across worker
//! threads: readers proceed whenever the guard's stage bit matches the
//! requester's expected stage, and an "upgrade" to exclusive access is
//! acquired by swinging the counter deeply negative so in-flight and new
//! readers can tell a writer holds it.

use std::sync::atomic::{AtomicI64, Ordering};

/// Large negative offset used to mark exclusive (writer) ownership. Chosen
/// far below any plausible concurrent reader count so a writer's presence
/// is unambiguous from the sign alone.
const EXCLUSIVE_BIAS: i64 = 100_000;

/// A stage-versioned read/write guard. Each even/odd "stage" represents a
/// precision tier (e.g. single vs. double precision fallback); a read
/// succeeds only if the guard is not exclusively locked and its stage
/// parity matches the caller's expectation.
#[derive(Debug)]
pub struct Guard {
    value: AtomicI64,
}

impl Default for Guard {
    fn default() -> Self {
        Self::new()
    }
}

impl Guard {
    /// A fresh guard at stage 0, unlocked.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: AtomicI64::new(0),
        }
    }

    /// Attempt a read lock for `stage` (0 or 1). Returns `true` (and holds
    /// the read count incremented) if granted; the caller must call
    /// [`Self::release_read`] exactly once per successful call.
    pub fn try_read_lock(&self, stage: i64) -> bool {
        let v = self.value.fetch_add(2, Ordering::AcqRel) + 2;
        let granted = v >= 0 && v % 2 == stage.rem_euclid(2);
        if !granted {
            self.value.fetch_sub(2, Ordering::AcqRel);
        }
        granted
    }

    /// Spin-wait for a read lock at `stage`, backing off briefly between
    /// attempts while an exclusive writer holds the guard.
    pub fn read_lock(&self, stage: i64) {
        loop {
            let v = self.value.fetch_add(2, Ordering::AcqRel) + 2;
            if v >= 0 && v % 2 == stage.rem_euclid(2) {
                return;
            }
            self.value.fetch_sub(2, Ordering::AcqRel);
            std::hint::spin_loop();
        }
    }

    /// Release a read lock acquired via [`Self::read_lock`] or
    /// [`Self::try_read_lock`].
    pub fn release_read(&self) {
        self.value.fetch_sub(2, Ordering::AcqRel);
    }

    /// Acquire exclusive (upgrade) access, spinning until no readers remain
    /// and no other writer holds it.
    pub fn upgrade_lock(&self) {
        loop {
            if self
                .value
                .compare_exchange_weak(0, -EXCLUSIVE_BIAS, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
            std::hint::spin_loop();
        }
    }

    /// Release an exclusive lock, bumping the stage parity so the next
    /// generation of readers observes the new stage.
    pub fn release_upgrade(&self) {
        self.value.store(1, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_guard_grants_stage_zero_reads() {
        let g = Guard::new();
        assert!(g.try_read_lock(0));
        g.release_read();
    }

    #[test]
    fn fresh_guard_rejects_stage_one_reads() {
        let g = Guard::new();
        assert!(!g.try_read_lock(1));
    }

    #[test]
    fn upgrade_then_release_flips_stage_parity() {
        let g = Guard::new();
        g.upgrade_lock();
        g.release_upgrade();
        assert!(g.try_read_lock(1));
    }
}
