use keeper_core::{KeeperError, Result};
use std::sync::atomic::{AtomicBool, Ordering};

/// Single-holder lock around every scheduler job.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: AtomicBool,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock, or fail with `ReentrancyViolation` if a job is running.
    pub fn enter(&self) -> Result<EnteredGuard<'_>> {
        self.entered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| KeeperError::ReentrancyViolation)?;
        Ok(EnteredGuard { guard: self })
    }

    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }

    fn release(&self) {
        self.entered.store(false, Ordering::SeqCst);
    }
}

/// RAII guard for a running job.
/// Releases the lock when dropped, whether the job succeeded or not.
pub struct EnteredGuard<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for EnteredGuard<'_> {
    fn drop(&mut self) {
        self.guard.release();
    }
}
