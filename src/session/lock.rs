use std::sync::atomic::{AtomicBool, Ordering};

/// Single-slot gate allowing one mutation in flight per dataset.
///
/// Acquired before a mutation is sent and released once its completion has
/// been applied, whether it succeeded or failed.
#[derive(Debug, Default)]
pub struct MutationLock {
    held: AtomicBool,
}

impl MutationLock {
    /// Unheld lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock; `false` if it is already held.
    pub fn try_acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the lock. Releasing an unheld lock does nothing.
    pub fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    /// Whether a mutation currently holds the lock.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let lock = MutationLock::new();
        assert!(lock.try_acquire());
        assert!(!lock.try_acquire());
        assert!(lock.is_held());
        lock.release();
        assert!(!lock.is_held());
        assert!(lock.try_acquire());
    }
}
