//! One-shot shared result slot.

use std::sync::{Arc, Condvar, Mutex};

use super::lock;
use crate::error::PolyphonyError;

type Outcome<T> = Result<Arc<T>, PolyphonyError>;

struct Slot<T> {
    outcome: Mutex<Option<Outcome<T>>>,
    ready: Condvar,
}

/// Handle to a request that may still be in flight.
///
/// Clones share the same slot: every caller that joined a request observes
/// the same outcome once it lands.
pub struct Pending<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for Pending<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> std::fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending")
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl<T> Pending<T> {
    /// Unresolved slot.
    pub(crate) fn new() -> Self {
        Self {
            slot: Arc::new(Slot {
                outcome: Mutex::new(None),
                ready: Condvar::new(),
            }),
        }
    }

    pub(crate) fn complete(&self, outcome: Result<T, PolyphonyError>) {
        *lock(&self.slot.outcome) = Some(outcome.map(Arc::new));
        self.slot.ready.notify_all();
    }

    /// Whether the request has finished (successfully or not).
    #[must_use]
    pub fn is_ready(&self) -> bool {
        lock(&self.slot.outcome).is_some()
    }

    /// Non-blocking check for the outcome.
    #[must_use]
    pub fn try_get(&self) -> Option<Outcome<T>> {
        lock(&self.slot.outcome).clone()
    }

    /// Block until the outcome lands.
    pub fn wait(&self) -> Outcome<T> {
        let mut outcome = lock(&self.slot.outcome);
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            outcome = self
                .slot
                .ready
                .wait(outcome)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Whether `self` and `other` are handles to the same request.
    #[must_use]
    pub fn same_request(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_observe_completion() {
        let pending: Pending<u32> = Pending::new();
        let joined = pending.clone();
        assert!(!joined.is_ready());
        assert!(joined.try_get().is_none());

        pending.complete(Ok(7));
        assert!(joined.same_request(&pending));
        assert_eq!(*joined.wait().unwrap(), 7);
    }

    #[test]
    fn completion_from_another_thread_wakes_waiter() {
        let pending: Pending<&'static str> = Pending::new();
        let writer = pending.clone();
        let handle = std::thread::spawn(move || writer.complete(Ok("done")));
        assert_eq!(*pending.wait().unwrap(), "done");
        handle.join().unwrap();
    }
}
