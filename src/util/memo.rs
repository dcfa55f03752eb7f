//! Memoization of derived values keyed by their inputs.

use std::convert::Infallible;
use std::sync::Arc;

/// Single-slot memo: the value is recomputed only when the key changes.
///
/// Keys should capture every input of the computation (typically iterations
/// and `Arc` identities), so a derived value never mixes inputs from two
/// generations.
#[derive(Debug)]
pub struct Memo<K, V> {
    entry: Option<(K, Arc<V>)>,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self { entry: None }
    }
}

impl<K: PartialEq, V> Memo<K, V> {
    /// Empty memo.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `key`, computing it with `compute` on a miss.
    pub fn get_or_compute(
        &mut self,
        key: K,
        compute: impl FnOnce() -> V,
    ) -> Arc<V> {
        match self.try_get_or_compute(key, || Ok::<_, Infallible>(compute())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`get_or_compute`](Self::get_or_compute) for a fallible
    /// computation. An error leaves the previous entry in place.
    ///
    /// # Errors
    ///
    /// Returns whatever `compute` returns on a miss.
    pub fn try_get_or_compute<E>(
        &mut self,
        key: K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        if let Some((cached, value)) = &self.entry {
            if *cached == key {
                return Ok(Arc::clone(value));
            }
        }
        let value = Arc::new(compute()?);
        self.entry = Some((key, Arc::clone(&value)));
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recomputes_only_on_key_change() {
        let mut memo: Memo<(u64, usize), String> = Memo::new();
        let mut runs = 0;
        let a = memo.get_or_compute((0, 1), || {
            runs += 1;
            "first".to_owned()
        });
        let b = memo.get_or_compute((0, 1), || {
            runs += 1;
            "second".to_owned()
        });
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(runs, 1);

        let c = memo.get_or_compute((1, 1), || "third".to_owned());
        assert_eq!(*c, "third");
    }

    #[test]
    fn failed_computation_is_not_cached() {
        let mut memo: Memo<u64, u32> = Memo::new();
        assert_eq!(*memo.try_get_or_compute(0, || Ok::<_, ()>(1)).unwrap(), 1);
        assert!(memo.try_get_or_compute(1, || Err(())).is_err());
        assert_eq!(*memo.try_get_or_compute(1, || Ok::<_, ()>(2)).unwrap(), 2);
        assert_eq!(*memo.try_get_or_compute(1, || Ok::<_, ()>(3)).unwrap(), 2);
    }
}
