//! Derivation cache for characteristic evaluators.
//!
//! Deriving a characteristic symbolically is orders of magnitude more
//! expensive than evaluating it, and the result depends only on the model, the
//! characteristic and the lactation length. Entries are created lazily,
//! published behind an `Arc` and never invalidated.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::domain::{Characteristic, ModelKind, PersistencyMethod};
use crate::error::Result;
use crate::symbolic::{Expr, Program};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub model: ModelKind,
    pub characteristic: Characteristic,
    /// Only set for [`Characteristic::Persistency`].
    pub method: Option<PersistencyMethod>,
    pub lactation_length: u32,
}

impl CacheKey {
    pub fn new(model: ModelKind, characteristic: Characteristic, method: PersistencyMethod, lactation_length: u32) -> Self {
        let method = (characteristic == Characteristic::Persistency).then_some(method);
        CacheKey {
            model,
            characteristic,
            method,
            lactation_length,
        }
    }
}

/// Where an entry's evaluator came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Symbolic,
    Numeric,
}

#[derive(Debug, Clone)]
pub enum Evaluator {
    /// Time-free closed form of the parameters.
    Closed(Program),
    /// Candidate roots of `dy/dt = 0`, with `y''` for the maximum test and,
    /// for peak yield, the formula evaluated at each root.
    Stationary {
        roots: Vec<Program>,
        curvature: Program,
        values: Option<Vec<Program>>,
    },
    /// No closed form; evaluate on the day grid.
    Numeric,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Symbolic results, `None` for numeric entries.
    pub expressions: Option<Vec<Expr>>,
    /// Parameter symbols in the order the evaluator expects.
    pub params: &'static [&'static str],
    pub evaluator: Evaluator,
    pub origin: Origin,
}

impl CacheEntry {
    pub fn numeric(params: &'static [&'static str]) -> Self {
        CacheEntry {
            expressions: None,
            params,
            evaluator: Evaluator::Numeric,
            origin: Origin::Numeric,
        }
    }
}

/// Shared get-or-compute store of derived evaluators.
#[derive(Debug, Default)]
pub struct CharacteristicCache {
    entries: RwLock<HashMap<CacheKey, Arc<CacheEntry>>>,
    derivations: AtomicUsize,
}

impl CharacteristicCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    /// Return the cached entry for `key`, deriving and publishing it on a miss.
    ///
    /// Two threads missing on the same key may both derive; the last insert
    /// wins and both results are equivalent. Failed derivations are not cached.
    pub fn get_or_compute<F>(&self, key: CacheKey, derive: F) -> Result<Arc<CacheEntry>>
    where
        F: FnOnce() -> Result<CacheEntry>,
    {
        if let Some(entry) = self.get(&key) {
            return Ok(entry);
        }

        let entry = Arc::new(derive()?);
        self.derivations.fetch_add(1, Ordering::Relaxed);
        debug!(
            model = key.model.name(),
            characteristic = key.characteristic.name(),
            lactation_length = key.lactation_length,
            origin = ?entry.origin,
            "characteristic cached"
        );

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, Arc::clone(&entry));
        Ok(entry)
    }

    /// Number of derivations performed so far.
    pub fn derivations(&self) -> usize {
        self.derivations.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LactationError;

    fn key(length: u32) -> CacheKey {
        CacheKey::new(ModelKind::Wood, Characteristic::TimeToPeak, PersistencyMethod::Derived, length)
    }

    #[test]
    fn computes_once_per_key() {
        let cache = CharacteristicCache::new();
        let first = cache.get_or_compute(key(305), || Ok(CacheEntry::numeric(&["a"]))).unwrap();
        let second = cache
            .get_or_compute(key(305), || Err(LactationError::symbolic("must not run")))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.derivations(), 1);

        cache.get_or_compute(key(200), || Ok(CacheEntry::numeric(&["a"]))).unwrap();
        assert_eq!(cache.derivations(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = CharacteristicCache::new();
        assert!(cache.get_or_compute(key(305), || Err(LactationError::unsupported("no"))).is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.derivations(), 0);
    }

    #[test]
    fn method_only_keys_persistency() {
        let ttp_a = CacheKey::new(ModelKind::Wood, Characteristic::TimeToPeak, PersistencyMethod::Derived, 305);
        let ttp_b = CacheKey::new(ModelKind::Wood, Characteristic::TimeToPeak, PersistencyMethod::Literature, 305);
        assert_eq!(ttp_a, ttp_b);
        let p_a = CacheKey::new(ModelKind::Wood, Characteristic::Persistency, PersistencyMethod::Derived, 305);
        let p_b = CacheKey::new(ModelKind::Wood, Characteristic::Persistency, PersistencyMethod::Literature, 305);
        assert_ne!(p_a, p_b);
    }

    #[test]
    fn cache_is_shareable_across_threads() {
        let cache = Arc::new(CharacteristicCache::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache.get_or_compute(key(305), || Ok(CacheEntry::numeric(&["a"]))).map(|_| ())
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }
        assert_eq!(cache.len(), 1);
        assert!(cache.derivations() >= 1);
    }
}
