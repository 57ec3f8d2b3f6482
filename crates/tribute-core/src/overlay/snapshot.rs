//! First-touch snapshots of external resources

use crate::error::HostResult;
use indexmap::IndexMap;
use std::hash::Hash;

/// Original values of resources touched by overlays, keyed by resource
///
/// A value is captured the first time any overlay touches a resource and is
/// never overwritten while it is held, so restoring always reproduces the
/// state from before the first overlay.
#[derive(Debug, Clone)]
pub struct SnapshotStore<K, V> {
    originals: IndexMap<K, V>,
}

impl<K: Eq + Hash, V> SnapshotStore<K, V> {
    pub fn new() -> Self {
        Self {
            originals: IndexMap::new(),
        }
    }

    /// Capture the original value of `key` unless one is already held
    ///
    /// `read` is only called for unknown keys. It may report the resource as
    /// missing (`Ok(None)`), in which case nothing is captured. Returns whether
    /// a snapshot is held for `key` afterwards.
    pub fn capture_with<F>(&mut self, key: K, read: F) -> HostResult<bool>
    where
        F: FnOnce() -> HostResult<Option<V>>,
    {
        if self.originals.contains_key(&key) {
            return Ok(true);
        }
        match read()? {
            Some(original) => {
                self.originals.insert(key, original);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.originals.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.originals.contains_key(key)
    }

    /// Forget snapshots for which `keep` returns false
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.originals.retain(|key, _| keep(key));
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }
}

impl<K: Eq + Hash, V> Default for SnapshotStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;

    #[test]
    fn test_capture_is_idempotent() {
        let mut store = SnapshotStore::new();
        assert!(store.capture_with("hp", || Ok(Some(10))).unwrap());
        // Second capture must not read or overwrite
        assert!(store
            .capture_with("hp", || -> HostResult<Option<i32>> {
                panic!("read called for a known key")
            })
            .unwrap());
        assert_eq!(store.get(&"hp"), Some(&10));
    }

    #[test]
    fn test_missing_resource_is_not_captured() {
        let mut store: SnapshotStore<&str, i32> = SnapshotStore::new();
        assert!(!store.capture_with("hp", || Ok(None)).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_read_failure_propagates() {
        let mut store: SnapshotStore<&str, i32> = SnapshotStore::new();
        let result = store.capture_with("hp", || Err(HostError::Unavailable("hp".into())));
        assert!(result.is_err());
        assert!(!store.contains(&"hp"));
    }

    #[test]
    fn test_retain() {
        let mut store = SnapshotStore::new();
        store.capture_with(1, || Ok(Some("a"))).unwrap();
        store.capture_with(2, || Ok(Some("b"))).unwrap();
        store.retain(|key| *key == 2);
        assert_eq!(store.len(), 1);
        assert!(store.contains(&2));
    }
}
