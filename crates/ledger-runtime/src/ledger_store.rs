//! In-memory ledger storage
//!
//! Entries live in a `BTreeMap` so range scans come back in lexicographic
//! key order, which is what candidate listing relies on.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};

/// Commit counter. Every committed write set bumps it by one.
pub type Revision = u64;

/// Point-in-time copy of the ledger
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    /// Revision the copy was taken at
    pub revision: Revision,
    /// Every entry with the revision it was last written at, in key order
    pub entries: Vec<(String, Vec<u8>, Revision)>,
}

/// Thread-safe in-memory ledger
#[derive(Clone)]
pub struct LedgerStore {
    /// Main entry storage, ordered by key
    entries: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    /// Track which revision each key was last written at
    key_revisions: Arc<DashMap<String, Revision>>,
}

impl LedgerStore {
    /// Create a new empty ledger
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
            key_revisions: Arc::new(DashMap::new()),
        }
    }

    /// Get the value stored at `key`
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().get(key).cloned()
    }

    /// Get a value with the revision it was last written at
    pub fn get_with_revision(&self, key: &str) -> Option<(Vec<u8>, Revision)> {
        let value = self.get(key)?;
        let revision = self.key_revisions.get(key).map(|r| *r).unwrap_or(0);
        Some((value, revision))
    }

    /// Store a single entry
    pub fn put(&self, key: String, value: Vec<u8>, revision: Revision) {
        let mut entries = self.entries.write();
        self.key_revisions.insert(key.clone(), revision);
        entries.insert(key, value);
    }

    /// Store a write set under a single write lock
    ///
    /// Readers see either none or all of the batch.
    pub fn put_batch(&self, writes: Vec<(String, Vec<u8>)>, revision: Revision) {
        let mut entries = self.entries.write();
        for (key, value) in writes {
            self.key_revisions.insert(key.clone(), revision);
            entries.insert(key, value);
        }
    }

    /// Entries with `start <= key < end`, in key order
    pub fn range(&self, start: &str, end: &str) -> Vec<(String, Vec<u8>)> {
        if start >= end {
            return Vec::new();
        }
        self.entries
            .read()
            .range::<str, _>((
                std::ops::Bound::Included(start),
                std::ops::Bound::Excluded(end),
            ))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Copy every entry and its revision under one read lock
    ///
    /// Revisions are only written while the entry lock is held for writing,
    /// so the copy never mixes two halves of a batch.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let entries = self.entries.read();
        let entries: Vec<(String, Vec<u8>, Revision)> = entries
            .iter()
            .map(|(key, value)| {
                let revision = self.key_revisions.get(key).map(|r| *r).unwrap_or(0);
                (key.clone(), value.clone(), revision)
            })
            .collect();
        let revision = entries.iter().map(|(_, _, r)| *r).max().unwrap_or(0);

        LedgerSnapshot { revision, entries }
    }

    /// Get entry count
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if ledger is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Highest revision recorded for any key
    pub fn latest_revision(&self) -> Revision {
        self.key_revisions
            .iter()
            .map(|r| *r.value())
            .max()
            .unwrap_or(0)
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let store = LedgerStore::new();
        store.put("VOTER0".to_string(), b"{\"voted\":false}".to_vec(), 1);

        assert_eq!(store.get("VOTER0").unwrap(), b"{\"voted\":false}");
        assert!(store.get("VOTER1").is_none());
    }

    #[test]
    fn test_get_with_revision() {
        let store = LedgerStore::new();
        store.put("ELECTION".to_string(), vec![1], 42);

        let (_, revision) = store.get_with_revision("ELECTION").unwrap();
        assert_eq!(revision, 42);
        assert_eq!(store.latest_revision(), 42);
    }

    #[test]
    fn test_range_is_lexicographic_and_end_exclusive() {
        let store = LedgerStore::new();
        for key in ["CANDIDATE2", "CANDIDATE10", "CANDIDATE999", "CANDIDATE0", "VOTER0"] {
            store.put(key.to_string(), vec![], 1);
        }

        let keys: Vec<String> = store
            .range("CANDIDATE0", "CANDIDATE999")
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, ["CANDIDATE0", "CANDIDATE10", "CANDIDATE2"]);
    }

    #[test]
    fn test_empty_range() {
        let store = LedgerStore::new();
        store.put("B".to_string(), vec![], 1);
        assert!(store.range("C", "A").is_empty());
        assert!(store.range("B", "B").is_empty());
    }

    #[test]
    fn test_put_batch() {
        let store = LedgerStore::new();
        store.put_batch(
            vec![("A".to_string(), vec![1]), ("B".to_string(), vec![2])],
            7,
        );
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_with_revision("B").unwrap(), (vec![2], 7));
    }

    #[test]
    fn test_snapshot_copies_entries_and_revisions() {
        let store = LedgerStore::new();
        store.put("VOTER0".to_string(), vec![0], 2);
        store.put_batch(
            vec![("CANDIDATE0".to_string(), vec![1]), ("VOTER0".to_string(), vec![9])],
            5,
        );

        let snapshot = store.snapshot();
        assert_eq!(snapshot.revision, 5);
        assert_eq!(
            snapshot.entries,
            vec![
                ("CANDIDATE0".to_string(), vec![1], 5),
                ("VOTER0".to_string(), vec![9], 5),
            ]
        );

        // Later writes do not leak into an existing snapshot
        store.put("VOTER1".to_string(), vec![0], 6);
        assert_eq!(snapshot.entries.len(), 2);
    }
}
