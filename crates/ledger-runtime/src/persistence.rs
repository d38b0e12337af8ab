//! Persistence Layer for Ledger State
//!
//! Uses sled embedded database to persist ledger entries across restarts.
//! State is saved periodically and on shutdown.

use crate::ledger_store::{LedgerSnapshot, Revision};
use serde::{Deserialize, Serialize};
use sled::{
    transaction::{abort, TransactionError},
    Db, Transactional,
};
use std::path::Path;

const METADATA_KEY: &str = "ledger";

/// Metadata about the saved ledger
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerMetadata {
    /// Revision of the last committed write set
    pub revision: Revision,
    /// Total entries stored
    pub entry_count: u64,
    /// Last save timestamp
    pub last_save_ts: i64,
}

/// Persistent storage for ledger state
pub struct PersistentStore {
    /// Sled database instance
    db: Db,
    /// Entries tree
    entries: sled::Tree,
    /// Entry revisions tree (tracks when each key was written)
    revisions: sled::Tree,
    /// Metadata tree
    metadata: sled::Tree,
}

impl PersistentStore {
    /// Open or create a persistent store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let db = sled::open(&path)?;
        let entries = db.open_tree("entries")?;
        let revisions = db.open_tree("revisions")?;
        let metadata = db.open_tree("metadata")?;

        tracing::info!("Opened persistent store at {:?}", path.as_ref());

        Ok(Self {
            db,
            entries,
            revisions,
            metadata,
        })
    }

    /// Write a snapshot and its metadata in one sled transaction
    ///
    /// Either the whole snapshot lands on disk or none of it does. A snapshot
    /// older than the one already stored is skipped and reports 0 entries.
    pub fn write_snapshot(
        &self,
        snapshot: &LedgerSnapshot,
        last_save_ts: i64,
    ) -> anyhow::Result<usize> {
        let mut entry_batch = sled::Batch::default();
        let mut revision_batch = sled::Batch::default();
        for (key, value, revision) in &snapshot.entries {
            entry_batch.insert(key.as_bytes(), value.as_slice());
            revision_batch.insert(key.as_bytes(), revision.to_le_bytes().to_vec());
        }

        let metadata = LedgerMetadata {
            revision: snapshot.revision,
            entry_count: snapshot.entries.len() as u64,
            last_save_ts,
        };
        let metadata_bytes = bincode::serialize(&metadata)?;

        let written = (&self.entries, &self.revisions, &self.metadata).transaction(
            |(entries, revisions, meta)| {
                // Never replace a newer snapshot with an older one
                if let Some(bytes) = meta.get(METADATA_KEY)? {
                    if let Ok(stored) = bincode::deserialize::<LedgerMetadata>(&bytes) {
                        if stored.revision > snapshot.revision {
                            return abort(stored.revision);
                        }
                    }
                }

                entries.apply_batch(&entry_batch)?;
                revisions.apply_batch(&revision_batch)?;
                meta.insert(METADATA_KEY, metadata_bytes.as_slice())?;
                Ok(())
            },
        );

        match written {
            Ok(()) => {}
            Err(TransactionError::Abort(newer)) => {
                tracing::info!(
                    "Skipped snapshot at revision {}: revision {} already on disk",
                    snapshot.revision,
                    newer
                );
                return Ok(0);
            }
            Err(TransactionError::Storage(e)) => return Err(e.into()),
        }

        self.flush()?;
        tracing::info!(
            "Saved {} entries to disk at revision {}",
            snapshot.entries.len(),
            snapshot.revision
        );

        Ok(snapshot.entries.len())
    }

    /// Get all entries (for loading into memory)
    pub fn get_all_entries(&self) -> anyhow::Result<Vec<(String, Vec<u8>, Revision)>> {
        let mut entries = Vec::new();

        for result in self.entries.iter() {
            let (key, value) = result?;

            let revision = self.read_revision(&key)?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|_| anyhow::anyhow!("Invalid UTF-8 in ledger key"))?;

            entries.push((key, value.to_vec(), revision));
        }

        Ok(entries)
    }

    fn read_revision(&self, key: &[u8]) -> anyhow::Result<Revision> {
        Ok(match self.revisions.get(key)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_ref().try_into().unwrap_or([0u8; 8]);
                Revision::from_le_bytes(arr)
            }
            None => 0,
        })
    }

    /// Load ledger metadata
    pub fn load_metadata(&self) -> anyhow::Result<Option<LedgerMetadata>> {
        match self.metadata.get(METADATA_KEY)? {
            Some(bytes) => {
                let metadata: LedgerMetadata = bincode::deserialize(&bytes)?;
                Ok(Some(metadata))
            }
            None => Ok(None),
        }
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> anyhow::Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Get the number of stored entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Extension trait to add persistence to LedgerStore
pub trait LedgerStorePersistence {
    /// Load all entries from persistent storage
    fn load_from_disk(&self, store: &PersistentStore) -> anyhow::Result<usize>;
}

impl LedgerStorePersistence for crate::LedgerStore {
    fn load_from_disk(&self, store: &PersistentStore) -> anyhow::Result<usize> {
        let entries = store.get_all_entries()?;
        let count = entries.len();

        for (key, value, revision) in entries {
            self.put(key, value, revision);
        }

        tracing::info!("Loaded {} entries from disk", count);

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LedgerStore;
    use tempfile::tempdir;

    fn snapshot_of(entries: &[(&str, &[u8], Revision)]) -> LedgerSnapshot {
        let entries: Vec<(String, Vec<u8>, Revision)> = entries
            .iter()
            .map(|(k, v, r)| (k.to_string(), v.to_vec(), *r))
            .collect();
        let revision = entries.iter().map(|(_, _, r)| *r).max().unwrap_or(0);
        LedgerSnapshot { revision, entries }
    }

    #[test]
    fn test_write_snapshot_and_metadata() {
        let dir = tempdir().unwrap();
        let store = PersistentStore::open(dir.path()).unwrap();

        let snapshot = snapshot_of(&[
            ("CANDIDATE0", br#"{"name":"A","party":"B","votes":3}"#, 42),
            ("VOTER0", br#"{"voted":true}"#, 42),
            ("VOTER1", br#"{"voted":false}"#, 1),
        ]);
        assert_eq!(store.write_snapshot(&snapshot, 12345).unwrap(), 3);

        assert_eq!(store.entry_count(), 3);
        assert_eq!(
            store.load_metadata().unwrap().unwrap(),
            LedgerMetadata {
                revision: 42,
                entry_count: 3,
                last_save_ts: 12345,
            }
        );
        assert_eq!(store.get_all_entries().unwrap(), snapshot.entries);
    }

    #[test]
    fn test_later_snapshot_overwrites_entries() {
        let dir = tempdir().unwrap();
        let store = PersistentStore::open(dir.path()).unwrap();

        store
            .write_snapshot(&snapshot_of(&[("VOTER0", br#"{"voted":false}"#, 1)]), 1)
            .unwrap();
        store
            .write_snapshot(&snapshot_of(&[("VOTER0", br#"{"voted":true}"#, 2)]), 2)
            .unwrap();

        let entries = store.get_all_entries().unwrap();
        assert_eq!(entries, vec![("VOTER0".to_string(), br#"{"voted":true}"#.to_vec(), 2)]);
        assert_eq!(store.load_metadata().unwrap().unwrap().revision, 2);
    }

    #[test]
    fn test_older_snapshot_is_skipped() {
        let dir = tempdir().unwrap();
        let store = PersistentStore::open(dir.path()).unwrap();

        store
            .write_snapshot(&snapshot_of(&[("VOTER0", br#"{"voted":true}"#, 5)]), 2)
            .unwrap();
        let written = store
            .write_snapshot(&snapshot_of(&[("VOTER0", br#"{"voted":false}"#, 4)]), 3)
            .unwrap();

        assert_eq!(written, 0);
        assert_eq!(
            store.get_all_entries().unwrap(),
            vec![("VOTER0".to_string(), br#"{"voted":true}"#.to_vec(), 5)]
        );
        assert_eq!(store.load_metadata().unwrap().unwrap().last_save_ts, 2);
    }

    #[test]
    fn test_empty_store_has_no_metadata() {
        let dir = tempdir().unwrap();
        let store = PersistentStore::open(dir.path()).unwrap();
        assert!(store.load_metadata().unwrap().is_none());
        assert!(store.get_all_entries().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_reload_ledger() {
        let dir = tempdir().unwrap();
        let persistent = PersistentStore::open(dir.path()).unwrap();

        let ledger = LedgerStore::new();
        ledger.put("ELECTION".to_string(), br#"{"ended":true}"#.to_vec(), 3);
        ledger.put("VOTER0".to_string(), br#"{"voted":true}"#.to_vec(), 2);
        assert_eq!(persistent.write_snapshot(&ledger.snapshot(), 0).unwrap(), 2);

        let restored = LedgerStore::new();
        assert_eq!(restored.load_from_disk(&persistent).unwrap(), 2);
        assert_eq!(restored.get_with_revision("VOTER0").unwrap().1, 2);
        assert_eq!(restored.latest_revision(), 3);
    }
}
