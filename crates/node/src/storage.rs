//! On-disk ledger handling for the node
//!
//! Opens the sled store, loads it into memory, seeds a fresh ledger and
//! writes snapshots back.

use ledger_runtime::{LedgerProcessor, LedgerStore, LedgerStorePersistence, PersistentStore};
use std::{path::Path, sync::Arc};

/// Ledger loaded from disk, ready to serve
pub struct NodeLedger {
    pub persistent: Arc<PersistentStore>,
    pub store: Arc<LedgerStore>,
    pub processor: Arc<LedgerProcessor>,
}

impl NodeLedger {
    /// Open the data directory and load whatever was saved there
    pub fn open(data_dir: &Path, seed_on_empty: bool) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let persistent = Arc::new(PersistentStore::open(data_dir)?);
        let store = Arc::new(LedgerStore::new());

        match persistent.load_metadata()? {
            Some(metadata) => {
                tracing::info!(
                    "Loading state from disk: revision {}, {} entries",
                    metadata.revision,
                    metadata.entry_count
                );
                let on_disk = persistent.entry_count() as u64;
                if on_disk != metadata.entry_count {
                    tracing::warn!(
                        "Metadata lists {} entries but {} are stored",
                        metadata.entry_count,
                        on_disk
                    );
                }
            }
            None => tracing::info!("No existing state found, starting fresh"),
        }
        store.load_from_disk(&persistent)?;

        let processor = Arc::new(LedgerProcessor::new(store.clone()));
        let ledger = Self {
            persistent,
            store,
            processor,
        };

        if seed_on_empty && ledger.store.is_empty() {
            let result = ledger.processor.invoke("initLedger", &[]);
            if let Err(e) = result.outcome {
                anyhow::bail!("failed to seed ledger: {}", e);
            }
            tracing::info!("Seeded empty ledger at revision {}", result.revision);
            ledger.save()?;
        }

        Ok(ledger)
    }

    /// Write every entry plus metadata to disk
    pub fn save(&self) -> anyhow::Result<usize> {
        save_snapshot(&self.processor, &self.persistent)
    }
}

/// Snapshot the committed ledger and write it to `persistent`
///
/// Blocks on the commit lock and on sled I/O.
pub fn save_snapshot(
    processor: &LedgerProcessor,
    persistent: &PersistentStore,
) -> anyhow::Result<usize> {
    let snapshot = processor.snapshot();
    persistent.write_snapshot(&snapshot, chrono::Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use vote_program::Response;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_fresh_directory_is_seeded() {
        let dir = tempdir().unwrap();
        let ledger = NodeLedger::open(dir.path(), true).unwrap();

        assert_eq!(ledger.store.len(), 15);
        let metadata = ledger.persistent.load_metadata().unwrap().unwrap();
        assert_eq!(metadata.revision, 1);
        assert_eq!(metadata.entry_count, 15);
    }

    #[test]
    fn test_no_seed_when_disabled() {
        let dir = tempdir().unwrap();
        let ledger = NodeLedger::open(dir.path(), false).unwrap();
        assert!(ledger.store.is_empty());
    }

    #[test]
    fn test_reopen_keeps_votes() {
        let dir = tempdir().unwrap();
        {
            let ledger = NodeLedger::open(dir.path(), true).unwrap();
            ledger.processor.invoke("startElection", &[]);
            let result = ledger.processor.invoke("castVote", &args(&["VOTER9", "CANDIDATE2"]));
            assert!(result.committed());
            ledger.save().unwrap();
        }

        let ledger = NodeLedger::open(dir.path(), true).unwrap();
        assert_eq!(ledger.processor.current_revision(), 3);

        let result = ledger.processor.invoke("queryVoter", &args(&["VOTER9"]));
        assert_eq!(result.response(), Response::Success(br#"{"voted":true}"#.to_vec()));
    }
}
