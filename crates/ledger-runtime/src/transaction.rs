//! LedgerState implementation for a single invocation
//!
//! Writes are buffered and only reach the store when the processor commits
//! them. Reads see the transaction's own writes first.

use crate::ledger_store::LedgerStore;
use std::collections::BTreeMap;
use vote_program::{LedgerError, LedgerState};

/// Buffered view over the ledger
pub struct LedgerTransaction<'a> {
    /// Committed state
    store: &'a LedgerStore,
    /// Pending writes, last write per key wins
    writes: BTreeMap<String, Vec<u8>>,
}

impl<'a> LedgerTransaction<'a> {
    /// Begin a transaction over `store`
    pub fn new(store: &'a LedgerStore) -> Self {
        Self {
            store,
            writes: BTreeMap::new(),
        }
    }

    /// Check if nothing has been written
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }

    /// Consume the transaction, returning its write set
    pub fn into_writes(self) -> Vec<(String, Vec<u8>)> {
        self.writes.into_iter().collect()
    }
}

impl LedgerState for LedgerTransaction<'_> {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        if let Some(value) = self.writes.get(key) {
            return Ok(Some(value.clone()));
        }
        Ok(self.store.get(key))
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
        if key.is_empty() {
            return Err(LedgerError::Write {
                key: key.to_string(),
                reason: "key must not be empty".to_string(),
            });
        }
        self.writes.insert(key.to_string(), value);
        Ok(())
    }

    fn get_state_by_range(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, LedgerError> {
        let mut merged: BTreeMap<String, Vec<u8>> = self.store.range(start, end).into_iter().collect();

        for (key, value) in &self.writes {
            if key.as_str() >= start && key.as_str() < end {
                merged.insert(key.clone(), value.clone());
            }
        }

        Ok(merged.into_iter().collect())
    }
}
