//! Ledger access used by the program
//!
//! The program never owns state. Every handler reads and writes through this
//! trait, and the host decides what a transaction is and when it commits.

use crate::error::LedgerError;

/// Key-value view of the ledger for a single invocation
pub trait LedgerState {
    /// Read the bytes stored at `key`
    ///
    /// Returns `None` when the key has never been written.
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;

    /// Write `value` at `key`, replacing anything stored there
    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), LedgerError>;

    /// Entries with `start <= key < end` in lexicographic byte order
    fn get_state_by_range(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, LedgerError>;
}

/// Read `key`, treating a zero-length value the same as a missing one
pub fn get_present<L: LedgerState + ?Sized>(
    ledger: &L,
    key: &str,
) -> Result<Option<Vec<u8>>, LedgerError> {
    Ok(ledger.get_state(key)?.filter(|bytes| !bytes.is_empty()))
}
