//! Ledger Runtime - host for the vote program
//!
//! This crate provides the platform the vote program runs on:
//! - Ordered in-memory ledger with per-key revisions
//! - Buffered transactions committed as one batch
//! - Serialized invocation processing with commit notifications
//! - Disk persistence via sled

pub mod ledger_store;
pub mod persistence;
pub mod processor;
pub mod transaction;

#[cfg(test)]
mod tests;

pub use ledger_store::{LedgerSnapshot, LedgerStore, Revision};
pub use persistence::{LedgerMetadata, LedgerStorePersistence, PersistentStore};
pub use processor::{CommitUpdate, LedgerProcessor, TransactionResult};
pub use transaction::LedgerTransaction;

/// Capacity of the commit notification channel
pub const COMMIT_CHANNEL_CAPACITY: usize = 1024;
