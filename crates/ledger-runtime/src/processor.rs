//! Ledger Processor
//!
//! Runs vote program invocations one at a time. Each invocation gets a fresh
//! [`LedgerTransaction`]; its write set is committed as one batch when the
//! program returns `Ok`, and dropped otherwise.

use crate::{
    ledger_store::{LedgerSnapshot, LedgerStore, Revision},
    transaction::LedgerTransaction,
    COMMIT_CHANNEL_CAPACITY,
};
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::broadcast;
use vote_program::{Outcome, Response, VoteError, VoteInstruction};

/// Result of processing a single invocation
#[derive(Debug, Clone)]
pub struct TransactionResult {
    /// Sequence number of this invocation
    pub tx_id: u64,
    /// Ledger revision after the invocation
    pub revision: Revision,
    /// Function that was invoked
    pub function: String,
    /// What the program decided, or why it could not run
    pub outcome: Result<Outcome, VoteError>,
    /// Keys written by a committed invocation
    pub modified_keys: Vec<String>,
}

impl TransactionResult {
    /// Transport-level response for this invocation
    pub fn response(&self) -> Response {
        Response::from(self.outcome.clone())
    }

    /// True when the write set reached the ledger
    pub fn committed(&self) -> bool {
        !self.modified_keys.is_empty()
    }
}

/// Commit event sent to subscribers
#[derive(Clone, Debug)]
pub struct CommitUpdate {
    /// Revision this commit produced
    pub revision: Revision,
    /// Invocation that produced it
    pub tx_id: u64,
    /// Function that was invoked
    pub function: String,
    /// Entries written
    pub writes: Vec<(String, Vec<u8>)>,
}

/// Ledger Processor
///
/// Holds the commit lock so that every read-validate-write sequence runs
/// against a ledger nobody else is writing to.
pub struct LedgerProcessor {
    /// Committed ledger state
    store: Arc<LedgerStore>,
    /// Current revision; guarded section of every invocation
    commit_lock: Mutex<Revision>,
    /// Next invocation id
    next_tx_id: AtomicU64,
    /// Commit notifications
    commit_sender: broadcast::Sender<CommitUpdate>,
}

impl LedgerProcessor {
    /// Create a processor over `store`, continuing from its latest revision
    pub fn new(store: Arc<LedgerStore>) -> Self {
        let revision = store.latest_revision();
        let (commit_sender, _) = broadcast::channel(COMMIT_CHANNEL_CAPACITY);

        Self {
            store,
            commit_lock: Mutex::new(revision),
            next_tx_id: AtomicU64::new(1),
            commit_sender,
        }
    }

    /// Subscribe to commit updates
    pub fn subscribe(&self) -> broadcast::Receiver<CommitUpdate> {
        self.commit_sender.subscribe()
    }

    /// Invoke a function by name
    pub fn invoke(&self, function: &str, args: &[String]) -> TransactionResult {
        let tx_id = self.next_tx_id.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Invoke #{}: {} {:?}", tx_id, function, args);

        match VoteInstruction::parse(function, args) {
            Ok(instruction) => self.execute(tx_id, instruction),
            Err(e) => {
                tracing::warn!("Invoke #{} rejected at dispatch: {}", tx_id, e);
                TransactionResult {
                    tx_id,
                    revision: self.current_revision(),
                    function: function.to_string(),
                    outcome: Err(e),
                    modified_keys: Vec::new(),
                }
            }
        }
    }

    /// Execute a parsed instruction and commit its writes
    pub fn execute(&self, tx_id: u64, instruction: VoteInstruction) -> TransactionResult {
        let function = instruction.function_name();

        // Queries read the store once and never write, so they skip the
        // commit lock
        if instruction.is_read_only() {
            let mut tx = LedgerTransaction::new(&self.store);
            let outcome = vote_program::process(&mut tx, instruction);
            debug_assert!(tx.is_read_only());

            return TransactionResult {
                tx_id,
                revision: self.current_revision(),
                function: function.to_string(),
                outcome,
                modified_keys: Vec::new(),
            };
        }

        self.execute_with(tx_id, function, |tx| vote_program::process(tx, instruction))
    }

    /// Run `program` in a fresh transaction under the commit lock
    ///
    /// The write set is committed as one batch when `program` returns `Ok`
    /// and dropped otherwise.
    pub(crate) fn execute_with<F>(
        &self,
        tx_id: u64,
        function: &str,
        program: F,
    ) -> TransactionResult
    where
        F: FnOnce(&mut LedgerTransaction<'_>) -> Result<Outcome, VoteError>,
    {
        let mut revision = self.commit_lock.lock();

        let mut tx = LedgerTransaction::new(&self.store);
        let outcome = program(&mut tx);

        let modified_keys = match &outcome {
            Ok(_) if !tx.is_read_only() => {
                let writes = tx.into_writes();
                let keys: Vec<String> = writes.iter().map(|(k, _)| k.clone()).collect();

                *revision += 1;
                self.store.put_batch(writes.clone(), *revision);

                tracing::debug!(
                    "Invoke #{} committed at revision {}: {} keys written",
                    tx_id,
                    *revision,
                    keys.len()
                );

                // No subscribers is fine
                let _ = self.commit_sender.send(CommitUpdate {
                    revision: *revision,
                    tx_id,
                    function: function.to_string(),
                    writes,
                });

                keys
            }
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::warn!("Invoke #{} failed, discarding writes: {}", tx_id, e);
                Vec::new()
            }
        };

        TransactionResult {
            tx_id,
            revision: *revision,
            function: function.to_string(),
            outcome,
            modified_keys,
        }
    }

    /// Copy of the committed ledger at the current revision
    ///
    /// Taken under the commit lock, so it never contains half of an
    /// invocation's writes.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let revision = self.commit_lock.lock();
        let mut snapshot = self.store.snapshot();
        snapshot.revision = *revision;
        snapshot
    }

    /// Get current revision
    pub fn current_revision(&self) -> Revision {
        *self.commit_lock.lock()
    }

    /// Get reference to the ledger store
    pub fn store(&self) -> &LedgerStore {
        &self.store
    }
}

impl Default for LedgerProcessor {
    fn default() -> Self {
        Self::new(Arc::new(LedgerStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vote_program::{LedgerError, LedgerState};

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_commit_bumps_revision() {
        let processor = LedgerProcessor::default();

        let result = processor.invoke("initLedger", &[]);
        assert!(result.committed());
        assert_eq!(result.revision, 1);
        assert_eq!(processor.store().len(), 15);

        let result = processor.invoke("queryVoter", &args(&["VOTER0"]));
        assert!(!result.committed());
        assert_eq!(result.revision, 1);
        assert_eq!(result.response(), Response::Success(br#"{"voted":false}"#.to_vec()));
    }

    #[test]
    fn test_rejection_commits_nothing() {
        let processor = LedgerProcessor::default();
        processor.invoke("initLedger", &[]);

        let result = processor.invoke("castVote", &args(&["VOTER0", "CANDIDATE0"]));
        assert_eq!(result.response().text(), "Election has not started yet");
        assert!(result.modified_keys.is_empty());
        assert_eq!(processor.current_revision(), 1);
    }

    #[test]
    fn test_failed_invocation_discards_writes() {
        let processor = LedgerProcessor::default();
        processor.invoke("startElection", &[]);

        // Empty key makes the write fail inside the transaction
        let result = processor.invoke("createCandidate", &args(&["", "Nobody", "None"]));
        assert!(!result.response().is_success());
        assert!(processor.store().get("").is_none());
        assert_eq!(processor.current_revision(), 1);
    }

    #[test]
    fn test_dispatch_errors() {
        let processor = LedgerProcessor::default();

        let result = processor.invoke("mintVotes", &[]);
        assert_eq!(
            result.response(),
            Response::Error("Invalid Smart Contract function name.".to_string())
        );

        let result = processor.invoke("queryCandidate", &args(&["A", "B"]));
        assert_eq!(
            result.response(),
            Response::Error("Incorrect number of arguments. Expecting 1".to_string())
        );
    }

    #[test]
    fn test_revision_resumes_from_store() {
        let store = Arc::new(LedgerStore::new());
        store.put("ELECTION".to_string(), br#"{"ended":false}"#.to_vec(), 9);

        let processor = LedgerProcessor::new(store);
        let result = processor.invoke("endElection", &[]);
        assert_eq!(result.revision, 10);
    }

    /// Transaction wrapper whose writes to one key fail
    struct FailingWrites<'t, 'a> {
        inner: &'t mut LedgerTransaction<'a>,
        fail_key: &'static str,
    }

    impl LedgerState for FailingWrites<'_, '_> {
        fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
            self.inner.get_state(key)
        }

        fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
            if key == self.fail_key {
                return Err(LedgerError::Write {
                    key: key.to_string(),
                    reason: "device unavailable".to_string(),
                });
            }
            self.inner.put_state(key, value)
        }

        fn get_state_by_range(
            &self,
            start: &str,
            end: &str,
        ) -> Result<Vec<(String, Vec<u8>)>, LedgerError> {
            self.inner.get_state_by_range(start, end)
        }
    }

    #[test]
    fn test_cast_vote_failure_after_voter_write_leaves_no_partial_state() {
        let processor = LedgerProcessor::default();
        processor.invoke("initLedger", &[]);
        processor.invoke("startElection", &[]);
        let revision = processor.current_revision();
        let mut updates = processor.subscribe();

        let instruction = VoteInstruction::parse("castVote", &args(&["VOTER3", "CANDIDATE2"]))
            .unwrap();
        let result = processor.execute_with(99, "castVote", |tx| {
            let mut failing = FailingWrites {
                inner: tx,
                fail_key: "CANDIDATE2",
            };
            vote_program::process(&mut failing, instruction)
        });

        assert_eq!(
            result.response(),
            Response::Error(
                "failed to write state for key CANDIDATE2: device unavailable".to_string()
            )
        );
        assert!(!result.committed());
        assert_eq!(processor.current_revision(), revision);
        assert_eq!(processor.store().get("VOTER3").unwrap(), br#"{"voted":false}"#);
        assert!(processor
            .store()
            .get("CANDIDATE2")
            .unwrap()
            .ends_with(br#""votes":0}"#));
        assert!(updates.try_recv().is_err());

        // The same ballot goes through once the ledger behaves
        let result = processor.invoke("castVote", &args(&["VOTER3", "CANDIDATE2"]));
        assert_eq!(result.response().text(), "Successfully voted for CANDIDATE2");
        assert_eq!(result.revision, revision + 1);
    }

    #[test]
    fn test_snapshot_carries_processor_revision() {
        let processor = LedgerProcessor::default();
        processor.invoke("initLedger", &[]);
        processor.invoke("startElection", &[]);
        processor.invoke("queryAllCandidates", &[]);

        let snapshot = processor.snapshot();
        assert_eq!(snapshot.revision, 2);
        assert_eq!(snapshot.entries.len(), 16);
        assert!(snapshot
            .entries
            .iter()
            .any(|(k, v, r)| k == "ELECTION" && v == br#"{"ended":false}"# && *r == 2));
    }

    #[tokio::test]
    async fn test_subscribe_receives_commits() {
        let processor = LedgerProcessor::default();
        let mut updates = processor.subscribe();

        processor.invoke("startElection", &[]);
        processor.invoke("checkElectionStatus", &[]);
        processor.invoke("endElection", &[]);

        let first = updates.recv().await.unwrap();
        assert_eq!(first.function, "startElection");
        assert_eq!(first.revision, 1);

        // Read-only invocations produce no update
        let second = updates.recv().await.unwrap();
        assert_eq!(second.function, "endElection");
        assert_eq!(second.writes, vec![("ELECTION".to_string(), br#"{"ended":true}"#.to_vec())]);
    }
}
