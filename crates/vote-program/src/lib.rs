//! Vote Program - Election Ledger Logic
//!
//! Candidates, voters and a single election lifecycle flag, kept in a
//! key-value ledger. The program is stateless: every operation is a guarded
//! read-validate-write against [`LedgerState`], and the host runs each
//! invocation inside one ledger transaction.
//!
//! Key Space:
//! - `ELECTION`: the election record (absent until the first start)
//! - `CANDIDATE<n>`: candidate records
//! - `VOTER<n>`: voter records

pub mod error;
pub mod instruction;
pub mod ledger;
pub mod processor;
pub mod response;
pub mod state;

pub use error::{LedgerError, Rejection, VoteError};
pub use instruction::VoteInstruction;
pub use ledger::LedgerState;
pub use processor::{process, process_invocation};
pub use response::{Outcome, Response};
pub use state::{Candidate, Election, ElectionStatus, KeyedRecord, Record, Voter};

/// Constants
pub mod constants {
    // Keys
    /// Key of the election record
    pub const ELECTION_KEY: &str = "ELECTION";
    /// Prefix of candidate keys
    pub const CANDIDATE_PREFIX: &str = "CANDIDATE";
    /// Prefix of voter keys
    pub const VOTER_PREFIX: &str = "VOTER";

    // Candidate scan (lexicographic, end exclusive)
    pub const CANDIDATE_RANGE_START: &str = "CANDIDATE0";
    pub const CANDIDATE_RANGE_END: &str = "CANDIDATE999";

    // Seed data
    /// Candidates written by `initLedger` as (name, party)
    pub const SEED_CANDIDATES: &[(&str, &str)] = &[
        ("Mark Zuckerberg", "Facebook"),
        ("Sundar Pitchai", "Google"),
        ("Satya Nadella", "Microsoft"),
        ("Tim Cook", "Apple"),
        ("Jeff Bezos", "Amazon"),
    ];
    /// Voters written by `initLedger`
    pub const SEED_VOTER_COUNT: usize = 10;

    /// Key of the `n`th candidate
    pub fn candidate_key(n: usize) -> String {
        format!("{}{}", CANDIDATE_PREFIX, n)
    }

    /// Key of the `n`th voter
    pub fn voter_key(n: usize) -> String {
        format!("{}{}", VOTER_PREFIX, n)
    }
}
