//! Vote Program State
//!
//! Records stored in the ledger. Every record is a flat JSON object.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::VoteError;

/// Encoding shared by all ledger records
pub trait Record: Serialize + DeserializeOwned + Default {
    /// Short name used in log lines
    const KIND: &'static str;

    /// Encode the record as JSON bytes
    fn to_bytes(&self) -> Result<Vec<u8>, VoteError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a stored record, falling back to the zero value when the bytes
    /// are not a well-formed record of this kind.
    fn from_bytes_lenient(key: &str, bytes: &[u8]) -> Self {
        match serde_json::from_slice(bytes) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Malformed {} record at {}: {}", Self::KIND, key, e);
                Self::default()
            }
        }
    }
}

/// A candidate and its tally
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Candidate {
    pub name: String,
    pub party: String,
    pub votes: u64,
}

impl Candidate {
    /// New candidate with an empty tally
    pub fn new(name: impl Into<String>, party: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            party: party.into(),
            votes: 0,
        }
    }

    /// Add one vote to the tally
    pub fn record_vote(&mut self) {
        self.votes = self.votes.saturating_add(1);
    }
}

impl Record for Candidate {
    const KIND: &'static str = "candidate";
}

/// A registered voter
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Voter {
    pub voted: bool,
}

impl Voter {
    /// Mark the voter as having voted. There is no way back.
    pub fn mark_voted(&mut self) {
        self.voted = true;
    }
}

impl Record for Voter {
    const KIND: &'static str = "voter";
}

/// Election lifecycle flag - singleton at [`crate::constants::ELECTION_KEY`]
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Election {
    pub ended: bool,
}

impl Election {
    /// Check if ballots are still being accepted
    pub fn is_active(&self) -> bool {
        !self.ended
    }
}

impl Record for Election {
    const KIND: &'static str = "election";
}

/// Lifecycle phase derived from the election record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElectionStatus {
    NotStarted,
    Ongoing,
    Ended,
}

impl ElectionStatus {
    /// Derive the phase from the (possibly absent) election record
    pub fn from_record(election: Option<&Election>) -> Self {
        match election {
            None => ElectionStatus::NotStarted,
            Some(e) if e.ended => ElectionStatus::Ended,
            Some(_) => ElectionStatus::Ongoing,
        }
    }

    /// Human readable status line
    pub fn message(&self) -> &'static str {
        match self {
            ElectionStatus::NotStarted => "Election has not started yet",
            ElectionStatus::Ongoing => "Election is ongoing",
            ElectionStatus::Ended => "Election ended",
        }
    }
}

/// A stored record together with the key it is stored under
///
/// Listings emit the stored JSON document as is (`T = Value`); readers can
/// parse a listing back into typed records.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct KeyedRecord<T = serde_json::Value> {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Record")]
    pub record: T,
}
