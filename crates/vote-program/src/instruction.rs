//! Vote Program Instructions

use crate::error::VoteError;

/// Vote program instructions
///
/// Callers address the program with a function name and a list of string
/// arguments. [`VoteInstruction::parse`] turns that pair into one of these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoteInstruction {
    /// Seed the fixed candidate and voter set
    InitLedger,

    /// Read a candidate record
    ///
    /// Args: `[key]`
    QueryCandidate { key: String },

    /// Scan every `CANDIDATE<n>` record
    QueryAllCandidates,

    /// Read a voter record
    ///
    /// Args: `[key]`
    QueryVoter { key: String },

    /// Register a candidate while the election is open
    ///
    /// Args: `[key, name, party]`
    CreateCandidate {
        key: String,
        name: String,
        party: String,
    },

    /// Open (or reopen) the election
    StartElection,

    /// Cast one vote
    ///
    /// Args: `[voter_key, candidate_key]`
    CastVote {
        voter_key: String,
        candidate_key: String,
    },

    /// Close the election
    EndElection,

    /// Report the election phase
    CheckElectionStatus,

    /// Candidates ordered by tally, highest first
    QueryResults,
}

impl VoteInstruction {
    /// Every function name the program answers to
    pub const FUNCTION_NAMES: [&'static str; 10] = [
        "initLedger",
        "queryCandidate",
        "queryAllCandidates",
        "queryVoter",
        "createCandidate",
        "startElection",
        "castVote",
        "endElection",
        "checkElectionStatus",
        "queryResults",
    ];

    /// Resolve a function name and its arguments
    ///
    /// Functions that take no arguments ignore any that are passed.
    pub fn parse(function: &str, args: &[String]) -> Result<Self, VoteError> {
        let instruction = match function {
            "initLedger" => VoteInstruction::InitLedger,
            "queryCandidate" => {
                let [key] = expect_args(args)?;
                VoteInstruction::QueryCandidate { key }
            }
            "queryAllCandidates" => VoteInstruction::QueryAllCandidates,
            "queryVoter" => {
                let [key] = expect_args(args)?;
                VoteInstruction::QueryVoter { key }
            }
            "createCandidate" => {
                let [key, name, party] = expect_args(args)?;
                VoteInstruction::CreateCandidate { key, name, party }
            }
            "startElection" => VoteInstruction::StartElection,
            "castVote" => {
                let [voter_key, candidate_key] = expect_args(args)?;
                VoteInstruction::CastVote {
                    voter_key,
                    candidate_key,
                }
            }
            "endElection" => VoteInstruction::EndElection,
            "checkElectionStatus" => VoteInstruction::CheckElectionStatus,
            "queryResults" => VoteInstruction::QueryResults,
            _ => {
                return Err(VoteError::InvalidFunctionName {
                    name: function.to_string(),
                })
            }
        };

        Ok(instruction)
    }

    /// Function name this instruction was parsed from
    pub fn function_name(&self) -> &'static str {
        match self {
            VoteInstruction::InitLedger => "initLedger",
            VoteInstruction::QueryCandidate { .. } => "queryCandidate",
            VoteInstruction::QueryAllCandidates => "queryAllCandidates",
            VoteInstruction::QueryVoter { .. } => "queryVoter",
            VoteInstruction::CreateCandidate { .. } => "createCandidate",
            VoteInstruction::StartElection => "startElection",
            VoteInstruction::CastVote { .. } => "castVote",
            VoteInstruction::EndElection => "endElection",
            VoteInstruction::CheckElectionStatus => "checkElectionStatus",
            VoteInstruction::QueryResults => "queryResults",
        }
    }

    /// True for instructions that never write to the ledger
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            VoteInstruction::QueryCandidate { .. }
                | VoteInstruction::QueryAllCandidates
                | VoteInstruction::QueryVoter { .. }
                | VoteInstruction::CheckElectionStatus
                | VoteInstruction::QueryResults
        )
    }
}

fn expect_args<const N: usize>(args: &[String]) -> Result<[String; N], VoteError> {
    <[String; N]>::try_from(args.to_vec()).map_err(|_| VoteError::IncorrectArgumentCount {
        expected: N,
        got: args.len(),
    })
}
