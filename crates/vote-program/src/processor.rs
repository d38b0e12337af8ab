//! Vote Program Processor
//!
//! Guarded transitions over the ledger. Each handler reads what it needs,
//! checks its preconditions in a fixed order and only then writes.

use tracing::{debug, info};

use crate::{
    constants::*,
    error::{Rejection, VoteError},
    instruction::VoteInstruction,
    ledger::{get_present, LedgerState},
    response::Outcome,
    state::{Candidate, Election, ElectionStatus, KeyedRecord, Record, Voter},
};

/// Parse and process a named invocation
pub fn process_invocation<L: LedgerState + ?Sized>(
    ledger: &mut L,
    function: &str,
    args: &[String],
) -> Result<Outcome, VoteError> {
    let instruction = VoteInstruction::parse(function, args)?;
    process(ledger, instruction)
}

/// Process instruction
pub fn process<L: LedgerState + ?Sized>(
    ledger: &mut L,
    instruction: VoteInstruction,
) -> Result<Outcome, VoteError> {
    info!("Function: {}", instruction.function_name());

    match instruction {
        VoteInstruction::InitLedger => process_init_ledger(ledger),

        VoteInstruction::QueryCandidate { key } => process_query_raw(ledger, &key),

        VoteInstruction::QueryAllCandidates => process_query_all_candidates(ledger),

        VoteInstruction::QueryVoter { key } => process_query_raw(ledger, &key),

        VoteInstruction::CreateCandidate { key, name, party } => {
            process_create_candidate(ledger, &key, name, party)
        }

        VoteInstruction::StartElection => process_start_election(ledger),

        VoteInstruction::CastVote {
            voter_key,
            candidate_key,
        } => process_cast_vote(ledger, &voter_key, &candidate_key),

        VoteInstruction::EndElection => process_end_election(ledger),

        VoteInstruction::CheckElectionStatus => process_check_election_status(ledger),

        VoteInstruction::QueryResults => process_query_results(ledger),
    }
}

/// Seed the fixed candidate and voter set
fn process_init_ledger<L: LedgerState + ?Sized>(ledger: &mut L) -> Result<Outcome, VoteError> {
    for (i, (name, party)) in SEED_CANDIDATES.iter().enumerate() {
        let candidate = Candidate::new(*name, *party);
        ledger.put_state(&candidate_key(i), candidate.to_bytes()?)?;
        debug!("Added {{ Name: {} Party: {} }}", name, party);
    }

    for i in 0..SEED_VOTER_COUNT {
        ledger.put_state(&voter_key(i), Voter::default().to_bytes()?)?;
        debug!("Added {{ Id: {} }}", voter_key(i));
    }

    info!(
        "Ledger initiated with {} candidates and {} voters",
        SEED_CANDIDATES.len(),
        SEED_VOTER_COUNT
    );

    Ok(Outcome::empty())
}

/// Return whatever is stored at `key`, as is
fn process_query_raw<L: LedgerState + ?Sized>(
    ledger: &mut L,
    key: &str,
) -> Result<Outcome, VoteError> {
    debug!("Args: {}", key);
    let bytes = ledger.get_state(key)?.unwrap_or_default();
    Ok(Outcome::Accepted(bytes))
}

/// Open the election, discarding any previous election record
fn process_start_election<L: LedgerState + ?Sized>(
    ledger: &mut L,
) -> Result<Outcome, VoteError> {
    let election = Election { ended: false };
    ledger.put_state(ELECTION_KEY, election.to_bytes()?)?;

    info!("Election started");
    Ok(Outcome::message("Election started"))
}

/// Close the election
fn process_end_election<L: LedgerState + ?Sized>(ledger: &mut L) -> Result<Outcome, VoteError> {
    let Some(mut election) = load_election(&*ledger)? else {
        info!("{}", Rejection::NotStarted);
        return Ok(Rejection::NotStarted.into());
    };

    // Always written back, even when already ended
    election.ended = true;
    ledger.put_state(ELECTION_KEY, election.to_bytes()?)?;

    info!("Election ended");
    Ok(Outcome::message("Election ended"))
}

/// Register a candidate
fn process_create_candidate<L: LedgerState + ?Sized>(
    ledger: &mut L,
    key: &str,
    name: String,
    party: String,
) -> Result<Outcome, VoteError> {
    debug!("Args: {} {} {}", key, name, party);

    if let Err(rejection) = require_active_election(&*ledger)? {
        info!("{}", rejection);
        return Ok(rejection.into());
    }

    // Overwrites any record already stored at `key`
    let candidate = Candidate::new(name, party);
    ledger.put_state(key, candidate.to_bytes()?)?;

    info!("{{ Name: {} Party: {} }}", candidate.name, candidate.party);
    Ok(Outcome::message("Successfully created candidate"))
}

/// Scan the candidate key range
fn process_query_all_candidates<L: LedgerState + ?Sized>(
    ledger: &mut L,
) -> Result<Outcome, VoteError> {
    let candidates = scan_candidates(&*ledger)?;
    Ok(Outcome::Accepted(serde_json::to_vec(&candidates)?))
}

/// Candidates sorted by tally, highest first
fn process_query_results<L: LedgerState + ?Sized>(
    ledger: &mut L,
) -> Result<Outcome, VoteError> {
    let mut candidates = scan_candidates(&*ledger)?;
    // Stable sort keeps scan order between equal tallies
    candidates.sort_by_key(|c| std::cmp::Reverse(tally(&c.record)));
    Ok(Outcome::Accepted(serde_json::to_vec(&candidates)?))
}

/// Report the election phase
fn process_check_election_status<L: LedgerState + ?Sized>(
    ledger: &mut L,
) -> Result<Outcome, VoteError> {
    let election = load_election(&*ledger)?;
    let status = ElectionStatus::from_record(election.as_ref());
    Ok(Outcome::message(status.message()))
}

/// Cast a vote
///
/// Preconditions, in order: election exists, election is active, voter
/// exists, voter has not voted, candidate exists. The voter is written before
/// the candidate; both writes belong to the caller's transaction.
fn process_cast_vote<L: LedgerState + ?Sized>(
    ledger: &mut L,
    voter_key: &str,
    candidate_key: &str,
) -> Result<Outcome, VoteError> {
    debug!("Args: {} {}", voter_key, candidate_key);

    if let Err(rejection) = require_active_election(&*ledger)? {
        info!("{}", rejection);
        return Ok(rejection.into());
    }

    let Some(voter_bytes) = get_present(&*ledger, voter_key)? else {
        info!("{}", Rejection::InvalidVoter);
        return Ok(Rejection::InvalidVoter.into());
    };
    let mut voter = Voter::from_bytes_lenient(voter_key, &voter_bytes);
    if voter.voted {
        info!("{}", Rejection::AlreadyVoted);
        return Ok(Rejection::AlreadyVoted.into());
    }

    let Some(candidate_bytes) = get_present(&*ledger, candidate_key)? else {
        info!("{}", Rejection::InvalidCandidate);
        return Ok(Rejection::InvalidCandidate.into());
    };

    voter.mark_voted();
    ledger.put_state(voter_key, voter.to_bytes()?)?;

    let mut candidate = Candidate::from_bytes_lenient(candidate_key, &candidate_bytes);
    candidate.record_vote();
    ledger.put_state(candidate_key, candidate.to_bytes()?)?;

    info!("{} voted for {}", voter_key, candidate_key);
    Ok(Outcome::message(format!(
        "Successfully voted for {}",
        candidate_key
    )))
}

/// Load the election record, `None` when it was never written
fn load_election<L: LedgerState + ?Sized>(ledger: &L) -> Result<Option<Election>, VoteError> {
    Ok(get_present(ledger, ELECTION_KEY)?
        .map(|bytes| Election::from_bytes_lenient(ELECTION_KEY, &bytes)))
}

/// Outer `Err` is an infrastructure failure, inner `Err` a rejection
fn require_active_election<L: LedgerState + ?Sized>(
    ledger: &L,
) -> Result<Result<Election, Rejection>, VoteError> {
    Ok(match load_election(ledger)? {
        None => Err(Rejection::NotStarted),
        Some(election) if !election.is_active() => Err(Rejection::Ended),
        Some(election) => Ok(election),
    })
}

/// Every entry in the candidate range, records embedded as stored
fn scan_candidates<L: LedgerState + ?Sized>(ledger: &L) -> Result<Vec<KeyedRecord>, VoteError> {
    let entries = ledger.get_state_by_range(CANDIDATE_RANGE_START, CANDIDATE_RANGE_END)?;
    entries
        .into_iter()
        .map(|(key, bytes)| {
            let record = match serde_json::from_slice(&bytes) {
                Ok(value) => value,
                // Not a JSON document; list the zero-value candidate instead
                Err(_) => serde_json::to_value(Candidate::from_bytes_lenient(&key, &bytes))?,
            };
            Ok(KeyedRecord { key, record })
        })
        .collect()
}

/// Vote count of a listed record, zero when missing or not a count
fn tally(record: &serde_json::Value) -> u64 {
    record.get("votes").and_then(serde_json::Value::as_u64).unwrap_or(0)
}
