//! Tournament Registry
//!
//! Registration, refunds, start and conclusion:
//!
//! ```text
//! AcceptingRegistrations -> AwaitingStart -> InProgress -> Concluded
//!          |                      |
//!          +----------------------+--> RegistrationPeriodExpired (refunds)
//! ```
//!
//! Every payer contribution lives in the details record; the prize pool is
//! always their sum.

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::chain::database::Database;
use crate::chain::error::{InvariantViolation, OperationError};
use crate::chain::events::ChainEventData;
use crate::chain::params::PERCENT_100;
use crate::core::ids::{AccountId, Amount, TournamentId};
use crate::core::time::Timestamp;
use crate::tournament::bracket;
use crate::tournament::match_object::MatchCompleted;
use crate::tournament::object::{TournamentDetails, TournamentObject, TournamentState};
use crate::tournament::options::{StartCondition, TournamentOptions};

// =============================================================================
// CREATION
// =============================================================================

/// Check creation options against the chain parameters.
pub fn evaluate_create(db: &Database, options: &TournamentOptions) -> Result<(), OperationError> {
    options.validate(db.params(), db.head_time())
}

/// Create a tournament and its details record.
pub fn create_tournament(db: &mut Database, creator: AccountId, options: TournamentOptions) -> TournamentId {
    let tournament_id = db.tournaments.next_id();
    let details_id = db.tournament_details.create(|id| TournamentDetails::new(id, tournament_id));
    let id = db.tournaments.create(|id| TournamentObject::new(id, creator, options, details_id));

    info!(tournament = %id, %creator, "tournament created");
    db.emit(ChainEventData::TournamentCreated { tournament: id, creator });
    id
}

// =============================================================================
// REGISTRATION
// =============================================================================

fn accepting(db: &Database, tournament_id: TournamentId) -> Result<(&TournamentObject, &TournamentDetails), OperationError> {
    let tournament = db.tournament(tournament_id).ok_or(OperationError::UnknownTournament(tournament_id))?;
    if tournament.state != TournamentState::AcceptingRegistrations {
        return Err(OperationError::WrongTournamentState {
            tournament: tournament_id,
            actual: tournament.state,
            expected: TournamentState::AcceptingRegistrations,
        });
    }
    let closed_at = tournament.start_time
        .map_or(tournament.options.registration_deadline, |start| start.min(tournament.options.registration_deadline));
    if db.head_time() >= closed_at {
        return Err(OperationError::RegistrationClosed { tournament: tournament_id, closed_at });
    }
    let details = db.tournament_details(tournament.details_id)
        .ok_or(OperationError::UnknownTournament(tournament_id))?;
    Ok((tournament, details))
}

/// Check a registration of `player`, paid for by `payer`.
pub fn evaluate_join(
    db: &Database,
    payer: AccountId,
    player: AccountId,
    tournament_id: TournamentId,
    buy_in: Amount,
) -> Result<(), OperationError> {
    let (tournament, details) = accepting(db, tournament_id)?;

    if !tournament.options.admits(player) {
        return Err(OperationError::NotWhitelisted { tournament: tournament_id, player });
    }
    if details.is_registered(player) {
        return Err(OperationError::AlreadyRegistered { tournament: tournament_id, player });
    }
    if tournament.is_full() {
        return Err(OperationError::TournamentFull(tournament_id));
    }
    if buy_in != tournament.options.buy_in {
        return Err(OperationError::BuyInMismatch {
            expected: tournament.options.buy_in,
            offered: buy_in,
        });
    }
    let available = db.balance(payer);
    if available < buy_in {
        return Err(OperationError::InsufficientBalance {
            account: payer,
            available,
            required: buy_in,
        });
    }
    Ok(())
}

/// Register a player: debit the payer, grow the pool, and start or close
/// registration if this filled the last seat.
pub fn on_player_registered(
    db: &mut Database,
    tournament_id: TournamentId,
    payer: AccountId,
    player: AccountId,
    buy_in: Amount,
) -> Result<(), InvariantViolation> {
    let now = db.head_time();
    let details_id = db.require_tournament(tournament_id)?.details_id;

    db.debit(payer, buy_in)?;
    db.modify_details(details_id, |details| details.add_player(payer, player, buy_in))?;
    db.modify_tournament(tournament_id, |t| -> Result<(), InvariantViolation> {
        t.prize_pool = t.prize_pool.checked_add(buy_in).ok_or(InvariantViolation::Overflow("prize pool"))?;
        t.registered_players += 1;
        Ok(())
    })??;

    debug!(tournament = %tournament_id, %player, %payer, buy_in, "player registered");
    db.emit(ChainEventData::PlayerRegistered {
        tournament: tournament_id,
        player,
        payer,
        buy_in,
    });
    check_tournament_invariants(db, tournament_id)?;

    if db.require_tournament(tournament_id)?.is_full() {
        on_tournament_full(db, tournament_id, now)?;
    }
    Ok(())
}

fn on_tournament_full(db: &mut Database, tournament_id: TournamentId, now: Timestamp) -> Result<(), InvariantViolation> {
    let start = db.require_tournament(tournament_id)?.options.start;
    match start {
        StartCondition::WhenFull { delay_secs: 0 } => start_tournament(db, tournament_id, now),
        StartCondition::WhenFull { delay_secs } => {
            await_start(db, tournament_id, now.saturating_add_secs(delay_secs))
        }
        StartCondition::At(start_time) => await_start(db, tournament_id, start_time),
    }
}

/// Check a withdrawal signed by `canceling_account`.
pub fn evaluate_leave(
    db: &Database,
    canceling_account: AccountId,
    player: AccountId,
    tournament_id: TournamentId,
) -> Result<(), OperationError> {
    let (_, details) = accepting(db, tournament_id)?;
    let payer = details.payer_of(player)
        .ok_or(OperationError::NotRegistered { tournament: tournament_id, player })?;
    if canceling_account != player && canceling_account != payer {
        return Err(OperationError::Unauthorized { account: canceling_account, player });
    }
    Ok(())
}

/// Withdraw a player and refund their payer.
pub fn on_player_unregistered(
    db: &mut Database,
    tournament_id: TournamentId,
    player: AccountId,
) -> Result<(), InvariantViolation> {
    let tournament = db.require_tournament(tournament_id)?;
    let (details_id, buy_in) = (tournament.details_id, tournament.options.buy_in);

    let payer = db.modify_details(details_id, |details| details.remove_player(player, buy_in))?
        .ok_or(InvariantViolation::MissingPayer { tournament: tournament_id, player })?;
    db.modify_tournament(tournament_id, |t| -> Result<(), InvariantViolation> {
        t.prize_pool = t.prize_pool.checked_sub(buy_in).ok_or(InvariantViolation::Overflow("prize pool"))?;
        t.registered_players = t.registered_players.saturating_sub(1);
        Ok(())
    })??;
    db.credit(payer, buy_in)?;

    debug!(tournament = %tournament_id, %player, %payer, buy_in, "player unregistered");
    db.emit(ChainEventData::PlayerUnregistered { tournament: tournament_id, player });
    db.emit(ChainEventData::Refunded { tournament: tournament_id, payer, amount: buy_in });
    check_tournament_invariants(db, tournament_id)
}

// =============================================================================
// DEADLINES
// =============================================================================

/// Registration deadline reached. Returns `false` if the tournament was no
/// longer waiting on it.
pub fn on_registration_deadline_passed(
    db: &mut Database,
    tournament_id: TournamentId,
    now: Timestamp,
) -> Result<bool, InvariantViolation> {
    let tournament = db.require_tournament(tournament_id)?;
    if tournament.state != TournamentState::AcceptingRegistrations
        || tournament.options.registration_deadline > now
    {
        return Ok(false);
    }

    let start = tournament.options.start;
    if !tournament.has_minimum() {
        expire_registration(db, tournament_id, now)?;
        return Ok(true);
    }

    match start {
        StartCondition::At(start_time) if start_time > now => await_start(db, tournament_id, start_time)?,
        StartCondition::WhenFull { delay_secs } if delay_secs > 0 => {
            await_start(db, tournament_id, now.saturating_add_secs(delay_secs))?
        }
        _ => start_tournament(db, tournament_id, now)?,
    }
    Ok(true)
}

/// Scheduled start reached. Returns `false` if the tournament was no longer
/// waiting on it.
pub fn on_start_time_arrived(
    db: &mut Database,
    tournament_id: TournamentId,
    now: Timestamp,
) -> Result<bool, InvariantViolation> {
    let tournament = db.require_tournament(tournament_id)?;
    let waiting = matches!(
        tournament.state,
        TournamentState::AcceptingRegistrations | TournamentState::AwaitingStart
    );
    if !waiting || tournament.start_time.map_or(true, |start| start > now) {
        return Ok(false);
    }

    let has_minimum = tournament.has_minimum();
    if has_minimum {
        start_tournament(db, tournament_id, now)?;
    } else {
        expire_registration(db, tournament_id, now)?;
    }
    Ok(true)
}

fn await_start(db: &mut Database, tournament_id: TournamentId, start_time: Timestamp) -> Result<(), InvariantViolation> {
    db.modify_tournament(tournament_id, |t| {
        t.state = TournamentState::AwaitingStart;
        t.start_time = Some(start_time);
    })?;
    info!(tournament = %tournament_id, %start_time, "registration closed, awaiting start");
    db.emit(ChainEventData::AwaitingStart { tournament: tournament_id, start_time });
    Ok(())
}

/// Close registration with too few players and refund every payer their
/// full contribution, once each, in registration order.
fn expire_registration(db: &mut Database, tournament_id: TournamentId, now: Timestamp) -> Result<(), InvariantViolation> {
    let details = db.require_details_of(tournament_id)?;
    let mut refunds: Vec<(AccountId, Amount)> = Vec::new();
    let mut seen = BTreeSet::new();
    for player in &details.registered_players {
        let payer = details.payer_of(*player).ok_or(InvariantViolation::MissingPayer {
            tournament: tournament_id,
            player: *player,
        })?;
        if seen.insert(payer) {
            refunds.push((payer, details.payers.get(&payer).copied().unwrap_or(0)));
        }
    }

    db.modify_tournament(tournament_id, |t| {
        t.state = TournamentState::RegistrationPeriodExpired;
        t.end_time = Some(now);
    })?;
    warn!(tournament = %tournament_id, refunds = refunds.len(), "registration expired with too few players");
    db.emit(ChainEventData::RegistrationExpired { tournament: tournament_id });

    for (payer, amount) in refunds {
        db.credit(payer, amount)?;
        db.emit(ChainEventData::Refunded { tournament: tournament_id, payer, amount });
    }
    Ok(())
}

/// Close registration, build the bracket and start the first matches.
fn start_tournament(db: &mut Database, tournament_id: TournamentId, now: Timestamp) -> Result<(), InvariantViolation> {
    db.modify_tournament(tournament_id, |t| {
        t.state = TournamentState::InProgress;
        t.start_time = Some(now);
    })?;
    let players = db.require_tournament(tournament_id)?.registered_players;

    info!(tournament = %tournament_id, players, "tournament started");
    let matches = bracket::build_bracket(db, tournament_id, now)?;
    db.emit(ChainEventData::TournamentStarted {
        tournament: tournament_id,
        players,
        matches,
    });
    Ok(())
}

// =============================================================================
// CONCLUSION
// =============================================================================

/// A finished match reports in: conclude on the final, otherwise advance
/// winners into whatever matches are now ready.
pub fn on_match_completed(db: &mut Database, completed: MatchCompleted, now: Timestamp) -> Result<(), InvariantViolation> {
    let tournament_id = completed.tournament_id;
    let final_match = db.require_details_of(tournament_id)?.final_match();

    if final_match == Some(completed.match_id) {
        conclude(db, tournament_id, &completed.winners, now)
    } else {
        bracket::check_for_new_matches_to_start(db, tournament_id, now)?;
        Ok(())
    }
}

/// Division of a prize pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrizeSplit {
    /// Paid to the rake account
    pub rake: Amount,
    /// Paid to each champion, ascending by account
    pub shares: Vec<(AccountId, Amount)>,
}

impl PrizeSplit {
    /// Total paid out.
    pub fn total(&self) -> Option<Amount> {
        self.shares.iter().try_fold(self.rake, |acc, (_, share)| acc.checked_add(*share))
    }
}

/// Take the rake (floor of `pool * rake_fee / 10 000`) and split the rest
/// evenly; the remainder goes to the lowest account.
pub fn split_prize_pool(prize_pool: Amount, rake_fee_percentage: u16, winners: &BTreeSet<AccountId>) -> PrizeSplit {
    if winners.is_empty() {
        return PrizeSplit { rake: 0, shares: Vec::new() };
    }
    let fee = u128::from(rake_fee_percentage.min(PERCENT_100));
    let rake = (u128::from(prize_pool) * fee / u128::from(PERCENT_100)) as Amount;
    let remaining = prize_pool - rake;

    let count = winners.len() as u64;
    let (each, remainder) = (remaining / count, remaining % count);
    let shares = winners.iter()
        .enumerate()
        .map(|(i, winner)| (*winner, if i == 0 { each + remainder } else { each }))
        .collect();
    PrizeSplit { rake, shares }
}

fn conclude(
    db: &mut Database,
    tournament_id: TournamentId,
    champions: &BTreeSet<AccountId>,
    now: Timestamp,
) -> Result<(), InvariantViolation> {
    check_tournament_invariants(db, tournament_id)?;
    let prize_pool = db.require_tournament(tournament_id)?.prize_pool;
    let (rake_fee, rake_account) = (db.params().rake_fee_percentage, db.params().rake_fee_account);

    let split = split_prize_pool(prize_pool, rake_fee, champions);
    let paid = split.total().ok_or(InvariantViolation::Overflow("payout"))?;
    if split.shares.is_empty() || paid != prize_pool {
        return Err(InvariantViolation::PayoutMismatch { tournament: tournament_id, paid, prize_pool });
    }

    if split.rake > 0 {
        db.credit(rake_account, split.rake)?;
        db.emit(ChainEventData::Payout {
            tournament: tournament_id,
            account: rake_account,
            amount: split.rake,
            rake: true,
        });
    }
    for (champion, share) in &split.shares {
        db.credit(*champion, *share)?;
        db.emit(ChainEventData::Payout {
            tournament: tournament_id,
            account: *champion,
            amount: *share,
            rake: false,
        });
    }

    db.modify_tournament(tournament_id, |t| {
        t.state = TournamentState::Concluded;
        t.end_time = Some(now);
    })?;
    info!(tournament = %tournament_id, champions = ?champions, prize_pool, rake = split.rake, "tournament concluded");
    db.emit(ChainEventData::TournamentConcluded {
        tournament: tournament_id,
        champions: champions.clone(),
    });
    Ok(())
}

/// Prize pool equals recorded contributions; registered count equals the
/// registered list.
pub fn check_tournament_invariants(db: &Database, tournament_id: TournamentId) -> Result<(), InvariantViolation> {
    let tournament = db.require_tournament(tournament_id)?;
    let details = db.require_details(tournament.details_id)?;

    let contributed = details.total_contributed().ok_or(InvariantViolation::Overflow("contributions"))?;
    if contributed != tournament.prize_pool {
        return Err(InvariantViolation::PrizePoolMismatch {
            tournament: tournament_id,
            recorded: tournament.prize_pool,
            contributed,
        });
    }
    if details.registered_players.len() != tournament.registered_players as usize {
        return Err(InvariantViolation::RegistrationCountMismatch {
            tournament: tournament_id,
            recorded: tournament.registered_players,
            actual: details.registered_players.len(),
        });
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
