//! Chain Database
//!
//! The replicated state the engine mutates: parameters, head time, account
//! balances and one object table per entity kind. Everything iterates in
//! identifier order, so two nodes holding the same database hash it to the
//! same value.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::trace;

use crate::chain::error::InvariantViolation;
use crate::chain::events::{ChainEvent, ChainEventData};
use crate::chain::params::ChainParameters;
use crate::chain::store::ObjectTable;
use crate::core::hash::{StateHash, StateHasher};
use crate::core::ids::{AccountId, Amount, GameId, MatchId, TournamentDetailsId, TournamentId};
use crate::core::time::Timestamp;
use crate::game::object::GameObject;
use crate::tournament::match_object::MatchObject;
use crate::tournament::object::{TournamentDetails, TournamentObject};

/// Scalars and balance pre-images saved when a block begins.
#[derive(Clone, Debug)]
struct BlockUndo {
    head_time: Timestamp,
    head_block_num: u64,
    next_event_seq: u64,
    pending_events: usize,
    balances: BTreeMap<AccountId, Option<Amount>>,
}

/// Full engine state.
#[derive(Clone, Debug)]
pub struct Database {
    pub(crate) params: ChainParameters,
    pub(crate) head_time: Timestamp,
    pub(crate) head_block_num: u64,
    pub(crate) balances: BTreeMap<AccountId, Amount>,
    pub(crate) tournaments: ObjectTable<TournamentObject>,
    pub(crate) tournament_details: ObjectTable<TournamentDetails>,
    pub(crate) matches: ObjectTable<MatchObject>,
    pub(crate) games: ObjectTable<GameObject>,
    pending_events: Vec<ChainEvent>,
    next_event_seq: u64,
    undo: Option<BlockUndo>,
}

impl Database {
    /// Genesis state.
    pub fn new(params: ChainParameters, genesis_time: Timestamp, balances: BTreeMap<AccountId, Amount>) -> Self {
        Self {
            params,
            head_time: genesis_time,
            head_block_num: 0,
            balances,
            tournaments: ObjectTable::new(),
            tournament_details: ObjectTable::new(),
            matches: ObjectTable::new(),
            games: ObjectTable::new(),
            pending_events: Vec::new(),
            next_event_seq: 0,
            undo: None,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Consensus parameters.
    #[inline]
    pub fn params(&self) -> &ChainParameters {
        &self.params
    }

    /// Time of the last applied block (genesis time before any).
    #[inline]
    pub fn head_time(&self) -> Timestamp {
        self.head_time
    }

    /// Number of applied blocks.
    #[inline]
    pub fn head_block_num(&self) -> u64 {
        self.head_block_num
    }

    /// Balance of `account` (zero if unknown).
    pub fn balance(&self, account: AccountId) -> Amount {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    /// All non-zero balances.
    pub fn balances(&self) -> &BTreeMap<AccountId, Amount> {
        &self.balances
    }

    /// Look up a tournament.
    pub fn tournament(&self, id: TournamentId) -> Option<&TournamentObject> {
        self.tournaments.get(id)
    }

    /// Look up a details record.
    pub fn tournament_details(&self, id: TournamentDetailsId) -> Option<&TournamentDetails> {
        self.tournament_details.get(id)
    }

    /// Look up a match.
    pub fn match_object(&self, id: MatchId) -> Option<&MatchObject> {
        self.matches.get(id)
    }

    /// Look up a game.
    pub fn game(&self, id: GameId) -> Option<&GameObject> {
        self.games.get(id)
    }

    /// All tournaments in identifier order.
    pub fn tournaments(&self) -> impl Iterator<Item = &TournamentObject> {
        self.tournaments.iter()
    }

    /// All matches in identifier order.
    pub fn matches(&self) -> impl Iterator<Item = &MatchObject> {
        self.matches.iter()
    }

    /// All games in identifier order.
    pub fn games(&self) -> impl Iterator<Item = &GameObject> {
        self.games.iter()
    }

    /// Matches of a tournament in bracket order.
    pub fn matches_by_tournament(&self, tournament: TournamentId) -> Vec<&MatchObject> {
        self.tournaments.get(tournament)
            .and_then(|t| self.tournament_details.get(t.details_id))
            .map(|details| details.matches.iter().filter_map(|id| self.matches.get(*id)).collect())
            .unwrap_or_default()
    }

    /// Games of a match in play order.
    pub fn games_by_match(&self, match_id: MatchId) -> Vec<&GameObject> {
        self.matches.get(match_id)
            .map(|m| m.games.iter().filter_map(|id| self.games.get(*id)).collect())
            .unwrap_or_default()
    }

    /// Tournaments `account` is registered in as a player, in identifier
    /// order. Registrations survive expiry and conclusion; a withdrawal
    /// removes them.
    pub fn tournaments_of(&self, account: AccountId) -> Vec<TournamentId> {
        self.tournament_details.iter()
            .filter(|details| details.is_registered(account))
            .map(|details| details.tournament_id)
            .collect()
    }

    /// The game currently being played in a match, if any.
    pub fn current_game(&self, match_id: MatchId) -> Option<&GameObject> {
        self.matches.get(match_id)
            .and_then(|m| m.games.last())
            .and_then(|id| self.games.get(*id))
            .filter(|game| !game.is_complete())
    }

    // =========================================================================
    // LOOKUPS FOR CASCADES
    // =========================================================================

    pub(crate) fn require_tournament(&self, id: TournamentId) -> Result<&TournamentObject, InvariantViolation> {
        self.tournaments.get(id).ok_or(InvariantViolation::MissingTournament(id))
    }

    pub(crate) fn require_details(&self, id: TournamentDetailsId) -> Result<&TournamentDetails, InvariantViolation> {
        self.tournament_details.get(id).ok_or(InvariantViolation::MissingDetails(id))
    }

    pub(crate) fn require_details_of(&self, tournament: TournamentId) -> Result<&TournamentDetails, InvariantViolation> {
        let details_id = self.require_tournament(tournament)?.details_id;
        self.require_details(details_id)
    }

    pub(crate) fn require_match(&self, id: MatchId) -> Result<&MatchObject, InvariantViolation> {
        self.matches.get(id).ok_or(InvariantViolation::MissingMatch(id))
    }

    pub(crate) fn require_game(&self, id: GameId) -> Result<&GameObject, InvariantViolation> {
        self.games.get(id).ok_or(InvariantViolation::MissingGame(id))
    }

    pub(crate) fn modify_tournament<R>(
        &mut self,
        id: TournamentId,
        f: impl FnOnce(&mut TournamentObject) -> R,
    ) -> Result<R, InvariantViolation> {
        self.tournaments.modify(id, f).ok_or(InvariantViolation::MissingTournament(id))
    }

    pub(crate) fn modify_details<R>(
        &mut self,
        id: TournamentDetailsId,
        f: impl FnOnce(&mut TournamentDetails) -> R,
    ) -> Result<R, InvariantViolation> {
        self.tournament_details.modify(id, f).ok_or(InvariantViolation::MissingDetails(id))
    }

    pub(crate) fn modify_match<R>(
        &mut self,
        id: MatchId,
        f: impl FnOnce(&mut MatchObject) -> R,
    ) -> Result<R, InvariantViolation> {
        self.matches.modify(id, f).ok_or(InvariantViolation::MissingMatch(id))
    }

    pub(crate) fn modify_game<R>(
        &mut self,
        id: GameId,
        f: impl FnOnce(&mut GameObject) -> R,
    ) -> Result<R, InvariantViolation> {
        self.games.modify(id, f).ok_or(InvariantViolation::MissingGame(id))
    }

    // =========================================================================
    // UNDO JOURNAL
    // =========================================================================

    /// Journal every change from here until `commit_changes` or
    /// `discard_changes`.
    pub(crate) fn begin_changes(&mut self) {
        self.undo = Some(BlockUndo {
            head_time: self.head_time,
            head_block_num: self.head_block_num,
            next_event_seq: self.next_event_seq,
            pending_events: self.pending_events.len(),
            balances: BTreeMap::new(),
        });
        self.tournaments.begin();
        self.tournament_details.begin();
        self.matches.begin();
        self.games.begin();
    }

    pub(crate) fn commit_changes(&mut self) {
        self.undo = None;
        self.tournaments.commit();
        self.tournament_details.commit();
        self.matches.commit();
        self.games.commit();
    }

    /// Restore the state saved by `begin_changes`.
    pub(crate) fn discard_changes(&mut self) {
        self.tournaments.rollback();
        self.tournament_details.rollback();
        self.matches.rollback();
        self.games.rollback();

        let Some(undo) = self.undo.take() else { return };
        self.head_time = undo.head_time;
        self.head_block_num = undo.head_block_num;
        self.next_event_seq = undo.next_event_seq;
        self.pending_events.truncate(undo.pending_events);
        for (account, balance) in undo.balances {
            match balance {
                Some(amount) => self.balances.insert(account, amount),
                None => self.balances.remove(&account),
            };
        }
        trace!(block = self.head_block_num, "changes discarded");
    }

    fn record_balance(&mut self, account: AccountId) {
        let Some(undo) = self.undo.as_mut() else { return };
        if let Entry::Vacant(slot) = undo.balances.entry(account) {
            slot.insert(self.balances.get(&account).copied());
        }
    }

    // =========================================================================
    // BALANCES
    // =========================================================================

    pub(crate) fn credit(&mut self, account: AccountId, amount: Amount) -> Result<(), InvariantViolation> {
        if amount == 0 {
            return Ok(());
        }
        self.record_balance(account);
        let balance = self.balances.entry(account).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(InvariantViolation::Overflow("credit"))?;
        Ok(())
    }

    pub(crate) fn debit(&mut self, account: AccountId, amount: Amount) -> Result<(), InvariantViolation> {
        if amount == 0 {
            return Ok(());
        }
        self.record_balance(account);
        let balance = self.balances.get_mut(&account)
            .filter(|balance| **balance >= amount)
            .ok_or(InvariantViolation::Overdraft { account, amount })?;
        *balance -= amount;
        if *balance == 0 {
            self.balances.remove(&account);
        }
        Ok(())
    }

    /// Balances plus prize pools still held by live tournaments.
    pub fn total_supply(&self) -> u128 {
        let balances: u128 = self.balances.values().map(|b| u128::from(*b)).sum();
        let pools: u128 = self.tournaments.iter()
            .filter(|t| t.holds_funds())
            .map(|t| u128::from(t.prize_pool))
            .sum();
        balances + pools
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    pub(crate) fn emit(&mut self, data: ChainEventData) {
        trace!(seq = self.next_event_seq, kind = data.kind(), "event");
        self.pending_events.push(ChainEvent {
            seq: self.next_event_seq,
            timestamp: self.head_time,
            data,
        });
        self.next_event_seq += 1;
    }

    /// Drain events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<ChainEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // =========================================================================
    // STATE HASH
    // =========================================================================

    /// Hash of the complete state, in identifier order.
    pub fn compute_state_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_chain_state();

        self.params.hash_into(&mut hasher);
        hasher.update_time(self.head_time);
        hasher.update_u64(self.head_block_num);

        hasher.update_u64(self.balances.len() as u64);
        for (account, amount) in &self.balances {
            hasher.update_id(*account);
            hasher.update_u64(*amount);
        }

        hasher.update_u64(self.tournaments.len() as u64);
        for tournament in self.tournaments.iter() {
            tournament.hash_into(&mut hasher);
        }
        hasher.update_u64(self.tournament_details.len() as u64);
        for details in self.tournament_details.iter() {
            details.hash_into(&mut hasher);
        }
        hasher.update_u64(self.matches.len() as u64);
        for m in self.matches.iter() {
            m.hash_into(&mut hasher);
        }
        hasher.update_u64(self.games.len() as u64);
        for game in self.games.iter() {
            game.hash_into(&mut hasher);
        }

        hasher.finalize()
    }
}
