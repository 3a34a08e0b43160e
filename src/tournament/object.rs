//! Tournament Entities
//!
//! The hot summary (`TournamentObject`) and the bulky membership record
//! (`TournamentDetails`). One of each per tournament, linked by id.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::chain::store::StoredObject;
use crate::core::hash::StateHasher;
use crate::core::ids::{AccountId, Amount, MatchId, TournamentDetailsId, TournamentId};
use crate::core::time::Timestamp;
use crate::tournament::options::{StartCondition, TournamentOptions};

/// Time index: registration deadline of tournaments still accepting players.
pub const REGISTRATION_DEADLINE_INDEX: usize = 0;
/// Time index: scheduled start of tournaments that have not started.
pub const START_TIME_INDEX: usize = 1;

// =============================================================================
// TOURNAMENT STATE
// =============================================================================

/// Lifecycle of a tournament.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TournamentState {
    /// Open for registration
    AcceptingRegistrations = 0,
    /// Registration closed, start time not reached
    AwaitingStart = 1,
    /// Bracket built, matches running
    InProgress = 2,
    /// Too few players by the deadline; everyone refunded (terminal)
    RegistrationPeriodExpired = 3,
    /// Champion paid (terminal)
    Concluded = 4,
}

impl TournamentState {
    /// Is this a terminal state?
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, TournamentState::RegistrationPeriodExpired | TournamentState::Concluded)
    }
}

// =============================================================================
// TOURNAMENT OBJECT
// =============================================================================

/// Summary record of a tournament.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentObject {
    /// Identifier
    pub id: TournamentId,
    /// Account that created it
    pub creator: AccountId,
    /// Options fixed at creation
    pub options: TournamentOptions,
    /// Scheduled start, then actual start
    pub start_time: Option<Timestamp>,
    /// Time of conclusion or expiry
    pub end_time: Option<Timestamp>,
    /// Buy-ins collected (kept as history once terminal)
    pub prize_pool: Amount,
    /// Number of registered players
    pub registered_players: u32,
    /// Membership record
    pub details_id: TournamentDetailsId,
    /// Lifecycle state
    pub state: TournamentState,
}

impl StoredObject for TournamentObject {
    type Id = TournamentId;

    const TIME_INDICES: usize = 2;

    fn id(&self) -> TournamentId {
        self.id
    }

    fn time_key(&self, index: usize) -> Option<Timestamp> {
        match (index, self.state) {
            (REGISTRATION_DEADLINE_INDEX, TournamentState::AcceptingRegistrations) => {
                Some(self.options.registration_deadline)
            }
            (START_TIME_INDEX, TournamentState::AcceptingRegistrations | TournamentState::AwaitingStart) => {
                self.start_time
            }
            _ => None,
        }
    }
}

impl TournamentObject {
    /// New tournament accepting registrations.
    pub fn new(
        id: TournamentId,
        creator: AccountId,
        options: TournamentOptions,
        details_id: TournamentDetailsId,
    ) -> Self {
        let start_time = match options.start {
            StartCondition::At(t) => Some(t),
            StartCondition::WhenFull { .. } => None,
        };
        Self {
            id,
            creator,
            options,
            start_time,
            end_time: None,
            prize_pool: 0,
            registered_players: 0,
            details_id,
            state: TournamentState::AcceptingRegistrations,
        }
    }

    /// Every seat taken?
    #[inline]
    pub fn is_full(&self) -> bool {
        self.registered_players >= self.options.number_of_players
    }

    /// Enough players to run?
    #[inline]
    pub fn has_minimum(&self) -> bool {
        self.registered_players >= self.options.minimum_players
    }

    /// Does the prize pool still count toward circulating supply?
    #[inline]
    pub fn holds_funds(&self) -> bool {
        !self.state.is_terminal()
    }

    /// Hash this tournament's state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_id(self.id);
        hasher.update_id(self.creator);
        self.options.hash_into(hasher);
        hasher.update_opt_time(self.start_time);
        hasher.update_opt_time(self.end_time);
        hasher.update_u64(self.prize_pool);
        hasher.update_u32(self.registered_players);
        hasher.update_id(self.details_id);
        hasher.update_u8(self.state as u8);
    }
}

// =============================================================================
// TOURNAMENT DETAILS
// =============================================================================

/// Membership and bracket record of a tournament.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentDetails {
    /// Identifier
    pub id: TournamentDetailsId,
    /// Owning tournament
    pub tournament_id: TournamentId,
    /// Registered players in registration order (unique)
    pub registered_players: Vec<AccountId>,
    /// Total contributed per payer
    pub payers: BTreeMap<AccountId, Amount>,
    /// Who paid for each player
    pub players_payers: BTreeMap<AccountId, AccountId>,
    /// Every match of the bracket, final last
    pub matches: Vec<MatchId>,
}

impl StoredObject for TournamentDetails {
    type Id = TournamentDetailsId;

    fn id(&self) -> TournamentDetailsId {
        self.id
    }
}

impl TournamentDetails {
    /// Empty record.
    pub fn new(id: TournamentDetailsId, tournament_id: TournamentId) -> Self {
        Self {
            id,
            tournament_id,
            registered_players: Vec::new(),
            payers: BTreeMap::new(),
            players_payers: BTreeMap::new(),
            matches: Vec::new(),
        }
    }

    /// Is `player` registered?
    pub fn is_registered(&self, player: AccountId) -> bool {
        self.players_payers.contains_key(&player)
    }

    /// Payer recorded for `player`.
    pub fn payer_of(&self, player: AccountId) -> Option<AccountId> {
        self.players_payers.get(&player).copied()
    }

    /// Sum of all recorded contributions, `None` on overflow.
    pub fn total_contributed(&self) -> Option<Amount> {
        self.payers.values().try_fold(0u64, |acc, amount| acc.checked_add(*amount))
    }

    /// The championship match, once the bracket exists.
    pub fn final_match(&self) -> Option<MatchId> {
        self.matches.last().copied()
    }

    /// Record a registration.
    pub(crate) fn add_player(&mut self, payer: AccountId, player: AccountId, buy_in: Amount) {
        self.registered_players.push(player);
        self.players_payers.insert(player, payer);
        *self.payers.entry(payer).or_insert(0) += buy_in;
    }

    /// Drop a registration. Returns the payer to refund.
    pub(crate) fn remove_player(&mut self, player: AccountId, buy_in: Amount) -> Option<AccountId> {
        let payer = self.players_payers.remove(&player)?;
        self.registered_players.retain(|p| *p != player);
        let still_sponsoring = self.players_payers.values().any(|p| *p == payer);
        if let Some(paid) = self.payers.get_mut(&payer) {
            *paid = paid.saturating_sub(buy_in);
            if *paid == 0 && !still_sponsoring {
                self.payers.remove(&payer);
            }
        }
        Some(payer)
    }

    /// Hash this record for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_id(self.id);
        hasher.update_id(self.tournament_id);
        hasher.update_ids(self.registered_players.iter());
        hasher.update_u64(self.payers.len() as u64);
        for (payer, amount) in &self.payers {
            hasher.update_id(*payer);
            hasher.update_u64(*amount);
        }
        hasher.update_u64(self.players_payers.len() as u64);
        for (player, payer) in &self.players_payers {
            hasher.update_id(*player);
            hasher.update_id(*payer);
        }
        hasher.update_ids(self.matches.iter());
    }
}

// =============================================================================
// TESTS
// =============================================================================
