//! Tournament Options
//!
//! Everything a creator chooses, and the validation that keeps those choices
//! inside the chain's limits.

use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};

use crate::chain::error::OperationError;
use crate::chain::params::ChainParameters;
use crate::core::hash::StateHasher;
use crate::core::ids::{AccountId, Amount};
use crate::core::time::Timestamp;
use crate::game::object::GameOptions;

/// When a tournament with enough players begins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartCondition {
    /// At a fixed time. Registration closes at that time if still open.
    At(Timestamp),
    /// `delay_secs` after the last seat is filled (0 = immediately).
    WhenFull {
        /// Seconds between filling up and starting.
        delay_secs: u32,
    },
}

/// Seats in every match of a single-elimination bracket.
pub const PLAYERS_PER_MATCH: u32 = 2;

/// Options fixed at creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentOptions {
    /// Registrations are refused after this time.
    pub registration_deadline: Timestamp,
    /// Capacity.
    pub number_of_players: u32,
    /// Fewest players the tournament will run with.
    pub minimum_players: u32,
    /// Amount each registration pays into the prize pool.
    pub buy_in: Amount,
    /// If non-empty, only these accounts may play.
    pub whitelist: BTreeSet<AccountId>,
    /// Start trigger.
    pub start: StartCondition,
    /// Seats per match. Brackets are pairwise, so only 2 is accepted.
    pub number_of_players_per_match: u32,
    /// Game wins needed to take a match.
    pub number_of_wins: u32,
    /// Game cap per match, ties included.
    pub max_games_per_match: u32,
    /// Game type and its settings.
    pub game_options: GameOptions,
}

impl TournamentOptions {
    /// Best-of-3 RPS that starts as soon as it is full and needs every seat.
    pub fn new(number_of_players: u32, buy_in: Amount, registration_deadline: Timestamp) -> Self {
        Self {
            registration_deadline,
            number_of_players,
            minimum_players: number_of_players,
            buy_in,
            whitelist: BTreeSet::new(),
            start: StartCondition::WhenFull { delay_secs: 0 },
            number_of_players_per_match: PLAYERS_PER_MATCH,
            number_of_wins: 2,
            max_games_per_match: 9,
            game_options: GameOptions::default(),
        }
    }

    /// Set the start condition.
    pub fn with_start(mut self, start: StartCondition) -> Self {
        self.start = start;
        self
    }

    /// Set the minimum player count.
    pub fn with_minimum_players(mut self, minimum_players: u32) -> Self {
        self.minimum_players = minimum_players;
        self
    }

    /// Restrict registration to `accounts`.
    pub fn with_whitelist<I: IntoIterator<Item = AccountId>>(mut self, accounts: I) -> Self {
        self.whitelist = accounts.into_iter().collect();
        self
    }

    /// Set the win threshold and the game cap per match.
    pub fn with_wins(mut self, number_of_wins: u32, max_games_per_match: u32) -> Self {
        self.number_of_wins = number_of_wins;
        self.max_games_per_match = max_games_per_match;
        self
    }

    /// Set the game options.
    pub fn with_game_options(mut self, game_options: GameOptions) -> Self {
        self.game_options = game_options;
        self
    }

    /// Check the options against chain limits at creation time `now`.
    pub fn validate(&self, params: &ChainParameters, now: Timestamp) -> Result<(), OperationError> {
        if self.number_of_players < 2 {
            return Err(OperationError::InvalidOptions("a tournament needs at least two players"));
        }
        if self.number_of_players > params.maximum_players_in_tournament {
            return Err(OperationError::InvalidOptions("too many players"));
        }
        if self.minimum_players < 2 || self.minimum_players > self.number_of_players {
            return Err(OperationError::InvalidOptions("minimum players must be between 2 and the capacity"));
        }
        if self.registration_deadline <= now {
            return Err(OperationError::InvalidOptions("registration deadline must be in the future"));
        }
        if self.registration_deadline > now.saturating_add_secs(params.maximum_registration_deadline) {
            return Err(OperationError::InvalidOptions("registration deadline too far in the future"));
        }
        if self.whitelist.len() as u64 > u64::from(params.maximum_tournament_whitelist_length) {
            return Err(OperationError::InvalidOptions("whitelist too long"));
        }
        if !self.whitelist.is_empty() && (self.whitelist.len() as u64) < u64::from(self.minimum_players) {
            return Err(OperationError::InvalidOptions("whitelist cannot fill the minimum player count"));
        }

        match self.start {
            StartCondition::At(start_time) => {
                if start_time <= now {
                    return Err(OperationError::InvalidOptions("start time must be in the future"));
                }
                if start_time > now.saturating_add_secs(params.maximum_tournament_start_time_in_future) {
                    return Err(OperationError::InvalidOptions("start time too far in the future"));
                }
            }
            StartCondition::WhenFull { delay_secs } => {
                if delay_secs > params.maximum_tournament_start_delay {
                    return Err(OperationError::InvalidOptions("start delay too long"));
                }
            }
        }

        if self.number_of_players_per_match != PLAYERS_PER_MATCH {
            return Err(OperationError::InvalidOptions("matches must be between two players"));
        }
        if self.number_of_wins == 0 || self.number_of_wins > params.maximum_tournament_number_of_wins {
            return Err(OperationError::InvalidOptions("number of wins out of range"));
        }
        let shortest_decisive = u64::from(self.number_of_wins) * 2 - 1;
        if u64::from(self.max_games_per_match) < shortest_decisive {
            return Err(OperationError::InvalidOptions("game cap cannot fit the required wins"));
        }
        if self.max_games_per_match > params.maximum_games_per_match {
            return Err(OperationError::InvalidOptions("game cap too large"));
        }

        self.game_options.validate()
    }

    /// Is `player` allowed to register?
    pub fn admits(&self, player: AccountId) -> bool {
        self.whitelist.is_empty() || self.whitelist.contains(&player)
    }

    /// Hash options for state verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_time(self.registration_deadline);
        hasher.update_u32(self.number_of_players);
        hasher.update_u32(self.minimum_players);
        hasher.update_u64(self.buy_in);
        hasher.update_ids(self.whitelist.iter());
        match self.start {
            StartCondition::At(t) => {
                hasher.update_u8(0);
                hasher.update_time(t);
            }
            StartCondition::WhenFull { delay_secs } => {
                hasher.update_u8(1);
                hasher.update_u32(delay_secs);
            }
        }
        hasher.update_u32(self.number_of_players_per_match);
        hasher.update_u32(self.number_of_wins);
        hasher.update_u32(self.max_games_per_match);
        self.game_options.hash_into(hasher);
    }
}
