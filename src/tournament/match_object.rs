//! Match Controller
//!
//! A match plays games between its players until one reaches the win
//! threshold or the game cap is hit:
//!
//! ```text
//! WaitingOnPreviousMatches -> MatchInProgress -> MatchComplete
//! ```
//!
//! Ties credit nobody and schedule a replacement game. At the cap, every
//! player on the highest win count becomes a joint winner, so a complete
//! match always has at least one winner.

use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::chain::database::Database;
use crate::chain::error::InvariantViolation;
use crate::chain::events::ChainEventData;
use crate::chain::store::StoredObject;
use crate::core::hash::StateHasher;
use crate::core::ids::{AccountId, GameId, MatchId, TournamentId};
use crate::core::time::Timestamp;
use crate::game::engine;
use crate::game::object::{GameCompleted, GameObject};
use crate::tournament::registry;

// =============================================================================
// MATCH TYPES
// =============================================================================

/// Lifecycle of a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MatchState {
    /// Slots not yet filled
    WaitingOnPreviousMatches = 0,
    /// Games being played
    MatchInProgress = 1,
    /// Winners decided (terminal)
    MatchComplete = 2,
}

/// Where a bracket slot's player comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BracketSlot {
    /// A registered player placed directly (first round or bye)
    Seeded(AccountId),
    /// The advancing winner of a feeder match
    WinnerOf(MatchId),
}

/// Notice sent from a finished match to its tournament.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchCompleted {
    /// Finished match
    pub match_id: MatchId,
    /// Owning tournament
    pub tournament_id: TournamentId,
    /// Winners (never empty)
    pub winners: BTreeSet<AccountId>,
}

/// Outcome of recording a game result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchProgress {
    /// Nobody has won yet; play another game
    NextGame,
    /// Match decided
    Completed(MatchCompleted),
}

// =============================================================================
// MATCH OBJECT
// =============================================================================

/// One pairing in the bracket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchObject {
    /// Identifier
    pub id: MatchId,
    /// Owning tournament
    pub tournament_id: TournamentId,
    /// Bracket round, starting at 1
    pub round: u32,
    /// Player sources
    pub slots: Vec<BracketSlot>,
    /// Players, filled when the match starts
    pub players: Vec<AccountId>,
    /// Games played, in order
    pub games: Vec<GameId>,
    /// Winners of each game
    pub game_winners: Vec<BTreeSet<AccountId>>,
    /// Game wins per player, parallel to `players`
    pub number_of_wins: Vec<u32>,
    /// Games that ended with no winner
    pub number_of_ties: u32,
    /// Match winners (empty until complete)
    pub match_winners: BTreeSet<AccountId>,
    /// When the players were assigned
    pub start_time: Option<Timestamp>,
    /// When the match completed
    pub end_time: Option<Timestamp>,
    /// Lifecycle state
    pub state: MatchState,
}

impl StoredObject for MatchObject {
    type Id = MatchId;

    fn id(&self) -> MatchId {
        self.id
    }
}

impl MatchObject {
    /// New match waiting for its slots.
    pub fn new(id: MatchId, tournament_id: TournamentId, round: u32, slots: Vec<BracketSlot>) -> Self {
        Self {
            id,
            tournament_id,
            round,
            slots,
            players: Vec::new(),
            games: Vec::new(),
            game_winners: Vec::new(),
            number_of_wins: Vec::new(),
            number_of_ties: 0,
            match_winners: BTreeSet::new(),
            start_time: None,
            end_time: None,
            state: MatchState::WaitingOnPreviousMatches,
        }
    }

    /// Is the match decided?
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.state == MatchState::MatchComplete
    }

    /// Player who moves on to the next round: the lowest identifier among
    /// the winners.
    pub fn advancing_winner(&self) -> Option<AccountId> {
        self.match_winners.iter().next().copied()
    }

    /// Game wins of `player`.
    pub fn wins_of(&self, player: AccountId) -> u32 {
        self.players.iter()
            .position(|p| *p == player)
            .and_then(|i| self.number_of_wins.get(i).copied())
            .unwrap_or(0)
    }

    /// Assign players and move to `MatchInProgress`.
    pub fn begin(&mut self, players: Vec<AccountId>, now: Timestamp) -> Result<(), InvariantViolation> {
        if players.len() < 2 {
            return Err(InvariantViolation::UnderfilledMatch {
                match_id: self.id,
                players: players.len(),
            });
        }
        self.number_of_wins = vec![0; players.len()];
        self.players = players;
        self.start_time = Some(now);
        self.state = MatchState::MatchInProgress;
        Ok(())
    }

    /// Record a finished game and decide whether the match goes on.
    pub fn record_game(
        &mut self,
        winners: &BTreeSet<AccountId>,
        wins_required: u32,
        max_games: u32,
        now: Timestamp,
    ) -> MatchProgress {
        self.game_winners.push(winners.clone());
        if winners.is_empty() {
            self.number_of_ties += 1;
        }
        for (player, wins) in self.players.iter().zip(self.number_of_wins.iter_mut()) {
            if winners.contains(player) {
                *wins += 1;
            }
        }

        let reached: BTreeSet<AccountId> = self.players.iter()
            .zip(self.number_of_wins.iter())
            .filter(|(_, wins)| **wins >= wins_required)
            .map(|(player, _)| *player)
            .collect();

        let decided = if !reached.is_empty() {
            reached
        } else if self.games.len() as u64 >= u64::from(max_games) {
            let best = self.number_of_wins.iter().copied().max().unwrap_or(0);
            self.players.iter()
                .zip(self.number_of_wins.iter())
                .filter(|(_, wins)| **wins == best)
                .map(|(player, _)| *player)
                .collect()
        } else {
            return MatchProgress::NextGame;
        };

        self.match_winners = decided.clone();
        self.end_time = Some(now);
        self.state = MatchState::MatchComplete;
        MatchProgress::Completed(MatchCompleted {
            match_id: self.id,
            tournament_id: self.tournament_id,
            winners: decided,
        })
    }

    /// Hash this match's state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_id(self.id);
        hasher.update_id(self.tournament_id);
        hasher.update_u32(self.round);
        hasher.update_u64(self.slots.len() as u64);
        for slot in &self.slots {
            match slot {
                BracketSlot::Seeded(player) => {
                    hasher.update_u8(0);
                    hasher.update_id(*player);
                }
                BracketSlot::WinnerOf(feeder) => {
                    hasher.update_u8(1);
                    hasher.update_id(*feeder);
                }
            }
        }
        hasher.update_ids(self.players.iter());
        hasher.update_ids(self.games.iter());
        hasher.update_u64(self.game_winners.len() as u64);
        for winners in &self.game_winners {
            hasher.update_ids(winners.iter());
        }
        hasher.update_u64(self.number_of_wins.len() as u64);
        for wins in &self.number_of_wins {
            hasher.update_u32(*wins);
        }
        hasher.update_u32(self.number_of_ties);
        hasher.update_ids(self.match_winners.iter());
        hasher.update_opt_time(self.start_time);
        hasher.update_opt_time(self.end_time);
        hasher.update_u8(self.state as u8);
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Fill a waiting match with its players and start its first game.
pub fn on_initiate_match(
    db: &mut Database,
    match_id: MatchId,
    players: Vec<AccountId>,
    now: Timestamp,
) -> Result<(), InvariantViolation> {
    let tournament_id = db.require_match(match_id)?.tournament_id;
    db.modify_match(match_id, |m| m.begin(players.clone(), now))??;

    info!(%match_id, players = ?players, "match started");
    db.emit(ChainEventData::MatchStarted {
        tournament: tournament_id,
        match_id,
        players,
    });

    start_next_game(db, match_id, now)?;
    Ok(())
}

/// Create and start another game between the match's players.
pub fn start_next_game(db: &mut Database, match_id: MatchId, now: Timestamp) -> Result<GameId, InvariantViolation> {
    let m = db.require_match(match_id)?;
    let players = m.players.clone();
    let game_options = db.require_tournament(m.tournament_id)?.options.game_options.clone();

    let game_id = db.games.create(|id| GameObject::new(id, match_id, players, game_options));
    db.modify_match(match_id, |m| m.games.push(game_id))?;
    engine::start_game(db, game_id, now)?;
    Ok(game_id)
}

/// Fold a finished game into its match; start the next game or complete
/// the match and notify the tournament.
pub fn on_game_complete(db: &mut Database, completed: GameCompleted, now: Timestamp) -> Result<(), InvariantViolation> {
    let match_id = completed.match_id;
    let tournament_id = db.require_match(match_id)?.tournament_id;
    let options = &db.require_tournament(tournament_id)?.options;
    let (wins_required, max_games) = (options.number_of_wins, options.max_games_per_match);

    let progress = db.modify_match(match_id, |m| {
        m.record_game(&completed.winners, wins_required, max_games, now)
    })?;

    match progress {
        MatchProgress::NextGame => {
            debug!(%match_id, game = %completed.game_id, "no match winner yet, next game");
            start_next_game(db, match_id, now)?;
        }
        MatchProgress::Completed(done) => {
            if done.winners.is_empty() {
                return Err(InvariantViolation::EmptyWinnerSet(match_id));
            }
            info!(%match_id, winners = ?done.winners, "match complete");
            db.emit(ChainEventData::MatchCompleted {
                tournament: done.tournament_id,
                match_id,
                winners: done.winners.clone(),
            });
            registry::on_match_completed(db, done, now)?;
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
