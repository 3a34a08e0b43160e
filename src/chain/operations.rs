//! Operations
//!
//! Player-submitted operations. Each one is checked by `evaluate` against
//! the current state without mutating anything, then `apply` performs it and
//! may assume evaluation passed.

use serde::{Serialize, Deserialize};

use crate::chain::database::Database;
use crate::chain::error::{InvariantViolation, OperationError};
use crate::core::ids::{AccountId, Amount, GameId, TournamentId};
use crate::game::engine;
use crate::game::object::GameMove;
use crate::tournament::options::TournamentOptions;
use crate::tournament::registry;

/// A tournament operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Create a tournament
    TournamentCreate {
        /// Creating account
        creator: AccountId,
        /// Tournament options
        options: TournamentOptions,
    },
    /// Register `player`, with `payer` paying the buy-in
    TournamentJoin {
        /// Account paying
        payer: AccountId,
        /// Account registered
        player: AccountId,
        /// Tournament joined
        tournament: TournamentId,
        /// Must equal the tournament's buy-in
        buy_in: Amount,
    },
    /// Withdraw `player` before registration closes
    TournamentLeave {
        /// Signing account: the player or their payer
        canceling_account: AccountId,
        /// Account withdrawn
        player: AccountId,
        /// Tournament left
        tournament: TournamentId,
    },
    /// Commit or reveal in a game
    GameMove {
        /// Game addressed
        game: GameId,
        /// Moving player
        player: AccountId,
        /// The move
        mv: GameMove,
    },
}

/// What an applied operation produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationResult {
    /// Identifier of the tournament created
    TournamentCreated(TournamentId),
    /// Operation applied, nothing to report
    Applied,
}

impl Operation {
    /// Check preconditions. Never mutates.
    pub fn evaluate(&self, db: &Database) -> Result<(), OperationError> {
        match self {
            Operation::TournamentCreate { options, .. } => registry::evaluate_create(db, options),
            Operation::TournamentJoin { payer, player, tournament, buy_in } => {
                registry::evaluate_join(db, *payer, *player, *tournament, *buy_in)
            }
            Operation::TournamentLeave { canceling_account, player, tournament } => {
                registry::evaluate_leave(db, *canceling_account, *player, *tournament)
            }
            Operation::GameMove { game, player, mv } => engine::evaluate_move(db, *game, *player, mv),
        }
    }

    /// Perform the operation. Call only after `evaluate` succeeded.
    pub fn apply(&self, db: &mut Database) -> Result<OperationResult, InvariantViolation> {
        match self {
            Operation::TournamentCreate { creator, options } => {
                let id = registry::create_tournament(db, *creator, options.clone());
                Ok(OperationResult::TournamentCreated(id))
            }
            Operation::TournamentJoin { payer, player, tournament, buy_in } => {
                registry::on_player_registered(db, *tournament, *payer, *player, *buy_in)?;
                Ok(OperationResult::Applied)
            }
            Operation::TournamentLeave { player, tournament, .. } => {
                registry::on_player_unregistered(db, *tournament, *player)?;
                Ok(OperationResult::Applied)
            }
            Operation::GameMove { game, player, mv } => {
                engine::apply_move(db, *game, *player, mv)?;
                Ok(OperationResult::Applied)
            }
        }
    }

    /// Short kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::TournamentCreate { .. } => "tournament_create",
            Operation::TournamentJoin { .. } => "tournament_join",
            Operation::TournamentLeave { .. } => "tournament_leave",
            Operation::GameMove { .. } => "game_move",
        }
    }
}
