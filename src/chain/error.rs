//! Error Taxonomy
//!
//! Two kinds of failure reach the caller:
//! - `OperationError`: a submitted operation's preconditions do not hold.
//!   Raised by `evaluate`, before anything is mutated.
//! - `InvariantViolation`: the engine itself produced inconsistent state.
//!   Fatal for the block being applied.
//!
//! Players refusing to act is neither; deadlines resolve it.

use thiserror::Error;

use crate::core::ids::{AccountId, Amount, GameId, MatchId, TournamentDetailsId, TournamentId};
use crate::core::time::Timestamp;
use crate::game::object::GameState;
use crate::tournament::object::TournamentState;

/// Rejected operation. The block containing it is not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// No tournament with this identifier.
    #[error("unknown tournament {0}")]
    UnknownTournament(TournamentId),

    /// No game with this identifier.
    #[error("unknown game {0}")]
    UnknownGame(GameId),

    /// Tournament is not in a state that accepts the operation.
    #[error("{tournament} is {actual:?}, operation requires {expected:?}")]
    WrongTournamentState {
        /// Tournament addressed.
        tournament: TournamentId,
        /// Its current state.
        actual: TournamentState,
        /// State the operation needs.
        expected: TournamentState,
    },

    /// Player already holds a registration.
    #[error("{player} is already registered in {tournament}")]
    AlreadyRegistered {
        /// Tournament addressed.
        tournament: TournamentId,
        /// Player named in the operation.
        player: AccountId,
    },

    /// Player holds no registration.
    #[error("{player} is not registered in {tournament}")]
    NotRegistered {
        /// Tournament addressed.
        tournament: TournamentId,
        /// Player named in the operation.
        player: AccountId,
    },

    /// Every seat is taken.
    #[error("{0} is full")]
    TournamentFull(TournamentId),

    /// Registration deadline or scheduled start reached; the timeout sweep
    /// has not closed registration yet.
    #[error("registration for {tournament} closed at {closed_at}")]
    RegistrationClosed {
        /// Tournament addressed.
        tournament: TournamentId,
        /// Earlier of the deadline and the scheduled start.
        closed_at: Timestamp,
    },

    /// Tournament has a whitelist and the player is not on it.
    #[error("{player} is not whitelisted for {tournament}")]
    NotWhitelisted {
        /// Tournament addressed.
        tournament: TournamentId,
        /// Player named in the operation.
        player: AccountId,
    },

    /// Offered buy-in differs from the tournament's.
    #[error("buy-in mismatch: expected {expected}, offered {offered}")]
    BuyInMismatch {
        /// Tournament's buy-in.
        expected: Amount,
        /// Amount in the operation.
        offered: Amount,
    },

    /// Payer cannot cover the buy-in.
    #[error("{account} holds {available}, needs {required}")]
    InsufficientBalance {
        /// Paying account.
        account: AccountId,
        /// Current balance.
        available: Amount,
        /// Amount required.
        required: Amount,
    },

    /// Account may not act for the player.
    #[error("{account} may not act for {player}")]
    Unauthorized {
        /// Account that signed the operation.
        account: AccountId,
        /// Player the operation concerns.
        player: AccountId,
    },

    /// Account is not one of the game's players.
    #[error("{player} is not playing in {game}")]
    NotAParticipant {
        /// Game addressed.
        game: GameId,
        /// Account named in the move.
        player: AccountId,
    },

    /// Game is not expecting this kind of move.
    #[error("{game} is {actual:?}, move requires {expected:?}")]
    WrongGameState {
        /// Game addressed.
        game: GameId,
        /// Its current state.
        actual: GameState,
        /// State the move needs.
        expected: GameState,
    },

    /// Move arrived at or after the phase deadline.
    #[error("{game} deadline {deadline} has passed")]
    DeadlinePassed {
        /// Game addressed.
        game: GameId,
        /// Deadline of the current phase.
        deadline: Timestamp,
    },

    /// Player already committed in this game.
    #[error("{player} already committed in {game}")]
    AlreadyCommitted {
        /// Game addressed.
        game: GameId,
        /// Player named in the move.
        player: AccountId,
    },

    /// Reveal without a prior commitment.
    #[error("{player} has no commitment in {game}")]
    NotCommitted {
        /// Game addressed.
        game: GameId,
        /// Player named in the move.
        player: AccountId,
    },

    /// Player already revealed (or forfeited) in this game.
    #[error("{player} already revealed in {game}")]
    AlreadyRevealed {
        /// Game addressed.
        game: GameId,
        /// Player named in the move.
        player: AccountId,
    },

    /// Move is for a different game type.
    #[error("move does not match the game type of {0}")]
    GameTypeMismatch(GameId),

    /// Tournament options fail validation.
    #[error("invalid tournament options: {0}")]
    InvalidOptions(&'static str),

    /// Block timestamp does not advance the head time.
    #[error("block time {got} is not after head time {head}")]
    NonMonotonicTime {
        /// Current head time.
        head: Timestamp,
        /// Timestamp of the rejected block.
        got: Timestamp,
    },
}

/// Internal inconsistency. Continuing would risk diverging from other nodes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// A match was started without enough players.
    #[error("{match_id} initiated with {players} player(s)")]
    UnderfilledMatch {
        /// Match being started.
        match_id: MatchId,
        /// Players it had.
        players: usize,
    },

    /// Prize pool disagrees with the recorded contributions.
    #[error("prize pool of {tournament} is {recorded}, contributions sum to {contributed}")]
    PrizePoolMismatch {
        /// Tournament checked.
        tournament: TournamentId,
        /// `prize_pool` field.
        recorded: Amount,
        /// Sum over the payer map.
        contributed: Amount,
    },

    /// Registered count disagrees with the details record.
    #[error("{tournament} records {recorded} registrations, details hold {actual}")]
    RegistrationCountMismatch {
        /// Tournament checked.
        tournament: TournamentId,
        /// `registered_players` field.
        recorded: u32,
        /// Length of the registered list.
        actual: usize,
    },

    /// Payouts do not add up to the prize pool.
    #[error("payouts of {tournament} sum to {paid}, prize pool is {prize_pool}")]
    PayoutMismatch {
        /// Tournament concluded.
        tournament: TournamentId,
        /// Sum of payouts.
        paid: Amount,
        /// Pool being distributed.
        prize_pool: Amount,
    },

    /// A referenced tournament is missing.
    #[error("dangling reference to {0}")]
    MissingTournament(TournamentId),

    /// A referenced details record is missing.
    #[error("dangling reference to {0}")]
    MissingDetails(TournamentDetailsId),

    /// A referenced match is missing.
    #[error("dangling reference to {0}")]
    MissingMatch(MatchId),

    /// A referenced game is missing.
    #[error("dangling reference to {0}")]
    MissingGame(GameId),

    /// Bracket structure is inconsistent.
    #[error("bracket of {tournament} is malformed: {reason}")]
    MalformedBracket {
        /// Tournament whose bracket failed.
        tournament: TournamentId,
        /// What was wrong.
        reason: &'static str,
    },

    /// A registered player has no recorded payer.
    #[error("{player} in {tournament} has no recorded payer")]
    MissingPayer {
        /// Tournament checked.
        tournament: TournamentId,
        /// Player without a payer.
        player: AccountId,
    },

    /// A match completed with no one to advance.
    #[error("{0} completed without winners")]
    EmptyWinnerSet(MatchId),

    /// Balance arithmetic left the representable range.
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    /// An account was debited more than it holds after evaluation passed.
    #[error("{account} cannot cover a debit of {amount}")]
    Overdraft {
        /// Account debited.
        account: AccountId,
        /// Amount of the debit.
        amount: Amount,
    },
}

/// Any failure while applying operations or blocks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Operation rejected by evaluation.
    #[error("operation rejected: {0}")]
    Rejected(#[from] OperationError),

    /// Engine invariant broken.
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}

impl ChainError {
    /// Does this error indicate a defect rather than a bad operation?
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChainError::Invariant(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        let rejected: ChainError = OperationError::TournamentFull(TournamentId::new(1)).into();
        let fatal: ChainError = InvariantViolation::MissingGame(GameId::new(4)).into();

        assert!(!rejected.is_fatal());
        assert!(fatal.is_fatal());
    }

    #[test]
    fn test_messages_name_objects() {
        let err = OperationError::NotAParticipant {
            game: GameId::new(3),
            player: AccountId::new(9),
        };
        assert_eq!(err.to_string(), "account#9 is not playing in game#3");
    }
}
