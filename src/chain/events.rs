//! Chain Events
//!
//! Every state transition appends an event to the database's pending list.
//! Blocks drain the list, so observers see exactly what a block did.

use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};

use crate::core::ids::{AccountId, Amount, GameId, MatchId, TournamentId};
use crate::core::time::Timestamp;
use crate::game::rps::Gesture;

/// A sequenced event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    /// Position in the chain's event stream
    pub seq: u64,
    /// Head time when emitted
    pub timestamp: Timestamp,
    /// Payload
    pub data: ChainEventData,
}

/// Event payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainEventData {
    /// Tournament created
    TournamentCreated {
        /// New tournament
        tournament: TournamentId,
        /// Creator
        creator: AccountId,
    },
    /// Player registered
    PlayerRegistered {
        /// Tournament joined
        tournament: TournamentId,
        /// Registered player
        player: AccountId,
        /// Account that paid the buy-in
        payer: AccountId,
        /// Amount paid
        buy_in: Amount,
    },
    /// Player withdrew
    PlayerUnregistered {
        /// Tournament left
        tournament: TournamentId,
        /// Withdrawn player
        player: AccountId,
    },
    /// Buy-in returned
    Refunded {
        /// Tournament refunding
        tournament: TournamentId,
        /// Account credited
        payer: AccountId,
        /// Amount returned
        amount: Amount,
    },
    /// Registration closed with too few players
    RegistrationExpired {
        /// Expired tournament
        tournament: TournamentId,
    },
    /// Registration closed, start pending
    AwaitingStart {
        /// Tournament waiting
        tournament: TournamentId,
        /// Scheduled start
        start_time: Timestamp,
    },
    /// Bracket built and first matches started
    TournamentStarted {
        /// Started tournament
        tournament: TournamentId,
        /// Number of entrants
        players: u32,
        /// Number of matches in the bracket
        matches: u32,
    },
    /// Match received its players
    MatchStarted {
        /// Owning tournament
        tournament: TournamentId,
        /// Started match
        match_id: MatchId,
        /// Its players
        players: Vec<AccountId>,
    },
    /// Game opened for commitments
    GameStarted {
        /// Owning match
        match_id: MatchId,
        /// New game
        game: GameId,
        /// Commit deadline
        commit_deadline: Timestamp,
    },
    /// Commitment stored
    MoveCommitted {
        /// Game
        game: GameId,
        /// Committing player
        player: AccountId,
    },
    /// Every player committed
    RevealPhaseStarted {
        /// Game
        game: GameId,
        /// Reveal deadline
        deadline: Timestamp,
    },
    /// Reveal accepted
    MoveRevealed {
        /// Game
        game: GameId,
        /// Revealing player
        player: AccountId,
        /// Revealed gesture
        gesture: Gesture,
    },
    /// Reveal did not open the commitment
    InvalidReveal {
        /// Game
        game: GameId,
        /// Revealing player
        player: AccountId,
    },
    /// Player missed a deadline
    Forfeit {
        /// Game
        game: GameId,
        /// Forfeiting player
        player: AccountId,
    },
    /// Game finished
    GameCompleted {
        /// Game
        game: GameId,
        /// Owning match
        match_id: MatchId,
        /// Winners (empty on a tie)
        winners: BTreeSet<AccountId>,
    },
    /// Match finished
    MatchCompleted {
        /// Owning tournament
        tournament: TournamentId,
        /// Match
        match_id: MatchId,
        /// Winners
        winners: BTreeSet<AccountId>,
    },
    /// Prize or rake paid
    Payout {
        /// Paying tournament
        tournament: TournamentId,
        /// Account credited
        account: AccountId,
        /// Amount
        amount: Amount,
        /// Rake rather than prize
        rake: bool,
    },
    /// Champion decided and paid
    TournamentConcluded {
        /// Concluded tournament
        tournament: TournamentId,
        /// Champions
        champions: BTreeSet<AccountId>,
    },
}

impl ChainEventData {
    /// Short kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ChainEventData::TournamentCreated { .. } => "tournament_created",
            ChainEventData::PlayerRegistered { .. } => "player_registered",
            ChainEventData::PlayerUnregistered { .. } => "player_unregistered",
            ChainEventData::Refunded { .. } => "refunded",
            ChainEventData::RegistrationExpired { .. } => "registration_expired",
            ChainEventData::AwaitingStart { .. } => "awaiting_start",
            ChainEventData::TournamentStarted { .. } => "tournament_started",
            ChainEventData::MatchStarted { .. } => "match_started",
            ChainEventData::GameStarted { .. } => "game_started",
            ChainEventData::MoveCommitted { .. } => "move_committed",
            ChainEventData::RevealPhaseStarted { .. } => "reveal_phase_started",
            ChainEventData::MoveRevealed { .. } => "move_revealed",
            ChainEventData::InvalidReveal { .. } => "invalid_reveal",
            ChainEventData::Forfeit { .. } => "forfeit",
            ChainEventData::GameCompleted { .. } => "game_completed",
            ChainEventData::MatchCompleted { .. } => "match_completed",
            ChainEventData::Payout { .. } => "payout",
            ChainEventData::TournamentConcluded { .. } => "tournament_concluded",
        }
    }
}
