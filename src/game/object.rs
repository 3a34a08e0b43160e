//! Game State Machine
//!
//! One game between the players of a match:
//!
//! ```text
//! GameInProgress -> ExpectingCommitMoves -> ExpectingRevealMoves -> GameComplete
//!                           |                                          ^
//!                           +---------- commit deadline (forfeit) -----+
//! ```
//!
//! Transitions only touch the game itself and return the effects the caller
//! must apply elsewhere (events, the completion notice for the match).

use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};

use crate::chain::error::OperationError;
use crate::chain::store::StoredObject;
use crate::core::hash::StateHasher;
use crate::core::ids::{AccountId, GameId, MatchId};
use crate::core::time::Timestamp;
use crate::game::commitment::CommitmentVerifier;
use crate::game::rps::{
    Gesture, RpsCommit, RpsGameDetails, RpsGameOptions, RpsReveal,
    CLASSIC_GESTURES, EXTENDED_GESTURES,
};

// =============================================================================
// GAME TYPES
// =============================================================================

/// Lifecycle of a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    /// Created, not yet started
    GameInProgress,
    /// Waiting for every player's commitment
    ExpectingCommitMoves,
    /// Waiting for every committed player's reveal
    ExpectingRevealMoves,
    /// Winners decided (terminal)
    GameComplete,
}

/// Options for the game type a tournament plays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOptions {
    /// Commit-reveal Rock-Paper-Scissors
    RockPaperScissors(RpsGameOptions),
}

impl Default for GameOptions {
    fn default() -> Self {
        GameOptions::RockPaperScissors(RpsGameOptions::default())
    }
}

impl GameOptions {
    /// Check option ranges.
    pub fn validate(&self) -> Result<(), OperationError> {
        match self {
            GameOptions::RockPaperScissors(rps) => {
                if rps.time_per_commit_move == 0 {
                    return Err(OperationError::InvalidOptions("commit window must be positive"));
                }
                if rps.time_per_reveal_move == 0 {
                    return Err(OperationError::InvalidOptions("reveal window must be positive"));
                }
                if rps.number_of_gestures != CLASSIC_GESTURES && rps.number_of_gestures != EXTENDED_GESTURES {
                    return Err(OperationError::InvalidOptions("number of gestures must be 3 or 5"));
                }
                Ok(())
            }
        }
    }

    /// Empty details payload for a new game.
    fn new_details(&self, players: usize) -> GameDetails {
        match self {
            GameOptions::RockPaperScissors(_) => GameDetails::RockPaperScissors(RpsGameDetails::new(players)),
        }
    }

    /// Hash options for state verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        match self {
            GameOptions::RockPaperScissors(rps) => {
                hasher.update_u8(0);
                rps.hash_into(hasher);
            }
        }
    }
}

/// Game-type-specific progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameDetails {
    /// Throws of an RPS game
    RockPaperScissors(RpsGameDetails),
}

/// A move submitted by a player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMove {
    /// Publish a commitment
    RpsCommit(RpsCommit),
    /// Open a commitment
    RpsReveal(RpsReveal),
}

/// Notice sent from a finished game to its match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameCompleted {
    /// Finished game
    pub game_id: GameId,
    /// Owning match
    pub match_id: MatchId,
    /// Winners (empty on a tie)
    pub winners: BTreeSet<AccountId>,
}

/// Side effect of a game transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameEffect {
    /// Player's commitment stored
    Committed {
        /// Committing player
        player: AccountId,
    },
    /// Every player committed; reveals are due by `deadline`
    RevealPhaseStarted {
        /// Reveal deadline
        deadline: Timestamp,
    },
    /// Player's reveal opened their commitment
    Revealed {
        /// Revealing player
        player: AccountId,
        /// Revealed gesture
        gesture: Gesture,
    },
    /// Player's reveal did not open their commitment
    InvalidReveal {
        /// Revealing player
        player: AccountId,
    },
    /// Player missed a deadline
    Forfeited {
        /// Player who forfeits
        player: AccountId,
    },
    /// Game finished
    Completed(GameCompleted),
}

// =============================================================================
// GAME OBJECT
// =============================================================================

/// A single game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameObject {
    /// Identifier
    pub id: GameId,
    /// Owning match
    pub match_id: MatchId,
    /// Participants, in match order
    pub players: Vec<AccountId>,
    /// Declared winners (empty until complete, empty on a tie)
    pub winners: BTreeSet<AccountId>,
    /// Options copied from the tournament
    pub options: GameOptions,
    /// Per-player progress
    pub details: GameDetails,
    /// Deadline of the current phase
    pub next_timeout: Option<Timestamp>,
    /// Lifecycle state
    pub state: GameState,
}

impl StoredObject for GameObject {
    type Id = GameId;

    const TIME_INDICES: usize = 1;

    fn id(&self) -> GameId {
        self.id
    }

    fn time_key(&self, _index: usize) -> Option<Timestamp> {
        if self.state == GameState::GameComplete {
            None
        } else {
            self.next_timeout
        }
    }
}

impl GameObject {
    /// Create a game that has not started yet.
    pub fn new(id: GameId, match_id: MatchId, players: Vec<AccountId>, options: GameOptions) -> Self {
        let details = options.new_details(players.len());
        Self {
            id,
            match_id,
            players,
            winners: BTreeSet::new(),
            options,
            details,
            next_timeout: None,
            state: GameState::GameInProgress,
        }
    }

    /// Open the commit phase. Returns the commit deadline.
    pub fn start(&mut self, now: Timestamp) -> Timestamp {
        let window = match &self.options {
            GameOptions::RockPaperScissors(rps) => rps.time_per_commit_move,
        };
        let deadline = now.saturating_add_secs(window);
        self.state = GameState::ExpectingCommitMoves;
        self.next_timeout = Some(deadline);
        deadline
    }

    /// Position of `player` in the player list.
    pub fn player_index(&self, player: AccountId) -> Option<usize> {
        self.players.iter().position(|p| *p == player)
    }

    /// Is the game finished?
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.state == GameState::GameComplete
    }

    /// Check a move's preconditions without mutating anything.
    pub fn evaluate_move(&self, player: AccountId, mv: &GameMove, now: Timestamp) -> Result<(), OperationError> {
        let index = self.player_index(player).ok_or(OperationError::NotAParticipant {
            game: self.id,
            player,
        })?;

        let expected = match mv {
            GameMove::RpsCommit(_) => GameState::ExpectingCommitMoves,
            GameMove::RpsReveal(_) => GameState::ExpectingRevealMoves,
        };
        if self.state != expected {
            return Err(OperationError::WrongGameState {
                game: self.id,
                actual: self.state,
                expected,
            });
        }
        if let Some(deadline) = self.next_timeout {
            if now >= deadline {
                return Err(OperationError::DeadlinePassed { game: self.id, deadline });
            }
        }

        let GameDetails::RockPaperScissors(details) = &self.details;
        let throw = details.throws.get(index).ok_or(OperationError::NotAParticipant {
            game: self.id,
            player,
        })?;

        match mv {
            GameMove::RpsCommit(_) => {
                if throw.has_committed() {
                    return Err(OperationError::AlreadyCommitted { game: self.id, player });
                }
            }
            GameMove::RpsReveal(_) => {
                if !throw.has_committed() {
                    return Err(OperationError::NotCommitted { game: self.id, player });
                }
                if throw.has_acted() {
                    return Err(OperationError::AlreadyRevealed { game: self.id, player });
                }
            }
        }
        Ok(())
    }

    /// Apply a move that passed `evaluate_move`.
    pub fn on_move(&mut self, player: AccountId, mv: &GameMove, now: Timestamp) -> Vec<GameEffect> {
        let mut effects = Vec::new();
        let Some(index) = self.player_index(player) else {
            return effects;
        };

        match mv {
            GameMove::RpsCommit(commit) => {
                let GameOptions::RockPaperScissors(options) = &self.options;
                let reveal_window = options.time_per_reveal_move;
                let GameDetails::RockPaperScissors(details) = &mut self.details;

                details.throws[index].commitment = Some(commit.commitment.hash);
                effects.push(GameEffect::Committed { player });

                if details.all_committed() {
                    let deadline = now.saturating_add_secs(reveal_window);
                    self.state = GameState::ExpectingRevealMoves;
                    self.next_timeout = Some(deadline);
                    effects.push(GameEffect::RevealPhaseStarted { deadline });
                }
            }
            GameMove::RpsReveal(reveal) => {
                let GameOptions::RockPaperScissors(options) = &self.options;
                let number_of_gestures = options.number_of_gestures;
                let GameDetails::RockPaperScissors(details) = &mut self.details;
                let throw = &mut details.throws[index];

                let opens = throw.commitment.as_ref().is_some_and(|hash| {
                    reveal.gesture.is_allowed(number_of_gestures)
                        && CommitmentVerifier::verify(hash, reveal.gesture, &reveal.nonce)
                });

                if opens {
                    throw.revealed = Some(reveal.gesture);
                    effects.push(GameEffect::Revealed { player, gesture: reveal.gesture });
                } else {
                    throw.forfeited = true;
                    effects.push(GameEffect::InvalidReveal { player });
                }

                if details.all_acted() {
                    effects.push(GameEffect::Completed(self.complete_after_reveals()));
                }
            }
        }

        effects
    }

    /// Force the current phase to end if its deadline has passed.
    ///
    /// A no-op (empty effects) when the game is complete or the deadline is
    /// still in the future.
    pub fn on_timeout(&mut self, now: Timestamp) -> Vec<GameEffect> {
        let mut effects = Vec::new();
        let due = self.next_timeout.is_some_and(|deadline| deadline <= now);
        if !due {
            return effects;
        }

        match self.state {
            GameState::ExpectingCommitMoves => {
                let GameDetails::RockPaperScissors(details) = &mut self.details;
                for (player, throw) in self.players.iter().zip(details.throws.iter_mut()) {
                    if !throw.has_committed() {
                        throw.forfeited = true;
                        effects.push(GameEffect::Forfeited { player: *player });
                    }
                }

                let winners: BTreeSet<AccountId> = self.players.iter()
                    .zip(details.throws.iter())
                    .filter(|(_, throw)| throw.has_committed())
                    .map(|(player, _)| *player)
                    .collect();
                effects.push(GameEffect::Completed(self.finish(winners)));
            }
            GameState::ExpectingRevealMoves => {
                let GameDetails::RockPaperScissors(details) = &mut self.details;
                for (player, throw) in self.players.iter().zip(details.throws.iter_mut()) {
                    if !throw.has_acted() {
                        throw.forfeited = true;
                        effects.push(GameEffect::Forfeited { player: *player });
                    }
                }
                effects.push(GameEffect::Completed(self.complete_after_reveals()));
            }
            GameState::GameInProgress | GameState::GameComplete => {}
        }

        effects
    }

    /// Decide winners from the live (revealed, not forfeited) gestures.
    ///
    /// A player wins if their gesture beats at least one other live gesture
    /// and is beaten by none. A single live player wins by default.
    fn complete_after_reveals(&mut self) -> GameCompleted {
        let GameDetails::RockPaperScissors(details) = &self.details;
        let live: Vec<(AccountId, Gesture)> = self.players.iter()
            .zip(details.throws.iter())
            .filter_map(|(player, throw)| throw.live_gesture().map(|g| (*player, g)))
            .collect();

        let winners: BTreeSet<AccountId> = if live.len() == 1 {
            live.iter().map(|(player, _)| *player).collect()
        } else {
            live.iter()
                .filter(|(_, g)| {
                    live.iter().any(|(_, other)| g.beats(*other))
                        && !live.iter().any(|(_, other)| other.beats(*g))
                })
                .map(|(player, _)| *player)
                .collect()
        };

        self.finish(winners)
    }

    fn finish(&mut self, winners: BTreeSet<AccountId>) -> GameCompleted {
        self.winners = winners.clone();
        self.state = GameState::GameComplete;
        self.next_timeout = None;
        GameCompleted {
            game_id: self.id,
            match_id: self.match_id,
            winners,
        }
    }

    /// Hash this game's state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_id(self.id);
        hasher.update_id(self.match_id);
        hasher.update_ids(self.players.iter());
        hasher.update_ids(self.winners.iter());
        self.options.hash_into(hasher);
        match &self.details {
            GameDetails::RockPaperScissors(details) => details.hash_into(hasher),
        }
        hasher.update_opt_time(self.next_timeout);
        hasher.update_u8(self.state as u8);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rps::RpsThrow;

    const ALICE: AccountId = AccountId::new(1);
    const BOB: AccountId = AccountId::new(2);
    const T0: Timestamp = Timestamp::from_secs(1_000);

    fn new_game() -> GameObject {
        let mut game = GameObject::new(
            GameId::new(0),
            MatchId::new(0),
            vec![ALICE, BOB],
            GameOptions::default(),
        );
        game.start(T0);
        game
    }

    fn reveal(gesture: Gesture, nonce: &[u8]) -> RpsReveal {
        RpsReveal { gesture, nonce: nonce.to_vec() }
    }

    fn commit(game: &mut GameObject, player: AccountId, r: &RpsReveal, now: Timestamp) -> Vec<GameEffect> {
        let mv = GameMove::RpsCommit(r.commit());
        game.evaluate_move(player, &mv, now).unwrap();
        game.on_move(player, &mv, now)
    }

    fn open(game: &mut GameObject, player: AccountId, r: &RpsReveal, now: Timestamp) -> Vec<GameEffect> {
        let mv = GameMove::RpsReveal(r.clone());
        game.evaluate_move(player, &mv, now).unwrap();
        game.on_move(player, &mv, now)
    }

    fn play(a: Gesture, b: Gesture) -> GameObject {
        let mut game = new_game();
        let ra = reveal(a, b"alice");
        let rb = reveal(b, b"bob");
        commit(&mut game, ALICE, &ra, T0);
        commit(&mut game, BOB, &rb, T0);
        open(&mut game, ALICE, &ra, T0);
        open(&mut game, BOB, &rb, T0);
        game
    }

    #[test]
    fn test_start_sets_commit_deadline() {
        let game = new_game();
        assert_eq!(game.state, GameState::ExpectingCommitMoves);
        assert_eq!(game.next_timeout, Some(T0.saturating_add_secs(60)));
    }

    #[test]
    fn test_both_commits_open_reveal_phase() {
        let mut game = new_game();
        let later = T0.saturating_add_secs(10);
        commit(&mut game, ALICE, &reveal(Gesture::Rock, b"a"), T0);
        assert_eq!(game.state, GameState::ExpectingCommitMoves);

        let effects = commit(&mut game, BOB, &reveal(Gesture::Paper, b"b"), later);
        assert_eq!(game.state, GameState::ExpectingRevealMoves);
        assert_eq!(game.next_timeout, Some(later.saturating_add_secs(60)));
        assert!(effects.contains(&GameEffect::RevealPhaseStarted { deadline: later.saturating_add_secs(60) }));
    }

    #[test]
    fn test_winner_follows_precedence() {
        let game = play(Gesture::Rock, Gesture::Scissors);
        assert!(game.is_complete());
        assert_eq!(game.winners, BTreeSet::from([ALICE]));

        let game = play(Gesture::Rock, Gesture::Paper);
        assert_eq!(game.winners, BTreeSet::from([BOB]));

        let game = play(Gesture::Scissors, Gesture::Paper);
        assert_eq!(game.winners, BTreeSet::from([ALICE]));
    }

    #[test]
    fn test_identical_gestures_tie() {
        let game = play(Gesture::Paper, Gesture::Paper);
        assert!(game.is_complete());
        assert!(game.winners.is_empty());
        assert_eq!(game.next_timeout, None);
    }

    #[test]
    fn test_invalid_reveal_forfeits() {
        let mut game = new_game();
        let ra = reveal(Gesture::Rock, b"alice");
        let rb = reveal(Gesture::Scissors, b"bob");
        commit(&mut game, ALICE, &ra, T0);
        commit(&mut game, BOB, &rb, T0);

        // Bob claims paper, which does not open his commitment
        let effects = open(&mut game, BOB, &reveal(Gesture::Paper, b"bob"), T0);
        assert_eq!(effects, vec![GameEffect::InvalidReveal { player: BOB }]);

        open(&mut game, ALICE, &ra, T0);
        assert_eq!(game.winners, BTreeSet::from([ALICE]));
    }

    #[test]
    fn test_disallowed_gesture_forfeits() {
        let mut game = new_game();
        let ra = reveal(Gesture::Spock, b"alice");
        let rb = reveal(Gesture::Rock, b"bob");
        commit(&mut game, ALICE, &ra, T0);
        commit(&mut game, BOB, &rb, T0);
        open(&mut game, ALICE, &ra, T0);
        open(&mut game, BOB, &rb, T0);

        // Spock is not part of a three-gesture game
        assert_eq!(game.winners, BTreeSet::from([BOB]));
    }

    #[test]
    fn test_commit_timeout_without_commits_is_tie() {
        let mut game = new_game();
        let deadline = game.next_timeout.unwrap();

        assert!(!game.on_timeout(deadline).is_empty());
        assert!(game.is_complete());
        assert!(game.winners.is_empty());
    }

    #[test]
    fn test_commit_timeout_with_one_commit_awards_committer() {
        let mut game = new_game();
        commit(&mut game, BOB, &reveal(Gesture::Rock, b"b"), T0);

        let effects = game.on_timeout(game.next_timeout.unwrap());
        assert!(effects.contains(&GameEffect::Forfeited { player: ALICE }));
        assert_eq!(game.winners, BTreeSet::from([BOB]));
    }

    #[test]
    fn test_timeout_before_deadline_is_noop() {
        let mut game = new_game();
        assert!(game.on_timeout(T0).is_empty());
        assert_eq!(game.state, GameState::ExpectingCommitMoves);
    }

    #[test]
    fn test_reveal_timeout_awards_revealer() {
        let mut game = new_game();
        let ra = reveal(Gesture::Rock, b"a");
        let rb = reveal(Gesture::Paper, b"b");
        commit(&mut game, ALICE, &ra, T0);
        commit(&mut game, BOB, &rb, T0);
        open(&mut game, ALICE, &ra, T0);

        game.on_timeout(game.next_timeout.unwrap());
        assert_eq!(game.winners, BTreeSet::from([ALICE]));

        let GameDetails::RockPaperScissors(details) = &game.details;
        assert_eq!(details.throws[1], RpsThrow {
            commitment: Some(rb.commit().commitment.hash),
            revealed: None,
            forfeited: true,
        });
    }

    #[test]
    fn test_reveal_timeout_without_reveals_is_tie() {
        let mut game = new_game();
        commit(&mut game, ALICE, &reveal(Gesture::Rock, b"a"), T0);
        commit(&mut game, BOB, &reveal(Gesture::Paper, b"b"), T0);

        game.on_timeout(game.next_timeout.unwrap());
        assert!(game.is_complete());
        assert!(game.winners.is_empty());
    }

    #[test]
    fn test_second_timeout_is_noop() {
        let mut game = new_game();
        let deadline = game.next_timeout.unwrap();
        assert!(!game.on_timeout(deadline).is_empty());
        assert!(game.on_timeout(deadline).is_empty());
    }

    #[test]
    fn test_evaluate_rejections() {
        let mut game = new_game();
        let ra = reveal(Gesture::Rock, b"a");
        let stranger = AccountId::new(99);

        let commit_mv = GameMove::RpsCommit(ra.commit());
        assert!(matches!(
            game.evaluate_move(stranger, &commit_mv, T0),
            Err(OperationError::NotAParticipant { .. })
        ));
        assert!(matches!(
            game.evaluate_move(ALICE, &GameMove::RpsReveal(ra.clone()), T0),
            Err(OperationError::WrongGameState { .. })
        ));
        assert!(matches!(
            game.evaluate_move(ALICE, &commit_mv, game.next_timeout.unwrap()),
            Err(OperationError::DeadlinePassed { .. })
        ));

        commit(&mut game, ALICE, &ra, T0);
        assert!(matches!(
            game.evaluate_move(ALICE, &commit_mv, T0),
            Err(OperationError::AlreadyCommitted { .. })
        ));
    }

    #[test]
    fn test_cannot_reveal_twice() {
        let mut game = new_game();
        let ra = reveal(Gesture::Rock, b"a");
        let rb = reveal(Gesture::Paper, b"b");
        commit(&mut game, ALICE, &ra, T0);
        commit(&mut game, BOB, &rb, T0);
        open(&mut game, ALICE, &ra, T0);

        assert!(matches!(
            game.evaluate_move(ALICE, &GameMove::RpsReveal(ra), T0),
            Err(OperationError::AlreadyRevealed { .. })
        ));
    }

    #[test]
    fn test_options_validation() {
        assert!(GameOptions::default().validate().is_ok());
        let bad = GameOptions::RockPaperScissors(RpsGameOptions { number_of_gestures: 4, ..RpsGameOptions::default() });
        assert!(bad.validate().is_err());
        let bad = GameOptions::RockPaperScissors(RpsGameOptions { time_per_reveal_move: 0, ..RpsGameOptions::default() });
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_time_key_drops_completed_games() {
        let mut game = new_game();
        assert_eq!(game.time_key(0), game.next_timeout);
        game.on_timeout(game.next_timeout.unwrap());
        assert_eq!(game.time_key(0), None);
    }
}
