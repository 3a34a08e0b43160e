//! Game Engine
//!
//! Store-facing entry points for games. Each one runs the game's own
//! transition, then applies the returned effects: events go to the
//! database, a completion notice goes to the owning match.

use tracing::{debug, info, warn};

#[cfg(feature = "debug-tracing")]
use tracing::trace;

use crate::chain::database::Database;
use crate::chain::error::{InvariantViolation, OperationError};
use crate::chain::events::ChainEventData;
use crate::core::ids::{AccountId, GameId};
use crate::core::time::Timestamp;
use crate::game::object::{GameEffect, GameMove};
use crate::tournament::match_object;

/// Open a newly created game for commitments.
pub fn start_game(db: &mut Database, game_id: GameId, now: Timestamp) -> Result<(), InvariantViolation> {
    let match_id = db.require_game(game_id)?.match_id;
    let commit_deadline = db.modify_game(game_id, |game| game.start(now))?;

    debug!(%game_id, %match_id, %commit_deadline, "game started");
    db.emit(ChainEventData::GameStarted {
        match_id,
        game: game_id,
        commit_deadline,
    });
    Ok(())
}

/// Check a move against the game's current state.
pub fn evaluate_move(db: &Database, game_id: GameId, player: AccountId, mv: &GameMove) -> Result<(), OperationError> {
    let game = db.game(game_id).ok_or(OperationError::UnknownGame(game_id))?;
    game.evaluate_move(player, mv, db.head_time())
}

/// Apply a move that passed `evaluate_move`.
pub fn apply_move(db: &mut Database, game_id: GameId, player: AccountId, mv: &GameMove) -> Result<(), InvariantViolation> {
    let now = db.head_time();

    #[cfg(feature = "debug-tracing")]
    if let GameMove::RpsCommit(commit) = mv {
        trace!(%game_id, %player, commitment = %hex::encode(commit.commitment.hash), "commit");
    }

    let effects = db.modify_game(game_id, |game| game.on_move(player, mv, now))?;
    apply_effects(db, game_id, effects, now)
}

/// Force the game past an expired deadline. Returns `false` if nothing was
/// due.
pub fn on_game_timeout(db: &mut Database, game_id: GameId, now: Timestamp) -> Result<bool, InvariantViolation> {
    let effects = db.modify_game(game_id, |game| game.on_timeout(now))?;
    if effects.is_empty() {
        return Ok(false);
    }
    debug!(%game_id, %now, "game deadline expired");
    apply_effects(db, game_id, effects, now)?;
    Ok(true)
}

fn apply_effects(
    db: &mut Database,
    game_id: GameId,
    effects: Vec<GameEffect>,
    now: Timestamp,
) -> Result<(), InvariantViolation> {
    for effect in effects {
        match effect {
            GameEffect::Committed { player } => {
                db.emit(ChainEventData::MoveCommitted { game: game_id, player });
            }
            GameEffect::RevealPhaseStarted { deadline } => {
                debug!(%game_id, %deadline, "all commitments in, reveal phase open");
                db.emit(ChainEventData::RevealPhaseStarted { game: game_id, deadline });
            }
            GameEffect::Revealed { player, gesture } => {
                db.emit(ChainEventData::MoveRevealed { game: game_id, player, gesture });
            }
            GameEffect::InvalidReveal { player } => {
                warn!(%game_id, %player, "reveal does not open commitment, forfeiting");
                db.emit(ChainEventData::InvalidReveal { game: game_id, player });
            }
            GameEffect::Forfeited { player } => {
                info!(%game_id, %player, "forfeit on deadline");
                db.emit(ChainEventData::Forfeit { game: game_id, player });
            }
            GameEffect::Completed(completed) => {
                debug!(%game_id, winners = ?completed.winners, "game complete");
                db.emit(ChainEventData::GameCompleted {
                    game: game_id,
                    match_id: completed.match_id,
                    winners: completed.winners.clone(),
                });
                match_object::on_game_complete(db, completed, now)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::operations::Operation;
    use crate::chain::testing::{player, TestChain, GENESIS};
    use crate::chain::block::Block;
    use crate::core::ids::TournamentId;
    use crate::game::object::{GameOptions, GameState};
    use crate::game::rps::{Gesture, RpsGameOptions, RpsReveal};
    use crate::tournament::options::TournamentOptions;

    fn two_player(options: TournamentOptions) -> (TestChain, TournamentId, GameId) {
        let mut chain = TestChain::new(3);
        let tid = chain.create(options);
        chain.join(tid, &[player(1), player(2)]);
        let game = chain.current_game_of(tid).unwrap();
        (chain, tid, game)
    }

    #[test]
    fn test_game_flow_through_operations() {
        let mut chain = TestChain::new(2);
        let tid = chain.create(TournamentOptions::new(2, 10, chain.after(600)));
        chain.join(tid, &[player(1), player(2)]);
        let game = chain.current_game_of(tid).unwrap();

        chain.commit(game, player(1), Gesture::Rock);
        assert_eq!(chain.db.game(game).unwrap().state, GameState::ExpectingCommitMoves);
        chain.commit(game, player(2), Gesture::Scissors);
        assert_eq!(chain.db.game(game).unwrap().state, GameState::ExpectingRevealMoves);

        chain.reveal(game, player(1));
        chain.reveal(game, player(2));
        let finished = chain.db.game(game).unwrap();
        assert!(finished.is_complete());
        assert!(finished.winners.contains(&player(1)));

        // The match moved on to a second game
        let m = chain.db.match_object(finished.match_id).unwrap();
        assert_eq!(m.games.len(), 2);
        assert_eq!(m.wins_of(player(1)), 1);
        let games: Vec<GameId> = chain.db.games_by_match(m.id).iter().map(|g| g.id).collect();
        assert_eq!(games, m.games);
    }

    #[test]
    fn test_invalid_reveal_emits_event_and_forfeits() {
        let (mut chain, _, game) = two_player(TournamentOptions::new(2, 10, GENESIS.saturating_add_secs(600)));
        chain.commit(game, player(1), Gesture::Paper);
        chain.commit(game, player(2), Gesture::Rock);

        let forged = RpsReveal { gesture: Gesture::Scissors, nonce: b"guess".to_vec() };
        let result = chain.apply(vec![Operation::GameMove {
            game,
            player: player(1),
            mv: GameMove::RpsReveal(forged),
        }]).unwrap();
        assert!(result.events.iter().any(|e| e.data == ChainEventData::InvalidReveal { game, player: player(1) }));

        chain.reveal(game, player(2));
        assert!(chain.db.game(game).unwrap().winners.contains(&player(2)));
    }

    #[test]
    fn test_move_at_deadline_rejected() {
        let (mut chain, _, game) = two_player(TournamentOptions::new(2, 10, GENESIS.saturating_add_secs(600)));
        let deadline = chain.db.game(game).unwrap().next_timeout.unwrap();
        let reveal = RpsReveal { gesture: Gesture::Rock, nonce: vec![7] };
        let block = Block::new(deadline, vec![Operation::GameMove {
            game,
            player: player(1),
            mv: GameMove::RpsCommit(reveal.commit()),
        }]);
        let err = chain.db.apply_block(&block).unwrap_err();
        assert_eq!(err, OperationError::DeadlinePassed { game, deadline }.into());
    }

    #[test]
    fn test_extended_gestures() {
        let options = TournamentOptions::new(2, 10, GENESIS.saturating_add_secs(600)).with_game_options(
            GameOptions::RockPaperScissors(RpsGameOptions { number_of_gestures: 5, ..RpsGameOptions::default() }),
        );
        let (mut chain, _, game) = two_player(options);
        chain.play(game, [(player(1), Gesture::Lizard), (player(2), Gesture::Spock)]);
        assert!(chain.db.game(game).unwrap().winners.contains(&player(1)));
    }

    #[test]
    fn test_stranger_cannot_move() {
        let (chain, _, game) = two_player(TournamentOptions::new(2, 10, GENESIS.saturating_add_secs(600)));
        let reveal = RpsReveal { gesture: Gesture::Rock, nonce: vec![] };
        assert!(matches!(
            evaluate_move(&chain.db, game, player(3), &GameMove::RpsCommit(reveal.commit())),
            Err(OperationError::NotAParticipant { .. })
        ));
    }
}
