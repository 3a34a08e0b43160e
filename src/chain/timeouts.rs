//! Timeout Scheduler
//!
//! The per-block sweep that forces transitions on objects whose deadline has
//! passed. Runs after the block's operations, in a fixed order:
//!
//! 1. registration deadlines
//! 2. scheduled start times
//! 3. game deadlines
//! 4. a scan of running tournaments for matches ready to start
//!
//! Within each step objects are visited by deadline, then identifier.
//! Handlers re-check their own state, so a second sweep at the same time
//! finds nothing to do.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::chain::database::Database;
use crate::chain::error::InvariantViolation;
use crate::core::ids::TournamentId;
use crate::core::time::Timestamp;
use crate::game::engine;
use crate::tournament::bracket;
use crate::tournament::object::{TournamentState, REGISTRATION_DEADLINE_INDEX, START_TIME_INDEX};
use crate::tournament::registry;

/// Game objects keep a single time index, the next phase deadline.
const GAME_DEADLINE_INDEX: usize = 0;

/// What one sweep did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutReport {
    /// Tournaments whose registration deadline was handled
    pub registrations_closed: u32,
    /// Tournaments whose start time was handled
    pub start_times_reached: u32,
    /// Games forced past a deadline
    pub games_timed_out: u32,
    /// Matches started by the final scan
    pub matches_started: u32,
}

impl TimeoutReport {
    /// Did the sweep change anything?
    pub fn is_empty(&self) -> bool {
        *self == TimeoutReport::default()
    }
}

/// Force every transition due at `now`.
pub fn process_timeouts(db: &mut Database, now: Timestamp) -> Result<TimeoutReport, InvariantViolation> {
    let mut report = TimeoutReport::default();

    for tournament_id in db.tournaments.due(REGISTRATION_DEADLINE_INDEX, now) {
        if registry::on_registration_deadline_passed(db, tournament_id, now)? {
            report.registrations_closed += 1;
        }
    }

    for tournament_id in db.tournaments.due(START_TIME_INDEX, now) {
        if registry::on_start_time_arrived(db, tournament_id, now)? {
            report.start_times_reached += 1;
        }
    }

    for game_id in db.games.due(GAME_DEADLINE_INDEX, now) {
        if engine::on_game_timeout(db, game_id, now)? {
            report.games_timed_out += 1;
        }
    }

    let running: Vec<TournamentId> = db.tournaments()
        .filter(|t| t.state == TournamentState::InProgress)
        .map(|t| t.id)
        .collect();
    for tournament_id in running {
        report.matches_started += bracket::check_for_new_matches_to_start(db, tournament_id, now)?;
    }

    if !report.is_empty() {
        debug!(%now, ?report, "timeout sweep");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::events::ChainEventData;
    use crate::chain::testing::{player, TestChain, BALANCE};
    use crate::game::object::GameState;
    use crate::game::rps::Gesture;
    use crate::tournament::options::TournamentOptions;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_sweep_is_idempotent() {
        let mut chain = TestChain::new(2);
        let tid = chain.create(TournamentOptions::new(2, 10, chain.after(600)));
        chain.join(tid, &[player(1), player(2)]);
        let game = chain.current_game_of(tid).unwrap();
        let deadline = chain.db.game(game).unwrap().next_timeout.unwrap();

        chain.advance_to(deadline);
        let mut db = chain.db.clone();
        let hash = db.compute_state_hash();

        let again = process_timeouts(&mut db, deadline).unwrap();
        assert!(again.is_empty());
        assert_eq!(db.compute_state_hash(), hash);
    }

    #[test]
    fn test_game_timeout_forced_once() {
        let mut chain = TestChain::new(2);
        let tid = chain.create(TournamentOptions::new(2, 10, chain.after(600)));
        chain.join(tid, &[player(1), player(2)]);
        let game = chain.current_game_of(tid).unwrap();
        let deadline = chain.db.game(game).unwrap().next_timeout.unwrap();

        let mut db = chain.db.clone();
        let first = process_timeouts(&mut db, deadline).unwrap();
        assert_eq!(first.games_timed_out, 1);
        assert_eq!(db.game(game).unwrap().state, GameState::GameComplete);

        let second = process_timeouts(&mut db, deadline).unwrap();
        assert_eq!(second.games_timed_out, 0);
    }

    #[test]
    fn test_afk_player_loses_match() {
        let mut chain = TestChain::new(2);
        let tid = chain.create(TournamentOptions::new(2, 10, chain.after(600)));
        chain.join(tid, &[player(1), player(2)]);

        // Player 2 never moves; player 1 commits every game and wins on deadlines
        for _ in 0..2 {
            let game = chain.current_game_of(tid).unwrap();
            chain.commit(game, player(1), Gesture::Rock);
            chain.advance(60);
        }

        let tournament = chain.db.tournament(tid).unwrap();
        assert_eq!(tournament.state, TournamentState::Concluded);
        // 20 pool, 3% rake rounds to 0
        assert_eq!(chain.db.balance(player(1)), BALANCE + 10);
        assert_eq!(chain.db.balance(player(2)), BALANCE - 10);
    }

    #[test]
    fn test_total_abandonment_still_terminates() {
        let mut chain = TestChain::new(4);
        let tid = chain.create(TournamentOptions::new(4, 100, chain.after(600)).with_wins(2, 3));
        chain.join(tid, &[player(1), player(2), player(3), player(4)]);

        // Nobody ever moves: every match stalls to the cap and the lowest id advances
        for _ in 0..20 {
            chain.advance(60);
        }

        let tournament = chain.db.tournament(tid).unwrap();
        assert_eq!(tournament.state, TournamentState::Concluded);
        let final_match = chain.db.matches_by_tournament(tid).last().map(|m| m.match_winners.clone()).unwrap();
        assert!(final_match.contains(&player(1)));
    }

    /// Play whole tournaments with random gestures and random absences.
    #[test]
    fn test_random_tournaments_conserve_supply() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for round in 0..12 {
            let players = rng.gen_range(2..=11u64);
            let mut chain = TestChain::new(players + 1);
            let buy_in = rng.gen_range(1..=1_000);
            let options = TournamentOptions::new(players as u32, buy_in, chain.after(600))
                .with_wins(rng.gen_range(1..=3), 7);
            let tid = chain.create(options);
            let entrants: Vec<_> = (1..=players).map(player).collect();
            chain.join(tid, &entrants);
            let supply = chain.db.total_supply();

            let mut blocks = 0;
            while chain.db.tournament(tid).unwrap().state != TournamentState::Concluded {
                for game in chain.open_games(tid) {
                    let seated = chain.db.game(game).unwrap().players.clone();
                    for p in seated {
                        if rng.gen_bool(0.9) {
                            let gesture = Gesture::ALL[rng.gen_range(0..3)];
                            chain.try_commit(game, p, gesture);
                        }
                    }
                }
                chain.advance(1);
                for game in chain.open_games(tid) {
                    let seated = chain.db.game(game).unwrap().players.clone();
                    for p in seated {
                        if rng.gen_bool(0.9) {
                            chain.try_reveal(game, p);
                        }
                    }
                }
                chain.advance(rng.gen_range(1..=70));
                blocks += 1;
                assert!(blocks < 2_000, "round {} did not terminate", round);
            }

            assert_eq!(chain.db.total_supply(), supply);
            assert_eq!(chain.db.matches_by_tournament(tid).len() as u64, players - 1);
            assert!(chain.db.matches_by_tournament(tid).iter().all(|m| m.is_complete()));
            let paid: u64 = chain.events.iter()
                .filter_map(|e| match e.data {
                    ChainEventData::Payout { tournament, amount, .. } if tournament == tid => Some(amount),
                    _ => None,
                })
                .sum();
            assert_eq!(paid, buy_in * players);
        }
    }
}
