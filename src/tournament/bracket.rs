//! Bracket Scheduler
//!
//! Single elimination over the registered players, seeded in registration
//! order. The bracket is laid out on the next power of two with the
//! standard seed order (1 v P, 2 v P-1, ...), so byes fall to the top seeds.
//! Only real pairings become matches: N players always give N-1 matches,
//! the championship last.

use tracing::{debug, info};

use crate::chain::database::Database;
use crate::chain::error::InvariantViolation;
use crate::core::ids::{AccountId, MatchId, TournamentId};
use crate::core::time::Timestamp;
use crate::tournament::match_object::{self, BracketSlot, MatchObject, MatchState};

/// Seed numbers (1-based) in bracket position order for `size` positions.
///
/// `size` must be a power of two. Adjacent positions meet in round one.
pub fn seed_order(size: usize) -> Vec<usize> {
    let mut order = vec![1];
    while order.len() < size {
        let mirror = order.len() * 2 + 1;
        order = order.iter().flat_map(|&seed| [seed, mirror - seed]).collect();
    }
    order
}

/// What occupies a bracket position while planning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Entrant {
    Player(usize),
    Winner(usize),
    Bye,
}

/// A match of the planned bracket. Indices refer to the player list and to
/// earlier planned matches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedMatch {
    /// Round, starting at 1
    pub round: u32,
    /// Two sources
    pub slots: [PlannedSlot; 2],
}

/// Source of a planned slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlannedSlot {
    /// Index into the seeded player list
    Seed(usize),
    /// Index of an earlier planned match
    WinnerOf(usize),
}

/// Lay out the bracket for `players` entrants. Feeders always precede the
/// matches they feed.
pub fn plan_bracket(players: usize) -> Vec<PlannedMatch> {
    if players < 2 {
        return Vec::new();
    }
    let size = players.next_power_of_two();
    let mut current: Vec<Entrant> = seed_order(size)
        .into_iter()
        .map(|seed| if seed <= players { Entrant::Player(seed - 1) } else { Entrant::Bye })
        .collect();

    let mut planned = Vec::with_capacity(players - 1);
    let mut round = 1;
    while current.len() > 1 {
        let mut next = Vec::with_capacity(current.len() / 2);
        for pair in current.chunks(2) {
            let advancing = match (planned_slot(pair[0]), planned_slot(pair[1])) {
                (None, _) => pair[1],
                (_, None) => pair[0],
                (Some(a), Some(b)) => {
                    planned.push(PlannedMatch { round, slots: [a, b] });
                    Entrant::Winner(planned.len() - 1)
                }
            };
            next.push(advancing);
        }
        current = next;
        round += 1;
    }
    planned
}

fn planned_slot(entrant: Entrant) -> Option<PlannedSlot> {
    match entrant {
        Entrant::Player(seed) => Some(PlannedSlot::Seed(seed)),
        Entrant::Winner(index) => Some(PlannedSlot::WinnerOf(index)),
        Entrant::Bye => None,
    }
}

/// Create every match of the tournament's bracket and start the ones whose
/// players are already known. Returns the number of matches created.
pub fn build_bracket(db: &mut Database, tournament_id: TournamentId, now: Timestamp) -> Result<u32, InvariantViolation> {
    let details = db.require_details_of(tournament_id)?;
    let details_id = details.id;
    let players = details.registered_players.clone();
    if !details.matches.is_empty() {
        return Err(InvariantViolation::MalformedBracket {
            tournament: tournament_id,
            reason: "bracket already built",
        });
    }
    if players.len() < 2 {
        return Err(InvariantViolation::MalformedBracket {
            tournament: tournament_id,
            reason: "fewer than two players",
        });
    }

    let mut ids: Vec<MatchId> = Vec::new();
    for plan in plan_bracket(players.len()) {
        let slots = plan.slots
            .iter()
            .map(|slot| resolve_planned(*slot, &players, &ids))
            .collect::<Option<Vec<BracketSlot>>>()
            .ok_or(InvariantViolation::MalformedBracket {
                tournament: tournament_id,
                reason: "planned slot out of range",
            })?;
        let id = db.matches.create(|id| MatchObject::new(id, tournament_id, plan.round, slots));
        ids.push(id);
    }

    let created = ids.len() as u32;
    info!(tournament = %tournament_id, players = players.len(), matches = created, "bracket built");
    db.modify_details(details_id, |details| details.matches = ids)?;

    check_for_new_matches_to_start(db, tournament_id, now)?;
    Ok(created)
}

fn resolve_planned(slot: PlannedSlot, players: &[AccountId], ids: &[MatchId]) -> Option<BracketSlot> {
    match slot {
        PlannedSlot::Seed(seed) => players.get(seed).map(|p| BracketSlot::Seeded(*p)),
        PlannedSlot::WinnerOf(index) => ids.get(index).map(|m| BracketSlot::WinnerOf(*m)),
    }
}

/// Start every waiting match whose slots can all be filled. Returns the
/// number of matches started.
///
/// Safe to call at any time; matches already started are skipped.
pub fn check_for_new_matches_to_start(
    db: &mut Database,
    tournament_id: TournamentId,
    now: Timestamp,
) -> Result<u32, InvariantViolation> {
    let match_ids = db.require_details_of(tournament_id)?.matches.clone();

    let mut started = 0;
    for match_id in match_ids {
        let m = db.require_match(match_id)?;
        if m.state != MatchState::WaitingOnPreviousMatches {
            continue;
        }
        let Some(players) = ready_players(db, m)? else {
            continue;
        };
        debug!(%match_id, round = m.round, "slots filled");
        match_object::on_initiate_match(db, match_id, players, now)?;
        started += 1;
    }
    Ok(started)
}

/// Players of `m` if every feeder has completed.
fn ready_players(db: &Database, m: &MatchObject) -> Result<Option<Vec<AccountId>>, InvariantViolation> {
    let mut players = Vec::with_capacity(m.slots.len());
    for slot in &m.slots {
        match slot {
            BracketSlot::Seeded(player) => players.push(*player),
            BracketSlot::WinnerOf(feeder_id) => {
                let feeder = db.require_match(*feeder_id)?;
                if !feeder.is_complete() {
                    return Ok(None);
                }
                let winner = feeder.advancing_winner()
                    .ok_or(InvariantViolation::EmptyWinnerSet(*feeder_id))?;
                players.push(winner);
            }
        }
    }
    Ok(Some(players))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use crate::chain::events::ChainEventData;
    use crate::chain::testing::{player, TestChain, BALANCE};
    use crate::game::rps::Gesture;
    use crate::tournament::object::TournamentState;
    use crate::tournament::options::TournamentOptions;

    #[test]
    fn test_seed_order() {
        assert_eq!(seed_order(1), vec![1]);
        assert_eq!(seed_order(2), vec![1, 2]);
        assert_eq!(seed_order(4), vec![1, 4, 2, 3]);
        assert_eq!(seed_order(8), vec![1, 8, 4, 5, 2, 7, 3, 6]);
    }

    #[test]
    fn test_match_count_is_players_minus_one() {
        for n in 2..=33 {
            let plan = plan_bracket(n);
            assert_eq!(plan.len(), n - 1, "{} players", n);
        }
        assert!(plan_bracket(1).is_empty());
    }

    #[test]
    fn test_five_players() {
        let plan = plan_bracket(5);
        assert_eq!(plan, vec![
            // seed 4 v seed 5
            PlannedMatch { round: 1, slots: [PlannedSlot::Seed(3), PlannedSlot::Seed(4)] },
            // seed 1 (bye) v winner of 4/5
            PlannedMatch { round: 2, slots: [PlannedSlot::Seed(0), PlannedSlot::WinnerOf(0)] },
            // seeds 2 and 3 both had byes
            PlannedMatch { round: 2, slots: [PlannedSlot::Seed(1), PlannedSlot::Seed(2)] },
            PlannedMatch { round: 3, slots: [PlannedSlot::WinnerOf(1), PlannedSlot::WinnerOf(2)] },
        ]);
    }

    #[test]
    fn test_full_bracket_has_no_byes() {
        let plan = plan_bracket(8);
        let first_round = plan.iter().filter(|m| m.round == 1).count();
        assert_eq!(first_round, 4);
        assert_eq!(plan.last().map(|m| m.round), Some(3));
    }

    #[test]
    fn test_every_seed_appears_once() {
        for n in 2..=20 {
            let mut seen: Vec<usize> = plan_bracket(n)
                .iter()
                .flat_map(|m| m.slots.iter())
                .filter_map(|slot| match slot {
                    PlannedSlot::Seed(seed) => Some(*seed),
                    PlannedSlot::WinnerOf(_) => None,
                })
                .collect();
            seen.sort_unstable();
            assert_eq!(seen, (0..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_feeders_precede_and_feed_once() {
        let plan = plan_bracket(13);
        let mut fed = vec![0; plan.len()];
        for (i, m) in plan.iter().enumerate() {
            for slot in &m.slots {
                if let PlannedSlot::WinnerOf(feeder) = slot {
                    assert!(*feeder < i);
                    fed[*feeder] += 1;
                }
            }
        }
        // Every match but the final feeds exactly one later match
        assert_eq!(fed[..plan.len() - 1].iter().filter(|c| **c == 1).count(), plan.len() - 1);
        assert_eq!(fed[plan.len() - 1], 0);
    }

    #[test]
    fn test_five_player_tournament_pays_one_champion() {
        let mut chain = TestChain::new(5);
        let tid = chain.create(TournamentOptions::new(5, 100, chain.after(600)).with_wins(1, 1));
        chain.join(tid, &(1..=5).map(player).collect::<Vec<_>>());

        let matches = chain.db.matches_by_tournament(tid);
        assert_eq!(matches.len(), 4);
        // 4 v 5 plays; 2 v 3 starts at once since both had byes
        let running: Vec<Vec<AccountId>> = matches.iter()
            .filter(|m| m.state == MatchState::MatchInProgress)
            .map(|m| m.players.clone())
            .collect();
        assert_eq!(running, vec![vec![player(4), player(5)], vec![player(2), player(3)]]);

        // The first seated player always throws rock, the second scissors
        while let Some(game) = chain.current_game_of(tid) {
            let seated = chain.db.game(game).unwrap().players.clone();
            chain.play(game, [(seated[0], Gesture::Rock), (seated[1], Gesture::Scissors)]);
        }

        let tournament = chain.db.tournament(tid).unwrap();
        assert_eq!(tournament.state, TournamentState::Concluded);
        let final_match = chain.db.matches_by_tournament(tid)[3];
        assert_eq!(final_match.players, vec![player(1), player(2)]);
        assert_eq!(final_match.match_winners, BTreeSet::from([player(1)]));

        // 500 pool: 15 rake, 485 to the champion
        assert_eq!(chain.db.balance(player(1)), BALANCE - 100 + 485);
        assert_eq!(chain.db.balance(AccountId::new(0)), 15);
        let paid: u64 = chain.events.iter()
            .filter_map(|e| match e.data {
                ChainEventData::Payout { amount, .. } => Some(amount),
                _ => None,
            })
            .sum();
        assert_eq!(paid, 500);
    }

    #[test]
    fn test_check_for_new_matches_is_repeatable() {
        let mut chain = TestChain::new(4);
        let tid = chain.create(TournamentOptions::new(4, 0, chain.after(600)));
        chain.join(tid, &(1..=4).map(player).collect::<Vec<_>>());

        let mut db = chain.db.clone();
        let now = db.head_time();
        assert_eq!(check_for_new_matches_to_start(&mut db, tid, now).unwrap(), 0);
        assert_eq!(db.compute_state_hash(), chain.db.compute_state_hash());
    }
}
