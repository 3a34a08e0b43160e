//! Test chain driver shared by the unit tests.

use std::collections::BTreeMap;

use crate::chain::block::{Block, BlockResult};
use crate::chain::database::Database;
use crate::chain::error::ChainError;
use crate::chain::events::ChainEvent;
use crate::chain::operations::{Operation, OperationResult};
use crate::chain::params::ChainParameters;
use crate::core::ids::{AccountId, GameId, TournamentId};
use crate::core::time::Timestamp;
use crate::game::object::{GameMove, GameState};
use crate::game::rps::{Gesture, RpsReveal};
use crate::tournament::options::TournamentOptions;

/// Starting balance of every funded test account.
pub const BALANCE: u64 = 1_000_000;

/// Genesis time of test chains.
pub const GENESIS: Timestamp = Timestamp::from_secs(1_700_000_000);

/// Test account `n`.
pub fn player(n: u64) -> AccountId {
    AccountId::new(n)
}

/// A database plus helpers that wrap every action in its own block.
pub struct TestChain {
    pub db: Database,
    /// Every event emitted by applied blocks
    pub events: Vec<ChainEvent>,
    reveals: BTreeMap<(GameId, AccountId), RpsReveal>,
}

impl TestChain {
    /// Chain with accounts 1..=n funded.
    pub fn new(accounts: u64) -> Self {
        Self::with_params(ChainParameters::default(), accounts)
    }

    pub fn with_params(params: ChainParameters, accounts: u64) -> Self {
        let balances = (1..=accounts).map(|n| (player(n), BALANCE)).collect();
        Self {
            db: Database::new(params, GENESIS, balances),
            events: Vec::new(),
            reveals: BTreeMap::new(),
        }
    }

    /// Head time plus `secs`.
    pub fn after(&self, secs: u32) -> Timestamp {
        self.db.head_time().saturating_add_secs(secs)
    }

    /// Apply `ops` in a block one second after the head.
    pub fn apply(&mut self, ops: Vec<Operation>) -> Result<BlockResult, ChainError> {
        let block = Block::new(self.after(1), ops);
        self.apply_block(&block)
    }

    fn apply_block(&mut self, block: &Block) -> Result<BlockResult, ChainError> {
        let result = self.db.apply_block(block)?;
        self.events.extend(result.events.iter().cloned());
        Ok(result)
    }

    /// Empty block `secs` after the head.
    pub fn advance(&mut self, secs: u32) -> BlockResult {
        let block = Block::empty(self.after(secs));
        self.apply_block(&block).unwrap()
    }

    /// Empty block at `time`.
    pub fn advance_to(&mut self, time: Timestamp) -> BlockResult {
        self.apply_block(&Block::empty(time)).unwrap()
    }

    pub fn create(&mut self, options: TournamentOptions) -> TournamentId {
        let result = self.apply(vec![Operation::TournamentCreate { creator: player(1), options }]).unwrap();
        match result.results[0] {
            OperationResult::TournamentCreated(id) => id,
            OperationResult::Applied => panic!("create did not report an id"),
        }
    }

    /// Register `players`, each paying for themselves, in one block.
    pub fn join(&mut self, tournament: TournamentId, players: &[AccountId]) {
        let buy_in = self.db.tournament(tournament).unwrap().options.buy_in;
        let ops = players.iter()
            .map(|p| Operation::TournamentJoin { payer: *p, player: *p, tournament, buy_in })
            .collect();
        self.apply(ops).unwrap();
    }

    /// Games of the tournament still waiting on moves, in id order.
    pub fn open_games(&self, tournament: TournamentId) -> Vec<GameId> {
        self.db.matches_by_tournament(tournament)
            .iter()
            .filter_map(|m| self.db.current_game(m.id))
            .filter(|g| matches!(g.state, GameState::ExpectingCommitMoves | GameState::ExpectingRevealMoves))
            .map(|g| g.id)
            .collect()
    }

    pub fn current_game_of(&self, tournament: TournamentId) -> Option<GameId> {
        self.open_games(tournament).first().copied()
    }

    fn reveal_for(game: GameId, player: AccountId, gesture: Gesture) -> RpsReveal {
        RpsReveal { gesture, nonce: format!("{}/{}", game, player).into_bytes() }
    }

    pub fn try_commit(&mut self, game: GameId, player: AccountId, gesture: Gesture) -> bool {
        let reveal = Self::reveal_for(game, player, gesture);
        let op = Operation::GameMove { game, player, mv: GameMove::RpsCommit(reveal.commit()) };
        if self.apply(vec![op]).is_err() {
            return false;
        }
        self.reveals.insert((game, player), reveal);
        true
    }

    pub fn try_reveal(&mut self, game: GameId, player: AccountId) -> bool {
        let Some(reveal) = self.reveals.get(&(game, player)).cloned() else {
            return false;
        };
        let op = Operation::GameMove { game, player, mv: GameMove::RpsReveal(reveal) };
        self.apply(vec![op]).is_ok()
    }

    pub fn commit(&mut self, game: GameId, player: AccountId, gesture: Gesture) {
        assert!(self.try_commit(game, player, gesture), "{} could not commit in {}", player, game);
    }

    pub fn reveal(&mut self, game: GameId, player: AccountId) {
        assert!(self.try_reveal(game, player), "{} could not reveal in {}", player, game);
    }

    /// Commit and reveal both gestures of a two-player game.
    pub fn play(&mut self, game: GameId, moves: [(AccountId, Gesture); 2]) {
        for (player, gesture) in moves {
            self.commit(game, player, gesture);
        }
        for (player, _) in moves {
            self.reveal(game, player);
        }
    }
}
