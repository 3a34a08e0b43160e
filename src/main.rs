//! RPS Tournament Node
//!
//! Runs a scripted eight-player tournament on a local chain, records the
//! transcript, then verifies it by replay.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rps_tournament::{
    VERSION,
    chain::{Block, ChainParameters, Operation},
    core::{AccountId, GameId, ObjectId, Timestamp, TournamentId},
    game::{GameMove, GameState, Gesture, RpsReveal},
    replay::{verify_transcript, ChainTranscript, Genesis, RecordingChain},
    tournament::{TournamentOptions, TournamentState},
};

const GENESIS_TIME: Timestamp = Timestamp::from_secs(1_700_000_000);
const PLAYERS: u64 = 8;
const STARTING_BALANCE: u64 = 10_000;
const BUY_IN: u64 = 250;
/// Registers, then never moves.
const AFK_PLAYER: u64 = 6;
const MAX_BLOCKS: u32 = 2_000;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("RPS Tournament Node v{}", VERSION);

    let params = ChainParameters::from_env().context("loading chain parameters")?;
    info!(
        rake_bps = params.rake_fee_percentage,
        rake_account = %params.rake_fee_account,
        max_players = params.maximum_players_in_tournament,
        "chain parameters"
    );

    let transcript = demo_tournament(params)?;
    verify_demo(&transcript)
}

/// Local chain driver that scripts every player's moves.
struct Demo {
    chain: RecordingChain,
    reveals: BTreeMap<(GameId, AccountId), RpsReveal>,
    revealed: BTreeSet<(GameId, AccountId)>,
}

impl Demo {
    fn now(&self) -> Timestamp {
        self.chain.database().head_time()
    }

    /// Submit `ops` one second after the head. Rejected blocks are skipped;
    /// invariant violations abort the demo.
    fn submit(&mut self, ops: Vec<Operation>) -> anyhow::Result<bool> {
        let block = Block::new(self.now().saturating_add_secs(1), ops);
        match self.chain.apply_block(block) {
            Ok(_) => Ok(true),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(_) => Ok(false),
        }
    }

    fn idle(&mut self, secs: u32) -> anyhow::Result<()> {
        let block = Block::empty(self.now().saturating_add_secs(secs));
        self.chain.apply_block(block)?;
        Ok(())
    }

    /// The same gesture on every run, varied by game and seat.
    fn scripted_gesture(game: GameId, player: AccountId) -> Gesture {
        let index = (game.instance() * 7 + player.instance() * 5) % 3;
        Gesture::ALL[index as usize]
    }

    /// Make every pending move for every open game. Returns how many were accepted.
    fn play_open_games(&mut self) -> anyhow::Result<usize> {
        let open: Vec<(GameId, GameState, Vec<AccountId>)> = self.chain.database()
            .games()
            .filter(|g| !g.is_complete())
            .map(|g| (g.id, g.state, g.players.clone()))
            .collect();

        let mut accepted = 0;
        for (game, state, players) in open {
            for player in players {
                if player == AccountId::new(AFK_PLAYER) {
                    continue;
                }
                let key = (game, player);
                let mv = match state {
                    GameState::ExpectingCommitMoves if !self.reveals.contains_key(&key) => {
                        let reveal = RpsReveal {
                            gesture: Self::scripted_gesture(game, player),
                            nonce: format!("demo:{}:{}", game.instance(), player.instance()).into_bytes(),
                        };
                        let mv = GameMove::RpsCommit(reveal.commit());
                        self.reveals.insert(key, reveal);
                        mv
                    }
                    GameState::ExpectingRevealMoves if !self.revealed.contains(&key) => {
                        let Some(reveal) = self.reveals.get(&key).cloned() else { continue };
                        self.revealed.insert(key);
                        GameMove::RpsReveal(reveal)
                    }
                    _ => continue,
                };
                if self.submit(vec![Operation::GameMove { game, player, mv }])? {
                    accepted += 1;
                }
            }
        }
        Ok(accepted)
    }
}

fn demo_tournament(params: ChainParameters) -> anyhow::Result<ChainTranscript> {
    info!("=== Starting Demo Tournament ===");

    let balances = (1..=PLAYERS).map(|n| (AccountId::new(n), STARTING_BALANCE)).collect();
    let genesis = Genesis { params, time: GENESIS_TIME, balances };
    let mut demo = Demo {
        chain: RecordingChain::new(genesis),
        reveals: BTreeMap::new(),
        revealed: BTreeSet::new(),
    };

    let deadline = GENESIS_TIME.saturating_add_secs(600);
    let options = TournamentOptions::new(PLAYERS as u32, BUY_IN, deadline).with_wins(2, 5);
    if !demo.submit(vec![Operation::TournamentCreate { creator: AccountId::new(1), options }])? {
        bail!("tournament creation rejected");
    }
    let tournament: TournamentId = demo.chain.database()
        .tournaments()
        .last()
        .map(|t| t.id)
        .context("no tournament after create")?;
    info!(%tournament, players = PLAYERS, buy_in = BUY_IN, "tournament created");

    let joins = (1..=PLAYERS)
        .map(AccountId::new)
        .map(|player| Operation::TournamentJoin { payer: player, player, tournament, buy_in: BUY_IN })
        .collect();
    if !demo.submit(joins)? {
        bail!("registration rejected");
    }

    let mut blocks = 0;
    loop {
        let state = demo.chain.database()
            .tournament(tournament)
            .map(|t| t.state)
            .context("tournament vanished")?;
        if state == TournamentState::Concluded {
            break;
        }
        if demo.play_open_games()? == 0 {
            // Waiting on the AFK player's deadline
            demo.idle(30)?;
        }
        blocks += 1;
        if blocks > MAX_BLOCKS {
            bail!("tournament did not conclude after {} rounds", MAX_BLOCKS);
        }
    }

    let db = demo.chain.database();
    for m in db.matches_by_tournament(tournament) {
        info!(
            match_id = %m.id,
            round = m.round,
            players = ?m.players,
            wins = ?m.number_of_wins,
            games = m.games.len(),
            winners = ?m.match_winners,
            "match result"
        );
    }
    if let Some(t) = db.tournament(tournament) {
        let ended = t.end_time.and_then(Timestamp::to_datetime);
        info!(%tournament, ended = ?ended, "tournament concluded");
    }
    for (account, balance) in db.balances() {
        info!(%account, balance, "final balance");
    }

    Ok(demo.chain.into_transcript())
}

fn verify_demo(transcript: &ChainTranscript) -> anyhow::Result<()> {
    info!("=== Verifying Transcript ===");

    let bytes = transcript.to_bytes().context("encoding transcript")?;
    let decoded = ChainTranscript::from_bytes(&bytes).context("decoding transcript")?;
    info!(
        blocks = decoded.blocks.len(),
        checkpoints = decoded.checkpoints.len(),
        size = bytes.len(),
        "transcript encoded"
    );

    let result = verify_transcript(&decoded);
    info!("Expected final hash: {}", hex::encode(result.expected_final_hash));
    info!("Computed final hash: {}", hex::encode(result.computed_final_hash));
    for checkpoint in result.checkpoint_results.iter().filter(|c| !c.valid) {
        warn!(block = checkpoint.block_num, "checkpoint mismatch");
    }

    match result.error {
        None => {
            info!("Replay verified");
            Ok(())
        }
        Some(error) => bail!("replay verification failed: {}", error),
    }
}
