//! Chain Transcript Recording
//!
//! Records everything needed to replay a chain from genesis: the genesis
//! state, every applied block, and state-hash checkpoints for partial
//! verification.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::chain::block::{Block, BlockResult};
use crate::chain::database::Database;
use crate::chain::error::ChainError;
use crate::chain::params::ChainParameters;
use crate::core::hash::StateHash;
use crate::core::ids::{AccountId, Amount};
use crate::core::time::Timestamp;

/// Current transcript version.
pub const TRANSCRIPT_VERSION: u8 = 1;

/// Checkpoint interval in blocks.
pub const CHECKPOINT_INTERVAL: u64 = 10;

/// Initial chain state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    /// Consensus parameters
    pub params: ChainParameters,
    /// Genesis time
    pub time: Timestamp,
    /// Initial balances
    pub balances: BTreeMap<AccountId, Amount>,
}

impl Genesis {
    /// Fresh database for this genesis.
    pub fn database(&self) -> Database {
        Database::new(self.params.clone(), self.time, self.balances.clone())
    }
}

/// State hash after a given block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Block height.
    pub block_num: u64,

    /// State hash after that block.
    pub state_hash: StateHash,
}

/// Complete chain transcript.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTranscript {
    /// Version for forward compatibility.
    pub version: u8,

    /// Genesis state.
    pub genesis: Genesis,

    /// Hash of the genesis database.
    pub genesis_hash: StateHash,

    /// Applied blocks, in order.
    pub blocks: Vec<Block>,

    /// Checkpoints every `CHECKPOINT_INTERVAL` blocks.
    pub checkpoints: Vec<Checkpoint>,

    /// State hash after the last block.
    pub final_hash: StateHash,
}

impl ChainTranscript {
    /// Empty transcript starting at `genesis`.
    pub fn new(genesis: Genesis) -> Self {
        let genesis_hash = genesis.database().compute_state_hash();
        Self {
            version: TRANSCRIPT_VERSION,
            genesis,
            genesis_hash,
            blocks: Vec::new(),
            checkpoints: Vec::new(),
            final_hash: genesis_hash,
        }
    }

    /// Record a block that was applied successfully.
    pub fn record(&mut self, block: Block, result: &BlockResult) {
        self.blocks.push(block);
        if result.block_num % CHECKPOINT_INTERVAL == 0 {
            self.checkpoints.push(Checkpoint {
                block_num: result.block_num,
                state_hash: result.state_hash,
            });
        }
        self.final_hash = result.state_hash;
    }

    /// Encode with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Decode from bincode.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

/// A database that records every block it applies.
pub struct RecordingChain {
    db: Database,
    transcript: ChainTranscript,
}

impl RecordingChain {
    /// Start from genesis.
    pub fn new(genesis: Genesis) -> Self {
        Self {
            db: genesis.database(),
            transcript: ChainTranscript::new(genesis),
        }
    }

    /// Apply a block; only successful blocks are recorded.
    pub fn apply_block(&mut self, block: Block) -> Result<BlockResult, ChainError> {
        let result = self.db.apply_block(&block)?;
        self.transcript.record(block, &result);
        Ok(result)
    }

    /// Current state.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Transcript so far.
    pub fn transcript(&self) -> &ChainTranscript {
        &self.transcript
    }

    /// Finish recording.
    pub fn into_transcript(self) -> ChainTranscript {
        self.transcript
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::operations::Operation;
    use crate::tournament::options::TournamentOptions;

    fn genesis() -> Genesis {
        Genesis {
            params: ChainParameters::default(),
            time: Timestamp::from_secs(1_000),
            balances: BTreeMap::from([(AccountId::new(1), 500), (AccountId::new(2), 500)]),
        }
    }

    #[test]
    fn test_checkpoints_every_interval() {
        let mut chain = RecordingChain::new(genesis());
        for i in 1..=25u32 {
            chain.apply_block(Block::empty(Timestamp::from_secs(1_000 + i))).unwrap();
        }
        let transcript = chain.into_transcript();
        assert_eq!(transcript.blocks.len(), 25);
        let heights: Vec<u64> = transcript.checkpoints.iter().map(|c| c.block_num).collect();
        assert_eq!(heights, vec![10, 20]);
    }

    #[test]
    fn test_rejected_blocks_are_not_recorded() {
        let mut chain = RecordingChain::new(genesis());
        assert!(chain.apply_block(Block::empty(Timestamp::from_secs(1_000))).is_err());
        assert!(chain.transcript().blocks.is_empty());
        assert_eq!(chain.transcript().final_hash, chain.transcript().genesis_hash);
    }

    #[test]
    fn test_bincode_roundtrip() {
        let mut chain = RecordingChain::new(genesis());
        chain.apply_block(Block::new(Timestamp::from_secs(1_001), vec![Operation::TournamentCreate {
            creator: AccountId::new(1),
            options: TournamentOptions::new(2, 50, Timestamp::from_secs(2_000)),
        }])).unwrap();

        let transcript = chain.into_transcript();
        let bytes = transcript.to_bytes().unwrap();
        assert_eq!(ChainTranscript::from_bytes(&bytes).unwrap(), transcript);
    }
}
