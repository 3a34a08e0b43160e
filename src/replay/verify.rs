//! Verification API
//!
//! Verify a chain transcript by deterministic replay from genesis.

use thiserror::Error;
use tracing::{debug, warn};

use crate::chain::error::ChainError;
use crate::core::hash::StateHash;
use crate::replay::transcript::{ChainTranscript, TRANSCRIPT_VERSION};

/// Verification result.
#[derive(Debug)]
pub struct VerificationResult {
    /// Did verification pass?
    pub valid: bool,

    /// Final state hash (from replay).
    pub computed_final_hash: StateHash,

    /// Expected final hash (from transcript).
    pub expected_final_hash: StateHash,

    /// Checkpoint verification results.
    pub checkpoint_results: Vec<CheckpointResult>,

    /// Detailed error if verification failed.
    pub error: Option<VerificationError>,
}

/// Result of verifying a single checkpoint.
#[derive(Debug)]
pub struct CheckpointResult {
    /// Block height.
    pub block_num: u64,
    /// Expected hash from transcript.
    pub expected: StateHash,
    /// Computed hash from replay.
    pub computed: StateHash,
    /// Did this checkpoint match?
    pub valid: bool,
}

/// Errors that can occur during verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// Transcript version mismatch.
    #[error("version mismatch: expected {expected}, got {got}")]
    VersionMismatch {
        /// Expected version.
        expected: u8,
        /// Actual version.
        got: u8,
    },

    /// Genesis hash mismatch.
    #[error("genesis state hash mismatch")]
    GenesisMismatch {
        /// Expected hash.
        expected: StateHash,
        /// Computed hash.
        computed: StateHash,
    },

    /// A recorded block failed on replay.
    #[error("block {block_num} failed on replay: {error}")]
    BlockRejected {
        /// Height the block would have had.
        block_num: u64,
        /// Why it failed.
        error: ChainError,
    },

    /// Checkpoint hash mismatch.
    #[error("checkpoint mismatch at block {block_num}")]
    CheckpointMismatch {
        /// Block where the mismatch occurred.
        block_num: u64,
        /// Expected hash.
        expected: StateHash,
        /// Computed hash.
        computed: StateHash,
    },

    /// A checkpoint refers to a block the transcript does not contain.
    #[error("checkpoint at block {block_num} is past the last block")]
    DanglingCheckpoint {
        /// Height named by the checkpoint.
        block_num: u64,
    },

    /// Final state hash mismatch.
    #[error("final state hash mismatch")]
    FinalStateMismatch {
        /// Expected hash.
        expected: StateHash,
        /// Computed hash.
        computed: StateHash,
    },
}

impl VerificationResult {
    fn failed(computed: StateHash, expected: StateHash, checkpoint_results: Vec<CheckpointResult>, error: VerificationError) -> Self {
        warn!(%error, "transcript verification failed");
        Self {
            valid: false,
            computed_final_hash: computed,
            expected_final_hash: expected,
            checkpoint_results,
            error: Some(error),
        }
    }
}

/// Verify a chain transcript by full replay.
///
/// Rebuilds the genesis database, applies every recorded block, and
/// compares state hashes at each checkpoint and at the end.
pub fn verify_transcript(transcript: &ChainTranscript) -> VerificationResult {
    if transcript.version != TRANSCRIPT_VERSION {
        return VerificationResult::failed([0; 32], transcript.final_hash, vec![], VerificationError::VersionMismatch {
            expected: TRANSCRIPT_VERSION,
            got: transcript.version,
        });
    }

    let mut db = transcript.genesis.database();
    let genesis_hash = db.compute_state_hash();
    if genesis_hash != transcript.genesis_hash {
        return VerificationResult::failed(genesis_hash, transcript.final_hash, vec![], VerificationError::GenesisMismatch {
            expected: transcript.genesis_hash,
            computed: genesis_hash,
        });
    }

    let mut checkpoints = transcript.checkpoints.iter().peekable();
    let mut checkpoint_results = Vec::new();
    let mut computed = genesis_hash;

    for block in &transcript.blocks {
        let result = match db.apply_block(block) {
            Ok(result) => result,
            Err(error) => {
                let block_num = db.head_block_num() + 1;
                return VerificationResult::failed(computed, transcript.final_hash, checkpoint_results, VerificationError::BlockRejected {
                    block_num,
                    error,
                });
            }
        };
        computed = result.state_hash;

        while let Some(checkpoint) = checkpoints.next_if(|c| c.block_num <= result.block_num) {
            let valid = checkpoint.block_num == result.block_num && checkpoint.state_hash == computed;
            checkpoint_results.push(CheckpointResult {
                block_num: checkpoint.block_num,
                expected: checkpoint.state_hash,
                computed,
                valid,
            });
            if !valid {
                return VerificationResult::failed(computed, checkpoint.state_hash, checkpoint_results, VerificationError::CheckpointMismatch {
                    block_num: checkpoint.block_num,
                    expected: checkpoint.state_hash,
                    computed,
                });
            }
        }
    }

    if let Some(checkpoint) = checkpoints.next() {
        return VerificationResult::failed(computed, transcript.final_hash, checkpoint_results, VerificationError::DanglingCheckpoint {
            block_num: checkpoint.block_num,
        });
    }

    if computed != transcript.final_hash {
        return VerificationResult::failed(computed, transcript.final_hash, checkpoint_results, VerificationError::FinalStateMismatch {
            expected: transcript.final_hash,
            computed,
        });
    }

    debug!(blocks = transcript.blocks.len(), checkpoints = checkpoint_results.len(), "transcript verified");
    VerificationResult {
        valid: true,
        computed_final_hash: computed,
        expected_final_hash: transcript.final_hash,
        checkpoint_results,
        error: None,
    }
}
