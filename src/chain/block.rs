//! Block Application
//!
//! A block carries a timestamp and an ordered list of operations. Applying
//! it sets the head time, evaluates and applies each operation in order,
//! then runs the timeout sweep. Every write is journaled; if any step fails
//! the journal is rolled back and the database is as it was.

use serde::{Serialize, Deserialize};
use tracing::{debug, error, info, warn};

use crate::chain::database::Database;
use crate::chain::error::{ChainError, OperationError};
use crate::chain::events::ChainEvent;
use crate::chain::operations::{Operation, OperationResult};
use crate::chain::timeouts::{process_timeouts, TimeoutReport};
use crate::core::hash::StateHash;
use crate::core::time::Timestamp;

/// A block of operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block time; must be after the current head time
    pub timestamp: Timestamp,
    /// Operations in canonical order
    pub operations: Vec<Operation>,
}

impl Block {
    /// Block with no operations (timeouts only).
    pub fn empty(timestamp: Timestamp) -> Self {
        Self { timestamp, operations: Vec::new() }
    }

    /// Block with the given operations.
    pub fn new(timestamp: Timestamp, operations: Vec<Operation>) -> Self {
        Self { timestamp, operations }
    }
}

/// Outcome of an applied block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockResult {
    /// Height after this block
    pub block_num: u64,
    /// Block time
    pub timestamp: Timestamp,
    /// One result per operation
    pub results: Vec<OperationResult>,
    /// What the timeout sweep did
    pub timeouts: TimeoutReport,
    /// Events emitted while applying the block
    pub events: Vec<ChainEvent>,
    /// State hash after the block
    pub state_hash: StateHash,
}

impl Database {
    /// Apply a block atomically.
    ///
    /// On error the database is left exactly as it was.
    pub fn apply_block(&mut self, block: &Block) -> Result<BlockResult, ChainError> {
        if block.timestamp <= self.head_time {
            return Err(OperationError::NonMonotonicTime {
                head: self.head_time,
                got: block.timestamp,
            }.into());
        }

        self.begin_changes();
        match self.apply_block_in_place(block) {
            Ok(result) => {
                self.commit_changes();
                Ok(result)
            }
            Err(e) => {
                self.discard_changes();
                if e.is_fatal() {
                    error!(block_time = %block.timestamp, error = %e, "block aborted on invariant violation");
                } else {
                    warn!(block_time = %block.timestamp, error = %e, "block rejected");
                }
                Err(e)
            }
        }
    }

    fn apply_block_in_place(&mut self, block: &Block) -> Result<BlockResult, ChainError> {
        self.head_time = block.timestamp;
        self.head_block_num += 1;

        let mut results = Vec::with_capacity(block.operations.len());
        for (index, op) in block.operations.iter().enumerate() {
            debug!(index, kind = op.kind(), "applying operation");
            op.evaluate(self)?;
            results.push(op.apply(self)?);
        }

        let timeouts = process_timeouts(self, block.timestamp)?;
        let events = self.take_events();
        let state_hash = self.compute_state_hash();

        info!(
            block = self.head_block_num,
            time = %block.timestamp,
            operations = block.operations.len(),
            events = events.len(),
            state_hash = %hex::encode(&state_hash[..8]),
            "block applied"
        );

        Ok(BlockResult {
            block_num: self.head_block_num,
            timestamp: block.timestamp,
            results,
            timeouts,
            events,
            state_hash,
        })
    }
}
