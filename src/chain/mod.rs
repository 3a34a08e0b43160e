//! Chain Layer
//!
//! The replicated-state side of the engine: the object store and database,
//! consensus parameters, errors, events, operations, blocks and the
//! per-block timeout sweep.
//!
//! ## Module Structure
//!
//! - `store`: keyed object tables with time-ordered indices
//! - `database`: engine state, balances, events, state hash
//! - `params`: consensus limits and rake settings
//! - `error`: rejection and invariant-violation taxonomy
//! - `events`: events emitted by every transition
//! - `operations`: evaluate/apply for player operations
//! - `block`: atomic block application
//! - `timeouts`: the timeout sweep

pub mod store;
pub mod database;
pub mod params;
pub mod error;
pub mod events;
pub mod operations;
pub mod block;
pub mod timeouts;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types
pub use block::{Block, BlockResult};
pub use database::Database;
pub use error::{ChainError, InvariantViolation, OperationError};
pub use events::{ChainEvent, ChainEventData};
pub use operations::{Operation, OperationResult};
pub use params::{ChainParameters, ParamsError};
pub use timeouts::{process_timeouts, TimeoutReport};
