//! Core deterministic primitives.
//!
//! Everything the engine state is built from: typed identifiers, block time
//! and the state hasher. No type in this module reads the wall clock or
//! iterates an unordered collection.

pub mod ids;
pub mod time;
pub mod hash;

// Re-export core types
pub use ids::{AccountId, Amount, GameId, MatchId, ObjectId, TournamentDetailsId, TournamentId};
pub use time::Timestamp;
pub use hash::{StateHash, StateHasher};
