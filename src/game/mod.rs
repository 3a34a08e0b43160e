//! Game Logic Module
//!
//! Commit-reveal games. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `rps`: gestures, options and per-player throws
//! - `commitment`: commitment hashing and verification
//! - `object`: the game entity and its transitions
//! - `engine`: store-facing entry points and effect application

pub mod rps;
pub mod commitment;
pub mod object;
pub mod engine;

// Re-export key types
pub use rps::{Gesture, RpsCommit, RpsGameOptions, RpsReveal};
pub use commitment::{CommitmentVerifier, MoveCommitment};
pub use object::{GameCompleted, GameEffect, GameMove, GameObject, GameOptions, GameState};
