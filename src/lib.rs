//! # RPS Tournament Core
//!
//! Deterministic elimination tournaments of commit-reveal Rock-Paper-Scissors,
//! run as a replicated state machine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    RPS TOURNAMENT CORE                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                 │
//! │  ├── ids.rs      - Typed object identifiers                 │
//! │  ├── time.rs     - Block timestamps                         │
//! │  └── hash.rs     - State hashing for verification           │
//! │                                                             │
//! │  game/           - Commit-reveal games                      │
//! │  ├── rps.rs      - Gestures and win rule                    │
//! │  ├── commitment.rs- Commitment verification                 │
//! │  ├── object.rs   - Game state machine                       │
//! │  └── engine.rs   - Move and timeout entry points            │
//! │                                                             │
//! │  tournament/     - Tournament logic                         │
//! │  ├── options.rs  - Creator options                          │
//! │  ├── object.rs   - Tournament records                       │
//! │  ├── registry.rs - Registration, start, payouts             │
//! │  ├── bracket.rs  - Bracket layout and advancement           │
//! │  └── match_object.rs - Match sequencing                     │
//! │                                                             │
//! │  chain/          - Replicated state                         │
//! │  ├── database.rs - Object store, balances, events           │
//! │  ├── operations.rs- Evaluate/apply of player operations     │
//! │  ├── block.rs    - Atomic block application                 │
//! │  └── timeouts.rs - Per-block deadline sweep                 │
//! │                                                             │
//! │  replay/         - Transcripts and replay verification      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! Every module is **100% deterministic**:
//! - No floating-point arithmetic
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No wall-clock reads; time comes only from block timestamps
//! - No randomness; the only entropy is what players commit
//!
//! Given the same genesis and the same blocks, every node computes
//! **identical state hashes**.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod tournament;
pub mod chain;
pub mod replay;

// Re-export commonly used types
pub use crate::core::ids::{AccountId, Amount, GameId, MatchId, TournamentId};
pub use crate::core::time::Timestamp;
pub use crate::core::hash::StateHash;
pub use chain::{Block, BlockResult, ChainError, ChainParameters, Database, Operation};
pub use game::{Gesture, GameMove, RpsReveal};
pub use tournament::TournamentOptions;
pub use replay::{verify_transcript, ChainTranscript, Genesis, RecordingChain};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
