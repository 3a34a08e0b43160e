//! Tournament Logic
//!
//! Registration, bracket construction and match sequencing. All of it runs
//! synchronously inside an operation or the timeout sweep.
//!
//! ## Module Structure
//!
//! - `options`: creator options and their validation
//! - `object`: tournament and details records
//! - `registry`: registration, refunds, start, payouts
//! - `bracket`: single-elimination layout and advancement
//! - `match_object`: match state and game sequencing

pub mod options;
pub mod object;
pub mod registry;
pub mod bracket;
pub mod match_object;

// Re-export key types
pub use options::{StartCondition, TournamentOptions, PLAYERS_PER_MATCH};
pub use object::{TournamentDetails, TournamentObject, TournamentState};
pub use match_object::{BracketSlot, MatchObject, MatchState};
