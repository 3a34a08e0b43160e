//! Replay and Verification
//!
//! Any node can check another's history by replaying it:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    REPLAY                                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  transcript.rs   - Genesis, applied blocks, checkpoints     │
//! │  verify.rs       - Verification by replay                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod transcript;
pub mod verify;

pub use transcript::{
    ChainTranscript, Checkpoint, Genesis, RecordingChain,
    CHECKPOINT_INTERVAL, TRANSCRIPT_VERSION,
};
pub use verify::{verify_transcript, CheckpointResult, VerificationError, VerificationResult};
