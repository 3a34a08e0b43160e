//! State Hashing for Verification
//!
//! Provides deterministic hashing for:
//! - Whole-database state hashes compared across nodes
//! - Replay checkpoint validation
//!
//! Move commitments use plain SHA-256 (see `game::commitment`).

use sha2::{Sha256, Digest};
use super::ids::ObjectId;
use super::time::Timestamp;

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for engine state.
///
/// Wraps SHA-256 with helpers for the engine's primitive types.
/// Order of updates is critical for determinism.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for the full database state.
    pub fn for_chain_state() -> Self {
        Self::new(b"RPS_TOURNAMENT_STATE_V1")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with a timestamp.
    #[inline]
    pub fn update_time(&mut self, value: Timestamp) {
        self.update_u32(value.secs());
    }

    /// Update with an optional timestamp (presence flag first).
    #[inline]
    pub fn update_opt_time(&mut self, value: Option<Timestamp>) {
        self.update_bool(value.is_some());
        if let Some(t) = value {
            self.update_time(t);
        }
    }

    /// Update with any object identifier.
    #[inline]
    pub fn update_id<I: ObjectId>(&mut self, id: I) {
        self.update_u64(id.instance());
    }

    /// Update with a length-prefixed sequence of identifiers.
    pub fn update_ids<'a, I, It>(&mut self, ids: It)
    where
        I: ObjectId + 'a,
        It: ExactSizeIterator<Item = &'a I>,
    {
        self.update_u64(ids.len() as u64);
        for id in ids {
            self.update_id(*id);
        }
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

// =============================================================================
// TESTS
// =============================================================================
