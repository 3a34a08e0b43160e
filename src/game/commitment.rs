//! Move Commitment Protocol
//!
//! A player commits to `sha256(gesture || nonce)` before either move is
//! visible, then reveals the gesture and nonce. The reveal only counts if it
//! opens the commitment exactly.

use sha2::{Sha256, Digest};
use serde::{Serialize, Deserialize};

use crate::core::hash::StateHash;
use crate::game::rps::Gesture;

/// Published commitment to a gesture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveCommitment {
    /// `sha256(gesture byte || nonce)`.
    pub hash: StateHash,
}

impl MoveCommitment {
    /// Wrap a hash received from a player.
    pub const fn from_hash(hash: StateHash) -> Self {
        Self { hash }
    }

    /// Create the commitment a player would publish for `gesture` and `nonce`.
    pub fn from_reveal(gesture: Gesture, nonce: &[u8]) -> Self {
        Self {
            hash: compute_commitment_hash(gesture, nonce),
        }
    }

    /// Verify that a reveal opens this commitment.
    pub fn verify(&self, gesture: Gesture, nonce: &[u8]) -> bool {
        CommitmentVerifier::verify(&self.hash, gesture, nonce)
    }
}

/// Checks reveals against stored commitment hashes.
///
/// Never fails loudly: a reveal that does not match is simply `false`, and
/// callers treat it like a missing reveal.
pub struct CommitmentVerifier;

impl CommitmentVerifier {
    /// `true` iff `hash(revealed_move || revealed_nonce) == commitment_hash`.
    pub fn verify(commitment_hash: &StateHash, revealed_move: Gesture, revealed_nonce: &[u8]) -> bool {
        compute_commitment_hash(revealed_move, revealed_nonce) == *commitment_hash
    }
}

/// Canonical commitment hash: the gesture's one-byte encoding followed by
/// the raw nonce.
pub fn compute_commitment_hash(gesture: Gesture, nonce: &[u8]) -> StateHash {
    let mut hasher = Sha256::new();
    hasher.update([gesture.index()]);
    hasher.update(nonce);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_commitment_creation() {
        let commitment = MoveCommitment::from_reveal(Gesture::Paper, b"nonce-1");

        assert!(commitment.verify(Gesture::Paper, b"nonce-1"));
        assert!(!commitment.verify(Gesture::Rock, b"nonce-1"));
        assert!(!commitment.verify(Gesture::Paper, b"nonce-2"));
    }

    #[test]
    fn test_commitment_determinism() {
        let c1 = MoveCommitment::from_reveal(Gesture::Scissors, &[9; 32]);
        let c2 = MoveCommitment::from_reveal(Gesture::Scissors, &[9; 32]);
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_empty_nonce_is_allowed() {
        let c = MoveCommitment::from_reveal(Gesture::Rock, &[]);
        assert!(c.verify(Gesture::Rock, &[]));
        assert!(!c.verify(Gesture::Rock, &[0]));
    }

    #[test]
    fn test_known_encoding() {
        // sha256 of the single byte 0x01 (paper, empty nonce)
        let expected: StateHash = Sha256::digest([1u8]).into();
        assert_eq!(compute_commitment_hash(Gesture::Paper, &[]), expected);
    }

    proptest! {
        #[test]
        fn prop_valid_reveal_verifies(g in 0u8..5, nonce in proptest::collection::vec(any::<u8>(), 0..64)) {
            let gesture = Gesture::from_index(g).unwrap();
            let c = MoveCommitment::from_reveal(gesture, &nonce);
            prop_assert!(CommitmentVerifier::verify(&c.hash, gesture, &nonce));
        }

        #[test]
        fn prop_nonce_bit_flip_fails(
            g in 0u8..5,
            nonce in proptest::collection::vec(any::<u8>(), 1..64),
            byte in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let gesture = Gesture::from_index(g).unwrap();
            let c = MoveCommitment::from_reveal(gesture, &nonce);
            let mut flipped = nonce.clone();
            let i = byte.index(flipped.len());
            flipped[i] ^= 1 << bit;
            prop_assert!(!c.verify(gesture, &flipped));
        }

        #[test]
        fn prop_hash_bit_flip_fails(
            g in 0u8..5,
            nonce in proptest::collection::vec(any::<u8>(), 0..64),
            byte in 0usize..32,
            bit in 0u8..8,
        ) {
            let gesture = Gesture::from_index(g).unwrap();
            let mut hash = compute_commitment_hash(gesture, &nonce);
            hash[byte] ^= 1 << bit;
            prop_assert!(!MoveCommitment::from_hash(hash).verify(gesture, &nonce));
        }

        #[test]
        fn prop_other_gesture_fails(
            g in 0u8..5,
            h in 0u8..5,
            nonce in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            prop_assume!(g != h);
            let c = MoveCommitment::from_reveal(Gesture::from_index(g).unwrap(), &nonce);
            prop_assert!(!c.verify(Gesture::from_index(h).unwrap(), &nonce));
        }
    }
}
