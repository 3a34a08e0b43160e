//! Rock-Paper-Scissors Rules
//!
//! Gestures, per-game options and the per-player throw record. The classic
//! three-gesture game and the five-gesture (spock, lizard) extension share
//! one precedence rule.

use serde::{Serialize, Deserialize};

use crate::core::hash::{StateHash, StateHasher};
use crate::game::commitment::MoveCommitment;

/// Smallest allowed gesture count (rock, paper, scissors).
pub const CLASSIC_GESTURES: u8 = 3;

/// Gesture count with spock and lizard enabled.
pub const EXTENDED_GESTURES: u8 = 5;

// =============================================================================
// GESTURE
// =============================================================================

/// A thrown gesture. The discriminant is its canonical one-byte encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Gesture {
    /// Beats scissors and lizard
    Rock = 0,
    /// Beats rock and spock
    Paper = 1,
    /// Beats paper and lizard
    Scissors = 2,
    /// Beats scissors and rock
    Spock = 3,
    /// Beats spock and paper
    Lizard = 4,
}

impl Gesture {
    /// All gestures in encoding order.
    pub const ALL: [Gesture; 5] = [
        Gesture::Rock,
        Gesture::Paper,
        Gesture::Scissors,
        Gesture::Spock,
        Gesture::Lizard,
    ];

    /// Canonical one-byte encoding.
    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Decode from the canonical encoding.
    pub fn from_index(index: u8) -> Option<Gesture> {
        Self::ALL.get(index as usize).copied()
    }

    /// Is this gesture playable in a game with `number_of_gestures`?
    #[inline]
    pub fn is_allowed(self, number_of_gestures: u8) -> bool {
        self.index() < number_of_gestures
    }

    /// Does `self` beat `other`?
    ///
    /// `(self - other) mod 5` in {1, 3}. Restricted to the first three
    /// gestures this is exactly rock > scissors > paper > rock.
    #[inline]
    pub fn beats(self, other: Gesture) -> bool {
        let diff = (5 + self.index() - other.index()) % 5;
        diff == 1 || diff == 3
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Per-tournament settings for RPS games.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpsGameOptions {
    /// Seconds each player has to commit, starting when the game starts.
    pub time_per_commit_move: u32,
    /// Seconds each player has to reveal, starting when both have committed.
    pub time_per_reveal_move: u32,
    /// 3 for classic RPS, 5 to add spock and lizard.
    pub number_of_gestures: u8,
}

impl Default for RpsGameOptions {
    fn default() -> Self {
        Self {
            time_per_commit_move: 60,
            time_per_reveal_move: 60,
            number_of_gestures: CLASSIC_GESTURES,
        }
    }
}

impl RpsGameOptions {
    /// Hash options for state verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.time_per_commit_move);
        hasher.update_u32(self.time_per_reveal_move);
        hasher.update_u8(self.number_of_gestures);
    }
}

// =============================================================================
// MOVES
// =============================================================================

/// Commit half of a throw.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpsCommit {
    /// Hash binding the player to a gesture.
    pub commitment: MoveCommitment,
}

/// Reveal half of a throw.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpsReveal {
    /// The gesture committed to.
    pub gesture: Gesture,
    /// The nonce chosen at commit time.
    pub nonce: Vec<u8>,
}

impl RpsReveal {
    /// Build the commit that this reveal will later open.
    pub fn commit(&self) -> RpsCommit {
        RpsCommit {
            commitment: MoveCommitment::from_reveal(self.gesture, &self.nonce),
        }
    }
}

/// What one player has done in one game.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpsThrow {
    /// Commitment hash, once committed.
    pub commitment: Option<StateHash>,
    /// Revealed gesture, once a valid reveal is accepted.
    pub revealed: Option<Gesture>,
    /// Player missed a deadline or revealed something that did not open
    /// their commitment.
    pub forfeited: bool,
}

impl RpsThrow {
    /// Has the player committed?
    #[inline]
    pub fn has_committed(&self) -> bool {
        self.commitment.is_some()
    }

    /// Has the player finished acting (revealed or forfeited)?
    #[inline]
    pub fn has_acted(&self) -> bool {
        self.revealed.is_some() || self.forfeited
    }

    /// Valid revealed gesture, if the player is still in the game.
    #[inline]
    pub fn live_gesture(&self) -> Option<Gesture> {
        if self.forfeited {
            None
        } else {
            self.revealed
        }
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_bool(self.commitment.is_some());
        if let Some(c) = &self.commitment {
            hasher.update_bytes(c);
        }
        hasher.update_bool(self.revealed.is_some());
        if let Some(g) = self.revealed {
            hasher.update_u8(g.index());
        }
        hasher.update_bool(self.forfeited);
    }
}

/// Game-specific payload for an RPS game (one throw per player, parallel to
/// the game's player list).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpsGameDetails {
    /// Throws, indexed like `GameObject::players`.
    pub throws: Vec<RpsThrow>,
}

impl RpsGameDetails {
    /// Details for a game with `players` participants.
    pub fn new(players: usize) -> Self {
        Self {
            throws: vec![RpsThrow::default(); players],
        }
    }

    /// Have all players committed?
    pub fn all_committed(&self) -> bool {
        self.throws.iter().all(RpsThrow::has_committed)
    }

    /// Have all players revealed or forfeited?
    pub fn all_acted(&self) -> bool {
        self.throws.iter().all(RpsThrow::has_acted)
    }

    /// Hash details for state verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u64(self.throws.len() as u64);
        for throw in &self.throws {
            throw.hash_into(hasher);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
