//! Object Identifiers
//!
//! Typed identifiers for every object kind the engine stores. The object
//! store allocates instances sequentially, so ordering by identifier is
//! ordering by creation. That order is the tie-breaker for everything that
//! must be reproducible across nodes.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Amount of the buy-in asset, in its smallest unit.
pub type Amount = u64;

/// Common behaviour of object identifiers, used by the object store.
pub trait ObjectId: Copy + Ord + fmt::Debug + fmt::Display {
    /// Build an identifier from a raw instance number.
    fn from_instance(instance: u64) -> Self;

    /// Raw instance number.
    fn instance(self) -> u64;
}

macro_rules! object_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            /// Create from a raw instance number.
            pub const fn new(instance: u64) -> Self {
                Self(instance)
            }
        }

        impl ObjectId for $name {
            #[inline]
            fn from_instance(instance: u64) -> Self {
                Self(instance)
            }

            #[inline]
            fn instance(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

object_id!(
    /// A ledger account (player, payer, creator or rake receiver).
    AccountId, "account"
);
object_id!(
    /// A tournament summary object.
    TournamentId, "tournament"
);
object_id!(
    /// The membership/bracket record owned by one tournament.
    TournamentDetailsId, "tournament-details"
);
object_id!(
    /// A match between two bracket entrants.
    MatchId, "match"
);
object_id!(
    /// A single game inside a match.
    GameId, "game"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_ordering_follows_instance() {
        let a = AccountId::new(2);
        let b = AccountId::new(10);
        assert!(a < b);
        assert_eq!(AccountId::from_instance(10), b);
        assert_eq!(b.instance(), 10);
    }

    #[test]
    fn test_display_is_labelled() {
        assert_eq!(GameId::new(7).to_string(), "game#7");
        assert_eq!(TournamentId::new(0).to_string(), "tournament#0");
    }
}
