//! Block Time
//!
//! Second-resolution timestamps supplied by the ledger. The engine never
//! reads the system clock; "now" is always the head block's timestamp.

use std::fmt;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Deserialize};

/// Seconds since the Unix epoch, as carried in a block header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u32);

impl Timestamp {
    /// Create from seconds since the epoch.
    pub const fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    /// Seconds since the epoch.
    #[inline]
    pub const fn secs(self) -> u32 {
        self.0
    }

    /// Add a window in seconds, clamping at the end of the representable range.
    #[inline]
    pub fn saturating_add_secs(self, secs: u32) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Add a window in seconds, `None` on overflow.
    #[inline]
    pub fn checked_add_secs(self, secs: u32) -> Option<Self> {
        self.0.checked_add(secs).map(Self)
    }

    /// Convert from a chrono UTC datetime (sub-second precision is dropped).
    pub fn from_datetime(dt: &DateTime<Utc>) -> Option<Self> {
        u32::try_from(dt.timestamp()).ok().map(Self)
    }

    /// Convert to a chrono UTC datetime.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::from(self.0), 0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            None => write!(f, "{}s", self.0),
        }
    }
}
