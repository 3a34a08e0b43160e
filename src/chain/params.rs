//! Chain Parameters
//!
//! Consensus limits every node must agree on. They are fixed at genesis and
//! folded into the state hash.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::hash::StateHasher;
use crate::core::ids::AccountId;

/// 100% in basis points.
pub const PERCENT_100: u16 = 10_000;

/// Limits applied when tournaments are created, plus rake settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainParameters {
    /// Latest registration deadline, in seconds after creation.
    pub maximum_registration_deadline: u32,
    /// Largest allowed `number_of_players`.
    pub maximum_players_in_tournament: u32,
    /// Largest allowed whitelist.
    pub maximum_tournament_whitelist_length: u32,
    /// Latest fixed start time, in seconds after creation.
    pub maximum_tournament_start_time_in_future: u32,
    /// Longest start delay for start-when-full tournaments.
    pub maximum_tournament_start_delay: u32,
    /// Largest allowed `number_of_wins`.
    pub maximum_tournament_number_of_wins: u32,
    /// Largest allowed `max_games_per_match`.
    pub maximum_games_per_match: u32,
    /// Share of each prize pool paid as rake, in basis points.
    pub rake_fee_percentage: u16,
    /// Account receiving the rake.
    pub rake_fee_account: AccountId,
}

impl Default for ChainParameters {
    fn default() -> Self {
        Self {
            maximum_registration_deadline: 30 * 24 * 60 * 60,           // 30 days
            maximum_players_in_tournament: 256,
            maximum_tournament_whitelist_length: 1000,
            maximum_tournament_start_time_in_future: 60 * 24 * 60 * 60, // 60 days
            maximum_tournament_start_delay: 60 * 60,                    // 1 hour
            maximum_tournament_number_of_wins: 100,
            maximum_games_per_match: 1000,
            rake_fee_percentage: 300,                                   // 3%
            rake_fee_account: AccountId::new(0),
        }
    }
}

/// Parameter loading errors.
#[derive(Debug, Error)]
pub enum ParamsError {
    /// JSON could not be parsed.
    #[error("invalid parameter json: {0}")]
    Json(#[from] serde_json::Error),

    /// An environment variable held a malformed value.
    #[error("invalid value for {key}: {value:?}")]
    Env {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },

    /// Parameters parsed but are inconsistent.
    #[error("invalid parameters: {0}")]
    Invalid(&'static str),
}

impl ChainParameters {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ParamsError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Defaults overlaid with `TOURNEY_*` environment variables.
    pub fn from_env() -> Result<Self, ParamsError> {
        let mut params = Self::default();
        overlay_u32(&mut params.maximum_registration_deadline, "TOURNEY_MAX_REGISTRATION_DEADLINE")?;
        overlay_u32(&mut params.maximum_players_in_tournament, "TOURNEY_MAX_PLAYERS")?;
        overlay_u32(&mut params.maximum_tournament_whitelist_length, "TOURNEY_MAX_WHITELIST")?;
        overlay_u32(&mut params.maximum_tournament_start_time_in_future, "TOURNEY_MAX_START_TIME_IN_FUTURE")?;
        overlay_u32(&mut params.maximum_tournament_start_delay, "TOURNEY_MAX_START_DELAY")?;
        overlay_u32(&mut params.maximum_tournament_number_of_wins, "TOURNEY_MAX_WINS")?;
        overlay_u32(&mut params.maximum_games_per_match, "TOURNEY_MAX_GAMES_PER_MATCH")?;

        if let Ok(value) = std::env::var("TOURNEY_RAKE_FEE_PERCENTAGE") {
            params.rake_fee_percentage = value.parse().map_err(|_| ParamsError::Env {
                key: "TOURNEY_RAKE_FEE_PERCENTAGE",
                value,
            })?;
        }
        if let Ok(value) = std::env::var("TOURNEY_RAKE_FEE_ACCOUNT") {
            let instance = value.parse().map_err(|_| ParamsError::Env {
                key: "TOURNEY_RAKE_FEE_ACCOUNT",
                value,
            })?;
            params.rake_fee_account = AccountId::new(instance);
        }

        params.validate()?;
        Ok(params)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.rake_fee_percentage > PERCENT_100 {
            return Err(ParamsError::Invalid("rake fee above 100%"));
        }
        if self.maximum_players_in_tournament < 2 {
            return Err(ParamsError::Invalid("tournaments need room for two players"));
        }
        if self.maximum_tournament_number_of_wins == 0 {
            return Err(ParamsError::Invalid("maximum number of wins must be positive"));
        }
        if self.maximum_games_per_match < 1 {
            return Err(ParamsError::Invalid("maximum games per match must be positive"));
        }
        Ok(())
    }

    /// Hash parameters for state verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.maximum_registration_deadline);
        hasher.update_u32(self.maximum_players_in_tournament);
        hasher.update_u32(self.maximum_tournament_whitelist_length);
        hasher.update_u32(self.maximum_tournament_start_time_in_future);
        hasher.update_u32(self.maximum_tournament_start_delay);
        hasher.update_u32(self.maximum_tournament_number_of_wins);
        hasher.update_u32(self.maximum_games_per_match);
        hasher.update_u32(u32::from(self.rake_fee_percentage));
        hasher.update_id(self.rake_fee_account);
    }
}

fn overlay_u32(field: &mut u32, key: &'static str) -> Result<(), ParamsError> {
    if let Ok(value) = std::env::var(key) {
        *field = value.parse().map_err(|_| ParamsError::Env { key, value })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ChainParameters::default().validate().is_ok());
    }

    #[test]
    fn test_json_overrides_only_given_fields() {
        let params = ChainParameters::from_json(r#"{ "rake_fee_percentage": 0, "maximum_players_in_tournament": 8 }"#).unwrap();
        assert_eq!(params.rake_fee_percentage, 0);
        assert_eq!(params.maximum_players_in_tournament, 8);
        assert_eq!(params.maximum_games_per_match, ChainParameters::default().maximum_games_per_match);
    }

    #[test]
    fn test_json_rejects_excess_rake() {
        let err = ChainParameters::from_json(r#"{ "rake_fee_percentage": 10001 }"#).unwrap_err();
        assert!(matches!(err, ParamsError::Invalid(_)));
    }

    #[test]
    fn test_json_rejects_garbage() {
        assert!(matches!(ChainParameters::from_json("{"), Err(ParamsError::Json(_))));
    }

    #[test]
    fn test_hash_changes_with_rake() {
        let a = ChainParameters::default();
        let b = ChainParameters { rake_fee_percentage: 0, ..ChainParameters::default() };

        let hash = |p: &ChainParameters| {
            let mut h = StateHasher::new(b"params");
            p.hash_into(&mut h);
            h.finalize()
        };
        assert_ne!(hash(&a), hash(&b));
    }
}
