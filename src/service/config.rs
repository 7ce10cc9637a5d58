//! Engine Configuration
//!
//! Game settings and engine tuning, with defaults and environment
//! overrides:
//!
//! | Variable             | Field                    | Default |
//! |----------------------|--------------------------|---------|
//! | `CRASH_MIN_BET`      | `settings.min_bet`       | 0.01    |
//! | `CRASH_MAX_BET`      | `settings.max_bet`       | 10000   |
//! | `CRASH_BASE_RATE`    | `settings.base_rate`     | 0.02    |
//! | `CRASH_TICK_MS`      | `settings.tick_interval` | 100     |
//! | `CRASH_COOLDOWN_MS`  | `settings.cooldown`      | 10000   |
//! | `CRASH_SERVER_SEED`  | `server_seed`            | random  |
//! | `CRASH_HISTORY_CAP`  | `history.cap`            | 100     |
//! | `CRASH_LEDGER_CAP`   | `ledger.cap`             | 10000   |
//!
//! Trim targets are half of each cap.

use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::game::bets::BetLimits;
use crate::ledger::sink::Retention;

/// Longest accepted cooldown. Also the ceiling the engine clamps to, which
/// keeps deadline arithmetic from overflowing.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A variable could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },

    /// Values parse but do not make sense together.
    #[error("inconsistent settings: {0}")]
    Inconsistent(String),
}

/// Game settings. Read by the engine on every operation; replaceable at
/// runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Smallest stake.
    pub min_bet: Decimal,
    /// Largest stake.
    pub max_bet: Decimal,
    /// Growth per tick below the first boost threshold.
    pub base_rate: Decimal,
    /// Ticker cadence.
    pub tick_interval: Duration,
    /// Pause between a crash and the next round.
    pub cooldown: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_bet: Decimal::new(1, 2),
            max_bet: Decimal::from(10_000),
            base_rate: Decimal::new(2, 2),
            tick_interval: Duration::from_millis(100),
            cooldown: Duration::from_secs(10),
        }
    }
}

impl Settings {
    /// Defaults overridden by `CRASH_*` variables, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let settings = Self {
            min_bet: env_parse("CRASH_MIN_BET")?.unwrap_or(defaults.min_bet),
            max_bet: env_parse("CRASH_MAX_BET")?.unwrap_or(defaults.max_bet),
            base_rate: env_parse("CRASH_BASE_RATE")?.unwrap_or(defaults.base_rate),
            tick_interval: env_parse("CRASH_TICK_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
            cooldown: env_parse("CRASH_COOLDOWN_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.cooldown),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the engine cannot run with.
    ///
    /// Stakes are whole cents, so `min_bet` must be at least 0.01. The base
    /// rate must be at least 0.01 too: anything smaller rounds to a zero
    /// step and the round would never reach its crash point.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_bet < Decimal::new(1, 2) {
            return Err(ConfigError::Inconsistent(format!("min_bet {} is below 0.01", self.min_bet)));
        }
        if self.min_bet > self.max_bet {
            return Err(ConfigError::Inconsistent(format!(
                "min_bet {} exceeds max_bet {}",
                self.min_bet, self.max_bet
            )));
        }
        if self.base_rate < Decimal::new(1, 2) {
            return Err(ConfigError::Inconsistent(format!("base_rate {} is below 0.01", self.base_rate)));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Inconsistent("tick_interval must be non-zero".into()));
        }
        if self.cooldown > MAX_COOLDOWN {
            return Err(ConfigError::Inconsistent(format!(
                "cooldown {:?} exceeds {:?}",
                self.cooldown, MAX_COOLDOWN
            )));
        }
        Ok(())
    }

    /// Stake bounds.
    pub fn limits(&self) -> BetLimits {
        BetLimits { min_bet: self.min_bet, max_bet: self.max_bet }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Game settings.
    pub settings: Settings,
    /// Secret mixed into every round seed.
    pub server_seed: u64,
    /// Round history retention.
    pub history: Retention,
    /// Ledger retention for the in-memory journal.
    pub ledger: Retention,
    /// Buffered events per subscriber before it lags.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            server_seed: random_seed(),
            history: Retention::new(100, 50),
            ledger: Retention::new(10_000, 5_000),
            event_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `CRASH_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let history_cap: Option<usize> = env_parse("CRASH_HISTORY_CAP")?;
        let ledger_cap: Option<usize> = env_parse("CRASH_LEDGER_CAP")?;

        Ok(Self {
            settings: Settings::from_env()?,
            server_seed: env_parse("CRASH_SERVER_SEED")?.unwrap_or(defaults.server_seed),
            history: history_cap.map(|cap| Retention::new(cap, cap / 2)).unwrap_or(defaults.history),
            ledger: ledger_cap.map(|cap| Retention::new(cap, cap / 2)).unwrap_or(defaults.ledger),
            event_capacity: defaults.event_capacity,
        })
    }
}

/// Fresh 64-bit seed from a v4 UUID.
fn random_seed() -> u64 {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    let mut head = [0u8; 8];
    head.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(head)
}

fn env_parse<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.min_bet.to_string(), "0.01");
        assert_eq!(settings.max_bet, Decimal::from(10_000));
        assert_eq!(settings.base_rate.to_string(), "0.02");
        assert_eq!(settings.tick_interval, Duration::from_millis(100));
        assert_eq!(settings.cooldown, Duration::from_secs(10));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let zero_min = Settings { min_bet: Decimal::ZERO, ..Default::default() };
        assert!(zero_min.validate().is_err());

        let inverted = Settings { min_bet: Decimal::from(5), max_bet: Decimal::from(1), ..Default::default() };
        assert!(inverted.validate().is_err());

        let stalled = Settings { base_rate: Decimal::new(1, 3), ..Default::default() };
        assert!(stalled.validate().is_err());

        let frozen = Settings { tick_interval: Duration::ZERO, ..Default::default() };
        assert!(frozen.validate().is_err());
    }

    #[test]
    fn test_validate_requires_whole_cent_min_bet() {
        let sub_cent = Settings { min_bet: Decimal::new(1, 3), ..Default::default() };
        assert!(sub_cent.validate().is_err());

        let one_cent = Settings { min_bet: Decimal::new(1, 2), ..Default::default() };
        assert!(one_cent.validate().is_ok());
    }

    #[test]
    fn test_validate_caps_cooldown() {
        let at_cap = Settings { cooldown: MAX_COOLDOWN, ..Default::default() };
        assert!(at_cap.validate().is_ok());

        let endless = Settings { cooldown: Duration::MAX, ..Default::default() };
        assert!(endless.validate().is_err());
    }

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.history, Retention::new(100, 50));
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn test_env_parse_missing_and_invalid() {
        let missing: Option<u64> = env_parse("CRASH_TEST_SURELY_UNSET_VAR").unwrap();
        assert!(missing.is_none());

        std::env::set_var("CRASH_TEST_BAD_NUMBER", "abc");
        let bad: Result<Option<u64>, _> = env_parse("CRASH_TEST_BAD_NUMBER");
        assert_eq!(
            bad,
            Err(ConfigError::Invalid { key: "CRASH_TEST_BAD_NUMBER", value: "abc".into() })
        );
        std::env::remove_var("CRASH_TEST_BAD_NUMBER");
    }
}
