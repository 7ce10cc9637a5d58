//! Presentation Views
//!
//! Serializable read models handed to whatever serves clients. The crash
//! point of a running round is never part of these.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::ids::{RoundId, UserId};
use crate::game::round::{Bet, Round, RoundStatus, RoundSummary};

/// Public view of a round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSnapshot {
    /// Round identifier.
    pub id: RoundId,
    /// Status.
    pub status: RoundStatus,
    /// Latest multiplier.
    pub current_multiplier: Decimal,
    /// Seed commitment.
    pub seed_hash: String,
    /// Crash point, only once crashed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_point: Option<Decimal>,
    /// Opened at.
    pub started_at: DateTime<Utc>,
    /// Participants.
    pub players: Vec<UserId>,
    /// Bets in placement order.
    pub bets: Vec<Bet>,
}

impl From<&Round> for RoundSnapshot {
    fn from(round: &Round) -> Self {
        Self {
            id: round.id,
            status: round.status,
            current_multiplier: round.current_multiplier,
            seed_hash: round.seed_hash().to_string(),
            crash_point: (!round.is_running()).then(|| round.crash_point()),
            started_at: round.started_at,
            players: round.players.clone(),
            bets: round.bets.clone(),
        }
    }
}

/// Where the engine is in its cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EngineStatus {
    /// No round and none scheduled.
    Idle,
    /// A round is running.
    Running {
        /// The running round.
        round: RoundSnapshot,
    },
    /// Between rounds.
    Cooldown {
        /// When the next round may open.
        next_round_at: DateTime<Utc>,
        /// The round that just crashed.
        last_round: Option<RoundSummary>,
    },
}

impl EngineStatus {
    /// The running round, if any.
    pub fn round(&self) -> Option<&RoundSnapshot> {
        match self {
            EngineStatus::Running { round } => Some(round),
            _ => None,
        }
    }

    /// True while a round is running.
    pub fn is_running(&self) -> bool {
        matches!(self, EngineStatus::Running { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_snapshot_hides_crash_point() {
        let round = Round::with_crash_point(RoundId::new(), 5, Decimal::new(250, 2), Utc::now());
        let snapshot = RoundSnapshot::from(&round);
        assert!(snapshot.crash_point.is_none());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("crashPoint").is_none());
        assert_eq!(json["currentMultiplier"], "1.00");
        assert_eq!(json["status"], "running");
    }

    #[test]
    fn test_crashed_snapshot_shows_crash_point() {
        let mut round = Round::with_crash_point(RoundId::new(), 5, Decimal::new(101, 2), Utc::now());
        crate::game::tick::tick(&mut round, Decimal::new(2, 2), Utc::now());

        let snapshot = RoundSnapshot::from(&round);
        assert_eq!(snapshot.crash_point, Some(Decimal::new(101, 2)));
    }

    #[test]
    fn test_status_tag() {
        let json = serde_json::to_value(EngineStatus::Idle).unwrap();
        assert_eq!(json["state"], "idle");
        assert!(!EngineStatus::Idle.is_running());
        assert!(EngineStatus::Idle.round().is_none());
    }
}
