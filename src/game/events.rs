//! Round Events
//!
//! Everything the presentation layer needs to mirror a round without
//! polling. Published on the engine's broadcast channel in the order the
//! state changed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::ids::{BetId, RoundId, UserId};
use crate::game::bets::AutoSettlement;
use crate::game::round::RoundSummary;

/// A state change on the shared round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundEvent {
    /// A new round opened at 1.00.
    RoundStarted {
        /// Round identifier.
        round_id: RoundId,
        /// Seed commitment.
        seed_hash: String,
        /// Opened at.
        started_at: DateTime<Utc>,
    },

    /// The multiplier advanced.
    MultiplierUpdated {
        /// Round identifier.
        round_id: RoundId,
        /// New multiplier.
        multiplier: Decimal,
    },

    /// A stake was accepted.
    BetPlaced {
        /// Round identifier.
        round_id: RoundId,
        /// New bet.
        bet_id: BetId,
        /// Bettor.
        user_id: UserId,
        /// Stake.
        amount: Decimal,
    },

    /// A player cashed out.
    CashedOut {
        /// Round identifier.
        round_id: RoundId,
        /// Closed bet.
        bet_id: BetId,
        /// Bettor.
        user_id: UserId,
        /// Multiplier locked in.
        multiplier: Decimal,
        /// Payout.
        win_amount: Decimal,
    },

    /// The round crashed and open bets were settled.
    RoundCrashed {
        /// Outcome, with the seed revealed.
        summary: RoundSummary,
        /// Bets closed by the crash.
        auto_settled: Vec<AutoSettlement>,
        /// Earliest time the next round opens.
        next_round_at: DateTime<Utc>,
    },
}

impl RoundEvent {
    /// Round the event belongs to.
    pub fn round_id(&self) -> RoundId {
        match self {
            RoundEvent::RoundStarted { round_id, .. }
            | RoundEvent::MultiplierUpdated { round_id, .. }
            | RoundEvent::BetPlaced { round_id, .. }
            | RoundEvent::CashedOut { round_id, .. } => *round_id,
            RoundEvent::RoundCrashed { summary, .. } => summary.id,
        }
    }

    /// True for the terminal event of a round.
    pub fn is_crash(&self) -> bool {
        matches!(self, RoundEvent::RoundCrashed { .. })
    }
}
