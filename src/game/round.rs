//! Round and Bet State
//!
//! One [`Round`] is one run of the multiplier from 1.00 to its crash point.
//! The crash point and seed are fixed at creation and never exposed while
//! the round is running.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::hash::commit_seed_hex;
use crate::core::ids::{BetId, RoundId, UserId};
use crate::core::money::MULTIPLIER_ONE;
use crate::game::multiplier::crash_point_for_seed;

// =============================================================================
// BET
// =============================================================================

/// Lifecycle of a bet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    /// Stake locked, riding the multiplier.
    Open,
    /// Player cashed out before the crash.
    CashedOut,
    /// Closed by the crash at the final multiplier.
    AutoSettled,
}

/// A stake on one round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    /// Bet identifier.
    pub id: BetId,
    /// Owning round.
    pub round_id: RoundId,
    /// Owning user.
    pub user_id: UserId,
    /// Stake, already debited.
    pub amount: Decimal,
    /// When the stake was accepted.
    pub placed_at: DateTime<Utc>,
    /// Current status.
    pub status: BetStatus,
    /// Multiplier the bet closed at.
    pub cashout_multiplier: Option<Decimal>,
    /// Payout, zero until closed.
    pub win_amount: Decimal,
}

impl Bet {
    /// New open bet.
    pub fn new(round_id: RoundId, user_id: UserId, amount: Decimal, placed_at: DateTime<Utc>) -> Self {
        Self {
            id: BetId::new(),
            round_id,
            user_id,
            amount,
            placed_at,
            status: BetStatus::Open,
            cashout_multiplier: None,
            win_amount: Decimal::ZERO,
        }
    }

    /// Still riding.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == BetStatus::Open
    }

    /// Close the bet. Has no effect on a bet that is already closed.
    pub fn close(&mut self, status: BetStatus, multiplier: Decimal, win_amount: Decimal) -> bool {
        if !self.is_open() || status == BetStatus::Open {
            return false;
        }
        self.status = status;
        self.cashout_multiplier = Some(multiplier);
        self.win_amount = win_amount;
        true
    }
}

// =============================================================================
// ROUND
// =============================================================================

/// Round status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    /// Multiplier advancing, bets accepted.
    Running,
    /// Crash point reached. Terminal.
    Crashed,
}

/// One instance of the game.
#[derive(Clone, Debug)]
pub struct Round {
    /// Round identifier.
    pub id: RoundId,
    crash_point: Decimal,
    seed: u64,
    seed_hash: String,
    /// Latest multiplier. Non-decreasing.
    pub current_multiplier: Decimal,
    /// Status.
    pub status: RoundStatus,
    /// When the round opened.
    pub started_at: DateTime<Utc>,
    /// Ticks applied so far.
    pub ticks: u32,
    /// Users with at least one bet, in order of first bet.
    pub players: Vec<UserId>,
    /// Bets in placement order.
    pub bets: Vec<Bet>,
    /// When the round crashed.
    pub crashed_at: Option<DateTime<Utc>>,
    /// Multiplier of the crashing tick.
    pub final_multiplier: Option<Decimal>,
}

impl Round {
    /// Open a round whose crash point is drawn from `seed`.
    pub fn new(id: RoundId, seed: u64, started_at: DateTime<Utc>) -> Self {
        Self::with_crash_point(id, seed, crash_point_for_seed(seed), started_at)
    }

    /// Open a round with an explicit crash point (replays, verification).
    pub fn with_crash_point(
        id: RoundId,
        seed: u64,
        crash_point: Decimal,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            crash_point,
            seed,
            seed_hash: commit_seed_hex(seed),
            current_multiplier: MULTIPLIER_ONE,
            status: RoundStatus::Running,
            started_at,
            ticks: 0,
            players: Vec::new(),
            bets: Vec::new(),
            crashed_at: None,
            final_multiplier: None,
        }
    }

    /// Crash point. Internal use only; never put it on the wire while running.
    #[inline]
    pub fn crash_point(&self) -> Decimal {
        self.crash_point
    }

    /// Commitment to the seed, safe to publish at any time.
    pub fn seed_hash(&self) -> &str {
        &self.seed_hash
    }

    /// The seed, once the round has crashed.
    pub fn revealed_seed(&self) -> Option<u64> {
        match self.status {
            RoundStatus::Crashed => Some(self.seed),
            RoundStatus::Running => None,
        }
    }

    /// Accepting bets and ticks.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.status == RoundStatus::Running
    }

    /// Append a bet and register its owner as a participant.
    pub fn add_bet(&mut self, bet: Bet) {
        if !self.players.contains(&bet.user_id) {
            self.players.push(bet.user_id.clone());
        }
        self.bets.push(bet);
    }

    /// The open bet matching both ids. Settled or foreign bets are invisible.
    pub fn open_bet_mut(&mut self, user_id: &UserId, bet_id: &BetId) -> Option<&mut Bet> {
        self.bets
            .iter_mut()
            .find(|b| b.id == *bet_id && b.user_id == *user_id && b.is_open())
    }

    /// Number of bets still open.
    pub fn open_bet_count(&self) -> usize {
        self.bets.iter().filter(|b| b.is_open()).count()
    }

    /// History record. Meaningful once crashed.
    pub fn summary(&self) -> RoundSummary {
        RoundSummary {
            id: self.id,
            crash_point: self.crash_point,
            final_multiplier: self.final_multiplier.unwrap_or(self.current_multiplier),
            started_at: self.started_at,
            ended_at: self.crashed_at,
            players_count: self.players.len(),
            total_bets: self.bets.len(),
            seed: self.revealed_seed(),
            seed_hash: self.seed_hash.clone(),
        }
    }
}

/// Past outcome kept in round history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSummary {
    /// Round identifier.
    pub id: RoundId,
    /// Drawn crash point.
    pub crash_point: Decimal,
    /// Multiplier of the crashing tick.
    pub final_multiplier: Decimal,
    /// Opened at.
    pub started_at: DateTime<Utc>,
    /// Crashed at.
    pub ended_at: Option<DateTime<Utc>>,
    /// Distinct bettors.
    pub players_count: usize,
    /// Bets placed.
    pub total_bets: usize,
    /// Revealed seed.
    pub seed: Option<u64>,
    /// Seed commitment published while running.
    pub seed_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::verify_seed;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_new_round_defaults() {
        let round = Round::new(RoundId::new(), 99, Utc::now());
        assert!(round.is_running());
        assert_eq!(round.current_multiplier, Decimal::ONE);
        assert!(round.crash_point() > Decimal::ONE);
        assert_eq!(round.crash_point(), crash_point_for_seed(99));
        assert!(round.revealed_seed().is_none());
        assert!(verify_seed(99, round.seed_hash()));
    }

    #[test]
    fn test_players_have_set_semantics() {
        let mut round = Round::new(RoundId::new(), 1, Utc::now());
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        round.add_bet(Bet::new(round.id, alice.clone(), d("1"), Utc::now()));
        round.add_bet(Bet::new(round.id, bob.clone(), d("2"), Utc::now()));
        round.add_bet(Bet::new(round.id, alice.clone(), d("3"), Utc::now()));

        assert_eq!(round.players, vec![alice, bob]);
        assert_eq!(round.bets.len(), 3);
        assert_eq!(round.open_bet_count(), 3);
    }

    #[test]
    fn test_open_bet_lookup_requires_owner_and_open() {
        let mut round = Round::new(RoundId::new(), 1, Utc::now());
        let alice = UserId::from("alice");
        let bet = Bet::new(round.id, alice.clone(), d("5"), Utc::now());
        let bet_id = bet.id;
        round.add_bet(bet);

        assert!(round.open_bet_mut(&UserId::from("mallory"), &bet_id).is_none());

        let bet = round.open_bet_mut(&alice, &bet_id).unwrap();
        assert!(bet.close(BetStatus::CashedOut, d("1.50"), d("7.50")));
        assert!(round.open_bet_mut(&alice, &bet_id).is_none());
    }

    #[test]
    fn test_closed_bet_is_immutable() {
        let mut bet = Bet::new(RoundId::new(), UserId::from("u"), d("10"), Utc::now());
        assert!(!bet.close(BetStatus::Open, d("2"), d("20")));
        assert!(bet.close(BetStatus::CashedOut, d("2"), d("20")));
        assert!(!bet.close(BetStatus::AutoSettled, d("3"), d("30")));

        assert_eq!(bet.status, BetStatus::CashedOut);
        assert_eq!(bet.cashout_multiplier, Some(d("2")));
        assert_eq!(bet.win_amount, d("20"));
    }
}
