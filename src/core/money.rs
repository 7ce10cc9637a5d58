//! Two-Decimal Money Arithmetic
//!
//! Balances, stakes, payouts and multipliers are all `rust_decimal::Decimal`.
//! Every value that is stored or shown is rounded to two decimal places
//! with half-up rounding, so a stake of `0.005` becomes `0.01` no matter
//! which code path produced it.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  stake × multiplier  ──round_money──►  win amount    │
//! │  balance ± delta     ──round_money──►  new balance   │
//! │  current + rate      ──round_money──►  multiplier    │
//! └──────────────────────────────────────────────────────┘
//! ```

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept for every monetary and multiplier value.
pub const MONEY_DP: u32 = 2;

/// Multiplier every round opens at (1.00).
pub const MULTIPLIER_ONE: Decimal = Decimal::from_parts(100, 0, 0, false, 2);

/// Round to two decimal places, half away from zero.
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Payout for a stake locked in at `multiplier`.
#[inline]
pub fn payout(stake: Decimal, multiplier: Decimal) -> Decimal {
    round_money(stake * multiplier)
}

/// Build a 2-dp decimal from hundredths (`250` -> `2.50`).
#[inline]
pub fn from_hundredths(hundredths: i64) -> Decimal {
    Decimal::new(hundredths, MONEY_DP)
}
