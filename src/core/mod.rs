//! Core deterministic primitives.
//!
//! Identifiers, money rounding, seeded randomness and seed commitments.
//! Nothing in here touches the clock or shared state.

pub mod ids;
pub mod money;
pub mod rng;
pub mod hash;

pub use ids::{UserId, RoundId, BetId, TransactionId};
pub use money::{round_money, payout, MONEY_DP, MULTIPLIER_ONE};
pub use rng::{DeterministicRng, derive_round_seed};
pub use hash::{commit_seed, commit_seed_hex, verify_seed};
