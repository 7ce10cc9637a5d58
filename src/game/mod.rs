//! Round Logic
//!
//! Synchronous, lock-free game rules. The service layer wraps them in a
//! single-writer boundary.
//!
//! ## Module Structure
//!
//! - `multiplier`: growth curve and crash-point draw
//! - `round`: round and bet records
//! - `tick`: one step of the round state machine
//! - `bets`: placement, cashout, auto-settlement
//! - `events`: round events for the presentation layer

pub mod multiplier;
pub mod round;
pub mod tick;
pub mod bets;
pub mod events;

pub use multiplier::{next_multiplier, draw_crash_point, crash_point_for_seed};
pub use round::{Round, RoundStatus, RoundSummary, Bet, BetStatus};
pub use tick::{tick, TickResult};
pub use bets::{BetLimits, BetError, BetReceipt, CashoutReceipt, AutoSettlement};
pub use events::RoundEvent;
