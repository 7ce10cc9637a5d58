//! Round Tick
//!
//! One step of the round state machine. Pure apart from the timestamp the
//! caller passes in; the async ticker in `service::ticker` decides when to
//! call it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::game::multiplier::next_multiplier;
use crate::game::round::{Round, RoundStatus};

/// Result of a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickResult {
    /// Multiplier after this tick.
    pub multiplier: Decimal,
    /// Whether this tick crashed the round.
    pub crashed: bool,
}

/// Advance a running round by one tick.
///
/// Returns `None` if the round is not running. The crash check is
/// `next >= crash_point`; the crashing value is still written to
/// `current_multiplier` so it equals `final_multiplier`.
pub fn tick(round: &mut Round, base_rate: Decimal, now: DateTime<Utc>) -> Option<TickResult> {
    if !round.is_running() {
        return None;
    }

    let next = next_multiplier(round.current_multiplier, base_rate);
    round.current_multiplier = next;
    round.ticks += 1;

    let crashed = next >= round.crash_point();
    if crashed {
        round.status = RoundStatus::Crashed;
        round.crashed_at = Some(now);
        round.final_multiplier = Some(next);
    }

    Some(TickResult { multiplier: next, crashed })
}

/// Tick until the round crashes, returning the multiplier after every tick.
///
/// Bounded by `max_ticks` so a zero growth rate cannot spin forever.
pub fn run_to_crash(round: &mut Round, base_rate: Decimal, max_ticks: u32) -> Vec<Decimal> {
    let mut path = Vec::new();
    for _ in 0..max_ticks {
        match tick(round, base_rate, Utc::now()) {
            Some(result) => {
                path.push(result.multiplier);
                if result.crashed {
                    break;
                }
            }
            None => break,
        }
    }
    path
}
