//! Multiplier Model
//!
//! Pure functions for the growth curve and the crash-point draw. No clock,
//! no shared state: the ticker decides *when* to grow, this module decides
//! *by how much*.
//!
//! ## Growth law
//!
//! Each tick adds `base_rate`, boosted by thresholds that compound:
//!
//! ```text
//!   current >  3.00  → rate × 1.5
//!   current >  5.00  → rate × 2    (× 3   total)
//!   current >  8.00  → rate × 3    (× 9   total)
//! ```
//!
//! ## Crash-point draw
//!
//! Uniform over `1.01 ..= 9.99` in steps of 0.01. This is the house's
//! existing (player-favourable) distribution and is kept as-is; `1.00` is
//! excluded because it would crash every round at the open.

use rust_decimal::Decimal;

use crate::core::money::{from_hundredths, round_money};
use crate::core::rng::DeterministicRng;

/// Lowest crash point that can be drawn, in hundredths (1.01).
pub const MIN_CRASH_HUNDREDTHS: i64 = 101;

/// Highest crash point that can be drawn, in hundredths (9.99).
pub const MAX_CRASH_HUNDREDTHS: i64 = 999;

/// Rate boosts: once `current` is strictly above the threshold, the rate
/// is multiplied by the factor. Boosts accumulate.
pub const RATE_BOOSTS: [(Decimal, Decimal); 3] = [
    (Decimal::from_parts(3, 0, 0, false, 0), Decimal::from_parts(15, 0, 0, false, 1)),
    (Decimal::from_parts(5, 0, 0, false, 0), Decimal::from_parts(2, 0, 0, false, 0)),
    (Decimal::from_parts(8, 0, 0, false, 0), Decimal::from_parts(3, 0, 0, false, 0)),
];

/// Per-tick growth at the given multiplier.
pub fn growth_rate(current: Decimal, base_rate: Decimal) -> Decimal {
    RATE_BOOSTS
        .iter()
        .filter(|(threshold, _)| current > *threshold)
        .fold(base_rate, |rate, (_, factor)| rate * *factor)
}

/// Multiplier after one more tick, rounded to 2 dp.
///
/// The rate is per tick; the ticker fires at a fixed cadence, so elapsed
/// time enters only through the number of calls.
pub fn next_multiplier(current: Decimal, base_rate: Decimal) -> Decimal {
    round_money(current + growth_rate(current, base_rate))
}

/// Draw a crash point from the round's generator.
pub fn draw_crash_point(rng: &mut DeterministicRng) -> Decimal {
    let span = (MAX_CRASH_HUNDREDTHS - MIN_CRASH_HUNDREDTHS + 1) as u32;
    from_hundredths(MIN_CRASH_HUNDREDTHS + rng.next_int(span) as i64)
}

/// Crash point implied by a round seed. Used both to draw and to verify.
pub fn crash_point_for_seed(seed: u64) -> Decimal {
    draw_crash_point(&mut DeterministicRng::new(seed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_base_rate_below_first_threshold() {
        assert_eq!(next_multiplier(d("1.00"), d("0.02")), d("1.02"));
        // 3.00 is not strictly above the threshold
        assert_eq!(next_multiplier(d("3.00"), d("0.02")), d("3.02"));
    }

    #[test]
    fn test_boosts_compound() {
        assert_eq!(growth_rate(d("3.01"), d("0.02")), d("0.03"));
        assert_eq!(growth_rate(d("5.01"), d("0.02")), d("0.06"));
        assert_eq!(growth_rate(d("8.01"), d("0.02")), d("0.18"));
        assert_eq!(next_multiplier(d("8.50"), d("0.02")), d("8.68"));
    }

    #[test]
    fn test_rounding_is_half_up() {
        // 0.01 × 1.5 = 0.015 → rounds up to 0.02
        assert_eq!(next_multiplier(d("3.10"), d("0.01")), d("3.12"));
    }

    #[test]
    fn test_seventy_five_ticks_reach_two_fifty() {
        let mut m = d("1.00");
        for _ in 0..75 {
            m = next_multiplier(m, d("0.02"));
        }
        assert_eq!(m, d("2.50"));
    }

    #[test]
    fn test_crash_point_range() {
        let mut rng = DeterministicRng::new(2024);
        for _ in 0..5000 {
            let cp = draw_crash_point(&mut rng);
            assert!(cp > Decimal::ONE, "crash point {} must exceed 1.00", cp);
            assert!(cp <= d("9.99"));
            assert_eq!(cp, round_money(cp));
        }
    }

    #[test]
    fn test_crash_point_for_seed_is_reproducible() {
        assert_eq!(crash_point_for_seed(31337), crash_point_for_seed(31337));
    }

    proptest! {
        #[test]
        fn prop_multiplier_strictly_increases(
            current in 100i64..2000,
            rate in 1i64..50,
        ) {
            let current = from_hundredths(current);
            let rate = from_hundredths(rate);
            let next = next_multiplier(current, rate);

            prop_assert!(next > current);
            prop_assert!(next - current >= rate);
            prop_assert!(next - current <= rate * Decimal::from(9) + from_hundredths(1));
            prop_assert_eq!(next, round_money(next));
        }

        #[test]
        fn prop_crash_point_never_one(seed in any::<u64>()) {
            let cp = crash_point_for_seed(seed);
            prop_assert!(cp >= from_hundredths(MIN_CRASH_HUNDREDTHS));
            prop_assert!(cp <= from_hundredths(MAX_CRASH_HUNDREDTHS));
        }
    }
}
