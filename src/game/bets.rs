//! Bet Ledger
//!
//! Placement, cashout and crash-time auto-settlement against a round.
//! Every function here expects the caller to hold the round exclusively,
//! so validation, the balance move and the bet record happen as one step.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::core::ids::{BetId, RoundId, UserId};
use crate::core::money::{payout, round_money};
use crate::game::round::{Bet, BetStatus, Round};
use crate::ledger::settlement::{SettlementError, SettlementLedger};

/// Stake bounds, inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BetLimits {
    /// Smallest stake.
    pub min_bet: Decimal,
    /// Largest stake.
    pub max_bet: Decimal,
}

/// Accepted bet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetReceipt {
    /// New bet.
    pub bet_id: BetId,
    /// Round it rides on.
    pub round_id: RoundId,
    /// Stake debited.
    pub amount: Decimal,
    /// Balance after the debit.
    pub new_balance: Decimal,
}

/// Completed cashout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashoutReceipt {
    /// Closed bet.
    pub bet_id: BetId,
    /// Multiplier locked in.
    pub multiplier: Decimal,
    /// Amount credited.
    pub win_amount: Decimal,
    /// Balance after the credit.
    pub new_balance: Decimal,
}

/// A bet closed by the crash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSettlement {
    /// Closed bet.
    pub bet_id: BetId,
    /// Owner.
    pub user_id: UserId,
    /// Final multiplier.
    pub multiplier: Decimal,
    /// Amount credited.
    pub win_amount: Decimal,
}

/// Client-correctable bet failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BetError {
    /// No running round.
    #[error("no round is running")]
    RoundNotActive,

    /// Unknown user.
    #[error("user not found")]
    UserNotFound,

    /// No open bet with that id for that user.
    #[error("bet not found or already settled")]
    BetNotFound,

    /// Stake under the minimum.
    #[error("minimum bet is {min}, got {amount}")]
    BelowMinBet {
        /// Configured minimum.
        min: Decimal,
        /// Requested stake.
        amount: Decimal,
    },

    /// Stake over the maximum.
    #[error("maximum bet is {max}, got {amount}")]
    AboveMaxBet {
        /// Configured maximum.
        max: Decimal,
        /// Requested stake.
        amount: Decimal,
    },

    /// Balance too low for the stake.
    #[error("insufficient funds: balance {balance}, stake {amount}")]
    InsufficientFunds {
        /// Balance at the time.
        balance: Decimal,
        /// Requested stake.
        amount: Decimal,
    },

    /// The balance move itself failed.
    #[error("settlement failed: {0}")]
    Settlement(#[from] SettlementError),
}

/// Validate and record a stake on the running round.
///
/// Checks run in order: round, user, min, max, funds. The stake is debited
/// before the bet is recorded; if the debit fails no bet exists.
pub fn place_bet(
    round: Option<&mut Round>,
    settlement: &SettlementLedger,
    limits: &BetLimits,
    user_id: &UserId,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<BetReceipt, BetError> {
    let round = round.filter(|r| r.is_running()).ok_or(BetError::RoundNotActive)?;
    let user = settlement.user(user_id).ok_or(BetError::UserNotFound)?;

    if amount < limits.min_bet {
        return Err(BetError::BelowMinBet { min: limits.min_bet, amount });
    }
    if amount > limits.max_bet {
        return Err(BetError::AboveMaxBet { max: limits.max_bet, amount });
    }

    // A sub-cent stake can round to zero
    let stake = round_money(amount);
    if stake <= Decimal::ZERO || stake < limits.min_bet {
        return Err(BetError::BelowMinBet { min: limits.min_bet, amount });
    }
    if stake > user.balance {
        return Err(BetError::InsufficientFunds { balance: user.balance, amount: stake });
    }

    let tx = settlement.debit_stake(user_id, stake, round.id).map_err(|e| match e {
        // Balance moved between the check and the debit
        SettlementError::Overdraft { balance, .. } => {
            BetError::InsufficientFunds { balance, amount: stake }
        }
        SettlementError::UserNotFound(_) => BetError::UserNotFound,
    })?;

    let bet = Bet::new(round.id, user_id.clone(), stake, now);
    let bet_id = bet.id;
    round.add_bet(bet);

    Ok(BetReceipt {
        bet_id,
        round_id: round.id,
        amount: stake,
        new_balance: tx.balance_after,
    })
}

/// Close an open bet at the round's current multiplier.
///
/// A second cashout of the same bet finds nothing open and fails with
/// [`BetError::BetNotFound`].
pub fn cashout(
    round: Option<&mut Round>,
    settlement: &SettlementLedger,
    user_id: &UserId,
    bet_id: &BetId,
) -> Result<CashoutReceipt, BetError> {
    let round = round.ok_or(BetError::RoundNotActive)?;
    let round_id = round.id;
    let multiplier = round.current_multiplier;

    let bet = round.open_bet_mut(user_id, bet_id).ok_or(BetError::BetNotFound)?;
    let win_amount = payout(bet.amount, multiplier);

    let tx = settlement.credit_win(user_id, win_amount, round_id, false)?;
    bet.close(BetStatus::CashedOut, multiplier, win_amount);

    Ok(CashoutReceipt {
        bet_id: *bet_id,
        multiplier,
        win_amount,
        new_balance: tx.balance_after,
    })
}

/// Close every open bet of a crashed round at its final multiplier.
///
/// No bet is left open afterwards. A credit that fails is logged and the
/// bet is still closed with a zero payout, so the round can be discarded
/// and the bet record matches what was actually credited.
pub fn auto_settle(round: &mut Round, settlement: &SettlementLedger) -> Vec<AutoSettlement> {
    let round_id = round.id;
    let multiplier = round.final_multiplier.unwrap_or(round.current_multiplier);
    let mut settled = Vec::new();

    for bet in round.bets.iter_mut().filter(|b| b.is_open()) {
        let owed = payout(bet.amount, multiplier);

        let win_amount = match settlement.credit_win(&bet.user_id, owed, round_id, true) {
            Ok(_) => owed,
            Err(e) => {
                error!(
                    round = %round_id, bet = %bet.id, user = %bet.user_id, %owed,
                    "Auto-settlement credit failed: {}", e
                );
                Decimal::ZERO
            }
        };
        bet.close(BetStatus::AutoSettled, multiplier, win_amount);

        debug!(bet = %bet.id, %win_amount, "Bet auto-settled");
        settled.push(AutoSettlement {
            bet_id: bet.id,
            user_id: bet.user_id.clone(),
            multiplier,
            win_amount,
        });
    }

    settled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tick::tick;
    use crate::ledger::sink::{InMemoryLedger, LedgerSink, TransactionKind};
    use crate::ledger::store::{BalanceChange, InMemoryUserStore, StatDelta, StoreError, User, UserStore};
    use std::str::FromStr;
    use std::sync::Arc;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn limits() -> BetLimits {
        BetLimits { min_bet: d("0.01"), max_bet: d("10000") }
    }

    struct Fixture {
        settlement: SettlementLedger,
        journal: Arc<InMemoryLedger>,
        round: Round,
        alice: UserId,
    }

    fn fixture(crash_point: &str) -> Fixture {
        let users = Arc::new(InMemoryUserStore::new());
        users.insert(User::new("alice", "Alice", d("1000")));
        users.insert(User::new("bob", "Bob", d("20")));
        let journal = Arc::new(InMemoryLedger::default());

        Fixture {
            settlement: SettlementLedger::new(users, journal.clone()),
            journal,
            round: Round::with_crash_point(RoundId::new(), 1, d(crash_point), Utc::now()),
            alice: UserId::from("alice"),
        }
    }

    fn balance(f: &Fixture, user: &str) -> Decimal {
        f.settlement.user(&UserId::from(user)).unwrap().balance
    }

    #[test]
    fn test_place_bet_debits_immediately() {
        let mut f = fixture("5.00");
        let receipt = place_bet(Some(&mut f.round), &f.settlement, &limits(), &f.alice, d("50"), Utc::now()).unwrap();

        assert_eq!(receipt.new_balance, d("950.00"));
        assert_eq!(balance(&f, "alice"), d("950"));
        assert_eq!(f.round.bets.len(), 1);
        assert_eq!(f.round.players, vec![f.alice.clone()]);

        let entries = f.journal.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, TransactionKind::Bet);
        assert_eq!(entries[0].amount, d("-50.00"));
    }

    #[test]
    fn test_place_bet_validation_order() {
        let mut f = fixture("5.00");

        assert_eq!(
            place_bet(None, &f.settlement, &limits(), &f.alice, d("1"), Utc::now()),
            Err(BetError::RoundNotActive)
        );
        assert_eq!(
            place_bet(Some(&mut f.round), &f.settlement, &limits(), &UserId::from("ghost"), d("1"), Utc::now()),
            Err(BetError::UserNotFound)
        );
        assert_eq!(
            place_bet(Some(&mut f.round), &f.settlement, &limits(), &f.alice, d("0.001"), Utc::now()),
            Err(BetError::BelowMinBet { min: d("0.01"), amount: d("0.001") })
        );
        assert_eq!(
            place_bet(Some(&mut f.round), &f.settlement, &limits(), &f.alice, d("10000.01"), Utc::now()),
            Err(BetError::AboveMaxBet { max: d("10000"), amount: d("10000.01") })
        );
        assert_eq!(
            place_bet(Some(&mut f.round), &f.settlement, &limits(), &UserId::from("bob"), d("20.01"), Utc::now()),
            Err(BetError::InsufficientFunds { balance: d("20"), amount: d("20.01") })
        );

        // Non-positive stakes fall under the minimum
        assert!(matches!(
            place_bet(Some(&mut f.round), &f.settlement, &limits(), &f.alice, d("-5"), Utc::now()),
            Err(BetError::BelowMinBet { .. })
        ));

        assert!(f.round.bets.is_empty());
        assert!(f.journal.is_empty());
        assert_eq!(balance(&f, "alice"), d("1000"));
    }

    #[test]
    fn test_place_bet_rejected_on_crashed_round() {
        let mut f = fixture("1.01");
        tick(&mut f.round, d("0.02"), Utc::now());

        let result = place_bet(Some(&mut f.round), &f.settlement, &limits(), &f.alice, d("1"), Utc::now());
        assert_eq!(result, Err(BetError::RoundNotActive));
    }

    #[test]
    fn test_cashout_pays_current_multiplier() {
        let mut f = fixture("5.00");
        let receipt = place_bet(Some(&mut f.round), &f.settlement, &limits(), &f.alice, d("100"), Utc::now()).unwrap();

        for _ in 0..25 {
            tick(&mut f.round, d("0.02"), Utc::now());
        }
        assert_eq!(f.round.current_multiplier, d("1.50"));

        let cashed = cashout(Some(&mut f.round), &f.settlement, &f.alice, &receipt.bet_id).unwrap();
        assert_eq!(cashed.multiplier, d("1.50"));
        assert_eq!(cashed.win_amount, d("150.00"));
        assert_eq!(cashed.new_balance, d("1050.00"));

        let bet = &f.round.bets[0];
        assert_eq!(bet.status, BetStatus::CashedOut);
        assert_eq!(bet.cashout_multiplier, Some(d("1.50")));
        assert_eq!(f.journal.entries()[1].kind, TransactionKind::Win);
    }

    #[test]
    fn test_double_cashout_fails() {
        let mut f = fixture("5.00");
        let receipt = place_bet(Some(&mut f.round), &f.settlement, &limits(), &f.alice, d("10"), Utc::now()).unwrap();

        cashout(Some(&mut f.round), &f.settlement, &f.alice, &receipt.bet_id).unwrap();
        let second = cashout(Some(&mut f.round), &f.settlement, &f.alice, &receipt.bet_id);

        assert_eq!(second, Err(BetError::BetNotFound));
        assert_eq!(balance(&f, "alice"), d("1000.00"));
    }

    #[test]
    fn test_foreign_bet_is_invisible() {
        let mut f = fixture("5.00");
        let receipt = place_bet(Some(&mut f.round), &f.settlement, &limits(), &f.alice, d("10"), Utc::now()).unwrap();

        let result = cashout(Some(&mut f.round), &f.settlement, &UserId::from("bob"), &receipt.bet_id);
        assert_eq!(result, Err(BetError::BetNotFound));
        assert!(f.round.bets[0].is_open());
    }

    #[test]
    fn test_cashout_without_round() {
        let f = fixture("5.00");
        let result = cashout(None, &f.settlement, &f.alice, &BetId::new());
        assert_eq!(result, Err(BetError::RoundNotActive));
    }

    #[test]
    fn test_auto_settle_closes_every_open_bet() {
        let mut f = fixture("3.10");
        let bob = UserId::from("bob");
        let kept = place_bet(Some(&mut f.round), &f.settlement, &limits(), &f.alice, d("100"), Utc::now()).unwrap();
        let cashed = place_bet(Some(&mut f.round), &f.settlement, &limits(), &bob, d("10"), Utc::now()).unwrap();
        cashout(Some(&mut f.round), &f.settlement, &bob, &cashed.bet_id).unwrap();

        // 3.00 is not above the first boost threshold, so one 0.10 step lands on 3.10
        f.round.current_multiplier = d("3.00");
        assert!(tick(&mut f.round, d("0.10"), Utc::now()).unwrap().crashed);
        assert_eq!(f.round.final_multiplier, Some(d("3.10")));

        let settled = auto_settle(&mut f.round, &f.settlement);
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].bet_id, kept.bet_id);
        assert_eq!(settled[0].win_amount, d("310.00"));
        assert_eq!(f.round.open_bet_count(), 0);

        let bet = f.round.bets.iter().find(|b| b.id == kept.bet_id).unwrap();
        assert_eq!(bet.status, BetStatus::AutoSettled);
        assert_eq!(bet.cashout_multiplier, Some(d("3.10")));
        assert_eq!(balance(&f, "alice"), d("1210.00"));

        let last = f.journal.entries().pop().unwrap();
        assert_eq!(last.kind, TransactionKind::AutoWin);
        assert_eq!(last.amount, d("310.00"));
    }

    #[test]
    fn test_stake_is_rounded_to_cents() {
        let mut f = fixture("5.00");
        let receipt = place_bet(Some(&mut f.round), &f.settlement, &limits(), &f.alice, d("1.005"), Utc::now()).unwrap();
        assert_eq!(receipt.amount, d("1.01"));
        assert_eq!(receipt.new_balance, d("998.99"));
    }

    #[test]
    fn test_sub_cent_stake_rounding_to_zero_is_rejected() {
        let mut f = fixture("5.00");
        let loose = BetLimits { min_bet: d("0.001"), max_bet: d("10000") };

        let result = place_bet(Some(&mut f.round), &f.settlement, &loose, &f.alice, d("0.004"), Utc::now());

        assert_eq!(result, Err(BetError::BelowMinBet { min: d("0.001"), amount: d("0.004") }));
        assert!(f.round.bets.is_empty());
        assert!(f.journal.is_empty());
        assert_eq!(balance(&f, "alice"), d("1000"));
        assert_eq!(f.settlement.stats().total_bets, 0);
    }

    /// Accepts debits, refuses every credit.
    struct NoCredits(InMemoryUserStore);

    impl UserStore for NoCredits {
        fn get(&self, id: &UserId) -> Option<User> {
            self.0.get(id)
        }

        fn mutate_balance_and(
            &self,
            id: &UserId,
            delta: Decimal,
            commit: &mut dyn FnMut(&BalanceChange),
        ) -> Result<BalanceChange, StoreError> {
            if delta > Decimal::ZERO {
                return Err(StoreError::NotFound(id.clone()));
            }
            self.0.mutate_balance_and(id, delta, commit)
        }

        fn record_stats(&self, id: &UserId, delta: StatDelta) -> Result<(), StoreError> {
            self.0.record_stats(id, delta)
        }
    }

    #[test]
    fn test_failed_auto_credit_records_zero_payout() {
        let inner = InMemoryUserStore::new();
        inner.insert(User::new("alice", "Alice", d("1000")));
        let journal = Arc::new(InMemoryLedger::default());
        let settlement = SettlementLedger::new(Arc::new(NoCredits(inner)), journal.clone());
        let alice = UserId::from("alice");
        let mut round = Round::with_crash_point(RoundId::new(), 1, d("1.01"), Utc::now());

        let receipt = place_bet(Some(&mut round), &settlement, &limits(), &alice, d("100"), Utc::now()).unwrap();
        assert!(tick(&mut round, d("0.02"), Utc::now()).unwrap().crashed);

        let settled = auto_settle(&mut round, &settlement);
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].win_amount, Decimal::ZERO);

        let bet = &round.bets[0];
        assert_eq!(bet.id, receipt.bet_id);
        assert_eq!(bet.status, BetStatus::AutoSettled);
        assert_eq!(bet.win_amount, Decimal::ZERO);

        // Bet record and ledger agree: only the stake moved
        let net: Decimal = journal.entries().iter().map(|t| t.amount).sum();
        assert_eq!(net, d("-100.00"));
        assert_eq!(settlement.user(&alice).unwrap().balance, d("900.00"));
    }
}
