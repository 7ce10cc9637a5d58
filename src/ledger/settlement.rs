//! Settlement & Balance Ledger
//!
//! The single path through which balances move. Each call mutates one
//! user's balance, appends the matching [`Transaction`] and bumps the
//! derived counters, in that order. A transaction is only written after
//! the balance change succeeded, so the journal never shows money that
//! did not move.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{error, warn};

use crate::core::ids::{RoundId, TransactionId, UserId};
use crate::core::money::round_money;
use crate::ledger::sink::{LedgerSink, Transaction, TransactionKind};
use crate::ledger::store::{BalanceChange, StatDelta, StoreError, User, UserStore};

/// Process-wide counters derived from the ledger.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    /// Bets accepted.
    pub total_bets: u64,
    /// Sum of all stakes.
    pub total_wagered: Decimal,
    /// Largest single payout.
    pub biggest_win: Decimal,
}

/// Settlement errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettlementError {
    /// Balance owner does not exist.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// A debit would have driven the balance negative. Callers validate
    /// funds first, so reaching this is a bug or a lost race.
    #[error("overdraft refused for {user}: balance {balance}, delta {delta}")]
    Overdraft {
        /// Affected user.
        user: UserId,
        /// Balance at the time.
        balance: Decimal,
        /// Refused delta.
        delta: Decimal,
    },
}

/// Balance mutation and transaction journal.
pub struct SettlementLedger {
    users: Arc<dyn UserStore>,
    journal: Arc<dyn LedgerSink>,
    stats: Mutex<GlobalStats>,
}

impl SettlementLedger {
    /// Wire the ledger to its collaborators.
    pub fn new(users: Arc<dyn UserStore>, journal: Arc<dyn LedgerSink>) -> Self {
        Self {
            users,
            journal,
            stats: Mutex::new(GlobalStats::default()),
        }
    }

    /// Move `amount` (signed) on the user's balance and journal it.
    pub fn apply_transaction(
        &self,
        user_id: &UserId,
        kind: TransactionKind,
        amount: Decimal,
        round_id: Option<RoundId>,
    ) -> Result<Transaction, SettlementError> {
        let amount = round_money(amount);

        // Journal under the user's lock so entries chain balance to balance
        let mut journaled = None;
        let change = self
            .users
            .mutate_balance_and(user_id, amount, &mut |change: &BalanceChange| {
                let tx = ledger_entry(user_id, kind, amount, change, round_id);
                self.journal.append(tx.clone());
                journaled = Some(tx);
            })
            .map_err(|e| match e {
                StoreError::NotFound(id) => SettlementError::UserNotFound(id),
                StoreError::WouldOverdraw { balance, delta } => {
                    error!(
                        user = %user_id, %balance, %delta, ?kind,
                        "Refusing transaction that would overdraw balance"
                    );
                    SettlementError::Overdraft { user: user_id.clone(), balance, delta }
                }
            })?;

        let tx = match journaled {
            Some(tx) => tx,
            None => {
                warn!(user = %user_id, ?kind, "User store skipped the commit hook; journaling late");
                let tx = ledger_entry(user_id, kind, amount, &change, round_id);
                self.journal.append(tx.clone());
                tx
            }
        };
        self.record_stats(user_id, kind, amount);

        Ok(tx)
    }

    /// Debit a stake.
    pub fn debit_stake(
        &self,
        user_id: &UserId,
        stake: Decimal,
        round_id: RoundId,
    ) -> Result<Transaction, SettlementError> {
        self.apply_transaction(user_id, TransactionKind::Bet, -stake, Some(round_id))
    }

    /// Credit a payout. `forced` marks crash-time auto-settlement.
    pub fn credit_win(
        &self,
        user_id: &UserId,
        amount: Decimal,
        round_id: RoundId,
        forced: bool,
    ) -> Result<Transaction, SettlementError> {
        let kind = if forced { TransactionKind::AutoWin } else { TransactionKind::Win };
        self.apply_transaction(user_id, kind, amount, Some(round_id))
    }

    /// Manual adjustment outside any round.
    pub fn adjust(&self, user_id: &UserId, amount: Decimal) -> Result<Transaction, SettlementError> {
        self.apply_transaction(user_id, TransactionKind::Adjustment, amount, None)
    }

    /// Look up a user.
    pub fn user(&self, user_id: &UserId) -> Option<User> {
        self.users.get(user_id)
    }

    /// The user's most recent transactions, oldest first.
    pub fn history_for_user(&self, user_id: &UserId, limit: usize) -> Vec<Transaction> {
        self.journal.history_for_user(user_id, limit)
    }

    /// Snapshot of the global counters.
    pub fn stats(&self) -> GlobalStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record_stats(&self, user_id: &UserId, kind: TransactionKind, amount: Decimal) {
        let delta = match kind {
            TransactionKind::Bet => StatDelta { bets: 1, wins: 0, wagered: -amount },
            TransactionKind::Win | TransactionKind::AutoWin => {
                StatDelta { wins: 1, ..Default::default() }
            }
            TransactionKind::Adjustment => return,
        };

        // Counters are derived; a failure here never unwinds the balance move
        if let Err(e) = self.users.record_stats(user_id, delta) {
            warn!(user = %user_id, "Failed to record stats: {}", e);
        }

        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        match kind {
            TransactionKind::Bet => {
                stats.total_bets += 1;
                stats.total_wagered = round_money(stats.total_wagered + delta.wagered);
            }
            TransactionKind::Win | TransactionKind::AutoWin => {
                if amount > stats.biggest_win {
                    stats.biggest_win = amount;
                }
            }
            TransactionKind::Adjustment => {}
        }
    }
}

fn ledger_entry(
    user_id: &UserId,
    kind: TransactionKind,
    amount: Decimal,
    change: &BalanceChange,
    round_id: Option<RoundId>,
) -> Transaction {
    Transaction {
        id: TransactionId::new(),
        user_id: user_id.clone(),
        kind,
        amount,
        balance_before: change.before,
        balance_after: change.after,
        round_id,
        timestamp: Utc::now(),
    }
}
