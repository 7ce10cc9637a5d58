//! Ledger Sink
//!
//! Append-only log of balance-affecting events. Entries are immutable once
//! appended; the only deletion is retention trimming of the oldest entries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::core::ids::{RoundId, TransactionId, UserId};

/// Why a balance moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Stake debited when a bet is accepted.
    Bet,
    /// Payout from a voluntary cashout.
    Win,
    /// Payout forced by the round crashing.
    AutoWin,
    /// Manual correction or top-up.
    Adjustment,
}

/// One immutable ledger entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction identifier.
    pub id: TransactionId,
    /// Affected user.
    pub user_id: UserId,
    /// Kind of movement.
    pub kind: TransactionKind,
    /// Signed amount (negative for debits).
    pub amount: Decimal,
    /// Balance before.
    pub balance_before: Decimal,
    /// Balance after.
    pub balance_after: Decimal,
    /// Round the movement belongs to, if any.
    pub round_id: Option<RoundId>,
    /// When it was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Bounded-retention policy: once more than `cap` entries are held, the
/// oldest are dropped until `keep` remain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Retention {
    /// Size that triggers a trim.
    pub cap: usize,
    /// Size after a trim.
    pub keep: usize,
}

impl Retention {
    /// Build a policy; `keep` is clamped to `cap`.
    pub fn new(cap: usize, keep: usize) -> Self {
        Self { cap, keep: keep.min(cap) }
    }

    /// Trim `entries` in place if over the cap. Returns how many were dropped.
    pub fn apply<T>(&self, entries: &mut VecDeque<T>) -> usize {
        if entries.len() <= self.cap {
            return 0;
        }
        let excess = entries.len() - self.keep;
        entries.drain(..excess);
        excess
    }
}

/// Destination for ledger entries.
pub trait LedgerSink: Send + Sync {
    /// Append one entry.
    fn append(&self, tx: Transaction);

    /// The newest `limit` entries for a user, oldest first.
    fn history_for_user(&self, user_id: &UserId, limit: usize) -> Vec<Transaction>;

    /// Entries currently retained.
    fn len(&self) -> usize;

    /// True if nothing is retained.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process journal with bounded retention.
pub struct InMemoryLedger {
    entries: Mutex<VecDeque<Transaction>>,
    retention: Retention,
}

impl InMemoryLedger {
    /// Journal with the given retention policy.
    pub fn new(retention: Retention) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            retention,
        }
    }

    /// Every retained entry, oldest first.
    pub fn entries(&self) -> Vec<Transaction> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.iter().cloned().collect()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(Retention::new(10_000, 5_000))
    }
}

impl LedgerSink for InMemoryLedger {
    fn append(&self, tx: Transaction) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_back(tx);
        let dropped = self.retention.apply(&mut entries);
        if dropped > 0 {
            tracing::debug!("Ledger trimmed {} oldest entries", dropped);
        }
    }

    fn history_for_user(&self, user_id: &UserId, limit: usize) -> Vec<Transaction> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut newest: Vec<Transaction> = entries
            .iter()
            .rev()
            .filter(|tx| &tx.user_id == user_id)
            .take(limit)
            .cloned()
            .collect();
        newest.reverse();
        newest
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
