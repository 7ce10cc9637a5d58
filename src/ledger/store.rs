//! User Store
//!
//! Contract for the collaborator that owns user records. The engine only
//! reads users and moves their balance and stat counters; it never creates
//! or deletes them.
//!
//! Every balance mutation on a single user is serialized by that user's own
//! lock, so a bet debit and a cashout credit for the same user cannot
//! interleave, while different users never contend.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;

use crate::core::ids::UserId;
use crate::core::money::round_money;

/// A player account as seen by the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Name shown next to bets.
    pub display_name: String,
    /// Spendable balance, never negative.
    pub balance: Decimal,
    /// Number of bets placed.
    pub total_bets: u64,
    /// Number of paid-out bets (manual or automatic).
    pub total_wins: u64,
    /// Sum of all stakes.
    pub total_wagered: Decimal,
    /// Account level, owned by the store.
    pub level: u32,
}

impl User {
    /// New level-1 user with zeroed counters.
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>, balance: Decimal) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            balance: round_money(balance),
            total_bets: 0,
            total_wins: 0,
            total_wagered: Decimal::ZERO,
            level: 1,
        }
    }
}

/// Counter increments applied alongside a balance change.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StatDelta {
    /// Bets placed.
    pub bets: u64,
    /// Wins paid.
    pub wins: u64,
    /// Amount wagered.
    pub wagered: Decimal,
}

/// Balance before and after a mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BalanceChange {
    /// Balance before the delta.
    pub before: Decimal,
    /// Balance after the delta.
    pub after: Decimal,
}

/// User store errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// No such user.
    #[error("user {0} not found")]
    NotFound(UserId),

    /// The delta would take the balance below zero; nothing was changed.
    #[error("balance {balance} cannot absorb {delta}")]
    WouldOverdraw {
        /// Balance at the time of the attempt.
        balance: Decimal,
        /// Rejected delta.
        delta: Decimal,
    },
}

/// Read/write access to user balances and stats.
pub trait UserStore: Send + Sync {
    /// Snapshot of a user.
    fn get(&self, id: &UserId) -> Option<User>;

    /// Atomically add `delta` (signed) to the balance, rounding to 2 dp.
    ///
    /// Must refuse, without mutating, any delta that would leave the
    /// balance negative. On success `commit` runs exactly once while the
    /// user is still locked, so whatever it records is ordered the same way
    /// as the balance changes themselves.
    fn mutate_balance_and(
        &self,
        id: &UserId,
        delta: Decimal,
        commit: &mut dyn FnMut(&BalanceChange),
    ) -> Result<BalanceChange, StoreError>;

    /// [`mutate_balance_and`](Self::mutate_balance_and) with nothing to commit.
    fn mutate_balance(&self, id: &UserId, delta: Decimal) -> Result<BalanceChange, StoreError> {
        self.mutate_balance_and(id, delta, &mut |_: &BalanceChange| {})
    }

    /// Bump the user's bet/win/wagered counters.
    fn record_stats(&self, id: &UserId, delta: StatDelta) -> Result<(), StoreError>;
}

/// In-process user store with one lock per user.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<BTreeMap<UserId, Arc<Mutex<User>>>>,
}

impl InMemoryUserStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user record.
    pub fn insert(&self, user: User) {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        users.insert(user.id.clone(), Arc::new(Mutex::new(user)));
    }

    /// Number of users.
    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True if the store has no users.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn row(&self, id: &UserId) -> Result<Arc<Mutex<User>>, StoreError> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}

impl UserStore for InMemoryUserStore {
    fn get(&self, id: &UserId) -> Option<User> {
        let row = self.row(id).ok()?;
        let user = row.lock().unwrap_or_else(PoisonError::into_inner);
        Some(user.clone())
    }

    fn mutate_balance_and(
        &self,
        id: &UserId,
        delta: Decimal,
        commit: &mut dyn FnMut(&BalanceChange),
    ) -> Result<BalanceChange, StoreError> {
        let row = self.row(id)?;
        let mut user = row.lock().unwrap_or_else(PoisonError::into_inner);

        let before = user.balance;
        let after = round_money(before + delta);
        if after < Decimal::ZERO {
            return Err(StoreError::WouldOverdraw { balance: before, delta });
        }

        user.balance = after;
        let change = BalanceChange { before, after };
        commit(&change);
        Ok(change)
    }

    fn record_stats(&self, id: &UserId, delta: StatDelta) -> Result<(), StoreError> {
        let row = self.row(id)?;
        let mut user = row.lock().unwrap_or_else(PoisonError::into_inner);

        user.total_bets += delta.bets;
        user.total_wins += delta.wins;
        user.total_wagered = round_money(user.total_wagered + delta.wagered);
        Ok(())
    }
}
