//! Money Layer
//!
//! - `store`: User Store contract and the in-memory store
//! - `sink`: Ledger Sink contract and the bounded in-memory journal
//! - `settlement`: the only code allowed to move a balance

pub mod store;
pub mod sink;
pub mod settlement;

pub use store::{User, UserStore, InMemoryUserStore, StatDelta, StoreError};
pub use sink::{Transaction, TransactionKind, LedgerSink, InMemoryLedger, Retention};
pub use settlement::{SettlementLedger, SettlementError, GlobalStats};
