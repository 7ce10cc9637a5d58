//! # Crash Game Server
//!
//! Round lifecycle and settlement engine for a shared multiplayer crash game.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CRASH SERVER                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Deterministic primitives                 │
//! │  ├── ids.rs       - User, round, bet, transaction ids        │
//! │  ├── money.rs     - 2-dp half-up money rounding              │
//! │  ├── rng.rs       - Seeded Xorshift128+ PRNG                 │
//! │  └── hash.rs      - Seed commitments                         │
//! │                                                              │
//! │  game/            - Round rules (synchronous)                │
//! │  ├── multiplier.rs- Growth curve and crash-point draw        │
//! │  ├── round.rs     - Round and bet records                    │
//! │  ├── tick.rs      - One step of the round state machine      │
//! │  ├── bets.rs      - Placement, cashout, auto-settlement      │
//! │  └── events.rs    - Round events                             │
//! │                                                              │
//! │  ledger/          - Balances and transactions                │
//! │  ├── store.rs     - User store                               │
//! │  ├── sink.rs      - Bounded transaction journal              │
//! │  └── settlement.rs- The only path that moves money           │
//! │                                                              │
//! │  service/         - Async engine                             │
//! │  ├── engine.rs    - Single-writer round lifecycle            │
//! │  ├── ticker.rs    - Per-round timer task                     │
//! │  ├── config.rs    - Settings and env overrides               │
//! │  └── protocol.rs  - Status views                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Money
//!
//! All amounts and multipliers are [`rust_decimal::Decimal`] rounded to two
//! decimal places, half away from zero. No floating point touches a
//! balance.
//!
//! ## Fairness
//!
//! Each round's crash point comes from a seed derived from the server seed
//! and the round id. The seed's SHA-256 commitment is public while the
//! round runs; the seed itself is revealed in the round summary.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod ledger;
pub mod service;

// Re-export commonly used types
pub use core::ids::{BetId, RoundId, TransactionId, UserId};
pub use core::rng::DeterministicRng;
pub use game::bets::{BetError, BetReceipt, CashoutReceipt};
pub use game::events::RoundEvent;
pub use game::round::{Bet, BetStatus, Round, RoundStatus, RoundSummary};
pub use ledger::{InMemoryLedger, InMemoryUserStore, SettlementLedger, User};
pub use service::{CrashEngine, EngineConfig, EngineStatus, Settings};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
