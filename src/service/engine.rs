//! Crash Engine
//!
//! Owns the single shared round and its lifecycle:
//!
//! ```text
//!   Idle ──ensure_round_started──► Running ──tick ≥ crash point──► Crashed
//!    ▲                                                              │
//!    └──────────────── cooldown elapsed ◄── settle + history ◄──────┘
//! ```
//!
//! Every mutation of the round (ticks, bets, cashouts, the crash itself)
//! goes through one write lock, so a tick never interleaves with a bet on
//! the same round. Balance changes are further serialized per user by the
//! user store.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::core::ids::{BetId, RoundId, UserId};
use crate::core::rng::derive_round_seed;
use crate::game::bets::{self, BetError, BetReceipt, CashoutReceipt};
use crate::game::events::RoundEvent;
use crate::game::round::{Round, RoundSummary};
use crate::game::tick::tick;
use crate::ledger::settlement::SettlementLedger;
use crate::ledger::sink::LedgerSink;
use crate::ledger::store::UserStore;
use crate::service::config::{ConfigError, EngineConfig, Settings, MAX_COOLDOWN};
use crate::service::protocol::{EngineStatus, RoundSnapshot};
use crate::service::ticker::spawn_ticker;

/// What the ticker should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    /// Round still running.
    Continue,
    /// Round gone or not running; stop ticking.
    Halt,
    /// Round crashed; restart after `cooldown`.
    Crashed {
        /// Pause before the next round.
        cooldown: Duration,
    },
}

/// Post-crash pause.
struct Cooldown {
    until: Instant,
    next_round_at: DateTime<Utc>,
    last_round: RoundSummary,
}

/// Everything guarded by the round lock.
#[derive(Default)]
struct RoundSlot {
    /// The running round. A crashed round never stays here.
    active: Option<Round>,
    cooldown: Option<Cooldown>,
    history: VecDeque<RoundSummary>,
    ticker: Option<JoinHandle<()>>,
}

/// The round lifecycle and settlement engine.
pub struct CrashEngine {
    config: EngineConfig,
    settings: RwLock<Settings>,
    slot: RwLock<RoundSlot>,
    settlement: SettlementLedger,
    event_tx: broadcast::Sender<RoundEvent>,
    shutdown_tx: broadcast::Sender<()>,
    shut_down: AtomicBool,
}

impl CrashEngine {
    /// Create an engine over the given collaborators. No round is opened
    /// until the first [`ensure_round_started`](Self::ensure_round_started).
    pub fn new(
        config: EngineConfig,
        users: Arc<dyn UserStore>,
        journal: Arc<dyn LedgerSink>,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let (shutdown_tx, _) = broadcast::channel(1);

        Arc::new(Self {
            settings: RwLock::new(config.settings.clone()),
            config,
            slot: RwLock::new(RoundSlot::default()),
            settlement: SettlementLedger::new(users, journal),
            event_tx,
            shutdown_tx,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Return the running round, opening one if the engine is idle.
    ///
    /// Concurrent callers serialize on the round lock, so at most one round
    /// and one ticker are ever created. During the post-crash cooldown no
    /// round is opened and the cooldown status is returned instead.
    #[instrument(skip(self))]
    pub async fn ensure_round_started(self: &Arc<Self>) -> EngineStatus {
        let settings = self.settings().await;
        let mut slot = self.slot.write().await;

        if let Some(round) = slot.active.as_ref() {
            return EngineStatus::Running { round: RoundSnapshot::from(round) };
        }
        if let Some(cooldown) = slot.cooldown.as_ref() {
            if Instant::now() < cooldown.until {
                return EngineStatus::Cooldown {
                    next_round_at: cooldown.next_round_at,
                    last_round: Some(cooldown.last_round.clone()),
                };
            }
        }
        if self.is_shut_down() {
            return Self::idle_status(&slot);
        }

        let round = self.open_round(&mut slot, &settings, None);
        EngineStatus::Running { round }
    }

    /// Read-only status. Never opens a round.
    pub async fn status(&self) -> EngineStatus {
        let slot = self.slot.read().await;
        match slot.active.as_ref() {
            Some(round) => EngineStatus::Running { round: RoundSnapshot::from(round) },
            None => Self::idle_status(&slot),
        }
    }

    /// Apply one tick to the round `round_id`. Called by its ticker.
    ///
    /// On the crashing tick this also auto-settles open bets, records the
    /// round in history, clears the active round and starts the cooldown,
    /// all under the same lock.
    pub async fn advance(&self, round_id: RoundId) -> TickControl {
        let settings = self.settings().await;
        let mut guard = self.slot.write().await;
        let slot = &mut *guard;

        let round = match slot.active.as_mut() {
            Some(round) if round.id == round_id => round,
            _ => return TickControl::Halt,
        };

        let now = Utc::now();
        let result = match tick(round, settings.base_rate, now) {
            Some(result) => result,
            None => return TickControl::Halt,
        };

        if !result.crashed {
            #[cfg(feature = "debug-tracing")]
            tracing::debug!(round = %round_id.short(), multiplier = %result.multiplier, "Tick");

            self.publish(RoundEvent::MultiplierUpdated { round_id, multiplier: result.multiplier });
            return TickControl::Continue;
        }

        let auto_settled = bets::auto_settle(round, &self.settlement);
        let summary = round.summary();
        slot.active = None;

        slot.history.push_back(summary.clone());
        self.config.history.apply(&mut slot.history);

        let cooldown = settings.cooldown.min(MAX_COOLDOWN);
        let next_round_at = now
            + chrono::Duration::from_std(cooldown).unwrap_or_else(|_| chrono::Duration::zero());
        slot.cooldown = Some(Cooldown {
            until: Instant::now() + cooldown,
            next_round_at,
            last_round: summary.clone(),
        });

        info!(
            round = %round_id.short(),
            crash_point = %summary.crash_point,
            final_multiplier = %summary.final_multiplier,
            bets = summary.total_bets,
            auto_settled = auto_settled.len(),
            "Round crashed"
        );

        self.publish(RoundEvent::RoundCrashed { summary, auto_settled, next_round_at });
        TickControl::Crashed { cooldown }
    }

    /// Stake `amount` on the running round.
    #[instrument(skip(self))]
    pub async fn place_bet(&self, user_id: &UserId, amount: Decimal) -> Result<BetReceipt, BetError> {
        let limits = self.settings().await.limits();
        let mut slot = self.slot.write().await;

        let result = bets::place_bet(slot.active.as_mut(), &self.settlement, &limits, user_id, amount, Utc::now());
        match &result {
            Ok(receipt) => {
                info!(round = %receipt.round_id.short(), bet = %receipt.bet_id, amount = %receipt.amount, "Bet placed");
                self.publish(RoundEvent::BetPlaced {
                    round_id: receipt.round_id,
                    bet_id: receipt.bet_id,
                    user_id: user_id.clone(),
                    amount: receipt.amount,
                });
            }
            Err(e) => warn!("Bet rejected: {}", e),
        }
        result
    }

    /// Cash out an open bet at the current multiplier.
    #[instrument(skip(self))]
    pub async fn cashout(&self, user_id: &UserId, bet_id: &BetId) -> Result<CashoutReceipt, BetError> {
        let mut slot = self.slot.write().await;
        let round_id = slot.active.as_ref().map(|r| r.id);

        let result = bets::cashout(slot.active.as_mut(), &self.settlement, user_id, bet_id);
        match (&result, round_id) {
            (Ok(receipt), Some(round_id)) => {
                info!(bet = %bet_id, multiplier = %receipt.multiplier, win = %receipt.win_amount, "Cashed out");
                self.publish(RoundEvent::CashedOut {
                    round_id,
                    bet_id: *bet_id,
                    user_id: user_id.clone(),
                    multiplier: receipt.multiplier,
                    win_amount: receipt.win_amount,
                });
            }
            (Err(e), _) => warn!("Cashout rejected: {}", e),
            _ => {}
        }
        result
    }

    /// Most recent round outcomes, newest first.
    pub async fn history(&self, limit: usize) -> Vec<RoundSummary> {
        let slot = self.slot.read().await;
        slot.history.iter().rev().take(limit).cloned().collect()
    }

    /// Subscribe to round events.
    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.event_tx.subscribe()
    }

    /// The settlement ledger (balances, transactions, global stats).
    pub fn settlement(&self) -> &SettlementLedger {
        &self.settlement
    }

    /// Current settings.
    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Replace the settings. The base rate and bet limits apply at once;
    /// the tick interval and cooldown from the next round on.
    pub async fn update_settings(&self, settings: Settings) -> Result<(), ConfigError> {
        settings.validate()?;
        info!(?settings, "Settings updated");
        *self.settings.write().await = settings;
        Ok(())
    }

    /// Stop the ticker and any pending restart. No new round opens afterwards.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());
    }

    /// Whether [`shutdown`](Self::shutdown) was called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub(crate) fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Open a round and arm its ticker. Caller holds the round lock.
    fn open_round(
        self: &Arc<Self>,
        slot: &mut RoundSlot,
        settings: &Settings,
        crash_point: Option<Decimal>,
    ) -> RoundSnapshot {
        let id = RoundId::new();
        let seed = derive_round_seed(self.config.server_seed, id.as_bytes());
        let now = Utc::now();
        let round = match crash_point {
            Some(crash_point) => Round::with_crash_point(id, seed, crash_point, now),
            None => Round::new(id, seed, now),
        };

        info!(round = %id.short(), seed_hash = %round.seed_hash(), "Round started");
        let snapshot = RoundSnapshot::from(&round);
        slot.active = Some(round);
        slot.cooldown = None;

        // A previous ticker halts on its own once it sees a different round
        slot.ticker = Some(spawn_ticker(self, id, settings.tick_interval));

        self.publish(RoundEvent::RoundStarted {
            round_id: id,
            seed_hash: snapshot.seed_hash.clone(),
            started_at: now,
        });
        snapshot
    }

    fn idle_status(slot: &RoundSlot) -> EngineStatus {
        match slot.cooldown.as_ref() {
            Some(cooldown) if Instant::now() < cooldown.until => EngineStatus::Cooldown {
                next_round_at: cooldown.next_round_at,
                last_round: Some(cooldown.last_round.clone()),
            },
            _ => EngineStatus::Idle,
        }
    }

    fn publish(&self, event: RoundEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    #[cfg(test)]
    pub(crate) async fn start_round_with_crash_point(self: &Arc<Self>, crash_point: Decimal) -> RoundSnapshot {
        let settings = self.settings().await;
        let mut slot = self.slot.write().await;
        if let Some(round) = slot.active.as_ref() {
            return RoundSnapshot::from(round);
        }
        self.open_round(&mut slot, &settings, Some(crash_point))
    }

    #[cfg(test)]
    pub(crate) async fn has_live_ticker(&self) -> bool {
        let slot = self.slot.read().await;
        slot.ticker.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }
}

impl Drop for CrashEngine {
    // Tickers hold only weak handles, so this runs once the last caller lets go
    fn drop(&mut self) {
        if let Some(handle) = self.slot.get_mut().ticker.take() {
            handle.abort();
        }
    }
}
