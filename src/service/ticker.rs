//! Round Ticker
//!
//! One task per round. Advances the multiplier on a fixed cadence, and
//! after the crash waits out the cooldown and asks the engine for the next
//! round. That next round gets its own ticker.
//!
//! The task only holds a weak handle: it stops once the engine is dropped
//! or shut down.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::debug;

use crate::core::ids::RoundId;
use crate::service::engine::{CrashEngine, TickControl};

/// Spawn the ticker for `round_id`. The first tick fires one `period` after
/// the round opens.
pub fn spawn_ticker(engine: &Arc<CrashEngine>, round_id: RoundId, period: Duration) -> JoinHandle<()> {
    let mut shutdown_rx = engine.subscribe_shutdown();
    // Read after subscribing: any later shutdown reaches `shutdown_rx`
    let stopped = engine.is_shut_down();
    let engine = Arc::downgrade(engine);

    tokio::spawn(async move {
        if stopped {
            debug!(round = %round_id.short(), "Engine already shut down, ticker not started");
            return;
        }

        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown_rx.recv() => {
                    debug!(round = %round_id.short(), "Ticker stopped by shutdown");
                    return;
                }
            }

            let Some(live) = engine.upgrade() else {
                debug!(round = %round_id.short(), "Engine dropped, ticker stopped");
                return;
            };
            let control = live.advance(round_id).await;
            drop(live);

            match control {
                TickControl::Continue => {}
                TickControl::Halt => {
                    debug!(round = %round_id.short(), "Ticker halted");
                    return;
                }
                TickControl::Crashed { cooldown } => {
                    tokio::select! {
                        _ = sleep(cooldown) => {}
                        _ = shutdown_rx.recv() => return,
                    }
                    if let Some(live) = engine.upgrade() {
                        live.ensure_round_started().await;
                    }
                    return;
                }
            }
        }
    })
}
