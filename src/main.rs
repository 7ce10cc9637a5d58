//! Crash Game Server
//!
//! Runs the round engine with a handful of bot players that bet at round
//! start and cash out at a target multiplier. Stops after
//! `CRASH_DEMO_ROUNDS` rounds (default 3) or on Ctrl-C.

use anyhow::Context;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crash_server::{
    core::money::from_hundredths,
    BetId, CrashEngine, DeterministicRng, EngineConfig, InMemoryLedger, InMemoryUserStore,
    RoundEvent, User, UserId, VERSION,
};

const BOT_COUNT: usize = 4;
const BOT_BALANCE: i64 = 1_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::from_env().context("invalid CRASH_* configuration")?;
    let rounds: usize = std::env::var("CRASH_DEMO_ROUNDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3);

    info!("Crash Server v{}", VERSION);
    info!(settings = ?config.settings, "Settings");

    let users = Arc::new(InMemoryUserStore::new());
    let bots: Vec<UserId> = (1..=BOT_COUNT).map(|i| UserId::new(format!("bot-{}", i))).collect();
    for bot in &bots {
        users.insert(User::new(bot.clone(), bot.as_str(), Decimal::from(BOT_BALANCE)));
    }
    let journal = Arc::new(InMemoryLedger::new(config.ledger));

    // Bot behaviour is reproducible per server seed
    let mut rng = DeterministicRng::new(config.server_seed);
    let engine = CrashEngine::new(config, users, journal);
    let mut events = engine.subscribe();
    engine.ensure_round_started().await;

    let mut open: BTreeMap<UserId, (BetId, Decimal)> = BTreeMap::new();
    let mut crashes = 0;

    while crashes < rounds {
        let event = tokio::select! {
            received = events.recv() => match received {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream lagged, skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        };

        match event {
            RoundEvent::RoundStarted { round_id, seed_hash, .. } => {
                info!(round = %round_id.short(), %seed_hash, "New round");
                open.clear();
                for bot in &bots {
                    let stake = Decimal::from(1 + rng.next_int(50));
                    let target = from_hundredths(110 + i64::from(rng.next_int(200)));
                    match engine.place_bet(bot, stake).await {
                        Ok(receipt) => {
                            open.insert(bot.clone(), (receipt.bet_id, target));
                        }
                        Err(e) => warn!(bot = %bot, "Bet failed: {}", e),
                    }
                }
            }
            RoundEvent::MultiplierUpdated { multiplier, .. } => {
                let due: Vec<UserId> = open
                    .iter()
                    .filter(|(_, (_, target))| multiplier >= *target)
                    .map(|(bot, _)| bot.clone())
                    .collect();
                for bot in due {
                    if let Some((bet_id, _)) = open.remove(&bot) {
                        if let Err(e) = engine.cashout(&bot, &bet_id).await {
                            warn!(bot = %bot, "Cashout failed: {}", e);
                        }
                    }
                }
            }
            RoundEvent::RoundCrashed { summary, auto_settled, next_round_at } => {
                crashes += 1;
                info!(
                    round = %summary.id.short(),
                    crash_point = %summary.crash_point,
                    auto_settled = auto_settled.len(),
                    %next_round_at,
                    "Round {}/{} finished", crashes, rounds
                );
                open.clear();
            }
            _ => {}
        }
    }

    engine.shutdown();

    // Print final results
    info!("=== Results ===");
    let stats = engine.settlement().stats();
    info!(
        total_bets = stats.total_bets,
        total_wagered = %stats.total_wagered,
        biggest_win = %stats.biggest_win,
        "Global stats"
    );
    for bot in &bots {
        if let Some(user) = engine.settlement().user(bot) {
            info!(bot = %bot, balance = %user.balance, bets = user.total_bets, wins = user.total_wins, "Final balance");
        }
    }
    for summary in engine.history(rounds).await {
        info!(
            "Round {} crashed at {}x (seed {:?}, commitment {})",
            summary.id.short(),
            summary.crash_point,
            summary.seed,
            summary.seed_hash
        );
    }

    Ok(())
}
