//! Display yield ticker.
//!
//! Recomputes the accrued yield of a set of stakes on a fixed interval from
//! registry snapshots only. It never reads upstream and never touches the
//! orchestrator, so display refreshes cannot race mutations.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::accrual::accrued_yield;
use crate::config::EngineConfig;
use crate::display::format_units;
use crate::ledger::Clock;
use crate::registry::StakeRegistry;
use crate::state::{Amount, RateSchedule, StakeKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YieldTick {
    pub key: StakeKey,
    pub accrued: Amount,
    /// `accrued` rendered by [`format_units`]
    pub display: String,
}

/// Handle to a running ticker; dropping it stops the task.
pub struct YieldTicker {
    ticks: watch::Receiver<Vec<YieldTick>>,
    task: JoinHandle<()>,
}

impl YieldTicker {
    /// Start recomputing `keys` every `config.refresh_interval()`.
    ///
    /// Stakes without a cached snapshot are skipped until the registry has
    /// loaded them.
    pub fn spawn(
        config: &EngineConfig,
        registry: Arc<StakeRegistry>,
        schedule: RateSchedule,
        clock: Arc<dyn Clock>,
        keys: Vec<StakeKey>,
    ) -> Self {
        let interval = config.refresh_interval();
        let (tx, ticks) = watch::channel(Vec::new());
        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                timer.tick().await;
                let now = clock.now();
                let mut batch = Vec::with_capacity(keys.len());
                for key in &keys {
                    let Some(stake) = registry.snapshot(key).await else {
                        continue;
                    };
                    match accrued_yield(&stake, &schedule, now) {
                        Ok(accrued) => batch.push(YieldTick {
                            key: *key,
                            accrued,
                            display: format_units(accrued),
                        }),
                        Err(err) => warn!("Ticker: yield of {} unavailable: {}", key, err),
                    }
                }
                if tx.send(batch).is_err() {
                    debug!("Ticker: no receivers left, stopping");
                    break;
                }
            }
        });
        Self { ticks, task }
    }

    /// Receiver of the latest recomputation.
    pub fn subscribe(&self) -> watch::Receiver<Vec<YieldTick>> {
        self.ticks.clone()
    }

    pub fn stop(self) {}
}

impl Drop for YieldTicker {
    fn drop(&mut self) {
        self.task.abort();
    }
}
