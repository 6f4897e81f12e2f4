use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::cycle::MonitorCycle;

/// In-process replacement for an external cron calling `/cron/*`.
pub struct MonitorScheduler {
    cycle: Arc<MonitorCycle>,
    ingest_tick_secs: u64,
    retention_tick_secs: u64,
}

impl MonitorScheduler {
    pub fn new(cycle: Arc<MonitorCycle>, ingest_tick_secs: u64, retention_tick_secs: u64) -> Self {
        Self {
            cycle,
            ingest_tick_secs,
            retention_tick_secs,
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            ingest_tick_secs = self.ingest_tick_secs,
            retention_tick_secs = self.retention_tick_secs,
            "Monitor scheduler started"
        );

        let mut ingest_tick = interval(Duration::from_secs(self.ingest_tick_secs.max(1)));
        let mut retention_tick = interval(Duration::from_secs(self.retention_tick_secs.max(1)));
        ingest_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        retention_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ingest_tick.tick() => {
                    let report = self.cycle.run_ingest().await;
                    tracing::debug!(providers = report.results.len(), "Scheduled ingest cycle finished");
                }
                _ = retention_tick.tick() => {
                    if let Err(e) = self.cycle.run_retention().await {
                        tracing::error!(error = %e, "Scheduled retention sweep failed");
                    }
                }
            }
        }
    }
}
