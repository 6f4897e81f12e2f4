use chrono::{DateTime, Utc};
use pulsemon_alert::EvaluationSummary;
use pulsemon_common::types::ExecutionResult;
use pulsemon_storage::MonitorStore;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::alerting::AlertEvaluator;
use crate::config::RetentionConfig;
use crate::ingest::ProviderRegistry;
use crate::retention::{self, RetentionReport};

#[derive(Debug, Clone, Serialize)]
pub struct IngestCycleReport {
    pub results: Vec<ExecutionResult>,
    pub alerts: EvaluationSummary,
}

/// Runs ingestion, alert evaluation and retention.
///
/// Every entry point takes the same guard, so the scheduler, the cron
/// routes and the CLI never run two cycles at once.
pub struct MonitorCycle {
    registry: Arc<ProviderRegistry>,
    evaluator: AlertEvaluator,
    store: Arc<MonitorStore>,
    retention: RetentionConfig,
    guard: Mutex<()>,
}

impl MonitorCycle {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        evaluator: AlertEvaluator,
        store: Arc<MonitorStore>,
        retention: RetentionConfig,
    ) -> Self {
        Self {
            registry,
            evaluator,
            store,
            retention,
            guard: Mutex::new(()),
        }
    }

    pub async fn run_ingest(&self) -> IngestCycleReport {
        self.run_ingest_at(Utc::now()).await
    }

    /// `execute_all` followed by `evaluate_alerts`.
    pub async fn run_ingest_at(&self, now: DateTime<Utc>) -> IngestCycleReport {
        let _guard = self.guard.lock().await;
        let results = self.registry.execute_all_at(now).await;
        let alerts = self.evaluator.evaluate_at(now).await;
        IngestCycleReport { results, alerts }
    }

    pub async fn run_retention(&self) -> pulsemon_storage::Result<RetentionReport> {
        self.run_retention_at(Utc::now()).await
    }

    pub async fn run_retention_at(
        &self,
        now: DateTime<Utc>,
    ) -> pulsemon_storage::Result<RetentionReport> {
        let _guard = self.guard.lock().await;
        retention::run_retention_at(&self.store, &self.retention, now).await
    }
}
