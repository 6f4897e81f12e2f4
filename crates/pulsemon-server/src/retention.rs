use chrono::{DateTime, Duration, Utc};
use pulsemon_storage::MonitorStore;
use serde::Serialize;

use crate::config::RetentionConfig;

/// Rows removed by one retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionReport {
    pub metrics_removed: u64,
    pub ingestion_logs_removed: u64,
    pub alert_history_removed: u64,
}

/// Deletes rows whose `created_at` is older than the configured age for
/// each table. The three purges run concurrently.
pub async fn run_retention_at(
    store: &MonitorStore,
    config: &RetentionConfig,
    now: DateTime<Utc>,
) -> pulsemon_storage::Result<RetentionReport> {
    let metric_cutoff = now - Duration::days(i64::from(config.metric_days));
    let ingestion_cutoff = now - Duration::days(i64::from(config.ingestion_log_days));
    let history_cutoff = now - Duration::days(i64::from(config.alert_history_days));

    let (metrics, ingestion, history) = tokio::join!(
        store.purge_metrics_before(metric_cutoff),
        store.purge_ingestion_log_before(ingestion_cutoff),
        store.purge_alert_history_before(history_cutoff),
    );

    let report = RetentionReport {
        metrics_removed: metrics?,
        ingestion_logs_removed: ingestion?,
        alert_history_removed: history?,
    };
    tracing::info!(
        metrics_removed = report.metrics_removed,
        ingestion_logs_removed = report.ingestion_logs_removed,
        alert_history_removed = report.alert_history_removed,
        "Retention sweep completed"
    );
    Ok(report)
}
