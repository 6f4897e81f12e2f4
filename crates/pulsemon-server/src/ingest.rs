use chrono::{DateTime, Duration, Utc};
use futures::FutureExt;
use pulsemon_common::types::{ExecutionResult, IngestionStatus};
use pulsemon_providers::MonitoringProvider;
use pulsemon_storage::{MonitorStore, NewIngestionLog};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

const NULL_RESULT_ERROR: &str = "Provider returned null";

/// Owns the registered providers and runs one ingestion pass over them.
pub struct ProviderRegistry {
    store: Arc<MonitorStore>,
    providers: Vec<Arc<dyn MonitoringProvider>>,
}

impl ProviderRegistry {
    pub fn new(store: Arc<MonitorStore>) -> Self {
        Self {
            store,
            providers: Vec::new(),
        }
    }

    /// Adds `provider`, replacing any earlier provider with the same id.
    pub fn register(&mut self, provider: Arc<dyn MonitoringProvider>) {
        match self.providers.iter_mut().find(|p| p.id() == provider.id()) {
            Some(slot) => *slot = provider,
            None => self.providers.push(provider),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn MonitoringProvider>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    /// Providers in registration order.
    pub fn get_all(&self) -> &[Arc<dyn MonitoringProvider>] {
        &self.providers
    }

    pub async fn execute_all(&self) -> Vec<ExecutionResult> {
        self.execute_all_at(Utc::now()).await
    }

    /// Runs every provider concurrently, each in its own task. A failure in
    /// one provider is reported in its result and never aborts the others.
    pub async fn execute_all_at(&self, now: DateTime<Utc>) -> Vec<ExecutionResult> {
        let handles: Vec<_> = self
            .providers
            .iter()
            .map(|provider| {
                let store = self.store.clone();
                let provider = provider.clone();
                let started = Instant::now();
                let provider_id = provider.id().to_string();
                let handle = tokio::spawn(async move {
                    execute_one(&store, provider.as_ref(), now).await
                });
                (provider_id, started, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (provider_id, started, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(provider_id = %provider_id, error = %e, "Provider task failed");
                    error_result(&provider_id, started)
                }
            };
            results.push(result);
        }
        results
    }
}

async fn execute_one(
    store: &MonitorStore,
    provider: &dyn MonitoringProvider,
    now: DateTime<Utc>,
) -> ExecutionResult {
    let started = Instant::now();
    match try_execute_one(store, provider, now, started).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(
                provider_id = %provider.id(),
                error = %e,
                "Provider ingestion failed on storage"
            );
            error_result(provider.id(), started)
        }
    }
}

async fn try_execute_one(
    store: &MonitorStore,
    provider: &dyn MonitoringProvider,
    now: DateTime<Utc>,
    started: Instant,
) -> pulsemon_storage::Result<ExecutionResult> {
    let provider_id = provider.id();
    let min_interval = provider.min_interval_secs() as i64;

    store
        .upsert_provider_config(provider_id, provider.name(), min_interval)
        .await?;

    if let Some(config) = store.get_provider_config(provider_id).await? {
        if let Some(last_fetch_at) = config.last_fetch_at {
            let interval = if config.interval_seconds > 0 {
                config.interval_seconds
            } else {
                min_interval
            };
            if now - last_fetch_at < Duration::seconds(interval) {
                let duration_ms = elapsed_ms(started);
                store
                    .log_ingestion(&NewIngestionLog {
                        provider_id: Some(provider_id.to_string()),
                        status: IngestionStatus::Skipped,
                        metrics_count: 0,
                        duration_ms: duration_ms as i64,
                        error: None,
                    })
                    .await?;
                tracing::debug!(provider_id, interval, "Provider interval not elapsed, skipped");
                return Ok(ExecutionResult {
                    provider_id: provider_id.to_string(),
                    status: IngestionStatus::Skipped,
                    metrics_count: 0,
                    duration_ms,
                });
            }
        }
    }

    // fetch() already absorbs upstream errors; a panic is treated the same way.
    let fetched = match AssertUnwindSafe(provider.fetch()).catch_unwind().await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(provider_id, "Provider fetch panicked");
            None
        }
    };

    let Some(result) = fetched else {
        let duration_ms = elapsed_ms(started);
        store
            .update_provider_fetch_status(provider_id, false, now)
            .await?;
        store
            .log_ingestion(&NewIngestionLog {
                provider_id: Some(provider_id.to_string()),
                status: IngestionStatus::Error,
                metrics_count: 0,
                duration_ms: duration_ms as i64,
                error: Some(NULL_RESULT_ERROR.to_string()),
            })
            .await?;
        return Ok(ExecutionResult {
            provider_id: provider_id.to_string(),
            status: IngestionStatus::Error,
            metrics_count: 0,
            duration_ms,
        });
    };

    let duration_ms = elapsed_ms(started);
    let snapshot = &result.snapshot;
    store
        .upsert_provider_snapshot(&snapshot.provider_id, &snapshot.data, snapshot.fetched_at)
        .await?;
    let metrics_count = store.insert_metrics(&result.metrics).await?;
    store
        .update_provider_fetch_status(provider_id, true, now)
        .await?;
    store
        .log_ingestion(&NewIngestionLog {
            provider_id: Some(provider_id.to_string()),
            status: IngestionStatus::Success,
            metrics_count: metrics_count as i64,
            duration_ms: duration_ms as i64,
            error: None,
        })
        .await?;

    tracing::info!(
        provider_id,
        metrics = metrics_count,
        duration_ms,
        "Provider ingestion succeeded"
    );
    Ok(ExecutionResult {
        provider_id: provider_id.to_string(),
        status: IngestionStatus::Success,
        metrics_count,
        duration_ms,
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn error_result(provider_id: &str, started: Instant) -> ExecutionResult {
    ExecutionResult {
        provider_id: provider_id.to_string(),
        status: IngestionStatus::Error,
        metrics_count: 0,
        duration_ms: elapsed_ms(started),
    }
}
