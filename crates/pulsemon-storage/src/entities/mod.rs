pub mod alert_config;
pub mod alert_history;
pub mod ingestion_log;
pub mod metric_data;
pub mod provider_cache;
pub mod provider_config;
