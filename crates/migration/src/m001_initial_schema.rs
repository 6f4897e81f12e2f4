use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // alert_history 依赖 alert_configs，按顺序建表
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

const UP_SQL: &str = "
CREATE TABLE IF NOT EXISTS metric_data (
    id TEXT PRIMARY KEY NOT NULL,
    metric_key TEXT NOT NULL,
    value REAL NOT NULL,
    unit TEXT NOT NULL,
    tags_json TEXT NOT NULL DEFAULT '{}',
    timestamp TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_metric_data_key_ts ON metric_data(metric_key, timestamp);
CREATE INDEX IF NOT EXISTS idx_metric_data_created_at ON metric_data(created_at);

CREATE TABLE IF NOT EXISTS provider_cache (
    provider_id TEXT PRIMARY KEY NOT NULL,
    data_json TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS provider_configs (
    provider_id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    interval_seconds INTEGER NOT NULL,
    last_fetch_at TEXT,
    last_success_at TEXT,
    consecutive_failures INTEGER NOT NULL DEFAULT 0,
    config_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS alert_configs (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    metric_key TEXT NOT NULL,
    condition TEXT NOT NULL,
    threshold REAL NOT NULL,
    consecutive_breaches INTEGER NOT NULL DEFAULT 1,
    cooldown_seconds INTEGER NOT NULL DEFAULT 300,
    slack_channel TEXT,
    enabled INTEGER NOT NULL DEFAULT 1,
    current_breach_count INTEGER NOT NULL DEFAULT 0,
    last_fired_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alert_configs_enabled ON alert_configs(enabled);

CREATE TABLE IF NOT EXISTS alert_history (
    id TEXT PRIMARY KEY NOT NULL,
    alert_config_id TEXT NOT NULL REFERENCES alert_configs(id) ON DELETE CASCADE,
    event_type TEXT NOT NULL,
    metric_key TEXT NOT NULL,
    metric_value REAL NOT NULL,
    threshold REAL NOT NULL,
    message TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alert_history_config ON alert_history(alert_config_id);
CREATE INDEX IF NOT EXISTS idx_alert_history_created_at ON alert_history(created_at);

CREATE TABLE IF NOT EXISTS ingestion_log (
    id TEXT PRIMARY KEY NOT NULL,
    provider_id TEXT,
    status TEXT NOT NULL,
    metrics_count INTEGER NOT NULL DEFAULT 0,
    duration_ms INTEGER NOT NULL DEFAULT 0,
    error TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ingestion_log_created_at ON ingestion_log(created_at);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS ingestion_log;
DROP TABLE IF EXISTS alert_history;
DROP TABLE IF EXISTS alert_configs;
DROP TABLE IF EXISTS provider_configs;
DROP TABLE IF EXISTS provider_cache;
DROP TABLE IF EXISTS metric_data;
";
