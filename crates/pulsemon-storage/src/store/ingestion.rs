use chrono::{DateTime, Utc};
use pulsemon_common::types::IngestionStatus;
use sea_orm::{ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};

use crate::entities::ingestion_log::{self, Column, Entity};
use crate::error::{Result, StorageError};
use crate::store::{new_id, MonitorStore};

/// 采集日志（来自 ingestion_log 表）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionLogRow {
    pub id: String,
    pub provider_id: Option<String>,
    pub status: IngestionStatus,
    pub metrics_count: i64,
    pub duration_ms: i64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewIngestionLog {
    pub provider_id: Option<String>,
    pub status: IngestionStatus,
    pub metrics_count: i64,
    pub duration_ms: i64,
    pub error: Option<String>,
}

fn to_row(m: ingestion_log::Model) -> Result<IngestionLogRow> {
    let status = m
        .status
        .parse::<IngestionStatus>()
        .map_err(|_| StorageError::InvalidValue {
            column: "status",
            value: m.status.clone(),
        })?;
    Ok(IngestionLogRow {
        id: m.id,
        provider_id: m.provider_id,
        status,
        metrics_count: m.metrics_count,
        duration_ms: m.duration_ms,
        error: m.error,
        created_at: m.created_at.with_timezone(&Utc),
    })
}

impl MonitorStore {
    pub async fn log_ingestion(&self, entry: &NewIngestionLog) -> Result<()> {
        let am = ingestion_log::ActiveModel {
            id: Set(new_id()),
            provider_id: Set(entry.provider_id.clone()),
            status: Set(entry.status.as_str().to_string()),
            metrics_count: Set(entry.metrics_count),
            duration_ms: Set(entry.duration_ms),
            error: Set(entry.error.clone()),
            created_at: Set(Utc::now().fixed_offset()),
        };
        Entity::insert(am).exec_without_returning(self.db()).await?;
        Ok(())
    }

    pub async fn list_ingestion_log(&self, limit: u64) -> Result<Vec<IngestionLogRow>> {
        let rows = Entity::find()
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_row).collect()
    }

    pub async fn purge_ingestion_log_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let res = Entity::delete_many()
            .filter(Column::CreatedAt.lt(cutoff.fixed_offset()))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }
}
