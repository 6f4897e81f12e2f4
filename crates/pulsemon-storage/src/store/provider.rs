use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::entities::{provider_cache, provider_config};
use crate::error::Result;
use crate::store::MonitorStore;

/// Provider 最新快照（来自 provider_cache 表）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSnapshotRow {
    pub provider_id: String,
    pub data: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Provider 调度配置（来自 provider_configs 表）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfigRow {
    pub provider_id: String,
    pub name: String,
    pub enabled: bool,
    pub interval_seconds: i64,
    pub last_fetch_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: i32,
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn to_snapshot_row(m: provider_cache::Model) -> Result<ProviderSnapshotRow> {
    Ok(ProviderSnapshotRow {
        provider_id: m.provider_id,
        data: serde_json::from_str(&m.data_json)?,
        fetched_at: m.fetched_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

fn to_config_row(m: provider_config::Model) -> Result<ProviderConfigRow> {
    let config = if m.config_json.is_empty() {
        serde_json::Value::Object(Default::default())
    } else {
        serde_json::from_str(&m.config_json)?
    };
    Ok(ProviderConfigRow {
        provider_id: m.provider_id,
        name: m.name,
        enabled: m.enabled,
        interval_seconds: m.interval_seconds,
        last_fetch_at: m.last_fetch_at.map(|t| t.with_timezone(&Utc)),
        last_success_at: m.last_success_at.map(|t| t.with_timezone(&Utc)),
        consecutive_failures: m.consecutive_failures,
        config,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

impl MonitorStore {
    // ---- Provider Cache ----

    /// 覆盖写入快照（last write wins）。
    pub async fn upsert_provider_snapshot(
        &self,
        provider_id: &str,
        data: &serde_json::Value,
        fetched_at: DateTime<Utc>,
    ) -> Result<()> {
        let now = Utc::now().fixed_offset();
        let am = provider_cache::ActiveModel {
            provider_id: Set(provider_id.to_string()),
            data_json: Set(serde_json::to_string(data)?),
            fetched_at: Set(fetched_at.fixed_offset()),
            updated_at: Set(now),
        };
        provider_cache::Entity::insert(am)
            .on_conflict(
                OnConflict::column(provider_cache::Column::ProviderId)
                    .update_columns([
                        provider_cache::Column::DataJson,
                        provider_cache::Column::FetchedAt,
                        provider_cache::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db())
            .await?;
        Ok(())
    }

    pub async fn get_provider_snapshot(
        &self,
        provider_id: &str,
    ) -> Result<Option<ProviderSnapshotRow>> {
        let model = provider_cache::Entity::find_by_id(provider_id)
            .one(self.db())
            .await?;
        model.map(to_snapshot_row).transpose()
    }

    // ---- Provider Configs ----

    /// 确保配置行存在；已存在时只刷新名称与间隔，不动抓取状态。
    pub async fn upsert_provider_config(
        &self,
        provider_id: &str,
        name: &str,
        interval_seconds: i64,
    ) -> Result<()> {
        let now = Utc::now().fixed_offset();
        let am = provider_config::ActiveModel {
            provider_id: Set(provider_id.to_string()),
            name: Set(name.to_string()),
            enabled: Set(true),
            interval_seconds: Set(interval_seconds),
            last_fetch_at: Set(None),
            last_success_at: Set(None),
            consecutive_failures: Set(0),
            config_json: Set("{}".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        provider_config::Entity::insert(am)
            .on_conflict(
                OnConflict::column(provider_config::Column::ProviderId)
                    .update_columns([
                        provider_config::Column::Name,
                        provider_config::Column::IntervalSeconds,
                        provider_config::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db())
            .await?;
        Ok(())
    }

    pub async fn get_provider_config(&self, provider_id: &str) -> Result<Option<ProviderConfigRow>> {
        let model = provider_config::Entity::find_by_id(provider_id)
            .one(self.db())
            .await?;
        model.map(to_config_row).transpose()
    }

    pub async fn list_provider_configs(&self) -> Result<Vec<ProviderConfigRow>> {
        let rows = provider_config::Entity::find()
            .order_by(provider_config::Column::ProviderId, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_config_row).collect()
    }

    /// 记录一次抓取结果。
    ///
    /// 成功：`last_fetch_at = last_success_at = now`，失败计数清零。
    /// 失败：只更新 `last_fetch_at`，失败计数在 SQL 中自增。
    pub async fn update_provider_fetch_status(
        &self,
        provider_id: &str,
        success: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let now = now.fixed_offset();
        let mut update = provider_config::Entity::update_many()
            .col_expr(provider_config::Column::LastFetchAt, Expr::value(now))
            .col_expr(provider_config::Column::UpdatedAt, Expr::value(now));
        update = if success {
            update
                .col_expr(provider_config::Column::LastSuccessAt, Expr::value(now))
                .col_expr(provider_config::Column::ConsecutiveFailures, Expr::value(0))
        } else {
            update.col_expr(
                provider_config::Column::ConsecutiveFailures,
                Expr::col(provider_config::Column::ConsecutiveFailures).add(1),
            )
        };
        update
            .filter(provider_config::Column::ProviderId.eq(provider_id))
            .exec(self.db())
            .await?;
        Ok(())
    }
}
