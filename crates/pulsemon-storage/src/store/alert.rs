use chrono::{DateTime, Utc};
use pulsemon_common::types::AlertEventType;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, Order,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::entities::alert_config::{self, Column, Entity};
use crate::entities::alert_history;
use crate::error::{Result, StorageError};
use crate::store::{new_id, MonitorStore};

pub const DEFAULT_CONSECUTIVE_BREACHES: i32 = 1;
pub const DEFAULT_COOLDOWN_SECONDS: i64 = 300;

/// 告警规则数据行（来自 alert_configs 表）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfigRow {
    pub id: String,
    pub name: String,
    pub metric_key: String,
    pub condition: String,
    pub threshold: f64,
    pub consecutive_breaches: i32,
    pub cooldown_seconds: i64,
    pub slack_channel: Option<String>,
    pub enabled: bool,
    pub current_breach_count: i32,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 新建告警规则
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAlertConfig {
    pub name: String,
    pub metric_key: String,
    pub condition: String,
    pub threshold: f64,
    pub consecutive_breaches: Option<i32>,
    pub cooldown_seconds: Option<i64>,
    pub slack_channel: Option<String>,
    pub enabled: Option<bool>,
}

/// 告警规则部分更新；`None` 表示保持原值。
///
/// `slack_channel` 为 `Some(None)` 时清空频道。
#[derive(Debug, Clone, Default)]
pub struct AlertConfigUpdate {
    pub name: Option<String>,
    pub metric_key: Option<String>,
    pub condition: Option<String>,
    pub threshold: Option<f64>,
    pub consecutive_breaches: Option<i32>,
    pub cooldown_seconds: Option<i64>,
    pub slack_channel: Option<Option<String>>,
    pub enabled: Option<bool>,
}

/// 告警事件（来自 alert_history 表）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEventRow {
    pub id: String,
    pub alert_config_id: String,
    pub event_type: AlertEventType,
    pub metric_key: String,
    pub metric_value: f64,
    pub threshold: f64,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAlertEvent {
    pub alert_config_id: String,
    pub event_type: AlertEventType,
    pub metric_key: String,
    pub metric_value: f64,
    pub threshold: f64,
    pub message: Option<String>,
}

fn to_row(m: alert_config::Model) -> AlertConfigRow {
    AlertConfigRow {
        id: m.id,
        name: m.name,
        metric_key: m.metric_key,
        condition: m.condition,
        threshold: m.threshold,
        consecutive_breaches: m.consecutive_breaches,
        cooldown_seconds: m.cooldown_seconds,
        slack_channel: m.slack_channel,
        enabled: m.enabled,
        current_breach_count: m.current_breach_count,
        last_fired_at: m.last_fired_at.map(|t| t.with_timezone(&Utc)),
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

fn to_event_row(m: alert_history::Model) -> Result<AlertEventRow> {
    let event_type = m
        .event_type
        .parse::<AlertEventType>()
        .map_err(|_| StorageError::InvalidValue {
            column: "event_type",
            value: m.event_type.clone(),
        })?;
    Ok(AlertEventRow {
        id: m.id,
        alert_config_id: m.alert_config_id,
        event_type,
        metric_key: m.metric_key,
        metric_value: m.metric_value,
        threshold: m.threshold,
        message: m.message,
        created_at: m.created_at.with_timezone(&Utc),
    })
}

async fn insert_event<C: ConnectionTrait>(
    db: &C,
    event: &NewAlertEvent,
    created_at: DateTime<Utc>,
) -> Result<()> {
    let am = alert_history::ActiveModel {
        id: Set(new_id()),
        alert_config_id: Set(event.alert_config_id.clone()),
        event_type: Set(event.event_type.as_str().to_string()),
        metric_key: Set(event.metric_key.clone()),
        metric_value: Set(event.metric_value),
        threshold: Set(event.threshold),
        message: Set(event.message.clone()),
        created_at: Set(created_at.fixed_offset()),
    };
    alert_history::Entity::insert(am)
        .exec_without_returning(db)
        .await?;
    Ok(())
}

impl MonitorStore {
    // ---- Alert Configs ----

    pub async fn create_alert_config(&self, new: &NewAlertConfig) -> Result<AlertConfigRow> {
        let now = Utc::now().fixed_offset();
        let am = alert_config::ActiveModel {
            id: Set(new_id()),
            name: Set(new.name.clone()),
            metric_key: Set(new.metric_key.clone()),
            condition: Set(new.condition.clone()),
            threshold: Set(new.threshold),
            consecutive_breaches: Set(new
                .consecutive_breaches
                .unwrap_or(DEFAULT_CONSECUTIVE_BREACHES)),
            cooldown_seconds: Set(new.cooldown_seconds.unwrap_or(DEFAULT_COOLDOWN_SECONDS)),
            slack_channel: Set(new.slack_channel.clone()),
            enabled: Set(new.enabled.unwrap_or(true)),
            current_breach_count: Set(0),
            last_fired_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    pub async fn get_alert_config(&self, id: &str) -> Result<Option<AlertConfigRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_row))
    }

    /// 全部规则，按创建时间倒序。
    pub async fn list_alert_configs(&self) -> Result<Vec<AlertConfigRow>> {
        let rows = Entity::find()
            .order_by(Column::CreatedAt, Order::Desc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn list_enabled_alert_configs(&self) -> Result<Vec<AlertConfigRow>> {
        let rows = Entity::find()
            .filter(Column::Enabled.eq(true))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn find_alert_config_by_name(&self, name: &str) -> Result<Option<AlertConfigRow>> {
        let model = Entity::find()
            .filter(Column::Name.eq(name))
            .one(self.db())
            .await?;
        Ok(model.map(to_row))
    }

    /// 部分更新，返回规则是否存在。
    pub async fn update_alert_config(&self, id: &str, update: &AlertConfigUpdate) -> Result<bool> {
        let Some(model) = Entity::find_by_id(id).one(self.db()).await? else {
            return Ok(false);
        };
        let mut am: alert_config::ActiveModel = model.into();
        if let Some(name) = &update.name {
            am.name = Set(name.clone());
        }
        if let Some(metric_key) = &update.metric_key {
            am.metric_key = Set(metric_key.clone());
        }
        if let Some(condition) = &update.condition {
            am.condition = Set(condition.clone());
        }
        if let Some(threshold) = update.threshold {
            am.threshold = Set(threshold);
        }
        if let Some(breaches) = update.consecutive_breaches {
            am.consecutive_breaches = Set(breaches);
        }
        if let Some(cooldown) = update.cooldown_seconds {
            am.cooldown_seconds = Set(cooldown);
        }
        if let Some(channel) = &update.slack_channel {
            am.slack_channel = Set(channel.clone());
        }
        if let Some(enabled) = update.enabled {
            am.enabled = Set(enabled);
        }
        am.updated_at = Set(Utc::now().fixed_offset());
        am.update(self.db()).await?;
        Ok(true)
    }

    /// 删除规则及其历史事件。
    pub async fn delete_alert_config(&self, id: &str) -> Result<bool> {
        let txn = self.db().begin().await?;
        alert_history::Entity::delete_many()
            .filter(alert_history::Column::AlertConfigId.eq(id))
            .exec(&txn)
            .await?;
        let res = Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;
        Ok(res.rows_affected > 0)
    }

    // ---- Evaluation state ----

    pub async fn set_breach_count(&self, id: &str, count: i32) -> Result<()> {
        Entity::update_many()
            .col_expr(Column::CurrentBreachCount, Expr::value(count))
            .filter(Column::Id.eq(id))
            .exec(self.db())
            .await?;
        Ok(())
    }

    /// 触发：写入计数、`last_fired_at` 与 fired 事件，同一事务。
    pub async fn record_alert_fired(
        &self,
        id: &str,
        breach_count: i32,
        event: &NewAlertEvent,
        fired_at: DateTime<Utc>,
    ) -> Result<()> {
        let txn = self.db().begin().await?;
        Entity::update_many()
            .col_expr(Column::CurrentBreachCount, Expr::value(breach_count))
            .col_expr(Column::LastFiredAt, Expr::value(fired_at.fixed_offset()))
            .filter(Column::Id.eq(id))
            .exec(&txn)
            .await?;
        insert_event(&txn, event, fired_at).await?;
        txn.commit().await?;
        Ok(())
    }

    /// 恢复：计数清零并写入 resolved 事件，同一事务。
    pub async fn record_alert_resolved(
        &self,
        id: &str,
        event: &NewAlertEvent,
        resolved_at: DateTime<Utc>,
    ) -> Result<()> {
        let txn = self.db().begin().await?;
        Entity::update_many()
            .col_expr(Column::CurrentBreachCount, Expr::value(0))
            .filter(Column::Id.eq(id))
            .exec(&txn)
            .await?;
        insert_event(&txn, event, resolved_at).await?;
        txn.commit().await?;
        Ok(())
    }

    // ---- Alert History ----

    /// 最近的告警事件，按时间倒序。
    pub async fn list_alert_history(&self, limit: u64) -> Result<Vec<AlertEventRow>> {
        let rows = alert_history::Entity::find()
            .order_by(alert_history::Column::CreatedAt, Order::Desc)
            .limit(limit)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_event_row).collect()
    }

    pub async fn purge_alert_history_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let res = alert_history::Entity::delete_many()
            .filter(alert_history::Column::CreatedAt.lt(cutoff.fixed_offset()))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }
}
