use chrono::{DateTime, Utc};
use pulsemon_common::types::MetricPoint;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::metric_data::{self, Column, Entity};
use crate::error::Result;
use crate::store::{new_id, MonitorStore};

/// 单次批量插入的最大行数，避开 SQLite 绑定参数上限
const INSERT_CHUNK: usize = 200;

/// 指标数据行（来自 metric_data 表）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRow {
    pub id: String,
    pub metric_key: String,
    pub value: f64,
    pub unit: String,
    pub tags: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

fn to_row(m: metric_data::Model) -> Result<MetricRow> {
    let tags = if m.tags_json.is_empty() {
        HashMap::new()
    } else {
        serde_json::from_str(&m.tags_json)?
    };
    Ok(MetricRow {
        id: m.id,
        metric_key: m.metric_key,
        value: m.value,
        unit: m.unit,
        tags,
        timestamp: m.timestamp.with_timezone(&Utc),
        created_at: m.created_at.with_timezone(&Utc),
    })
}

impl MonitorStore {
    /// 追加写入指标点；空切片直接返回。
    pub async fn insert_metrics(&self, points: &[MetricPoint]) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }
        let now = Utc::now().fixed_offset();
        for chunk in points.chunks(INSERT_CHUNK) {
            let mut models = Vec::with_capacity(chunk.len());
            for p in chunk {
                models.push(metric_data::ActiveModel {
                    id: Set(new_id()),
                    metric_key: Set(p.key.clone()),
                    value: Set(p.value),
                    unit: Set(p.unit.clone()),
                    tags_json: Set(serde_json::to_string(&p.tags)?),
                    timestamp: Set(p.timestamp.fixed_offset()),
                    created_at: Set(now),
                });
            }
            Entity::insert_many(models)
                .exec_without_returning(self.db())
                .await?;
        }
        Ok(points.len())
    }

    /// 区间查询（闭区间），按时间升序。
    pub async fn query_timeseries(
        &self,
        metric_key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<MetricRow>> {
        let rows = Entity::find()
            .filter(Column::MetricKey.eq(metric_key))
            .filter(Column::Timestamp.gte(from.fixed_offset()))
            .filter(Column::Timestamp.lte(to.fixed_offset()))
            .order_by(Column::Timestamp, Order::Asc)
            .limit(limit)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_row).collect()
    }

    pub async fn latest_metric(&self, metric_key: &str) -> Result<Option<MetricRow>> {
        let model = Entity::find()
            .filter(Column::MetricKey.eq(metric_key))
            .order_by(Column::Timestamp, Order::Desc)
            .one(self.db())
            .await?;
        model.map(to_row).transpose()
    }

    pub async fn purge_metrics_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let res = Entity::delete_many()
            .filter(Column::CreatedAt.lt(cutoff.fixed_offset()))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }
}
