use crate::api::{
    bad_request, deserialize_optional_u64, error_response, storage_error, success_response,
};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Duration, Utc};
use pulsemon_storage::{MetricRow, ProviderSnapshotRow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

const DEFAULT_WINDOW_HOURS: i64 = 1;
const DEFAULT_POINT_LIMIT: u64 = 1000;
const MAX_POINT_LIMIT: u64 = 10_000;

/// 指标数据点
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricPointResponse {
    pub id: String,
    pub metric_key: String,
    pub value: f64,
    pub unit: String,
    pub tags: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl From<MetricRow> for MetricPointResponse {
    fn from(r: MetricRow) -> Self {
        Self {
            id: r.id,
            metric_key: r.metric_key,
            value: r.value,
            unit: r.unit,
            tags: r.tags,
            timestamp: r.timestamp,
        }
    }
}

#[derive(Serialize, ToSchema)]
struct TimeseriesResponse {
    points: Vec<MetricPointResponse>,
}

/// Provider 最新快照
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub provider_id: String,
    /// Provider 原始数据
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProviderSnapshotRow> for SnapshotResponse {
    fn from(r: ProviderSnapshotRow) -> Self {
        Self {
            provider_id: r.provider_id,
            data: r.data,
            fetched_at: r.fetched_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct TimeseriesParams {
    /// 指标键（必填）
    key: Option<String>,
    /// 起始时间，RFC 3339（默认一小时前）
    from: Option<String>,
    /// 结束时间，RFC 3339（默认当前时间）
    to: Option<String>,
    /// 最多返回条数（默认 1000）
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    limit: Option<u64>,
}

fn parse_time(raw: Option<&str>, default: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| format!("Invalid date: '{s}'")),
    }
}

/// 按时间区间查询单个指标，按时间升序返回。
#[utoipa::path(
    get,
    path = "/metrics/timeseries",
    tag = "Metrics",
    params(TimeseriesParams),
    responses(
        (status = 200, description = "指标数据点", body = TimeseriesResponse),
        (status = 400, description = "缺少 key 或日期非法", body = crate::api::ApiError)
    )
)]
async fn timeseries(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<TimeseriesParams>,
) -> impl IntoResponse {
    let Some(key) = params.key.filter(|k| !k.trim().is_empty()) else {
        return bad_request(&trace_id, "Missing required parameter: key");
    };

    let now = Utc::now();
    let to = match parse_time(params.to.as_deref(), now) {
        Ok(t) => t,
        Err(msg) => return bad_request(&trace_id, &msg),
    };
    let from = match parse_time(
        params.from.as_deref(),
        now - Duration::hours(DEFAULT_WINDOW_HOURS),
    ) {
        Ok(t) => t,
        Err(msg) => return bad_request(&trace_id, &msg),
    };
    let limit = params
        .limit
        .unwrap_or(DEFAULT_POINT_LIMIT)
        .min(MAX_POINT_LIMIT);

    match state.store.query_timeseries(&key, from, to, limit).await {
        Ok(rows) => success_response(
            StatusCode::OK,
            &trace_id,
            TimeseriesResponse {
                points: rows.into_iter().map(Into::into).collect(),
            },
        ),
        Err(e) => storage_error(&trace_id, &e),
    }
}

/// 获取 Provider 最近一次成功采集的快照。
#[utoipa::path(
    get,
    path = "/metrics/{providerId}",
    tag = "Metrics",
    params(("providerId" = String, Path, description = "Provider ID，如 vercel / neon / axiom")),
    responses(
        (status = 200, description = "Provider 快照", body = SnapshotResponse),
        (status = 404, description = "尚无缓存快照", body = crate::api::ApiError)
    )
)]
async fn provider_snapshot(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_provider_snapshot(&provider_id).await {
        Ok(Some(row)) => success_response(StatusCode::OK, &trace_id, SnapshotResponse::from(row)),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "No cached data for provider",
        ),
        Err(e) => storage_error(&trace_id, &e),
    }
}

pub fn metric_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(timeseries))
        .routes(routes!(provider_snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_time_defaults_and_rejects_garbage() {
        let fallback = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_time(None, fallback).unwrap(), fallback);
        assert_eq!(parse_time(Some("  "), fallback).unwrap(), fallback);
        assert_eq!(
            parse_time(Some("2026-03-01T14:00:00+02:00"), fallback).unwrap(),
            fallback
        );
        assert!(parse_time(Some("yesterday"), fallback).is_err());
    }
}
