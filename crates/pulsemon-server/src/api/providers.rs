use crate::api::{deserialize_optional_u64, storage_error, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use pulsemon_storage::{IngestionLogRow, ProviderConfigRow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

const DEFAULT_LOG_LIMIT: u64 = 100;
const MAX_LOG_LIMIT: u64 = 1000;

/// Provider 状态：内存中的健康状态与持久化的调度信息
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatusResponse {
    pub id: String,
    pub name: String,
    /// healthy / degraded / error
    pub status: String,
    pub metric_keys: Vec<String>,
    /// 最小采集间隔（秒）
    pub min_interval_seconds: u64,
    /// 当前生效的采集间隔（秒），尚未采集过时为空
    pub interval_seconds: Option<i64>,
    pub enabled: Option<bool>,
    pub last_fetch_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: Option<i32>,
}

#[derive(Serialize, ToSchema)]
struct ProviderListResponse {
    providers: Vec<ProviderStatusResponse>,
}

/// 采集日志
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestionLogResponse {
    pub id: String,
    pub provider_id: Option<String>,
    /// success / error / skipped
    pub status: String,
    pub metrics_count: i64,
    pub duration_ms: i64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<IngestionLogRow> for IngestionLogResponse {
    fn from(r: IngestionLogRow) -> Self {
        Self {
            id: r.id,
            provider_id: r.provider_id,
            status: r.status.to_string(),
            metrics_count: r.metrics_count,
            duration_ms: r.duration_ms,
            error: r.error,
            created_at: r.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
struct IngestionLogListResponse {
    entries: Vec<IngestionLogResponse>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct LogParams {
    /// 返回条数（默认 100）
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    limit: Option<u64>,
}

/// 列出已注册的 Provider 及其调度状态，按注册顺序。
#[utoipa::path(
    get,
    path = "/providers",
    tag = "Providers",
    responses(
        (status = 200, description = "Provider 列表", body = ProviderListResponse),
        (status = 500, description = "数据库错误", body = crate::api::ApiError)
    )
)]
async fn list_providers(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let configs: HashMap<String, ProviderConfigRow> = match state.store.list_provider_configs().await
    {
        Ok(rows) => rows
            .into_iter()
            .map(|r| (r.provider_id.clone(), r))
            .collect(),
        Err(e) => return storage_error(&trace_id, &e),
    };

    let providers = state
        .registry
        .get_all()
        .iter()
        .map(|p| {
            let config = configs.get(p.id());
            ProviderStatusResponse {
                id: p.id().to_string(),
                name: p.name().to_string(),
                status: p.status().to_string(),
                metric_keys: p.metric_keys().iter().map(|k| k.to_string()).collect(),
                min_interval_seconds: p.min_interval_secs(),
                interval_seconds: config.map(|c| c.interval_seconds),
                enabled: config.map(|c| c.enabled),
                last_fetch_at: config.and_then(|c| c.last_fetch_at),
                last_success_at: config.and_then(|c| c.last_success_at),
                consecutive_failures: config.map(|c| c.consecutive_failures),
            }
        })
        .collect();

    success_response(StatusCode::OK, &trace_id, ProviderListResponse { providers })
}

/// 最近的采集日志，按时间倒序。
#[utoipa::path(
    get,
    path = "/ingestion-log",
    tag = "Providers",
    params(LogParams),
    responses(
        (status = 200, description = "采集日志", body = IngestionLogListResponse)
    )
)]
async fn ingestion_log(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<LogParams>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LOG_LIMIT);
    match state.store.list_ingestion_log(limit).await {
        Ok(rows) => success_response(
            StatusCode::OK,
            &trace_id,
            IngestionLogListResponse {
                entries: rows.into_iter().map(Into::into).collect(),
            },
        ),
        Err(e) => storage_error(&trace_id, &e),
    }
}

pub fn provider_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_providers))
        .routes(routes!(ingestion_log))
}
