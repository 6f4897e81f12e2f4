use crate::api::{storage_error, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use pulsemon_alert::EvaluationSummary;
use pulsemon_common::types::ExecutionResult;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 单个 Provider 的采集结果
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResultResponse {
    /// Provider ID
    pub provider_id: String,
    /// success / error / skipped
    pub status: String,
    /// 写入的指标点数量
    pub metrics_count: usize,
    /// 耗时（毫秒）
    pub duration_ms: u64,
}

impl From<ExecutionResult> for ExecutionResultResponse {
    fn from(r: ExecutionResult) -> Self {
        Self {
            provider_id: r.provider_id,
            status: r.status.to_string(),
            metrics_count: r.metrics_count,
            duration_ms: r.duration_ms,
        }
    }
}

/// 告警评估统计
#[derive(Serialize, ToSchema)]
pub struct AlertSummaryResponse {
    pub evaluated: usize,
    pub skipped: usize,
    pub fired: usize,
    pub resolved: usize,
}

impl From<EvaluationSummary> for AlertSummaryResponse {
    fn from(s: EvaluationSummary) -> Self {
        Self {
            evaluated: s.evaluated,
            skipped: s.skipped,
            fired: s.fired,
            resolved: s.resolved,
        }
    }
}

/// 一次采集周期的结果
#[derive(Serialize, ToSchema)]
struct IngestResponse {
    results: Vec<ExecutionResultResponse>,
    alerts: AlertSummaryResponse,
}

/// 数据清理结果
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct RetentionResponse {
    success: bool,
    metrics_removed: u64,
    ingestion_logs_removed: u64,
    alert_history_removed: u64,
}

/// 执行一次全量采集，然后评估全部告警规则。
/// 配置 `cron_secret` 时需要 `Authorization: Bearer {cron_secret}`。
#[utoipa::path(
    get,
    path = "/cron/ingest",
    tag = "Cron",
    security(("cron_auth" = [])),
    responses(
        (status = 200, description = "各 Provider 采集结果", body = IngestResponse),
        (status = 401, description = "未认证", body = crate::api::ApiError)
    )
)]
async fn cron_ingest(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let report = state.cycle.run_ingest().await;
    success_response(
        StatusCode::OK,
        &trace_id,
        IngestResponse {
            results: report.results.into_iter().map(Into::into).collect(),
            alerts: report.alerts.into(),
        },
    )
}

/// 按保留期限清理过期的指标、采集日志与告警历史。
#[utoipa::path(
    get,
    path = "/cron/retention",
    tag = "Cron",
    security(("cron_auth" = [])),
    responses(
        (status = 200, description = "清理完成", body = RetentionResponse),
        (status = 401, description = "未认证", body = crate::api::ApiError),
        (status = 500, description = "数据库错误", body = crate::api::ApiError)
    )
)]
async fn cron_retention(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.cycle.run_retention().await {
        Ok(report) => success_response(
            StatusCode::OK,
            &trace_id,
            RetentionResponse {
                success: true,
                metrics_removed: report.metrics_removed,
                ingestion_logs_removed: report.ingestion_logs_removed,
                alert_history_removed: report.alert_history_removed,
            },
        ),
        Err(e) => storage_error(&trace_id, &e),
    }
}

pub fn cron_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(cron_ingest))
        .routes(routes!(cron_retention))
}
