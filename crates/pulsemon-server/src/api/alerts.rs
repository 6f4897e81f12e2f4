use crate::api::{
    bad_request, deserialize_optional_u64, error_response, storage_error, success_response,
};
use crate::logging::TraceId;
use crate::rule_seed::{check_cooldown, validate_rule};
use crate::state::AppState;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use pulsemon_alert::AlertCondition;
use pulsemon_storage::{AlertConfigRow, AlertConfigUpdate, AlertEventRow, NewAlertConfig};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

const DEFAULT_HISTORY_LIMIT: u64 = 100;
const MAX_HISTORY_LIMIT: u64 = 1000;

/// 告警规则
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlertConfigResponse {
    pub id: String,
    pub name: String,
    /// 监控的指标键，如 `axiom.latency.p95`
    pub metric_key: String,
    /// gt / lt / gte / lte / eq
    pub condition: String,
    pub threshold: f64,
    /// 连续越界多少次后触发
    pub consecutive_breaches: i32,
    /// 两次触发之间的最小间隔（秒）
    pub cooldown_seconds: i64,
    pub slack_channel: Option<String>,
    pub enabled: bool,
    /// 当前连续越界次数
    pub current_breach_count: i32,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AlertConfigRow> for AlertConfigResponse {
    fn from(r: AlertConfigRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            metric_key: r.metric_key,
            condition: r.condition,
            threshold: r.threshold,
            consecutive_breaches: r.consecutive_breaches,
            cooldown_seconds: r.cooldown_seconds,
            slack_channel: r.slack_channel,
            enabled: r.enabled,
            current_breach_count: r.current_breach_count,
            last_fired_at: r.last_fired_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// 告警事件
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlertEventResponse {
    pub id: String,
    pub alert_config_id: String,
    /// fired / resolved
    pub event_type: String,
    pub metric_key: String,
    pub metric_value: f64,
    pub threshold: f64,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AlertEventRow> for AlertEventResponse {
    fn from(r: AlertEventRow) -> Self {
        Self {
            id: r.id,
            alert_config_id: r.alert_config_id,
            event_type: r.event_type.to_string(),
            metric_key: r.metric_key,
            metric_value: r.metric_value,
            threshold: r.threshold,
            message: r.message,
            created_at: r.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
struct AlertConfigListResponse {
    configs: Vec<AlertConfigResponse>,
}

#[derive(Serialize, ToSchema)]
struct AlertConfigCreatedResponse {
    config: AlertConfigResponse,
}

#[derive(Serialize, ToSchema)]
struct AlertEventListResponse {
    events: Vec<AlertEventResponse>,
}

#[derive(Serialize, ToSchema)]
struct SuccessResponse {
    success: bool,
}

/// 创建告警规则请求。`name`、`metricKey`、`condition`、`threshold` 必填。
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct CreateAlertRequest {
    name: Option<String>,
    metric_key: Option<String>,
    condition: Option<String>,
    threshold: Option<f64>,
    /// 默认 1
    consecutive_breaches: Option<i32>,
    /// 默认 300
    cooldown_seconds: Option<i64>,
    slack_channel: Option<String>,
    /// 默认 true
    enabled: Option<bool>,
}

/// 部分更新告警规则请求，`id` 必填；`slackChannel: null` 清空频道。
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct UpdateAlertRequest {
    id: Option<String>,
    name: Option<String>,
    metric_key: Option<String>,
    condition: Option<String>,
    threshold: Option<f64>,
    consecutive_breaches: Option<i32>,
    cooldown_seconds: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_present")]
    #[schema(value_type = Option<String>)]
    slack_channel: Option<Option<String>>,
    enabled: Option<bool>,
}

/// Distinguishes an explicit `null` from an absent field.
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct DeleteAlertParams {
    /// 告警规则 ID
    id: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct HistoryParams {
    /// 返回条数（默认 100）
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    limit: Option<u64>,
}

/// 列出全部告警规则。
#[utoipa::path(
    get,
    path = "/alerts",
    tag = "Alerts",
    responses(
        (status = 200, description = "告警规则列表", body = AlertConfigListResponse),
        (status = 500, description = "数据库错误", body = crate::api::ApiError)
    )
)]
async fn list_alerts(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.store.list_alert_configs().await {
        Ok(rows) => success_response(
            StatusCode::OK,
            &trace_id,
            AlertConfigListResponse {
                configs: rows.into_iter().map(Into::into).collect(),
            },
        ),
        Err(e) => storage_error(&trace_id, &e),
    }
}

/// 创建告警规则。
#[utoipa::path(
    post,
    path = "/alerts",
    tag = "Alerts",
    request_body = CreateAlertRequest,
    responses(
        (status = 201, description = "告警规则已创建", body = AlertConfigCreatedResponse),
        (status = 400, description = "缺少必填字段或字段非法", body = crate::api::ApiError)
    )
)]
async fn create_alert(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<CreateAlertRequest>,
) -> impl IntoResponse {
    let (Some(name), Some(metric_key), Some(condition), Some(threshold)) =
        (req.name, req.metric_key, req.condition, req.threshold)
    else {
        return bad_request(
            &trace_id,
            "Missing required fields: name, metricKey, condition, threshold",
        );
    };

    let new = NewAlertConfig {
        name,
        metric_key,
        condition,
        threshold,
        consecutive_breaches: req.consecutive_breaches,
        cooldown_seconds: req.cooldown_seconds,
        slack_channel: req.slack_channel,
        enabled: req.enabled,
    };
    if let Err(msg) = validate_rule(&new) {
        return bad_request(&trace_id, &msg);
    }

    match state.store.create_alert_config(&new).await {
        Ok(row) => {
            tracing::info!(id = %row.id, name = %row.name, "Alert rule created");
            success_response(
                StatusCode::CREATED,
                &trace_id,
                AlertConfigCreatedResponse { config: row.into() },
            )
        }
        Err(e) => storage_error(&trace_id, &e),
    }
}

/// 按 `id` 部分更新告警规则。
#[utoipa::path(
    patch,
    path = "/alerts",
    tag = "Alerts",
    request_body = UpdateAlertRequest,
    responses(
        (status = 200, description = "更新成功", body = SuccessResponse),
        (status = 400, description = "缺少 id 或字段非法", body = crate::api::ApiError),
        (status = 404, description = "告警规则不存在", body = crate::api::ApiError)
    )
)]
async fn update_alert(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<UpdateAlertRequest>,
) -> impl IntoResponse {
    let Some(id) = req.id.filter(|id| !id.is_empty()) else {
        return bad_request(&trace_id, "Missing required field: id");
    };

    if let Some(condition) = req.condition.as_deref() {
        if condition.parse::<AlertCondition>().is_err() {
            return bad_request(
                &trace_id,
                &format!("condition must be one of gt, lt, gte, lte, eq (got '{condition}')"),
            );
        }
    }
    if req.consecutive_breaches.is_some_and(|n| n < 1) {
        return bad_request(&trace_id, "consecutiveBreaches must be at least 1");
    }
    if let Some(Err(msg)) = req.cooldown_seconds.map(check_cooldown) {
        return bad_request(&trace_id, &msg);
    }
    if req.threshold.is_some_and(|t| !t.is_finite()) {
        return bad_request(&trace_id, "threshold must be a finite number");
    }

    let update = AlertConfigUpdate {
        name: req.name,
        metric_key: req.metric_key,
        condition: req.condition,
        threshold: req.threshold,
        consecutive_breaches: req.consecutive_breaches,
        cooldown_seconds: req.cooldown_seconds,
        slack_channel: req.slack_channel,
        enabled: req.enabled,
    };

    match state.store.update_alert_config(&id, &update).await {
        Ok(true) => success_response(StatusCode::OK, &trace_id, SuccessResponse { success: true }),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "Alert config not found",
        ),
        Err(e) => storage_error(&trace_id, &e),
    }
}

/// 删除告警规则及其历史事件。
#[utoipa::path(
    delete,
    path = "/alerts",
    tag = "Alerts",
    params(DeleteAlertParams),
    responses(
        (status = 200, description = "删除成功", body = SuccessResponse),
        (status = 400, description = "缺少 id", body = crate::api::ApiError),
        (status = 404, description = "告警规则不存在", body = crate::api::ApiError)
    )
)]
async fn delete_alert(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<DeleteAlertParams>,
) -> impl IntoResponse {
    let Some(id) = params.id.filter(|id| !id.is_empty()) else {
        return bad_request(&trace_id, "Missing required parameter: id");
    };

    match state.store.delete_alert_config(&id).await {
        Ok(true) => {
            tracing::info!(id = %id, "Alert rule deleted");
            success_response(StatusCode::OK, &trace_id, SuccessResponse { success: true })
        }
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "Alert config not found",
        ),
        Err(e) => storage_error(&trace_id, &e),
    }
}

/// 最近的告警事件，按时间倒序。
#[utoipa::path(
    get,
    path = "/alerts/history",
    tag = "Alerts",
    params(HistoryParams),
    responses(
        (status = 200, description = "告警事件列表", body = AlertEventListResponse)
    )
)]
async fn alert_history(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);

    match state.store.list_alert_history(limit).await {
        Ok(rows) => success_response(
            StatusCode::OK,
            &trace_id,
            AlertEventListResponse {
                events: rows.into_iter().map(Into::into).collect(),
            },
        ),
        Err(e) => storage_error(&trace_id, &e),
    }
}

pub fn alert_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_alerts, create_alert, update_alert, delete_alert))
        .routes(routes!(alert_history))
}
