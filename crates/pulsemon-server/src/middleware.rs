use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::api::error_response;
use crate::logging::TraceId;
use crate::state::AppState;

/// Guards the `/cron/*` routes with `Authorization: Bearer {cron_secret}`.
///
/// When no secret is configured, or it is blank, every request passes through.
pub async fn cron_auth_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(secret) = state.config.cron_secret() else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if provided == Some(secret) {
        return next.run(req).await;
    }

    let trace_id = req
        .extensions()
        .get::<TraceId>()
        .map(|t| t.0.clone())
        .unwrap_or_default();
    tracing::warn!(
        trace_id = %trace_id,
        path = %req.uri().path(),
        "Cron request rejected: missing or invalid bearer secret"
    );
    error_response(
        StatusCode::UNAUTHORIZED,
        &trace_id,
        "unauthorized",
        "Unauthorized",
    )
}
