use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use rand::Rng;
use std::time::Instant;

pub const TRACE_HEADER: &str = "x-trace-id";

const MAX_BODY_LOG_CHARS: usize = 200;
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;
const MAX_TRACE_ID_LEN: usize = 64;

/// Routes polled by load balancers and doc tooling. Only failures are
/// logged above `debug`.
const QUIET_PATHS: &[&str] = &["/health", "/openapi.json"];

/// Per-request trace id, stored in request extensions by [`request_logging`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceId(pub String);

impl TraceId {
    /// Reuses a well-formed `X-Trace-Id` sent by the caller (an external
    /// cron runner, usually), otherwise generates one.
    fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(TRACE_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| is_valid_trace_id(v))
            .map(|v| Self(v.to_string()))
            .unwrap_or_else(Self::generate)
    }

    /// 16 hex characters.
    fn generate() -> Self {
        let n: u64 = rand::thread_rng().gen();
        Self(format!("{n:016x}"))
    }
}

impl std::ops::Deref for TraceId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

fn is_valid_trace_id(v: &str) -> bool {
    (1..=MAX_TRACE_ID_LEN).contains(&v.len())
        && v.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// First [`MAX_BODY_LOG_CHARS`] bytes of `bytes`, cut on a char boundary.
fn body_snippet(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    let Ok(s) = std::str::from_utf8(bytes) else {
        return Some("<non-utf8 body>".to_string());
    };
    if s.len() <= MAX_BODY_LOG_CHARS {
        return Some(s.to_string());
    }
    let end = (0..=MAX_BODY_LOG_CHARS)
        .rev()
        .find(|&i| s.is_char_boundary(i))
        .unwrap_or(0);
    Some(format!("{}...", &s[..end]))
}

/// Buffers write-method bodies so they can be logged and then replayed to
/// the handler.
async fn buffer_request(req: Request) -> (Request, Option<String>) {
    if !matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH) {
        return (req, None);
    }
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_REQUEST_BODY_BYTES)
        .await
        .unwrap_or_default();
    let snippet = body_snippet(&bytes);
    (Request::from_parts(parts, Body::from(bytes)), snippet)
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"))
}

fn log_response(trace_id: &str, status: StatusCode, elapsed_ms: u64, body: Option<&str>, quiet: bool) {
    let status_code = status.as_u16();
    let body = body.unwrap_or("-");
    if status.is_server_error() {
        tracing::error!(trace_id, status = status_code, elapsed_ms, body, "<-- response");
    } else if status.is_client_error() {
        tracing::warn!(trace_id, status = status_code, elapsed_ms, body, "<-- response");
    } else if quiet {
        tracing::debug!(trace_id, status = status_code, elapsed_ms, "<-- response");
    } else {
        tracing::info!(trace_id, status = status_code, elapsed_ms, "<-- response");
    }
}

/// Logs `--> request` / `<-- response` pairs and sets `X-Trace-Id`.
///
/// Headers are never logged, so the cron bearer secret stays out of the logs.
pub async fn request_logging(req: Request, next: Next) -> Response {
    let trace_id = TraceId::from_headers(req.headers());
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let target = req
        .uri()
        .path_and_query()
        .map_or_else(|| path.clone(), |pq| pq.as_str().to_string());
    let quiet = QUIET_PATHS.contains(&path.as_str());

    let (mut req, request_body) = buffer_request(req).await;
    req.extensions_mut().insert(trace_id.clone());

    if quiet {
        tracing::debug!(trace_id = %trace_id.0, method = %method, path = %target, "--> request");
    } else {
        tracing::info!(
            trace_id = %trace_id.0,
            method = %method,
            path = %target,
            body = request_body.as_deref().unwrap_or("-"),
            "--> request"
        );
    }

    let started = Instant::now();
    let response = next.run(req).await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let status = response.status();
    let (mut parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.unwrap_or_default();
    let response_body = (is_json(&parts.headers) && !quiet)
        .then(|| body_snippet(&bytes))
        .flatten();
    log_response(&trace_id, status, elapsed_ms, response_body.as_deref(), quiet);

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        parts.headers.insert(TRACE_HEADER, value);
    }
    Response::from_parts(parts, Body::from(bytes))
}
