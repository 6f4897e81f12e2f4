#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use pulsemon_common::types::{AlertNotice, FetchResult, MetricPoint, ProviderSnapshot};
use pulsemon_notify::NotificationChannel;
use pulsemon_providers::{MonitoringProvider, ProviderHealth};
use pulsemon_server::app;
use pulsemon_server::config::ServerConfig;
use pulsemon_server::state::AppState;
use pulsemon_storage::MonitorStore;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::util::ServiceExt;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
    pub notifier: Arc<RecordingNotifier>,
}

#[derive(Clone)]
pub enum Behavior {
    /// Returns these `(metric_key, value)` pairs.
    Succeed(Vec<(&'static str, f64)>),
    /// Exhausts its retries and returns no result.
    Fail,
    /// Panics inside `fetch`.
    Panic,
}

/// Provider stub whose `fetch` resolves immediately, without backoff.
pub struct MockProvider {
    id: &'static str,
    min_interval_secs: u64,
    behavior: Behavior,
    calls: AtomicU32,
    health: ProviderHealth,
}

impl MockProvider {
    pub fn new(id: &'static str, behavior: Behavior) -> Arc<Self> {
        Self::with_interval(id, 300, behavior)
    }

    pub fn with_interval(id: &'static str, min_interval_secs: u64, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            id,
            min_interval_secs,
            behavior,
            calls: AtomicU32::new(0),
            health: ProviderHealth::new(),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MonitoringProvider for MockProvider {
    fn id(&self) -> &str {
        self.id
    }

    fn name(&self) -> &str {
        self.id
    }

    fn min_interval_secs(&self) -> u64 {
        self.min_interval_secs
    }

    fn metric_keys(&self) -> &[&'static str] {
        &[]
    }

    fn health(&self) -> &ProviderHealth {
        &self.health
    }

    async fn do_fetch(&self) -> pulsemon_providers::error::Result<FetchResult> {
        Err(pulsemon_providers::error::ProviderError::MissingCredentials(
            "mock".to_string(),
        ))
    }

    async fn fetch(&self) -> Option<FetchResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed(values) => {
                self.health.record_success();
                let now = Utc::now();
                Some(FetchResult {
                    snapshot: ProviderSnapshot {
                        provider_id: self.id.to_string(),
                        data: json!({ "source": self.id, "values": values.len() }),
                        fetched_at: now,
                    },
                    metrics: values
                        .iter()
                        .map(|(key, value)| MetricPoint::new(key, *value, "count", now))
                        .collect(),
                })
            }
            Behavior::Fail => {
                self.health.record_failure();
                None
            }
            Behavior::Panic => panic!("mock provider {} exploded", self.id),
        }
    }
}

/// Captures notices instead of sending them.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<AlertNotice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<AlertNotice> {
        self.notices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingNotifier {
    async fn send(&self, notice: &AlertNotice) -> pulsemon_notify::error::Result<()> {
        self.notices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notice.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

pub async fn build_test_context() -> Result<TestContext> {
    build_test_context_with(Vec::new(), None).await
}

pub async fn build_test_context_with(
    providers: Vec<Arc<dyn MonitoringProvider>>,
    cron_secret: Option<&str>,
) -> Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;
    let db_url = format!(
        "sqlite://{}?mode=rwc",
        temp_dir.path().join("pulsemon.db").display()
    );
    let store = Arc::new(MonitorStore::new(&db_url).await?);
    let notifier = Arc::new(RecordingNotifier::default());

    let mut config = ServerConfig::default();
    config.database.url = db_url;
    config.cron_secret = cron_secret.map(str::to_string);

    let state = app::build_state(store, providers, notifier.clone(), config);
    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
        notifier,
    })
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder = builder.header("Content-Type", "application/json");

    let req_body = body.unwrap_or(Value::Null).to_string();
    let req = builder
        .body(Body::from(req_body))
        .expect("request should build");

    send(app, req).await
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let req = builder.body(Body::empty()).expect("request should build");
    send(app, req).await
}

pub async fn request_with_header(
    app: &axum::Router,
    method: &str,
    uri: &str,
    name: &str,
    value: &str,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header(name, value)
        .body(Body::empty())
        .expect("request should build");
    send(app, req).await
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value, Option<String>) {
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub fn assert_ok_envelope(body: &Value) {
    assert_eq!(body["err_code"], 0, "unexpected body: {body}");
    assert!(body["err_msg"].is_string());
    assert!(body["trace_id"].is_string());
}

pub fn assert_err_envelope(body: &Value, code: i64) {
    assert_eq!(body["err_code"], code, "unexpected body: {body}");
    assert!(body["err_msg"].is_string());
    assert!(body["trace_id"].is_string());
    assert!(body["data"].is_null());
}
