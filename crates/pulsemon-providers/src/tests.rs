use crate::axiom::{AxiomConfig, AxiomProvider};
use crate::error::{ProviderError, Result};
use crate::neon::{NeonConfig, NeonProvider};
use crate::vercel::{VercelConfig, VercelProvider};
use crate::{backoff_delay, http, MonitoringProvider, ProviderHealth};
use async_trait::async_trait;
use chrono::Utc;
use pulsemon_common::types::{FetchResult, ProviderSnapshot, ProviderStatus};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Fails the first `failures` calls, then succeeds.
struct FlakyProvider {
    failures: u32,
    calls: AtomicU32,
    call_times: Mutex<Vec<Instant>>,
    health: ProviderHealth,
}

impl FlakyProvider {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
            call_times: Mutex::new(Vec::new()),
            health: ProviderHealth::new(),
        }
    }

    fn gaps(&self) -> Vec<Duration> {
        let times = self.call_times.lock().unwrap();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[async_trait]
impl MonitoringProvider for FlakyProvider {
    fn id(&self) -> &str {
        "flaky"
    }

    fn name(&self) -> &str {
        "Flaky"
    }

    fn min_interval_secs(&self) -> u64 {
        60
    }

    fn metric_keys(&self) -> &[&'static str] {
        &[]
    }

    fn health(&self) -> &ProviderHealth {
        &self.health
    }

    async fn do_fetch(&self) -> Result<FetchResult> {
        self.call_times.lock().unwrap().push(Instant::now());
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(ProviderError::InvalidResponse {
                provider: "flaky".into(),
                message: format!("attempt {n} failed"),
            });
        }
        Ok(FetchResult {
            snapshot: ProviderSnapshot {
                provider_id: "flaky".into(),
                data: serde_json::json!({}),
                fetched_at: Utc::now(),
            },
            metrics: vec![],
        })
    }
}

/// Paused time jumps straight to timer deadlines, modulo millisecond rounding.
fn assert_close(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(10),
        "expected ~{expected:?}, got {actual:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn always_failing_provider_is_tried_three_times_with_backoff() {
    let provider = FlakyProvider::new(u32::MAX);
    let started = Instant::now();

    assert!(provider.fetch().await.is_none());

    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    let gaps = provider.gaps();
    assert_eq!(gaps.len(), 2);
    assert_close(gaps[0], Duration::from_millis(1000));
    assert_close(gaps[1], Duration::from_millis(2000));
    assert_close(started.elapsed(), Duration::from_millis(3000));
    assert_eq!(provider.status(), ProviderStatus::Degraded);
}

#[tokio::test(start_paused = true)]
async fn recovers_within_retry_budget() {
    let provider = FlakyProvider::new(2);
    assert!(provider.fetch().await.is_some());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    assert_eq!(provider.status(), ProviderStatus::Healthy);
    assert_eq!(provider.health().consecutive_errors(), 0);
}

#[tokio::test(start_paused = true)]
async fn status_escalates_to_error_after_three_failed_fetches() {
    let provider = FlakyProvider::new(u32::MAX);
    provider.fetch().await;
    provider.fetch().await;
    assert_eq!(provider.status(), ProviderStatus::Degraded);
    provider.fetch().await;
    assert_eq!(provider.status(), ProviderStatus::Error);
    assert_eq!(provider.health().consecutive_errors(), 3);
}

#[test]
fn backoff_doubles_per_attempt() {
    assert_eq!(backoff_delay(0), Duration::from_secs(1));
    assert_eq!(backoff_delay(1), Duration::from_secs(2));
    assert_eq!(backoff_delay(2), Duration::from_secs(4));
}

fn client() -> reqwest::Client {
    http::build_client(5).unwrap()
}

#[tokio::test]
async fn vercel_fetch_normalizes_deployments() {
    let server = MockServer::start().await;
    let now_ms = Utc::now().timestamp_millis();
    Mock::given(method("GET"))
        .and(path("/v6/deployments"))
        .and(query_param("projectId", "prj_1"))
        .and(query_param("limit", "20"))
        .and(query_param("teamId", "team_1"))
        .and(header("authorization", "Bearer vt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "deployments": [
                {
                    "uid": "dpl_1", "name": "web", "state": "READY", "url": "web-1.vercel.app",
                    "created": now_ms - 60_000, "buildingAt": now_ms - 100_000, "ready": now_ms - 60_000,
                    "meta": { "githubCommitSha": "abc123", "githubCommitRef": "main" },
                    "target": "production"
                },
                { "uid": "dpl_2", "name": "web", "state": "ERROR", "created": now_ms - 120_000 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = VercelProvider::new(
        VercelConfig {
            token: Some("vt".into()),
            project_id: Some("prj_1".into()),
            team_id: Some("team_1".into()),
            base_url: server.uri(),
        },
        client(),
    );

    let result = provider.do_fetch().await.unwrap();
    let value = |key: &str| {
        result
            .metrics
            .iter()
            .find(|m| m.key == key)
            .map(|m| m.value)
            .unwrap()
    };
    assert_eq!(value("vercel.deployment.count_24h"), 2.0);
    assert_eq!(value("vercel.deployment.build_duration_ms"), 40_000.0);
    assert_eq!(value("vercel.deployment.success_rate"), 50.0);

    let first = &result.snapshot.data["deployments"][0];
    assert_eq!(first["commitSha"], "abc123");
    assert_eq!(first["commitRef"], "main");
    assert_eq!(result.snapshot.provider_id, "vercel");
}

#[tokio::test]
async fn vercel_without_credentials_fails() {
    let provider = VercelProvider::new(VercelConfig::default(), client());
    let err = provider.do_fetch().await.unwrap_err();
    assert!(matches!(err, ProviderError::MissingCredentials(_)));
}

#[tokio::test]
async fn vercel_tolerates_null_fields() {
    let server = MockServer::start().await;
    let now_ms = Utc::now().timestamp_millis();
    Mock::given(method("GET"))
        .and(path("/v6/deployments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "deployments": [
                { "uid": null, "name": null, "state": "READY", "created": now_ms - 1_000 },
                { "uid": "dpl_2", "name": "web", "state": null, "created": null }
            ]
        })))
        .mount(&server)
        .await;

    let provider = VercelProvider::new(
        VercelConfig {
            token: Some("vt".into()),
            project_id: Some("prj_1".into()),
            team_id: None,
            base_url: server.uri(),
        },
        client(),
    );

    let result = provider.do_fetch().await.unwrap();
    let value = |key: &str| result.metrics.iter().find(|m| m.key == key).map(|m| m.value);
    assert_eq!(value("vercel.deployment.count_24h"), Some(1.0));
    assert_eq!(value("vercel.deployment.success_rate"), Some(100.0));
    assert_eq!(result.snapshot.data["deployments"][0]["uid"], "");
    assert_eq!(result.snapshot.data["deployments"][1]["state"], "");
}

#[tokio::test]
async fn vercel_rejects_non_object_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v6/deployments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let provider = VercelProvider::new(
        VercelConfig {
            token: Some("vt".into()),
            project_id: Some("prj_1".into()),
            team_id: None,
            base_url: server.uri(),
        },
        client(),
    );

    match provider.do_fetch().await {
        Err(ProviderError::InvalidResponse { provider, message }) => {
            assert_eq!(provider, "Vercel");
            assert!(message.contains("[]"), "{message}");
        }
        other => panic!("expected InvalidResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn neon_fetch_reads_main_branch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/p1"))
        .and(header("authorization", "Bearer nk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "project": { "id": "p1", "name": "pulsemon", "region_id": "aws-eu-central-1", "created_at": "2026-01-01T00:00:00Z" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/p1/branches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "branches": [
                { "id": "br-dev", "name": "dev", "logical_size": 10 },
                { "id": "br-main", "name": "main", "logical_size": 28450816, "written_data_bytes": 5200000, "compute_time_seconds": 145, "current_state": "ready" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/p1/endpoints"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "endpoints": [{ "id": "ep-1", "type": "read_write", "current_state": "active", "host": "ep-1.neon.tech", "autoscaling_limit_min_cu": 0.25, "autoscaling_limit_max_cu": 8 }]
        })))
        .mount(&server)
        .await;

    let provider = NeonProvider::new(
        NeonConfig {
            api_key: Some("nk".into()),
            project_id: Some("p1".into()),
            base_url: server.uri(),
        },
        client(),
    );
    let result = provider.do_fetch().await.unwrap();
    let values: Vec<(&str, f64)> = result.metrics.iter().map(|m| (m.key.as_str(), m.value)).collect();
    assert_eq!(
        values,
        vec![
            ("neon.db.size_bytes", 28_450_816.0),
            ("neon.db.compute_seconds", 145.0),
            ("neon.db.written_bytes", 5_200_000.0),
        ]
    );
    assert_eq!(result.snapshot.data["project"]["regionId"], "aws-eu-central-1");
    assert_eq!(result.snapshot.data["endpoints"][0]["type"], "read_write");
    assert_eq!(result.snapshot.data["branches"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn neon_without_branches_reports_zeros() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/p1/branches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "branches": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/p1/endpoints"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let provider = NeonProvider::new(
        NeonConfig {
            api_key: Some("nk".into()),
            project_id: Some("p1".into()),
            base_url: server.uri(),
        },
        client(),
    );
    let result = provider.do_fetch().await.unwrap();
    assert!(result.metrics.iter().all(|m| m.value == 0.0));
}

#[tokio::test]
async fn neon_tolerates_null_branch_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "project": null })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/p1/branches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "branches": [
                { "id": null, "name": null, "logical_size": 7 },
                { "id": "br-main", "name": "main", "logical_size": 42, "written_data_bytes": null }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/p1/endpoints"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "endpoints": null })))
        .mount(&server)
        .await;

    let provider = NeonProvider::new(
        NeonConfig {
            api_key: Some("nk".into()),
            project_id: Some("p1".into()),
            base_url: server.uri(),
        },
        client(),
    );
    let result = provider.do_fetch().await.unwrap();
    let values: Vec<(&str, f64)> = result.metrics.iter().map(|m| (m.key.as_str(), m.value)).collect();
    assert_eq!(
        values,
        vec![
            ("neon.db.size_bytes", 42.0),
            ("neon.db.compute_seconds", 0.0),
            ("neon.db.written_bytes", 0.0),
        ]
    );
    assert_eq!(result.snapshot.data["branches"][0]["name"], "");
}

#[tokio::test]
async fn neon_maps_non_success_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/p1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let provider = NeonProvider::new(
        NeonConfig {
            api_key: Some("nk".into()),
            project_id: Some("p1".into()),
            base_url: server.uri(),
        },
        client(),
    );
    match provider.do_fetch().await {
        Err(ProviderError::HttpError { status, body, .. }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "unavailable");
        }
        other => panic!("expected HttpError, got {other:?}"),
    }
}

#[tokio::test]
async fn axiom_fetch_posts_apl_and_computes_error_rate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/datasets/_apl"))
        .and(query_param("format", "tabular"))
        .and(header("authorization", "Bearer at"))
        .and(header("x-axiom-org-id", "org-1"))
        .and(body_partial_json(serde_json::json!({
            "apl": crate::axiom::summary_query("edge")
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "tables": [{
                "columns": [
                    { "name": "p50", "data": [44.4] },
                    { "name": "p95", "data": [180.6] },
                    { "name": "p99", "data": [321.5] },
                    { "name": "total", "data": [300] },
                    { "name": "errors", "data": [7] }
                ]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AxiomProvider::new(
        AxiomConfig {
            token: Some("at".into()),
            org_id: Some("org-1".into()),
            dataset: "edge".into(),
            base_url: server.uri(),
        },
        client(),
    );
    let result = provider.do_fetch().await.unwrap();
    let values: Vec<(&str, f64)> = result.metrics.iter().map(|m| (m.key.as_str(), m.value)).collect();
    assert_eq!(
        values,
        vec![
            ("axiom.latency.p50", 44.0),
            ("axiom.latency.p95", 181.0),
            ("axiom.latency.p99", 322.0),
            ("axiom.requests.total", 300.0),
            ("axiom.requests.error_rate", 2.33),
        ]
    );
    assert_eq!(result.snapshot.data["totalRequests"], 300.0);
}

#[tokio::test]
async fn axiom_without_token_fails() {
    let provider = AxiomProvider::new(AxiomConfig::default(), client());
    assert!(matches!(
        provider.do_fetch().await,
        Err(ProviderError::MissingCredentials(_))
    ));
}
