mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{
    assert_err_envelope, assert_ok_envelope, build_test_context, build_test_context_with,
    request_json, request_no_body, request_with_header, Behavior, MockProvider,
};
use pulsemon_common::types::MetricPoint;
use pulsemon_providers::MonitoringProvider;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn health_reports_version_and_provider_count() {
    let ctx = build_test_context_with(
        vec![MockProvider::new("alpha", Behavior::Succeed(vec![])) as Arc<dyn MonitoringProvider>],
        None,
    )
    .await
    .unwrap();

    let (status, body, trace_id) = request_no_body(&ctx.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["data"]["provider_count"], 1);

    let trace_id = trace_id.expect("trace id header should be set");
    assert_eq!(body["trace_id"], trace_id.as_str());
}

#[tokio::test]
async fn caller_trace_id_is_propagated() {
    let ctx = build_test_context().await.unwrap();

    let (status, body, trace_id) =
        request_with_header(&ctx.app, "GET", "/cron/retention", "X-Trace-Id", "cron-run-42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trace_id.as_deref(), Some("cron-run-42"));
    assert_eq!(body["trace_id"], "cron-run-42");

    let (_, body, trace_id) =
        request_with_header(&ctx.app, "GET", "/alerts", "X-Trace-Id", "not valid!").await;
    let trace_id = trace_id.expect("trace id header should be set");
    assert_eq!(trace_id.len(), 16);
    assert_eq!(body["trace_id"], trace_id.as_str());
}

#[tokio::test]
async fn cron_routes_require_bearer_secret_when_configured() {
    let ctx = build_test_context_with(Vec::new(), Some("s3cret")).await.unwrap();

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/cron/ingest", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_err_envelope(&body, 1002);

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/cron/retention", Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_err_envelope(&body, 1002);

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/cron/ingest", Some("s3cret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    assert_eq!(body["data"]["results"], json!([]));

    // The secret only guards the cron routes.
    let (status, _, _) = request_no_body(&ctx.app, "GET", "/alerts", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn blank_cron_secret_is_treated_as_unset() {
    let ctx = build_test_context_with(Vec::new(), Some("  ")).await.unwrap();
    assert!(ctx.state.config.cron_secret().is_none());

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/cron/retention", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
}

#[tokio::test]
async fn cron_routes_are_open_without_secret() {
    let ctx = build_test_context().await.unwrap();

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/cron/retention", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    assert_eq!(body["data"]["success"], true);
    assert_eq!(body["data"]["metricsRemoved"], 0);
    assert_eq!(body["data"]["ingestionLogsRemoved"], 0);
    assert_eq!(body["data"]["alertHistoryRemoved"], 0);
}

#[tokio::test]
async fn cron_ingest_persists_snapshot_metrics_and_log() {
    let alpha = MockProvider::new(
        "alpha",
        Behavior::Succeed(vec![("alpha.requests", 42.0), ("alpha.errors", 3.0)]),
    );
    let ctx = build_test_context_with(vec![alpha.clone() as Arc<dyn MonitoringProvider>], None)
        .await
        .unwrap();

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/cron/ingest", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    let results = body["data"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["providerId"], "alpha");
    assert_eq!(results[0]["status"], "success");
    assert_eq!(results[0]["metricsCount"], 2);
    assert!(results[0]["durationMs"].is_u64());
    assert_eq!(alpha.calls(), 1);

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/metrics/alpha", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["providerId"], "alpha");
    assert_eq!(body["data"]["data"]["source"], "alpha");
    assert!(body["data"]["fetchedAt"].is_string());

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        "/metrics/timeseries?key=alpha.requests",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let points = body["data"]["points"].as_array().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["metricKey"], "alpha.requests");
    assert_eq!(points[0]["value"], 42.0);

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/ingestion-log", None).await;
    let entries = body["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["providerId"], "alpha");
    assert_eq!(entries[0]["status"], "success");
    assert_eq!(entries[0]["metricsCount"], 2);

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/providers", None).await;
    let providers = body["data"]["providers"].as_array().unwrap();
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0]["id"], "alpha");
    assert_eq!(providers[0]["status"], "healthy");
    assert_eq!(providers[0]["intervalSeconds"], 300);
    assert_eq!(providers[0]["consecutiveFailures"], 0);
    assert!(providers[0]["lastSuccessAt"].is_string());
}

#[tokio::test]
async fn providers_list_before_first_fetch_has_no_schedule() {
    let ctx = build_test_context_with(
        vec![MockProvider::new("alpha", Behavior::Succeed(vec![])) as Arc<dyn MonitoringProvider>],
        None,
    )
    .await
    .unwrap();

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/providers", None).await;
    assert_eq!(status, StatusCode::OK);
    let provider = &body["data"]["providers"][0];
    assert_eq!(provider["status"], "healthy");
    assert_eq!(provider["minIntervalSeconds"], 300);
    assert!(provider["intervalSeconds"].is_null());
    assert!(provider["lastFetchAt"].is_null());
}

#[tokio::test]
async fn alert_crud_round_trip() {
    let ctx = build_test_context().await.unwrap();

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/alerts",
        None,
        Some(json!({
            "name": "Slow p95",
            "metricKey": "axiom.latency.p95",
            "condition": "gt",
            "threshold": 800,
            "slackChannel": "#ops"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ok_envelope(&body);
    let config = &body["data"]["config"];
    let id = config["id"].as_str().unwrap().to_string();
    assert_eq!(config["metricKey"], "axiom.latency.p95");
    assert_eq!(config["consecutiveBreaches"], 1);
    assert_eq!(config["cooldownSeconds"], 300);
    assert_eq!(config["enabled"], true);
    assert_eq!(config["currentBreachCount"], 0);
    assert!(config["lastFiredAt"].is_null());

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/alerts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["configs"].as_array().unwrap().len(), 1);

    let (status, body, _) = request_json(
        &ctx.app,
        "PATCH",
        "/alerts",
        None,
        Some(json!({ "id": id, "threshold": 1200, "consecutiveBreaches": 3, "slackChannel": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["success"], true);

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/alerts", None).await;
    let config = &body["data"]["configs"][0];
    assert_eq!(config["threshold"], 1200.0);
    assert_eq!(config["consecutiveBreaches"], 3);
    assert!(config["slackChannel"].is_null());
    assert_eq!(config["name"], "Slow p95");

    let (status, body, _) =
        request_no_body(&ctx.app, "DELETE", &format!("/alerts?id={id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["success"], true);

    let (status, body, _) =
        request_no_body(&ctx.app, "DELETE", &format!("/alerts?id={id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/alerts", None).await;
    assert_eq!(body["data"]["configs"], json!([]));
}

#[tokio::test]
async fn alert_mutations_validate_input() {
    let ctx = build_test_context().await.unwrap();

    let invalid_creates = [
        json!({ "metricKey": "k", "condition": "gt", "threshold": 1 }),
        json!({ "name": "n", "condition": "gt", "threshold": 1 }),
        json!({ "name": "n", "metricKey": "k", "threshold": 1 }),
        json!({ "name": "n", "metricKey": "k", "condition": "gt" }),
        json!({ "name": "n", "metricKey": "k", "condition": "between", "threshold": 1 }),
        json!({ "name": "n", "metricKey": "k", "condition": "gt", "threshold": 1, "consecutiveBreaches": 0 }),
        json!({ "name": "n", "metricKey": "k", "condition": "gt", "threshold": 1, "cooldownSeconds": -1 }),
        json!({ "name": "n", "metricKey": "k", "condition": "gt", "threshold": 1, "cooldownSeconds": 92_233_720_368_547_758i64 }),
    ];
    for payload in invalid_creates {
        let (status, body, _) =
            request_json(&ctx.app, "POST", "/alerts", None, Some(payload.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload}");
        assert_err_envelope(&body, 1001);
    }

    let (status, body, _) =
        request_json(&ctx.app, "PATCH", "/alerts", None, Some(json!({ "threshold": 5 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    let (status, body, _) = request_json(
        &ctx.app,
        "PATCH",
        "/alerts",
        None,
        Some(json!({ "id": "missing", "threshold": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);

    let (status, body, _) = request_json(
        &ctx.app,
        "PATCH",
        "/alerts",
        None,
        Some(json!({ "id": "missing", "condition": "approx" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    let (status, body, _) = request_json(
        &ctx.app,
        "PATCH",
        "/alerts",
        None,
        Some(json!({ "id": "missing", "cooldownSeconds": 92_233_720_368_547_758i64 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    let (status, body, _) = request_no_body(&ctx.app, "DELETE", "/alerts", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/alerts", None).await;
    assert_eq!(body["data"]["configs"], json!([]));
}

#[tokio::test]
async fn timeseries_validates_and_filters_by_range() {
    let ctx = build_test_context().await.unwrap();
    let now = Utc::now();
    ctx.state
        .store
        .insert_metrics(&[
            MetricPoint::new("neon.connections", 5.0, "count", now - Duration::hours(3)),
            MetricPoint::new("neon.connections", 7.0, "count", now - Duration::minutes(30)),
            MetricPoint::new("neon.storage.bytes", 1.0, "bytes", now - Duration::minutes(30)),
        ])
        .await
        .unwrap();

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/metrics/timeseries", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        "/metrics/timeseries?key=neon.connections&from=not-a-date",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    // Default window is the last hour.
    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        "/metrics/timeseries?key=neon.connections",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let points = body["data"]["points"].as_array().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["value"], 7.0);

    let from = (now - Duration::hours(4)).to_rfc3339().replace('+', "%2B");
    let (_, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/metrics/timeseries?key=neon.connections&from={from}&limit=1"),
        None,
    )
    .await;
    let points = body["data"]["points"].as_array().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["value"], 5.0);
}

#[tokio::test]
async fn snapshot_for_unknown_provider_is_not_found() {
    let ctx = build_test_context().await.unwrap();

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/metrics/vercel", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);
}

#[tokio::test]
async fn history_limit_defaults_and_accepts_empty_value() {
    let ctx = build_test_context().await.unwrap();

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/alerts/history", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["events"], json!([]));

    let (status, _, _) = request_no_body(&ctx.app, "GET", "/alerts/history?limit=", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn openapi_document_lists_routes() {
    let ctx = build_test_context().await.unwrap();

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    let paths = body["paths"].as_object().unwrap();
    for path in [
        "/health",
        "/cron/ingest",
        "/cron/retention",
        "/alerts",
        "/alerts/history",
        "/metrics/timeseries",
        "/metrics/{providerId}",
        "/providers",
        "/ingestion-log",
    ] {
        assert!(paths.contains_key(path), "missing {path}");
    }
    let alerts = &body["paths"]["/alerts"];
    for method in ["get", "post", "patch", "delete"] {
        assert!(alerts[method].is_object(), "missing {method} /alerts");
    }
}
