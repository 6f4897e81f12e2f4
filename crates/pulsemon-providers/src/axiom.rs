use crate::error::{ProviderError, Result};
use crate::{http, round2, MonitoringProvider, ProviderHealth};
use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, Utc};
use pulsemon_common::types::{FetchResult, MetricPoint, ProviderSnapshot};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROVIDER_ID: &str = "axiom";
pub const METRIC_P50: &str = "axiom.latency.p50";
pub const METRIC_P95: &str = "axiom.latency.p95";
pub const METRIC_P99: &str = "axiom.latency.p99";
pub const METRIC_TOTAL: &str = "axiom.requests.total";
pub const METRIC_ERROR_RATE: &str = "axiom.requests.error_rate";

const METRIC_KEYS: &[&str] = &[
    METRIC_P50,
    METRIC_P95,
    METRIC_P99,
    METRIC_TOTAL,
    METRIC_ERROR_RATE,
];
const WINDOW_MINUTES: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxiomConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default = "default_dataset")]
    pub dataset: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for AxiomConfig {
    fn default() -> Self {
        Self {
            token: None,
            org_id: None,
            dataset: default_dataset(),
            base_url: default_base_url(),
        }
    }
}

fn default_dataset() -> String {
    "mintcv-prod".to_string()
}

fn default_base_url() -> String {
    "https://api.axiom.co".to_string()
}

/// Single-row summary of the trailing window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencySummary {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub total: f64,
    pub errors: f64,
}

impl LatencySummary {
    /// `errors / total * 100`, 0 when there was no traffic.
    pub fn error_rate(&self) -> f64 {
        if self.total > 0.0 {
            self.errors / self.total * 100.0
        } else {
            0.0
        }
    }
}

pub fn summary_query(dataset: &str) -> String {
    format!(
        "['{dataset}'] | summarize p50 = percentile(duration, 50), p95 = percentile(duration, 95), \
         p99 = percentile(duration, 99), total = count(), errors = countif(status >= 500)"
    )
}

/// Reads the first row of `tables[0]`. Missing tables, columns or rows
/// yield zeros.
pub fn parse_apl_summary(body: &Value) -> LatencySummary {
    let columns = body
        .get("tables")
        .and_then(|t| t.get(0))
        .and_then(|t| t.get("columns"))
        .and_then(Value::as_array);
    let Some(columns) = columns else {
        return LatencySummary::default();
    };

    let column = |name: &str| -> f64 {
        columns
            .iter()
            .find(|c| c.get("name").and_then(Value::as_str) == Some(name))
            .and_then(|c| c.get("data"))
            .and_then(|d| d.get(0))
            .map(number_or_zero)
            .unwrap_or(0.0)
    };

    LatencySummary {
        p50: column("p50"),
        p95: column("p95"),
        p99: column("p99"),
        total: column("total"),
        errors: column("errors"),
    }
}

fn number_or_zero(v: &Value) -> f64 {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite()).unwrap_or(0.0)
}

pub struct AxiomProvider {
    config: AxiomConfig,
    client: Client,
    health: ProviderHealth,
}

impl AxiomProvider {
    pub fn new(config: AxiomConfig, client: Client) -> Self {
        Self {
            config,
            client,
            health: ProviderHealth::new(),
        }
    }
}

#[async_trait]
impl MonitoringProvider for AxiomProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn name(&self) -> &str {
        "Axiom Latency"
    }

    fn min_interval_secs(&self) -> u64 {
        60
    }

    fn metric_keys(&self) -> &[&'static str] {
        METRIC_KEYS
    }

    fn health(&self) -> &ProviderHealth {
        &self.health
    }

    async fn do_fetch(&self) -> Result<FetchResult> {
        let token = self
            .config
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::MissingCredentials("AXIOM_TOKEN is required".to_string()))?;

        let end = Utc::now();
        let start = end - Duration::minutes(WINDOW_MINUTES);
        let payload = serde_json::json!({
            "apl": summary_query(&self.config.dataset),
            "startTime": start.to_rfc3339_opts(SecondsFormat::Millis, true),
            "endTime": end.to_rfc3339_opts(SecondsFormat::Millis, true),
        });

        let url = format!(
            "{}/v1/datasets/_apl?format=tabular",
            self.config.base_url.trim_end_matches('/')
        );
        let mut request = self.client.post(&url).bearer_auth(token).json(&payload);
        if let Some(org_id) = self.config.org_id.as_deref().filter(|o| !o.is_empty()) {
            request = request.header("X-Axiom-Org-Id", org_id);
        }
        let body = http::send_json("Axiom", request).await?;

        let now = Utc::now();
        let summary = parse_apl_summary(&body);
        let error_rate = summary.error_rate();

        Ok(FetchResult {
            snapshot: ProviderSnapshot {
                provider_id: PROVIDER_ID.to_string(),
                data: serde_json::json!({
                    "p50": summary.p50,
                    "p95": summary.p95,
                    "p99": summary.p99,
                    "totalRequests": summary.total,
                    "errors": summary.errors,
                    "errorRate": error_rate,
                    "queriedAt": now.to_rfc3339_opts(SecondsFormat::Millis, true),
                }),
                fetched_at: now,
            },
            metrics: vec![
                MetricPoint::new(METRIC_P50, summary.p50.round(), "ms", now),
                MetricPoint::new(METRIC_P95, summary.p95.round(), "ms", now),
                MetricPoint::new(METRIC_P99, summary.p99.round(), "ms", now),
                MetricPoint::new(METRIC_TOTAL, summary.total, "count", now),
                MetricPoint::new(METRIC_ERROR_RATE, round2(error_rate), "percent", now),
            ],
        })
    }
}
