use crate::error::{ProviderError, Result};
use crate::http::null_as_default;
use crate::{http, round2, MonitoringProvider, ProviderHealth};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use pulsemon_common::types::{FetchResult, MetricPoint, ProviderSnapshot};
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const PROVIDER_ID: &str = "vercel";
pub const METRIC_COUNT_24H: &str = "vercel.deployment.count_24h";
pub const METRIC_BUILD_DURATION_MS: &str = "vercel.deployment.build_duration_ms";
pub const METRIC_SUCCESS_RATE: &str = "vercel.deployment.success_rate";

const METRIC_KEYS: &[&str] = &[METRIC_COUNT_24H, METRIC_BUILD_DURATION_MS, METRIC_SUCCESS_RATE];
const LIST_LIMIT: u32 = 20;
const SNAPSHOT_SIZE: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VercelConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for VercelConfig {
    fn default() -> Self {
        Self {
            token: None,
            project_id: None,
            team_id: None,
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.vercel.com".to_string()
}

#[derive(Debug, Default, Deserialize)]
struct DeploymentsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    deployments: Vec<Deployment>,
}

/// One entry of the deployments list. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Deployment {
    #[serde(deserialize_with = "null_as_default")]
    pub uid: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub state: String,
    pub url: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub created: i64,
    pub ready: Option<i64>,
    pub building_at: Option<i64>,
    pub meta: Option<DeploymentMeta>,
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentMeta {
    pub github_commit_sha: Option<String>,
    pub github_commit_message: Option<String>,
    pub github_commit_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotDeployment {
    uid: String,
    name: String,
    state: String,
    url: Option<String>,
    created: i64,
    ready: Option<i64>,
    building_at: Option<i64>,
    commit_sha: Option<String>,
    commit_message: Option<String>,
    commit_ref: Option<String>,
    target: Option<String>,
}

impl From<&Deployment> for SnapshotDeployment {
    fn from(d: &Deployment) -> Self {
        let meta = d.meta.clone().unwrap_or_default();
        Self {
            uid: d.uid.clone(),
            name: d.name.clone(),
            state: d.state.clone(),
            url: d.url.clone(),
            created: d.created,
            ready: d.ready,
            building_at: d.building_at,
            commit_sha: meta.github_commit_sha,
            commit_message: meta.github_commit_message,
            commit_ref: meta.github_commit_ref,
            target: d.target.clone(),
        }
    }
}

/// Aggregates derived from one deployments listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentSummary {
    pub count_24h: usize,
    pub avg_build_duration_ms: f64,
    pub success_rate: f64,
}

/// Computes the three deployment metrics relative to `now`.
///
/// - `count_24h` counts deployments created in the trailing 24 hours.
/// - Build duration averages `ready - buildingAt` over every listed
///   deployment that has both timestamps, 0 if none do.
/// - Success rate considers only last-24h deployments in a terminal state
///   (`READY` or `ERROR`), 100 if there are none.
pub fn summarize_deployments(deployments: &[Deployment], now: DateTime<Utc>) -> DeploymentSummary {
    let day_ago = (now - Duration::hours(24)).timestamp_millis();
    let last_24h: Vec<&Deployment> = deployments.iter().filter(|d| d.created > day_ago).collect();

    let durations: Vec<i64> = deployments
        .iter()
        .filter_map(|d| match (d.ready, d.building_at) {
            (Some(ready), Some(building_at)) if ready > 0 && building_at > 0 => {
                Some(ready - building_at)
            }
            _ => None,
        })
        .collect();
    let avg_build_duration_ms = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<i64>() as f64 / durations.len() as f64
    };

    let ready = last_24h.iter().filter(|d| d.state == "READY").count();
    let errored = last_24h.iter().filter(|d| d.state == "ERROR").count();
    let completed = ready + errored;
    let success_rate = if completed > 0 {
        ready as f64 / completed as f64 * 100.0
    } else {
        100.0
    };

    DeploymentSummary {
        count_24h: last_24h.len(),
        avg_build_duration_ms,
        success_rate,
    }
}

pub struct VercelProvider {
    config: VercelConfig,
    client: Client,
    health: ProviderHealth,
}

impl VercelProvider {
    pub fn new(config: VercelConfig, client: Client) -> Self {
        Self {
            config,
            client,
            health: ProviderHealth::new(),
        }
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        match (self.config.token.as_deref(), self.config.project_id.as_deref()) {
            (Some(token), Some(project_id)) if !token.is_empty() && !project_id.is_empty() => {
                Ok((token, project_id))
            }
            _ => Err(ProviderError::MissingCredentials(
                "VERCEL_API_TOKEN and VERCEL_PROJECT_ID are required".to_string(),
            )),
        }
    }
}

#[async_trait]
impl MonitoringProvider for VercelProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn name(&self) -> &str {
        "Vercel Deployments"
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
        let (token, project_id) = self.credentials()?;

        let mut query = vec![
            ("projectId", project_id.to_string()),
            ("limit", LIST_LIMIT.to_string()),
        ];
        if let Some(team_id) = self.config.team_id.as_deref().filter(|t| !t.is_empty()) {
            query.push(("teamId", team_id.to_string()));
        }

        let url = format!("{}/v6/deployments", self.config.base_url.trim_end_matches('/'));
        let body = http::send_json(
            "Vercel",
            self.client.get(&url).bearer_auth(token).query(&query),
        )
        .await?;
        let response: DeploymentsResponse = serde_json::from_value(body)?;

        let now = Utc::now();
        let summary = summarize_deployments(&response.deployments, now);
        let recent: Vec<SnapshotDeployment> = response
            .deployments
            .iter()
            .take(SNAPSHOT_SIZE)
            .map(SnapshotDeployment::from)
            .collect();

        let metrics = vec![
            MetricPoint::new(METRIC_COUNT_24H, summary.count_24h as f64, "count", now),
            MetricPoint::new(
                METRIC_BUILD_DURATION_MS,
                summary.avg_build_duration_ms.round(),
                "ms",
                now,
            ),
            MetricPoint::new(METRIC_SUCCESS_RATE, round2(summary.success_rate), "percent", now),
        ];

        Ok(FetchResult {
            snapshot: ProviderSnapshot {
                provider_id: PROVIDER_ID.to_string(),
                data: serde_json::json!({ "deployments": recent }),
                fetched_at: now,
            },
            metrics,
        })
    }
}
