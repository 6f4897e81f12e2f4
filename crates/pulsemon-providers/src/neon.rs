use crate::error::{ProviderError, Result};
use crate::http::null_as_default;
use crate::{http, MonitoringProvider, ProviderHealth};
use async_trait::async_trait;
use chrono::Utc;
use pulsemon_common::types::{FetchResult, MetricPoint, ProviderSnapshot};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROVIDER_ID: &str = "neon";
pub const METRIC_SIZE_BYTES: &str = "neon.db.size_bytes";
pub const METRIC_COMPUTE_SECONDS: &str = "neon.db.compute_seconds";
pub const METRIC_WRITTEN_BYTES: &str = "neon.db.written_bytes";

const METRIC_KEYS: &[&str] = &[METRIC_SIZE_BYTES, METRIC_COMPUTE_SECONDS, METRIC_WRITTEN_BYTES];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeonConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for NeonConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            project_id: None,
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "https://console.neon.tech/api/v2".to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProjectResponse {
    project: Option<Project>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Project {
    id: Option<String>,
    name: Option<String>,
    region_id: Option<String>,
    created_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BranchesResponse {
    #[serde(deserialize_with = "null_as_default")]
    branches: Vec<Branch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Branch {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub logical_size: Option<f64>,
    pub written_data_bytes: Option<f64>,
    pub compute_time_seconds: Option<f64>,
    pub current_state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EndpointsResponse {
    #[serde(deserialize_with = "null_as_default")]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Endpoint {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    current_state: Option<String>,
    host: Option<String>,
    autoscaling_limit_min_cu: Option<f64>,
    autoscaling_limit_max_cu: Option<f64>,
}

/// Picks the branch whose usage is reported: `main`, then `master`, then the
/// first listed branch.
pub fn select_main_branch(branches: &[Branch]) -> Option<&Branch> {
    branches
        .iter()
        .find(|b| b.name == "main")
        .or_else(|| branches.iter().find(|b| b.name == "master"))
        .or_else(|| branches.first())
}

pub struct NeonProvider {
    config: NeonConfig,
    client: Client,
    health: ProviderHealth,
}

impl NeonProvider {
    pub fn new(config: NeonConfig, client: Client) -> Self {
        Self {
            config,
            client,
            health: ProviderHealth::new(),
        }
    }

    async fn neon_get(&self, path: &str) -> Result<Value> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProviderError::MissingCredentials("NEON_API_KEY is required".to_string()))?;
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        http::send_json("Neon", self.client.get(&url).bearer_auth(api_key)).await
    }
}

#[async_trait]
impl MonitoringProvider for NeonProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn name(&self) -> &str {
        "Neon Database"
    }

    fn min_interval_secs(&self) -> u64 {
        300
    }

    fn metric_keys(&self) -> &[&'static str] {
        METRIC_KEYS
    }

    fn health(&self) -> &ProviderHealth {
        &self.health
    }

    async fn do_fetch(&self) -> Result<FetchResult> {
        let project_id = self
            .config
            .project_id
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                ProviderError::MissingCredentials("NEON_PROJECT_ID is required".to_string())
            })?;

        let project: ProjectResponse =
            serde_json::from_value(self.neon_get(&format!("/projects/{project_id}")).await?)?;
        let branches: BranchesResponse = serde_json::from_value(
            self.neon_get(&format!("/projects/{project_id}/branches"))
                .await?,
        )?;
        let endpoints: EndpointsResponse = serde_json::from_value(
            self.neon_get(&format!("/projects/{project_id}/endpoints"))
                .await?,
        )?;

        let now = Utc::now();
        let main = select_main_branch(&branches.branches);
        let logical_size = main.and_then(|b| b.logical_size).unwrap_or(0.0);
        let written_bytes = main.and_then(|b| b.written_data_bytes).unwrap_or(0.0);
        let compute_seconds = main.and_then(|b| b.compute_time_seconds).unwrap_or(0.0);

        let project = project.project.unwrap_or_default();
        let data = serde_json::json!({
            "project": {
                "id": project.id,
                "name": project.name,
                "regionId": project.region_id,
                "createdAt": project.created_at,
            },
            "branches": branches.branches.iter().map(|b| serde_json::json!({
                "id": b.id,
                "name": b.name,
                "logicalSize": b.logical_size,
                "writtenDataBytes": b.written_data_bytes,
                "computeTimeSeconds": b.compute_time_seconds,
                "currentState": b.current_state,
            })).collect::<Vec<_>>(),
            "endpoints": endpoints.endpoints.iter().map(|e| serde_json::json!({
                "id": e.id,
                "type": e.kind,
                "currentState": e.current_state,
                "host": e.host,
                "autoscalingLimitMinCu": e.autoscaling_limit_min_cu,
                "autoscalingLimitMaxCu": e.autoscaling_limit_max_cu,
            })).collect::<Vec<_>>(),
        });

        Ok(FetchResult {
            snapshot: ProviderSnapshot {
                provider_id: PROVIDER_ID.to_string(),
                data,
                fetched_at: now,
            },
            metrics: vec![
                MetricPoint::new(METRIC_SIZE_BYTES, logical_size, "bytes", now),
                MetricPoint::new(METRIC_COMPUTE_SECONDS, compute_seconds, "seconds", now),
                MetricPoint::new(METRIC_WRITTEN_BYTES, written_bytes, "bytes", now),
            ],
        })
    }
}
