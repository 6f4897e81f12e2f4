use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single scalar observation produced by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPoint {
    pub key: String,
    pub value: f64,
    pub unit: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl MetricPoint {
    pub fn new(key: &str, value: f64, unit: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            key: key.to_string(),
            value,
            unit: unit.to_string(),
            tags: HashMap::new(),
            timestamp,
        }
    }
}

/// The latest full payload fetched from one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSnapshot {
    pub provider_id: String,
    pub data: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub snapshot: ProviderSnapshot,
    pub metrics: Vec<MetricPoint>,
}

/// Self-reported provider health, driven by consecutive fetch failures.
///
/// # Examples
///
/// ```
/// use pulsemon_common::types::ProviderStatus;
///
/// assert_eq!(ProviderStatus::from_consecutive_errors(0), ProviderStatus::Healthy);
/// assert_eq!(ProviderStatus::from_consecutive_errors(2), ProviderStatus::Degraded);
/// assert_eq!(ProviderStatus::from_consecutive_errors(3), ProviderStatus::Error);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Healthy,
    Degraded,
    Error,
}

impl ProviderStatus {
    pub fn from_consecutive_errors(errors: u32) -> Self {
        match errors {
            0 => ProviderStatus::Healthy,
            1 | 2 => ProviderStatus::Degraded,
            _ => ProviderStatus::Error,
        }
    }
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderStatus::Healthy => write!(f, "healthy"),
            ProviderStatus::Degraded => write!(f, "degraded"),
            ProviderStatus::Error => write!(f, "error"),
        }
    }
}

/// Outcome of one orchestration attempt for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    Success,
    Error,
    Skipped,
}

impl IngestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionStatus::Success => "success",
            IngestionStatus::Error => "error",
            IngestionStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IngestionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(IngestionStatus::Success),
            "error" => Ok(IngestionStatus::Error),
            "skipped" => Ok(IngestionStatus::Skipped),
            _ => Err(format!("unknown ingestion status: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub provider_id: String,
    pub status: IngestionStatus,
    pub metrics_count: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertEventType {
    Fired,
    Resolved,
}

impl AlertEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertEventType::Fired => "fired",
            AlertEventType::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for AlertEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fired" => Ok(AlertEventType::Fired),
            "resolved" => Ok(AlertEventType::Resolved),
            _ => Err(format!("unknown alert event type: {s}")),
        }
    }
}

/// A titled value pair rendered inside a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeField {
    pub title: String,
    pub value: String,
    #[serde(default)]
    pub short: bool,
}

/// Channel-agnostic notification produced by an alert transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertNotice {
    pub kind: AlertEventType,
    pub text: String,
    pub fields: Vec<NoticeField>,
    /// Target channel override; `None` means the webhook's default.
    pub channel: Option<String>,
    pub timestamp: DateTime<Utc>,
}
