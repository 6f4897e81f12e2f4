use pulsemon_notify::SlackConfig;
use pulsemon_providers::ProvidersConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Shared secret for the `/cron/*` routes. Unset means the routes are open.
    #[serde(default)]
    pub cron_secret: Option<String>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            cron_secret: None,
            database: DatabaseConfig::default(),
            slack: SlackConfig::default(),
            providers: ProvidersConfig::default(),
            retention: RetentionConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Age limits, in days, applied by the retention sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_metric_days")]
    pub metric_days: u32,
    #[serde(default = "default_ingestion_log_days")]
    pub ingestion_log_days: u32,
    #[serde(default = "default_alert_history_days")]
    pub alert_history_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            metric_days: default_metric_days(),
            ingestion_log_days: default_ingestion_log_days(),
            alert_history_days: default_alert_history_days(),
        }
    }
}

/// In-process scheduler. Disabled by default; an external cron calling
/// `/cron/ingest` is the primary trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_ingest_tick_secs")]
    pub ingest_tick_secs: u64,
    #[serde(default = "default_retention_tick_secs")]
    pub retention_tick_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ingest_tick_secs: default_ingest_tick_secs(),
            retention_tick_secs: default_retention_tick_secs(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "sqlite://data/pulsemon.db?mode=rwc".to_string()
}

fn default_metric_days() -> u32 {
    90
}

fn default_ingestion_log_days() -> u32 {
    30
}

fn default_alert_history_days() -> u32 {
    90
}

fn default_ingest_tick_secs() -> u64 {
    60
}

fn default_retention_tick_secs() -> u64 {
    86400
}

// ---- Rules seed file types (used by `init-rules` CLI subcommand) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesSeedFile {
    #[serde(default)]
    pub rules: Vec<SeedAlertRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedAlertRule {
    pub name: String,
    pub metric_key: String,
    pub condition: String,
    pub threshold: f64,
    #[serde(default)]
    pub consecutive_breaches: Option<i32>,
    #[serde(default)]
    pub cooldown_seconds: Option<i64>,
    #[serde(default)]
    pub slack_channel: Option<String>,
    #[serde(default = "default_seed_enabled")]
    pub enabled: bool,
}

fn default_seed_enabled() -> bool {
    true
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise starts from defaults. Environment
    /// variables are applied on top in both cases.
    pub fn load_with_env(path: Option<&str>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// The configured cron secret. Blank values count as unset.
    pub fn cron_secret(&self) -> Option<&str> {
        self.cron_secret.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Overrides fields from `lookup`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = get("CRON_SECRET") {
            self.cron_secret = Some(v);
        }
        if let Some(v) = get("SLACK_WEBHOOK_URL") {
            self.slack.webhook_url = Some(v);
        }

        let p = &mut self.providers;
        if let Some(v) = get("VERCEL_API_TOKEN") {
            p.vercel.token = Some(v);
        }
        if let Some(v) = get("VERCEL_PROJECT_ID") {
            p.vercel.project_id = Some(v);
        }
        if let Some(v) = get("VERCEL_TEAM_ID") {
            p.vercel.team_id = Some(v);
        }
        if let Some(v) = get("NEON_API_KEY") {
            p.neon.api_key = Some(v);
        }
        if let Some(v) = get("NEON_PROJECT_ID") {
            p.neon.project_id = Some(v);
        }
        if let Some(v) = get("AXIOM_TOKEN") {
            p.axiom.token = Some(v);
        }
        if let Some(v) = get("AXIOM_ORG_ID") {
            p.axiom.org_id = Some(v);
        }
        if let Some(v) = get("AXIOM_DATASET") {
            p.axiom.dataset = v;
        }
    }
}
