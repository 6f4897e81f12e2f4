use crate::config::ServerConfig;
use crate::cycle::MonitorCycle;
use crate::ingest::ProviderRegistry;
use chrono::{DateTime, Utc};
use pulsemon_storage::MonitorStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MonitorStore>,
    pub registry: Arc<ProviderRegistry>,
    pub cycle: Arc<MonitorCycle>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}
