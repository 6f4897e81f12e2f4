use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};

use crate::error::Result;

pub mod alert;
pub mod ingestion;
pub mod metric;
pub mod provider;

// ---- 公开 Row 类型（从各子模块重新导出）----
pub use alert::{AlertConfigRow, AlertConfigUpdate, AlertEventRow, NewAlertConfig, NewAlertEvent};
pub use ingestion::{IngestionLogRow, NewIngestionLog};
pub use metric::MetricRow;
pub use provider::{ProviderConfigRow, ProviderSnapshotRow};

/// 监控数据库的统一访问层。
///
/// 所有方法均为 `async fn`，底层使用 SeaORM。单条语句依赖数据库自身的原子性，
/// 告警触发/恢复这类多行写入包在事务中。
pub struct MonitorStore {
    pub(crate) db: DatabaseConnection,
}

impl MonitorStore {
    /// 连接并初始化数据库。
    ///
    /// - `db_url`：完整的连接 URL，例如 `sqlite://data/pulsemon.db?mode=rwc`。
    ///
    /// 自动运行 `sea-orm-migration` 迁移，确保 Schema 最新。
    pub async fn new(db_url: &str) -> Result<Self> {
        let db = Database::connect(db_url).await?;

        // WAL 模式仅对 SQLite 有效
        if db_url.starts_with("sqlite:") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await?;
        tracing::info!(db_url = %db_url, "Initialized monitor store");

        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
