//! Relational persistence for metric points, provider snapshots and
//! schedules, alert rules with their event history, and the ingestion log.
//!
//! Everything goes through [`store::MonitorStore`], a thin SeaORM layer whose
//! schema is owned by the `migration` crate.

pub mod entities;
pub mod error;
pub mod store;


pub use error::{Result, StorageError};
pub use store::{
    AlertConfigRow, AlertConfigUpdate, AlertEventRow, IngestionLogRow, MetricRow, MonitorStore,
    NewAlertConfig, NewAlertEvent, NewIngestionLog, ProviderConfigRow, ProviderSnapshotRow,
};
