pub mod alerting;
pub mod api;
pub mod app;
pub mod config;
pub mod cycle;
pub mod ingest;
pub mod logging;
pub mod middleware;
pub mod retention;
pub mod rule_seed;
pub mod scheduler;
pub mod state;
