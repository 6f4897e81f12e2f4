use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use pulsemon_server::app;
use pulsemon_server::config::{RulesSeedFile, ServerConfig};
use pulsemon_server::rule_seed;
use pulsemon_server::scheduler::MonitorScheduler;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  pulsemon-server [config.toml]                          Start the HTTP server");
    eprintln!("  pulsemon-server ingest [config.toml]                   Run one ingest + alert cycle");
    eprintln!("  pulsemon-server retention [config.toml]                Run one retention sweep");
    eprintln!("  pulsemon-server init-rules <config.toml> <rules.json>  Initialize alert rules from seed file");
    eprintln!();
    eprintln!("Environment variables (DATABASE_URL, CRON_SECRET, SLACK_WEBHOOK_URL, VERCEL_*, NEON_*, AXIOM_*) override the config file.");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pulsemon=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("ingest") => run_ingest(args.get(2).map(String::as_str)).await,
        Some("retention") => run_retention(args.get(2).map(String::as_str)).await,
        Some("init-rules") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-rules requires <config.toml> and <rules.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-rules requires <rules.json> argument")
            })?;
            run_init_rules(config_path, seed_path).await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        other => run_server(other).await,
    }
}

fn load_config(path: Option<&str>) -> Result<ServerConfig> {
    let config = ServerConfig::load_with_env(path)?;
    ensure_sqlite_dir(&config.database.url)?;
    Ok(config)
}

/// Creates the parent directory of a file-backed SQLite URL.
fn ensure_sqlite_dir(db_url: &str) -> Result<()> {
    let Some(rest) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or(rest);
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
async fn run_ingest(config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let state = app::bootstrap(config).await?;
    let report = state.cycle.run_ingest().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[allow(clippy::print_stdout)]
async fn run_retention(config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let state = app::bootstrap(config).await?;
    let report = state.cycle.run_retention().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Initialize alert rules from a JSON seed file.
async fn run_init_rules(config_path: &str, seed_path: &str) -> Result<()> {
    let config = load_config(Some(config_path))?;
    let store = pulsemon_storage::MonitorStore::new(&config.database.url).await?;

    let seed_content = std::fs::read_to_string(seed_path)
        .map_err(|e| anyhow::anyhow!("Failed to read seed file '{}': {}", seed_path, e))?;
    let seed: RulesSeedFile = serde_json::from_str(&seed_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{}': {}", seed_path, e))?;

    rule_seed::init_rules_from_seed(&store, &seed).await?;
    Ok(())
}

async fn run_server(config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;

    tracing::info!(
        http_port = config.http_port,
        cron_auth = config.cron_secret().is_some(),
        scheduler = config.scheduler.enabled,
        "pulsemon-server starting"
    );

    if config.cron_secret().is_none() {
        tracing::warn!("No cron_secret configured; /cron/* routes accept unauthenticated requests");
    }

    let state = app::bootstrap(config).await?;
    let config = state.config.clone();

    let scheduler_handle = if config.scheduler.enabled {
        let scheduler = Arc::new(MonitorScheduler::new(
            state.cycle.clone(),
            config.scheduler.ingest_tick_secs,
            config.scheduler.retention_tick_secs,
        ));
        Some(tokio::spawn(async move {
            scheduler.run().await;
        }))
    } else {
        tracing::info!("In-process scheduler disabled; waiting for /cron/* calls");
        None
    };

    let app = app::build_http_app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    if let Some(handle) = scheduler_handle {
        handle.abort();
    }
    Ok(())
}
