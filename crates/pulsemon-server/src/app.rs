use crate::alerting::AlertEvaluator;
use crate::config::ServerConfig;
use crate::cycle::MonitorCycle;
use crate::ingest::ProviderRegistry;
use crate::state::AppState;
use crate::{api, logging};
use axum::middleware;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use pulsemon_notify::{NotificationChannel, SlackWebhookChannel};
use pulsemon_providers::MonitoringProvider;
use pulsemon_storage::MonitorStore;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "pulsemon API",
        description = "pulsemon 运维监控 REST API",
    ),
    tags(
        (name = "Health", description = "服务健康检查"),
        (name = "Cron", description = "定时任务入口"),
        (name = "Alerts", description = "告警规则与历史"),
        (name = "Metrics", description = "指标查询"),
        (name = "Providers", description = "数据源状态与采集日志")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "cron_auth",
            utoipa::openapi::security::SecurityScheme::Http(utoipa::openapi::security::Http::new(
                utoipa::openapi::security::HttpAuthScheme::Bearer,
            )),
        );
    }
}

pub fn build_http_app(state: AppState) -> Router {
    let (public_router, public_spec) = api::public_routes().split_for_parts();
    let (cron_router, cron_spec) = api::cron_routes().split_for_parts();

    let mut merged_spec = ApiDoc::openapi();
    merged_spec.merge(public_spec);
    merged_spec.merge(cron_spec);
    let spec = Arc::new(merged_spec);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public_router
        .merge(cron_router.layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::cron_auth_middleware,
        )))
        .with_state(state)
        .route(
            "/openapi.json",
            get(move || {
                let spec = spec.clone();
                async move { Json(spec.as_ref().clone()) }
            }),
        )
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}

/// Wires the registry, evaluator and cycle runner around an open store.
pub fn build_state(
    store: Arc<MonitorStore>,
    providers: Vec<Arc<dyn MonitoringProvider>>,
    notifier: Arc<dyn NotificationChannel>,
    config: ServerConfig,
) -> AppState {
    let mut registry = ProviderRegistry::new(store.clone());
    for provider in providers {
        registry.register(provider);
    }
    let registry = Arc::new(registry);

    let evaluator = AlertEvaluator::new(store.clone(), notifier);
    let cycle = Arc::new(MonitorCycle::new(
        registry.clone(),
        evaluator,
        store.clone(),
        config.retention.clone(),
    ));

    AppState {
        store,
        registry,
        cycle,
        start_time: Utc::now(),
        config: Arc::new(config),
    }
}

/// Opens the database and builds the default providers and Slack notifier.
pub async fn bootstrap(config: ServerConfig) -> anyhow::Result<AppState> {
    let store = Arc::new(MonitorStore::new(&config.database.url).await?);
    let providers = pulsemon_providers::build_default_providers(&config.providers)?;

    let client =
        pulsemon_providers::http::build_client(config.providers.request_timeout_secs)?;
    let slack = SlackWebhookChannel::new(config.slack.clone(), client);
    if !slack.is_configured() {
        tracing::warn!("No Slack webhook configured; alert notifications will be skipped");
    }

    Ok(build_state(store, providers, Arc::new(slack), config))
}
