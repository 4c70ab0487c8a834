use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use lead_checkpoint::SqliteCheckpointStore;
use lead_core::config::RouterConfig;
use lead_crm::http::HttpCrmClient;
use lead_crm::types::Channel;
use lead_events::EventBus;
use lead_graph::{GraphRuntime, Node, RuntimeConfig};
use lead_llm::AnthropicGenerator;

/// Central shared state for the gateway's HTTP handlers.
pub struct AppState {
    pub config: RouterConfig,
    pub runtime: GraphRuntime,
}

impl AppState {
    pub fn new(config: RouterConfig) -> anyhow::Result<Self> {
        let crm = Arc::new(HttpCrmClient::new(&config.crm));
        let checkpoint = Arc::new(SqliteCheckpointStore::open(&config.checkpoint.store_path)?);
        let events = Arc::new(EventBus::new());
        let generator = Arc::new(AnthropicGenerator::new(
            config.generator.api_key.clone(),
            config.generator.model.clone(),
            Some(config.generator.base_url.clone()),
        ));

        let tz_offset_hours: i32 = std::env::var("LEAD_TZ_OFFSET_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let specialists: [Arc<dyn Node>; 3] = [
            Arc::new(lead_specialists::RoleA::new(generator.clone())),
            Arc::new(lead_specialists::RoleB::new(generator.clone())),
            Arc::new(lead_specialists::RoleC::new(
                generator,
                crm.clone(),
                config.crm.calendar_id.clone(),
                tz_offset_hours,
            )),
        ];

        let runtime = GraphRuntime::new(RuntimeConfig {
            crm,
            checkpoint,
            events,
            specialists,
            channel: parse_channel(&config.webhook.channel),
        });

        Ok(Self { config, runtime })
    }
}

fn parse_channel(raw: &str) -> Channel {
    match raw.to_lowercase().as_str() {
        "sms" => Channel::Sms,
        _ => Channel::WhatsApp,
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/webhooks/crm", post(crate::http::webhook::webhook_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
