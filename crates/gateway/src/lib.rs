//! HTTP gateway for ForkReach.
//!
//! Serves the streaming chat endpoint, routing and discovery endpoints, and
//! the device-scoped conversation/product records. Built on Axum; every
//! route shares one [`AppState`].

pub mod chat;
pub mod device;
pub mod error;
pub mod records;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use forkreach_agents::ResponseStreamer;
use forkreach_config::AppConfig;
use forkreach_core::event::EventBus;
use forkreach_core::store::RecordStore;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

/// Shared application state.
pub struct AppState {
    pub config: AppConfig,
    pub streamer: Arc<ResponseStreamer>,
    pub store: Arc<dyn RecordStore>,
    pub events: Arc<EventBus>,
}

pub type SharedState = Arc<AppState>;

/// Build the Axum router with all routes and layers.
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.gateway.cors_origins);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat::chat_handler))
        .route("/api/stream", post(chat::prompt_stream_handler))
        .route("/api/agents", get(chat::agents_handler))
        .route("/api/route", post(chat::route_handler))
        .route("/api/models", get(chat::models_handler))
        .route("/api/events", get(chat::events_handler))
        .route(
            "/api/conversations",
            get(records::list_conversations).post(records::create_conversation),
        )
        .route(
            "/api/conversations/{id}",
            get(records::get_conversation)
                .put(records::update_conversation)
                .delete(records::delete_conversation),
        )
        .route("/api/conversations/{id}/messages", post(records::add_message))
        .route(
            "/api/products",
            get(records::list_products).post(records::save_product),
        )
        .route(
            "/api/products/{id}",
            get(records::get_product).delete(records::delete_product),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// CORS for the configured browser origins. `"*"` allows any origin
/// without credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(device::DEVICE_HEADER),
        ])
        .expose_headers([HeaderName::from_static(chat::STREAM_PROTOCOL_HEADER)])
        .max_age(Duration::from_secs(3600));

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
}

/// Start the gateway HTTP server and run until Ctrl-C.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let events = Arc::new(EventBus::default());
    let streamer = ResponseStreamer::from_config(&config)?.with_event_bus(Arc::clone(&events));
    let store = forkreach_store::build_from_config(&config.store).await?;

    info!(
        handlers = streamer.router().registry().len(),
        backends = ?streamer.backends().wired_backends(),
        default_model = %streamer.backends().default_model(),
        store = store.name(),
        "Gateway subsystems ready"
    );

    let state = Arc::new(AppState {
        config,
        streamer: Arc::new(streamer),
        store,
        events,
    });
    let app = build_router(state);

    info!(addr = %addr, "Gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

// --- Handlers ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}
