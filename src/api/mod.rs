//! HTTP API: routing and server bootstrap.

mod chat;
mod types;

pub use chat::{chat_stream, to_wire, ChatStreamParams};
pub use types::{HealthResponse, WireEvent};

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent::AgentEngine;
use crate::config::Config;
use crate::llm::GroqClient;
use crate::session::{InMemorySessionStore, SessionStore};
use crate::tools::{TavilySearch, Tool, ToolRegistry};

/// Shared state for all request handlers.
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub engine: Arc<AgentEngine>,
}

/// Build the router with the given state.
pub fn router(state: Arc<AppState>) -> Router {
    // The browser client is served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat_stream", get(chat::chat_stream))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Start the HTTP server and serve until shutdown.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());

    let llm = Arc::new(GroqClient::new(
        config.groq_api_key.clone(),
        config.model.clone(),
        config.temperature,
    ));

    let search: Arc<dyn Tool> = Arc::new(TavilySearch::new(
        config.tavily_api_key.clone(),
        config.search_max_results,
    ));
    let tools = Arc::new(ToolRegistry::new(vec![search]));

    let engine = Arc::new(AgentEngine::new(
        llm,
        tools,
        store.clone(),
        config.max_tool_rounds,
    ));

    let state = Arc::new(AppState { store, engine });
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
