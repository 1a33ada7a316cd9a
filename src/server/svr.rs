use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::stream::handle_websocket;
use super::sync::handle_sync;
use crate::config::Config;
use crate::pipeline::Pipeline;

pub struct AppState {
    api_token: String,
    pipeline: Pipeline,
}

impl AppState {
    pub fn new(api_token: impl Into<String>, pipeline: Pipeline) -> Self {
        Self {
            api_token: api_token.into(),
            pipeline,
        }
    }

    pub fn api_token(&self) -> &str {
        &self.api_token
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

/// Describe the service and its endpoints.
async fn handle_root() -> impl IntoResponse {
    let info = serde_json::json!({
        "name": "pinner",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "sync": "POST /sync",
            "websocket": "GET /websocket"
        }
    });

    Json(info)
}

pub fn build_app(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/sync", post(handle_sync))
        .route("/websocket", get(handle_websocket))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub async fn startup(config: Config) -> std::io::Result<()> {
    let app_state = Arc::new(AppState::new(config.api_token.clone(), config.pipeline()));
    let app = build_app(app_state);

    let listener = TcpListener::bind(&config.addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(
        %addr,
        directory = %config.directory.display(),
        store = %config.store_bin,
        concurrency = ?config.concurrency,
        "starting server"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
