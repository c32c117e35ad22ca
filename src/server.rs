//! Streamable HTTP transport
//!
//! Axum server exposing the MCP dispatcher at one JSON-RPC endpoint, plus a
//! health check. CORS, optional request tracing and graceful shutdown.

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::browser::BrowserPool;
use crate::config::ServerConfig;
use crate::mcp::McpServer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub mcp: Arc<McpServer>,
    /// Reported on `/health` when present
    pub pool: Option<Arc<BrowserPool>>,
}

/// HTTP server for the MCP endpoint
pub struct HttpServer {
    config: ServerConfig,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: ServerConfig, mcp: Arc<McpServer>, pool: Option<Arc<BrowserPool>>) -> Self {
        Self {
            config,
            state: AppState { mcp, pool },
        }
    }

    /// Build the router with all routes and middleware
    pub fn build_router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

        let mut router = Router::new()
            .route(
                &self.config.path,
                post(rpc_handler).get(method_not_allowed),
            )
            .route("/health", get(health_handler))
            .with_state(self.state.clone())
            .layer(cors);

        if self.config.log_requests {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Start the server and run until shutdown signal
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.socket_addr();
        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("MCP endpoint available at {}", self.config.endpoint_url());

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("HTTP server shut down gracefully");
        Ok(())
    }
}

/// One JSON-RPC message per POST; notifications are acknowledged with 202
async fn rpc_handler(State(state): State<AppState>, body: String) -> Response {
    match state.mcp.handle_message(&body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// No server-initiated stream is offered
async fn method_not_allowed() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let browser = state.pool.as_ref().map(|pool| pool.stats());
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "tools": state.mcp.tools().len(),
        "browser": browser,
    }))
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Tool, ToolRegistry, ToolResult, ToolSchema};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::new(
            ToolSchema::new("get_travel_season", "Куда поехать в разные сезоны"),
            |_params| async move {
                Ok(ToolResult::success(
                    "get_travel_season",
                    "{\n    \"tour_items\": [],\n    \"total_count\": 0\n}".to_string(),
                ))
            },
        ));
        let server = HttpServer::new(
            ServerConfig::default(),
            Arc::new(McpServer::new(registry)),
            None,
        );
        server.build_router()
    }

    fn rpc(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/mcp")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["tools"], 1);
        assert!(json["browser"].is_null());
    }

    #[tokio::test]
    async fn test_tools_list_over_http() {
        let response = app()
            .oneshot(rpc(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["result"]["tools"][0]["name"], "get_travel_season");
    }

    #[tokio::test]
    async fn test_notification_accepted() {
        let response = app()
            .oneshot(rpc(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let response = app().oneshot(rpc("not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_get_on_endpoint_not_allowed() {
        let response = app()
            .oneshot(Request::builder().uri("/mcp").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
