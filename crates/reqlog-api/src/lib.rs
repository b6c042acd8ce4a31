//! Admin REST API over the captured request store
//!
//! Browse, search, delete and prune stored requests, report completed
//! requests from another process, and edit capture settings at runtime.

pub mod handlers;
pub mod models;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use reqlog_capture::{Observer, RequestStore, RetentionTask};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across handlers
pub struct AppState {
    pub store: RequestStore,
    pub observer: Observer,
    pub retention: RetentionTask,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "reqlog API",
        version = "0.1.0",
        description = "REST API for browsing and managing captured outbound HTTP requests"
    ),
    paths(
        handlers::health_check,
        handlers::list_requests,
        handlers::get_request,
        handlers::delete_request,
        handlers::bulk_delete_requests,
        handlers::submit_event,
        handlers::run_cleanup,
        handlers::get_settings,
        handlers::update_settings,
    ),
    components(
        schemas(
            models::RequestSummary,
            models::RequestList,
            models::RequestDetail,
            models::RequestListQuery,
            models::BulkDeleteRequest,
            models::BulkDeleteResponse,
            models::BulkDeleteFailureBody,
            models::CleanupResponse,
            models::CompletionEventBody,
            models::CaptureResponse,
            models::CodeClassesBody,
            models::SettingsBody,
            models::HealthResponse,
            models::ErrorResponse,
        )
    ),
    tags(
        (name = "requests", description = "Stored request browsing and deletion"),
        (name = "capture", description = "Event intake and retention"),
        (name = "settings", description = "Runtime capture settings"),
        (name = "system", description = "System health and info endpoints")
    )
)]
pub struct ApiDoc;

/// API server configuration
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Enable CORS (for development)
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            enable_cors: true,
        }
    }
}

/// API Server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, observer: Observer, retention: RetentionTask) -> Self {
        let state = Arc::new(AppState {
            store: observer.store().clone(),
            observer,
            retention,
        });

        Self { config, state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let api_doc = ApiDoc::openapi();

        let api_router = Router::new()
            .route("/api/health", get(handlers::health_check))
            .route("/api/requests", get(handlers::list_requests))
            .route(
                "/api/requests/{id}",
                get(handlers::get_request).delete(handlers::delete_request),
            )
            .route(
                "/api/requests/bulk-delete",
                post(handlers::bulk_delete_requests),
            )
            .route("/api/events", post(handlers::submit_event))
            .route("/api/cleanup", post(handlers::run_cleanup))
            .route(
                "/api/settings",
                get(handlers::get_settings).put(handlers::update_settings),
            )
            .with_state(self.state.clone());

        // SwaggerUi also serves /api/openapi.json
        let mut router = Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", api_doc))
            .merge(api_router)
            .layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                    .allow_headers(Any)
                    .allow_origin(Any),
            );
        }

        router
    }

    /// Start the API server
    pub async fn start(self) -> Result<(), anyhow::Error> {
        let router = self.build_router();

        info!("Starting API server on {}", self.config.bind_addr);
        info!(
            "OpenAPI spec: http://{}/api/openapi.json",
            self.config.bind_addr
        );
        info!("Swagger UI: http://{}/swagger-ui", self.config.bind_addr);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        axum::serve(listener, router)
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/api/requests"));
        assert!(doc.paths.paths.contains_key("/api/requests/{id}"));
    }
}
