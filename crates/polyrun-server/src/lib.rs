//! HTTP and WebSocket front end for the polyrun execution engine.
//!
//! Batch runs and output comparison are plain JSON endpoints. Interactive runs
//! use one WebSocket per console: the client sends `run` and `stdin` actions
//! and receives output as it is produced.

pub mod error;
pub mod ws;

pub use error::{Result, ServerError};

use axum::extract::{DefaultBodyLimit, Json as AxumJson, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{Json, Response};
use axum::routing::{get, post};
use axum::{middleware, Router};
use polyrun_core::{compare_outputs, ExecutionEngine};
use polyrun_types::{
    CompareRequest, CompareResponse, LanguageInfo, RunConvertedRequest, RunResponse,
    RunSourceRequest,
};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

type HandlerError = (StatusCode, Json<serde_json::Value>);

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Enable CORS
    pub enable_cors: bool,
    /// CORS allowed origins (if None, allows any origin)
    pub cors_origins: Option<Vec<String>>,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Enable request logging
    pub enable_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            enable_cors: true,
            cors_origins: None,
            max_body_size: 1024 * 1024,
            enable_logging: true,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self> {
        self.bind_addr = addr
            .parse()
            .map_err(|e| ServerError::config_error(format!("Invalid bind address: {}", e)))?;
        Ok(self)
    }

    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    /// Set allowed CORS origins. An empty list allows any origin.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = if origins.is_empty() { None } else { Some(origins) };
        self
    }

    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: ExecutionEngine,
}

fn error_response(error: &str, err: ServerError) -> HandlerError {
    log::warn!("{}: {}", error, err);
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({
            "error": error,
            "error_type": err.error_type(),
            "details": err.to_string(),
            "timestamp": chrono::Utc::now()
        })),
    )
}

/// Handler for the /api/languages GET endpoint.
async fn languages_handler(State(app_state): State<AppState>) -> Json<Vec<LanguageInfo>> {
    let registry = app_state.engine.registry();
    let languages = app_state
        .engine
        .availability()
        .into_iter()
        .map(|status| LanguageInfo {
            language: status.language.canonical().to_string(),
            aliases: status
                .language
                .aliases()
                .iter()
                .map(|alias| alias.to_string())
                .collect(),
            compiled: registry
                .pipelines()
                .any(|p| p.language == status.language && p.needs_compile()),
            program: status.program,
            available: status.available,
        })
        .collect();
    Json(languages)
}

/// Handler for the /api/run_source/ POST endpoint.
async fn run_source_handler(
    State(app_state): State<AppState>,
    AxumJson(request): AxumJson<RunSourceRequest>,
) -> std::result::Result<Json<RunResponse>, HandlerError> {
    request
        .validate()
        .map_err(|e| error_response("Missing code or language", e.into()))?;
    log::info!("Batch run of source program ({})", request.source_lang);

    let outcome = app_state
        .engine
        .run_batch(&request.source_lang, &request.source_code, &request.stdin)
        .await;
    Ok(Json(RunResponse {
        output: outcome.output,
        success: outcome.success,
    }))
}

/// Handler for the /api/run_converted/ POST endpoint.
async fn run_converted_handler(
    State(app_state): State<AppState>,
    AxumJson(request): AxumJson<RunConvertedRequest>,
) -> std::result::Result<Json<RunResponse>, HandlerError> {
    request
        .validate()
        .map_err(|e| error_response("Missing converted code or language", e.into()))?;
    log::info!("Batch run of converted program ({})", request.converted_lang);

    let outcome = app_state
        .engine
        .run_batch(&request.converted_lang, &request.converted_code, &request.stdin)
        .await;
    Ok(Json(RunResponse {
        output: outcome.output,
        success: outcome.success,
    }))
}

/// Handler for the /api/compare/ POST endpoint.
async fn compare_handler(AxumJson(request): AxumJson<CompareRequest>) -> Json<CompareResponse> {
    Json(compare_outputs(
        &request.original_output,
        &request.converted_output,
    ))
}

/// Handler for the /ws/run upgrade.
async fn run_socket_handler(
    State(app_state): State<AppState>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let engine = app_state.engine.clone();
    upgrade.on_upgrade(move |socket| ws::handle_socket(socket, engine))
}

pub struct PolyrunServer {
    engine: ExecutionEngine,
    config: ServerConfig,
}

impl PolyrunServer {
    pub fn new(engine: ExecutionEngine) -> Self {
        Self {
            engine,
            config: ServerConfig::default(),
        }
    }

    pub fn with_config(engine: ExecutionEngine, config: ServerConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            engine: self.engine.clone(),
        };

        let mut router = Router::new()
            .route("/health", get(|| async {
                Json(HealthResponse {
                    status: "healthy".to_string(),
                    timestamp: chrono::Utc::now(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                })
            }))
            .route("/api/languages", get(languages_handler))
            .route("/api/run_source/", post(run_source_handler))
            .route("/api/run_converted/", post(run_converted_handler))
            .route("/api/compare/", post(compare_handler))
            .route("/ws/run", get(run_socket_handler))
            .layer(DefaultBodyLimit::max(self.config.max_body_size))
            .with_state(state);

        if self.config.enable_logging {
            router = router.layer(middleware::from_fn(
                |request: axum::http::Request<axum::body::Body>, next: axum::middleware::Next| async {
                    let request_id = uuid::Uuid::new_v4().to_string();
                    let method = request.method().clone();
                    let uri = request.uri().clone();

                    // Health probes are frequent and uninteresting.
                    if uri.path() == "/health" {
                        log::debug!("Request {} {} {}", request_id, method, uri);
                    } else {
                        log::info!("Request {} {} {}", request_id, method, uri);
                    }

                    let start = std::time::Instant::now();
                    let response = next.run(request).await;
                    let duration = start.elapsed();

                    log::debug!(
                        "Response {} {} in {:?}",
                        request_id,
                        response.status(),
                        duration
                    );
                    response
                },
            ));
        }

        router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            let cors_layer = match &self.config.cors_origins {
                Some(origins) => {
                    let origins: std::result::Result<Vec<_>, _> =
                        origins.iter().map(|s| s.parse()).collect();
                    match origins {
                        Ok(origins) => CorsLayer::new()
                            .allow_origin(origins)
                            .allow_methods(Any)
                            .allow_headers(Any),
                        Err(_) => {
                            log::warn!("Invalid CORS origin configured, allowing any origin");
                            CorsLayer::permissive()
                        }
                    }
                }
                None => CorsLayer::permissive(),
            };
            router = router.layer(cors_layer);
        }

        router
    }

    /// Start the server with graceful shutdown support.
    ///
    /// The server will shut down when the provided shutdown signal is received.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| {
                ServerError::config_error(format!(
                    "Failed to bind to {}: {}",
                    self.config.bind_addr, e
                ))
            })?;

        let addr = self.config.bind_addr;
        log::info!("polyrun server starting on {}", addr);
        log::info!("Health check: http://{}/health", addr);
        log::info!("Batch run: http://{}/api/run_source/", addr);
        log::info!("Interactive run: ws://{}/ws/run", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))?;

        log::info!("polyrun server shut down gracefully");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}
