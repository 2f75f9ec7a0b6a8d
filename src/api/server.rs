//! HTTP server implementation for the API

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::analysis::AccentAnalyzer;
use crate::config::Config;

use super::models::{AnalyzeRequest, ApiResponse};
use super::handlers;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<AccentAnalyzer>,
    pub config: Arc<Config>,
}

/// Configure and start the HTTP server
pub async fn start_http_server(
    analyzer: Arc<AccentAnalyzer>,
    config: Arc<Config>,
    port: u16,
) -> Result<()> {
    info!("🚀 Starting HTTP server on port {}", port);

    let app_state = AppState { analyzer, config };

    // Configure CORS to allow browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/analyze", post(analyze_handler))
        .route("/api/report", post(report_handler))
        .with_state(app_state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("🌐 API server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(handlers::health_check()))
}

/// Run a full analysis for a submitted video URL
async fn analyze_handler(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    if request.url.trim().is_empty() {
        let response: ApiResponse<()> = ApiResponse::error("url must not be empty".to_string());
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!(response))).into_response();
    }

    let result = handlers::analyze(&state.analyzer, &request.url).await;
    (StatusCode::OK, Json(serde_json::json!(ApiResponse::success(result)))).into_response()
}

/// Run a full analysis and return the plain-text report
async fn report_handler(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    if request.url.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "url must not be empty".to_string()).into_response();
    }

    let report = handlers::analyze_to_report(&state.analyzer, &request.url).await;
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"accent_report.txt\"",
            ),
        ],
        report,
    )
        .into_response()
}
