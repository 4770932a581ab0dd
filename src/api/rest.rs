// =============================================================================
// REST API — Axum Router
// =============================================================================
//
// Routes:
//   GET /api/v1/health                     public health + request stats
//   GET /api/v1/chart                      authenticated, configured defaults
//   GET /api/v1/chart/:symbol/:interval    authenticated, returns image/png
//
// CORS is permissive; the chart route is protected by the bearer token.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api::auth::AuthBearer;
use crate::app_state::AppState;
use crate::error::SignalError;
use crate::pipeline::ChartRequest;

/// Build the REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/v1/chart", get(default_chart))
        .route("/api/v1/chart/:symbol/:interval", get(chart))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.health_snapshot())
}

async fn default_chart(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> Response {
    let request = {
        let cfg = state.runtime_config.read();
        ChartRequest::new(&cfg.symbol, &cfg.interval)
    };
    render(&state, request).await
}

async fn chart(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path((symbol, interval)): Path<(String, String)>,
) -> Response {
    render(&state, ChartRequest::new(&symbol, &interval)).await
}

async fn render(state: &AppState, request: ChartRequest) -> Response {
    info!(symbol = %request.symbol, interval = %request.interval, "chart requested over HTTP");

    match state.generate_chart(request).await {
        Ok(artifact) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "image/png".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("inline; filename=\"{}\"", artifact.file_name),
                ),
            ],
            artifact.png,
        )
            .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// Map a pipeline failure to an HTTP status and JSON body.
fn error_response(err: &SignalError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match err {
        SignalError::NoData { .. } => StatusCode::NOT_FOUND,
        SignalError::Collaborator(_) => StatusCode::BAD_GATEWAY,
        SignalError::InsufficientData { .. } | SignalError::MalformedCandle { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SignalError::RenderingFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(serde_json::json!({
            "error": err.kind(),
            "message": err.to_string(),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_mapping() {
        let no_data = SignalError::NoData { symbol: "X".into(), interval: "1m".into() };
        assert_eq!(error_response(&no_data).0, StatusCode::NOT_FOUND);
        assert_eq!(
            error_response(&SignalError::Collaborator("timeout".into())).0,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            error_response(&SignalError::RenderingFailure("empty".into())).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_body_carries_kind() {
        let (_, Json(body)) = error_response(&SignalError::Collaborator("timeout".into()));
        assert_eq!(body["error"], "CollaboratorFailure");
        assert!(body["message"].as_str().unwrap().contains("timeout"));
    }
}
