//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_origin);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// `*` allows any origin; otherwise a comma-separated allow list
fn cors_layer(client_origin: &str) -> CorsLayer {
    let origin = if client_origin.trim() == "*" {
        AllowOrigin::any()
    } else {
        let allowed: Vec<HeaderValue> = client_origin
            .split(',')
            .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
            .collect();
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([header::CONTENT_TYPE])
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_lobbies: usize,
    active_players: usize,
    connections: usize,
    /// Connections currently inside a lobby
    sessions: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_lobbies: state.registry.active_lobbies(),
        active_players: state.registry.total_players(),
        connections: state.hub.connection_count(),
        sessions: state.sessions.active_sessions(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn state() -> AppState {
        AppState::new(Config::from_lookup(|_| None).unwrap())
    }

    #[tokio::test]
    async fn health_reports_counts() {
        let state = state();
        state.sessions.create_lobby(Uuid::new_v4(), "host").unwrap();
        let router = build_router(state);

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["active_lobbies"], 1);
        assert_eq!(json["active_players"], 1);
        assert_eq!(json["connections"], 0);
        assert_eq!(json["sessions"], 1);
    }

    #[tokio::test]
    async fn cors_allows_configured_origin() {
        let router = Router::new()
            .route("/health", get(|| async { "ok" }))
            .layer(cors_layer("http://localhost:5173, https://race.example"));

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://race.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://race.example"
        );
    }
}
