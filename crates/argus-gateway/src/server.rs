//! Router assembly and the HTTP server entry point.

use std::net::SocketAddr;

use axum::http::HeaderValue;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use crate::rest;
use crate::state::AppState;
use crate::ws;

/// Build the CORS layer from the configured allowlist. An empty list
/// leaves CORS closed; a single `*` opens it.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    if origins.iter().any(|o| o == "*") {
        return Some(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(parsed))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// Create the full router.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let router = Router::new()
        // Notifications
        .route(
            "/notifications",
            get(rest::list_notifications).post(rest::create_notification),
        )
        .route("/notifications/stats/summary", get(rest::notification_stats))
        .route(
            "/notifications/{id}",
            get(rest::get_notification)
                .patch(rest::patch_notification)
                .delete(rest::delete_notification),
        )
        .route("/notifications/{id}/respond", post(rest::respond_notification))
        // Alerts
        .route("/alerts", get(rest::list_alerts).post(rest::create_alert))
        .route(
            "/alerts/{id}",
            patch(rest::patch_alert).delete(rest::delete_alert),
        )
        // Trading proxy
        .route("/trading/balance", get(rest::get_balance))
        .route(
            "/trading/positions",
            get(rest::get_positions).post(rest::open_position),
        )
        .route("/trading/positions/{id}", delete(rest::close_position))
        .route(
            "/trading/positions/{id}/stop-loss",
            patch(rest::set_stop_loss),
        )
        .route(
            "/trading/positions/{id}/trailing-stop",
            patch(rest::set_trailing_stop),
        )
        // System
        .route("/system/status", get(rest::system_status))
        .route(
            "/system/sources/{name}/{action}",
            post(rest::source_control),
        )
        // Voice
        .route("/voice/providers", get(rest::voice_providers))
        .route("/voice/synthesize", post(rest::synthesize))
        // Metrics
        .route("/metrics", get(rest::metrics))
        // WebSocket topics
        .route("/ws/notifications", get(ws::ws_notifications))
        .route("/ws/prices", get(ws::ws_prices))
        .route("/ws/market-data", get(ws::ws_market_data))
        .with_state(state);

    match cors {
        Some(layer) => router.layer(layer),
        None => router,
    }
}

/// Bind and serve until the process exits.
pub async fn run_server(state: AppState) -> std::io::Result<()> {
    let port = state.config.port;
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "Gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
