use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// `"UP"` or `"DOWN"`.
    pub status: &'static str,
}

impl ComponentHealth {
    fn from_ok(ok: bool) -> Self {
        Self {
            status: if ok { "UP" } else { "DOWN" },
        }
    }
}

/// Health check response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub app: ComponentHealth,
    /// Whether the user store answered a ping.
    pub store: ComponentHealth,
}

/// GET /health -- returns service and store health.
///
/// Responds 200 while everything is up and 503 when the store is down, so
/// orchestrators can act on the status code alone.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store_healthy = match state.directory.store().ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            false
        }
    };

    let status = if store_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            app: ComponentHealth::from_ok(true),
            store: ComponentHealth::from_ok(store_healthy),
        }),
    )
}

/// Mount health check routes (served on the management listener).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
