use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use roster_api::config::ServerConfig;
use roster_api::router::{build_app_router, build_management_router};
use roster_api::state::AppState;
use roster_db::MemoryUserStore;
use roster_directory::{DirectoryConfig, UserDirectory};
use roster_events::{BusConfig, EventBus, OverflowPolicy};
use tower::ServiceExt;

/// A fully wired application over the in-memory store.
pub struct TestApp {
    pub api: Router,
    pub management: Router,
    pub store: Arc<MemoryUserStore>,
    pub bus: Arc<EventBus>,
}

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        management_port: 0,
        ..ServerConfig::default()
    }
}

/// Build the API and management routers with the production middleware
/// stack. The bus never waits on a full subscriber.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryUserStore::new());
    let bus = Arc::new(EventBus::new(BusConfig {
        capacity: 8,
        overflow: OverflowPolicy::DropNewest,
    }));
    let directory = UserDirectory::new(
        store.clone(),
        Arc::clone(&bus),
        DirectoryConfig {
            store_timeout: Duration::from_secs(2),
        },
    );
    let state = AppState {
        directory: Arc::new(directory),
    };

    TestApp {
        api: build_app_router(state.clone(), &config),
        management: build_management_router(state),
        store,
        bus,
    }
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn with_json(
    app: Router,
    method: Method,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    with_json(app, Method::POST, uri, body).await
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    with_json(app, Method::PUT, uri, body).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
