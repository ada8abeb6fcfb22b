use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use haul_core::testutil::MockEngine;
use haul_core::{ServiceConfig, SharedEngine};
use haul_server::routes;
use haul_server::state::AppState;

pub const TEST_ADMIN_TOKEN: &str = "test-admin-token";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub engine: MockEngine,
    _dir: TempDir,
}

impl TestApp {
    /// Send a request and return the status plus the parsed JSON body (Null if not JSON).
    pub async fn send(&self, request: Request<Body>) -> (axum::http::StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }
}

/// App backed by a succeeding mock engine and a configured admin token.
pub async fn setup_test_app() -> TestApp {
    setup_with(MockEngine::succeeding(), Some(TEST_ADMIN_TOKEN)).await
}

/// App with admin endpoints disabled.
pub async fn setup_test_app_no_auth() -> TestApp {
    setup_with(MockEngine::succeeding(), None).await
}

pub async fn setup_test_app_with_engine(engine: MockEngine) -> TestApp {
    setup_with(engine, Some(TEST_ADMIN_TOKEN)).await
}

async fn setup_with(engine: MockEngine, admin_token: Option<&str>) -> TestApp {
    let dir = TempDir::new().unwrap();
    let config = ServiceConfig {
        downloads_dir: dir.path().join("downloads"),
        cookies_dir: dir.path().join("cookies"),
        ..ServiceConfig::default()
    };

    let state = Arc::new(
        AppState::from_config(
            &config,
            SharedEngine::new(engine.clone()),
            admin_token.map(str::to_string),
        )
        .await
        .unwrap(),
    );

    TestApp {
        router: routes::router(state.clone()),
        state,
        engine,
        _dir: dir,
    }
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}
