//! Server test utilities.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use imageio_core::config::AppConfig;
use imageio_server::{AppState, create_control_router, create_router};
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;
use tower::ServiceExt;

/// Both routers over one shared state, with a scratch directory for images.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: Router,
    pub control_router: Router,
    pub state: AppState,
    temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        Self::with_config(AppConfig::for_testing(temp_dir.path()), temp_dir)
    }

    pub fn with_config(config: AppConfig, temp_dir: TempDir) -> Self {
        imageio_server::metrics::register_metrics();
        let state = AppState::new(config);
        Self {
            router: create_router(state.clone()),
            control_router: create_control_router(state.clone()),
            state,
            temp_dir,
        }
    }

    /// Scratch directory for image files.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Send a request to the images router.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Send a request to the control router.
    pub async fn send_control(&self, request: Request<Body>) -> Response {
        self.control_router.clone().oneshot(request).await.unwrap()
    }

    /// Send an empty-bodied request to the images router.
    pub async fn request(&self, method: &str, uri: &str) -> Response {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Send a JSON request to the control router.
    pub async fn control_json(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = match body {
            Some(v) => Body::from(serde_json::to_vec(&v).unwrap()),
            None => Body::empty(),
        };
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(body)
            .unwrap();
        let response = self.send_control(request).await;
        let status = response.status();
        (status, json_body(response).await)
    }
}

/// Collect a response body.
#[allow(dead_code)]
pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Collect a response body as JSON, or Null when empty.
#[allow(dead_code)]
pub async fn json_body(response: Response) -> Value {
    let bytes = body_bytes(response).await;
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    }
}
