//! Test helpers
//!
//! Resolve an [`Application`] without opening a socket and drive it
//! in-process through `tower::ServiceExt::oneshot`.
//!
//! ```rust
//! use axum_autowire::testing::with_test_app;
//! use axum_autowire::{ApiRouter, Application, AutowireError, Provider};
//! use axum::routing::get;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), AutowireError> {
//! let health = ApiRouter::with_prefix("/health")
//!     .route("/", get(|| async { "ok" }))
//!     .into_handle();
//! let app = Application::new("svc", "1.0.0", [Provider::new("Health").router(&health)]);
//!
//! with_test_app(app, |client| async move {
//!     let response = client.get("/health").await?;
//!     assert_eq!(response.text(), "ok");
//!     Ok::<_, AutowireError>(())
//! })
//! .await
//! # }
//! ```

use crate::error::{AutowireError, Result};
use crate::lifecycle::{Application, StopStatus};
use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::Router;
use serde::de::DeserializeOwned;
use std::future::Future;
use tower::ServiceExt;

/// Resolve `app` for in-process testing and return a client for it.
///
/// Pending registrations of a shared context are restored from their declared
/// mirrors first, so a context drained by an earlier application can be reused.
pub async fn start_test(app: &mut Application) -> Result<TestClient> {
    app.restore_registrations();
    app.resolve().await?;
    let router = app.router().ok_or(AutowireError::NotResolved)?.clone();
    Ok(TestClient::new(router))
}

/// Stop anything `app` is serving and close its container
pub async fn stop_test(app: &mut Application) -> StopStatus {
    app.shutdown().await
}

/// Run `test` against a resolved `app`, closing the container afterwards
/// whether the test succeeds or fails.
pub async fn with_test_app<F, Fut, T, E>(mut app: Application, test: F) -> std::result::Result<T, E>
where
    F: FnOnce(TestClient) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: From<AutowireError>,
{
    let client = start_test(&mut app).await?;
    let outcome = test(client).await;
    stop_test(&mut app).await;
    outcome
}

/// In-process client for a materialised application router
#[derive(Clone)]
pub struct TestClient {
    router: Router,
}

impl TestClient {
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    pub async fn request(&self, request: Request) -> Result<TestResponse> {
        let response = match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|err| AutowireError::Internal(format!("failed to read body: {err}")))?;

        Ok(TestResponse {
            status,
            headers,
            body,
        })
    }

    pub async fn get(&self, uri: &str) -> Result<TestResponse> {
        let request = Request::get(uri)
            .body(Body::empty())
            .map_err(|err| AutowireError::Internal(format!("invalid request: {err}")))?;
        self.request(request).await
    }
}

#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}
