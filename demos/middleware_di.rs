//! Middleware whose dependencies come from the container.

use axum::http::HeaderValue;
use axum::routing::get;
use axum_autowire::prelude::*;
use axum_autowire::testing::with_test_app;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct Metrics {
    requests: AtomicU64,
}

#[derive(Injectable)]
pub struct CountRequests {
    metrics: Arc<Metrics>,
}

#[async_trait]
impl Middleware for CountRequests {
    async fn dispatch(&self, request: Request, next: Next) -> Response {
        let seen = self.metrics.requests.fetch_add(1, Ordering::Relaxed) + 1;
        let mut response = next.run(request).await;
        response
            .headers_mut()
            .insert("x-request-number", HeaderValue::from(seen));
        response
    }
}

#[derive(Injectable)]
pub struct ApiVersion {
    #[inject(component = "api-version")]
    version: Arc<String>,
}

#[async_trait]
impl Middleware for ApiVersion {
    async fn dispatch(&self, request: Request, next: Next) -> Response {
        let mut response = next.run(request).await;
        if let Ok(value) = HeaderValue::from_str(&self.version) {
            response.headers_mut().insert("x-api-version", value);
        }
        response
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let health = ApiRouter::with_prefix("/health")
        .route("/", get(|| async { "ok" }))
        .into_handle();

    let provider = Provider::new("Observability")
        .provide(Metrics {
            requests: AtomicU64::new(0),
        })
        .provide_named("api-version", "2024-06".to_string())
        .middleware::<CountRequests>()
        .middleware::<ApiVersion>()
        .router(&health);

    let app = Application::new("Middleware demo", "1.0.0", [provider]);

    with_test_app(app, |client| async move {
        for _ in 0..3 {
            let response = client.get("/health").await?;
            tracing::info!(
                "{} request #{} (api {})",
                response.status(),
                response.header("x-request-number").unwrap_or("?"),
                response.header("x-api-version").unwrap_or("?"),
            );
        }
        Ok::<_, anyhow::Error>(())
    })
    .await
}
