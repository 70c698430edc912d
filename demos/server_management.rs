//! Starting and stopping the embedded server from synchronous code.

use axum::routing::get;
use axum_autowire::prelude::*;
use std::time::Duration;

async fn status(Inject(info): Inject<AppInfo>) -> String {
    format!("{} is running", info.title)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let router = ApiRouter::with_prefix("/status")
        .route("/", get(status))
        .into_handle();
    let provider = Provider::new("Status")
        .router(&router)
        .finalize::<AppInfo, _, _>(|info| async move {
            tracing::info!("Releasing resources of {}", info.title);
        });

    let mut app = Application::builder("Server management")
        .provider(provider)
        .stop_timeout(Duration::from_secs(2))
        .build();

    let addr = app.start_background(&ServerConfig::default().with_port(9001))?;
    tracing::info!("Background server on http://{}/status", addr);

    let body = reqwest::blocking::get(format!("http://{addr}/status"))?.text()?;
    tracing::info!("GET /status -> {}", body);

    match app.stop() {
        StopStatus::Stopped => tracing::info!("Server stopped"),
        other => tracing::warn!("Server stop: {:?}", other),
    }
    Ok(())
}
