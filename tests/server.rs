use axum::routing::get;
use axum::Json;
use axum_autowire::{
    ApiRouter, Application, AutowireError, Inject, Provider, ServerConfig, StopStatus,
};
use serde_json::{json, Value};
use std::time::Duration;

struct Inventory {
    items: Vec<&'static str>,
}

async fn list_items(Inject(inventory): Inject<Inventory>) -> Json<Value> {
    Json(json!({ "items": inventory.items }))
}

fn app() -> Application {
    let router = ApiRouter::with_prefix("/items")
        .route("/", get(list_items))
        .into_handle();
    let provider = Provider::new("Inventory")
        .provide(Inventory {
            items: vec!["hammer", "nails"],
        })
        .router(&router);

    Application::builder("Inventory")
        .version("1.0.0")
        .provider(provider)
        .stop_timeout(Duration::from_secs(5))
        .build()
}

#[test]
fn background_server_answers_and_stops() {
    let mut app = app();
    let addr = app
        .start_background(&ServerConfig::default().with_port(9001))
        .unwrap();
    assert_eq!(addr.port(), 9001);

    let response = reqwest::blocking::get(format!("http://{addr}/items")).unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().unwrap();
    assert_eq!(body, json!({ "items": ["hammer", "nails"] }));

    assert_eq!(app.stop(), StopStatus::Stopped);
    assert!(!app.is_serving());
    assert!(app.container().unwrap().is_closed());
    assert!(reqwest::blocking::get(format!("http://{addr}/items")).is_err());
}

#[test]
fn background_bind_failure_leaves_app_unresolved() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();
    let mut app = app();

    let err = app
        .start_background(&ServerConfig::default().with_port(port))
        .unwrap_err();

    assert!(matches!(err, AutowireError::Bind { .. }));
    assert!(!app.is_resolved());
    assert_eq!(app.stop(), StopStatus::NotRunning);
}

#[tokio::test]
async fn task_server_serves_until_shutdown() {
    let mut app = app();
    let addr = app
        .start(&ServerConfig::default().with_port(0))
        .await
        .unwrap();

    let body = tokio::task::spawn_blocking(move || {
        reqwest::blocking::get(format!("http://{addr}/items"))
            .and_then(|response| response.text())
    })
    .await
    .unwrap()
    .unwrap();
    assert!(body.contains("hammer"));

    assert_eq!(app.shutdown().await, StopStatus::Stopped);
    assert_eq!(app.shutdown().await, StopStatus::NotRunning);
}
