use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::get;
use axum_autowire::testing::{start_test, stop_test, with_test_app};
use axum_autowire::{
    async_trait, ApiRouter, Application, AutowireError, Container, Inject, Injectable,
    Middleware, MiddlewareClass, Provider, StopStatus,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub struct Clock {
    ticks: AtomicUsize,
}

impl Clock {
    fn tick(&self) -> usize {
        self.ticks.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Injectable)]
pub struct RequestCounter {
    clock: Arc<Clock>,
}

#[async_trait]
impl Middleware for RequestCounter {
    async fn dispatch(&self, request: Request, next: Next) -> Response {
        let count = self.clock.tick();
        let mut response = next.run(request).await;
        response
            .headers_mut()
            .insert("x-request-count", HeaderValue::from(count));
        response
    }
}

#[derive(Injectable)]
pub struct ServerName;

#[async_trait]
impl Middleware for ServerName {
    async fn dispatch(&self, request: Request, next: Next) -> Response {
        let mut response = next.run(request).await;
        response
            .headers_mut()
            .insert("x-server", HeaderValue::from_static("autowire"));
        response
    }
}

async fn list_users() -> &'static str {
    "users"
}

async fn list_posts() -> &'static str {
    "posts"
}

fn users_router() -> axum_autowire::RouterHandle {
    ApiRouter::with_prefix("/users")
        .route("/", get(list_users))
        .into_handle()
}

fn posts_router() -> axum_autowire::RouterHandle {
    ApiRouter::with_prefix("/posts")
        .route("/", get(list_posts))
        .into_handle()
}

#[tokio::test]
async fn routers_from_separate_providers_keep_registration_order() {
    let users = users_router();
    let posts = posts_router();
    let mut app = Application::new(
        "Blog",
        "1.0.0",
        [
            Provider::new("UserProvider").router(&users),
            Provider::new("PostProvider").router(&posts),
        ],
    );

    app.resolve().await.unwrap();

    assert_eq!(app.routers().len(), 2);
    assert!(ApiRouter::same(&app.routers()[0], &users));
    assert!(ApiRouter::same(&app.routers()[1], &posts));
    app.close().await;
}

#[tokio::test]
async fn same_router_declared_twice_is_mounted_once() {
    let users = users_router();
    let mut app = Application::new(
        "Users",
        "1.0.0",
        [
            Provider::new("First").router(&users),
            Provider::new("Second").router(&users),
        ],
    );

    let client = start_test(&mut app).await.unwrap();

    assert_eq!(app.routers().len(), 1);
    assert_eq!(client.get("/users").await.unwrap().text(), "users");
    stop_test(&mut app).await;
}

#[tokio::test]
async fn distinct_routers_with_the_same_route_fail_to_resolve() {
    let mut app = Application::new(
        "Users",
        "1.0.0",
        [
            Provider::new("First").router(&users_router()),
            Provider::new("Second").router(&users_router()),
        ],
    );

    let err = app.resolve().await.unwrap_err();

    assert!(matches!(err, AutowireError::RouteConflict { ref router, .. } if router == "/users"));
    assert!(!app.is_resolved());
    assert!(app.container().is_none());
}

#[tokio::test]
async fn injected_middleware_runs_on_requests() {
    let provider = Provider::new("Infrastructure")
        .provide(Clock {
            ticks: AtomicUsize::new(0),
        })
        .middleware::<RequestCounter>()
        .router(&users_router());
    let mut app = Application::new("Users", "1.0.0", [provider]);

    let client = start_test(&mut app).await.unwrap();
    let first = client.get("/users").await.unwrap();
    let second = client.get("/users").await.unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.header("x-request-count"), Some("1"));
    assert_eq!(second.header("x-request-count"), Some("2"));
    stop_test(&mut app).await;
}

#[tokio::test]
async fn middleware_keeps_collected_order() {
    let provider = Provider::new("Middleware")
        .provide(Clock {
            ticks: AtomicUsize::new(0),
        })
        .middleware::<ServerName>()
        .middleware::<RequestCounter>()
        .middleware::<ServerName>();
    let mut app = Application::new("Ordered", "1.0.0", [provider]);

    app.resolve().await.unwrap();

    assert_eq!(
        app.middleware(),
        &[
            MiddlewareClass::of::<ServerName>(),
            MiddlewareClass::of::<RequestCounter>()
        ]
    );
    app.close().await;
}

#[tokio::test]
async fn resolve_twice_does_not_duplicate() {
    let provider = Provider::new("Everything")
        .provide(Clock {
            ticks: AtomicUsize::new(0),
        })
        .middleware::<RequestCounter>()
        .router(&users_router())
        .router(&posts_router());
    let mut app = Application::new("Twice", "1.0.0", [provider]);

    app.resolve().await.unwrap();
    app.resolve().await.unwrap();

    assert_eq!(app.routers().len(), 2);
    assert_eq!(app.middleware().len(), 1);
    assert_eq!(app.web().routers().len(), 2);
    app.close().await;
}

#[tokio::test]
async fn empty_registries_mount_nothing() {
    let mut app = Application::new("Empty", "1.0.0", [Provider::new("Nothing").provide(1_u32)]);

    let client = start_test(&mut app).await.unwrap();

    assert!(app.routers().is_empty());
    assert!(app.middleware().is_empty());
    assert!(app.web().routers().is_empty());
    assert!(app.web().middleware().is_empty());
    assert_eq!(
        client.get("/").await.unwrap().status(),
        StatusCode::NOT_FOUND
    );
    stop_test(&mut app).await;
}

#[test]
fn stop_without_start_is_a_no_op() {
    let mut app = Application::new("Idle", "1.0.0", []);
    assert_eq!(app.stop(), StopStatus::NotRunning);
}

#[tokio::test]
async fn handlers_resolve_provider_dependencies() {
    struct Greeting(String);

    async fn greet(Inject(greeting): Inject<Greeting>) -> String {
        greeting.0.clone()
    }

    let router = ApiRouter::with_prefix("/greet")
        .route("/", get(greet))
        .into_handle();
    let provider = Provider::new("Greeting")
        .provide_with(|container: Container| async move {
            let info = container.get::<axum_autowire::AppInfo>().await?;
            Ok::<_, anyhow::Error>(Greeting(format!("hello from {}", info.title)))
        })
        .router(&router);

    let result = with_test_app(
        Application::new("Greeter", "1.0.0", [provider]),
        |client| async move {
            let response = client
                .request(Request::get("/greet").body(Body::empty()).unwrap())
                .await?;
            assert_eq!(response.text(), "hello from Greeter");
            Ok::<_, AutowireError>(())
        },
    )
    .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn finalizers_run_once_on_shutdown() {
    struct Pool(&'static str);

    let log = Arc::new(Mutex::new(Vec::new()));
    let first_log = Arc::clone(&log);

    let provider = Provider::new("Pools")
        .provide(Pool("primary"))
        .provide_named("replica", Pool("replica"))
        .finalize::<Pool, _, _>(move |pool| {
            let log = Arc::clone(&first_log);
            async move { log.lock().unwrap().push(pool.0) }
        });
    let mut app = Application::new("Pools", "1.0.0", [provider]);
    app.resolve().await.unwrap();

    let container = app.container().unwrap().clone();
    container.get::<Pool>().await.unwrap();

    assert_eq!(app.shutdown().await, StopStatus::NotRunning);
    assert_eq!(app.shutdown().await, StopStatus::NotRunning);
    assert_eq!(*log.lock().unwrap(), vec!["primary"]);
    assert!(matches!(
        container.get::<Pool>().await,
        Err(AutowireError::ContainerClosed)
    ));
}

#[tokio::test]
async fn with_test_app_closes_container_on_failure() {
    let closed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&closed);
    let provider = Provider::new("Tracked")
        .provide(Clock {
            ticks: AtomicUsize::new(0),
        })
        .finalize::<Clock, _, _>(move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .middleware::<RequestCounter>();

    let result: Result<(), AutowireError> =
        with_test_app(Application::new("Failing", "1.0.0", [provider]), |_client| async {
            Err(AutowireError::Internal("test failed".to_string()))
        })
        .await;

    assert!(matches!(result, Err(AutowireError::Internal(_))));
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}
