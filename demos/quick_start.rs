//! Routers declared in providers, served until Ctrl+C.
//!
//! ```text
//! cargo run --example quick_start
//! curl http://127.0.0.1:8000/users
//! ```

use axum::routing::get;
use axum_autowire::prelude::*;
use tower_http::trace::TraceLayer;

pub trait UserRepository: Send + Sync {
    fn names(&self) -> Vec<String>;
}

pub struct InMemoryUsers;

impl UserRepository for InMemoryUsers {
    fn names(&self) -> Vec<String> {
        vec!["ada".to_string(), "grace".to_string()]
    }
}

#[derive(Injectable)]
pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    fn list(&self) -> Vec<String> {
        self.repository.names()
    }

    fn find(&self, name: &str) -> Option<String> {
        self.list().into_iter().find(|known| known == name)
    }
}

async fn list_users(Inject(users): Inject<UserService>) -> Json<Vec<String>> {
    Json(users.list())
}

async fn get_user(
    Inject(users): Inject<UserService>,
    Path(name): Path<String>,
) -> std::result::Result<String, StatusCode> {
    users.find(&name).ok_or(StatusCode::NOT_FOUND)
}

async fn about(Inject(info): Inject<AppInfo>) -> String {
    format!("{} {}", info.title, info.version)
}

fn main() -> axum_autowire::Result<()> {
    tracing_subscriber::fmt::init();

    let users = ApiRouter::with_prefix("/users")
        .tag("users")
        .route("/", get(list_users))
        .route("/{name}", get(get_user))
        .layer(TraceLayer::new_for_http())
        .into_handle();
    let meta = ApiRouter::new().route("/about", get(about)).into_handle();

    let user_provider = Provider::new("UserProvider")
        .provide(InMemoryUsers)
        .bind::<dyn UserRepository, InMemoryUsers, _>(|users| users as Arc<dyn UserRepository>)
        .provide_injectable::<UserService>()
        .router(&users);
    let meta_provider = Provider::new("MetaProvider").router(&meta);

    let mut app = Application::builder("Users API")
        .version("1.0.0")
        .summary("Quick start")
        .providers([user_provider, meta_provider])
        .build();

    app.serve_blocking(&ServerConfig::default())
}
