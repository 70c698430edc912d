//! # axum-autowire
//!
//! Dependency-injection-driven routers and middleware for axum.
//!
//! Routers and middleware are declared inside [`Provider`] descriptors next to
//! the dependencies they need. When an [`Application`] resolves, it walks its
//! providers, builds a [`Container`], collects every declared router and
//! middleware type, and mounts them on a single `axum::Router` with the
//! container attached to each request.
//!
//! ## Features
//!
//! - **Declarative registration**: routers and middleware live in providers, not in `main`
//! - **Handler injection**: `Inject<T>` extractor resolves from the application container
//! - **Middleware with DI**: middleware types are built from the container
//! - **Trait object support**: inject `Arc<dyn Trait>` with a registered binding
//! - **Server management**: blocking, async, background-thread and task modes with graceful stop
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum_autowire::prelude::*;
//! use axum::routing::get;
//!
//! #[derive(Injectable)]
//! pub struct UserService;
//!
//! impl UserService {
//!     pub fn list(&self) -> Vec<&'static str> {
//!         vec!["ada", "grace"]
//!     }
//! }
//!
//! async fn list_users(Inject(users): Inject<UserService>) -> Json<Vec<&'static str>> {
//!     Json(users.list())
//! }
//!
//! fn main() -> axum_autowire::Result<()> {
//!     let users = ApiRouter::with_prefix("/users")
//!         .route("/", get(list_users))
//!         .into_handle();
//!
//!     let provider = Provider::new("UserProvider")
//!         .provide_injectable::<UserService>()
//!         .router(&users);
//!
//!     let mut app = Application::new("Users API", "1.0.0", [provider]);
//!     app.serve_blocking(&ServerConfig::default())
//! }
//! ```

// Lets `#[derive(Injectable)]` expand to `::axum_autowire::..` paths inside this crate.
extern crate self as axum_autowire;

pub mod di;
pub mod error;
pub mod lifecycle;
pub mod middleware;
pub mod registry;
pub mod router;
pub mod testing;
pub mod web;

// Re-export core types
pub use di::{Container, ContainerBuilder, Inject, Injectable, Provide, Provider};
pub use error::{AutowireError, Result};
pub use lifecycle::{Application, ApplicationBuilder, ServerConfig, StopStatus};
pub use middleware::{Middleware, MiddlewareClass};
pub use router::{ApiRouter, InjectedRoutes, PlainRoutes, RouteHandling, RouterHandle};
pub use web::{AppInfo, WebApp};

// Re-export macros
pub use axum_autowire_macros::Injectable;

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use axum_autowire::prelude::*;
/// ```
pub mod prelude {
    pub use crate::di::{Container, ContainerBuilder, Inject, Injectable, Provide, Provider};
    pub use crate::error::{AutowireError, Result};
    pub use crate::lifecycle::{Application, ApplicationBuilder, ServerConfig, StopStatus};
    pub use crate::middleware::{Middleware, MiddlewareClass};
    pub use crate::router::{ApiRouter, RouterHandle};
    pub use crate::web::AppInfo;
    pub use axum_autowire_macros::Injectable;
    pub use async_trait::async_trait;
    pub use axum::{
        Json, Router,
        extract::{Path, Query, Request},
        http::StatusCode,
        middleware::Next,
        response::{IntoResponse, Response},
    };
    pub use std::sync::Arc;
}
