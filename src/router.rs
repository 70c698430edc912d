//! Router adapter
//!
//! [`ApiRouter`] wraps an `axum::Router` and forwards the usual registration
//! calls. What it adds is a [`RouteHandling`] strategy, applied when the
//! application mounts the router. The default, [`InjectedRoutes`], attaches
//! the application's container to every request so handlers can take
//! [`Inject<T>`](crate::Inject) arguments.

use crate::di::Container;
use crate::error::{AutowireError, Result};
use axum::extract::Request;
use axum::handler::Handler;
use axum::response::IntoResponse;
use axum::routing::{MethodRouter, Route};
use axum::{Extension, Router};
use std::any::Any;
use std::convert::Infallible;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tower::{Layer, Service};

/// Shared reference to a declared router. Identity is the `Arc`.
pub type RouterHandle = Arc<ApiRouter>;

/// How a router's requests are prepared before they reach its handlers.
pub trait RouteHandling: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn prepare(&self, routes: Router, container: &Container) -> Router;
}

/// Attach the active container to each request entering the router.
#[derive(Debug, Clone, Copy, Default)]
pub struct InjectedRoutes;

impl RouteHandling for InjectedRoutes {
    fn name(&self) -> &'static str {
        "injected"
    }

    fn prepare(&self, routes: Router, container: &Container) -> Router {
        routes.layer(Extension(container.clone()))
    }
}

/// Plain axum handling; `Inject<T>` is rejected on these routes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRoutes;

impl RouteHandling for PlainRoutes {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn prepare(&self, routes: Router, _container: &Container) -> Router {
        routes
    }
}

/// A group of routes sharing a path prefix, mounted by the application.
///
/// # Example
/// ```
/// use axum_autowire::ApiRouter;
/// use axum::routing::get;
///
/// let router = ApiRouter::with_prefix("users/")
///     .tag("users")
///     .route("/", get(|| async { "all users" }))
///     .into_handle();
///
/// assert_eq!(router.prefix(), Some("/users"));
/// ```
#[derive(Clone)]
pub struct ApiRouter {
    prefix: Option<String>,
    tags: Vec<String>,
    routes: Router,
    handling: Arc<dyn RouteHandling>,
}

impl Default for ApiRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiRouter {
    /// Create a router without prefix
    pub fn new() -> Self {
        Self {
            prefix: None,
            tags: Vec::new(),
            routes: Router::new(),
            handling: Arc::new(InjectedRoutes),
        }
    }

    /// Create a router mounted under `prefix`
    ///
    /// The prefix is normalised to a leading slash and no trailing slash;
    /// an empty prefix or `/` means "no prefix".
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: normalize_prefix(&prefix.into()),
            ..Self::new()
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Override the per-router handling strategy
    pub fn route_handling(mut self, handling: impl RouteHandling) -> Self {
        self.handling = Arc::new(handling);
        self
    }

    pub fn route(mut self, path: &str, method_router: MethodRouter) -> Self {
        self.routes = self.routes.route(path, method_router);
        self
    }

    pub fn nest(mut self, path: &str, router: Router) -> Self {
        self.routes = self.routes.nest(path, router);
        self
    }

    pub fn merge<R: Into<Router>>(mut self, other: R) -> Self {
        self.routes = self.routes.merge(other);
        self
    }

    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.routes = self.routes.layer(layer);
        self
    }

    pub fn fallback<H, T>(mut self, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.routes = self.routes.fallback(handler);
        self
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn handling(&self) -> &'static str {
        self.handling.name()
    }

    pub fn into_handle(self) -> RouterHandle {
        Arc::new(self)
    }

    /// Whether two handles refer to the same declared router
    pub fn same(a: &RouterHandle, b: &RouterHandle) -> bool {
        Arc::ptr_eq(a, b)
    }

    /// Mount this router's routes onto `app`.
    ///
    /// axum panics when a route or a fallback overlaps one that is already
    /// mounted; that panic is reported as [`AutowireError::RouteConflict`].
    pub(crate) fn mount(&self, app: Router, container: &Container) -> Result<Router> {
        let routes = self.handling.prepare(self.routes.clone(), container);
        let prefix = self.prefix.clone();
        panic::catch_unwind(AssertUnwindSafe(move || match prefix.as_deref() {
            Some(prefix) => app.nest(prefix, routes),
            None => app.merge(routes),
        }))
        .map_err(|payload| AutowireError::RouteConflict {
            router: self.prefix.clone().unwrap_or_else(|| "/".to_string()),
            reason: panic_message(payload.as_ref()),
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "overlapping routes".to_string()
    }
}

impl fmt::Debug for ApiRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRouter")
            .field("prefix", &self.prefix)
            .field("tags", &self.tags)
            .field("handling", &self.handling.name())
            .finish()
    }
}

fn normalize_prefix(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{trimmed}"))
    }
}
