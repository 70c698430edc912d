//! The underlying web application.
//!
//! [`WebApp`] is the thin layer between the [`Application`](crate::Application)
//! and axum: it records routers and middleware classes as they are registered
//! and materialises them into a single `axum::Router` once a container is
//! attached.

use crate::di::Container;
use crate::error::{AutowireError, Result};
use crate::middleware::{self, MiddlewareClass};
use crate::router::RouterHandle;
use axum::Router;
use std::sync::{Arc, OnceLock};

/// Application metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub title: String,
    pub version: String,
    pub summary: String,
    pub description: String,
}

impl AppInfo {
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            summary: String::new(),
            description: String::new(),
        }
    }
}

/// Runs when the serve loop exits: closes the attached container, if any.
#[derive(Clone)]
pub struct ShutdownHook {
    state: Arc<OnceLock<Container>>,
}

impl ShutdownHook {
    pub async fn run(self) {
        match self.state.get() {
            Some(container) => container.close().await,
            None => tracing::debug!("Shutdown hook: no container attached"),
        }
    }
}

pub struct WebApp {
    info: AppInfo,
    routers: Vec<RouterHandle>,
    middleware: Vec<MiddlewareClass>,
    state: Arc<OnceLock<Container>>,
}

impl WebApp {
    pub fn new(info: AppInfo) -> Self {
        Self {
            info,
            routers: Vec::new(),
            middleware: Vec::new(),
            state: Arc::new(OnceLock::new()),
        }
    }

    pub fn info(&self) -> &AppInfo {
        &self.info
    }

    pub fn include_router(&mut self, router: RouterHandle) {
        tracing::debug!("Including router {:?}", router.prefix().unwrap_or("/"));
        self.routers.push(router);
    }

    /// Add a middleware class. Classes added first end up outermost.
    pub fn add_middleware(&mut self, class: MiddlewareClass) {
        tracing::debug!("Adding middleware {}", class.name());
        self.middleware.push(class);
    }

    pub fn routers(&self) -> &[RouterHandle] {
        &self.routers
    }

    pub fn middleware(&self) -> &[MiddlewareClass] {
        &self.middleware
    }

    pub fn container(&self) -> Option<&Container> {
        self.state.get()
    }

    pub(crate) fn attach_container(&self, container: Container) -> Result<()> {
        self.state
            .set(container)
            .map_err(|_| AutowireError::Internal("a container is already attached".to_string()))
    }

    pub fn shutdown_hook(&self) -> ShutdownHook {
        ShutdownHook {
            state: Arc::clone(&self.state),
        }
    }

    /// Materialise routers and middleware into one `axum::Router`.
    ///
    /// Routers are mounted first because axum layers only wrap routes that
    /// already exist. Middleware is then layered in reverse so the first class
    /// added becomes the outermost layer.
    pub async fn build(&self) -> Result<Router> {
        let container = self.container().ok_or(AutowireError::NotResolved)?;

        let mut app = Router::new();
        for router in &self.routers {
            app = router.mount(app, container)?;
        }

        for class in self.middleware.iter().rev() {
            let instance = class.instantiate(container.clone()).await?;
            app = middleware::apply(app, instance);
        }

        tracing::info!(
            "{} {} ready: {} routers, {} middleware",
            self.info.title,
            self.info.version,
            self.routers.len(),
            self.middleware.len()
        );
        Ok(app)
    }
}

impl std::fmt::Debug for WebApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebApp")
            .field("info", &self.info)
            .field("routers", &self.routers)
            .field("middleware", &self.middleware)
            .field("container", &self.state.get().is_some())
            .finish()
    }
}
