//! Application Bootstrap
//!
//! [`Application`] wires provider descriptors, the DI container and the
//! [`WebApp`] together. Nothing happens at construction time: the container is
//! built, the routers and middleware are collected and the axum router is
//! materialised when [`Application::resolve`] runs, either explicitly or as the
//! first step of any serve variant.

use super::server::ServerHandle;
use crate::di::{Container, ContainerBuilder, Provider};
use crate::error::Result;
use crate::middleware::MiddlewareClass;
use crate::registry::{MiddlewareCollector, RegistrationContext, RouterCollector, SharedRegistrations};
use crate::router::RouterHandle;
use crate::web::{AppInfo, WebApp};
use axum::Router;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

/// An axum application whose routers, middleware and dependencies come from
/// provider descriptors.
///
/// # Example
///
/// ```rust
/// use axum_autowire::{ApiRouter, Application, Inject, Provider};
/// use axum::routing::get;
///
/// struct Greeting(&'static str);
///
/// async fn hello(Inject(greeting): Inject<Greeting>) -> &'static str {
///     greeting.0
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> axum_autowire::Result<()> {
/// let router = ApiRouter::with_prefix("/hello")
///     .route("/", get(hello))
///     .into_handle();
///
/// let mut app = Application::builder("Greeter")
///     .provider(Provider::new("GreetingProvider").provide(Greeting("hi")).router(&router))
///     .build();
///
/// app.resolve().await?;
/// assert_eq!(app.routers().len(), 1);
/// app.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Application {
    info: AppInfo,
    providers: Vec<Provider>,
    registrations: Option<SharedRegistrations>,
    stop_timeout: Option<Duration>,
    web: WebApp,
    router: Option<Router>,
    pub(super) server: Option<ServerHandle>,
}

/// Everything `resolve` needs, detached from the application so it can run on
/// another thread's runtime.
pub(super) struct ResolveInputs {
    info: AppInfo,
    providers: Vec<Provider>,
    registrations: Option<SharedRegistrations>,
}

/// Result of a successful resolution, committed to the application as a unit.
pub(super) struct Resolved {
    pub(super) web: WebApp,
    pub(super) router: Router,
}

impl Application {
    pub fn new(
        title: impl Into<String>,
        version: impl Into<String>,
        providers: impl IntoIterator<Item = Provider>,
    ) -> Self {
        Self::builder(title).version(version).providers(providers).build()
    }

    pub fn builder(title: impl Into<String>) -> ApplicationBuilder {
        ApplicationBuilder::new(title)
    }

    pub fn info(&self) -> &AppInfo {
        &self.info
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// Routers mounted by the last successful resolution, in collected order
    pub fn routers(&self) -> &[RouterHandle] {
        self.web.routers()
    }

    /// Middleware classes applied by the last successful resolution, in collected order
    pub fn middleware(&self) -> &[MiddlewareClass] {
        self.web.middleware()
    }

    pub fn container(&self) -> Option<&Container> {
        self.web.container()
    }

    /// The materialised axum router, once resolved
    pub fn router(&self) -> Option<&Router> {
        self.router.as_ref()
    }

    pub fn web(&self) -> &WebApp {
        &self.web
    }

    pub fn is_resolved(&self) -> bool {
        self.router.is_some()
    }

    pub(super) fn stop_timeout(&self) -> Option<Duration> {
        self.stop_timeout
    }

    /// Refill the pending lists of an externally supplied registration
    /// context from its declared mirrors.
    ///
    /// Only meaningful when the application was built with
    /// [`ApplicationBuilder::registrations`]; otherwise each resolution walks
    /// the providers into a fresh context anyway.
    pub fn restore_registrations(&self) {
        if let Some(registrations) = &self.registrations {
            registrations
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .restore();
        }
    }

    /// Build the container, collect routers and middleware, and materialise
    /// the axum router.
    ///
    /// Calling this again after success is a no-op. On failure nothing is
    /// committed and the application stays unresolved.
    pub async fn resolve(&mut self) -> Result<()> {
        if self.is_resolved() {
            tracing::debug!("Application {} already resolved", self.info.title);
            return Ok(());
        }

        let resolved = resolve_parts(self.resolve_inputs()).await?;
        self.commit(resolved);
        Ok(())
    }

    pub(super) fn resolve_inputs(&self) -> ResolveInputs {
        ResolveInputs {
            info: self.info.clone(),
            providers: self.providers.clone(),
            registrations: self.registrations.clone(),
        }
    }

    pub(super) fn commit(&mut self, resolved: Resolved) {
        self.web = resolved.web;
        self.router = Some(resolved.router);
    }

    /// Close the container, running its finalizers once in reverse order
    pub async fn close(&self) {
        if let Some(container) = self.web.container() {
            container.close().await;
        }
    }
}

pub(super) async fn resolve_parts(inputs: ResolveInputs) -> Result<Resolved> {
    let ResolveInputs {
        info,
        providers,
        registrations,
    } = inputs;
    tracing::info!("Resolving application {} {}", info.title, info.version);

    let registrations = registrations.unwrap_or_else(|| RegistrationContext::new().shared());
    let container = {
        let mut context = registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut builder = ContainerBuilder::new()
            .context(info.clone())
            .provider(
                &RouterCollector::new(Arc::clone(&registrations)).into_provider(),
                &mut context,
            )
            .provider(
                &MiddlewareCollector::new(Arc::clone(&registrations)).into_provider(),
                &mut context,
            );
        for provider in &providers {
            builder = builder.provider(provider, &mut context);
        }
        builder.build()
    };

    match materialise(info, &container).await {
        Ok(resolved) => Ok(resolved),
        Err(err) => {
            tracing::error!("Failed to resolve application: {}", err);
            container.close().await;
            Err(err)
        }
    }
}

async fn materialise(info: AppInfo, container: &Container) -> Result<Resolved> {
    let routers = container
        .get_named::<Vec<RouterHandle>>(RouterCollector::COMPONENT)
        .await?;
    let middleware = container
        .get_named::<Vec<MiddlewareClass>>(MiddlewareCollector::COMPONENT)
        .await?;

    let mut web = WebApp::new(info);
    for class in middleware.iter() {
        web.add_middleware(class.clone());
    }
    for router in routers.iter() {
        web.include_router(Arc::clone(router));
    }
    web.attach_container(container.clone())?;

    let router = web.build().await?;
    Ok(Resolved { web, router })
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("info", &self.info)
            .field("providers", &self.providers)
            .field("resolved", &self.is_resolved())
            .field("serving", &self.server.is_some())
            .finish()
    }
}

/// Builder for Application
pub struct ApplicationBuilder {
    info: AppInfo,
    providers: Vec<Provider>,
    registrations: Option<SharedRegistrations>,
    stop_timeout: Option<Duration>,
}

impl ApplicationBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            info: AppInfo::new(title, env!("CARGO_PKG_VERSION")),
            providers: Vec::new(),
            registrations: None,
            stop_timeout: None,
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.info.version = version.into();
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.info.summary = summary.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.info.description = description.into();
        self
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn providers(mut self, providers: impl IntoIterator<Item = Provider>) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Collect from an existing registration context instead of a fresh one.
    ///
    /// Routers and middleware registered on it directly (with
    /// [`register_router`](crate::registry::register_router) and
    /// [`register_middleware`](crate::registry::register_middleware)) are
    /// collected alongside those declared by providers.
    pub fn registrations(mut self, registrations: SharedRegistrations) -> Self {
        self.registrations = Some(registrations);
        self
    }

    /// Override the stop timeout of [`ServerConfig`](super::ServerConfig)
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Application {
        Application {
            web: WebApp::new(self.info.clone()),
            info: self.info,
            providers: self.providers,
            registrations: self.registrations,
            stop_timeout: self.stop_timeout,
            router: None,
            server: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AutowireError;
    use crate::registry::register_router;
    use crate::router::ApiRouter;

    #[test]
    fn test_builder_metadata() {
        let app = Application::builder("Shop")
            .version("2.0.0")
            .summary("Online shop")
            .description("Sells things")
            .build();

        assert_eq!(app.info().title, "Shop");
        assert_eq!(app.info().version, "2.0.0");
        assert_eq!(app.info().summary, "Online shop");
        assert!(!app.is_resolved());
        assert!(app.container().is_none());
    }

    #[tokio::test]
    async fn test_app_info_is_injectable() {
        let mut app = Application::new("Shop", "1.0.0", []);
        app.resolve().await.unwrap();

        let info = app.container().unwrap().get::<AppInfo>().await.unwrap();
        assert_eq!(info.title, "Shop");
        assert_eq!(info.version, "1.0.0");
    }

    #[tokio::test]
    async fn test_resolve_twice_keeps_first_container() {
        let router = ApiRouter::with_prefix("/a").into_handle();
        let mut app = Application::new("A", "1.0.0", [Provider::new("P").router(&router)]);

        app.resolve().await.unwrap();
        let first = app.container().unwrap().clone();
        app.resolve().await.unwrap();

        assert_eq!(app.routers().len(), 1);
        assert!(first.contains::<ApiRouter>());
        assert!(!first.is_closed());
    }

    #[tokio::test]
    async fn test_failed_resolve_commits_nothing() {
        let failing = Provider::new("Broken").middleware::<Broken>();
        let mut app = Application::new("A", "1.0.0", [failing]);

        let err = app.resolve().await.unwrap_err();

        assert!(matches!(err, AutowireError::DependencyNotFound { .. }));
        assert!(!app.is_resolved());
        assert!(app.container().is_none());
        assert!(app.routers().is_empty());
    }

    #[tokio::test]
    async fn test_shared_registrations_are_collected() {
        let registrations = RegistrationContext::new().shared();
        let direct = ApiRouter::with_prefix("/direct").into_handle();
        register_router(&mut registrations.lock().unwrap(), &direct);

        let mut app = Application::builder("A")
            .registrations(Arc::clone(&registrations))
            .build();
        app.resolve().await.unwrap();

        assert_eq!(app.routers().len(), 1);
        assert!(ApiRouter::same(&app.routers()[0], &direct));

        let mut second = Application::builder("B")
            .registrations(Arc::clone(&registrations))
            .build();
        second.restore_registrations();
        second.resolve().await.unwrap();
        assert_eq!(second.routers().len(), 1);
    }

    struct Missing;

    #[derive(crate::Injectable)]
    struct Broken {
        #[allow(dead_code)]
        missing: Arc<Missing>,
    }

    #[async_trait::async_trait]
    impl crate::Middleware for Broken {
        async fn dispatch(
            &self,
            request: axum::extract::Request,
            next: axum::middleware::Next,
        ) -> axum::response::Response {
            next.run(request).await
        }
    }
}
