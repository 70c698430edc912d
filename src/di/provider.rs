use crate::di::provide::{Finalizer, Key, Provide};
use crate::di::{Container, ContainerBuilder, Injectable};
use crate::middleware::{Middleware, MiddlewareClass};
use crate::registry::{register_middleware, register_router, RegistrationContext};
use crate::router::RouterHandle;
use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

#[derive(Clone)]
enum Directive {
    Provide(Provide),
    Router(RouterHandle),
    Middleware(MiddlewareClass),
    Finalize(Finalizer),
}

/// A declarative group of dependency-supplying directives.
///
/// A provider is only a descriptor: nothing is registered anywhere until the
/// application walks it during resolution. The same provider can therefore be
/// handed to any number of applications.
///
/// # Example
/// ```
/// use axum_autowire::{ApiRouter, Provider};
/// use axum::routing::get;
///
/// struct UserService;
///
/// let users = ApiRouter::with_prefix("/users")
///     .route("/", get(|| async { "users" }))
///     .into_handle();
///
/// let provider = Provider::new("UserProvider")
///     .provide(UserService)
///     .router(&users);
/// assert_eq!(provider.len(), 2);
/// ```
#[derive(Clone)]
pub struct Provider {
    name: Cow<'static, str>,
    directives: Vec<Directive>,
}

impl Provider {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            directives: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Add a raw binding directive
    pub fn directive(mut self, provide: Provide) -> Self {
        self.directives.push(Directive::Provide(provide));
        self
    }

    /// Provide an instance
    pub fn provide<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.directive(Provide::value(value))
    }

    /// Provide an instance scoped to a named component
    pub fn provide_named<T: Send + Sync + 'static>(
        self,
        component: impl Into<Cow<'static, str>>,
        value: T,
    ) -> Self {
        self.directive(Provide::value(value).component(component))
    }

    /// Provide a value built lazily by an async factory
    pub fn provide_with<T, F, Fut>(self, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.directive(Provide::factory(factory))
    }

    /// Provide `T` by injecting it from the container on first use
    pub fn provide_injectable<T: Injectable>(self) -> Self {
        self.provide_with(|container: Container| async move {
            T::inject(&container).await.map_err(anyhow::Error::from)
        })
    }

    /// Bind a trait to a concrete implementation
    pub fn bind<Trait, Impl, F>(self, caster: F) -> Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Send + Sync + 'static,
        F: Fn(Arc<Impl>) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.directive(Provide::trait_binding::<Trait, Impl, F>(caster))
    }

    /// Run `finalize` on the resolved `T` when the container is closed.
    pub fn finalize<T, F, Fut>(mut self, finalize: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.directives
            .push(Directive::Finalize(Finalizer::new(Key::of::<T>(), finalize)));
        self
    }

    /// Declare a router to be collected and mounted by the application
    ///
    /// Routers may share a prefix as long as their paths differ. A path, or a
    /// fallback on prefix-less routers, declared by two routers makes
    /// resolution fail with `AutowireError::RouteConflict`.
    pub fn router(mut self, router: &RouterHandle) -> Self {
        self.directives.push(Directive::Router(Arc::clone(router)));
        self
    }

    /// Declare a middleware type to be collected and applied by the application
    pub fn middleware<M: Middleware + Injectable>(mut self) -> Self {
        self.directives
            .push(Directive::Middleware(MiddlewareClass::of::<M>()));
        self
    }

    /// The build step: walk the directives in declaration order.
    pub(crate) fn declare(
        &self,
        registrations: &mut RegistrationContext,
        mut builder: ContainerBuilder,
    ) -> ContainerBuilder {
        tracing::debug!(
            "Declaring provider {} ({} directives)",
            self.name,
            self.directives.len()
        );

        for directive in &self.directives {
            builder = match directive {
                Directive::Provide(provide) => builder.provide(provide.clone()),
                Directive::Router(router) => builder.provide(register_router(registrations, router)),
                Directive::Middleware(class) => {
                    builder.provide(register_middleware(registrations, class.clone()))
                }
                Directive::Finalize(finalizer) => builder.finalizer(finalizer.clone()),
            };
        }

        builder
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("directives", &self.directives.len())
            .finish()
    }
}
