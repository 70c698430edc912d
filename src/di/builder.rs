use crate::di::provide::{Finalizer, Provide};
use crate::di::{Container, Provider};
use crate::registry::RegistrationContext;
use std::sync::Arc;

/// Builder for constructing a dependency injection container
///
/// Collect bindings (directly, or by walking [`Provider`] descriptors) and then
/// build the final container.
///
/// # Example
/// ```
/// use axum_autowire::di::{ContainerBuilder, Provide};
/// use std::sync::Arc;
///
/// trait Database: Send + Sync {}
/// struct PostgresDatabase;
/// impl Database for PostgresDatabase {}
///
/// let container = ContainerBuilder::new()
///     .provide(Provide::value(PostgresDatabase))
///     .bind::<dyn Database, PostgresDatabase, _>(|db| db as Arc<dyn Database>)
///     .build();
/// assert!(container.contains::<dyn Database>());
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
    bindings: Vec<Provide>,
    finalizers: Vec<Finalizer>,
}

impl ContainerBuilder {
    /// Create a new container builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding directive
    pub fn provide(mut self, provide: Provide) -> Self {
        self.bindings.push(provide);
        self
    }

    /// Add a context value supplied by the caller of the build step
    pub fn context<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.provide(Provide::value(value))
    }

    /// Bind a trait to a concrete implementation
    ///
    /// This enables resolving `Arc<dyn Trait>` to the registered implementation.
    /// The implementation must have been registered first (or will be).
    pub fn bind<Trait, Impl, F>(self, caster: F) -> Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Send + Sync + 'static,
        F: Fn(Arc<Impl>) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.provide(Provide::trait_binding::<Trait, Impl, F>(caster))
    }

    pub(crate) fn finalizer(mut self, finalizer: Finalizer) -> Self {
        self.finalizers.push(finalizer);
        self
    }

    /// Walk a provider descriptor, registering its routers and middleware into
    /// `registrations` and adding its bindings to this builder.
    pub fn provider(self, provider: &Provider, registrations: &mut RegistrationContext) -> Self {
        provider.declare(registrations, self)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Build the container
    pub fn build(self) -> Container {
        tracing::debug!(
            "Building container ({} bindings, {} finalizers)",
            self.bindings.len(),
            self.finalizers.len()
        );
        Container::from_parts(self.bindings, self.finalizers)
    }
}
