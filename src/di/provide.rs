use crate::di::Container;
use crate::error::{AutowireError, Result};
use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::sync::Arc;

pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;
pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

type FactoryFn = Arc<dyn Fn(Container) -> BoxFuture<Result<AnyValue>> + Send + Sync>;
type FinalizerFn = Arc<dyn Fn(AnyValue) -> BoxFuture<()> + Send + Sync>;

/// Lookup key of a binding: the provided type plus an optional component name.
#[derive(Clone)]
pub(crate) struct Key {
    type_id: TypeId,
    type_name: &'static str,
    component: Option<Cow<'static, str>>,
}

impl Key {
    pub(crate) fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            component: None,
        }
    }

    pub(crate) fn named<T: ?Sized + 'static>(component: impl Into<Cow<'static, str>>) -> Self {
        Self::of::<T>().with_component(component)
    }

    fn with_component(mut self, component: impl Into<Cow<'static, str>>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.component == other.component
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.component.hash(state);
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.component {
            Some(component) => write!(f, "{} (component `{}`)", self.type_name, component),
            None => f.write_str(self.type_name),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Clone)]
pub(crate) enum Source {
    Instance(AnyValue),
    Factory(FactoryFn),
}

/// A single binding directive: "supply this value whenever this type is requested".
///
/// Directives are collected by [`ContainerBuilder`](crate::di::ContainerBuilder).
/// When two directives share a key, the later one wins.
///
/// # Example
/// ```
/// use axum_autowire::di::Provide;
///
/// struct Settings {
///     greeting: String,
/// }
///
/// let provide = Provide::value(Settings { greeting: "hi".into() }).component("en");
/// assert_eq!(provide.component_name(), Some("en"));
/// ```
#[derive(Clone)]
pub struct Provide {
    pub(crate) key: Key,
    pub(crate) source: Source,
}

impl Provide {
    /// Supply an owned value.
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::shared(Arc::new(value))
    }

    /// Supply this exact shared object. Resolution hands out clones of the same `Arc`.
    pub fn shared<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            key: Key::of::<T>(),
            source: Source::Instance(value),
        }
    }

    /// Supply a value built lazily by an async factory.
    ///
    /// The factory runs at most once per container; the result is memoised.
    /// An `AutowireError` returned by the factory is propagated unchanged.
    ///
    /// Cycles are detected along a single resolution chain. Two tasks that
    /// concurrently enter an A ↔ B factory cycle from opposite ends each wait
    /// on the value the other is producing and never finish; keep factory
    /// graphs acyclic.
    pub fn factory<T, F, Fut>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let type_name = std::any::type_name::<T>();
        let factory: FactoryFn = Arc::new(move |container: Container| -> BoxFuture<Result<AnyValue>> {
            let pending = factory(container);
            Box::pin(async move {
                let value = pending
                    .await
                    .map_err(|err| AutowireError::from_factory(type_name, err))?;
                Ok(Arc::new(value) as AnyValue)
            })
        });
        Self {
            key: Key::of::<T>(),
            source: Source::Factory(factory),
        }
    }

    /// Bind `Arc<dyn Trait>` to the registered implementation `Impl`.
    pub(crate) fn trait_binding<Trait, Impl, F>(caster: F) -> Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Send + Sync + 'static,
        F: Fn(Arc<Impl>) -> Arc<Trait> + Send + Sync + 'static,
    {
        let caster = Arc::new(caster);
        let factory: FactoryFn = Arc::new(move |container: Container| -> BoxFuture<Result<AnyValue>> {
            let caster = Arc::clone(&caster);
            Box::pin(async move {
                let concrete = container.get::<Impl>().await?;
                let trait_obj: Arc<Trait> = caster(concrete);
                // The Arc<dyn Trait> itself is stored as the Any value.
                Ok(Arc::new(trait_obj) as AnyValue)
            })
        });
        Self {
            key: Key::of::<Trait>(),
            source: Source::Factory(factory),
        }
    }

    /// Scope the binding to a named component.
    pub fn component(mut self, component: impl Into<Cow<'static, str>>) -> Self {
        self.key = self.key.with_component(component);
        self
    }

    /// Name of the provided type
    pub fn type_name(&self) -> &'static str {
        self.key.type_name()
    }

    /// Component the binding is scoped to, if any
    pub fn component_name(&self) -> Option<&str> {
        self.key.component()
    }

    pub(crate) fn is_factory(&self) -> bool {
        matches!(self.source, Source::Factory(_))
    }
}

impl fmt::Debug for Provide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provide")
            .field("key", &self.key)
            .field("factory", &self.is_factory())
            .finish()
    }
}

/// Cleanup attached to a binding, run by [`Container::close`] if the value was resolved.
#[derive(Clone)]
pub(crate) struct Finalizer {
    pub(crate) key: Key,
    run: FinalizerFn,
}

impl Finalizer {
    pub(crate) fn new<T, F, Fut>(key: Key, finalize: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let run: FinalizerFn = Arc::new(move |value: AnyValue| -> BoxFuture<()> {
            match value.downcast::<T>() {
                Ok(value) => Box::pin(finalize(value)),
                Err(_) => {
                    tracing::warn!(
                        "Finalizer skipped: value is not a {}",
                        std::any::type_name::<T>()
                    );
                    Box::pin(async {})
                }
            }
        });
        Self { key, run }
    }

    pub(crate) fn run(&self, value: AnyValue) -> BoxFuture<()> {
        (self.run)(value)
    }
}
