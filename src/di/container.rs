use crate::di::provide::{AnyValue, Finalizer, Key, Provide, Source};
use crate::di::ContainerBuilder;
use crate::error::{AutowireError, Result};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

/// Thread-safe dependency injection container.
///
/// Cloning is cheap: clones share the same bindings, memoised values and
/// closed state.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
    // Keys currently being produced by factories up the call chain.
    resolving: Arc<[Key]>,
}

struct ContainerInner {
    services: DashMap<Key, ServiceEntry>,
    finalizers: Mutex<Vec<Finalizer>>,
    closed: AtomicBool,
}

#[derive(Clone)]
struct ServiceEntry {
    source: Source,
    cell: Arc<OnceCell<AnyValue>>,
}

impl ServiceEntry {
    fn new(source: Source) -> Self {
        Self {
            source,
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// The value if it has been produced already.
    fn resolved(&self) -> Option<AnyValue> {
        match &self.source {
            Source::Instance(value) => Some(Arc::clone(value)),
            Source::Factory(_) => self.cell.get().cloned(),
        }
    }
}

impl Container {
    /// Create a new container builder
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub(crate) fn from_parts(bindings: Vec<Provide>, finalizers: Vec<Finalizer>) -> Self {
        let services = DashMap::with_capacity(bindings.len());
        for binding in bindings {
            if services
                .insert(binding.key.clone(), ServiceEntry::new(binding.source))
                .is_some()
            {
                tracing::debug!("Binding for {} overridden", binding.key);
            }
        }

        Self {
            inner: Arc::new(ContainerInner {
                services,
                finalizers: Mutex::new(finalizers),
                closed: AtomicBool::new(false),
            }),
            resolving: Arc::from(Vec::new()),
        }
    }

    /// Resolve the unnamed binding for `T`.
    pub async fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.get_key::<T>(Key::of::<T>()).await
    }

    /// Resolve the binding for `T` scoped to `component`.
    pub async fn get_named<T: Send + Sync + 'static>(&self, component: &str) -> Result<Arc<T>> {
        self.get_key::<T>(Key::named::<T>(component.to_string()))
            .await
    }

    /// Resolve a trait object bound with `ContainerBuilder::bind` / `Provider::bind`.
    pub async fn get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let value = self.resolve_any(Key::of::<T>()).await?;

        // The stored value is an Arc<T>; downcast to Arc<Arc<T>> and clone the inner Arc.
        let wrapper = value
            .downcast::<Arc<T>>()
            .map_err(|_| AutowireError::DowncastFailed {
                type_name: format!("Arc<{}>", std::any::type_name::<T>()),
            })?;
        Ok(wrapper.as_ref().clone())
    }

    async fn get_key<T: Send + Sync + 'static>(&self, key: Key) -> Result<Arc<T>> {
        let value = self.resolve_any(key).await?;
        value
            .downcast::<T>()
            .map_err(|_| AutowireError::DowncastFailed {
                type_name: std::any::type_name::<T>().to_string(),
            })
    }

    async fn resolve_any(&self, key: Key) -> Result<AnyValue> {
        if self.is_closed() {
            return Err(AutowireError::ContainerClosed);
        }

        if self.resolving.contains(&key) {
            let cycle = self
                .resolving
                .iter()
                .chain(std::iter::once(&key))
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(AutowireError::CircularDependency { cycle });
        }

        let entry = self
            .inner
            .services
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AutowireError::DependencyNotFound {
                type_name: key.to_string(),
            })?;

        match entry.source {
            Source::Instance(value) => Ok(value),
            Source::Factory(factory) => {
                let scoped = self.descend(&key);
                let value = entry
                    .cell
                    .get_or_try_init(|| {
                        tracing::debug!("Producing {}", key);
                        factory(scoped)
                    })
                    .await?;
                Ok(Arc::clone(value))
            }
        }
    }

    fn descend(&self, key: &Key) -> Self {
        let mut resolving = self.resolving.to_vec();
        resolving.push(key.clone());
        Self {
            inner: Arc::clone(&self.inner),
            resolving: Arc::from(resolving),
        }
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.inner.services.contains_key(&Key::of::<T>())
    }

    pub fn contains_named<T: ?Sized + 'static>(&self, component: &str) -> bool {
        self.inner
            .services
            .contains_key(&Key::named::<T>(component.to_string()))
    }

    pub fn len(&self) -> usize {
        self.inner.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.services.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Close the container.
    ///
    /// Finalizers run in reverse registration order, and only for values that
    /// were actually produced. Closing twice is a no-op. After closing, every
    /// `get` fails with [`AutowireError::ContainerClosed`].
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Container already closed");
            return;
        }

        let finalizers = std::mem::take(
            &mut *self
                .inner
                .finalizers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        tracing::info!("Closing container ({} finalizers)", finalizers.len());

        for finalizer in finalizers.iter().rev() {
            let resolved = self
                .inner
                .services
                .get(&finalizer.key)
                .and_then(|entry| entry.resolved());

            match resolved {
                Some(value) => {
                    tracing::debug!("Finalizing {}", finalizer.key);
                    finalizer.run(value).await;
                }
                None => tracing::debug!("Skipping finalizer for unresolved {}", finalizer.key),
            }
        }

        tracing::info!("Container closed");
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("bindings", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
