use crate::di::Container;
use crate::error::Result;
use async_trait::async_trait;

/// Trait for types that can be injected from the DI container
///
/// This trait is typically implemented automatically via the `#[derive(Injectable)]` macro.
/// Middleware types are constructed through it when the application is resolved.
///
/// # Example
/// ```
/// use axum_autowire::Injectable;
/// use std::sync::Arc;
///
/// pub struct UserRepository;
///
/// #[derive(Injectable)]
/// pub struct UserService {
///     // This field will be resolved from the container
///     repository: Arc<UserRepository>,
/// }
/// ```
#[async_trait]
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Create an instance by resolving dependencies from the container
    ///
    /// # Errors
    /// Returns an error if any required dependency is not found in the container.
    async fn inject(container: &Container) -> Result<Self>;
}
