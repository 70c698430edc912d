use crate::di::Container;
use crate::error::AutowireError;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

/// Axum extractor for dependency injection
///
/// Resolves `T` from the container attached to the request by the router's
/// [`RouteHandling`](crate::router::RouteHandling). Routers built with
/// [`ApiRouter`](crate::router::ApiRouter) attach it by default; without a
/// container the request is rejected with a 500.
///
/// # Example
/// ```
/// use axum_autowire::{ApiRouter, Inject};
/// use axum::routing::get;
///
/// struct GreetingService;
///
/// impl GreetingService {
///     fn greet(&self) -> String {
///         "Hello!".to_string()
///     }
/// }
///
/// async fn greet(Inject(service): Inject<GreetingService>) -> String {
///     service.greet()
/// }
///
/// let router = ApiRouter::with_prefix("/api").route("/greet", get(greet));
/// ```
pub struct Inject<T>(pub Arc<T>);

impl<S, T> FromRequestParts<S> for Inject<T>
where
    S: Send + Sync,
    T: 'static + Send + Sync,
{
    type Rejection = AutowireError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let container = parts
            .extensions
            .get::<Container>()
            .cloned()
            .ok_or(AutowireError::NoContainer)?;

        container.get::<T>().await.map(Inject)
    }
}

/// Deref implementation for convenient access to the inner service
impl<T> std::ops::Deref for Inject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Clone implementation to allow sharing the Arc
impl<T> Clone for Inject<T> {
    fn clone(&self) -> Self {
        Inject(Arc::clone(&self.0))
    }
}
