//! Middleware with dependency injection
//!
//! A middleware is declared by *type*: the provider records a
//! [`MiddlewareClass`], and the application builds the instance from the
//! container when it materialises the router. Dependencies therefore arrive
//! through [`Injectable`].

use crate::di::provide::BoxFuture;
use crate::di::{Container, Injectable};
use crate::error::Result;
use async_trait::async_trait;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// A request/response interceptor invoked around route dispatch.
///
/// # Example
///
/// ```rust
/// use axum_autowire::{Injectable, Middleware};
/// use axum::extract::Request;
/// use axum::http::HeaderValue;
/// use axum::middleware::Next;
/// use axum::response::Response;
///
/// #[derive(Injectable)]
/// struct PoweredBy;
///
/// #[axum_autowire::async_trait]
/// impl Middleware for PoweredBy {
///     async fn dispatch(&self, request: Request, next: Next) -> Response {
///         let mut response = next.run(request).await;
///         response
///             .headers_mut()
///             .insert("x-powered-by", HeaderValue::from_static("axum-autowire"));
///         response
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn dispatch(&self, request: Request, next: Next) -> Response;
}

type Instantiate = fn(Container) -> BoxFuture<Result<Arc<dyn Middleware>>>;

/// Reference to a middleware type, not an instance.
///
/// Two classes are equal when they describe the same type.
#[derive(Clone)]
pub struct MiddlewareClass {
    type_id: TypeId,
    name: &'static str,
    instantiate: Instantiate,
}

impl MiddlewareClass {
    pub fn of<M: Middleware + Injectable>() -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
            instantiate: instantiate::<M>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Whether this class describes `M`
    pub fn is<M: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<M>()
    }

    pub(crate) async fn instantiate(&self, container: Container) -> Result<Arc<dyn Middleware>> {
        tracing::debug!("Instantiating middleware {}", self.name);
        (self.instantiate)(container).await
    }
}

fn instantiate<M: Middleware + Injectable>(
    container: Container,
) -> BoxFuture<Result<Arc<dyn Middleware>>> {
    Box::pin(async move {
        let middleware = M::inject(&container).await?;
        Ok(Arc::new(middleware) as Arc<dyn Middleware>)
    })
}

impl PartialEq for MiddlewareClass {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for MiddlewareClass {}

impl fmt::Debug for MiddlewareClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MiddlewareClass").field(&self.name).finish()
    }
}

/// Wrap `router` so every request passes through `middleware`.
pub(crate) fn apply(router: axum::Router, middleware: Arc<dyn Middleware>) -> axum::Router {
    router.layer(axum::middleware::from_fn(
        move |request: Request, next: Next| {
            let middleware = Arc::clone(&middleware);
            async move { middleware.dispatch(request, next).await }
        },
    ))
}
