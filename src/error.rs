use thiserror::Error;

pub type Result<T> = std::result::Result<T, AutowireError>;

#[derive(Debug, Error)]
pub enum AutowireError {
    #[error("Dependency not found: {type_name}")]
    DependencyNotFound { type_name: String },

    #[error("Failed to downcast type: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("Provider factory for {type_name} failed: {source}")]
    Factory {
        type_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Container is closed")]
    ContainerClosed,

    #[error("No container is attached to this request")]
    NoContainer,

    #[error("Application has not been resolved")]
    NotResolved,

    #[error("Server is already running on {addr}")]
    AlreadyServing { addr: String },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Router {router} conflicts with an already mounted router: {reason}")]
    RouteConflict { router: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AutowireError {
    /// Wrap a provider factory failure.
    ///
    /// Errors that already are `AutowireError` (a missing nested dependency, a
    /// cycle) pass through unchanged.
    pub(crate) fn from_factory(type_name: &str, err: anyhow::Error) -> Self {
        match err.downcast::<AutowireError>() {
            Ok(inner) => inner,
            Err(source) => AutowireError::Factory {
                type_name: type_name.to_string(),
                source,
            },
        }
    }
}

impl axum::response::IntoResponse for AutowireError {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::INTERNAL_SERVER_ERROR;
        tracing::error!("Request failed during dependency injection: {}", self);
        (status, format!("Dependency injection failed: {}", self)).into_response()
    }
}
