use super::SharedRegistrations;
use crate::di::{Provide, Provider};
use crate::middleware::MiddlewareClass;
use crate::router::RouterHandle;
use std::sync::PoisonError;

/// Provider that drains pending routers into a single injectable list.
///
/// The list is exposed as `Vec<RouterHandle>` under the component
/// [`RouterCollector::COMPONENT`]. The container memoises it, so the drain
/// happens once per container.
#[derive(Clone)]
pub struct RouterCollector {
    registrations: SharedRegistrations,
}

impl RouterCollector {
    pub const COMPONENT: &'static str = "routers";

    pub fn new(registrations: SharedRegistrations) -> Self {
        Self { registrations }
    }

    /// Copy the pending routers and clear them
    pub fn collect(&self) -> Vec<RouterHandle> {
        let routers = self
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_routers();
        tracing::debug!("Collected {} routers", routers.len());
        routers
    }

    pub fn into_provider(self) -> Provider {
        let provide = Provide::factory(move |_| {
            let routers = self.collect();
            async move { Ok(routers) }
        })
        .component(Self::COMPONENT);

        Provider::new("RouterCollector").directive(provide)
    }
}

impl From<RouterCollector> for Provider {
    fn from(collector: RouterCollector) -> Self {
        collector.into_provider()
    }
}

/// Provider that drains pending middleware classes into a single injectable list.
///
/// The list is exposed as `Vec<MiddlewareClass>` under the component
/// [`MiddlewareCollector::COMPONENT`].
#[derive(Clone)]
pub struct MiddlewareCollector {
    registrations: SharedRegistrations,
}

impl MiddlewareCollector {
    pub const COMPONENT: &'static str = "middlewares";

    pub fn new(registrations: SharedRegistrations) -> Self {
        Self { registrations }
    }

    /// Copy the pending middleware classes and clear them
    pub fn collect(&self) -> Vec<MiddlewareClass> {
        let middleware = self
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_middleware();
        tracing::debug!("Collected {} middleware", middleware.len());
        middleware
    }

    pub fn into_provider(self) -> Provider {
        let provide = Provide::factory(move |_| {
            let middleware = self.collect();
            async move { Ok(middleware) }
        })
        .component(Self::COMPONENT);

        Provider::new("MiddlewareCollector").directive(provide)
    }
}

impl From<MiddlewareCollector> for Provider {
    fn from(collector: MiddlewareCollector) -> Self {
        collector.into_provider()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::ContainerBuilder;
    use crate::middleware::Middleware;
    use crate::registry::{register_middleware, register_router, RegistrationContext};
    use crate::router::ApiRouter;
    use crate::Injectable;
    use axum::extract::Request;
    use axum::middleware::Next;
    use axum::response::Response;
    use std::sync::Arc;

    #[derive(Injectable)]
    struct Timing;

    #[async_trait::async_trait]
    impl Middleware for Timing {
        async fn dispatch(&self, request: Request, next: Next) -> Response {
            next.run(request).await
        }
    }

    #[test]
    fn test_collect_returns_registered_routers_then_nothing() {
        let registrations = RegistrationContext::new().shared();
        let first = ApiRouter::with_prefix("/test1").into_handle();
        let second = ApiRouter::with_prefix("/test2").into_handle();
        {
            let mut context = registrations.lock().unwrap();
            register_router(&mut context, &first);
            register_router(&mut context, &second);
        }

        let collector = RouterCollector::new(Arc::clone(&registrations));
        let routers = collector.collect();

        assert_eq!(routers.len(), 2);
        assert!(ApiRouter::same(&routers[0], &first));
        assert!(ApiRouter::same(&routers[1], &second));
        assert!(collector.collect().is_empty());
        assert_eq!(registrations.lock().unwrap().declared_routers().len(), 2);
    }

    #[test]
    fn test_collect_with_empty_registry() {
        let registrations = RegistrationContext::new().shared();
        assert!(RouterCollector::new(Arc::clone(&registrations)).collect().is_empty());
        assert!(MiddlewareCollector::new(registrations).collect().is_empty());
    }

    #[test]
    fn test_middleware_collection_leaves_routers_pending() {
        let registrations = RegistrationContext::new().shared();
        {
            let mut context = registrations.lock().unwrap();
            register_router(&mut context, &ApiRouter::new().into_handle());
            register_middleware(&mut context, MiddlewareClass::of::<Timing>());
        }

        let middleware = MiddlewareCollector::new(Arc::clone(&registrations)).collect();

        assert_eq!(middleware, vec![MiddlewareClass::of::<Timing>()]);
        assert_eq!(registrations.lock().unwrap().pending_routers().len(), 1);
    }

    #[tokio::test]
    async fn test_collector_provider_drains_once_per_container() {
        let registrations = RegistrationContext::new().shared();
        let router = ApiRouter::with_prefix("/users").into_handle();
        register_router(&mut registrations.lock().unwrap(), &router);

        let mut unused = RegistrationContext::new();
        let container = ContainerBuilder::new()
            .provider(
                &RouterCollector::new(Arc::clone(&registrations)).into_provider(),
                &mut unused,
            )
            .build();

        let first = container
            .get_named::<Vec<RouterHandle>>(RouterCollector::COMPONENT)
            .await
            .unwrap();
        let second = container
            .get_named::<Vec<RouterHandle>>(RouterCollector::COMPONENT)
            .await
            .unwrap();

        assert_eq!(first.len(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registrations.lock().unwrap().pending_routers().is_empty());
    }
}
