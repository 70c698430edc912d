//! Router and middleware registration
//!
//! Walking a [`Provider`](crate::di::Provider) calls [`register_router`] and
//! [`register_middleware`] for each declared router and middleware type. They
//! record the item in a [`RegistrationContext`] owned by the application that
//! is being resolved, and hand back the binding that makes the item
//! injectable. The collector providers later drain the context into the
//! ordered lists the application mounts.
//!
//! ```text
//! Provider descriptors ──walk──► register_* ──► RegistrationContext (pending)
//!                                                    │
//!                      RouterCollector / MiddlewareCollector (drain on resolve)
//!                                                    │
//!                                  Application ──► WebApp ──► axum::Router
//! ```

mod collector;

pub use collector::{MiddlewareCollector, RouterCollector};

use crate::di::Provide;
use crate::middleware::MiddlewareClass;
use crate::router::{ApiRouter, RouterHandle};
use std::sync::{Arc, Mutex};

/// Registration context shared between an application and its collectors
pub type SharedRegistrations = Arc<Mutex<RegistrationContext>>;

/// Pending routers and middleware classes, plus the declared mirrors.
///
/// An item appears at most once in each list. Pending lists preserve insertion
/// order and are drained by the collectors; declared lists only ever grow.
#[derive(Debug, Default)]
pub struct RegistrationContext {
    routers: Vec<RouterHandle>,
    middleware: Vec<MiddlewareClass>,
    declared_routers: Vec<RouterHandle>,
    declared_middleware: Vec<MiddlewareClass>,
}

impl RegistrationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedRegistrations {
        Arc::new(Mutex::new(self))
    }

    pub fn pending_routers(&self) -> &[RouterHandle] {
        &self.routers
    }

    pub fn pending_middleware(&self) -> &[MiddlewareClass] {
        &self.middleware
    }

    pub fn declared_routers(&self) -> &[RouterHandle] {
        &self.declared_routers
    }

    pub fn declared_middleware(&self) -> &[MiddlewareClass] {
        &self.declared_middleware
    }

    /// Drain pending routers, in registration order
    pub fn take_routers(&mut self) -> Vec<RouterHandle> {
        std::mem::take(&mut self.routers)
    }

    /// Drain pending middleware classes, in registration order
    pub fn take_middleware(&mut self) -> Vec<MiddlewareClass> {
        std::mem::take(&mut self.middleware)
    }

    /// Refill each empty pending list from its declared mirror.
    ///
    /// Lists that still hold pending items are left alone.
    pub fn restore(&mut self) {
        if self.routers.is_empty() && !self.declared_routers.is_empty() {
            tracing::debug!(
                "Restoring {} declared routers",
                self.declared_routers.len()
            );
            self.routers = self.declared_routers.clone();
        }
        if self.middleware.is_empty() && !self.declared_middleware.is_empty() {
            tracing::debug!(
                "Restoring {} declared middleware",
                self.declared_middleware.len()
            );
            self.middleware = self.declared_middleware.clone();
        }
    }
}

fn push_router(list: &mut Vec<RouterHandle>, router: &RouterHandle) -> bool {
    if list.iter().any(|known| ApiRouter::same(known, router)) {
        return false;
    }
    list.push(Arc::clone(router));
    true
}

fn push_middleware(list: &mut Vec<MiddlewareClass>, class: &MiddlewareClass) -> bool {
    if list.contains(class) {
        return false;
    }
    list.push(class.clone());
    true
}

/// Record `router` for collection and return the binding that supplies it.
///
/// Registering the same router (same `Arc`) again is a no-op for the context.
pub fn register_router(registrations: &mut RegistrationContext, router: &RouterHandle) -> Provide {
    if push_router(&mut registrations.routers, router) {
        tracing::debug!("Registered router {:?}", router.prefix().unwrap_or("/"));
    }
    push_router(&mut registrations.declared_routers, router);
    Provide::shared(Arc::clone(router))
}

/// Record a middleware class for collection and return the binding that supplies it.
///
/// Registering the same middleware type again is a no-op for the context.
pub fn register_middleware(
    registrations: &mut RegistrationContext,
    class: MiddlewareClass,
) -> Provide {
    if push_middleware(&mut registrations.middleware, &class) {
        tracing::debug!("Registered middleware {}", class.name());
    }
    push_middleware(&mut registrations.declared_middleware, &class);
    Provide::value(class)
}
