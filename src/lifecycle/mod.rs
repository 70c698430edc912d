//! Application Lifecycle
//!
//! ```text
//! 1. Application::new / Application::builder      (providers are only descriptors)
//!    ↓
//! 2. resolve()
//!    ├─ fresh RegistrationContext
//!    ├─ walk AppInfo context, RouterCollector, MiddlewareCollector, providers
//!    ├─ build Container
//!    ├─ collect "routers" / "middlewares"
//!    └─ WebApp: add middleware, include routers, attach container, build
//!    ↓
//! 3. serve_blocking / serve / start_background / start
//!    ↓
//! [Running...]
//!    ↓
//! 4. Shutdown signal, stop() or shutdown()
//!    ↓
//! 5. Container closed (finalizers run in reverse order)
//! ```

mod application;
mod server;
mod shutdown;

pub use application::{Application, ApplicationBuilder};
pub use server::{ServerConfig, StopStatus};
pub use shutdown::shutdown_signal;
