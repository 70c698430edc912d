//! Dependency injection
//!
//! [`Provider`] descriptors are walked into a [`ContainerBuilder`], which
//! builds the [`Container`] handlers and middleware resolve from.

mod builder;
mod container;
mod extractor;
mod injectable;
pub(crate) mod provide;
mod provider;

pub use builder::ContainerBuilder;
pub use container::Container;
pub use extractor::Inject;
pub use injectable::Injectable;
pub use provide::Provide;
pub use provider::Provider;
