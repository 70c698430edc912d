use proc_macro::TokenStream;

mod injectable;

/// Derive macro for constructing a type from the DI container
///
/// Supported field types:
/// - `Arc<T>` resolved with `Container::get::<T>()`
/// - `Arc<dyn Trait>` resolved with `Container::get_trait::<dyn Trait>()`
/// - `Container` itself, cloned into the field
///
/// Use `#[inject(component = "name")]` on an `Arc<T>` field to resolve a named component.
///
/// # Example
/// ```ignore
/// use axum_autowire::Injectable;
/// use std::sync::Arc;
///
/// #[derive(Injectable)]
/// pub struct AuthMiddleware {
///     auth: Arc<AuthService>,
///     #[inject(component = "admins")]
///     admins: Arc<Vec<String>>,
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable(input)
}
