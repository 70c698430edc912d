use darling::FromField;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, Data, DeriveInput, Fields, Type};

#[derive(FromField)]
#[darling(attributes(inject))]
struct InjectField {
    ident: Option<syn::Ident>,
    ty: Type,
    #[darling(default)]
    component: Option<String>,
}

pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match generate_injectable_impl(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn generate_injectable_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => {
                let field_injections = fields
                    .named
                    .iter()
                    .map(field_injection)
                    .collect::<syn::Result<Vec<_>>>()?;
                quote! { Self { #(#field_injections),* } }
            }
            Fields::Unit => quote! { Self },
            Fields::Unnamed(fields) => {
                return Err(syn::Error::new(
                    fields.span(),
                    "#[derive(Injectable)] only supports unit structs and structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "#[derive(Injectable)] can only be applied to structs",
            ));
        }
    };

    Ok(quote! {
        #[::axum_autowire::async_trait]
        impl #impl_generics ::axum_autowire::Injectable for #struct_name #ty_generics #where_clause {
            async fn inject(
                container: &::axum_autowire::Container
            ) -> ::axum_autowire::Result<Self> {
                Ok(#body)
            }
        }
    })
}

fn field_injection(field: &syn::Field) -> syn::Result<TokenStream2> {
    let parsed = InjectField::from_field(field)
        .map_err(|err| syn::Error::new(field.span(), err.to_string()))?;
    let field_name = &parsed.ident;

    if is_container(&parsed.ty) {
        return Ok(quote! { #field_name: ::core::clone::Clone::clone(container) });
    }

    let inner = arc_inner_type(&parsed.ty).ok_or_else(|| {
        syn::Error::new(
            parsed.ty.span(),
            "injectable fields must be `Arc<T>`, `Arc<dyn Trait>` or `Container`",
        )
    })?;

    match (inner, parsed.component) {
        (Type::TraitObject(_), Some(_)) => Err(syn::Error::new(
            field.span(),
            "`component` is not supported on trait object fields",
        )),
        (Type::TraitObject(_), None) => Ok(quote! {
            #field_name: container.get_trait::<#inner>().await?
        }),
        (_, Some(component)) => Ok(quote! {
            #field_name: container.get_named::<#inner>(#component).await?
        }),
        (_, None) => Ok(quote! {
            #field_name: container.get::<#inner>().await?
        }),
    }
}

/// Extract the inner type from Arc<T> or Arc<dyn Trait>
fn arc_inner_type(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Arc" {
        return None;
    }
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => match args.args.first()? {
            syn::GenericArgument::Type(inner_type) => Some(inner_type),
            _ => None,
        },
        _ => None,
    }
}

fn is_container(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Container" && segment.arguments.is_empty()),
        _ => false,
    }
}
