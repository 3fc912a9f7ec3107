//! Compile-time dependency injection derives.
//!
//! - `#[derive(Context)]` exports every field of a root context through
//!   `crate::FromRef`, so each field type can be pulled out of `&Context`.
//! - `#[derive(FromContext)]` builds a struct by resolving each of its fields
//!   from the context.
//!
//! Generated code refers to `crate::FromRef`, so the consuming crate must
//! define (or re-export) that trait at its root.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::token::Comma;
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields};

/// Derive `FromRef<Self>` for the type of every named field.
///
/// Fields annotated with `#[context(skip)]` are left out, which is needed
/// when two fields share a type or a field is private bookkeeping.
///
/// ```ignore
/// #[derive(Context, Clone)]
/// pub struct Context {
///     pub graph: AppGraph,
///     pub embedder: AppEmbedder,
/// }
/// // impl FromRef<Context> for AppGraph { ... }
/// // impl FromRef<Context> for AppEmbedder { ... }
/// ```
#[proc_macro_derive(Context, attributes(context))]
pub fn derive_context(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_context(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derive `FromRef<Context>` by resolving each field from the context.
///
/// The context type defaults to `Context` in scope and can be overridden
/// with `#[from_context(Context = "path::To::Ctx")]`.
///
/// ```ignore
/// #[derive(FromContext, Clone)]
/// pub struct EntityRepository {
///     graph: AppGraph,
///     settings: AppSettings,
/// }
/// ```
#[proc_macro_derive(FromContext, attributes(from_context))]
pub fn derive_from_context(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_from_context(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_context(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut impls = Vec::new();
    for field in named_fields(input, "Context")? {
        if is_skipped(field)? {
            continue;
        }
        let ident = &field.ident;
        let ty = &field.ty;
        impls.push(quote! {
            impl #impl_generics crate::FromRef<#name #ty_generics> for #ty #where_clause {
                fn from_ref(ctx: &#name #ty_generics) -> Self {
                    ctx.#ident.clone()
                }
            }
        });
    }

    Ok(quote! { #(#impls)* })
}

fn expand_from_context(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let context = context_type(input)?;

    let inits = named_fields(input, "FromContext")?.iter().map(|field| {
        let ident = &field.ident;
        let ty = &field.ty;
        quote! { #ident: <#ty as crate::FromRef<#context>>::from_ref(ctx) }
    });

    Ok(quote! {
        impl #impl_generics crate::FromRef<#context> for #name #ty_generics #where_clause {
            fn from_ref(ctx: &#context) -> Self {
                Self { #(#inits),* }
            }
        }
    })
}

fn named_fields<'a>(
    input: &'a DeriveInput,
    derive: &str,
) -> syn::Result<&'a Punctuated<Field, Comma>> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => Ok(&fields.named),
            _ => Err(syn::Error::new_spanned(
                input,
                format!("{derive} requires a struct with named fields"),
            )),
        },
        _ => Err(syn::Error::new_spanned(
            input,
            format!("{derive} can only be derived for structs"),
        )),
    }
}

fn is_skipped(field: &Field) -> syn::Result<bool> {
    let mut skip = false;
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("context")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("expected `skip`"))
            }
        })?;
    }
    Ok(skip)
}

fn context_type(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let mut context: Option<syn::Type> = None;
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("from_context")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("Context") {
                let value: syn::LitStr = meta.value()?.parse()?;
                context = Some(value.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `Context = \"...\"`"))
            }
        })?;
    }

    Ok(match context {
        Some(ty) => quote! { #ty },
        None => quote! { Context },
    })
}
