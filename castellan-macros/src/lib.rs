//! # Castellan Macros
//!
//! Procedural macros that remove `axum::extract::FromRef` boilerplate when
//! wiring Castellan's services into an application's own `AppState`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use castellan_macros::CastellanFromRef;
//!
//! #[derive(Clone, CastellanFromRef)]
//! struct AppState {
//!     engine: Arc<FlowEngine<RedisStore>>,
//!     token_issuer: Arc<TokenIssuer>,
//!     #[castellan(skip)]
//!     db_pool: Arc<PgPool>,
//! }
//! ```
//!
//! generates one `FromRef<AppState>` implementation per field, so each
//! Castellan service can be extracted from handler state directly instead
//! of requiring a hand-written `impl FromRef` for every field of every
//! application's state struct. Fields marked `#[castellan(skip)]` are left
//! alone — useful when two fields share a type and only one should be
//! reachable by `FromRef`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

#[proc_macro_derive(CastellanFromRef, attributes(castellan))]
pub fn derive_castellan_from_ref(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let struct_name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(
                    &input,
                    "CastellanFromRef can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(&input, "CastellanFromRef can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let impls = fields.iter().filter(|field| !is_skipped(field)).map(|field| {
        let field_name = field.ident.as_ref().expect("named field");
        let field_ty = &field.ty;
        quote! {
            impl #impl_generics ::axum::extract::FromRef<#struct_name #ty_generics> for #field_ty
            #where_clause
            {
                fn from_ref(state: &#struct_name #ty_generics) -> Self {
                    ::std::clone::Clone::clone(&state.#field_name)
                }
            }
        }
    });

    TokenStream::from(quote! { #(#impls)* })
}

fn is_skipped(field: &syn::Field) -> bool {
    field.attrs.iter().any(|attr| {
        if !attr.path().is_ident("castellan") {
            return false;
        }
        let mut skip = false;
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
            }
            Ok(())
        });
        skip
    })
}
