//! `#[derive(ApiError)]`.
//!
//! Each variant (or the struct itself) is either annotated with
//! `#[api(code = "...", status = "...")]`, annotated with `#[api(internal)]`,
//! or delegates to its `#[cause]` field.

use proc_macro2::{Span, TokenStream};
use syn::{Attribute, Ident, Lit, LitStr, Meta, NestedMeta, spanned::Spanned};
use synstructure::{BindingInfo, Structure, VariantInfo};

pub fn derive_error(s: Structure) -> TokenStream {
    let mut errors = TokenStream::new();

    let mut resolved = Vec::new();
    for variant in s.variants() {
        match Source::of(variant) {
            Ok(source) => resolved.push(source),
            Err(err) => {
                errors.extend(err.to_compile_error());
                resolved.push(Source::Internal);
            }
        }
    }

    let mut arms = resolved.iter();
    let statuses = s.each_variant(|v| match arms.next() {
        Some(source) => source.status(v),
        None => quote!(unreachable!()),
    });

    let mut arms = resolved.iter();
    let codes = s.each_variant(|v| match arms.next() {
        Some(source) => source.code(v),
        None => quote!(unreachable!()),
    });

    let imp = s.gen_impl(quote! {
        extern crate actix_web;
        use std::borrow::Cow;

        gen impl crate::api::ApiError for @Self {
            fn status(&self) -> actix_web::http::StatusCode {
                match *self { #statuses }
            }

            fn code(&self) -> Option<Cow<str>> {
                match *self { #codes }
            }
        }
    });

    quote! {
        #errors
        #imp
    }
}

/// Where a variant takes its status and code from.
enum Source {
    /// `#[api(code = "...", status = "...")]`.
    Public { code: LitStr, status: Ident },
    /// `#[api(internal)]`, always 500 and without a code.
    Internal,
    /// No `#[api]` attribute, but a `#[cause]` field which is itself an
    /// `ApiError`.
    Cause,
}

impl Source {
    fn of(v: &VariantInfo) -> syn::Result<Source> {
        let list = match find_api(v.ast().attrs)? {
            Some(list) => list,
            None => {
                return if v.bindings().iter().any(|bi| is_cause(&bi)) {
                    Ok(Source::Cause)
                } else {
                    Err(syn::Error::new(
                        v.ast().ident.span(),
                        "each variant must be #[api]-annotated or have \
                        a #[cause]",
                    ))
                };
            }
        };

        let mut internal = false;
        let mut code = None;
        let mut status = None;

        for item in list {
            match item {
                NestedMeta::Meta(Meta::Path(ref path))
                if path.is_ident("internal") => internal = true,
                NestedMeta::Meta(Meta::NameValue(ref nv))
                if nv.path.is_ident("code") => match nv.lit {
                    Lit::Str(ref s) => code = Some(s.clone()),
                    _ => return Err(syn::Error::new(
                        nv.lit.span(), "expected a string")),
                },
                NestedMeta::Meta(Meta::NameValue(ref nv))
                if nv.path.is_ident("status") => match nv.lit {
                    Lit::Str(ref s) => status = Some(
                        Ident::new(&s.value(), s.span())),
                    _ => return Err(syn::Error::new(
                        nv.lit.span(), "expected a string")),
                },
                _ => return Err(syn::Error::new(
                    item.span(),
                    "expected one of: internal, code, status",
                )),
            }
        }

        match (internal, code, status) {
            (true, None, None) => Ok(Source::Internal),
            (true, _, _) => Err(syn::Error::new(
                Span::call_site(),
                "internal errors can't have codes or statuses",
            )),
            (false, Some(code), Some(status)) =>
                Ok(Source::Public { code, status }),
            (false, Some(code), None) => Ok(Source::Public {
                code,
                status: Ident::new("BAD_REQUEST", Span::call_site()),
            }),
            (false, None, _) => Err(syn::Error::new(
                v.ast().ident.span(),
                "public errors must have a code",
            )),
        }
    }

    fn status(&self, v: &VariantInfo) -> TokenStream {
        match *self {
            Source::Public { ref status, .. } =>
                quote!(actix_web::http::StatusCode::#status),
            Source::Internal =>
                quote!(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
            Source::Cause => {
                let cause = cause_of(v);
                quote!(crate::api::ApiError::status(#cause))
            }
        }
    }

    fn code(&self, v: &VariantInfo) -> TokenStream {
        match *self {
            Source::Public { ref code, .. } => quote!(Some(Cow::Borrowed(#code))),
            Source::Internal => quote!(None),
            Source::Cause => {
                let cause = cause_of(v);
                quote!(crate::api::ApiError::code(#cause))
            }
        }
    }
}

/// Find the only `#[api(...)]` attribute in a list.
fn find_api(attrs: &[Attribute])
-> syn::Result<Option<syn::punctuated::Punctuated<NestedMeta, syn::Token![,]>>> {
    let mut found = None;

    for attr in attrs {
        if !attr.path.is_ident("api") {
            continue;
        }

        if found.is_some() {
            return Err(syn::Error::new(
                attr.span(), "api attribute must be used exactly once"));
        }

        match attr.parse_meta()? {
            Meta::List(list) => {
                if list.nested.is_empty() {
                    return Err(syn::Error::new(
                        list.span(),
                        "api attribute requires at least one argument",
                    ));
                }
                found = Some(list.nested);
            }
            meta => return Err(syn::Error::new(
                meta.span(),
                "api attribute must take a list in parentheses",
            )),
        }
    }

    Ok(found)
}

fn cause_of<'a>(v: &'a VariantInfo) -> &'a BindingInfo<'a> {
    v.bindings()
        .iter()
        .find(is_cause)
        .expect("variant was checked to have a #[cause]")
}

fn is_cause(bi: &&BindingInfo) -> bool {
    bi.ast()
        .attrs
        .iter()
        .any(|attr| attr.path.is_ident("cause"))
}
