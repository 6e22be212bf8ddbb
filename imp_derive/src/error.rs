//! Derive macro for error enums.
//!
//! Generates `std::fmt::Display` and `std::error::Error` implementations.
//!
//! # Usage
//!
//! ```ignore
//! use imp_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum VMError {
//!     #[error("division by zero")]
//!     DivisionByZero,
//!
//!     #[error("undefined label {label}")]
//!     UndefinedLabel { label: String, line: usize },
//!
//!     #[error("io error: {0}")]
//!     Io(String),
//! }
//! ```
//!
//! Fields that the message does not mention are ignored, so a variant may
//! carry context (such as a source location) that is only read by callers.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Lit, Meta, parse_macro_input};

/// Derives `Display` and `Error` for an enum.
///
/// Each variant must have an `#[error("...")]` attribute. Struct variant
/// fields are interpolated by name (`{label}`), tuple fields by position
/// (`{0}`).
pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_error_derive(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_error_derive(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Enum(data_enum) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "Error derive only supports enums",
        ));
    };

    let display_arms = data_enum
        .variants
        .iter()
        .map(|variant| {
            let variant_name = &variant.ident;
            let message = extract_error_message(variant)?;

            let arm = match &variant.fields {
                Fields::Unit => quote! {
                    Self::#variant_name => write!(f, #message),
                },
                Fields::Unnamed(fields) => {
                    let format_str = convert_positional_to_named(&message, fields.unnamed.len());
                    let bindings: Vec<_> = (0..fields.unnamed.len())
                        .map(|i| {
                            let ident = format_ident!("f{}", i);
                            if mentions(&format_str, &ident.to_string()) {
                                quote! { #ident }
                            } else {
                                quote! { _ }
                            }
                        })
                        .collect();
                    let used: Vec<_> = (0..fields.unnamed.len())
                        .map(|i| format_ident!("f{}", i))
                        .filter(|ident| mentions(&format_str, &ident.to_string()))
                        .collect();
                    quote! {
                        Self::#variant_name(#(#bindings),*) => write!(f, #format_str, #(#used = #used),*),
                    }
                }
                Fields::Named(fields) => {
                    let used: Vec<_> = fields
                        .named
                        .iter()
                        .filter_map(|field| field.ident.as_ref())
                        .filter(|ident| mentions(&message, &ident.to_string()))
                        .collect();
                    quote! {
                        Self::#variant_name { #(#used,)* .. } => write!(f, #message, #(#used = #used),*),
                    }
                }
            };

            Ok(arm)
        })
        .collect::<syn::Result<Vec<_>>>()?;

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    #(#display_arms)*
                }
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
    })
}

/// Extracts the message from a variant's `#[error("...")]` attribute.
fn extract_error_message(variant: &syn::Variant) -> syn::Result<String> {
    for attr in &variant.attrs {
        if !attr.path().is_ident("error") {
            continue;
        }

        let Meta::List(meta_list) = &attr.meta else {
            return Err(syn::Error::new_spanned(
                &attr.meta,
                "invalid #[error] attribute; use #[error(\"message\")]",
            ));
        };

        let lit = syn::parse2::<Lit>(meta_list.tokens.clone()).map_err(|_| {
            syn::Error::new_spanned(
                &attr.meta,
                "expected a string literal like #[error(\"stack underflow in {instruction}\")]",
            )
        })?;

        return match lit {
            Lit::Str(lit_str) => Ok(lit_str.value()),
            _ => Err(syn::Error::new_spanned(
                &attr.meta,
                "#[error] message must be a string literal",
            )),
        };
    }

    Err(syn::Error::new_spanned(
        &variant.ident,
        format!(
            "missing #[error(\"...\")] attribute on variant `{}`",
            variant.ident
        ),
    ))
}

/// Returns true if `format_str` interpolates `name` (`{name}` or `{name:spec}`).
fn mentions(format_str: &str, name: &str) -> bool {
    format_str.contains(&format!("{{{name}}}")) || format_str.contains(&format!("{{{name}:"))
}

/// Converts positional format args `{0}`, `{1:>4}` to named args `{f0}`, `{f1:>4}`.
fn convert_positional_to_named(format_str: &str, field_count: usize) -> String {
    let mut result = format_str.to_string();
    for i in (0..field_count).rev() {
        result = result
            .replace(&format!("{{{i}}}"), &format!("{{f{i}}}"))
            .replace(&format!("{{{i}:"), &format!("{{f{i}:"));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_plain_and_formatted() {
        assert!(mentions("undefined label {label}", "label"));
        assert!(mentions("pc {pc:>4}", "pc"));
        assert!(!mentions("undefined label {label}", "line"));
    }

    #[test]
    fn positional_args_become_named() {
        assert_eq!(convert_positional_to_named("io: {0}", 1), "io: {f0}");
        assert_eq!(
            convert_positional_to_named("{1:>3} after {0}", 2),
            "{f1:>3} after {f0}"
        );
    }
}
