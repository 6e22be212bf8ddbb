//! Derive macro for fixed-layout binary serialization.
//!
//! Generates `Encode` and `Decode` implementations for structs whose fields
//! are themselves `Encode`/`Decode`. Fields are written back to back in
//! declaration order with no tags or padding, which is what the object file
//! header needs: the byte layout is exactly the sum of the field layouts.
//!
//! # Supported Types
//!
//! - **Named structs**: `struct Version { major: u8, minor: u8 }`
//! - **Tuple structs**: `struct Word(u32)`
//! - **Unit structs**: `struct Marker`
//!
//! Enums and unions are rejected at compile time.

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

/// Derives `Encode` and `Decode` for a struct.
///
/// # Example
///
/// ```ignore
/// use imp_derive::BinaryCodec;
///
/// #[derive(BinaryCodec)]
/// struct Version {
///     major: u8,
///     minor: u8,
/// }
/// ```
///
/// # Generated Code
///
/// ```ignore
/// impl Encode for Version {
///     fn encode<S: EncodeSink>(&self, out: &mut S) {
///         self.major.encode(out);
///         self.minor.encode(out);
///     }
/// }
///
/// impl Decode for Version {
///     fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
///         Ok(Self {
///             major: u8::decode(input)?,
///             minor: u8::decode(input)?,
///         })
///     }
/// }
/// ```
pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (encode_body, decode_body) = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => {
                let field_names: Vec<_> = fields.named.iter().map(|f| &f.ident).collect();
                let encode_fields = field_names.iter().map(|name| {
                    quote! {
                        crate::types::encoding::Encode::encode(&self.#name, out);
                    }
                });
                let decode_fields = field_names.iter().map(|name| {
                    quote! {
                        #name: crate::types::encoding::Decode::decode(input)?,
                    }
                });
                (
                    quote! { #(#encode_fields)* },
                    quote! { Ok(Self { #(#decode_fields)* }) },
                )
            }
            Fields::Unnamed(fields) => {
                let field_indices: Vec<_> =
                    (0..fields.unnamed.len()).map(syn::Index::from).collect();
                let encode_fields = field_indices.iter().map(|idx| {
                    quote! {
                        crate::types::encoding::Encode::encode(&self.#idx, out);
                    }
                });
                let decode_fields = field_indices.iter().map(|_| {
                    quote! {
                        crate::types::encoding::Decode::decode(input)?,
                    }
                });
                (
                    quote! { #(#encode_fields)* },
                    quote! { Ok(Self( #(#decode_fields)* )) },
                )
            }
            Fields::Unit => (quote! { let _ = out; }, quote! { let _ = input; Ok(Self) }),
        },
        Data::Enum(_) | Data::Union(_) => {
            return syn::Error::new_spanned(
                &input,
                "BinaryCodec derive only supports structs; object file layouts carry no tags",
            )
            .to_compile_error()
            .into();
        }
    };

    let expanded = quote! {
        impl #impl_generics crate::types::encoding::Encode for #name #ty_generics #where_clause {
            fn encode<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #encode_body
            }
        }

        impl #impl_generics crate::types::encoding::Decode for #name #ty_generics #where_clause {
            fn decode(input: &mut &[u8]) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                #decode_body
            }
        }
    };

    TokenStream::from(expanded)
}
