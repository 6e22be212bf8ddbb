//! Derive macros for the imp crate.
//!
//! Provides:
//! - `#[derive(BinaryCodec)]` - fixed-layout binary serialization for object file headers
//! - `#[derive(Error)]` - `Display` and `Error` boilerplate for error enums

mod binary_codec;
mod error;

use proc_macro::TokenStream;

/// Implements `Encode` and `Decode` by serializing fields in declaration order.
#[proc_macro_derive(BinaryCodec)]
pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    binary_codec::derive_binary_codec(input)
}

/// Implements `Display` and `Error` from `#[error("...")]` attributes.
#[proc_macro_derive(Error, attributes(error))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
