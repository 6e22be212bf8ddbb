//! Binary serialization primitives shared by the object file codec.

pub mod encoding;
