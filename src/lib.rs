//! IMP stack machine library.
//!
//! Provides the assembler, the object file codec and the bytecode interpreter.

pub mod machine;
pub mod types;
pub mod utils;
