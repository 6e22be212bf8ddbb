//! Stack bytecode machine, its assembler and its object file format.
//!
//! # Pipeline
//!
//! ```text
//! source --assembler--> Routine --program--> object bytes
//!                          |
//!                          +----vm----> final stack (+ console I/O)
//! ```
//!
//! # Modules
//!
//! - [`assembler`]: Two-pass assembler with label resolution and diagnostics
//! - [`config`]: Run options (trace, step limit) from flags or environment
//! - [`console`]: Integer I/O used by `IN` and `OUT`
//! - [`disasm`]: Listing of a routine's data and instructions
//! - [`errors`]: The [`errors::VMError`] type shared by every stage
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`program`]: [`program::Routine`] and the object file codec
//! - [`vm`]: Interpreter and step profiling

pub mod assembler;
pub mod config;
pub mod console;
pub mod disasm;
pub mod errors;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod program;
pub mod vm;
