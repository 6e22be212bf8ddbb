//! Human-readable listing of a routine.
//!
//! ```text
//! DATA
//!   0    2312
//!   1    320
//! INS
//!   0    LOAD 0
//!   2    LOAD 1
//!   4    EQZJP 11
//! ```
//!
//! Bytes that are not opcodes are listed as `.byte 0xNN` and decoding
//! continues with the next byte.

use crate::machine::isa::Instruction;
use crate::machine::program::Routine;
use std::fmt::Write;

/// One decoded line of the instruction listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingEntry {
    /// Known opcode with its operand, `None` when the stream ends first.
    Op {
        offset: usize,
        instr: Instruction,
        operand: Option<u8>,
    },
    /// Byte that is not a valid opcode.
    Byte { offset: usize, value: u8 },
}

/// Decodes the instruction stream linearly from offset 0.
pub fn decode_listing(code: &[u8]) -> Vec<ListingEntry> {
    let mut out = Vec::new();
    let mut offset = 0;

    while offset < code.len() {
        let value = code[offset];
        match Instruction::try_from(value) {
            Ok(instr) if instr.has_operand() => {
                out.push(ListingEntry::Op {
                    offset,
                    instr,
                    operand: code.get(offset + 1).copied(),
                });
                offset += instr.size();
            }
            Ok(instr) => {
                out.push(ListingEntry::Op {
                    offset,
                    instr,
                    operand: None,
                });
                offset += 1;
            }
            Err(_) => {
                out.push(ListingEntry::Byte { offset, value });
                offset += 1;
            }
        }
    }

    out
}

/// Renders the data and instruction sectors of `routine`.
pub fn disassemble(routine: &Routine) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "DATA");
    for (i, value) in routine.data.iter().enumerate() {
        let _ = writeln!(out, "{i:>3}    {value}");
    }

    let _ = writeln!(out, "INS");
    for entry in decode_listing(&routine.instructions) {
        match entry {
            ListingEntry::Op {
                offset,
                instr,
                operand: Some(arg),
            } => {
                let _ = writeln!(out, "{offset:>3}    {} {arg}", instr.mnemonic());
            }
            ListingEntry::Op {
                offset,
                instr,
                operand: None,
            } if instr.has_operand() => {
                let _ = writeln!(out, "{offset:>3}    {} <missing>", instr.mnemonic());
            }
            ListingEntry::Op { offset, instr, .. } => {
                let _ = writeln!(out, "{offset:>3}    {}", instr.mnemonic());
            }
            ListingEntry::Byte { offset, value } => {
                let _ = writeln!(out, "{offset:>3}    .byte 0x{value:02x}");
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::utils::{GCD_SOURCE, assemble};

    #[test]
    fn gcd_listing() {
        let listing = disassemble(&assemble(GCD_SOURCE));
        let expected = "\
DATA
  0    2312
  1    320
INS
  0    LOAD 0
  2    LOAD 1
  4    EQZJP 11
  6    SWAP
  7    OVER
  8    MOD
  9    JUMP 4
 11    DROP
";
        assert_eq!(listing, expected);
    }

    #[test]
    fn invalid_and_truncated_bytes() {
        let routine = Routine::new(vec![], vec![0xFF, 0x19, 0x10]);
        assert_eq!(
            disassemble(&routine),
            "DATA\nINS\n  0    .byte 0xff\n  1    -ROT\n  2    JUMP <missing>\n"
        );
    }

    #[test]
    fn decode_skips_operands() {
        let entries = decode_listing(&[0x02, 0x09, 0x09]);
        assert_eq!(
            entries,
            vec![
                ListingEntry::Op {
                    offset: 0,
                    instr: Instruction::Load,
                    operand: Some(0x09)
                },
                ListingEntry::Op {
                    offset: 2,
                    instr: Instruction::Add,
                    operand: None
                },
            ]
        );
    }
}
