//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical instruction table and invokes a callback macro for code
//! generation, so the enum, the mnemonic table and the static ISA check are
//! all generated from one list.
//!
//! This module generates:
//! - The [`Instruction`] enum with opcode mappings
//! - `TryFrom<u8>` for decoding opcodes
//! - [`Instruction::ALL`] and [`Instruction::from_mnemonic`], the immutable
//!   mnemonic table used by the assembler
//!
//! # Bytecode Format
//!
//! - Opcode: 1 byte
//! - `Imm` operand: 1 byte, index into the data segment
//! - `Addr` operand: 1 byte, absolute instruction offset
//!
//! Stack effects use Forth notation: `(before -- after)`, top of stack on the right.

use crate::machine::errors::VMError;
use crate::machine::vm::OpCategory;

/// Invokes a callback macro with the complete instruction definition list.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Stack shuffles
            // =========================
            /// NOOP ; ( -- )
            Noop = 0x00, "NOOP" => [], Stack,
            /// DROP ; (a -- )
            Drop = 0x01, "DROP" => [], Stack,
            /// LOAD index ; ( -- data[index])
            Load = 0x02, "LOAD" => [index: Imm], Stack,
            /// DUP ; (a -- a a)
            Dup = 0x03, "DUP" => [], Stack,
            /// SWAP ; (a b -- b a)
            Swap = 0x04, "SWAP" => [], Stack,
            /// OVER ; (a b -- a b a)
            Over = 0x05, "OVER" => [], Stack,
            /// ROT ; (a b c -- b c a)
            Rot = 0x06, "ROT" => [], Stack,
            /// NIP ; (a b -- b)
            Nip = 0x07, "NIP" => [], Stack,
            /// TUCK ; (a b -- a b a), same effect as OVER
            Tuck = 0x08, "TUCK" => [], Stack,
            // =========================
            // Integer arithmetic
            // =========================
            /// ADD ; (a b -- a+b)
            Add = 0x09, "ADD" => [], Arithmetic,
            /// INC ; (a -- a+1)
            Inc = 0x0A, "INC" => [], Arithmetic,
            /// DEC ; (a -- a-1)
            Dec = 0x0B, "DEC" => [], Arithmetic,
            /// SUB ; (a b -- a-b)
            Sub = 0x0C, "SUB" => [], Arithmetic,
            /// MUL ; (a b -- a*b)
            Mul = 0x0D, "MUL" => [], Arithmetic,
            /// DIV ; (a b -- a/b) rounded toward negative infinity
            Div = 0x0E, "DIV" => [], Arithmetic,
            /// MOD ; (a b -- a mod b) with the sign of b
            Mod = 0x0F, "MOD" => [], Arithmetic,
            // =========================
            // Control flow
            // =========================
            /// JUMP target ; pc = target
            Jump = 0x10, "JUMP" => [target: Addr], Control,
            /// EQJP target ; (a b -- a b) branch if a == b
            EqJp = 0x11, "EQJP" => [target: Addr], Control,
            /// GTJP target ; (a b -- a b) branch if a > b
            GtJp = 0x12, "GTJP" => [target: Addr], Control,
            /// LTJP target ; (a b -- a b) branch if a < b
            LtJp = 0x13, "LTJP" => [target: Addr], Control,
            /// EQZJP target ; (a -- a) branch if a == 0
            EqzJp = 0x14, "EQZJP" => [target: Addr], Control,
            /// GTZJP target ; (a -- a) branch if a > 0
            GtzJp = 0x15, "GTZJP" => [target: Addr], Control,
            /// LTZJP target ; (a -- a) branch if a < 0
            LtzJp = 0x16, "LTZJP" => [target: Addr], Control,
            // =========================
            // Console I/O
            // =========================
            /// IN ; ( -- n) reads n from the console
            In = 0x17, "IN" => [], Io,
            /// OUT ; (n -- ) writes n to the console
            Out = 0x18, "OUT" => [], Io,
            // =========================
            // Revision 1.1
            // =========================
            /// -ROT ; (a b c -- c a b)
            RotBack = 0x19, "-ROT" => [], Stack,
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ], $category:ident
        ),* $(,)?
    ) => {
        #[repr(u8)]
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u8> for Instruction {
            type Error = VMError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Instruction::$name), )*
                    _ => Err(VMError::InvalidInstruction {
                        opcode: value,
                        offset: 0,
                    }),
                }
            }
        }

        impl Instruction {
            /// Every instruction, in opcode order.
            pub const ALL: &'static [Instruction] = &[ $( Instruction::$name, )* ];

            /// Returns the assembly mnemonic for this instruction.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Instruction::$name => $mnemonic, )*
                }
            }

            /// Returns the encoded size in bytes (opcode plus immediates).
            pub const fn size(&self) -> usize {
                match self {
                    $( Instruction::$name => 1usize $( + define_instructions!(@size $kind) )*, )*
                }
            }

            /// Returns the profiling category this instruction is counted under.
            pub const fn category(&self) -> OpCategory {
                match self {
                    $( Instruction::$name => OpCategory::$category, )*
                }
            }
        }
    };

    // ---------- operand sizes ----------
    (@size Imm)  => { 1usize };
    (@size Addr) => { 1usize };
}

for_each_instruction!(define_instructions);

impl Instruction {
    /// Looks up a mnemonic, ignoring ASCII case.
    pub fn from_mnemonic(name: &str) -> Option<Instruction> {
        Self::ALL
            .iter()
            .copied()
            .find(|instr| instr.mnemonic().eq_ignore_ascii_case(name))
    }

    /// Returns true if the opcode is followed by a one-byte immediate.
    pub const fn has_operand(&self) -> bool {
        self.size() > 1
    }
}
