//! Compiled routine representation and its object file format.
//!
//! A [`Routine`] is the unit everything else works on: the assembler
//! produces one, the object codec stores one, and the VM runs one.
//!
//! # Object Layout
//!
//! | Field             | Width              |
//! |-------------------|--------------------|
//! | magic `IMP`       | 3 bytes            |
//! | version           | major, minor bytes |
//! | data count        | 1 byte             |
//! | instruction count | 1 byte             |
//! | data segment      | 4 bytes LE each    |
//! | instructions      | 1 byte each        |

use crate::machine::errors::VMError;
use crate::types::encoding::{Decode, Encode, read_bytes};
use imp_derive::BinaryCodec;

/// Magic bytes identifying an object file.
pub const MAGIC: &[u8; 3] = b"IMP";

/// Object format version written and accepted by this implementation.
pub const CURRENT_VERSION: Version = Version::new(1, 1);

/// Largest data or instruction segment an object file can describe.
pub const MAX_SEGMENT_LEN: usize = u8::MAX as usize;

/// Object format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinaryCodec)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

/// Fixed-size part of an object file following the magic.
#[derive(Debug, PartialEq, Eq, BinaryCodec)]
struct Header {
    version: Version,
    data_count: u8,
    instruction_count: u8,
}

/// Compiled program: the initial data segment plus the instruction stream.
///
/// Instruction bytes are opcodes and their one-byte operands, laid out back
/// to back. Nothing here checks that they form valid instructions; the VM
/// reports that when it reaches a bad byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routine {
    /// Values addressed by `LOAD index`.
    pub data: Vec<i64>,
    /// Encoded instruction stream.
    pub instructions: Vec<u8>,
}

impl Routine {
    pub fn new(data: Vec<i64>, instructions: Vec<u8>) -> Self {
        Self { data, instructions }
    }

    /// Serializes the routine to the object file format.
    ///
    /// Fails when a segment holds more than [`MAX_SEGMENT_LEN`] entries or a
    /// data value lies outside the unsigned 32-bit range.
    pub fn to_bytes(&self) -> Result<Vec<u8>, VMError> {
        let data_count = segment_count("data", self.data.len())?;
        let instruction_count = segment_count("instruction", self.instructions.len())?;

        let header = Header {
            version: CURRENT_VERSION,
            data_count,
            instruction_count,
        };

        let mut out = Vec::with_capacity(
            MAGIC.len() + header.encoded_len() + self.data.len() * 4 + self.instructions.len(),
        );
        MAGIC.encode(&mut out);
        header.encode(&mut out);
        for (index, &value) in self.data.iter().enumerate() {
            let word = u32::try_from(value).map_err(|_| VMError::UnencodableValue { index, value })?;
            word.encode(&mut out);
        }
        out.extend_from_slice(&self.instructions);
        Ok(out)
    }

    /// Deserializes a routine from object file bytes.
    ///
    /// The input must hold exactly one object: a wrong magic, a version other
    /// than [`CURRENT_VERSION`], a short segment or leftover bytes are errors.
    pub fn from_bytes(mut input: &[u8]) -> Result<Self, VMError> {
        if input.len() < MAGIC.len() {
            return Err(format_error("truncated"));
        }

        if &<[u8; 3]>::decode(&mut input)? != MAGIC {
            return Err(format_error("bad magic"));
        }

        let header = Header::decode(&mut input)?;
        if header.version != CURRENT_VERSION {
            return Err(VMError::Format {
                reason: format!(
                    "unsupported version {}.{}",
                    header.version.major, header.version.minor
                ),
            });
        }

        let mut data = Vec::with_capacity(header.data_count as usize);
        for _ in 0..header.data_count {
            data.push(u32::decode(&mut input)? as i64);
        }
        let instructions = read_bytes(&mut input, header.instruction_count as usize)?.to_vec();

        if !input.is_empty() {
            return Err(format_error("trailing bytes"));
        }

        Ok(Self { data, instructions })
    }
}

/// Returns true if `bytes` starts with the object file magic.
pub fn is_object(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

fn segment_count(segment: &'static str, len: usize) -> Result<u8, VMError> {
    u8::try_from(len).map_err(|_| VMError::CapacityExceeded {
        segment,
        len,
        max: MAX_SEGMENT_LEN,
    })
}

fn format_error(reason: &str) -> VMError {
    VMError::Format {
        reason: reason.to_string(),
    }
}
