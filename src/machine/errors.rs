use crate::types::encoding::DecodeError;
use imp_derive::Error;

/// Errors raised while assembling, encoding, decoding or executing a routine.
///
/// Every variant is fatal for the stage that raises it.
#[derive(Debug, Error)]
pub enum VMError {
    /// A sector marker is missing, repeated or out of place.
    #[error("malformed program: {reason}")]
    MalformedProgram { reason: &'static str },
    /// Token is neither a mnemonic, a label, a reference nor a decimal integer.
    #[error("line {line}:{column}: invalid token '{token}'")]
    InvalidToken {
        token: String,
        line: usize,
        column: usize,
    },
    /// Integer literal does not fit in an instruction byte.
    #[error("line {line}:{column}: value {token} does not fit in one byte")]
    ValueOutOfRange {
        token: String,
        line: usize,
        column: usize,
    },
    /// Label defined more than once.
    #[error("line {line}:{column}: duplicate label: {label}")]
    DuplicateLabel {
        label: String,
        line: usize,
        column: usize,
    },
    /// Reference to undefined label.
    #[error("line {line}:{column}: undefined label: {label}")]
    UndefinedLabel {
        label: String,
        line: usize,
        column: usize,
    },
    /// Label offset cannot be stored in a one-byte operand.
    #[error("line {line}:{column}: label {label} resolves to {address}, beyond the one-byte address range")]
    AddressOutOfRange {
        label: String,
        address: usize,
        line: usize,
        column: usize,
    },
    /// Object bytes are not a valid routine.
    #[error("format error: {reason}")]
    Format { reason: String },
    /// Segment is too long for its one-byte count field.
    #[error("{segment} segment has {len} entries, object files hold at most {max}")]
    CapacityExceeded {
        segment: &'static str,
        len: usize,
        max: usize,
    },
    /// Data value outside the unsigned 32-bit range of object files.
    #[error("data[{index}] = {value} cannot be stored as an unsigned 32-bit word")]
    UnencodableValue { index: usize, value: i64 },
    /// Unknown opcode encountered in the instruction stream.
    #[error("invalid instruction 0x{opcode:02x} at offset {offset}")]
    InvalidInstruction { opcode: u8, offset: usize },
    /// Instruction stream ended before an immediate operand.
    #[error("{instruction} at offset {offset} is missing its operand")]
    UnexpectedEndOfInstructions {
        instruction: &'static str,
        offset: usize,
    },
    /// Jump target lies past the end of the instruction stream.
    #[error("{instruction} targets {target}, past the end of the {len} instruction bytes")]
    InvalidJumpTarget {
        instruction: &'static str,
        target: usize,
        len: usize,
    },
    /// Instruction needs more operands than the stack holds.
    #[error("stack underflow: {instruction} needs {required} values, stack holds {available}")]
    StackUnderflow {
        instruction: &'static str,
        required: usize,
        available: usize,
    },
    /// Data segment index out of range.
    #[error("data index {index} out of bounds for {len} entries")]
    OutOfBounds { index: usize, len: usize },
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Run exceeded its configured instruction budget.
    #[error("step limit of {limit} instructions exceeded")]
    StepLimitExceeded { limit: u64 },
    /// Console input is not a decimal integer.
    #[error("invalid console input: '{text}'")]
    InvalidInput { text: String },
    /// Console could not be read or written.
    #[error("console error: {reason}")]
    ConsoleError { reason: String },
    /// Configuration value could not be parsed.
    #[error("invalid value '{value}' for {key}")]
    InvalidConfig { key: &'static str, value: String },
    /// File I/O error.
    #[error("io error on {path}: {source}")]
    IoError { path: String, source: String },
}

impl VMError {
    /// Returns the 1-based `(line, column)` of the offending source token, if any.
    pub fn location(&self) -> Option<(usize, usize)> {
        match self {
            VMError::InvalidToken { line, column, .. }
            | VMError::ValueOutOfRange { line, column, .. }
            | VMError::DuplicateLabel { line, column, .. }
            | VMError::UndefinedLabel { line, column, .. }
            | VMError::AddressOutOfRange { line, column, .. } => Some((*line, *column)),
            _ => None,
        }
    }
}

impl From<DecodeError> for VMError {
    fn from(err: DecodeError) -> Self {
        let reason = match err {
            DecodeError::UnexpectedEof => "truncated",
            DecodeError::InvalidValue => "invalid value",
        };
        VMError::Format {
            reason: reason.to_string(),
        }
    }
}
