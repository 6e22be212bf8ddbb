//! Assembler for the textual routine format.
//!
//! Converts source text into a [`Routine`].
//!
//! # Syntax
//!
//! ```text
//! DATA            ; data sector: decimal integers
//!     2312 320
//! INS             ; instruction sector
//! start:  LOAD 0  ; `name:` binds a label to the next offset
//!         JUMP @start
//! ```
//!
//! - Tokens are separated by whitespace; `;` starts a comment
//! - Sector markers (`DATA`, legacy `DAT`, `INS`) are case-insensitive
//! - Mnemonics are case-insensitive; label names are not
//! - Every instruction-sector token except a label definition occupies one byte:
//!   a mnemonic becomes its opcode, a decimal literal (0-255) its value and a
//!   `@name` reference the label's offset
//!
//! Arity is not checked: `LOAD` followed by `ADD` assembles, and the VM will
//! read the `ADD` opcode as the index.

use crate::error;
use crate::machine::errors::VMError;
use crate::machine::isa::Instruction;
use crate::machine::program::Routine;
use std::collections::HashMap;
use std::fmt::Write;
use std::fs;
use std::path::Path;

const COMMENT_CHAR: char = ';';
const LABEL_SUFFIX: char = ':';
const REFERENCE_PREFIX: char = '@';
const DATA_MARKERS: [&str; 2] = ["DATA", "DAT"];
const INSTRUCTION_MARKER: &str = "INS";

/// Formats a compiler-style diagnostic for assembly failures.
fn render_assembly_diagnostic(
    file: &str,
    source: &str,
    line: usize,
    column: usize,
    message: &str,
) -> String {
    let mut diag = String::new();
    let _ = writeln!(diag, "error: {message}");
    let _ = writeln!(diag, " --> {file}:{line}:{column}");

    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let line_text = raw_line.trim_end_matches('\r');
        let underline = " ".repeat(column.saturating_sub(1));
        let _ = writeln!(diag, "     |");
        let _ = writeln!(diag, "{line:>4} | {line_text}");
        let _ = write!(diag, "     | {underline}^");
    }

    diag
}

/// Logs an assembly failure, with the offending source line when the error has a location.
fn log_assembly_error(file: &str, source: &str, err: &VMError) {
    match err.location() {
        Some((line, column)) => error!(
            "{}",
            render_assembly_diagnostic(file, source, line, column, &err.to_string())
        ),
        None => error!("{file}: {err}"),
    }
}

/// Source token with its 1-based position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token<'a> {
    text: &'a str,
    line: usize,
    column: usize,
}

/// Splits source into whitespace-separated tokens, dropping comments.
fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut out = Vec::new();

    for (line_idx, raw_line) in source.lines().enumerate() {
        let line = match raw_line.find(COMMENT_CHAR) {
            Some(pos) => &raw_line[..pos],
            None => raw_line,
        };

        let mut start: Option<usize> = None;
        for (i, ch) in line.char_indices() {
            if ch.is_whitespace() {
                if let Some(s) = start.take() {
                    out.push(Token {
                        text: &line[s..i],
                        line: line_idx + 1,
                        column: s + 1,
                    });
                }
            } else if start.is_none() {
                start = Some(i);
            }
        }
        if let Some(s) = start {
            out.push(Token {
                text: &line[s..],
                line: line_idx + 1,
                column: s + 1,
            });
        }
    }

    out
}

fn is_data_marker(tok: &str) -> bool {
    DATA_MARKERS.iter().any(|m| m.eq_ignore_ascii_case(tok))
}

fn is_instruction_marker(tok: &str) -> bool {
    INSTRUCTION_MARKER.eq_ignore_ascii_case(tok)
}

fn is_marker(tok: &str) -> bool {
    is_data_marker(tok) || is_instruction_marker(tok)
}

/// Splits the token stream into the data sector and the instruction sector.
fn split_sectors<'t, 'a>(
    tokens: &'t [Token<'a>],
) -> Result<(&'t [Token<'a>], &'t [Token<'a>]), VMError> {
    let Some((first, rest)) = tokens.split_first() else {
        return Err(VMError::MalformedProgram {
            reason: "missing DATA marker",
        });
    };
    if !is_data_marker(first.text) {
        return Err(VMError::MalformedProgram {
            reason: "source must start with the DATA marker",
        });
    }

    let ins = rest
        .iter()
        .position(|t| is_marker(t.text))
        .ok_or(VMError::MalformedProgram {
            reason: "missing INS marker",
        })?;
    if !is_instruction_marker(rest[ins].text) {
        return Err(VMError::MalformedProgram {
            reason: "repeated DATA marker",
        });
    }

    let (data, tail) = rest.split_at(ins);
    let instructions = &tail[1..];
    if instructions.iter().any(|t| is_marker(t.text)) {
        return Err(VMError::MalformedProgram {
            reason: "repeated sector marker",
        });
    }

    Ok((data, instructions))
}

/// True if `tok` is an optionally signed run of decimal digits.
fn is_decimal(tok: &str) -> bool {
    let digits = tok.strip_prefix(['-', '+']).unwrap_or(tok);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Parses a data-sector value.
fn parse_data_value(tok: &Token<'_>) -> Result<i64, VMError> {
    if !is_decimal(tok.text) {
        return Err(invalid_token(tok));
    }
    tok.text.parse::<i64>().map_err(|_| VMError::ValueOutOfRange {
        token: tok.text.to_string(),
        line: tok.line,
        column: tok.column,
    })
}

/// Parses a one-byte literal in the instruction sector.
fn parse_literal(tok: &Token<'_>) -> Result<u8, VMError> {
    if !is_decimal(tok.text) {
        return Err(invalid_token(tok));
    }
    tok.text.parse::<u8>().map_err(|_| VMError::ValueOutOfRange {
        token: tok.text.to_string(),
        line: tok.line,
        column: tok.column,
    })
}

fn invalid_token(tok: &Token<'_>) -> VMError {
    VMError::InvalidToken {
        token: tok.text.to_string(),
        line: tok.line,
        column: tok.column,
    }
}

/// Checks if a token is a label definition (ends with `:`).
fn is_label_def(tok: &str) -> bool {
    tok.ends_with(LABEL_SUFFIX) && tok.len() > 1
}

/// Checks if a token is a label reference (starts with `@`).
fn is_label_ref(tok: &str) -> bool {
    tok.starts_with(REFERENCE_PREFIX) && tok.len() > 1
}

/// Meaning of an instruction-sector token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind<'a> {
    LabelDef(&'a str),
    LabelRef(&'a str),
    Opcode(Instruction),
    Literal(u8),
}

impl<'a> TokenKind<'a> {
    fn classify(tok: &Token<'a>) -> Result<Self, VMError> {
        let text = tok.text;
        if is_label_def(text) {
            return Ok(TokenKind::LabelDef(&text[..text.len() - 1]));
        }
        if is_label_ref(text) {
            return Ok(TokenKind::LabelRef(&text[1..]));
        }
        if let Some(instr) = Instruction::from_mnemonic(text) {
            return Ok(TokenKind::Opcode(instr));
        }
        parse_literal(tok).map(TokenKind::Literal)
    }

    /// Bytes this token contributes to the instruction stream.
    fn width(&self) -> usize {
        match self {
            TokenKind::LabelDef(_) => 0,
            _ => 1,
        }
    }
}

/// Label table built during the first pass.
#[derive(Debug, Default)]
pub struct AsmContext {
    labels: HashMap<String, usize>,
}

impl AsmContext {
    /// Creates an empty assembly context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `offset`, rejecting a second definition.
    fn define_label(&mut self, name: &str, offset: usize, tok: &Token<'_>) -> Result<(), VMError> {
        if self.labels.contains_key(name) {
            return Err(VMError::DuplicateLabel {
                label: name.to_string(),
                line: tok.line,
                column: tok.column,
            });
        }
        self.labels.insert(name.to_string(), offset);
        Ok(())
    }

    /// Resolves a reference to the one-byte address of its label.
    fn resolve_label(&self, name: &str, tok: &Token<'_>) -> Result<u8, VMError> {
        let address = self
            .labels
            .get(name)
            .copied()
            .ok_or_else(|| VMError::UndefinedLabel {
                label: name.to_string(),
                line: tok.line,
                column: tok.column,
            })?;
        u8::try_from(address).map_err(|_| VMError::AddressOutOfRange {
            label: name.to_string(),
            address,
            line: tok.line,
            column: tok.column,
        })
    }

    /// Returns the offset bound to `name`, if defined.
    pub fn label(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }
}

/// First pass: classifies every instruction token and records label offsets.
fn collect_labels<'a>(
    tokens: &[Token<'a>],
) -> Result<(AsmContext, Vec<(Token<'a>, TokenKind<'a>)>), VMError> {
    let mut ctx = AsmContext::new();
    let mut classified = Vec::with_capacity(tokens.len());
    let mut offset = 0usize;

    for tok in tokens {
        let kind = TokenKind::classify(tok)?;
        if let TokenKind::LabelDef(name) = kind {
            ctx.define_label(name, offset, tok)?;
        }
        offset += kind.width();
        classified.push((*tok, kind));
    }

    Ok((ctx, classified))
}

/// Second pass: emits the instruction bytes, resolving references.
fn emit(ctx: &AsmContext, classified: &[(Token<'_>, TokenKind<'_>)]) -> Result<Vec<u8>, VMError> {
    let mut out = Vec::with_capacity(classified.len());
    for (tok, kind) in classified {
        match *kind {
            TokenKind::LabelDef(_) => {}
            TokenKind::LabelRef(name) => out.push(ctx.resolve_label(name, tok)?),
            TokenKind::Opcode(instr) => out.push(instr as u8),
            TokenKind::Literal(value) => out.push(value),
        }
    }
    Ok(out)
}

fn assemble_tokens(source: &str) -> Result<Routine, VMError> {
    let tokens = tokenize(source);
    let (data_tokens, instruction_tokens) = split_sectors(&tokens)?;

    let data = data_tokens
        .iter()
        .map(parse_data_value)
        .collect::<Result<Vec<_>, _>>()?;

    let (ctx, classified) = collect_labels(instruction_tokens)?;
    let instructions = emit(&ctx, &classified)?;

    Ok(Routine::new(data, instructions))
}

/// Assembles source text into a routine.
pub fn assemble_source(source: impl AsRef<str>) -> Result<Routine, VMError> {
    assemble_tokens(source.as_ref())
}

/// Assembles source text, logging a diagnostic that names `source_name` on failure.
pub fn assemble_named(source: &str, source_name: &str) -> Result<Routine, VMError> {
    let result = assemble_tokens(source);
    if let Err(err) = &result {
        log_assembly_error(source_name, source, err);
    }
    result
}

/// Reads and assembles a source file.
pub fn assemble_file<P: AsRef<Path>>(path: P) -> Result<Routine, VMError> {
    let path_ref = path.as_ref();
    let source = fs::read_to_string(path_ref).map_err(|e| VMError::IoError {
        path: path_ref.display().to_string(),
        source: e.to_string(),
    })?;
    assemble_named(&source, &path_ref.display().to_string())
}
