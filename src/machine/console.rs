//! Console abstraction backing the `IN` and `OUT` instructions.
//!
//! The [`Console`] trait is the only channel between a running VM and the
//! outside world. [`StdConsole`] talks to any line-oriented reader/writer
//! pair (stdin/stdout by default) and [`BufferConsole`] replays scripted
//! input while capturing output in memory.

use crate::machine::errors::VMError;
use std::collections::VecDeque;
use std::io::{self, BufRead, Stdin, StdinLock, Stdout, Write};

/// Integer I/O capability used by the VM.
pub trait Console {
    /// Blocks until an integer is available and returns it.
    fn read_integer(&mut self) -> Result<i64, VMError>;
    /// Writes one integer.
    fn write_integer(&mut self, value: i64) -> Result<(), VMError>;
}

/// Line-based console over a reader and a writer.
///
/// Each `IN` writes a prompt (if enabled) and reads one line holding a
/// decimal integer; each `OUT` writes the value on its own line.
pub struct StdConsole<R, W> {
    reader: R,
    writer: W,
    prompt: Option<&'static str>,
}

/// Prompt shown before every `IN`.
pub const DEFAULT_PROMPT: &str = "? ";

impl StdConsole<StdinLock<'static>, Stdout> {
    /// Creates a console on the process's stdin and stdout.
    pub fn new() -> Self {
        let stdin: Stdin = io::stdin();
        Self::with_io(stdin.lock(), io::stdout())
    }
}

impl Default for StdConsole<StdinLock<'static>, Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: BufRead, W: Write> StdConsole<R, W> {
    /// Creates a console on the given reader and writer.
    pub fn with_io(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            prompt: Some(DEFAULT_PROMPT),
        }
    }

    /// Disables the input prompt, for piped input.
    pub fn without_prompt(mut self) -> Self {
        self.prompt = None;
        self
    }

    /// Consumes the console and returns the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

fn console_error(err: io::Error) -> VMError {
    VMError::ConsoleError {
        reason: err.to_string(),
    }
}

impl<R: BufRead, W: Write> Console for StdConsole<R, W> {
    fn read_integer(&mut self) -> Result<i64, VMError> {
        if let Some(prompt) = self.prompt {
            self.writer
                .write_all(prompt.as_bytes())
                .map_err(console_error)?;
            self.writer.flush().map_err(console_error)?;
        }

        let mut line = String::new();
        let read = self.reader.read_line(&mut line).map_err(console_error)?;
        if read == 0 {
            return Err(VMError::ConsoleError {
                reason: "unexpected end of input".to_string(),
            });
        }

        let text = line.trim();
        text.parse::<i64>().map_err(|_| VMError::InvalidInput {
            text: text.to_string(),
        })
    }

    fn write_integer(&mut self, value: i64) -> Result<(), VMError> {
        writeln!(self.writer, "{value}").map_err(console_error)?;
        self.writer.flush().map_err(console_error)
    }
}

/// In-memory console: serves queued inputs and records outputs.
#[derive(Debug, Default, Clone)]
pub struct BufferConsole {
    inputs: VecDeque<i64>,
    outputs: Vec<i64>,
}

impl BufferConsole {
    /// Creates a console that will answer `IN` with `inputs`, in order.
    pub fn new(inputs: impl IntoIterator<Item = i64>) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
            outputs: Vec::new(),
        }
    }

    /// Values written by `OUT`, in order.
    pub fn outputs(&self) -> &[i64] {
        &self.outputs
    }

    /// Number of scripted inputs not yet consumed.
    pub fn pending_inputs(&self) -> usize {
        self.inputs.len()
    }
}

impl Console for BufferConsole {
    fn read_integer(&mut self) -> Result<i64, VMError> {
        self.inputs.pop_front().ok_or_else(|| VMError::ConsoleError {
            reason: "no scripted input left".to_string(),
        })
    }

    fn write_integer(&mut self, value: i64) -> Result<(), VMError> {
        self.outputs.push(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn std_console_reads_and_prompts() {
        let mut console = StdConsole::with_io(Cursor::new("42\n -7 \n"), Vec::new());
        assert_eq!(console.read_integer().unwrap(), 42);
        assert_eq!(console.read_integer().unwrap(), -7);
        assert_eq!(console.into_writer(), b"? ? ".to_vec());
    }

    #[test]
    fn std_console_writes_lines() {
        let mut console = StdConsole::with_io(Cursor::new(""), Vec::new()).without_prompt();
        console.write_integer(8).unwrap();
        console.write_integer(-1).unwrap();
        assert_eq!(console.into_writer(), b"8\n-1\n".to_vec());
    }

    #[test]
    fn std_console_rejects_non_integers() {
        let mut console = StdConsole::with_io(Cursor::new("abc\n"), Vec::new()).without_prompt();
        assert!(matches!(
            console.read_integer(),
            Err(VMError::InvalidInput { ref text }) if text == "abc"
        ));
    }

    #[test]
    fn std_console_end_of_input() {
        let mut console = StdConsole::with_io(Cursor::new(""), Vec::new()).without_prompt();
        assert!(matches!(
            console.read_integer(),
            Err(VMError::ConsoleError { .. })
        ));
    }

    #[test]
    fn buffer_console_replays_and_records() {
        let mut console = BufferConsole::new([1, 2]);
        assert_eq!(console.read_integer().unwrap(), 1);
        assert_eq!(console.pending_inputs(), 1);
        assert_eq!(console.read_integer().unwrap(), 2);
        assert!(console.read_integer().is_err());

        console.write_integer(5).unwrap();
        assert_eq!(console.outputs(), &[5]);
    }
}
