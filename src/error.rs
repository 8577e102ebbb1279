//! The error type shared by every stage of the interpreter. Each variant corresponds to one
//! failure kind; any of them aborts the current `run()` and is surfaced to the caller.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
  /// An operand is not the numeric/text shape its instruction expects.
  #[error("type mismatch: {0}")]
  TypeMismatch(String),

  /// An integer outside [-32767, 32767], a memory position out of bounds, or a jump
  /// target outside [0, line_count].
  #[error("range error: {0}")]
  Range(String),

  /// Malformed 16-bit binary text or a malformed source statement.
  #[error("format error: {0}")]
  Format(String),

  /// The opcode token is not in the instruction set.
  #[error("illegal operation, {0} is not in the CAJOlang instruction set")]
  UnknownInstruction(String),

  /// A file slot used before OPEN, or an integer cell or the temp area read before
  /// anything was stored in it.
  #[error("uninitialized resource: {0}")]
  Uninitialized(String),

  /// A filesystem failure, or a file handle used against its open mode.
  #[error("i/o error: {0}")]
  Io(String),
}

impl From<std::io::Error> for Error {
  fn from(error: std::io::Error) -> Error {
    Error::Io(error.to_string())
  }
}
