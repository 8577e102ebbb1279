/*!
  Pure domain checks shared by every instruction handler. Each check either passes or
  fails with a `Range` error; handlers call them before touching any state, so a failed
  check leaves the machine exactly as it was.
*/

use crate::error::{Error, Result};
use crate::memspace::{FILE_SLOTS, INTEGER_CELLS};

/// Largest magnitude a CAJOlang integer may have. The valid range is [-32767, 32767];
/// -32768 is excluded even though the wire format can represent it.
pub const VALUE_LIMIT: i64 = 32767;

/// Which of the two addressable memory kinds a position refers to.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MemKind {
  Integer,
  File,
}

impl MemKind {
  fn last_position(&self) -> i64 {
    match self {
      MemKind::Integer => (INTEGER_CELLS - 1) as i64,
      MemKind::File    => (FILE_SLOTS - 1) as i64,
    }
  }
}

/// Fails unless `number` fits the signed 16-bit value range [-32767, 32767].
/// Compared endpoint-wise: `i64::MIN` has no `i64` absolute value, so the check must
/// never negate its argument.
pub fn check_int16(number: i64) -> Result<()> {
  match number < -VALUE_LIMIT || number > VALUE_LIMIT {
    true  => Err(Error::Range(
      format!("{} is outside the [-{}, {}] range", number, VALUE_LIMIT, VALUE_LIMIT)
    )),
    false => Ok(()),
  }
}

/// Fails unless `target` is a valid instruction pointer for a program of `line_count`
/// statements. The index equal to `line_count` is the end sentinel and is valid.
pub fn check_instruction_pointer(target: i64, line_count: usize) -> Result<()> {
  match target < 0 || target > line_count as i64 {
    true  => Err(Error::Range(
      format!("jump target {} is outside [0, {}]", target, line_count)
    )),
    false => Ok(()),
  }
}

/// Fails unless `position` addresses an existing cell of the given memory kind.
pub fn check_mem_position(position: i64, kind: MemKind) -> Result<()> {
  let last = kind.last_position();
  match position < 0 || position > last {
    true  => Err(Error::Range(
      format!("memory position {} is outside [0, {}]", position, last)
    )),
    false => Ok(()),
  }
}
