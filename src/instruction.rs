/*!
  The CAJOlang instruction set. The `strum` derives on `Opcode` give the opcode <-> text
  mapping used by the statement parser and by error messages; a token `Opcode::from_str`
  rejects is not part of the language. `Instruction` pairs an opcode with operands of the
  shape that opcode takes, so a statement with the wrong operand count cannot be
  represented at all — it is caught at parse time.
*/

use std::fmt::{Display, Formatter};

use strum_macros::{Display as StrumDisplay, EnumString, IntoStaticStr};

#[derive(
StrumDisplay, IntoStaticStr, EnumString,
Clone,        Copy,          Eq, PartialEq, Debug, Hash
)]
pub enum Opcode {
  // Integer memory //
  #[strum(serialize = "COPY_TO_MEMORY")]
  CopyToMemory,        // COPY_TO_MEMORY P
  #[strum(serialize = "COPY_FROM_MEMORY")]
  CopyFromMemory,      // COPY_FROM_MEMORY P
  #[strum(serialize = "SET_MEMORY")]
  SetMemory,           // SET_MEMORY number P

  // Arithmetic //
  #[strum(serialize = "ADD")]
  Add,                 // ADD P
  #[strum(serialize = "SUBTRACT")]
  Subtract,            // SUBTRACT P

  // Output //
  #[strum(serialize = "PRINT")]
  Print,               // PRINT

  // Control flow //
  #[strum(serialize = "JUMP_IF_NEGATIVE_TO")]
  JumpIfNegativeTo,    // JUMP_IF_NEGATIVE_TO I
  #[strum(serialize = "JUMP_IF_POSITIVE_TO")]
  JumpIfPositiveTo,    // JUMP_IF_POSITIVE_TO I
  #[strum(serialize = "JUMP_IF_ZERO_TO")]
  JumpIfZeroTo,        // JUMP_IF_ZERO_TO I
  #[strum(serialize = "JUMP")]
  Jump,                // JUMP I

  // File I/O //
  #[strum(serialize = "OPEN")]
  Open,                // OPEN filename P mode
  #[strum(serialize = "CLOSE")]
  Close,               // CLOSE P
  #[strum(serialize = "READ")]
  Read,                // READ P
  #[strum(serialize = "WRITE")]
  Write,               // WRITE P
}

impl Opcode {
  /// Number of operands the opcode takes in source text.
  pub fn arity(&self) -> usize {
    match self {
      Opcode::Print     => 0,
      Opcode::SetMemory => 2,
      Opcode::Open      => 3,
      _                 => 1,
    }
  }
}

/// Holds one parsed statement: an opcode together with operands of its shape.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Instruction {
  /// PRINT
  Nullary(Opcode),
  /// A single integer operand — a memory position or a jump target.
  Unary {
    opcode: Opcode,
    arg: i64,
  },
  /// SET_MEMORY number P
  Binary {
    opcode: Opcode,
    arg1: i64,
    arg2: i64,
  },
  /// OPEN filename P mode
  OpenFile {
    filename: String,
    position: i64,
    mode: i64,
  },
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {

      Instruction::Nullary(opcode) => {
        write!(f, "{}", opcode)
      }

      Instruction::Unary { opcode, arg } => {
        write!(f, "{} {}", opcode, arg)
      }

      Instruction::Binary { opcode, arg1, arg2 } => {
        write!(f, "{} {} {}", opcode, arg1, arg2)
      }

      Instruction::OpenFile { filename, position, mode } => {
        write!(f, "{} {} {} {}", Opcode::Open, filename, position, mode)
      }

    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use std::str::FromStr;

  #[test]
  fn opcode_round_trips_through_text() {
    for &(opcode, text) in &[
      (Opcode::CopyToMemory, "COPY_TO_MEMORY"),
      (Opcode::SetMemory, "SET_MEMORY"),
      (Opcode::JumpIfPositiveTo, "JUMP_IF_POSITIVE_TO"),
      (Opcode::Open, "OPEN"),
      (Opcode::Print, "PRINT"),
    ] {
      assert_eq!(opcode.to_string(), text);
      assert_eq!(Opcode::from_str(text).unwrap(), opcode);
    }
  }

  #[test]
  fn unknown_tokens_are_rejected() {
    assert!(Opcode::from_str("FOO").is_err());
    assert!(Opcode::from_str("print").is_err());
  }

  #[test]
  fn arities() {
    assert_eq!(Opcode::Print.arity(), 0);
    assert_eq!(Opcode::Add.arity(), 1);
    assert_eq!(Opcode::SetMemory.arity(), 2);
    assert_eq!(Opcode::Open.arity(), 3);
  }

  #[test]
  fn instruction_displays_as_source_text() {
    let open = Instruction::OpenFile { filename: "data.bin".to_string(), position: 0, mode: 1 };
    assert_eq!(open.to_string(), "OPEN data.bin 0 1");
    let set = Instruction::Binary { opcode: Opcode::SetMemory, arg1: -3, arg2: 1 };
    assert_eq!(set.to_string(), "SET_MEMORY -3 1");
  }
}
