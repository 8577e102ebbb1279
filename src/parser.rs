/*!
  Turns one line of CAJOlang source into a typed `Instruction`.

  A statement is an opcode followed by space-separated operands, with single spaces as
  the only separator the language defines. The tokenizer is a small `nom` combinator;
  the shaping step then resolves the opcode through its `strum` text mapping and checks
  the operand count against the opcode's arity, so a malformed statement fails here
  rather than mid-execution.

  Special cases, per the language definition:
    - PRINT takes zero operands and ignores anything after the opcode token.
    - OPEN keeps its first operand as literal filename text; the rest parse as integers.
    - Every other operand must parse as an integer, or the statement is malformed.
*/

use std::str::FromStr;

use nom::{
  bytes::complete::is_not,
  character::complete::char as one_char,
  combinator::opt,
  multi::separated_list,
  sequence::pair,
  IResult,
};

use crate::error::{Error, Result};
use crate::instruction::{Instruction, Opcode};

/// Splits a statement into its opcode token and the raw operand tokens after it.
fn tokens(statement: &str) -> IResult<&str, (&str, Vec<&str>)> {
  let (rest, opcode_token) = is_not(" ")(statement)?;
  let (rest, operands) = opt(
    pair(one_char(' '), separated_list(one_char(' '), is_not(" ")))
  )(rest)?;
  let operands = operands.map(|(_, list)| list).unwrap_or_default();
  Ok((rest, (opcode_token, operands)))
}

fn parse_operand(token: &str) -> Result<i64> {
  token.parse::<i64>().map_err(|_| Error::Format(
    format!("expected an integer operand, got {:?}", token)
  ))
}

/// Parses one source statement. Fails with `UnknownInstruction` for a token outside the
/// instruction set and with `Format` for a malformed operand list.
pub fn parse(statement: &str) -> Result<Instruction> {
  let (rest, (opcode_token, operands)) = tokens(statement).map_err(|_| Error::Format(
    format!("malformed statement {:?}", statement)
  ))?;

  let opcode = Opcode::from_str(opcode_token)
    .map_err(|_| Error::UnknownInstruction(opcode_token.to_string()))?;

  if opcode == Opcode::Print {
    // Zero operands regardless of trailing tokens.
    return Ok(Instruction::Nullary(opcode));
  }

  if !rest.is_empty() {
    return Err(Error::Format(
      format!("trailing input {:?} in statement {:?}", rest, statement)
    ));
  }
  if operands.len() != opcode.arity() {
    return Err(Error::Format(format!(
      "{} takes {} operand(s), got {}", opcode, opcode.arity(), operands.len()
    )));
  }

  match opcode {

    Opcode::Open => {
      Ok(Instruction::OpenFile {
        filename: operands[0].to_string(),
        position: parse_operand(operands[1])?,
        mode: parse_operand(operands[2])?,
      })
    }

    Opcode::SetMemory => {
      Ok(Instruction::Binary {
        opcode,
        arg1: parse_operand(operands[0])?,
        arg2: parse_operand(operands[1])?,
      })
    }

    _ => {
      Ok(Instruction::Unary { opcode, arg: parse_operand(operands[0])? })
    }

  }
}
