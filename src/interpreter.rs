/*!
  The execution engine: the `Machine` owns the instruction pointer and the memory space
  and executes one typed `Instruction` at a time; the `Interpreter` binds a machine to a
  source file and drives the fetch-parse-execute loop over it.

  Every handler validates its operands before mutating anything, so a failing
  instruction leaves the machine exactly as it found it, and any error aborts the run
  and propagates to the caller.
*/

use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use prettytable::{format as TableFormat, Table};

use crate::codec;
use crate::error::{Error, Result};
use crate::instruction::{Instruction, Opcode};
use crate::memspace::{MemSpace, OpenMode, FILE_SLOTS, INTEGER_CELLS};
use crate::parser;
use crate::validation::{check_instruction_pointer, check_int16, check_mem_position, MemKind};

/// Longest filename the OPEN instruction accepts.
pub const MAX_FILENAME_LENGTH: usize = 15;

/// Largest minute value a source file may declare on its first line.
const LAST_MINUTE: u32 = 59;

/// Mutable machine state threaded through every instruction handler: the memory space,
/// the instruction pointer, and the statement count bounding jump targets.
pub struct Machine {
  memspace: MemSpace,
  instruction_pointer: usize,
  line_count: usize,
  output: Box<dyn Write>,
}

impl Machine {

  // region Construction and fetch support

  /// A fresh machine for a program of `line_count` executable statements. The end
  /// sentinel sits at index `line_count`; PRINT emits to `output`.
  pub fn new(line_count: usize, output: Box<dyn Write>) -> Machine {
    Machine {
      memspace: MemSpace::new(),
      instruction_pointer: 0,
      line_count,
      output,
    }
  }

  pub fn instruction_pointer(&self) -> usize {
    self.instruction_pointer
  }

  fn advance(&mut self) -> Result<()> {
    self.instruction_pointer += 1;
    Ok(())
  }

  // endregion

  // region Dispatch

  /// Executes a single instruction: validate operands, mutate state, position the
  /// instruction pointer. Jump handlers set the pointer themselves; every other
  /// handler advances it by one.
  pub fn execute(&mut self, instruction: &Instruction) -> Result<()> {
    match instruction {

      Instruction::Nullary(Opcode::Print) => self.print(),

      Instruction::Unary { opcode, arg } => {
        match opcode {
          Opcode::CopyToMemory     => self.copy_to_memory(*arg),
          Opcode::CopyFromMemory   => self.copy_from_memory(*arg),
          Opcode::Add              => self.add(*arg),
          Opcode::Subtract         => self.subtract(*arg),
          Opcode::JumpIfNegativeTo => self.jump_if(*arg, |temp| temp < 0),
          Opcode::JumpIfPositiveTo => self.jump_if(*arg, |temp| temp > 0),
          Opcode::JumpIfZeroTo     => self.jump_if(*arg, |temp| temp == 0),
          Opcode::Jump             => self.jump(*arg),
          Opcode::Close            => self.close(*arg),
          Opcode::Read             => self.read(*arg),
          Opcode::Write            => self.write(*arg),
          _ => Err(Error::Format(format!("malformed instruction {}", instruction))),
        }
      }

      Instruction::Binary { opcode: Opcode::SetMemory, arg1, arg2 } => {
        self.set_memory(*arg1, *arg2)
      }

      Instruction::OpenFile { filename, position, mode } => {
        self.open(filename, *position, *mode)
      }

      _ => Err(Error::Format(format!("malformed instruction {}", instruction))),

    }
  }

  // endregion

  // region Instruction handlers

  /// COPY_TO_MEMORY P — copy the temp area into integer position P. The temp area may
  /// hold an accumulated value wider than 16 bits; storing it into a cell re-checks it.
  fn copy_to_memory(&mut self, position: i64) -> Result<()> {
    check_mem_position(position, MemKind::Integer)?;
    let temp = self.memspace.temp_area()?;
    check_int16(temp)?;
    self.memspace.set_integer(position as usize, temp as i16);
    self.advance()
  }

  /// COPY_FROM_MEMORY P — copy integer position P into the temp area.
  fn copy_from_memory(&mut self, position: i64) -> Result<()> {
    check_mem_position(position, MemKind::Integer)?;
    let value = self.memspace.integer(position as usize)?;
    self.memspace.set_temp_area(value as i64);
    self.advance()
  }

  /// SET_MEMORY number P — store an explicit integer at integer position P.
  fn set_memory(&mut self, number: i64, position: i64) -> Result<()> {
    check_int16(number)?;
    check_mem_position(position, MemKind::Integer)?;
    self.memspace.set_integer(position as usize, number as i16);
    self.advance()
  }

  /// ADD P — add integer position P into the temp area.
  fn add(&mut self, position: i64) -> Result<()> {
    check_mem_position(position, MemKind::Integer)?;
    let temp = self.memspace.temp_area()?;
    let value = self.memspace.integer(position as usize)? as i64;
    self.memspace.set_temp_area(temp + value);
    self.advance()
  }

  /// SUBTRACT P — subtract integer position P from the temp area.
  fn subtract(&mut self, position: i64) -> Result<()> {
    check_mem_position(position, MemKind::Integer)?;
    let temp = self.memspace.temp_area()?;
    let value = self.memspace.integer(position as usize)? as i64;
    self.memspace.set_temp_area(temp - value);
    self.advance()
  }

  /// PRINT — emit the temp area on the output.
  fn print(&mut self) -> Result<()> {
    let temp = self.memspace.temp_area()?;
    writeln!(self.output, "{}", temp)?;
    self.advance()
  }

  /// JUMP I — unconditionally move the instruction pointer to statement I.
  fn jump(&mut self, target: i64) -> Result<()> {
    check_instruction_pointer(target, self.line_count)?;
    self.instruction_pointer = target as usize;
    Ok(())
  }

  /// The conditional jumps: move to statement I when the condition holds for the temp
  /// area, otherwise fall through to the next statement. JUMP_IF_POSITIVE_TO is
  /// strictly positive; zero falls through.
  fn jump_if(&mut self, target: i64, condition: fn(i64) -> bool) -> Result<()> {
    check_instruction_pointer(target, self.line_count)?;
    let temp = self.memspace.temp_area()?;
    match condition(temp) {
      true => {
        self.instruction_pointer = target as usize;
        Ok(())
      }
      false => self.advance(),
    }
  }

  /// OPEN filename P mode — open the named file (at most 15 characters) into file
  /// position P, mode 0 for reading or 1 for appending.
  fn open(&mut self, filename: &str, position: i64, mode: i64) -> Result<()> {
    check_mem_position(position, MemKind::File)?;
    let mode = OpenMode::from_flag(mode)?;
    if filename.chars().count() > MAX_FILENAME_LENGTH {
      return Err(Error::Format(format!(
        "filename {:?} is longer than {} characters", filename, MAX_FILENAME_LENGTH
      )));
    }
    self.memspace.open_file(position as usize, filename, mode)?;
    self.advance()
  }

  /// CLOSE P — close the file at file position P.
  fn close(&mut self, position: i64) -> Result<()> {
    check_mem_position(position, MemKind::File)?;
    self.memspace.close_file(position as usize)?;
    self.advance()
  }

  /// READ P — read one encoded integer line from file position P into the temp area.
  fn read(&mut self, position: i64) -> Result<()> {
    check_mem_position(position, MemKind::File)?;
    let line = self.memspace.file_handle(position as usize)?.read_line()?;
    let value = codec::decode(&line)?;
    self.memspace.set_temp_area(value as i64);
    self.advance()
  }

  /// WRITE P — append the temp area to file position P as one encoded integer line.
  fn write(&mut self, position: i64) -> Result<()> {
    check_mem_position(position, MemKind::File)?;
    let temp = self.memspace.temp_area()?;
    check_int16(temp)?;
    let encoded = codec::encode(temp as i16);
    self.memspace.file_handle(position as usize)?.write_line(&encoded)?;
    self.advance()
  }

  // endregion

}

lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

fn format_cell<T: Display>(cell: Option<T>) -> String {
  match cell {
    Some(value) => format!("{}", value),
    None        => "unset".to_string(),
  }
}

impl Display for Machine {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let mut table = Table::new();
    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Cell", ubl->"Contents"]);

    table.add_row(row![r->"IP =", format!("{}", self.instruction_pointer)]);
    table.add_row(row![r->"temp =", format_cell(self.memspace.peek_temp_area())]);
    for position in 0..INTEGER_CELLS {
      table.add_row(
        row![r->format!("M[{}] =", position), format_cell(self.memspace.peek_integer(position))]
      );
    }
    for position in 0..FILE_SLOTS {
      let state = match self.memspace.is_open(position) {
        true  => "open",
        false => "unset",
      };
      table.add_row(row![r->format!("F[{}] =", position), state]);
    }

    write!(f, "{}", table)
  }
}

/// One interpreter instance, bound to a single source file. The scheduler constructs
/// one per discovered file, reads its execution minute once, and calls `run` whenever
/// that minute comes up.
pub struct Interpreter {
  source_file: PathBuf,
}

impl Interpreter {
  pub fn new<P: Into<PathBuf>>(source_file: P) -> Interpreter {
    Interpreter { source_file: source_file.into() }
  }

  /// Reads the minute in [0, 59] declared on the source file's first line. The line is
  /// metadata for the scheduler and is never executed.
  pub fn get_execution_minute(&self) -> Result<u32> {
    let text = fs::read_to_string(&self.source_file)?;
    let first_line = text.lines().next().unwrap_or("").trim();
    let minute = first_line.parse::<u32>().map_err(|_| Error::Format(
      format!("the first source line must be the execution minute, got {:?}", first_line)
    ))?;
    if minute > LAST_MINUTE {
      return Err(Error::Range(
        format!("execution minute {} is outside [0, {}]", minute, LAST_MINUTE)
      ));
    }
    Ok(minute)
  }

  /// Runs the program to completion, printing to standard output.
  pub fn run(&mut self) -> Result<()> {
    self.run_with_output(Box::new(io::stdout()))
  }

  /// Runs the program to completion with PRINT directed at `output`. Each run starts
  /// from a fresh machine: instruction pointer at the first statement, all cells unset.
  pub fn run_with_output(&mut self, output: Box<dyn Write>) -> Result<()> {
    let buffer = self.load()?;
    // The sentinel sits at the last buffer index, which is also the upper bound for
    // jump targets; the pointer can therefore never leave the buffer.
    let line_count = buffer.len() - 1;
    let mut machine = Machine::new(line_count, output);

    loop {
      let statement = &buffer[machine.instruction_pointer()];
      if statement.is_empty() {
        break; // end of program
      }
      let instruction = parser::parse(statement)?;
      machine.execute(&instruction)?;

      #[cfg(feature = "trace_execution")]
      println!("{}", machine);
    }

    Ok(())
  }

  /// Loads the execution buffer: every line after the metadata line, renumbered from
  /// zero, with one empty sentinel line appended.
  fn load(&self) -> Result<Vec<String>> {
    let text = fs::read_to_string(&self.source_file)?;
    let mut buffer: Vec<String> = text.lines().skip(1).map(str::to_string).collect();
    buffer.push(String::new());
    Ok(buffer)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use std::io::Write as _;
  use std::rc::Rc;

  /// A cloneable sink so a test can keep reading what the machine printed.
  #[derive(Clone, Default)]
  struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

  impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
      self.0.borrow_mut().extend_from_slice(buf);
      Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
      Ok(())
    }
  }

  impl SharedBuffer {
    fn contents(&self) -> String {
      String::from_utf8(self.0.borrow().clone()).unwrap()
    }
  }

  fn run_source(source: &str) -> (Result<()>, String) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", source).unwrap();
    let buffer = SharedBuffer::default();
    let mut interpreter = Interpreter::new(file.path());
    let result = interpreter.run_with_output(Box::new(buffer.clone()));
    (result, buffer.contents())
  }

  fn test_machine(line_count: usize) -> Machine {
    Machine::new(line_count, Box::new(io::sink()))
  }

  #[test]
  fn scenario_set_copy_print() {
    let (result, output) = run_source("0\nSET_MEMORY 5 0\nCOPY_FROM_MEMORY 0\nPRINT\n");
    result.unwrap();
    assert_eq!(output, "5\n");
  }

  #[test]
  fn scenario_add_to_zero() {
    let (result, output) = run_source(
      "0\nSET_MEMORY 3 0\nSET_MEMORY -3 1\nCOPY_FROM_MEMORY 0\nADD 1\nPRINT\n"
    );
    result.unwrap();
    assert_eq!(output, "0\n");
  }

  #[test]
  fn scenario_jump_skips_statements() {
    let (result, output) = run_source(
      "0\nJUMP 3\nPRINT\nPRINT\nSET_MEMORY 0 0\nCOPY_FROM_MEMORY 0\nPRINT\n"
    );
    result.unwrap();
    // The two skipped PRINTs would have failed on the unset temp area.
    assert_eq!(output, "0\n");
  }

  #[test]
  fn countdown_loop() {
    let (result, output) = run_source(
      "0\n\
       SET_MEMORY 3 0\n\
       SET_MEMORY 1 1\n\
       COPY_FROM_MEMORY 0\n\
       PRINT\n\
       SUBTRACT 1\n\
       COPY_TO_MEMORY 0\n\
       JUMP_IF_POSITIVE_TO 2\n"
    );
    result.unwrap();
    assert_eq!(output, "3\n2\n1\n");
  }

  /// Restores the previous working directory when dropped, so a test that has to
  /// change it cannot leave the process inside a deleted temp directory.
  struct CwdGuard(std::path::PathBuf);

  impl CwdGuard {
    fn change_to(path: &std::path::Path) -> CwdGuard {
      let previous = std::env::current_dir().unwrap();
      std::env::set_current_dir(path).unwrap();
      CwdGuard(previous)
    }
  }

  impl Drop for CwdGuard {
    fn drop(&mut self) {
      let _ = std::env::set_current_dir(&self.0);
    }
  }

  #[test]
  fn scenario_file_round_trip() {
    // OPEN resolves its 15-character filenames against the working directory, so this
    // test must run inside the temp directory. Every other test reaches its files
    // through absolute paths and is indifferent to the change; the guard puts the
    // original directory back before the TempDir is dropped.
    let directory = tempfile::tempdir().unwrap();
    let guard = CwdGuard::change_to(directory.path());

    let (result, output) = run_source(
      "0\n\
       SET_MEMORY 7 0\n\
       COPY_FROM_MEMORY 0\n\
       OPEN data.bin 0 1\n\
       WRITE 0\n\
       CLOSE 0\n\
       OPEN data.bin 0 0\n\
       READ 0\n\
       PRINT\n"
    );
    result.unwrap();
    assert_eq!(output, "7\n");
    let written = fs::read_to_string(directory.path().join("data.bin")).unwrap();
    assert_eq!(written, "0000000000000111\n");
    drop(guard);
  }

  #[test]
  fn set_memory_rejects_an_extreme_operand() {
    // A full-width operand far outside 16 bits must fail the range check, not wrap
    // into a cell.
    let (result, _) = run_source("0\nSET_MEMORY -9223372036854775808 0\n");
    assert!(matches!(result, Err(Error::Range(_))));
  }

  #[test]
  fn unknown_opcode_aborts_the_run() {
    let (result, output) = run_source("0\nFOO 1\nPRINT\n");
    match result {
      Err(Error::UnknownInstruction(token)) => assert_eq!(token, "FOO"),
      other => panic!("expected UnknownInstruction, got {:?}", other),
    }
    assert_eq!(output, "");
  }

  #[test]
  fn jump_to_the_sentinel_halts() {
    let (result, output) = run_source("0\nSET_MEMORY 1 0\nJUMP 2\n");
    result.unwrap();
    assert_eq!(output, "");
  }

  #[test]
  fn jump_past_the_sentinel_is_a_range_error() {
    let (result, _) = run_source("0\nJUMP 5\n");
    assert!(matches!(result, Err(Error::Range(_))));
  }

  #[test]
  fn printing_an_unset_temp_area_fails() {
    let (result, _) = run_source("0\nPRINT\n");
    assert!(matches!(result, Err(Error::Uninitialized(_))));
  }

  #[test]
  fn conditional_jumps_at_zero() {
    // Zero only satisfies JUMP_IF_ZERO_TO; JUMP_IF_POSITIVE_TO is strictly positive.
    let mut machine = test_machine(10);
    machine.memspace.set_temp_area(0);

    machine.execute(&Instruction::Unary { opcode: Opcode::JumpIfPositiveTo, arg: 5 }).unwrap();
    assert_eq!(machine.instruction_pointer(), 1);

    machine.execute(&Instruction::Unary { opcode: Opcode::JumpIfNegativeTo, arg: 5 }).unwrap();
    assert_eq!(machine.instruction_pointer(), 2);

    machine.execute(&Instruction::Unary { opcode: Opcode::JumpIfZeroTo, arg: 5 }).unwrap();
    assert_eq!(machine.instruction_pointer(), 5);
  }

  #[test]
  fn failed_validation_leaves_state_untouched() {
    let mut machine = test_machine(10);
    machine.memspace.set_temp_area(1);

    let result = machine.execute(&Instruction::Unary { opcode: Opcode::JumpIfPositiveTo, arg: 11 });
    assert!(matches!(result, Err(Error::Range(_))));
    assert_eq!(machine.instruction_pointer(), 0);

    let result = machine.execute(&Instruction::Binary { opcode: Opcode::SetMemory, arg1: 40000, arg2: 0 });
    assert!(matches!(result, Err(Error::Range(_))));
    assert!(machine.memspace.peek_integer(0).is_none());
  }

  #[test]
  fn storing_an_overflowed_temp_area_is_a_range_error() {
    let mut machine = test_machine(10);
    machine.memspace.set_temp_area(40000);
    let result = machine.execute(&Instruction::Unary { opcode: Opcode::CopyToMemory, arg: 0 });
    assert!(matches!(result, Err(Error::Range(_))));
  }

  #[test]
  fn open_rejects_a_long_filename() {
    let mut machine = test_machine(10);
    let instruction = Instruction::OpenFile {
      filename: "sixteen_chars.cl".to_string(),
      position: 0,
      mode: 0,
    };
    assert!(matches!(machine.execute(&instruction), Err(Error::Format(_))));
  }

  #[test]
  fn open_rejects_a_bad_mode() {
    let mut machine = test_machine(10);
    let instruction = Instruction::OpenFile { filename: "d.bin".to_string(), position: 0, mode: 2 };
    assert!(matches!(machine.execute(&instruction), Err(Error::TypeMismatch(_))));
  }

  #[test]
  fn execution_minute_accessor() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "30\nPRINT\n").unwrap();
    assert_eq!(Interpreter::new(file.path()).get_execution_minute().unwrap(), 30);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "75\n").unwrap();
    assert!(matches!(
      Interpreter::new(file.path()).get_execution_minute(),
      Err(Error::Range(_))
    ));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "soon\n").unwrap();
    assert!(matches!(
      Interpreter::new(file.path()).get_execution_minute(),
      Err(Error::Format(_))
    ));
  }

  #[test]
  fn machine_state_display() {
    let mut machine = test_machine(3);
    machine.memspace.set_temp_area(5);
    let rendered = format!("{}", machine);
    assert!(rendered.contains("temp"));
    assert!(rendered.contains("unset"));
  }
}
