/*!
  The memory space of one interpreter instance:

    - 3 integer cells (positions 0 to 2), each holding one signed 16-bit integer
    - 2 file-handle slots (positions 0 to 1), each holding one open file
    - the temp area, a single scratch cell used by arithmetic, printing, jumping,
      and the file instructions

  Every cell starts unset. Position validation is the callers' job (see
  `crate::validation`); this module only enforces the unset/set distinction, reported
  as `Error::Uninitialized`.
*/

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};

use crate::error::{Error, Result};

/// Number of addressable integer cells.
pub const INTEGER_CELLS: usize = 3;
/// Number of addressable file-handle slots.
pub const FILE_SLOTS: usize = 2;

/// The two open modes the OPEN instruction knows: 0 reads, 1 appends.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum OpenMode {
  Read,
  Append,
}

impl OpenMode {
  /// Converts the OPEN instruction's numeric mode operand.
  pub fn from_flag(flag: i64) -> Result<OpenMode> {
    match flag {
      0 => Ok(OpenMode::Read),
      1 => Ok(OpenMode::Append),
      _ => Err(Error::TypeMismatch(
        format!("mode must be either 0 (read) or 1 (append), got {}", flag)
      )),
    }
  }
}

/// An open file, tagged by the mode it was opened in. READ requires a `Reader`,
/// WRITE requires a `Writer`; using one against its mode is an i/o error.
pub enum FileHandle {
  Reader(BufReader<File>),
  Writer(File),
}

impl FileHandle {
  pub fn open(path: &str, mode: OpenMode) -> Result<FileHandle> {
    match mode {
      OpenMode::Read => {
        Ok(FileHandle::Reader(BufReader::new(File::open(path)?)))
      }
      OpenMode::Append => {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(FileHandle::Writer(file))
      }
    }
  }

  /// Reads one line, without its terminator.
  pub fn read_line(&mut self) -> Result<String> {
    match self {
      FileHandle::Reader(reader) => {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        Ok(line.trim_end_matches(|c| c == '\n' || c == '\r').to_string())
      }
      FileHandle::Writer(_) => {
        Err(Error::Io("file handle is not open for reading".to_string()))
      }
    }
  }

  /// Appends one line, adding the terminator.
  pub fn write_line(&mut self, text: &str) -> Result<()> {
    match self {
      FileHandle::Writer(file) => {
        writeln!(file, "{}", text)?;
        Ok(())
      }
      FileHandle::Reader(_) => {
        Err(Error::Io("file handle is not open for writing".to_string()))
      }
    }
  }
}

#[derive(Default)]
pub struct MemSpace {
  integer_mem: [Option<i16>; INTEGER_CELLS],
  file_handles: [Option<FileHandle>; FILE_SLOTS],
  temp_area: Option<i64>,
}

impl MemSpace {
  pub fn new() -> MemSpace {
    MemSpace::default()
  }

  pub fn integer(&self, position: usize) -> Result<i16> {
    self.integer_mem[position].ok_or_else(|| Error::Uninitialized(
      format!("integer memory position {} was never set", position)
    ))
  }

  pub fn set_integer(&mut self, position: usize, value: i16) {
    self.integer_mem[position] = Some(value);
  }

  pub fn temp_area(&self) -> Result<i64> {
    self.temp_area.ok_or_else(|| Error::Uninitialized(
      "the temp area was never set".to_string()
    ))
  }

  pub fn set_temp_area(&mut self, value: i64) {
    self.temp_area = Some(value);
  }

  /// Opens `path` into the given slot. A handle already in the slot is released first,
  /// so the slot never holds two open files.
  pub fn open_file(&mut self, position: usize, path: &str, mode: OpenMode) -> Result<()> {
    self.file_handles[position] = None;
    self.file_handles[position] = Some(FileHandle::open(path, mode)?);
    Ok(())
  }

  pub fn file_handle(&mut self, position: usize) -> Result<&mut FileHandle> {
    self.file_handles[position].as_mut().ok_or_else(|| Error::Uninitialized(
      format!("file memory position {} was never opened", position)
    ))
  }

  pub fn close_file(&mut self, position: usize) -> Result<()> {
    match self.file_handles[position].take() {
      Some(_handle) => Ok(()), // dropping the handle closes the file
      None => Err(Error::Uninitialized(
        format!("file memory position {} was never opened", position)
      )),
    }
  }

  // Non-failing views, used by the machine-state display.

  pub fn peek_integer(&self, position: usize) -> Option<i16> {
    self.integer_mem[position]
  }

  pub fn peek_temp_area(&self) -> Option<i64> {
    self.temp_area
  }

  pub fn is_open(&self, position: usize) -> bool {
    self.file_handles[position].is_some()
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write as _;

  #[test]
  fn cells_start_unset() {
    let memspace = MemSpace::new();
    assert!(matches!(memspace.integer(0), Err(Error::Uninitialized(_))));
    assert!(matches!(memspace.temp_area(), Err(Error::Uninitialized(_))));
  }

  #[test]
  fn set_then_read() {
    let mut memspace = MemSpace::new();
    memspace.set_integer(2, -41);
    memspace.set_temp_area(7);
    assert_eq!(memspace.integer(2).unwrap(), -41);
    assert_eq!(memspace.temp_area().unwrap(), 7);
    assert!(matches!(memspace.integer(1), Err(Error::Uninitialized(_))));
  }

  #[test]
  fn file_slot_lifecycle() {
    let mut memspace = MemSpace::new();
    assert!(matches!(memspace.file_handle(0), Err(Error::Uninitialized(_))));
    assert!(matches!(memspace.close_file(0), Err(Error::Uninitialized(_))));

    let file = tempfile::NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap().to_string();
    memspace.open_file(0, &path, OpenMode::Append).unwrap();
    assert!(memspace.is_open(0));
    memspace.close_file(0).unwrap();
    assert!(!memspace.is_open(0));
    assert!(matches!(memspace.close_file(0), Err(Error::Uninitialized(_))));
  }

  #[test]
  fn reopening_a_slot_replaces_the_handle() {
    let mut memspace = MemSpace::new();
    let file = tempfile::NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap().to_string();

    memspace.open_file(1, &path, OpenMode::Append).unwrap();
    memspace.file_handle(1).unwrap().write_line("0000000000000001").unwrap();
    // Second OPEN on the same slot releases the first handle.
    memspace.open_file(1, &path, OpenMode::Read).unwrap();
    assert_eq!(memspace.file_handle(1).unwrap().read_line().unwrap(), "0000000000000001");
  }

  #[test]
  fn handles_reject_the_wrong_mode() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "0000000000000101").unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let mut reader = FileHandle::open(&path, OpenMode::Read).unwrap();
    assert!(matches!(reader.write_line("x"), Err(Error::Io(_))));

    let mut writer = FileHandle::open(&path, OpenMode::Append).unwrap();
    assert!(matches!(writer.read_line(), Err(Error::Io(_))));
  }

  #[test]
  fn mode_flags() {
    assert_eq!(OpenMode::from_flag(0).unwrap(), OpenMode::Read);
    assert_eq!(OpenMode::from_flag(1).unwrap(), OpenMode::Append);
    assert!(matches!(OpenMode::from_flag(2), Err(Error::TypeMismatch(_))));
    assert!(matches!(OpenMode::from_flag(-1), Err(Error::TypeMismatch(_))));
  }
}
