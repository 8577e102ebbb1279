/*!
  Conversion between native signed 16-bit integers and the 16-character binary-text
  two's-complement representation the READ and WRITE instructions use for file I/O.

  `encode` assumes its argument was already validated to lie in [-32767, 32767] — that
  check belongs to the instruction handlers, not here. `decode` accepts every 16-bit
  pattern, including `1000000000000000` (-32768), which `encode` can never produce from
  a value in the valid range. The asymmetry is deliberate and must not be "fixed".
*/

use crate::error::{Error, Result};

/// Width of one encoded integer, in characters.
pub const ENCODED_WIDTH: usize = 16;

/// Encodes a signed 16-bit integer as 16 binary digits, sign in the most significant bit.
/// Negative values are `'1'` followed by the 15-bit binary representation of `32768 + value`.
pub fn encode(value: i16) -> String {
  match value >= 0 {
    true  => format!("{:016b}", value),
    false => format!("1{:015b}", 32768 + value as i32),
  }
}

/// Decodes 16 binary digits into a signed 16-bit integer. Inverse of `encode`.
pub fn decode(text: &str) -> Result<i16> {
  if text.len() != ENCODED_WIDTH {
    return Err(Error::Format(
      format!("binary value must be {} digits long, got {:?}", ENCODED_WIDTH, text)
    ));
  }
  if !text.bytes().all(|digit| digit == b'0' || digit == b'1') {
    return Err(Error::Format(
      format!("binary value must contain only ones and zeroes, got {:?}", text)
    ));
  }

  // The checks above guarantee both radix parses succeed.
  let parse = |digits: &str| {
    i32::from_str_radix(digits, 2)
      .map_err(|_| Error::Format(format!("binary value {:?} does not parse", digits)))
  };

  match text.as_bytes()[0] {
    b'1' => Ok((-32768 + parse(&text[1..])?) as i16),
    _    => Ok(parse(text)? as i16),
  }
}
