//! Binary scalar grammar.
//!
//! A binary scalar is a one-byte tag followed by its payload: varints for
//! integers and string lengths, eight little-endian bytes for doubles, and
//! nothing for booleans. Structural bytes are shared with the text grammar.

use crate::error::{Error, Result};
use crate::lexer::Token;
use crate::scanner::Scanner;

pub const STRING_MARKER: u8 = 0x01;
pub const INT64_MARKER: u8 = 0x02;
pub const DOUBLE_MARKER: u8 = 0x03;
pub const FALSE_MARKER: u8 = 0x04;
pub const TRUE_MARKER: u8 = 0x05;
pub const UINT64_MARKER: u8 = 0x06;

const MAX_VARINT_BYTES: usize = 10;
const MAX_LENGTH_VARINT_BYTES: usize = 5;

/// Returns `true` if `byte` starts a binary scalar.
pub fn is_marker(byte: u8) -> bool {
    (STRING_MARKER..=UINT64_MARKER).contains(&byte)
}

pub fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

pub fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// Read one binary scalar. The scanner must be positioned on its tag.
pub fn read_scalar(scanner: &mut Scanner<'_>) -> Result<Token> {
    let start = scanner.position();
    let Some(tag) = scanner.next_byte()? else {
        return Err(scanner.error_here(Error::eof()));
    };
    match tag {
        STRING_MARKER => {
            let raw = read_varint(scanner, MAX_LENGTH_VARINT_BYTES, start)?;
            if raw > u64::from(u32::MAX) {
                return Err(scanner.error_at(
                    Error::malformed_binary("string length overflows 32 bits"),
                    start,
                ));
            }
            let len = zigzag_decode(raw);
            if len < 0 {
                return Err(scanner.error_at(
                    Error::malformed_binary(format!("negative string length {len}")),
                    start,
                ));
            }
            let mut bytes = Vec::new();
            scanner.read_exact(len as usize, &mut bytes)?;
            Ok(Token::String(bytes))
        }
        INT64_MARKER => {
            let raw = read_varint(scanner, MAX_VARINT_BYTES, start)?;
            Ok(Token::Int64(zigzag_decode(raw)))
        }
        UINT64_MARKER => Ok(Token::Uint64(read_varint(scanner, MAX_VARINT_BYTES, start)?)),
        DOUBLE_MARKER => {
            let mut payload = Vec::with_capacity(8);
            scanner.read_exact(8, &mut payload)?;
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&payload);
            Ok(Token::Double(f64::from_le_bytes(bytes)))
        }
        FALSE_MARKER => Ok(Token::Boolean(false)),
        TRUE_MARKER => Ok(Token::Boolean(true)),
        other => Err(scanner.error_at(
            Error::malformed_binary(format!("unknown tag 0x{other:02x}")),
            start,
        )),
    }
}

fn read_varint(scanner: &mut Scanner<'_>, max_bytes: usize, start: u64) -> Result<u64> {
    let mut value = 0u64;
    for i in 0..max_bytes {
        let Some(byte) = scanner.next_byte()? else {
            return Err(scanner.error_here(Error::malformed_binary("truncated varint")));
        };
        let bits = u64::from(byte & 0x7f);
        let shift = 7 * i as u32;
        if shift == 63 && bits > 1 {
            return Err(scanner.error_at(
                Error::malformed_binary("varint overflows 64 bits"),
                start,
            ));
        }
        value |= bits << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(scanner.error_at(Error::malformed_binary("varint is too long"), start))
}

pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push(((value & 0x7f) as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

pub fn write_string(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    let len = i32::try_from(bytes.len()).map_err(|_| {
        Error::malformed_binary(format!(
            "string of {} bytes is too long for the binary format",
            bytes.len()
        ))
    })?;
    out.push(STRING_MARKER);
    write_varint(out, zigzag_encode(i64::from(len)));
    out.extend_from_slice(bytes);
    Ok(())
}

pub fn write_int64(out: &mut Vec<u8>, n: i64) {
    out.push(INT64_MARKER);
    write_varint(out, zigzag_encode(n));
}

pub fn write_uint64(out: &mut Vec<u8>, n: u64) {
    out.push(UINT64_MARKER);
    write_varint(out, n);
}

pub fn write_double(out: &mut Vec<u8>, x: f64) {
    out.push(DOUBLE_MARKER);
    out.extend_from_slice(&x.to_le_bytes());
}

pub fn write_boolean(out: &mut Vec<u8>, b: bool) {
    out.push(if b { TRUE_MARKER } else { FALSE_MARKER });
}
