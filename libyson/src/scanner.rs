//! Byte scanner
//!
//! The scanner gives the token decoders one lookahead interface over either
//! an in-memory slice (zero-copy) or a blocking reader. Readers are consumed
//! in fixed-size blocks. The block before the current one stays buffered, so
//! a failure raised just after a block boundary can still be reported with
//! the bytes that led up to it.

use crate::error::{Error, Location, Result};
use log::trace;
use std::borrow::Cow;
use std::io::{self, Read};
use std::mem;

/// Size of the blocks read from a stream.
pub const BLOCK_SIZE: usize = 1024 * 1024;

/// Bytes of context shown before a failure.
const CONTEXT_BEFORE: u64 = 10;
/// Bytes of context shown from the failure onwards.
const CONTEXT_AFTER: u64 = 10;

struct Capture {
    bytes: Vec<u8>,
    from: usize,
}

pub struct Scanner<'a> {
    reader: Option<Box<dyn Read + 'a>>,
    block: Cow<'a, [u8]>,
    prev: Vec<u8>,
    spare: Vec<u8>,
    pos: usize,
    /// Absolute offset of `block[0]`.
    base: u64,
    block_size: usize,
    capture: Option<Capture>,
}

impl<'a> Scanner<'a> {
    /// Scan an in-memory buffer.
    pub fn from_slice(data: &'a [u8]) -> Self {
        Self::from_slice_at(data, 0)
    }

    /// Scan a buffer that starts at absolute offset `base` of some larger
    /// input, so reported offsets refer to that input.
    pub fn from_slice_at(data: &'a [u8], base: u64) -> Self {
        Scanner {
            reader: None,
            block: Cow::Borrowed(data),
            prev: Vec::new(),
            spare: Vec::new(),
            pos: 0,
            base,
            block_size: data.len(),
            capture: None,
        }
    }

    /// Scan a blocking reader in blocks of `BLOCK_SIZE` bytes.
    pub fn from_reader<R: Read + 'a>(reader: R) -> Self {
        Self::with_block_size(reader, BLOCK_SIZE)
    }

    pub(crate) fn with_block_size<R: Read + 'a>(reader: R, block_size: usize) -> Self {
        Scanner {
            reader: Some(Box::new(reader)),
            block: Cow::Owned(Vec::new()),
            prev: Vec::new(),
            spare: Vec::new(),
            pos: 0,
            base: 0,
            block_size: block_size.max(1),
            capture: None,
        }
    }

    /// Absolute offset of the next byte.
    pub fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    fn refill(&mut self) -> Result<bool> {
        let mut next = mem::take(&mut self.spare);
        let Some(reader) = self.reader.as_mut() else {
            self.spare = next;
            return Ok(false);
        };
        next.resize(self.block_size, 0);
        let mut filled = 0;
        while filled < next.len() {
            match reader.read(&mut next[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        next.truncate(filled);
        if filled == 0 {
            self.spare = next;
            self.reader = None;
            return Ok(false);
        }
        if let Some(capture) = &mut self.capture {
            capture.bytes.extend_from_slice(&self.block[capture.from..]);
            capture.from = 0;
        }
        let old = mem::replace(&mut self.block, Cow::Owned(next)).into_owned();
        self.base += old.len() as u64;
        self.spare = mem::replace(&mut self.prev, old);
        self.pos = 0;
        trace!("scanner: read {} bytes at offset {}", filled, self.base);
        Ok(true)
    }

    /// The next byte without consuming it, or `None` at end of stream.
    pub fn peek(&mut self) -> Result<Option<u8>> {
        if self.pos == self.block.len() && !self.refill()? {
            return Ok(None);
        }
        Ok(Some(self.block[self.pos]))
    }

    /// Consume the byte returned by the last `peek`.
    pub fn advance(&mut self) {
        debug_assert!(self.pos < self.block.len());
        self.pos += 1;
    }

    pub fn next_byte(&mut self) -> Result<Option<u8>> {
        let byte = self.peek()?;
        if byte.is_some() {
            self.advance();
        }
        Ok(byte)
    }

    /// Consume bytes while `pred` holds, appending them to `out`.
    pub fn take_while(&mut self, mut pred: impl FnMut(u8) -> bool, out: &mut Vec<u8>) -> Result<()> {
        loop {
            if self.pos == self.block.len() && !self.refill()? {
                return Ok(());
            }
            let rest = &self.block[self.pos..];
            let n = rest.iter().position(|&b| !pred(b)).unwrap_or(rest.len());
            out.extend_from_slice(&rest[..n]);
            self.pos += n;
            if self.pos < self.block.len() {
                return Ok(());
            }
        }
    }

    /// Consume bytes while `pred` holds.
    pub fn skip_while(&mut self, mut pred: impl FnMut(u8) -> bool) -> Result<()> {
        loop {
            if self.pos == self.block.len() && !self.refill()? {
                return Ok(());
            }
            let rest = &self.block[self.pos..];
            self.pos += rest.iter().position(|&b| !pred(b)).unwrap_or(rest.len());
            if self.pos < self.block.len() {
                return Ok(());
            }
        }
    }

    /// Append exactly `n` bytes to `out`; the stream ending first is an
    /// `UnexpectedEof` at the point where it ended.
    pub fn read_exact(&mut self, mut n: usize, out: &mut Vec<u8>) -> Result<()> {
        out.reserve(n.min(self.block_size));
        while n > 0 {
            if self.pos == self.block.len() && !self.refill()? {
                return Err(self.error_here(Error::eof()));
            }
            let take = n.min(self.block.len() - self.pos);
            out.extend_from_slice(&self.block[self.pos..self.pos + take]);
            self.pos += take;
            n -= take;
        }
        Ok(())
    }

    /// Start recording every consumed byte.
    pub fn begin_capture(&mut self) {
        self.capture = Some(Capture {
            bytes: Vec::new(),
            from: self.pos,
        });
    }

    /// Stop recording and return the bytes consumed since `begin_capture`.
    pub fn end_capture(&mut self) -> Vec<u8> {
        match self.capture.take() {
            Some(mut capture) => {
                capture
                    .bytes
                    .extend_from_slice(&self.block[capture.from..self.pos]);
                capture.bytes
            }
            None => Vec::new(),
        }
    }

    fn byte_at(&self, offset: u64) -> u8 {
        if offset >= self.base {
            self.block[(offset - self.base) as usize]
        } else {
            self.prev[self.prev.len() - (self.base - offset) as usize]
        }
    }

    /// Describe the failure at `offset` with whatever input is still
    /// buffered around it. If that byte has already been released the
    /// context is taken around the current position instead.
    pub fn locate(&self, offset: u64) -> Location {
        let retained_start = self.base - self.prev.len() as u64;
        let retained_end = self.base + self.block.len() as u64;
        let anchored = offset >= retained_start && offset <= retained_end;
        let anchor = if anchored { offset } else { self.position() };
        let start = anchor.saturating_sub(CONTEXT_BEFORE).max(retained_start);
        let end = (anchor + CONTEXT_AFTER).min(retained_end);
        Location {
            offset,
            context: (start..end).map(|at| self.byte_at(at)).collect(),
            context_pos: anchored.then(|| (anchor - start) as usize),
            path: Vec::new(),
        }
    }

    /// Locate `err` at `offset`.
    pub fn error_at(&self, err: Error, offset: u64) -> Error {
        err.at(self.locate(offset))
    }

    /// Locate `err` at the current position.
    pub fn error_here(&self, err: Error) -> Error {
        self.error_at(err, self.position())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(scanner: &mut Scanner<'_>) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(b) = scanner.next_byte().unwrap() {
            out.push(b);
        }
        out
    }

    #[test]
    fn test_slice_and_reader_agree() {
        let data = b"{a=b;c=[1;2;3]}";
        let mut slice = Scanner::from_slice(data);
        let mut reader = Scanner::with_block_size(&data[..], 4);
        assert_eq!(drain(&mut slice), data);
        assert_eq!(drain(&mut reader), data);
        assert_eq!(reader.position(), data.len() as u64);
    }

    #[test]
    fn test_take_while_crosses_blocks() {
        let mut scanner = Scanner::with_block_size(&b"abcdefgh;"[..], 3);
        let mut out = Vec::new();
        scanner
            .take_while(|b| b.is_ascii_alphabetic(), &mut out)
            .unwrap();
        assert_eq!(out, b"abcdefgh");
        assert_eq!(scanner.peek().unwrap(), Some(b';'));
    }

    #[test]
    fn test_read_exact_eof() {
        let mut scanner = Scanner::with_block_size(&b"abc"[..], 2);
        let mut out = Vec::new();
        let err = scanner.read_exact(5, &mut out).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof { .. }));
        assert_eq!(err.location().map(|l| l.offset), Some(3));
    }

    #[test]
    fn test_capture_spans_blocks() {
        let mut scanner = Scanner::with_block_size(&b"xx123456yy"[..], 3);
        scanner.skip_while(|b| b == b'x').unwrap();
        scanner.begin_capture();
        scanner.skip_while(|b| b.is_ascii_digit()).unwrap();
        assert_eq!(scanner.end_capture(), b"123456");
    }

    #[test]
    fn test_context_window() {
        let data = b"[0;1;2;3;4;5;{1=2}]";
        let mut scanner = Scanner::from_slice(data);
        scanner.skip_while(|_| true).unwrap();
        let location = scanner.locate(14);
        assert_eq!(location.context, b";2;3;4;5;{1=2}]");
        assert_eq!(location.context_pos, Some(10));
    }

    #[test]
    fn test_context_uses_previous_block() {
        let data = b"0123456789abcdefghij";
        let mut scanner = Scanner::with_block_size(&data[..], 8);
        let mut out = Vec::new();
        scanner.read_exact(18, &mut out).unwrap();
        // Blocks retained: [8, 16) and [16, 20).
        let location = scanner.locate(17);
        assert_eq!(location.context, b"89abcdefghij");
        assert_eq!(location.context_pos, Some(9));
    }

    #[test]
    fn test_released_failure_byte_has_no_position() {
        let data = b"0123456789abcdefghij";
        let mut scanner = Scanner::with_block_size(&data[..], 4);
        let mut out = Vec::new();
        scanner.read_exact(18, &mut out).unwrap();
        let location = scanner.locate(1);
        assert_eq!(location.offset, 1);
        assert_eq!(location.context_pos, None);
        assert_eq!(location.context, b"cdefghij");
    }
}
