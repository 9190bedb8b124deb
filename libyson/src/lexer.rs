//! Token stream
//!
//! The lexer turns scanner bytes into tokens. Structural bytes and
//! whitespace are common to both grammars; scalars are decoded by the binary
//! or the text grammar depending on their first byte. The first scalar fixes
//! the grammar for the rest of the stream.

use crate::binary;
use crate::error::{Error, Result};
use crate::scanner::Scanner;
use crate::text;
use log::trace;

/// A single token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    BeginList,
    EndList,
    BeginMap,
    EndMap,
    BeginAttributes,
    EndAttributes,
    /// `=`
    KeyValueSeparator,
    /// `;`
    ItemSeparator,
    /// `#`
    Entity,
    String(Vec<u8>),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    Boolean(bool),
    EndOfStream,
}

impl Token {
    /// A short description for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::BeginList => "\"[\"".into(),
            Token::EndList => "\"]\"".into(),
            Token::BeginMap => "\"{\"".into(),
            Token::EndMap => "\"}\"".into(),
            Token::BeginAttributes => "\"<\"".into(),
            Token::EndAttributes => "\">\"".into(),
            Token::KeyValueSeparator => "\"=\"".into(),
            Token::ItemSeparator => "\";\"".into(),
            Token::Entity => "\"#\"".into(),
            Token::String(_) => "string".into(),
            Token::Int64(n) => format!("int64 {n}"),
            Token::Uint64(n) => format!("uint64 {n}"),
            Token::Double(x) => format!("double {x}"),
            Token::Boolean(b) => format!("boolean {b}"),
            Token::EndOfStream => "end of stream".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    Binary,
    Text,
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

pub struct Lexer<'a> {
    scanner: Scanner<'a>,
    grammar: Option<Grammar>,
}

impl<'a> Lexer<'a> {
    pub fn new(scanner: Scanner<'a>) -> Self {
        Lexer {
            scanner,
            grammar: None,
        }
    }

    pub fn scanner_mut(&mut self) -> &mut Scanner<'a> {
        &mut self.scanner
    }

    pub fn position(&self) -> u64 {
        self.scanner.position()
    }

    /// The grammar fixed by the first scalar, if one has been read.
    pub fn grammar(&self) -> Option<Grammar> {
        self.grammar
    }

    pub fn skip_whitespace(&mut self) -> Result<()> {
        self.scanner.skip_while(is_whitespace)
    }

    /// Returns `true` once only whitespace remains.
    pub fn at_end(&mut self) -> Result<bool> {
        self.skip_whitespace()?;
        Ok(self.scanner.peek()?.is_none())
    }

    /// Locate `err` at `offset`.
    pub fn error_at(&self, err: Error, offset: u64) -> Error {
        self.scanner.error_at(err, offset)
    }

    /// Read the next token and the offset where it starts.
    pub fn next_token(&mut self) -> Result<(Token, u64)> {
        self.skip_whitespace()?;
        let start = self.scanner.position();
        let Some(b) = self.scanner.peek()? else {
            return Ok((Token::EndOfStream, start));
        };
        let structural = match b {
            b'[' => Some(Token::BeginList),
            b']' => Some(Token::EndList),
            b'{' => Some(Token::BeginMap),
            b'}' => Some(Token::EndMap),
            b'<' => Some(Token::BeginAttributes),
            b'>' => Some(Token::EndAttributes),
            b'=' => Some(Token::KeyValueSeparator),
            b';' => Some(Token::ItemSeparator),
            b'#' => Some(Token::Entity),
            _ => None,
        };
        if let Some(token) = structural {
            self.scanner.advance();
            return Ok((token, start));
        }

        let grammar = if binary::is_marker(b) {
            Grammar::Binary
        } else if text::starts_scalar(b) {
            Grammar::Text
        } else {
            return Err(self.error_at(
                Error::malformed_token(format!("unexpected byte \"{}\"", [b].escape_ascii())),
                start,
            ));
        };
        match self.grammar {
            None => {
                trace!("lexer: {grammar:?} grammar detected at offset {start}");
                self.grammar = Some(grammar);
            }
            Some(fixed) if fixed != grammar => {
                return Err(self.error_at(
                    Error::malformed_token(format!(
                        "{grammar:?} scalar in a {fixed:?} stream; mixed grammars are not supported"
                    )),
                    start,
                ));
            }
            Some(_) => {}
        }
        let token = match grammar {
            Grammar::Binary => binary::read_scalar(&mut self.scanner)?,
            Grammar::Text => text::read_scalar(&mut self.scanner)?,
        };
        Ok((token, start))
    }
}
