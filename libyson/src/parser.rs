//! Recursive-descent parser
//!
//! The parser reads tokens from the lexer and builds nodes for the three
//! document shapes. Lazy decoding walks the same grammar but records the
//! span of each child instead of building it; raw mode walks it only to
//! find where each fragment item ends. Every walk enforces the nesting
//! limit, and errors pick up the key/index path while unwinding.

use crate::error::{Error, Result};
use crate::lazy::{LazyList, LazyMap, Span};
use crate::lexer::{Lexer, Token};
use crate::map::{Key, Map};
use crate::options::{DuplicateKeys, LoadOptions, YsonType};
use crate::scanner::Scanner;
use crate::value::{Attributes, ByteString, Node, Value};
use indexmap::IndexMap;
use log::trace;
use std::rc::Rc;

pub(crate) struct Parser<'a> {
    lexer: Lexer<'a>,
    options: LoadOptions,
    depth: usize,
    /// The buffer being scanned, when lazy containers may point into it.
    source: Option<Span>,
}

/// The bytes of one top-level fragment item.
struct CapturedItem {
    start: u64,
    bytes: Vec<u8>,
    /// Length of the value without its separator.
    value_len: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(scanner: Scanner<'a>, options: LoadOptions) -> Self {
        Parser {
            lexer: Lexer::new(scanner),
            options,
            depth: 0,
            source: None,
        }
    }

    pub(crate) fn over_span(span: &'a Span, options: LoadOptions) -> Self {
        Parser {
            lexer: Lexer::new(Scanner::from_slice_at(span.bytes(), span.offset())),
            options,
            depth: 0,
            source: Some(span.clone()),
        }
    }

    /// Parse a whole document of the configured shape.
    pub(crate) fn parse_document(&mut self) -> Result<Node> {
        let options = self.options;
        match options.yson_type {
            YsonType::Node => self.parse_single(),
            kind if options.raw => {
                let mut items = Vec::new();
                while let Some(item) = self.capture_item(kind, items.len())? {
                    items.push(Node::new(Value::Bytes(ByteString::from(item.bytes))));
                }
                Ok(self.finish(Value::List(items), None))
            }
            YsonType::ListFragment if options.lazy => {
                let items = self.lazy_list_items(Token::EndOfStream)?;
                Ok(Node::new(LazyList::from_spans(items, None, options)))
            }
            YsonType::MapFragment if options.lazy => {
                let entries = self.lazy_map_entries(Token::EndOfStream)?;
                Ok(Node::new(LazyMap::from_spans(entries, None, options)))
            }
            YsonType::ListFragment => {
                let items = self.parse_list_items(Token::EndOfStream)?;
                Ok(self.finish(Value::List(items), None))
            }
            YsonType::MapFragment => {
                let map = self.parse_map_entries(Token::EndOfStream)?;
                Ok(self.finish(Value::Map(map), None))
            }
        }
    }

    /// Parse exactly one value followed by the end of the stream.
    fn parse_single(&mut self) -> Result<Node> {
        let (token, start) = self.lexer.next_token()?;
        let node = self.parse_value(token, start)?;
        let (token, at) = self.lexer.next_token()?;
        if token != Token::EndOfStream {
            return Err(self
                .lexer
                .error_at(Error::TrailingData { location: None }, at));
        }
        Ok(node)
    }

    fn finish(&self, value: Value, attributes: Option<Attributes>) -> Node {
        let attributes = match attributes {
            Some(attributes) => Some(attributes),
            None if self.options.always_create_attributes => Some(Map::new()),
            None => None,
        };
        Node { value, attributes }
    }

    fn unexpected(&self, token: Token, at: u64, expected: &str) -> Error {
        let err = match token {
            Token::EndOfStream => Error::eof(),
            other => Error::malformed_token(format!(
                "expected {expected}, found {}",
                other.describe()
            )),
        };
        self.lexer.error_at(err, at)
    }

    fn enter(&mut self, at: u64) -> Result<()> {
        self.depth += 1;
        if self.depth > self.options.nesting_limit {
            return Err(self.lexer.error_at(
                Error::NestingTooDeep {
                    limit: self.options.nesting_limit,
                    location: None,
                },
                at,
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn span(&self, start: u64, end: u64) -> Result<Span> {
        match &self.source {
            Some(source) => Ok(source.sub(start, end)),
            None => Err(Error::configuration(
                "lazy decoding requires the whole input in memory",
            )),
        }
    }

    fn scalar(&self, token: Token, start: u64) -> Result<Value> {
        Ok(match token {
            Token::Entity => Value::Entity,
            Token::String(bytes) => Value::from_decoded(bytes, self.options.encoding),
            Token::Int64(n) => Value::Int64(n),
            Token::Uint64(n) => Value::Uint64(n),
            Token::Double(x) => Value::Double(x),
            Token::Boolean(b) => Value::Boolean(b),
            other => return Err(self.unexpected(other, start, "a value")),
        })
    }

    /// Parse a value whose first token has already been read.
    fn parse_value(&mut self, token: Token, start: u64) -> Result<Node> {
        if self.options.lazy {
            return self.parse_lazy_value(token, start);
        }
        let (attributes, token, start) = if token == Token::BeginAttributes {
            let attributes = self.parse_attributes(start)?;
            let (token, start) = self.lexer.next_token()?;
            (Some(attributes), token, start)
        } else {
            (None, token, start)
        };
        let value = match token {
            Token::BeginList => {
                self.enter(start)?;
                let items = self.parse_list_items(Token::EndList)?;
                self.leave();
                Value::List(items)
            }
            Token::BeginMap => {
                self.enter(start)?;
                let map = self.parse_map_entries(Token::EndMap)?;
                self.leave();
                Value::Map(map)
            }
            other => self.scalar(other, start)?,
        };
        Ok(self.finish(value, attributes))
    }

    fn parse_attributes(&mut self, start: u64) -> Result<Attributes> {
        self.enter(start)?;
        let attributes = self.parse_map_entries(Token::EndAttributes)?;
        self.leave();
        Ok(attributes)
    }

    /// Parse `;`-separated values up to `end`, which is consumed.
    fn parse_list_items(&mut self, end: Token) -> Result<Vec<Node>> {
        let mut items = Vec::new();
        loop {
            let index = items.len();
            let (token, start) = self.lexer.next_token().map_err(|e| e.in_index(index))?;
            if token == end {
                return Ok(items);
            }
            items.push(
                self.parse_value(token, start)
                    .map_err(|e| e.in_index(index))?,
            );
            if self.item_separator(&end)? {
                return Ok(items);
            }
        }
    }

    /// Parse `;`-separated `key=value` entries up to `end`, which is
    /// consumed.
    fn parse_map_entries(&mut self, end: Token) -> Result<Map> {
        let mut map = Map::new();
        let mut separator_at = None;
        loop {
            let (token, start) = self.lexer.next_token()?;
            if token == end {
                return Ok(map);
            }
            let key = self.parse_key(token, start, separator_at)?;
            self.key_value_separator()?;
            let (token, value_start) = self.lexer.next_token().map_err(|e| e.in_key(&key))?;
            let node = self
                .parse_value(token, value_start)
                .map_err(|e| e.in_key(&key))?;
            self.check_duplicate(map.contains_key(&key), &key, start)?;
            map.insert(key, node);
            match self.entry_separator(&end)? {
                None => return Ok(map),
                Some(at) => separator_at = Some(at),
            }
        }
    }

    /// Read the token after an item: `;` or `end`. Returns `true` at `end`.
    fn item_separator(&mut self, end: &Token) -> Result<bool> {
        Ok(self.entry_separator(end)?.is_none())
    }

    /// Like `item_separator`, but returns the offset of the `;`.
    fn entry_separator(&mut self, end: &Token) -> Result<Option<u64>> {
        let (token, at) = self.lexer.next_token()?;
        if token == *end {
            return Ok(None);
        }
        if token == Token::ItemSeparator {
            return Ok(Some(at));
        }
        let expected = match end {
            Token::EndOfStream => "\";\"".to_string(),
            other => format!("\";\" or {}", other.describe()),
        };
        Err(self.unexpected(token, at, &expected))
    }

    /// Keys must be strings. A bad key right after a `;` is reported at that
    /// separator, which is where the entry that never came was promised.
    fn parse_key(&self, token: Token, start: u64, separator_at: Option<u64>) -> Result<Key> {
        match token {
            Token::String(bytes) => Ok(Key::from_decoded(bytes, self.options.encoding)),
            Token::EndOfStream => Err(self.lexer.error_at(Error::eof(), start)),
            other => Err(self.lexer.error_at(
                Error::malformed_token(format!(
                    "expected a string key, found {}",
                    other.describe()
                )),
                separator_at.unwrap_or(start),
            )),
        }
    }

    fn key_value_separator(&mut self) -> Result<()> {
        let (token, at) = self.lexer.next_token()?;
        if token != Token::KeyValueSeparator {
            return Err(self.unexpected(token, at, "\"=\""));
        }
        Ok(())
    }

    fn check_duplicate(&self, present: bool, key: &Key, at: u64) -> Result<()> {
        if present && self.options.duplicate_keys == DuplicateKeys::Reject {
            return Err(self.lexer.error_at(
                Error::DuplicateKey {
                    key: key.to_string(),
                    location: None,
                },
                at,
            ));
        }
        Ok(())
    }

    /// Validate a value without building it.
    fn skip_value(&mut self, token: Token, start: u64) -> Result<()> {
        let (token, start) = if token == Token::BeginAttributes {
            self.enter(start)?;
            self.skip_map_entries(Token::EndAttributes)?;
            self.leave();
            self.lexer.next_token()?
        } else {
            (token, start)
        };
        match token {
            Token::BeginList => {
                self.enter(start)?;
                self.skip_list_items(Token::EndList)?;
                self.leave();
                Ok(())
            }
            Token::BeginMap => {
                self.enter(start)?;
                self.skip_map_entries(Token::EndMap)?;
                self.leave();
                Ok(())
            }
            Token::Entity
            | Token::String(_)
            | Token::Int64(_)
            | Token::Uint64(_)
            | Token::Double(_)
            | Token::Boolean(_) => Ok(()),
            other => Err(self.unexpected(other, start, "a value")),
        }
    }

    fn skip_list_items(&mut self, end: Token) -> Result<()> {
        let mut index = 0;
        loop {
            let (token, start) = self.lexer.next_token().map_err(|e| e.in_index(index))?;
            if token == end {
                return Ok(());
            }
            self.skip_value(token, start)
                .map_err(|e| e.in_index(index))?;
            index += 1;
            if self.item_separator(&end)? {
                return Ok(());
            }
        }
    }

    fn skip_map_entries(&mut self, end: Token) -> Result<()> {
        let mut separator_at = None;
        loop {
            let (token, start) = self.lexer.next_token()?;
            if token == end {
                return Ok(());
            }
            let key = self.parse_key(token, start, separator_at)?;
            self.key_value_separator()?;
            let (token, value_start) = self.lexer.next_token().map_err(|e| e.in_key(&key))?;
            self.skip_value(token, value_start)
                .map_err(|e| e.in_key(&key))?;
            match self.entry_separator(&end)? {
                None => return Ok(()),
                Some(at) => separator_at = Some(at),
            }
        }
    }

    /// Lazy counterpart of `parse_value`: containers keep their children as
    /// spans, scalars are decoded on the spot.
    fn parse_lazy_value(&mut self, token: Token, start: u64) -> Result<Node> {
        let (attributes, token, start) = if token == Token::BeginAttributes {
            self.enter(start)?;
            self.skip_map_entries(Token::EndAttributes)?;
            self.leave();
            let span = self.span(start, self.lexer.position())?;
            let (token, start) = self.lexer.next_token()?;
            (Some(span), token, start)
        } else {
            (None, token, start)
        };
        match token {
            Token::BeginList => {
                self.enter(start)?;
                let items = self.lazy_list_items(Token::EndList)?;
                self.leave();
                Ok(Node::new(LazyList::from_spans(items, attributes, self.options)))
            }
            Token::BeginMap => {
                self.enter(start)?;
                let entries = self.lazy_map_entries(Token::EndMap)?;
                self.leave();
                Ok(Node::new(LazyMap::from_spans(entries, attributes, self.options)))
            }
            other => {
                let value = self.scalar(other, start)?;
                let attributes = attributes
                    .map(|span| decode_attributes(&span, &self.options))
                    .transpose()?;
                Ok(self.finish(value, attributes))
            }
        }
    }

    fn lazy_list_items(&mut self, end: Token) -> Result<Vec<Span>> {
        let mut spans = Vec::new();
        loop {
            let index = spans.len();
            let (token, start) = self.lexer.next_token().map_err(|e| e.in_index(index))?;
            if token == end {
                break;
            }
            self.skip_value(token, start)
                .map_err(|e| e.in_index(index))?;
            spans.push(self.span(start, self.lexer.position())?);
            if self.item_separator(&end)? {
                break;
            }
        }
        trace!("parser: lazy list with {} items", spans.len());
        Ok(spans)
    }

    fn lazy_map_entries(&mut self, end: Token) -> Result<IndexMap<Key, Span>> {
        let mut entries = IndexMap::new();
        let mut separator_at = None;
        loop {
            let (token, start) = self.lexer.next_token()?;
            if token == end {
                break;
            }
            let key = self.parse_key(token, start, separator_at)?;
            self.key_value_separator()?;
            let (token, value_start) = self.lexer.next_token().map_err(|e| e.in_key(&key))?;
            self.skip_value(token, value_start)
                .map_err(|e| e.in_key(&key))?;
            let span = self.span(value_start, self.lexer.position())?;
            self.check_duplicate(entries.contains_key(&key), &key, start)?;
            entries.insert(key, span);
            match self.entry_separator(&end)? {
                None => break,
                Some(at) => separator_at = Some(at),
            }
        }
        trace!("parser: lazy map with {} entries", entries.len());
        Ok(entries)
    }

    /// Validate the next top-level fragment item and return its bytes,
    /// including the `;` after it when there is one.
    fn capture_item(&mut self, kind: YsonType, index: usize) -> Result<Option<CapturedItem>> {
        if self.lexer.at_end()? {
            return Ok(None);
        }
        let start = self.lexer.position();
        self.lexer.scanner_mut().begin_capture();
        let (token, token_start) = self.lexer.next_token().map_err(|e| {
            if kind == YsonType::MapFragment {
                e
            } else {
                e.in_index(index)
            }
        })?;
        if kind == YsonType::MapFragment {
            let key = self.parse_key(token, token_start, None)?;
            self.key_value_separator()?;
            let (token, value_start) = self.lexer.next_token().map_err(|e| e.in_key(&key))?;
            self.skip_value(token, value_start)
                .map_err(|e| e.in_key(&key))?;
        } else {
            self.skip_value(token, token_start)
                .map_err(|e| e.in_index(index))?;
        }
        let value_len = (self.lexer.position() - start) as usize;
        let ended = self.item_separator(&Token::EndOfStream)?;
        let mut bytes = self.lexer.scanner_mut().end_capture();
        if ended {
            bytes.truncate(value_len);
        }
        Ok(Some(CapturedItem {
            start,
            bytes,
            value_len,
        }))
    }
}

/// Decode a single value from a retained span.
pub(crate) fn decode_span(span: &Span, options: &LoadOptions) -> Result<Node> {
    let options = LoadOptions {
        yson_type: YsonType::Node,
        ..*options
    };
    Parser::over_span(span, options).parse_single()
}

/// Decode an attribute block `<...>` from a retained span.
pub(crate) fn decode_attributes(span: &Span, options: &LoadOptions) -> Result<Attributes> {
    let options = LoadOptions {
        lazy: false,
        ..*options
    };
    let mut parser = Parser::over_span(span, options);
    let (token, start) = parser.lexer.next_token()?;
    if token != Token::BeginAttributes {
        return Err(parser.unexpected(token, start, "\"<\""));
    }
    parser.parse_attributes(start)
}

/// Iterator over the items of a list fragment read from a stream.
///
/// Items are parsed one at a time, so memory use is bounded by the largest
/// item rather than by the stream. Iteration stops after the first error.
pub struct Items<'a> {
    parser: Parser<'a>,
    index: usize,
    done: bool,
}

impl<'a> Items<'a> {
    pub(crate) fn new(scanner: Scanner<'a>, options: LoadOptions) -> Self {
        Items {
            parser: Parser::new(scanner, options),
            index: 0,
            done: false,
        }
    }

    fn next_item(&mut self) -> Result<Option<Node>> {
        let options = self.parser.options;
        if options.raw || options.lazy {
            let Some(item) = self.parser.capture_item(YsonType::ListFragment, self.index)? else {
                return Ok(None);
            };
            if options.raw {
                return Ok(Some(Node::new(Value::Bytes(ByteString::from(item.bytes)))));
            }
            let mut bytes = item.bytes;
            bytes.truncate(item.value_len);
            let span = Span::new(Rc::from(bytes), item.start);
            return decode_span(&span, &options).map(Some);
        }

        let index = self.index;
        let (token, start) = self
            .parser
            .lexer
            .next_token()
            .map_err(|e| e.in_index(index))?;
        if token == Token::EndOfStream {
            return Ok(None);
        }
        let node = self
            .parser
            .parse_value(token, start)
            .map_err(|e| e.in_index(index))?;
        self.parser.item_separator(&Token::EndOfStream)?;
        Ok(Some(node))
    }
}

impl Iterator for Items<'_> {
    type Item = Result<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_item() {
            Ok(Some(node)) => {
                self.index += 1;
                Some(Ok(node))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8], options: LoadOptions) -> Result<Node> {
        Parser::new(Scanner::from_slice(input), options).parse_document()
    }

    #[test]
    fn test_nested_document() {
        let node = parse(b"<a=1>{b=[x;2u;%false];c=#}", LoadOptions::default()).unwrap();
        let attributes = node.attributes.as_ref().unwrap();
        assert_eq!(attributes.get("a").unwrap().value, Value::Int64(1));
        let map = node.value.as_map().unwrap();
        let list = map.get("b").unwrap().value.as_list().unwrap();
        assert_eq!(list[0].value, Value::from("x"));
        assert_eq!(list[1].value, Value::Uint64(2));
        assert_eq!(list[2].value, Value::Boolean(false));
        assert!(map.get("c").unwrap().value.is_entity());
    }

    #[test]
    fn test_always_create_attributes() {
        let node = parse(b"[1]", LoadOptions::default()).unwrap();
        assert_eq!(node.attributes, Some(Map::new()));
        let list = node.value.as_list().unwrap();
        assert_eq!(list[0].attributes, Some(Map::new()));

        let options = LoadOptions::default().always_create_attributes(false);
        let node = parse(b"[1;<a=b>2]", options).unwrap();
        assert!(node.attributes.is_none());
        let list = node.value.as_list().unwrap();
        assert!(list[0].attributes.is_none());
        assert!(list[1].has_attributes());
    }

    #[test]
    fn test_trailing_data() {
        let err = parse(b"{a=b}{c=d}", LoadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::TrailingData { .. }));
        assert_eq!(err.location().map(|l| l.offset), Some(5));
    }

    #[test]
    fn test_empty_node_is_eof() {
        let err = parse(b"  ", LoadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof { .. }));
    }

    #[test]
    fn test_error_path() {
        let err = parse(b"{a=[1;{b=%bad}]}", LoadOptions::default()).unwrap_err();
        assert_eq!(err.location().unwrap().path_string(), "/a/1/b");
    }

    #[test]
    fn test_error_path_includes_failing_token() {
        let path = |input: &[u8], options: LoadOptions| {
            parse(input, options).unwrap_err().location().unwrap().path_string()
        };
        assert_eq!(path(b"{a=%bad}", LoadOptions::default()), "/a");
        assert_eq!(path(b"{a=[1;%nope]}", LoadOptions::default()), "/a/1");
        assert_eq!(path(b"{a=[\x01", LoadOptions::default()), "/a/0");
        assert_eq!(path(b"{a=[1;%nope]}", LoadOptions::default().lazy(true)), "/a/1");
        assert_eq!(path(b"{a=<b=%x>1}", LoadOptions::default().lazy(true)), "/a/b");

        let raw = LoadOptions::default()
            .yson_type(YsonType::ListFragment)
            .raw(true);
        assert_eq!(path(b"1;%x", raw), "/1");
        let raw = LoadOptions::default().yson_type(YsonType::MapFragment).raw(true);
        assert_eq!(path(b"a=1;b=%x", raw), "/b");
    }

    #[test]
    fn test_duplicate_keys() {
        let node = parse(b"{a=1;a=2}", LoadOptions::default()).unwrap();
        let map = node.value.as_map().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a").unwrap().value, Value::Int64(2));

        let options = LoadOptions::default().duplicate_keys(DuplicateKeys::Reject);
        let err = parse(b"{a=1;a=2}", options).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));
        assert_eq!(err.location().map(|l| l.offset), Some(5));
    }

    #[test]
    fn test_nesting_limit_counts_attributes() {
        let options = LoadOptions::default().nesting_limit(2);
        assert!(parse(b"[[1]]", options).is_ok());
        assert!(matches!(
            parse(b"[[[1]]]", options),
            Err(Error::NestingTooDeep { limit: 2, .. })
        ));
        assert!(matches!(
            parse(b"[<a=1>2]", options),
            Ok(_)
        ));
        assert!(matches!(
            parse(b"[<a=[1]>2]", options),
            Err(Error::NestingTooDeep { .. })
        ));
    }

    #[test]
    fn test_raw_map_fragment() {
        let options = LoadOptions::default()
            .yson_type(YsonType::MapFragment)
            .raw(true);
        let node = parse(b"a=1; b={c=d} ;c=\"x;y\"", options).unwrap();
        let items: Vec<&[u8]> = node
            .value
            .as_list()
            .unwrap()
            .iter()
            .map(|n| n.value.as_bytes().unwrap())
            .collect();
        assert_eq!(items, [&b"a=1;"[..], b"b={c=d} ;", b"c=\"x;y\""]);
    }

    #[test]
    fn test_raw_mode_still_validates() {
        let options = LoadOptions::default()
            .yson_type(YsonType::ListFragment)
            .raw(true);
        assert!(matches!(
            parse(b"1;{a=};", options),
            Err(Error::MalformedToken { .. })
        ));
    }
}
