//! YSON codec.
//!
//! YSON is a JSON-like format with attributes, a `#` entity value, distinct
//! signed and unsigned integers, and a compact binary form for scalars.
//!
//! # Decoding Pipeline
//!
//! 1. **Scanner**: Reads the input in blocks, tracks absolute offsets, and
//!    keeps enough of the previous block to quote context in errors.
//!
//! 2. **Lexer**: Turns bytes into tokens. Structural bytes are shared by both
//!    grammars; scalars are decoded as binary or text depending on their
//!    first byte.
//!
//! 3. **Parser**: Builds a [`Node`] tree for a single node, a list fragment,
//!    or a map fragment. In lazy mode containers keep the byte spans of their
//!    children and decode each one on first access.
//!
//! Encoding walks a tree and writes binary, compact text, or indented text.

mod binary;
mod encode;
mod error;
mod lazy;
mod lexer;
mod map;
mod options;
mod parser;
mod scanner;
mod text;
mod value;

pub use encode::Format;
pub use error::{Error, Location, PathSegment, Result};
pub use lazy::{LazyList, LazyMap, Shared};
pub use map::{Key, Map};
pub use options::{
    DumpOptions, DuplicateKeys, Encoding, LoadOptions, YsonType, DEFAULT_NESTING_LIMIT,
};
pub use parser::Items;
pub use scanner::BLOCK_SIZE;
pub use value::{Attributes, ByteString, Node, Value};

use lazy::Span;
use log::debug;
use parser::Parser;
use scanner::Scanner;
use std::io::{Read, Write};
use std::rc::Rc;

/// Decode a YSON document from bytes.
///
/// # Example
///
/// ```
/// use libyson::{loads, LoadOptions};
///
/// let node = loads(b"<id=7>{name=demo;tags=[a;b]}", &LoadOptions::default()).unwrap();
/// let map = node.value.as_map().unwrap();
/// assert_eq!(map.get("name").and_then(|n| n.value.as_str()), Some("demo"));
/// ```
pub fn loads(input: &[u8], options: &LoadOptions) -> Result<Node> {
    options.validate()?;
    debug!(
        "loads: {} bytes as {} (raw={}, lazy={})",
        input.len(),
        options.yson_type,
        options.raw,
        options.lazy
    );
    if options.lazy {
        let span = Span::new(Rc::from(input), 0);
        return Parser::over_span(&span, *options).parse_document();
    }
    Parser::new(Scanner::from_slice(input), *options).parse_document()
}

/// Decode a YSON document from a reader.
///
/// The reader is consumed in blocks of [`BLOCK_SIZE`] bytes. Lazy decoding
/// needs the whole input retained, so in that mode the reader is drained
/// first.
pub fn load<R: Read>(mut reader: R, options: &LoadOptions) -> Result<Node> {
    options.validate()?;
    debug!(
        "load: stream as {} (raw={}, lazy={})",
        options.yson_type, options.raw, options.lazy
    );
    if options.lazy {
        let mut input = Vec::new();
        reader.read_to_end(&mut input)?;
        let span = Span::new(Rc::from(input), 0);
        return Parser::over_span(&span, *options).parse_document();
    }
    Parser::new(Scanner::from_reader(reader), *options).parse_document()
}

/// Stream the items of a list fragment one at a time.
pub fn items<'a, R: Read + 'a>(reader: R, options: &LoadOptions) -> Result<Items<'a>> {
    options.validate()?;
    if options.yson_type != YsonType::ListFragment {
        return Err(Error::configuration(format!(
            "streaming needs a list fragment, not {}",
            options.yson_type
        )));
    }
    Ok(Items::new(Scanner::from_reader(reader), *options))
}

/// Encode a node to bytes.
///
/// # Example
///
/// ```
/// use libyson::{dumps, DumpOptions, Format, Map, Node};
///
/// let map: Map = [("a", 1i64)].into_iter().collect();
/// let text = dumps(&Node::new(map), &DumpOptions::default()).unwrap();
/// assert_eq!(text, b"{a=1;}");
///
/// let binary = dumps(&Node::from(1i64), &DumpOptions::default().format(Format::Binary)).unwrap();
/// assert_eq!(binary, b"\x02\x02");
/// ```
pub fn dumps(node: &Node, options: &DumpOptions) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode::encode(node, &mut out, options)?;
    Ok(out)
}

/// Encode a node to a writer.
pub fn dump<W: Write>(node: &Node, writer: W, options: &DumpOptions) -> Result<()> {
    debug!("dump: {} {}", options.format, options.yson_type);
    encode::encode(node, writer, options)
}
