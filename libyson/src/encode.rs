//! Encode YSON nodes.
//!
//! Nodes are written in the binary form, the compact text form, or the
//! indented text form. Output is buffered and handed to the writer in
//! chunks, so encoding a large tree does not hold a second copy of it.

use crate::binary;
use crate::error::{Error, Result};
use crate::lazy::{LazyList, LazyMap};
use crate::map::Key;
use crate::options::{DumpOptions, Encoding, YsonType};
use crate::text;
use crate::value::{Attributes, Node, Value};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// Output format for encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Tagged binary scalars
    Binary,
    /// Compact text
    #[default]
    Text,
    /// Text with one item per line
    Pretty,
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "binary" => Ok(Format::Binary),
            "text" => Ok(Format::Text),
            "pretty" => Ok(Format::Pretty),
            _ => Err(Error::configuration(format!("unknown format \"{s}\""))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Binary => "binary",
            Format::Text => "text",
            Format::Pretty => "pretty",
        })
    }
}

const FLUSH_THRESHOLD: usize = 64 * 1024;

/// Encode `node` to `writer` according to `options`.
pub fn encode<W: Write>(node: &Node, writer: W, options: &DumpOptions) -> Result<()> {
    let mut encoder = Encoder {
        out: Vec::new(),
        writer,
        options,
        depth: 0,
    };
    encoder.write_document(node)?;
    encoder.flush()
}

struct Encoder<'o, W> {
    out: Vec<u8>,
    writer: W,
    options: &'o DumpOptions,
    depth: usize,
}

impl<W: Write> Encoder<'_, W> {
    fn flush(&mut self) -> Result<()> {
        self.writer.write_all(&self.out)?;
        self.out.clear();
        self.writer.flush()?;
        Ok(())
    }

    fn is_binary(&self) -> bool {
        self.options.format == Format::Binary
    }

    fn is_pretty(&self) -> bool {
        self.options.format == Format::Pretty
    }

    // =========================================================================
    // Documents and fragments
    // =========================================================================

    fn write_document(&mut self, node: &Node) -> Result<()> {
        match self.options.yson_type {
            YsonType::Node => self.write_node(node),
            YsonType::ListFragment => {
                self.reject_fragment_attributes(node)?;
                match &node.value {
                    Value::List(items) => {
                        for item in items {
                            self.write_fragment_item(|encoder| encoder.write_node(item))?;
                        }
                        Ok(())
                    }
                    Value::LazyList(list) => list.visit_items(|item| {
                        self.write_fragment_item(|encoder| encoder.write_node(item))
                    }),
                    other => Err(Error::configuration(format!(
                        "a list fragment must be written from a list, not a {}",
                        other.kind()
                    ))),
                }
            }
            YsonType::MapFragment => {
                self.reject_fragment_attributes(node)?;
                let sorted = self.options.sort_keys;
                match &node.value {
                    Value::Map(map) => {
                        let entries: Vec<_> = if sorted {
                            map.sorted_entries()
                        } else {
                            map.iter().collect()
                        };
                        for (key, value) in entries {
                            self.write_fragment_item(|encoder| encoder.write_entry(key, value))?;
                        }
                        Ok(())
                    }
                    Value::LazyMap(map) => map.visit_entries(sorted, |key, value| {
                        self.write_fragment_item(|encoder| encoder.write_entry(key, value))
                    }),
                    other => Err(Error::configuration(format!(
                        "a map fragment must be written from a map, not a {}",
                        other.kind()
                    ))),
                }
            }
        }
    }

    fn reject_fragment_attributes(&self, node: &Node) -> Result<()> {
        let lazy_attributes = match &node.value {
            Value::LazyList(list) => list.has_attributes()?,
            Value::LazyMap(map) => map.has_attributes()?,
            _ => false,
        };
        if node.has_attributes() || lazy_attributes {
            return Err(Error::configuration(
                "a fragment has no enclosing node to carry attributes",
            ));
        }
        Ok(())
    }

    fn write_fragment_item(&mut self, write: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        write(self)?;
        self.out.push(b';');
        if !self.is_binary() {
            self.out.push(b'\n');
        }
        self.maybe_flush()
    }

    // =========================================================================
    // Layout
    // =========================================================================

    fn maybe_flush(&mut self) -> Result<()> {
        if self.out.len() >= FLUSH_THRESHOLD {
            self.writer.write_all(&self.out)?;
            self.out.clear();
        }
        Ok(())
    }

    fn newline(&mut self) {
        if self.is_pretty() {
            self.out.push(b'\n');
            let width = self.options.indent * self.depth;
            self.out.resize(self.out.len() + width, b' ');
        }
    }

    fn open(&mut self, bracket: u8) {
        self.out.push(bracket);
        self.depth += 1;
    }

    fn close(&mut self, bracket: u8, count: usize) {
        self.depth -= 1;
        if count > 0 {
            self.newline();
        }
        self.out.push(bracket);
    }

    fn before_item(&mut self) -> Result<()> {
        self.maybe_flush()?;
        self.newline();
        Ok(())
    }

    fn after_item(&mut self) {
        self.out.push(b';');
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    fn write_node(&mut self, node: &Node) -> Result<()> {
        let own = node.attributes.as_ref();
        match &node.value {
            Value::LazyList(list) => list.visit_attributes(|lazy| self.write_attributes(lazy, own))?,
            Value::LazyMap(map) => map.visit_attributes(|lazy| self.write_attributes(lazy, own))?,
            _ => self.write_attributes(None, own)?,
        }
        self.write_value(&node.value)
    }

    /// Write the attribute block of a node. Lazy containers carry their own
    /// attributes; when the node has some too, the node's entries win.
    fn write_attributes(
        &mut self,
        lazy: Option<&Attributes>,
        own: Option<&Attributes>,
    ) -> Result<()> {
        let lazy = lazy.filter(|a| !a.is_empty());
        let own = own.filter(|a| !a.is_empty());
        match (lazy, own) {
            (None, None) => Ok(()),
            (Some(attributes), None) | (None, Some(attributes)) => {
                self.write_attribute_block(attributes)
            }
            (Some(lazy), Some(own)) => {
                let mut merged = lazy.clone();
                for (key, node) in own {
                    merged.insert(key.clone(), node.clone());
                }
                self.write_attribute_block(&merged)
            }
        }
    }

    fn write_attribute_block(&mut self, attributes: &Attributes) -> Result<()> {
        self.open(b'<');
        let entries: Vec<_> = if self.options.sort_keys {
            attributes.sorted_entries()
        } else {
            attributes.iter().collect()
        };
        for (key, node) in &entries {
            self.before_item()?;
            self.write_entry(key, node)?;
            self.after_item();
        }
        self.close(b'>', entries.len());
        if self.is_pretty() {
            self.out.push(b' ');
        }
        Ok(())
    }

    fn write_entry(&mut self, key: &Key, node: &Node) -> Result<()> {
        match key {
            Key::Text(s) => self.write_string(s.as_bytes(), true)?,
            Key::Bytes(b) => self.write_string(b.as_bytes(), false)?,
        }
        if self.is_pretty() {
            self.out.extend_from_slice(b" = ");
        } else {
            self.out.push(b'=');
        }
        self.write_node(node)
    }

    fn write_value(&mut self, value: &Value) -> Result<()> {
        let binary = self.is_binary();
        match value {
            Value::Entity => self.out.push(b'#'),
            Value::Boolean(b) if binary => binary::write_boolean(&mut self.out, *b),
            Value::Boolean(b) => text::write_boolean(&mut self.out, *b),
            Value::Int64(n) if binary => binary::write_int64(&mut self.out, *n),
            Value::Int64(n) => text::write_int64(&mut self.out, *n),
            Value::Uint64(n) if binary => binary::write_uint64(&mut self.out, *n),
            Value::Uint64(n) => text::write_uint64(&mut self.out, *n),
            Value::Double(x) if binary => binary::write_double(&mut self.out, *x),
            Value::Double(x) => text::write_double(&mut self.out, *x),
            Value::String(s) => self.write_string(s.as_bytes(), true)?,
            Value::Bytes(b) => self.write_string(b.as_bytes(), false)?,
            Value::List(items) => {
                self.open(b'[');
                for item in items {
                    self.before_item()?;
                    self.write_node(item)?;
                    self.after_item();
                }
                self.close(b']', items.len());
            }
            Value::Map(map) => {
                self.open(b'{');
                let entries: Vec<_> = if self.options.sort_keys {
                    map.sorted_entries()
                } else {
                    map.iter().collect()
                };
                for (key, node) in &entries {
                    self.before_item()?;
                    self.write_entry(key, node)?;
                    self.after_item();
                }
                self.close(b'}', entries.len());
            }
            Value::LazyList(list) => self.write_lazy_list(list)?,
            Value::LazyMap(map) => self.write_lazy_map(map)?,
        }
        Ok(())
    }

    fn write_lazy_list(&mut self, list: &LazyList) -> Result<()> {
        self.open(b'[');
        list.visit_items(|item| {
            self.before_item()?;
            self.write_node(item)?;
            self.after_item();
            Ok(())
        })?;
        self.close(b']', list.len());
        Ok(())
    }

    fn write_lazy_map(&mut self, map: &LazyMap) -> Result<()> {
        self.open(b'{');
        map.visit_entries(self.options.sort_keys, |key, node| {
            self.before_item()?;
            self.write_entry(key, node)?;
            self.after_item();
            Ok(())
        })?;
        self.close(b'}', map.len());
        Ok(())
    }

    /// `is_text` marks bytes already known to be UTF-8.
    fn write_string(&mut self, bytes: &[u8], is_text: bool) -> Result<()> {
        let unicode = is_text || std::str::from_utf8(bytes).is_ok();
        if !unicode && self.options.encoding == Encoding::Utf8 {
            return Err(Error::not_unicode(bytes));
        }
        if self.is_binary() {
            binary::write_string(&mut self.out, bytes)
        } else {
            text::write_string(&mut self.out, bytes, !unicode);
            Ok(())
        }
    }
}
