//! Lazy containers
//!
//! A lazy map or list keeps the byte span of every child until that child is
//! first accessed. Decoded children are cached behind shared handles, so a
//! shallow clone sees the children its original had already materialized
//! (and vice versa) while spans nobody touched are decoded independently by
//! each copy. `deep_copy` shares nothing but the immutable input buffer.

use crate::error::{Error, Result};
use crate::map::{Key, Map};
use crate::options::LoadOptions;
use crate::parser;
use crate::value::{Attributes, Node, Value};
use indexmap::IndexMap;
use log::trace;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A decoded child shared between a lazy container and its shallow clones.
pub type Shared<T> = Rc<RefCell<T>>;

/// A range of a shared input buffer.
#[derive(Clone)]
pub(crate) struct Span {
    buf: Rc<[u8]>,
    /// Absolute offset of `buf[0]` in the original input.
    base: u64,
    start: usize,
    end: usize,
}

impl Span {
    pub(crate) fn new(buf: Rc<[u8]>, base: u64) -> Span {
        let end = buf.len();
        Span {
            buf,
            base,
            start: 0,
            end,
        }
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    /// Absolute offset of the first byte.
    pub(crate) fn offset(&self) -> u64 {
        self.base + self.start as u64
    }

    /// The bytes between two absolute offsets inside this span.
    pub(crate) fn sub(&self, start: u64, end: u64) -> Span {
        Span {
            buf: Rc::clone(&self.buf),
            base: self.base,
            start: (start - self.base) as usize,
            end: (end - self.base) as usize,
        }
    }
}

#[derive(Clone)]
enum Slot<T> {
    Raw(Span),
    Decoded(Shared<T>),
}

impl<T: Clone> Slot<T> {
    fn decoded(value: T) -> Self {
        Slot::Decoded(Rc::new(RefCell::new(value)))
    }

    fn is_decoded(&self) -> bool {
        matches!(self, Slot::Decoded(_))
    }

    /// Decode on first use and cache the result.
    fn get(&mut self, decode: impl FnOnce(&Span) -> Result<T>) -> Result<Shared<T>> {
        let shared = match self {
            Slot::Decoded(shared) => return Ok(Rc::clone(shared)),
            Slot::Raw(span) => {
                trace!(
                    "lazy: materializing {} bytes at offset {}",
                    span.bytes().len(),
                    span.offset()
                );
                Rc::new(RefCell::new(decode(span)?))
            }
        };
        *self = Slot::Decoded(Rc::clone(&shared));
        Ok(shared)
    }

    /// Run `f` on the value, decoding a raw span without caching it.
    fn with<R>(
        &self,
        decode: impl FnOnce(&Span) -> Result<T>,
        f: impl FnOnce(&T) -> Result<R>,
    ) -> Result<R> {
        match self {
            Slot::Decoded(shared) => match shared.try_borrow() {
                Ok(value) => f(&value),
                Err(_) => Err(Error::configuration(
                    "lazy child is mutably borrowed while being read",
                )),
            },
            Slot::Raw(span) => f(&decode(span)?),
        }
    }

    fn into_inner(self, decode: impl FnOnce(&Span) -> Result<T>) -> Result<T> {
        match self {
            Slot::Raw(span) => decode(&span),
            Slot::Decoded(shared) => Ok(Rc::try_unwrap(shared)
                .map(RefCell::into_inner)
                .unwrap_or_else(|shared| shared.borrow().clone())),
        }
    }

    fn deep_copy(&self, copy: impl FnOnce(&T) -> T) -> Self {
        match self {
            Slot::Raw(span) => Slot::Raw(span.clone()),
            Slot::Decoded(shared) => Slot::decoded(copy(&shared.borrow())),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Raw(span) => write!(f, "<unparsed {} bytes>", span.bytes().len()),
            Slot::Decoded(shared) => match shared.try_borrow() {
                Ok(value) => fmt::Debug::fmt(&*value, f),
                Err(_) => f.write_str("<borrowed>"),
            },
        }
    }
}

fn decode_node(options: &LoadOptions) -> impl Fn(&Span) -> Result<Node> + '_ {
    move |span: &Span| parser::decode_span(span, options)
}

fn decode_attributes(options: &LoadOptions) -> impl Fn(&Span) -> Result<Attributes> + '_ {
    move |span: &Span| parser::decode_attributes(span, options)
}

fn finish_attributes(attributes: Option<Attributes>, options: &LoadOptions) -> Option<Attributes> {
    match attributes {
        Some(attributes) => Some(attributes),
        None if options.always_create_attributes => Some(Map::new()),
        None => None,
    }
}

/// A map whose values decode on first access.
#[derive(Clone)]
pub struct LazyMap {
    entries: IndexMap<Key, Slot<Node>>,
    attributes: Option<Slot<Attributes>>,
    options: LoadOptions,
}

impl LazyMap {
    pub(crate) fn from_spans(
        entries: IndexMap<Key, Span>,
        attributes: Option<Span>,
        options: LoadOptions,
    ) -> Self {
        LazyMap {
            entries: entries
                .into_iter()
                .map(|(key, span)| (key, Slot::Raw(span)))
                .collect(),
            attributes: attributes.map(Slot::Raw),
            options,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key<K: AsRef<[u8]>>(&self, key: K) -> bool {
        self.entries.contains_key(key.as_ref())
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.keys()
    }

    /// The value under `key`, decoding it on first access.
    pub fn get<K: AsRef<[u8]>>(&mut self, key: K) -> Result<Option<Shared<Node>>> {
        let options = self.options;
        match self.entries.get_mut(key.as_ref()) {
            Some(slot) => slot.get(decode_node(&options)).map(Some),
            None => Ok(None),
        }
    }

    /// The value under `key`, inserting `default()` first if it is missing.
    pub fn get_or_insert_with(
        &mut self,
        key: impl Into<Key>,
        default: impl FnOnce() -> Node,
    ) -> Result<Shared<Node>> {
        let options = self.options;
        self.entries
            .entry(key.into())
            .or_insert_with(|| Slot::decoded(default()))
            .get(decode_node(&options))
    }

    /// Insert a value, returning the previous one. An existing key keeps its
    /// position.
    pub fn insert(&mut self, key: impl Into<Key>, node: impl Into<Node>) -> Result<Option<Node>> {
        let options = self.options;
        self.entries
            .insert(key.into(), Slot::decoded(node.into()))
            .map(|old| old.into_inner(decode_node(&options)))
            .transpose()
    }

    /// Remove an entry, preserving the order of the remaining ones.
    pub fn remove<K: AsRef<[u8]>>(&mut self, key: K) -> Result<Option<Node>> {
        let options = self.options;
        self.entries
            .shift_remove(key.as_ref())
            .map(|old| old.into_inner(decode_node(&options)))
            .transpose()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The attributes of this map, decoded on first access and created
    /// empty if the input had none.
    pub fn attributes(&mut self) -> Result<Shared<Attributes>> {
        let options = self.options;
        self.attributes
            .get_or_insert_with(|| Slot::decoded(Map::new()))
            .get(decode_attributes(&options))
    }

    pub fn has_attributes(&self) -> Result<bool> {
        self.visit_attributes(|attributes| Ok(attributes.is_some_and(|a| !a.is_empty())))
    }

    /// Returns `true` if the value under `key` has been decoded.
    pub fn is_materialized<K: AsRef<[u8]>>(&self, key: K) -> bool {
        self.entries
            .get(key.as_ref())
            .is_some_and(Slot::is_decoded)
    }

    /// Decode every value and the attributes.
    pub fn materialize(&mut self) -> Result<()> {
        let options = self.options;
        for slot in self.entries.values_mut() {
            slot.get(decode_node(&options))?;
        }
        if let Some(slot) = &mut self.attributes {
            slot.get(decode_attributes(&options))?;
        }
        Ok(())
    }

    /// Decode everything and iterate over the entries in order.
    pub fn iter(&mut self) -> Result<impl Iterator<Item = (&Key, Shared<Node>)>> {
        self.materialize()?;
        Ok(self.entries.iter().filter_map(|(key, slot)| match slot {
            Slot::Decoded(shared) => Some((key, Rc::clone(shared))),
            Slot::Raw(_) => None,
        }))
    }

    /// An eager copy of this map with its attributes on the returned node.
    /// Nothing is cached in `self`.
    pub fn to_map(&self) -> Result<Node> {
        let decode = decode_node(&self.options);
        let mut map = Map::with_capacity(self.entries.len());
        for (key, slot) in &self.entries {
            map.insert(key.clone(), slot.with(&decode, Node::to_eager)?);
        }
        let attributes = self.visit_attributes(|a| a.map(Map::to_eager).transpose())?;
        Ok(Node {
            value: Value::Map(map),
            attributes: finish_attributes(attributes, &self.options),
        })
    }

    /// A copy that shares no decoded state with `self`.
    pub fn deep_copy(&self) -> LazyMap {
        LazyMap {
            entries: self
                .entries
                .iter()
                .map(|(key, slot)| (key.clone(), slot.deep_copy(Node::deep_copy)))
                .collect(),
            attributes: self
                .attributes
                .as_ref()
                .map(|slot| slot.deep_copy(Map::deep_copy)),
            options: self.options,
        }
    }

    /// Visit every entry in order (or by key bytes when `sorted`), decoding
    /// untouched spans temporarily.
    pub(crate) fn visit_entries(
        &self,
        sorted: bool,
        mut f: impl FnMut(&Key, &Node) -> Result<()>,
    ) -> Result<()> {
        let decode = decode_node(&self.options);
        let mut entries: Vec<_> = self.entries.iter().collect();
        if sorted {
            entries.sort_by(|a, b| a.0.cmp(b.0));
        }
        for (key, slot) in entries {
            slot.with(&decode, |node| f(key, node))?;
        }
        Ok(())
    }

    pub(crate) fn visit_attributes<R>(
        &self,
        f: impl FnOnce(Option<&Attributes>) -> Result<R>,
    ) -> Result<R> {
        match &self.attributes {
            Some(slot) => slot.with(decode_attributes(&self.options), |a| f(Some(a))),
            None => f(None),
        }
    }
}

impl fmt::Debug for LazyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("lazy ")?;
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

/// A list whose items decode on first access.
#[derive(Clone)]
pub struct LazyList {
    items: Vec<Slot<Node>>,
    attributes: Option<Slot<Attributes>>,
    options: LoadOptions,
}

impl LazyList {
    pub(crate) fn from_spans(
        items: Vec<Span>,
        attributes: Option<Span>,
        options: LoadOptions,
    ) -> Self {
        LazyList {
            items: items.into_iter().map(Slot::Raw).collect(),
            attributes: attributes.map(Slot::Raw),
            options,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The item at `index`, decoding it on first access.
    pub fn get(&mut self, index: usize) -> Result<Option<Shared<Node>>> {
        let options = self.options;
        match self.items.get_mut(index) {
            Some(slot) => slot.get(decode_node(&options)).map(Some),
            None => Ok(None),
        }
    }

    pub fn push(&mut self, node: impl Into<Node>) {
        self.items.push(Slot::decoded(node.into()));
    }

    /// Insert an item at `index`, shifting later items.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, node: impl Into<Node>) {
        self.items.insert(index, Slot::decoded(node.into()));
    }

    /// Remove the item at `index`, or return `None` if it is out of bounds.
    pub fn remove(&mut self, index: usize) -> Result<Option<Node>> {
        if index >= self.items.len() {
            return Ok(None);
        }
        let options = self.options;
        self.items
            .remove(index)
            .into_inner(decode_node(&options))
            .map(Some)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// The attributes of this list, decoded on first access and created
    /// empty if the input had none.
    pub fn attributes(&mut self) -> Result<Shared<Attributes>> {
        let options = self.options;
        self.attributes
            .get_or_insert_with(|| Slot::decoded(Map::new()))
            .get(decode_attributes(&options))
    }

    pub fn has_attributes(&self) -> Result<bool> {
        self.visit_attributes(|attributes| Ok(attributes.is_some_and(|a| !a.is_empty())))
    }

    pub fn is_materialized(&self, index: usize) -> bool {
        self.items.get(index).is_some_and(Slot::is_decoded)
    }

    /// Decode every item and the attributes.
    pub fn materialize(&mut self) -> Result<()> {
        let options = self.options;
        for slot in &mut self.items {
            slot.get(decode_node(&options))?;
        }
        if let Some(slot) = &mut self.attributes {
            slot.get(decode_attributes(&options))?;
        }
        Ok(())
    }

    /// Decode everything and iterate over the items in order.
    pub fn iter(&mut self) -> Result<impl Iterator<Item = Shared<Node>> + '_> {
        self.materialize()?;
        Ok(self.items.iter().filter_map(|slot| match slot {
            Slot::Decoded(shared) => Some(Rc::clone(shared)),
            Slot::Raw(_) => None,
        }))
    }

    /// An eager copy of this list with its attributes on the returned node.
    /// Nothing is cached in `self`.
    pub fn to_list(&self) -> Result<Node> {
        let decode = decode_node(&self.options);
        let items = self
            .items
            .iter()
            .map(|slot| slot.with(&decode, Node::to_eager))
            .collect::<Result<Vec<_>>>()?;
        let attributes = self.visit_attributes(|a| a.map(Map::to_eager).transpose())?;
        Ok(Node {
            value: Value::List(items),
            attributes: finish_attributes(attributes, &self.options),
        })
    }

    /// A copy that shares no decoded state with `self`.
    pub fn deep_copy(&self) -> LazyList {
        LazyList {
            items: self
                .items
                .iter()
                .map(|slot| slot.deep_copy(Node::deep_copy))
                .collect(),
            attributes: self
                .attributes
                .as_ref()
                .map(|slot| slot.deep_copy(Map::deep_copy)),
            options: self.options,
        }
    }

    pub(crate) fn visit_items(&self, mut f: impl FnMut(&Node) -> Result<()>) -> Result<()> {
        let decode = decode_node(&self.options);
        for slot in &self.items {
            slot.with(&decode, &mut f)?;
        }
        Ok(())
    }

    pub(crate) fn visit_attributes<R>(
        &self,
        f: impl FnOnce(Option<&Attributes>) -> Result<R>,
    ) -> Result<R> {
        match &self.attributes {
            Some(slot) => slot.with(decode_attributes(&self.options), |a| f(Some(a))),
            None => f(None),
        }
    }
}

impl fmt::Debug for LazyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("lazy ")?;
        f.debug_list().entries(self.items.iter()).finish()
    }
}
