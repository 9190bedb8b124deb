//! YSON value representation.

use crate::error::{Error, Result};
use crate::lazy::{LazyList, LazyMap};
use crate::map::{Key, Map};
use crate::options::Encoding;
use std::borrow::Cow;
use std::fmt;

/// Attributes annotate a node with a side map of keys to nodes.
pub type Attributes = Map;

/// An opaque byte string.
///
/// Produced for strings that are not valid UTF-8 (or for every string when
/// decoding with `Encoding::None`). It never converts to text silently.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ByteString(Vec<u8>);

impl ByteString {
    pub fn new(bytes: Vec<u8>) -> Self {
        ByteString(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if the bytes are valid UTF-8.
    pub fn is_unicode(&self) -> bool {
        std::str::from_utf8(&self.0).is_ok()
    }

    /// The bytes as text; fails with `NotUnicode` if they are not UTF-8.
    pub fn to_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.0).map_err(|_| Error::not_unicode(&self.0))
    }

    /// The character at `index`, counting characters rather than bytes.
    pub fn char_at(&self, index: usize) -> Result<Option<char>> {
        Ok(self.to_str()?.chars().nth(index))
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(bytes: Vec<u8>) -> Self {
        ByteString(bytes)
    }
}

impl From<&[u8]> for ByteString {
    fn from(bytes: &[u8]) -> Self {
        ByteString(bytes.to_vec())
    }
}

impl fmt::Debug for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b\"{}\"", self.0.escape_ascii())
    }
}

/// A YSON value.
#[derive(Clone)]
pub enum Value {
    /// The null-like entity `#`.
    Entity,
    Boolean(bool),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    /// A string that decoded as UTF-8.
    String(String),
    /// A string kept as raw bytes.
    Bytes(ByteString),
    List(Vec<Node>),
    Map(Map),
    /// A list whose items decode on first access.
    LazyList(LazyList),
    /// A map whose values decode on first access.
    LazyMap(LazyMap),
}

impl Value {
    /// Build a string value from decoded bytes according to `encoding`.
    pub(crate) fn from_decoded(bytes: Vec<u8>, encoding: Encoding) -> Value {
        match encoding {
            Encoding::Utf8 => match String::from_utf8(bytes) {
                Ok(s) => Value::String(s),
                Err(e) => Value::Bytes(ByteString(e.into_bytes())),
            },
            Encoding::None => Value::Bytes(ByteString(bytes)),
        }
    }

    /// A short name for the kind of value, for messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Entity => "entity",
            Value::Boolean(_) => "boolean",
            Value::Int64(_) => "int64",
            Value::Uint64(_) => "uint64",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) | Value::LazyList(_) => "list",
            Value::Map(_) | Value::LazyMap(_) => "map",
        }
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, Value::Entity)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the text if this is a `String`. Byte strings are not text;
    /// use `as_byte_string` and `ByteString::to_str` for those.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the bytes of either kind of string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s.as_bytes()),
            Value::Bytes(b) => Some(b.as_bytes()),
            _ => None,
        }
    }

    pub fn as_byte_string(&self) -> Option<&ByteString> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Node>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_lazy_list(&self) -> Option<&LazyList> {
        match self {
            Value::LazyList(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_lazy_list_mut(&mut self) -> Option<&mut LazyList> {
        match self {
            Value::LazyList(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_lazy_map(&self) -> Option<&LazyMap> {
        match self {
            Value::LazyMap(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_lazy_map_mut(&mut self) -> Option<&mut LazyMap> {
        match self {
            Value::LazyMap(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Value::LazyList(_) | Value::LazyMap(_))
    }

    /// A copy that shares nothing with `self`.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::List(items) => Value::List(items.iter().map(Node::deep_copy).collect()),
            Value::Map(map) => Value::Map(map.deep_copy()),
            Value::LazyList(list) => Value::LazyList(list.deep_copy()),
            Value::LazyMap(map) => Value::LazyMap(map.deep_copy()),
            other => other.clone(),
        }
    }

    /// The same value with eager containers standing in for lazy ones.
    /// Returns `None` when a retained span fails to decode.
    fn eager_view(&self) -> Option<Cow<'_, Value>> {
        match self {
            Value::LazyList(list) => list.to_list().ok().map(|n| Cow::Owned(n.value)),
            Value::LazyMap(map) => map.to_map().ok().map(|n| Cow::Owned(n.value)),
            other => Some(Cow::Borrowed(other)),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Entity, Value::Entity) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Uint64(a), Value::Uint64(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (a, b) if a.is_lazy() || b.is_lazy() => match (a.eager_view(), b.eager_view()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Entity => write!(f, "#"),
            Value::Boolean(b) => write!(f, "%{b}"),
            Value::Int64(n) => write!(f, "{n}"),
            Value::Uint64(n) => write!(f, "{n}u"),
            Value::Double(x) if x.is_nan() => write!(f, "%nan"),
            Value::Double(x) if x.is_infinite() => {
                write!(f, "{}", if *x > 0.0 { "%inf" } else { "%-inf" })
            }
            Value::Double(x) => write!(f, "{x:?}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "{b:?}"),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Map(map) => write!(f, "{map:?}"),
            Value::LazyList(list) => write!(f, "{list:?}"),
            Value::LazyMap(map) => write!(f, "{map:?}"),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => |$v:ident| $body:expr),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $body
                }
            }

            impl From<$ty> for Node {
                fn from(v: $ty) -> Self {
                    Node::new(Value::from(v))
                }
            }
        )*
    };
}

impl_from! {
    bool => |b| Value::Boolean(b),
    i64 => |n| Value::Int64(n),
    i32 => |n| Value::Int64(n.into()),
    u64 => |n| Value::Uint64(n),
    f64 => |x| Value::Double(x),
    &str => |s| Value::String(s.to_owned()),
    String => |s| Value::String(s),
    ByteString => |b| Value::Bytes(b),
    Vec<Node> => |items| Value::List(items),
    Map => |map| Value::Map(map),
    LazyList => |list| Value::LazyList(list),
    LazyMap => |map| Value::LazyMap(map),
}

/// A value together with its attributes.
///
/// Equality compares values only; see [`Node::eq_with_attributes`].
/// Attributes of a lazy container live on the container itself
/// (`LazyMap::attributes`), not in `Node::attributes`.
#[derive(Clone)]
pub struct Node {
    pub value: Value,
    pub attributes: Option<Attributes>,
}

impl Node {
    pub fn new(value: impl Into<Value>) -> Self {
        Node {
            value: value.into(),
            attributes: None,
        }
    }

    pub fn entity() -> Self {
        Node::new(Value::Entity)
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Returns `true` if the node carries at least one attribute.
    pub fn has_attributes(&self) -> bool {
        self.attributes.as_ref().is_some_and(|a| !a.is_empty())
    }

    /// The attribute map, created empty if absent.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        self.attributes.get_or_insert_with(Map::new)
    }

    /// Compare values and attributes. A missing attribute map equals an
    /// empty one.
    pub fn eq_with_attributes(&self, other: &Node) -> bool {
        if self.value != other.value {
            return false;
        }
        let empty = Map::new();
        let mine = self.attributes.as_ref().unwrap_or(&empty);
        let theirs = other.attributes.as_ref().unwrap_or(&empty);
        mine.len() == theirs.len()
            && mine.iter().all(|(key, node)| {
                theirs
                    .get(key)
                    .is_some_and(|other| node.eq_with_attributes(other))
            })
    }

    /// A copy that shares nothing with `self`, attributes included.
    pub fn deep_copy(&self) -> Node {
        Node {
            value: self.value.deep_copy(),
            attributes: self.attributes.as_ref().map(Map::deep_copy),
        }
    }

    /// A fully decoded copy of this node. Lazy containers become eager ones
    /// and their attributes move onto the returned node.
    pub fn to_eager(&self) -> Result<Node> {
        let mut node = match &self.value {
            Value::LazyList(list) => list.to_list()?,
            Value::LazyMap(map) => map.to_map()?,
            Value::List(items) => Node::new(Value::List(
                items.iter().map(Node::to_eager).collect::<Result<_>>()?,
            )),
            Value::Map(map) => Node::new(Value::Map(map.to_eager()?)),
            other => Node::new(other.clone()),
        };
        if let Some(attributes) = self.attributes.as_ref().filter(|a| !a.is_empty()) {
            let target = node.attributes_mut();
            for (key, value) in attributes.to_eager()? {
                target.insert(key, value);
            }
        } else if node.attributes.is_none() {
            node.attributes = self.attributes.clone();
        }
        Ok(node)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::new(value)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(attributes) = self.attributes.as_ref().filter(|a| !a.is_empty()) {
            write!(f, "<{attributes:?}>")?;
        }
        write!(f, "{:?}", self.value)
    }
}

impl From<&Key> for Value {
    fn from(key: &Key) -> Self {
        match key {
            Key::Text(s) => Value::String(s.clone()),
            Key::Bytes(b) => Value::Bytes(b.clone()),
        }
    }
}

impl Key {
    /// Build a key from decoded bytes according to `encoding`.
    pub(crate) fn from_decoded(bytes: Vec<u8>, encoding: Encoding) -> Key {
        match encoding {
            Encoding::Utf8 => match String::from_utf8(bytes) {
                Ok(s) => Key::Text(s),
                Err(e) => Key::Bytes(ByteString(e.into_bytes())),
            },
            Encoding::None => Key::Bytes(ByteString(bytes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_and_bytes_are_distinct() {
        let text = Value::from("abc");
        let bytes = Value::Bytes(ByteString::from(&b"abc"[..]));
        assert_ne!(text, bytes);
        assert_eq!(text.as_bytes(), bytes.as_bytes());
    }

    #[test]
    fn test_signedness_is_preserved() {
        assert_ne!(Value::Int64(5), Value::Uint64(5));
    }

    #[test]
    fn test_nan_is_not_equal_to_itself() {
        let nan = Value::Double(f64::NAN);
        assert_ne!(nan, nan.clone());
    }

    #[test]
    fn test_from_decoded() {
        assert_eq!(
            Value::from_decoded(b"x".to_vec(), Encoding::Utf8),
            Value::from("x")
        );
        assert_eq!(
            Value::from_decoded(b"x".to_vec(), Encoding::None),
            Value::Bytes(ByteString::from(&b"x"[..]))
        );
        assert!(matches!(
            Value::from_decoded(b"\xfa".to_vec(), Encoding::Utf8),
            Value::Bytes(_)
        ));
    }

    #[test]
    fn test_byte_string_requires_unicode() {
        let bad = ByteString::from(&b"\xfa"[..]);
        assert!(matches!(bad.to_str(), Err(Error::NotUnicode(_))));
        assert!(matches!(bad.char_at(0), Err(Error::NotUnicode(_))));
        let good = ByteString::from("héllo".as_bytes());
        assert_eq!(good.char_at(1).unwrap(), Some('é'));
        assert_eq!(good.to_str().unwrap(), "héllo");
    }

    #[test]
    fn test_node_equality_ignores_attributes() {
        let mut attributes = Map::new();
        attributes.insert("a", 1i64);
        let plain = Node::from(1i64);
        let annotated = Node::from(1i64).with_attributes(attributes);
        assert_eq!(plain, annotated);
        assert!(!plain.eq_with_attributes(&annotated));
    }

    #[test]
    fn test_empty_attributes_equal_none() {
        let plain = Node::entity();
        let empty = Node::entity().with_attributes(Map::new());
        assert!(plain.eq_with_attributes(&empty));
        assert!(!empty.has_attributes());
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let mut original = Node::new(Value::List(vec![Node::from(1i64)]));
        let copy = original.deep_copy();
        original
            .value
            .as_list_mut()
            .unwrap()
            .push(Node::from(2i64));
        assert_eq!(copy.value.as_list().map(Vec::len), Some(1));
    }

    #[test]
    fn test_debug_rendering() {
        let node = Node::new(Value::List(vec![
            Node::entity(),
            Node::from(1u64),
            Node::from(f64::NEG_INFINITY),
            Node::from(true),
        ]));
        assert_eq!(format!("{node:?}"), "[#, 1u, %-inf, %true]");
    }
}
