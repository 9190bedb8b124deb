//! Map keys and the insertion-ordered map used for YSON maps and attributes.

use crate::error::Result;
use crate::value::{ByteString, Node};
use indexmap::IndexMap;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A map key.
///
/// Keys decode to `Text` when they are valid UTF-8 under the `utf-8`
/// encoding and to `Bytes` otherwise. Hashing and equality look only at the
/// bytes, so `"a"` and `b"a"` name the same entry.
#[derive(Clone)]
pub enum Key {
    Text(String),
    Bytes(ByteString),
}

impl Key {
    /// The raw bytes of this key.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Key::Text(s) => s.as_bytes(),
            Key::Bytes(b) => b.as_bytes(),
        }
    }

    /// The key as text; fails for byte keys that are not valid UTF-8.
    pub fn to_str(&self) -> Result<&str> {
        match self {
            Key::Text(s) => Ok(s),
            Key::Bytes(b) => b.to_str(),
        }
    }

    /// Returns `true` if this key decoded as text.
    pub fn is_text(&self) -> bool {
        matches!(self, Key::Text(_))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl Borrow<[u8]> for Key {
    fn borrow(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_owned())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

impl From<&[u8]> for Key {
    fn from(b: &[u8]) -> Self {
        Key::Bytes(ByteString::from(b))
    }
}

impl From<ByteString> for Key {
    fn from(b: ByteString) -> Self {
        Key::Bytes(b)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Text(s) => f.write_str(s),
            Key::Bytes(b) => write!(f, "{}", b.as_bytes().escape_ascii()),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Text(s) => write!(f, "{s:?}"),
            Key::Bytes(b) => write!(f, "{b:?}"),
        }
    }
}

/// An insertion-ordered map from keys to nodes.
///
/// Iteration follows insertion order; equality does not.
#[derive(Clone, Default, PartialEq)]
pub struct Map(IndexMap<Key, Node>);

impl Map {
    pub fn new() -> Self {
        Map(IndexMap::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Map(IndexMap::with_capacity(capacity))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get<K: AsRef<[u8]>>(&self, key: K) -> Option<&Node> {
        self.0.get(key.as_ref())
    }

    pub fn get_mut<K: AsRef<[u8]>>(&mut self, key: K) -> Option<&mut Node> {
        self.0.get_mut(key.as_ref())
    }

    pub fn contains_key<K: AsRef<[u8]>>(&self, key: K) -> bool {
        self.0.contains_key(key.as_ref())
    }

    /// Insert a node, returning the previous one. An existing key keeps its
    /// position.
    pub fn insert(&mut self, key: impl Into<Key>, node: impl Into<Node>) -> Option<Node> {
        self.0.insert(key.into(), node.into())
    }

    /// Remove an entry, preserving the order of the remaining ones.
    pub fn remove<K: AsRef<[u8]>>(&mut self, key: K) -> Option<Node> {
        self.0.shift_remove(key.as_ref())
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.0.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Node> {
        self.0.values()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, Key, Node> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> indexmap::map::IterMut<'_, Key, Node> {
        self.0.iter_mut()
    }

    /// Reorder entries by key bytes.
    pub fn sort_keys(&mut self) {
        self.0.sort_keys();
    }

    /// Entries ordered by key bytes, leaving the map untouched.
    pub fn sorted_entries(&self) -> Vec<(&Key, &Node)> {
        let mut entries: Vec<_> = self.0.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// A copy that shares nothing with `self`, lazy children included.
    pub fn deep_copy(&self) -> Map {
        self.0
            .iter()
            .map(|(key, node)| (key.clone(), node.deep_copy()))
            .collect()
    }

    /// A copy with every lazy container below it fully decoded.
    pub fn to_eager(&self) -> Result<Map> {
        let mut map = Map::with_capacity(self.len());
        for (key, node) in self.iter() {
            map.insert(key.clone(), node.to_eager()?);
        }
        Ok(map)
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl<K: Into<Key>, V: Into<Node>> FromIterator<(K, V)> for Map {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Map(iter
            .into_iter()
            .map(|(key, node)| (key.into(), node.into()))
            .collect())
    }
}

impl IntoIterator for Map {
    type Item = (Key, Node);
    type IntoIter = indexmap::map::IntoIter<Key, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Map {
    type Item = (&'a Key, &'a Node);
    type IntoIter = indexmap::map::Iter<'a, Key, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
