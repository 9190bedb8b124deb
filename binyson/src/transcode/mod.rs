//! Conversions between YSON nodes and other data formats.
//!
//! None of the target formats has attributes, so a node that carries some
//! is written as a two-entry map:
//!
//! ```text
//! {"$attributes": {...}, "$value": ...}
//! ```
//!
//! A map with exactly those two keys, where `$attributes` is itself a map,
//! decodes back into a node with attributes.

pub mod cbor;
pub mod json;
pub mod toml;
pub mod yaml;

use libyson::{Key, Map, Node, Value};

pub const ATTRIBUTES_KEY: &str = "$attributes";
pub const VALUE_KEY: &str = "$value";

/// The attributes of `node` if it has any worth writing.
pub fn attributes_of(node: &Node) -> Option<&Map> {
    node.attributes.as_ref().filter(|attributes| !attributes.is_empty())
}

/// Keys of formats that only allow text keys.
pub fn text_key(key: &Key) -> Result<&str, String> {
    key.to_str()
        .map_err(|e| format!("map key {key} cannot be represented: {e}"))
}

/// Decode-side counterpart of the attribute wrapper.
pub fn unwrap_attributes(mut map: Map) -> Node {
    let is_wrapper = map.len() == 2
        && map.contains_key(VALUE_KEY)
        && map
            .get(ATTRIBUTES_KEY)
            .is_some_and(|attributes| attributes.value.as_map().is_some());
    if !is_wrapper {
        return Node::new(map);
    }
    let attributes = match map.remove(ATTRIBUTES_KEY).map(|node| node.value) {
        Some(Value::Map(attributes)) => attributes,
        _ => Map::new(),
    };
    let node = map.remove(VALUE_KEY).unwrap_or_else(Node::entity);
    node.with_attributes(attributes)
}
