//! TOML transcoding: convert between YSON nodes and TOML text.
//!
//! Mapping from TOML to YSON:
//!   - TOML string         -> Value::String
//!   - TOML integer        -> Value::Int64
//!   - TOML float          -> Value::Double
//!   - TOML boolean        -> Value::Boolean
//!   - TOML array          -> Value::List
//!   - TOML table          -> Value::Map (or a node with attributes)
//!   - TOML datetime       -> Value::String (RFC 3339 representation)
//!
//! Mapping from YSON to TOML:
//!   - Value::Entity        -> error (TOML has no null)
//!   - Value::Boolean       -> TOML boolean
//!   - Value::Int64         -> TOML integer
//!   - Value::Uint64        -> TOML integer (if it fits in i64, otherwise error)
//!   - Value::Double        -> TOML float
//!   - Value::String        -> TOML string
//!   - Value::Bytes         -> TOML string (if valid UTF-8, otherwise error)
//!   - Value::List          -> TOML array
//!   - Value::Map           -> TOML table
//!
//! TOML requires the top-level value to be a table; other nodes error.

use super::{attributes_of, text_key, unwrap_attributes, ATTRIBUTES_KEY, VALUE_KEY};
use libyson::{Map, Node, Value};
use toml_edit::{DocumentMut, Formatted, Item, Table};

/// Decode a TOML string into a YSON node.
pub fn decode(input: &[u8]) -> Result<Node, String> {
    let text = std::str::from_utf8(input).map_err(|e| format!("TOML input is not UTF-8: {}", e))?;
    let doc: DocumentMut = text
        .parse::<DocumentMut>()
        .map_err(|e| format!("TOML parse error: {}", e))?;
    toml_table_to_node(doc.as_table())
}

/// Encode a YSON node as a TOML string.
pub fn encode(node: &Node) -> Result<String, String> {
    match node_to_toml(node)? {
        Item::Table(table) => {
            let mut doc = DocumentMut::new();
            for (key, item) in table.iter() {
                doc[key] = item.clone();
            }
            Ok(doc.to_string())
        }
        _ => Err("TOML requires the top-level value to be a table".to_string()),
    }
}

fn toml_table_to_node(table: &Table) -> Result<Node, String> {
    let mut map = Map::with_capacity(table.len());
    for (key, item) in table.iter() {
        map.insert(key, toml_item_to_node(item)?);
    }
    Ok(unwrap_attributes(map))
}

fn toml_item_to_node(item: &Item) -> Result<Node, String> {
    match item {
        Item::Value(v) => toml_value_to_node(v),
        Item::Table(t) => toml_table_to_node(t),
        Item::ArrayOfTables(tables) => {
            let items: Result<Vec<Node>, String> = tables.iter().map(toml_table_to_node).collect();
            Ok(Node::new(items?))
        }
        Item::None => Ok(Node::entity()),
    }
}

fn toml_value_to_node(v: &toml_edit::Value) -> Result<Node, String> {
    match v {
        toml_edit::Value::String(s) => Ok(Node::from(s.value().as_str())),
        toml_edit::Value::Integer(i) => Ok(Node::from(*i.value())),
        toml_edit::Value::Float(f) => Ok(Node::from(*f.value())),
        toml_edit::Value::Boolean(b) => Ok(Node::from(*b.value())),
        toml_edit::Value::Datetime(dt) => Ok(Node::from(dt.value().to_string())),
        toml_edit::Value::Array(arr) => {
            let items: Result<Vec<Node>, String> = arr.iter().map(toml_value_to_node).collect();
            Ok(Node::new(items?))
        }
        toml_edit::Value::InlineTable(table) => {
            let mut map = Map::with_capacity(table.len());
            for (key, value) in table.iter() {
                map.insert(key, toml_value_to_node(value)?);
            }
            Ok(unwrap_attributes(map))
        }
    }
}

fn node_to_toml(node: &Node) -> Result<Item, String> {
    let value = value_to_toml(&node.value)?;
    match attributes_of(node) {
        Some(attributes) => {
            let mut wrapper = Table::new();
            wrapper.insert(ATTRIBUTES_KEY, map_to_toml(attributes)?);
            wrapper.insert(VALUE_KEY, value);
            Ok(Item::Table(wrapper))
        }
        None => Ok(value),
    }
}

fn map_to_toml(map: &Map) -> Result<Item, String> {
    let mut table = Table::new();
    for (key, node) in map {
        table.insert(text_key(key)?, node_to_toml(node)?);
    }
    Ok(Item::Table(table))
}

fn scalar(value: toml_edit::Value) -> Item {
    Item::Value(value)
}

fn value_to_toml(value: &Value) -> Result<Item, String> {
    match value {
        Value::Entity => Err("TOML has no null type".to_string()),
        Value::Boolean(b) => Ok(scalar(toml_edit::Value::Boolean(Formatted::new(*b)))),
        Value::Int64(n) => Ok(scalar(toml_edit::Value::Integer(Formatted::new(*n)))),
        Value::Uint64(n) => {
            let i = i64::try_from(*n)
                .map_err(|_| format!("Integer {}u too large for TOML (i64)", n))?;
            Ok(scalar(toml_edit::Value::Integer(Formatted::new(i))))
        }
        Value::Double(x) => Ok(scalar(toml_edit::Value::Float(Formatted::new(*x)))),
        Value::String(s) => Ok(scalar(toml_edit::Value::String(Formatted::new(s.clone())))),
        Value::Bytes(b) => {
            let s = b
                .to_str()
                .map_err(|e| format!("TOML has no binary data type: {e}"))?;
            Ok(scalar(toml_edit::Value::String(Formatted::new(s.to_string()))))
        }
        Value::List(items) => {
            let mut array = toml_edit::Array::new();
            for item in items {
                match node_to_toml(item)? {
                    Item::Value(value) => array.push(value),
                    Item::Table(table) => array.push(table.into_inline_table()),
                    _ => return Err("Unexpected TOML item type in array".to_string()),
                }
            }
            Ok(scalar(toml_edit::Value::Array(array)))
        }
        Value::Map(map) => map_to_toml(map),
        Value::LazyList(list) => node_to_toml(&list.to_list().map_err(|e| e.to_string())?),
        Value::LazyMap(map) => node_to_toml(&map.to_map().map_err(|e| e.to_string())?),
    }
}
