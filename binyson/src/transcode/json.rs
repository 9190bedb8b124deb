//! JSON transcoding: convert between YSON nodes and JSON text.
//!
//! Mapping from JSON to YSON:
//!   - JSON null          -> Value::Entity
//!   - JSON bool          -> Value::Boolean
//!   - JSON number        -> Value::Int64, Value::Uint64 or Value::Double
//!   - JSON string        -> Value::String
//!   - JSON array         -> Value::List
//!   - JSON object        -> Value::Map (or a node with attributes)
//!
//! Mapping from YSON to JSON:
//!   - Value::Entity      -> null
//!   - Value::Boolean     -> bool
//!   - Value::Int64/Uint64 -> number
//!   - Value::Double      -> number (error if not finite)
//!   - Value::String      -> string
//!   - Value::Bytes       -> string (error if not valid UTF-8)
//!   - Value::List        -> array
//!   - Value::Map         -> object (error for non-UTF-8 keys)

use super::{attributes_of, text_key, unwrap_attributes, ATTRIBUTES_KEY, VALUE_KEY};
use libyson::{Map, Node, Value};
use serde_json::Value as JsonValue;

/// Decode JSON text into a YSON node.
pub fn decode(input: &[u8]) -> Result<Node, String> {
    let json: JsonValue =
        serde_json::from_slice(input).map_err(|e| format!("JSON parse error: {}", e))?;
    Ok(json_to_node(json))
}

/// Encode a YSON node as pretty-printed JSON text.
pub fn encode(node: &Node) -> Result<String, String> {
    let json = node_to_json(node)?;
    serde_json::to_string_pretty(&json).map_err(|e| format!("JSON encode error: {}", e))
}

fn json_to_node(json: JsonValue) -> Node {
    match json {
        JsonValue::Null => Node::entity(),
        JsonValue::Bool(b) => Node::from(b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Node::from(i)
            } else if let Some(u) = n.as_u64() {
                Node::from(u)
            } else {
                Node::from(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        JsonValue::String(s) => Node::from(s),
        JsonValue::Array(items) => Node::new(items.into_iter().map(json_to_node).collect::<Vec<_>>()),
        JsonValue::Object(object) => {
            let map: Map = object
                .into_iter()
                .map(|(key, value)| (key, json_to_node(value)))
                .collect();
            unwrap_attributes(map)
        }
    }
}

fn node_to_json(node: &Node) -> Result<JsonValue, String> {
    let value = value_to_json(&node.value)?;
    match attributes_of(node) {
        Some(attributes) => {
            let mut wrapper = serde_json::Map::new();
            wrapper.insert(ATTRIBUTES_KEY.to_string(), map_to_json(attributes)?);
            wrapper.insert(VALUE_KEY.to_string(), value);
            Ok(JsonValue::Object(wrapper))
        }
        None => Ok(value),
    }
}

fn map_to_json(map: &Map) -> Result<JsonValue, String> {
    let mut object = serde_json::Map::new();
    for (key, node) in map {
        object.insert(text_key(key)?.to_string(), node_to_json(node)?);
    }
    Ok(JsonValue::Object(object))
}

fn value_to_json(value: &Value) -> Result<JsonValue, String> {
    match value {
        Value::Entity => Ok(JsonValue::Null),
        Value::Boolean(b) => Ok(JsonValue::Bool(*b)),
        Value::Int64(n) => Ok(JsonValue::from(*n)),
        Value::Uint64(n) => Ok(JsonValue::from(*n)),
        Value::Double(x) => serde_json::Number::from_f64(*x)
            .map(JsonValue::Number)
            .ok_or_else(|| format!("JSON has no representation for the double {x}")),
        Value::String(s) => Ok(JsonValue::String(s.clone())),
        Value::Bytes(b) => b
            .to_str()
            .map(|s| JsonValue::String(s.to_string()))
            .map_err(|e| format!("JSON strings must be text: {e}")),
        Value::List(items) => items
            .iter()
            .map(node_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(JsonValue::Array),
        Value::Map(map) => map_to_json(map),
        Value::LazyList(list) => node_to_json(&list.to_list().map_err(|e| e.to_string())?),
        Value::LazyMap(map) => node_to_json(&map.to_map().map_err(|e| e.to_string())?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_numbers() {
        let node = decode(br#"[1, -2, 18446744073709551615, 1.5, null]"#).unwrap();
        let items = node.value.as_list().unwrap();
        assert_eq!(items[0].value.as_i64(), Some(1));
        assert_eq!(items[1].value.as_i64(), Some(-2));
        assert_eq!(items[2].value.as_u64(), Some(u64::MAX));
        assert_eq!(items[3].value.as_f64(), Some(1.5));
        assert!(items[4].value.is_entity());
    }

    #[test]
    fn test_attributes_round_trip() {
        let input = br#"{"$attributes": {"type": "table"}, "$value": [1, 2]}"#;
        let node = decode(input).unwrap();
        assert_eq!(node.value.as_list().map(Vec::len), Some(2));
        assert_eq!(
            node.attributes
                .as_ref()
                .and_then(|a| a.get("type"))
                .and_then(|n| n.value.as_str()),
            Some("table")
        );

        let json: JsonValue = serde_json::from_str(&encode(&node).unwrap()).unwrap();
        assert_eq!(json, serde_json::from_slice::<JsonValue>(input).unwrap());
    }

    #[test]
    fn test_non_finite_doubles_are_rejected() {
        assert!(encode(&Node::from(f64::NAN)).is_err());
        assert!(encode(&Node::from(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_lazy_containers_are_written() {
        let node = libyson::loads(b"<a=1>{b=[x]}", &libyson::LoadOptions::default().lazy(true)).unwrap();
        let json: JsonValue = serde_json::from_str(&encode(&node).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"$attributes": {"a": 1}, "$value": {"b": ["x"]}})
        );
    }
}
