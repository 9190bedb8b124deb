//! YAML transcoding: convert between YSON nodes and YAML text.
//!
//! Mapping from YAML to YSON (core schema):
//!   - YAML null          -> Value::Entity
//!   - YAML bool          -> Value::Boolean
//!   - YAML integer       -> Value::Int64 (Value::Uint64 above i64)
//!   - YAML float         -> Value::Double
//!   - YAML string        -> Value::String
//!   - YAML sequence      -> Value::List
//!   - YAML mapping       -> Value::Map (or a node with attributes)
//!   - YAML !!binary tag  -> Value::Bytes (base64-decoded)
//!
//! Mapping from YSON to YAML:
//!   - Value::Entity       -> YAML null
//!   - Value::Boolean      -> YAML bool
//!   - Value::Int64/Uint64 -> YAML integer
//!   - Value::Double       -> YAML float (including .nan, .inf, -.inf)
//!   - Value::String       -> YAML string
//!   - Value::Bytes        -> YAML !!binary (base64-encoded)
//!   - Value::List         -> YAML sequence
//!   - Value::Map          -> YAML mapping (error for non-UTF-8 keys)
//!
//! Decoding reads saphyr-parser events directly because serde_yaml drops
//! core-schema tags such as `!!binary` before they reach a `Value`.

use super::{attributes_of, text_key, unwrap_attributes, ATTRIBUTES_KEY, VALUE_KEY};
use base64::prelude::*;
use libyson::{ByteString, Map, Node, Value};
use saphyr_parser::{Event, Parser, ScalarStyle, StrInput};
use serde_yaml::Value as YamlValue;
use std::collections::HashMap;

const CORE_SCHEMA: &str = "tag:yaml.org,2002:";

/// Decode a YAML document into a YSON node.
pub fn decode(input: &[u8]) -> Result<Node, String> {
    let text = std::str::from_utf8(input).map_err(|e| format!("YAML input is not UTF-8: {}", e))?;
    Builder {
        parser: Parser::new_from_str(text),
        anchors: HashMap::new(),
    }
    .document()
}

/// Encode a YSON node as a YAML string.
///
/// serde_yaml writes every tag in its local `!` form, so byte strings are
/// tagged with a name that occurs nowhere in the document and that name is
/// then rewritten to the `!!binary` shorthand.
pub fn encode(node: &Node) -> Result<String, String> {
    let mut yaml = node_to_yaml(node)?;
    let mut tag = String::from("yson-binary");
    while mentions(&yaml, &tag) {
        tag.push('_');
    }
    retag(&mut yaml, &tag);
    let text = serde_yaml::to_string(&yaml).map_err(|e| format!("YAML encode error: {}", e))?;
    Ok(text.replace(&format!("!{tag}"), "!!binary"))
}

struct Builder<'a> {
    parser: Parser<'a, StrInput<'a>>,
    anchors: HashMap<usize, Node>,
}

impl<'a> Builder<'a> {
    fn next(&mut self) -> Result<Event<'a>, String> {
        loop {
            match self.parser.next_event() {
                Some(Ok((Event::Nothing, _))) => continue,
                Some(Ok((event, _))) => return Ok(event),
                Some(Err(e)) => return Err(format!("YAML parse error: {e}")),
                None => return Ok(Event::StreamEnd),
            }
        }
    }

    fn document(&mut self) -> Result<Node, String> {
        let mut root = None;
        loop {
            match self.next()? {
                Event::StreamStart | Event::DocumentStart(_) | Event::DocumentEnd => {}
                Event::StreamEnd => break,
                event => {
                    if root.is_some() {
                        return Err("YAML input holds more than one document".to_string());
                    }
                    root = Some(self.node(event)?);
                }
            }
        }
        Ok(root.unwrap_or_else(Node::entity))
    }

    fn node(&mut self, event: Event<'a>) -> Result<Node, String> {
        let (node, anchor) = match event {
            Event::Scalar(text, style, anchor, tag) => {
                let tag = tag.as_ref().map(|t| format!("{}{}", t.handle, t.suffix));
                (scalar(&text, style, tag.as_deref())?, anchor)
            }
            Event::SequenceStart(anchor, _) => {
                let mut items = Vec::new();
                loop {
                    match self.next()? {
                        Event::SequenceEnd => break,
                        event => items.push(self.node(event)?),
                    }
                }
                (Node::new(items), anchor)
            }
            Event::MappingStart(anchor, _) => {
                let mut map = Map::new();
                loop {
                    let key = match self.next()? {
                        Event::MappingEnd => break,
                        event => mapping_key(self.node(event)?)?,
                    };
                    let event = self.next()?;
                    map.insert(key, self.node(event)?);
                }
                (unwrap_attributes(map), anchor)
            }
            Event::Alias(id) => {
                return self
                    .anchors
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| format!("YAML alias to unknown anchor {id}"))
            }
            _ => return Err("Unexpected YAML event".to_string()),
        };
        if anchor != 0 {
            self.anchors.insert(anchor, node.clone());
        }
        Ok(node)
    }
}

fn mapping_key(node: Node) -> Result<String, String> {
    match node.value {
        Value::String(s) => Ok(s),
        Value::Int64(n) => Ok(n.to_string()),
        Value::Uint64(n) => Ok(n.to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        other => Err(format!("Unsupported YAML mapping key type: {}", other.kind())),
    }
}

fn scalar(text: &str, style: ScalarStyle, tag: Option<&str>) -> Result<Node, String> {
    let core = tag.and_then(|t| t.strip_prefix(CORE_SCHEMA).or_else(|| t.strip_prefix("!!")));
    match (core, tag) {
        (Some("binary"), _) | (None, Some("!binary")) => {
            let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = BASE64_STANDARD
                .decode(&clean)
                .map_err(|e| format!("Invalid base64 in !!binary: {}", e))?;
            Ok(Node::new(Value::Bytes(ByteString::from(bytes))))
        }
        (Some("str"), _) => Ok(Node::from(text)),
        (Some("null" | "bool" | "int" | "float"), _) => Ok(plain(text)),
        _ if matches!(style, ScalarStyle::Plain) => Ok(plain(text)),
        _ => Ok(Node::from(text)),
    }
}

/// Resolve an untagged plain scalar with the YAML 1.2 core schema.
fn plain(text: &str) -> Node {
    match text {
        "" | "~" | "null" | "Null" | "NULL" => return Node::entity(),
        "true" | "True" | "TRUE" => return Node::from(true),
        "false" | "False" | "FALSE" => return Node::from(false),
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => return Node::from(f64::INFINITY),
        "-.inf" | "-.Inf" | "-.INF" => return Node::from(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return Node::from(f64::NAN),
        _ => {}
    }
    if let Ok(n) = text.parse::<i64>() {
        return Node::from(n);
    }
    if let Ok(n) = text.parse::<u64>() {
        return Node::from(n);
    }
    if let Some(hex) = text.strip_prefix("0x") {
        if let Ok(n) = i64::from_str_radix(hex, 16) {
            return Node::from(n);
        }
    }
    if let Some(octal) = text.strip_prefix("0o") {
        if let Ok(n) = i64::from_str_radix(octal, 8) {
            return Node::from(n);
        }
    }
    // f64::from_str also takes "inf" and "nan", which YAML spells differently
    if text.bytes().any(|b| b.is_ascii_digit()) {
        if let Ok(x) = text.parse::<f64>() {
            return Node::from(x);
        }
    }
    Node::from(text)
}

fn mentions(yaml: &YamlValue, needle: &str) -> bool {
    match yaml {
        YamlValue::String(s) => s.contains(needle),
        YamlValue::Sequence(seq) => seq.iter().any(|v| mentions(v, needle)),
        YamlValue::Mapping(mapping) => mapping
            .iter()
            .any(|(k, v)| mentions(k, needle) || mentions(v, needle)),
        YamlValue::Tagged(tagged) => mentions(&tagged.value, needle),
        _ => false,
    }
}

fn retag(yaml: &mut YamlValue, tag: &str) {
    match yaml {
        YamlValue::Sequence(seq) => seq.iter_mut().for_each(|v| retag(v, tag)),
        YamlValue::Mapping(mapping) => mapping.values_mut().for_each(|v| retag(v, tag)),
        YamlValue::Tagged(tagged) => tagged.tag = serde_yaml::value::Tag::new(tag),
        _ => {}
    }
}

fn node_to_yaml(node: &Node) -> Result<YamlValue, String> {
    let value = value_to_yaml(&node.value)?;
    match attributes_of(node) {
        Some(attributes) => {
            let mut wrapper = serde_yaml::Mapping::new();
            wrapper.insert(ATTRIBUTES_KEY.into(), map_to_yaml(attributes)?);
            wrapper.insert(VALUE_KEY.into(), value);
            Ok(YamlValue::Mapping(wrapper))
        }
        None => Ok(value),
    }
}

fn map_to_yaml(map: &Map) -> Result<YamlValue, String> {
    let mut mapping = serde_yaml::Mapping::new();
    for (key, node) in map {
        mapping.insert(text_key(key)?.into(), node_to_yaml(node)?);
    }
    Ok(YamlValue::Mapping(mapping))
}

fn value_to_yaml(value: &Value) -> Result<YamlValue, String> {
    match value {
        Value::Entity => Ok(YamlValue::Null),
        Value::Boolean(b) => Ok(YamlValue::Bool(*b)),
        Value::Int64(n) => Ok(YamlValue::Number((*n).into())),
        Value::Uint64(n) => Ok(YamlValue::Number((*n).into())),
        Value::Double(x) => Ok(YamlValue::Number((*x).into())),
        Value::String(s) => Ok(YamlValue::String(s.clone())),
        Value::Bytes(b) => Ok(YamlValue::Tagged(Box::new(serde_yaml::value::TaggedValue {
            tag: serde_yaml::value::Tag::new("binary"),
            value: YamlValue::String(BASE64_STANDARD.encode(b.as_bytes())),
        }))),
        Value::List(items) => items
            .iter()
            .map(node_to_yaml)
            .collect::<Result<Vec<_>, _>>()
            .map(YamlValue::Sequence),
        Value::Map(map) => map_to_yaml(map),
        Value::LazyList(list) => node_to_yaml(&list.to_list().map_err(|e| e.to_string())?),
        Value::LazyMap(map) => node_to_yaml(&map.to_map().map_err(|e| e.to_string())?),
    }
}
