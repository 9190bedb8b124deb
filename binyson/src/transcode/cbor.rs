//! CBOR transcoding: convert between YSON nodes and CBOR binary data.
//!
//! Mapping from CBOR to YSON:
//!   - CBOR null                  -> Value::Entity
//!   - CBOR bool                  -> Value::Boolean
//!   - CBOR unsigned/negative int -> Value::Int64, or Value::Uint64 above i64
//!   - CBOR float (16/32/64)      -> Value::Double (promoted to f64)
//!   - CBOR text string           -> Value::String
//!   - CBOR byte string           -> Value::Bytes
//!   - CBOR array                 -> Value::List
//!   - CBOR map                   -> Value::Map (text or byte string keys)
//!   - CBOR tag, undefined        -> error
//!
//! Mapping from YSON to CBOR:
//!   - Value::Entity  -> CBOR null
//!   - Value::Boolean -> CBOR bool
//!   - Value::Int64   -> CBOR integer (major 0 or 1)
//!   - Value::Uint64  -> CBOR unsigned integer (major 0)
//!   - Value::Double  -> CBOR float64 (never downgraded)
//!   - Value::String  -> CBOR text string
//!   - Value::Bytes   -> CBOR byte string
//!   - Value::List    -> CBOR array
//!   - Value::Map     -> CBOR map in insertion order

use super::{attributes_of, unwrap_attributes, ATTRIBUTES_KEY, VALUE_KEY};
use ciborium::value::Value as CborValue;
use libyson::{ByteString, Key, Map, Node, Value};

/// Decode CBOR bytes into a YSON node.
pub fn decode(input: &[u8]) -> Result<Node, String> {
    let cbor_value: CborValue =
        ciborium::de::from_reader(input).map_err(|e| format!("CBOR decode error: {}", e))?;
    cbor_to_node(&cbor_value)
}

fn cbor_to_node(cbor: &CborValue) -> Result<Node, String> {
    match cbor {
        CborValue::Null => Ok(Node::entity()),
        CborValue::Bool(b) => Ok(Node::from(*b)),
        CborValue::Integer(i) => {
            let n = i128::from(*i);
            if let Ok(n) = i64::try_from(n) {
                Ok(Node::from(n))
            } else if let Ok(n) = u64::try_from(n) {
                Ok(Node::from(n))
            } else {
                Err(format!("CBOR integer {} does not fit in 64 bits", n))
            }
        }
        CborValue::Float(f) => Ok(Node::from(*f)),
        CborValue::Text(s) => Ok(Node::from(s.as_str())),
        CborValue::Bytes(b) => Ok(Node::from(ByteString::from(b.as_slice()))),
        CborValue::Array(arr) => {
            let items: Result<Vec<Node>, String> = arr.iter().map(cbor_to_node).collect();
            Ok(Node::new(items?))
        }
        CborValue::Map(pairs) => {
            let mut map = Map::with_capacity(pairs.len());
            for (k, v) in pairs {
                let key = match k {
                    CborValue::Text(s) => Key::from(s.as_str()),
                    CborValue::Bytes(b) => Key::from(b.as_slice()),
                    _ => return Err(format!("CBOR map key must be a string, got: {:?}", k)),
                };
                map.insert(key, cbor_to_node(v)?);
            }
            Ok(unwrap_attributes(map))
        }
        CborValue::Tag(tag, _) => Err(format!(
            "CBOR tagged value (tag {}) has no YSON equivalent",
            tag
        )),
        _ => Err(format!("CBOR value {:?} has no YSON equivalent", cbor)),
    }
}

// ciborium downgrades float64 to float16/float32 when the value fits, so
// the encoder writes CBOR by hand to keep every double as major 7, info 27.

/// Encode a YSON node as CBOR bytes.
pub fn encode(node: &Node) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    write_node(&mut buf, node)?;
    Ok(buf)
}

fn write_node(buf: &mut Vec<u8>, node: &Node) -> Result<(), String> {
    match attributes_of(node) {
        Some(attributes) => {
            write_type_and_length(buf, 5, 2);
            write_text(buf, ATTRIBUTES_KEY);
            write_map(buf, attributes)?;
            write_text(buf, VALUE_KEY);
            write_value(buf, &node.value)
        }
        None => write_value(buf, &node.value),
    }
}

fn write_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), String> {
    match value {
        Value::Entity => buf.push(0xf6),
        Value::Boolean(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Int64(n) if *n < 0 => write_type_and_length(buf, 1, !*n as u64),
        Value::Int64(n) => write_type_and_length(buf, 0, *n as u64),
        Value::Uint64(n) => write_type_and_length(buf, 0, *n),
        Value::Double(f) => {
            buf.push(0xfb);
            buf.extend_from_slice(&f.to_be_bytes());
        }
        Value::String(s) => write_text(buf, s),
        Value::Bytes(b) => {
            write_type_and_length(buf, 2, b.len() as u64);
            buf.extend_from_slice(b.as_bytes());
        }
        Value::List(items) => {
            write_type_and_length(buf, 4, items.len() as u64);
            for item in items {
                write_node(buf, item)?;
            }
        }
        Value::Map(map) => write_map(buf, map)?,
        Value::LazyList(list) => {
            return write_node(buf, &list.to_list().map_err(|e| e.to_string())?)
        }
        Value::LazyMap(map) => return write_node(buf, &map.to_map().map_err(|e| e.to_string())?),
    }
    Ok(())
}

fn write_map(buf: &mut Vec<u8>, map: &Map) -> Result<(), String> {
    write_type_and_length(buf, 5, map.len() as u64);
    for (key, node) in map {
        match key {
            Key::Text(s) => write_text(buf, s),
            Key::Bytes(b) => {
                write_type_and_length(buf, 2, b.len() as u64);
                buf.extend_from_slice(b.as_bytes());
            }
        }
        write_node(buf, node)?;
    }
    Ok(())
}

fn write_text(buf: &mut Vec<u8>, s: &str) {
    write_type_and_length(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Write a CBOR major type with its argument in the shortest form:
/// 0-23 inline, then 1, 2, 4 or 8 following bytes (info 24-27).
fn write_type_and_length(buf: &mut Vec<u8>, major: u8, val: u64) {
    let high = major << 5;
    match val {
        0..=23 => buf.push(high | val as u8),
        24..=0xff => {
            buf.push(high | 24);
            buf.push(val as u8);
        }
        0x100..=0xffff => {
            buf.push(high | 25);
            buf.extend_from_slice(&(val as u16).to_be_bytes());
        }
        0x10000..=0xffff_ffff => {
            buf.push(high | 26);
            buf.extend_from_slice(&(val as u32).to_be_bytes());
        }
        _ => {
            buf.push(high | 27);
            buf.extend_from_slice(&val.to_be_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libyson::LoadOptions;

    #[test]
    fn test_integers() {
        assert_eq!(encode(&Node::from(10i64)).unwrap(), vec![0x0a]);
        assert_eq!(encode(&Node::from(-1i64)).unwrap(), vec![0x20]);
        assert_eq!(encode(&Node::from(-500i64)).unwrap(), vec![0x39, 0x01, 0xf3]);
        assert_eq!(
            encode(&Node::from(u64::MAX)).unwrap(),
            vec![0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
        assert_eq!(decode(&[0x39, 0x01, 0xf3]).unwrap().value.as_i64(), Some(-500));
        assert_eq!(
            decode(&[0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff])
                .unwrap()
                .value
                .as_u64(),
            Some(u64::MAX)
        );
    }

    #[test]
    fn test_doubles_stay_float64() {
        let bytes = encode(&Node::from(1.5f64)).unwrap();
        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[0], 0xfb);
        assert_eq!(decode(&bytes).unwrap().value.as_f64(), Some(1.5));
    }

    #[test]
    fn test_round_trip_with_attributes_and_byte_keys() {
        let options = LoadOptions::default().encoding(libyson::Encoding::None);
        let node = libyson::loads(b"<a=1>{k=[#;%false;\"\\xff\"];\"\\xfe\"=18446744073709551615u}", &options).unwrap();
        let back = decode(&encode(&node).unwrap()).unwrap();
        assert!(node.eq_with_attributes(&back));
    }

    #[test]
    fn test_tags_are_rejected() {
        // tag 1 (epoch time) wrapping 0
        assert!(decode(&[0xc1, 0x00]).is_err());
    }
}
