//! End-to-end decoding and encoding behavior.

use libyson::{
    dumps, load, loads, DumpOptions, Encoding, Error, Format, LoadOptions, Map, Node, Value,
    YsonType, BLOCK_SIZE,
};

fn parse(input: &[u8]) -> Result<Node, Error> {
    loads(input, &LoadOptions::default())
}

fn fragment(input: &[u8], yson_type: YsonType) -> Node {
    loads(input, &LoadOptions::default().yson_type(yson_type)).unwrap()
}

fn sample() -> Node {
    let mut attributes = Map::new();
    attributes.insert("owner", "root");
    attributes.insert("limits", Node::new(vec![Node::from(1u64), Node::from(-1i64)]));

    let mut inner = Map::new();
    inner.insert("flag", false);
    inner.insert("nothing", Node::entity());
    inner.insert("quoted", "needs \"quotes\"\n");

    let mut map = Map::new();
    map.insert("int", -4097i64);
    map.insert("uint", u64::MAX);
    map.insert("double", 2.5);
    map.insert("inf", f64::INFINITY);
    map.insert("text", "héllo");
    map.insert("inner", inner);
    map.insert(
        "tagged",
        Node::from(7i64).with_attributes([("unit", "s")].into_iter().collect()),
    );
    map.insert("empty", Node::new(Vec::<Node>::new()));
    Node::new(map).with_attributes(attributes)
}

/// `{x=[{x=[...{}...]}]}` with `depth` levels of containers.
fn deep_object(depth: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for _ in 0..depth / 2 {
        out.extend_from_slice(b"{x=[");
    }
    out.extend_from_slice(b"{}");
    for _ in 0..depth / 2 {
        out.extend_from_slice(b"];}");
    }
    out
}

#[test]
fn test_round_trip_every_format() {
    let node = sample();
    for format in [Format::Binary, Format::Text, Format::Pretty] {
        let encoded = dumps(&node, &DumpOptions::default().format(format)).unwrap();
        let decoded = parse(&encoded).unwrap();
        assert!(
            node.eq_with_attributes(&decoded),
            "{format} round trip: {decoded:?}"
        );
    }
}

#[test]
fn test_lazy_reencoding_matches_eager() {
    let input = dumps(&sample(), &DumpOptions::default()).unwrap();
    let eager = parse(&input).unwrap();
    let lazy = loads(&input, &LoadOptions::default().lazy(true)).unwrap();
    for format in [Format::Binary, Format::Text, Format::Pretty] {
        let options = DumpOptions::default().format(format);
        assert_eq!(dumps(&lazy, &options).unwrap(), dumps(&eager, &options).unwrap());
    }
    assert_eq!(lazy, eager);
}

#[test]
fn test_special_doubles() {
    assert!(parse(b"%nan").unwrap().value.as_f64().unwrap().is_nan());
    assert_eq!(parse(b"%inf").unwrap().value.as_f64(), Some(f64::INFINITY));
    assert_eq!(parse(b"%+inf").unwrap().value.as_f64(), Some(f64::INFINITY));
    assert_eq!(parse(b"%-inf").unwrap().value.as_f64(), Some(f64::NEG_INFINITY));
    let rejected: [&[u8]; 3] = [b"%infi", b"%-nan", b"%nand"];
    for bad in rejected {
        assert!(
            matches!(parse(bad), Err(Error::MalformedToken { .. })),
            "{} should be rejected",
            bad.escape_ascii()
        );
    }
}

#[test]
fn test_binary_scalars() {
    assert_eq!(parse(b"\x01\x06abc").unwrap().value.as_str(), Some("abc"));
    assert_eq!(parse(b"\x02\x81\x40").unwrap().value.as_i64(), Some(-4097));
    assert_eq!(parse(b"\x06\x80\x01").unwrap().value.as_u64(), Some(128));
    assert_eq!(parse(b"\x05").unwrap().value.as_bool(), Some(true));
    assert_eq!(
        parse(b"\x03\x00\x00\x00\x00\x00\x00\xf8\x3f").unwrap().value.as_f64(),
        Some(1.5)
    );
}

#[test]
fn test_malformed_binary() {
    assert!(matches!(
        parse(b"\x02\x80\x80\x80\x80\x80\x80\x80\x80\x80\x80\x01"),
        Err(Error::MalformedBinaryValue { .. })
    ));
    assert!(matches!(parse(b"\x01\x06ab"), Err(Error::UnexpectedEof { .. })));
}

#[test]
fn test_mixed_grammar_is_rejected() {
    assert!(matches!(parse(b"[\x02\x02;1]"), Err(Error::MalformedToken { .. })));
    assert!(matches!(parse(b"[1;\x02\x02]"), Err(Error::MalformedToken { .. })));
}

#[test]
fn test_nesting_limit() {
    let node = parse(&deep_object(80)).unwrap();
    assert!(node.value.as_map().is_some());

    let deep = deep_object(260);
    assert!(matches!(parse(&deep), Err(Error::NestingTooDeep { limit: 256, .. })));
    assert!(matches!(
        loads(&deep, &LoadOptions::default().lazy(true)),
        Err(Error::NestingTooDeep { .. })
    ));
    assert!(parse_with_limit(&deep, 300).is_ok());
}

#[test]
fn test_depth_far_past_the_limit() {
    // Far deeper than any stack could recurse; the limit has to fire first.
    let deep = b"[".repeat(1_000_000);
    assert!(matches!(parse(&deep), Err(Error::NestingTooDeep { limit: 256, .. })));
    assert!(matches!(
        parse_with_limit(&deep, 300),
        Err(Error::NestingTooDeep { limit: 300, .. })
    ));
}

fn parse_with_limit(input: &[u8], limit: usize) -> Result<Node, Error> {
    loads(input, &LoadOptions::default().nesting_limit(limit))
}

#[test]
fn test_fragments() {
    let list = fragment(b"{x=1};{y=2}", YsonType::ListFragment);
    let expected = Node::new(vec![
        Node::new([("x", 1i64)].into_iter().collect::<Map>()),
        Node::new([("y", 2i64)].into_iter().collect::<Map>()),
    ]);
    assert_eq!(list, expected);

    let map = fragment(b"x=z;y=1", YsonType::MapFragment);
    let mut expected = Map::new();
    expected.insert("x", "z");
    expected.insert("y", 1i64);
    assert_eq!(map.value, Value::Map(expected));

    let empty = fragment(b"", YsonType::ListFragment);
    assert_eq!(empty.value.as_list().map(Vec::len), Some(0));
    let trailing = fragment(b"1;2;", YsonType::ListFragment);
    assert_eq!(trailing.value.as_list().map(Vec::len), Some(2));
}

#[test]
fn test_raw_list_fragment() {
    let options = LoadOptions::default()
        .yson_type(YsonType::ListFragment)
        .raw(true);
    let node = loads(b"123;#;{a={b=[\";\"]}};<attr=10>0.1;", &options).unwrap();
    let items: Vec<&[u8]> = node
        .value
        .as_list()
        .unwrap()
        .iter()
        .map(|item| item.value.as_bytes().unwrap())
        .collect();
    let expected: Vec<&[u8]> = vec![b"123;", b"#;", b"{a={b=[\";\"]}};", b"<attr=10>0.1;"];
    assert_eq!(items, expected);
}

#[test]
fn test_raw_requires_a_fragment() {
    let options = LoadOptions::default().raw(true);
    assert!(matches!(loads(b"1", &options), Err(Error::Configuration(_))));
}

#[test]
fn test_trailing_data() {
    assert!(matches!(parse(b"{a=b}{c=d}"), Err(Error::TrailingData { .. })));
    assert!(matches!(parse(b""), Err(Error::UnexpectedEof { .. })));
    assert!(matches!(parse(b"  \n"), Err(Error::UnexpectedEof { .. })));
}

#[test]
fn test_always_create_attributes() {
    let node = parse(b"[1]").unwrap();
    assert_eq!(node.attributes.as_ref().map(Map::len), Some(0));

    let node = loads(b"[1;<a=2>3]", &LoadOptions::default().always_create_attributes(false)).unwrap();
    let items = node.value.as_list().unwrap();
    assert!(node.attributes.is_none());
    assert!(items[0].attributes.is_none());
    assert_eq!(items[1].attributes.as_ref().map(Map::len), Some(1));
}

#[test]
fn test_encoding_none_keeps_bytes() {
    let node = parse(b"\"\\xFA\"").unwrap();
    assert_eq!(node.value.as_bytes(), Some(&b"\xfa"[..]));
    assert_eq!(node.value.as_str(), None);

    let node = loads(b"abc", &LoadOptions::default().encoding(Encoding::None)).unwrap();
    assert!(matches!(node.value, Value::Bytes(_)));
    let text = dumps(&node, &DumpOptions::default().encoding(Encoding::None)).unwrap();
    assert_eq!(text, b"abc");
}

#[test]
fn test_non_unicode_key() {
    let node = parse(b"{\"\\xFA\"=1;b=2}").unwrap();
    let map = node.value.as_map().unwrap();
    assert_eq!(map.get(b"\xfa").and_then(|n| n.value.as_i64()), Some(1));
    assert!(!map.keys().next().unwrap().is_text());
    assert!(map.keys().nth(1).unwrap().is_text());
}

#[test]
fn test_load_from_reader() {
    let node = load(&b"{a=[1;2]}"[..], &LoadOptions::default()).unwrap();
    assert_eq!(node, parse(b"{a=[1;2]}").unwrap());

    let lazy = load(&b"{a=[1;2]}"[..], &LoadOptions::default().lazy(true)).unwrap();
    assert!(lazy.value.is_lazy());
    assert_eq!(lazy, node);
}

fn check_context(input: &[u8], context: &[u8], pos: usize, yson_type: YsonType) {
    for from_reader in [false, true] {
        let options = LoadOptions::default().yson_type(yson_type);
        let err = if from_reader {
            load(input, &options).unwrap_err()
        } else {
            loads(input, &options).unwrap_err()
        };
        let location = err.location().expect("parse errors carry a location");
        assert_eq!(
            location.context.escape_ascii().to_string(),
            context.escape_ascii().to_string(),
            "context for {err}"
        );
        assert_eq!(location.context_pos, Some(pos), "position for {err}");
    }
}

#[test]
fn test_error_context() {
    check_context(b"abacaba{", b"abacaba{", 7, YsonType::Node);
    check_context(b"{a=b;c=d;e=f;[}", b"=b;c=d;e=f;[}", 10, YsonType::Node);
    check_context(b"[0;1;2;3;4;5;{1=2}]", b";2;3;4;5;{1=2}]", 10, YsonType::Node);
    check_context(b"[1;5;{1=2}]", b"[1;5;{1=2}]", 6, YsonType::Node);
    check_context(b"[1;2;3", b"[1;2;3", 6, YsonType::Node);
    check_context(b"a=1;1=2", b"a=1;1=2", 3, YsonType::MapFragment);
}

#[test]
fn test_error_context_across_blocks() {
    let mut input = b"[".to_vec();
    input.extend(b"ab".repeat(BLOCK_SIZE / 2));
    input.extend_from_slice(b";{1=2}]");
    check_context(&input, b"abababab;{1=2}]", 10, YsonType::Node);

    let mut input = b"[".to_vec();
    input.extend(b"a".repeat(BLOCK_SIZE));
    input.extend_from_slice(b";{1=2}]");
    check_context(&input, b"aaaaaaaa;{1=2}]", 10, YsonType::Node);
}

#[test]
fn test_error_path_and_display() {
    let err = parse(b"{a=[1;%nope]}").unwrap_err();
    let location = err.location().unwrap();
    assert_eq!(location.offset, 6);
    assert_eq!(location.path_string(), "/a/1");
    assert_eq!(
        err.to_string(),
        "Malformed token: unknown literal \"%nope\" at byte 6, path /a/1 (context: \"{a=[1;%nope]}\", position 6)"
    );
}

#[test]
fn test_sorted_pretty_output() {
    let node = parse(b"{b=1;a=<z=1;y=2>[x]}").unwrap();
    let pretty = dumps(&node, &DumpOptions::default().format(Format::Pretty).sort_keys(true)).unwrap();
    let expected = "{\n    a = <\n        y = 2;\n        z = 1;\n    > [\n        x;\n    ];\n    b = 1;\n}";
    assert_eq!(String::from_utf8(pretty).unwrap(), expected);
}
