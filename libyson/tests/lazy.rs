//! Lazy containers decoded on first access.

use libyson::{dumps, loads, DumpOptions, LazyList, LazyMap, LoadOptions, Node, Value, YsonType};

fn lazy(input: &[u8]) -> Node {
    loads(input, &LoadOptions::default().lazy(true)).unwrap()
}

fn lazy_map(input: &[u8]) -> LazyMap {
    match lazy(input).value {
        Value::LazyMap(map) => map,
        other => panic!("expected a lazy map, got {other:?}"),
    }
}

fn lazy_fragment(input: &[u8], yson_type: YsonType) -> Node {
    loads(input, &LoadOptions::default().lazy(true).yson_type(yson_type)).unwrap()
}

fn text(node: &Node) -> String {
    String::from_utf8(dumps(node, &DumpOptions::default()).unwrap()).unwrap()
}

#[test]
fn test_map_operations() {
    let mut map = lazy_map(b"{a=b;c=d}");
    assert_eq!(map.get("a").unwrap().unwrap().borrow().value.as_str(), Some("b"));
    assert_eq!(map.get("c").unwrap().unwrap().borrow().value.as_str(), Some("d"));
    assert!(!map.has_attributes().unwrap());

    let old = map.insert("a", 1i64).unwrap();
    assert_eq!(old.and_then(|n| n.value.as_str().map(String::from)), Some("b".into()));
    assert_eq!(map.get("a").unwrap().unwrap().borrow().value.as_i64(), Some(1));

    map.insert("123", "abacaba").unwrap();
    assert_eq!(map.len(), 3);
    assert!(map.contains_key("a"));
    assert!(!map.contains_key("some_key"));
    assert!(map.get("some_key").unwrap().is_none());

    map.remove("a").unwrap();
    assert_eq!(map.len(), 2);

    map.clear();
    assert!(map.is_empty());

    let first = map.get_or_insert_with("a", || Node::from(1i64)).unwrap();
    assert_eq!(first.borrow().value.as_i64(), Some(1));
    let second = map.get_or_insert_with("a", || Node::from(5i64)).unwrap();
    assert_eq!(second.borrow().value.as_i64(), Some(1));
    assert_eq!(map.len(), 1);
}

#[test]
fn test_remove_is_reflected_in_output() {
    let mut map = lazy_map(b"{a=b;c=d}");
    let removed = map.remove("a").unwrap().unwrap();
    assert_eq!(removed.value.as_str(), Some("b"));
    assert_eq!(map.len(), 1);
    assert_eq!(text(&Node::new(map)), "{c=d;}");
}

#[test]
fn test_children_decode_on_first_access() {
    let mut map = lazy_map(b"{a=[1;2];b={c=d}}");
    assert!(!map.is_materialized("a"));
    assert!(!map.is_materialized("b"));

    let a = map.get("a").unwrap().unwrap();
    assert!(map.is_materialized("a"));
    assert!(!map.is_materialized("b"));

    // Nested containers are lazy as well.
    let mut a = a.borrow_mut();
    let list = a.value.as_lazy_list_mut().unwrap();
    assert_eq!(list.len(), 2);
    assert!(!list.is_materialized(0));
    assert_eq!(list.get(1).unwrap().unwrap().borrow().value.as_i64(), Some(2));
    assert!(list.is_materialized(1));
    assert!(list.get(2).unwrap().is_none());
}

#[test]
fn test_attributes() {
    let mut map = lazy_map(b"<a=b;c=d>{e=k}");
    {
        let attributes = map.attributes().unwrap();
        let attributes = attributes.borrow();
        assert_eq!(attributes.get("a").and_then(|n| n.value.as_str()), Some("b"));
        assert_eq!(attributes.get("c").and_then(|n| n.value.as_str()), Some("d"));
    }
    assert_eq!(map.get("e").unwrap().unwrap().borrow().value.as_str(), Some("k"));

    let mut map = lazy_map(b"<a=b;>{c=d;}");
    assert_eq!(
        map.attributes().unwrap().borrow().get("a").and_then(|n| n.value.as_str()),
        Some("b")
    );

    let mut map = lazy_map(b"<>{}");
    assert!(!map.has_attributes().unwrap());
    assert!(map.attributes().unwrap().borrow().is_empty());
    assert!(map.is_empty());
}

#[test]
fn test_scalar_root_keeps_attributes() {
    let node = lazy(b"<a=b>abacaba");
    assert_eq!(node.value.as_str(), Some("abacaba"));
    let attributes = node.attributes.as_ref().unwrap();
    assert_eq!(attributes.get("a").and_then(|n| n.value.as_str()), Some("b"));
}

#[test]
fn test_lazy_equals_eager() {
    let node = lazy(b"[1;2;abacaba]");
    let expected = Node::new(vec![Node::from(1i64), Node::from(2i64), Node::from("abacaba")]);
    assert_eq!(node, expected);
    assert_eq!(node.to_eager().unwrap().value, expected.value);
    assert!(!node.to_eager().unwrap().value.is_lazy());
}

#[test]
fn test_list_fragment() {
    let node = lazy_fragment(b"{a=0};{a=1};{a=2};", YsonType::ListFragment);
    let mut list: LazyList = match node.value {
        Value::LazyList(list) => list,
        other => panic!("expected a lazy list, got {other:?}"),
    };
    assert_eq!(list.len(), 3);
    for (i, item) in list.iter().unwrap().enumerate() {
        let mut item = item.borrow_mut();
        let map = item.value.as_lazy_map_mut().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a").unwrap().unwrap().borrow().value.as_i64(), Some(i as i64));
        assert!(!map.has_attributes().unwrap());
    }

    let node = lazy_fragment(
        b"{a=[];b=1};<testattr=abacaba>{a=2;b=3};",
        YsonType::ListFragment,
    );
    let mut list = match node.value {
        Value::LazyList(list) => list,
        other => panic!("expected a lazy list, got {other:?}"),
    };
    let second = list.get(1).unwrap().unwrap();
    let mut second = second.borrow_mut();
    let map = second.value.as_lazy_map_mut().unwrap();
    assert_eq!(map.len(), 2);
    let attributes = map.attributes().unwrap();
    assert_eq!(attributes.borrow().len(), 1);
    assert_eq!(
        attributes.borrow().get("testattr").and_then(|n| n.value.as_str()),
        Some("abacaba")
    );
}

#[test]
fn test_map_fragment() {
    let node = lazy_fragment(b"a=b;c=1;e=[abacaba;1.5];", YsonType::MapFragment);
    let expected = loads(
        b"{a=b;c=1;e=[abacaba;1.5]}",
        &LoadOptions::default(),
    )
    .unwrap();
    assert_eq!(node, expected);

    let node = lazy_fragment(b"a=b", YsonType::MapFragment);
    assert_eq!(text(&node), "{a=b;}");
}

#[test]
fn test_dumps_interleaves_decoded_and_untouched() {
    let input = b"<a=b>{c=d;e=[1;2;3]}";
    let mut map = lazy_map(input);
    assert_eq!(text(&Node::new(map.clone())), "<a=b;>{c=d;e=[1;2;3;];}");

    map.get("e").unwrap();
    map.attributes().unwrap();
    assert_eq!(text(&Node::new(map.clone())), "<a=b;>{c=d;e=[1;2;3;];}");

    map.get("e")
        .unwrap()
        .unwrap()
        .borrow_mut()
        .value
        .as_lazy_list_mut()
        .unwrap()
        .push(4i64);
    assert_eq!(text(&Node::new(map)), "<a=b;>{c=d;e=[1;2;3;4;];}");
}

#[test]
fn test_shallow_and_deep_copies() {
    let mut obj = lazy_map(b"<a=b;g=[[1];[2]]>{c=d;e=[1;2;3]}");
    obj.get("e").unwrap();
    obj.attributes().unwrap();

    // A clone shares every child that was already decoded.
    let mut shallow = obj.clone();
    assert_eq!(shallow.get("c").unwrap().unwrap().borrow().value.as_str(), Some("d"));
    shallow
        .attributes()
        .unwrap()
        .borrow_mut()
        .get_mut("g")
        .unwrap()
        .value
        .as_list_mut()
        .unwrap()[0]
        .value
        .as_list_mut()
        .unwrap()
        .push(Node::from(2i64));
    shallow
        .get("e")
        .unwrap()
        .unwrap()
        .borrow_mut()
        .value
        .as_lazy_list_mut()
        .unwrap()
        .push(4i64);
    assert_eq!(text(&Node::new(obj.clone())), "<a=b;g=[[1;2;];[2;];];>{c=d;e=[1;2;3;4;];}");

    // A deep copy shares nothing.
    let mut deep = obj.deep_copy();
    deep.get("e")
        .unwrap()
        .unwrap()
        .borrow_mut()
        .value
        .as_lazy_list_mut()
        .unwrap()
        .push(5i64);
    deep.attributes()
        .unwrap()
        .borrow_mut()
        .get_mut("g")
        .unwrap()
        .value
        .as_list_mut()
        .unwrap()[1]
        .value
        .as_list_mut()
        .unwrap()
        .push(Node::from(3i64));
    assert_eq!(text(&Node::new(obj)), "<a=b;g=[[1;2;];[2;];];>{c=d;e=[1;2;3;4;];}");
    assert_eq!(
        text(&Node::new(deep)),
        "<a=b;g=[[1;2;];[2;3;];];>{c=d;e=[1;2;3;4;5;];}"
    );
}

#[test]
fn test_clone_before_access_decodes_independently() {
    let mut first = lazy_map(b"{a=1;b=2}");
    let mut second = first.clone();

    first.get("a").unwrap();
    assert!(first.is_materialized("a"));
    assert!(!second.is_materialized("a"));

    let from_second = second.get("a").unwrap().unwrap();
    assert_eq!(from_second.borrow().value.as_i64(), Some(1));
    assert!(second.is_materialized("a"));

    // Each copy cached its own child.
    from_second.borrow_mut().value = Value::from(5i64);
    assert_eq!(first.get("a").unwrap().unwrap().borrow().value.as_i64(), Some(1));
}

#[test]
fn test_reading_a_mutably_borrowed_child_fails() {
    let mut map = lazy_map(b"{a=[1];b=2}");
    let child = map.get("a").unwrap().unwrap();
    let guard = child.borrow_mut();
    assert!(matches!(map.to_map(), Err(libyson::Error::Configuration(_))));
    assert!(dumps(&Node::new(map.clone()), &DumpOptions::default()).is_err());
    drop(guard);
    assert_eq!(text(&Node::new(map)), "{a=[1;];b=2;}");
}

#[test]
fn test_non_unicode_keys() {
    let mut map = lazy_map(b"{\"\\xFA\"=1;b=2}");
    assert!(map.contains_key(b"\xfa"));
    assert_eq!(map.get(b"\xfa").unwrap().unwrap().borrow().value.as_i64(), Some(1));
    assert!(map.keys().any(|key| !key.is_text()));
}

#[test]
fn test_materialize_and_to_map() {
    let mut map = lazy_map(b"<x=1>{a={b=c};d=[e]}");
    let eager = map.to_map().unwrap();
    assert!(!map.is_materialized("a"));
    assert!(eager.value.as_map().is_some());
    assert_eq!(eager.attributes.as_ref().map(|a| a.len()), Some(1));
    assert!(!eager.value.as_map().unwrap().get("a").unwrap().value.is_lazy());

    map.materialize().unwrap();
    assert!(map.is_materialized("a"));
    assert!(map.is_materialized("d"));
}
