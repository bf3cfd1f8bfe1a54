//! Graphs carried through the JSON envelope and the binary wire format.

use relink::{
    ErrorKind, ObjectRef, Value, envelope,
    ir::{CollectionKind, Elements, Node, Primitive},
    wire,
};
use relink_integration_test::{Point, Vertex, create_test_codec, vertex_pair};
use serde_json::json;

fn sample() -> Value {
    let shared = Value::list([Value::Int(1), Value::from("two")]);
    let point = ObjectRef::new(Point { x: 0.5, y: -1.0 });
    let (x, _) = vertex_pair();

    let root = Value::map([
        ("shared", Value::list([shared.clone(), shared])),
        (
            "pair",
            Value::tuple([Value::Object(point.clone()), Value::Object(point)]),
        ),
        ("graph", Value::Object(x)),
        (
            "odd",
            Value::list([
                Value::NotApplicable,
                Value::Float(f64::NEG_INFINITY),
                Value::bytes(vec![1_u8, 2, 3]),
            ]),
        ),
    ]);
    root.as_map().unwrap().insert(Value::from("root"), root.clone());
    root
}

fn check(decoded: &Value) {
    let map = decoded.as_map().unwrap();

    assert_eq!(map.get_str("root"), Some(decoded.clone()));

    let shared = map.get_str("shared").unwrap();
    let shared = shared.as_list().unwrap();
    assert_eq!(shared.get(0), shared.get(1));

    let pair = map.get_str("pair").unwrap();
    let pair = pair.as_tuple().unwrap().items().to_vec();
    assert!(pair[0].as_object().unwrap().ptr_eq(pair[1].as_object().unwrap()));

    let graph = map.get_str("graph").unwrap();
    let x = graph.as_object().unwrap();
    let y = x.downcast_ref::<Vertex>().unwrap().linked()[0].clone();
    let back = y.downcast_ref::<Vertex>().unwrap().linked()[0].clone();
    assert!(back.ptr_eq(x));
}

#[test]
fn json_text_round_trip() {
    let codec = create_test_codec();
    let value = sample();

    let node = codec.encode(&value).unwrap();
    let text = envelope::to_string(&node);
    let parsed = envelope::from_str(&text).unwrap();
    assert_eq!(parsed, node);

    let decoded = codec.decode(&parsed).unwrap();
    assert!(decoded.deep_eq(&value));
    check(&decoded);
}

#[test]
fn json_value_round_trip() {
    let codec = create_test_codec();
    let node = codec.encode(&sample()).unwrap();

    let json = codec.to_json(&node);
    check(&codec.decode(&codec.from_json(&json).unwrap()).unwrap());
}

#[test]
fn json_shape_of_a_cycle() {
    let codec = create_test_codec();

    let root = Value::list([Value::Int(1), Value::Float(f64::INFINITY)]);
    root.as_list().unwrap().push(root.clone());

    let json = codec.to_json(&codec.encode(&root).unwrap());
    assert_eq!(
        json,
        json!({
            "kind": "list",
            "id": 1,
            "items": [1, {"float": "inf"}, {"ref": 1}],
        })
    );
}

#[test]
fn json_shape_of_a_tagged_object() {
    let codec = create_test_codec();

    let point = Value::object(Point { x: 1.0, y: 2.0 });
    let json = codec.to_json(&codec.encode(&point).unwrap());
    assert_eq!(
        json,
        json!({
            "type": std::any::type_name::<Point>(),
            "handler": "point",
            "id": 1,
            "state": {
                "kind": "map",
                "id": 2,
                "items": [["x", 1.0], ["y", 2.0]],
            },
        })
    );
}

#[test]
fn hand_written_envelope_decodes() {
    let codec = create_test_codec();

    let node = envelope::from_str(
        r#"{
            "kind": "map",
            "id": 1,
            "items": [
                ["a", {"ref": 2}],
                ["b", {"kind": "set", "id": 2, "items": [true, null]}],
                ["c", [1, 2, 3]]
            ]
        }"#,
    )
    .unwrap();

    let decoded = codec.decode(&node).unwrap();
    let map = decoded.as_map().unwrap();
    assert_eq!(map.get_str("a"), map.get_str("b"));
    assert!(map.get_str("a").unwrap().as_set().unwrap().contains(&Value::Null));
    assert_eq!(map.get_str("c").unwrap().as_list().unwrap().len(), 3);
}

#[test]
fn envelope_with_missing_state_is_malformed() {
    let error = envelope::from_str(r#"{"type": "T", "handler": "point"}"#)
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::MalformedNode);
    assert_eq!(error.path().to_string(), "$");
}

#[test]
fn binary_round_trip() {
    let codec = create_test_codec();
    let value = sample();

    let node = codec.encode(&value).unwrap();
    let bytes = codec.to_bytes(&node).unwrap();
    assert!(bytes.starts_with(wire::MAGIC));

    let read = codec.from_bytes(&bytes).unwrap();
    assert_eq!(read, node);

    let decoded = codec.decode(&read).unwrap();
    assert!(decoded.deep_eq(&value));
    check(&decoded);
}

#[test]
fn binary_is_smaller_than_json() {
    let codec = create_test_codec();
    let node = codec.encode(&sample()).unwrap();

    let bytes = codec.to_bytes(&node).unwrap();
    assert!(bytes.len() < envelope::to_string(&node).len());
}

#[test]
fn corrupt_binary_is_malformed() {
    let codec = create_test_codec();
    let node = codec.encode(&sample()).unwrap();
    let bytes = codec.to_bytes(&node).unwrap();

    for cut in [0, 3, bytes.len() / 2, bytes.len() - 1] {
        let error = codec.from_bytes(&bytes[..cut]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MalformedNode, "cut at {cut}");
    }
}

/// `levels` lists, each holding its predecessor twice.
fn doubling(levels: usize) -> Node {
    (0..levels).fold(Node::primitive(Primitive::Null), |prev, _| {
        Node::collection(
            CollectionKind::List,
            None,
            Elements::Items(vec![prev.clone(), prev]),
        )
    })
}

#[test]
fn shared_binary_tree_is_bounded_before_rendering() {
    let codec = create_test_codec();

    let bytes = codec.to_bytes(&doubling(64)).unwrap();
    assert!(bytes.len() < 512);
    let error = codec.from_bytes(&bytes).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::SizeExceeded);

    // a modest shared tree still renders every occurrence
    let bytes = codec.to_bytes(&doubling(4)).unwrap();
    let node = codec.from_bytes(&bytes).unwrap();
    assert_eq!(envelope::to_string(&node).matches("null").count(), 16);
}
