//! Round trips of acyclic graphs through encode and decode.

use relink::Value;
use relink_integration_test::{Point, create_test_codec};

#[test]
fn primitives_survive() {
    let codec = create_test_codec();

    for value in [
        Value::Null,
        Value::NotApplicable,
        Value::Bool(true),
        Value::Int(-42),
        Value::Float(2.5),
        Value::from("hello"),
        Value::bytes(vec![0_u8, 1, 255]),
    ] {
        let node = codec.encode(&value).unwrap();
        assert!(node.id().is_none());

        let decoded = codec.decode(&node).unwrap();
        assert!(decoded.deep_eq(&value), "{value:?} became {decoded:?}");
    }
}

#[test]
fn nan_survives() {
    let codec = create_test_codec();

    let decoded =
        codec.decode(&codec.encode(&Value::Float(f64::NAN)).unwrap()).unwrap();
    assert!(decoded.as_float().unwrap().is_nan());
}

#[test]
fn nested_collections_survive() {
    let codec = create_test_codec();

    let value = Value::map([
        ("numbers", Value::list([Value::Int(1), Value::Int(2), Value::Int(3)])),
        ("pair", Value::tuple([Value::from("a"), Value::Bool(false)])),
        ("tags", Value::set([Value::from("x"), Value::from("y")])),
        ("frozen", Value::frozen_set([Value::Int(7), Value::Int(7)])),
        ("empty", Value::list([])),
    ]);

    let decoded = codec.decode(&codec.encode(&value).unwrap()).unwrap();
    assert!(decoded.deep_eq(&value));

    let map = decoded.as_map().unwrap();
    assert_eq!(map.len(), 5);
    let frozen = map.get_str("frozen").unwrap();
    assert_eq!(frozen.as_frozen_set().unwrap().len(), 1);
    let tags = map.get_str("tags").unwrap();
    assert!(tags.as_set().unwrap().contains(&Value::from("y")));
}

#[test]
fn map_keys_may_be_collections() {
    let codec = create_test_codec();

    let key = Value::tuple([Value::Int(1), Value::Int(2)]);
    let value = Value::map([(key.clone(), Value::from("point"))]);

    let decoded = codec.decode(&codec.encode(&value).unwrap()).unwrap();
    let map = decoded.as_map().unwrap();
    assert_eq!(map.get(&key), Some(Value::from("point")));
}

#[test]
fn handler_backed_values_survive() {
    let codec = create_test_codec();

    let value = Value::list([
        Value::object(Point { x: 1.0, y: 2.0 }),
        Value::object(Point { x: -3.5, y: 0.0 }),
    ]);

    let decoded = codec.decode(&codec.encode(&value).unwrap()).unwrap();
    let points: Vec<Point> = decoded
        .as_list()
        .unwrap()
        .snapshot()
        .iter()
        .map(|value| {
            *value.as_object().unwrap().downcast_ref::<Point>().unwrap()
        })
        .collect();

    assert_eq!(points, [Point { x: 1.0, y: 2.0 }, Point { x: -3.5, y: 0.0 }]);
}

#[test]
fn decoded_graph_encodes_to_the_same_ir() {
    let codec = create_test_codec();

    let value = Value::map([
        ("origin", Value::object(Point { x: 0.0, y: 0.0 })),
        ("path", Value::list([Value::Int(1), Value::tuple([Value::Null])])),
    ]);

    let first = codec.encode(&value).unwrap();
    let second = codec.encode(&codec.decode(&first).unwrap()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn free_functions_match_the_codec() {
    let codec = create_test_codec();
    let value = Value::list([Value::object(Point { x: 1.0, y: 1.0 })]);

    let node = relink::encode(codec.registry(), &value).unwrap();
    assert_eq!(node, codec.encode(&value).unwrap());

    let decoded = relink::decode(codec.registry(), &node).unwrap();
    assert!(decoded.deep_eq(&codec.decode(&node).unwrap()));
}

#[test]
fn large_map_and_set_round_trip() {
    let codec = create_test_codec();
    let count = 200_000_i64;

    let value = Value::list([
        Value::map((0..count).map(|i| (Value::Int(i), Value::Int(i * 2)))),
        Value::set((0..count).map(|i| Value::from(i.to_string()))),
    ]);

    let decoded = codec.decode(&codec.encode(&value).unwrap()).unwrap();
    let list = decoded.as_list().unwrap();

    let map = list.get(0).unwrap();
    let map = map.as_map().unwrap();
    assert_eq!(map.len(), 200_000);
    assert_eq!(map.get(&Value::Int(123_456)), Some(Value::Int(246_912)));
    assert_eq!(map.entries()[17].0, Value::Int(17));

    let set = list.get(1).unwrap();
    let set = set.as_set().unwrap();
    assert_eq!(set.len(), 200_000);
    assert!(set.contains(&Value::from("199999")));
}
