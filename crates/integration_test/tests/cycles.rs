//! Cyclic graphs close again after decoding.

use relink::{ErrorKind, ObjectRef, Value, envelope};
use relink_integration_test::{Vertex, create_test_codec, vertex_pair};

fn vertex(object: &ObjectRef) -> &Vertex {
    object.downcast_ref::<Vertex>().expect("a vertex")
}

#[test]
fn self_containing_list() {
    let codec = create_test_codec();

    let root = Value::list([Value::Int(1)]);
    root.as_list().unwrap().push(root.clone());

    let node = codec.encode(&root).unwrap();
    assert_eq!(node.to_string(), "list#1[1, @1]");

    let decoded = codec.decode(&node).unwrap();
    let list = decoded.as_list().unwrap();
    assert_eq!(list.get(1), Some(decoded.clone()));
    assert!(decoded.deep_eq(&root));
}

#[test]
fn self_containing_map() {
    let codec = create_test_codec();

    let root = Value::map([("name", "root")]);
    root.as_map().unwrap().insert(Value::from("me"), root.clone());

    let decoded = codec.decode(&codec.encode(&root).unwrap()).unwrap();
    assert_eq!(decoded.as_map().unwrap().get_str("me"), Some(decoded.clone()));
}

#[test]
fn mutually_referencing_lists() {
    let codec = create_test_codec();

    let a = Value::list([Value::from("a")]);
    let b = Value::list([Value::from("b"), a.clone()]);
    a.as_list().unwrap().push(b.clone());

    let decoded = codec.decode(&codec.encode(&a).unwrap()).unwrap();
    let b2 = decoded.as_list().unwrap().get(1).unwrap();
    let back = b2.as_list().unwrap().get(1).unwrap();

    assert_eq!(back, decoded);
    assert_eq!(b2.as_list().unwrap().get(0), Some(Value::from("b")));
}

#[test]
fn set_inside_its_own_element() {
    let codec = create_test_codec();

    let set = Value::set([Value::Int(0)]);
    let holder = Value::list([set.clone()]);
    set.as_set().unwrap().insert(holder.clone());

    let decoded = codec.decode(&codec.encode(&set).unwrap()).unwrap();
    let items = decoded.as_set().unwrap().snapshot();
    let inner = items[1].as_list().unwrap().get(0).unwrap();
    assert_eq!(inner, decoded);
}

#[test]
fn tuple_closed_through_a_list_rooted_at_the_list() {
    let codec = create_test_codec();

    let list = Value::list([]);
    let tuple = Value::tuple([list.clone()]);
    list.as_list().unwrap().push(tuple);

    let decoded = codec.decode(&codec.encode(&list).unwrap()).unwrap();
    let tuple = decoded.as_list().unwrap().get(0).unwrap();
    assert_eq!(tuple.as_tuple().unwrap().items()[0], decoded);
}

#[test]
fn tuple_closed_through_a_list_rooted_at_the_tuple() {
    let codec = create_test_codec();

    let list = Value::list([]);
    let tuple = Value::tuple([list.clone()]);
    list.as_list().unwrap().push(tuple.clone());

    // the tuple would have to exist before its own contents
    let error = codec.encode(&tuple).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ImmutableCycleUnsupported);
    assert_eq!(error.path().to_string(), "$[0][0]");
    assert_eq!(error.type_name(), Some("tuple"));
}

#[test]
fn self_referencing_tuple_payload_is_rejected() {
    let codec = create_test_codec();

    let node = envelope::from_str(
        r#"{"kind": "tuple", "id": 1, "items": [1, {"ref": 1}]}"#,
    )
    .unwrap();

    let error = codec.decode(&node).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ImmutableCycleUnsupported);
    assert_eq!(error.path().to_string(), "$[1]");
}

#[test]
fn frozen_set_closed_through_a_list_rooted_at_the_frozen_set() {
    let codec = create_test_codec();

    let list = Value::list([]);
    let frozen = Value::frozen_set([list.clone(), Value::Int(3)]);
    list.as_list().unwrap().push(frozen.clone());

    let error = codec.encode(&frozen).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ImmutableCycleUnsupported);
    assert_eq!(error.path().to_string(), "$[0][0]");
    assert_eq!(error.type_name(), Some("frozenset"));

    // rooted at the list, the frozen set is finished before the list closes
    let decoded = codec.decode(&codec.encode(&list).unwrap()).unwrap();
    let frozen = decoded.as_list().unwrap().get(0).unwrap();
    assert_eq!(frozen.as_frozen_set().unwrap().items()[0], decoded);
}

#[test]
fn self_referencing_frozen_set_payload_is_rejected() {
    let codec = create_test_codec();

    let node = envelope::from_str(
        r#"{"kind": "frozenset", "id": 1, "items": [{"ref": 1}]}"#,
    )
    .unwrap();

    let error = codec.decode(&node).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ImmutableCycleUnsupported);
    assert_eq!(error.path().to_string(), "$[0]");
}

#[test]
fn vertices_holding_each_other() {
    let codec = create_test_codec();
    let (x, _y) = vertex_pair();

    let decoded =
        codec.decode(&codec.encode(&Value::Object(x)).unwrap()).unwrap();
    let x2 = decoded.as_object().unwrap();
    assert!(!x2.is_pending());
    assert_eq!(vertex(x2).label, "X");

    let linked = vertex(x2).linked();
    let y2 = &linked[0];
    assert!(!y2.is_pending());
    assert_eq!(vertex(y2).label, "Y");

    // Y points back at the very object decode returned
    assert!(vertex(y2).linked()[0].ptr_eq(x2));

    for object in [x2, y2] {
        let links = Value::List(vertex(object).links.clone());
        assert_eq!(links.pending_objects(), 0);
    }
}

#[test]
fn both_vertices_as_roots_share_objects() {
    let codec = create_test_codec();
    let (x, y) = vertex_pair();

    let root = Value::list([Value::Object(x), Value::Object(y)]);
    let decoded = codec.decode(&codec.encode(&root).unwrap()).unwrap();

    let list = decoded.as_list().unwrap();
    let x2 = list.get(0).unwrap();
    let y2 = list.get(1).unwrap();
    let (x2, y2) = (x2.as_object().unwrap(), y2.as_object().unwrap());

    assert!(vertex(x2).linked()[0].ptr_eq(y2));
    assert!(vertex(y2).linked()[0].ptr_eq(x2));
    assert_eq!(decoded.pending_objects(), 0);
}

#[test]
fn vertex_linking_to_itself() {
    let codec = create_test_codec();

    let x = ObjectRef::new(Vertex::new("loop"));
    vertex(&x).link(&x);

    let node = codec.encode(&Value::Object(x)).unwrap();
    let decoded = codec.decode(&node).unwrap();
    let x2 = decoded.as_object().unwrap();

    assert!(vertex(x2).linked()[0].ptr_eq(x2));
}
