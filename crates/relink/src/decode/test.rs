use std::sync::Arc;

use super::*;
use crate::{
    handler::{Handler, HandlerError},
    ir::Primitive,
};

/// Keeps its whole state, so tests can look at what reconstruction saw.
struct Holder(Value);

struct HolderHandler;

impl Handler for HolderHandler {
    fn name(&self) -> &str { "holder" }

    fn can_handle(&self, object: &ObjectRef) -> bool { object.is::<Holder>() }

    fn extract_state(&self, object: &ObjectRef) -> Result<Value, HandlerError> {
        let holder = object.downcast_ref::<Holder>().ok_or("not a holder")?;
        Ok(holder.0.clone())
    }

    fn reconstruct(&self, state: Value) -> Result<ObjectRef, HandlerError> {
        Ok(ObjectRef::new(Holder(state)))
    }
}

fn registry() -> Registry {
    Registry::new([Arc::new(HolderHandler) as Arc<dyn Handler>]).unwrap()
}

fn decode(node: &Node) -> Result<Value> {
    let registry = registry();
    Decoder::<DefaultConfig>::new(&registry).decode(node)
}

fn int(i: i64) -> Node { Node::primitive(Primitive::Int(i)) }

fn items(kind: CollectionKind, id: Option<u64>, items: Vec<Node>) -> Node {
    Node::collection(kind, id.map(Id::new), Elements::Items(items))
}

fn reference(id: u64) -> Node { Node::reference(Id::new(id)) }

#[test]
fn forward_reference_to_list_resolves() {
    let node = items(
        CollectionKind::List,
        Some(1),
        vec![reference(2), items(CollectionKind::List, Some(2), vec![int(1)])],
    );

    let value = decode(&node).unwrap();
    let root = value.as_list().unwrap();
    let first = root.get(0).unwrap();
    let second = root.get(1).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.as_list().unwrap().get(0), Some(Value::Int(1)));
}

#[test]
fn forward_reference_to_tuple_is_built_on_demand() {
    let node = items(
        CollectionKind::List,
        Some(1),
        vec![reference(2), items(CollectionKind::Tuple, Some(2), vec![int(1)])],
    );

    let value = decode(&node).unwrap();
    let root = value.as_list().unwrap();
    let first = root.get(0).unwrap();
    let second = root.get(1).unwrap();

    assert!(first.as_tuple().unwrap().ptr_eq(second.as_tuple().unwrap()));
}

#[test]
fn self_referencing_tuple_is_rejected() {
    let node = items(CollectionKind::Tuple, Some(1), vec![reference(1)]);

    let error = decode(&node).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ImmutableCycleUnsupported);
    assert_eq!(error.path().to_string(), "$[0]");
    assert_eq!(error.snapshot(), Some("@1"));
}

#[test]
fn unregistered_reference_is_malformed() {
    let node = items(CollectionKind::List, Some(1), vec![int(0), reference(9)]);

    let error = decode(&node).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::MalformedReference);
    assert_eq!(error.path().to_string(), "$[1]");
    assert_eq!(error.message(), "reference to unregistered id #9");
}

#[test]
fn unknown_handler_is_unresolved() {
    let node = Node::tagged("app::Socket", "socket", Some(Id::new(1)), int(0));

    let error = decode(&node).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::UnresolvedHandler);
    assert_eq!(error.handler(), Some("socket"));
    assert_eq!(error.type_name(), Some("app::Socket"));
}

#[test]
fn id_with_two_shapes_is_malformed() {
    let node = items(
        CollectionKind::List,
        Some(1),
        vec![Node::collection(
            CollectionKind::Map,
            Some(Id::new(1)),
            Elements::Entries(Vec::new()),
        )],
    );

    let error = decode(&node).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::MalformedNode);
}

#[test]
fn map_with_items_is_malformed() {
    let node = items(CollectionKind::Map, Some(1), vec![int(1)]);

    let error = decode(&node).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::MalformedNode);
    assert_eq!(error.message(), "a map cannot hold items");
}

#[test]
fn duplicated_copies_collapse() {
    let node = items(
        CollectionKind::List,
        Some(1),
        vec![
            items(CollectionKind::List, Some(2), vec![int(1)]),
            items(CollectionKind::List, Some(2), vec![int(1)]),
        ],
    );

    let value = decode(&node).unwrap();
    let root = value.as_list().unwrap();
    assert_eq!(root.get(0), root.get(1));
    assert_eq!(root.get(0).unwrap().as_list().unwrap().len(), 1);
}

#[test]
fn shared_nodes_are_rebuilt_once() {
    let shared = items(CollectionKind::List, None, vec![int(1)]);
    let node = items(CollectionKind::List, None, vec![shared.clone(), shared]);

    let value = decode(&node).unwrap();
    let root = value.as_list().unwrap();
    // one id-less node shared twice is one value
    assert_eq!(root.get(0), root.get(1));
}

#[test]
fn tagged_state_sees_its_own_object() {
    let node = Node::tagged(
        "holder",
        "holder",
        Some(Id::new(1)),
        items(CollectionKind::List, Some(2), vec![reference(1)]),
    );

    let value = decode(&node).unwrap();
    let object = value.as_object().unwrap();
    assert!(!object.is_pending());

    let holder = object.downcast_ref::<Holder>().unwrap();
    let inner = holder.0.as_list().unwrap().get(0).unwrap();
    assert!(inner.as_object().unwrap().ptr_eq(object));
    assert_eq!(value.pending_objects(), 0);
}

#[test]
fn decoder_resets_between_calls() {
    let registry = registry();
    let mut decoder = Decoder::<DefaultConfig>::new(&registry);
    let node = items(CollectionKind::List, Some(1), vec![reference(1)]);

    let first = decoder.decode(&node).unwrap();
    let second = decoder.decode(&node).unwrap();
    assert_ne!(first, second);
    assert!(first.deep_eq(&second));

    // a failed call leaves nothing behind either
    assert!(decoder.decode(&reference(1)).is_err());
    assert!(decoder.decode(&node).is_ok());
}

#[derive(Debug, Clone, Copy, Default)]
struct Shallow;

impl Config for Shallow {
    fn max_depth() -> usize { 3 }
}

#[test]
fn depth_is_bounded() {
    let node = (0..5).fold(int(0), |inner, _| {
        items(CollectionKind::List, None, vec![inner])
    });

    let registry = registry();
    let error = Decoder::<Shallow>::new(&registry).decode(&node).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::DepthExceeded);
    assert_eq!(error.path().to_string(), "$[0][0][0]");
}
