//! Graph builders shared by the relink benchmarks.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]

use std::sync::Arc;

use relink::{
    Codec, ObjectRef, Value,
    handler::{Handler, HandlerError, Registry},
};

/// A small opaque record.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub id: i64,
    pub weight: f64,
}

#[derive(Debug, Default)]
pub struct SampleHandler;

impl Handler for SampleHandler {
    fn name(&self) -> &str { "sample" }

    fn can_handle(&self, object: &ObjectRef) -> bool { object.is::<Sample>() }

    fn extract_state(&self, object: &ObjectRef) -> Result<Value, HandlerError> {
        let sample = object.downcast_ref::<Sample>().ok_or("not a sample")?;
        Ok(Value::tuple([Value::Int(sample.id), Value::Float(sample.weight)]))
    }

    fn reconstruct(&self, state: Value) -> Result<ObjectRef, HandlerError> {
        let tuple = state.as_tuple().ok_or("sample state must be a tuple")?;
        match tuple.items() {
            [Value::Int(id), Value::Float(weight)] => {
                Ok(ObjectRef::new(Sample { id: *id, weight: *weight }))
            }
            _ => Err("sample state must be (int, float)".into()),
        }
    }
}

#[must_use]
pub fn create_codec() -> Codec {
    Codec::new(
        Registry::new([Arc::new(SampleHandler) as Arc<dyn Handler>])
            .expect("a single handler has a unique name"),
    )
}

/// Builds a ring of `nodes` records. Every node is a map holding a payload
/// object, a shared tag list and the next node, and the last node closes the
/// ring back to the first.
#[must_use]
pub fn ring(nodes: usize) -> Value {
    let tags = Value::list([Value::from("hot"), Value::from("cold")]);
    let first = Value::map([("index", 0)]);
    let mut current = first.clone();

    for index in 0..nodes {
        let map = current.as_map().expect("ring nodes are maps");
        let id = i64::try_from(index).unwrap_or(i64::MAX);

        map.insert(
            Value::from("payload"),
            Value::object(Sample { id, weight: 0.5 }),
        );
        map.insert(Value::from("tags"), tags.clone());

        let next = if index + 1 == nodes {
            first.clone()
        } else {
            Value::map([("index", Value::Int(id + 1))])
        };
        map.insert(Value::from("next"), next.clone());
        current = next;
    }

    first
}

/// Builds `width` independent lists of `depth` small integers each.
#[must_use]
pub fn forest(width: usize, depth: usize) -> Value {
    Value::list((0..width).map(|tree| {
        Value::list((0..depth).map(|leaf| {
            Value::Int(i64::try_from(tree * depth + leaf).unwrap_or(i64::MAX))
        }))
    }))
}
