//! Per-id placeholder slots for the decoder.

use fxhash::FxHashMap;

use crate::{
    diagnostic::Path,
    error::{Error, ErrorKind, Result},
    ir::{CollectionKind, Id, Node, NodeKind},
    value::Value,
};

/// The state of one id during a decode call.
///
/// Slots only move forward: registered (`Vacant`, `Deferred`), in progress
/// (`Filling`, `Building`), then `Real`.
#[derive(Debug)]
pub(super) enum Slot {
    /// Holds the handle every reference receives: an empty mutable container
    /// or a pending object.
    Vacant(Value),
    /// An immutable collection, built on first use from this node.
    Deferred(Node),
    /// The handle of a container or object whose contents are being rebuilt.
    Filling(Value),
    /// An immutable collection whose elements are being built.
    Building,
    /// The finished value.
    Real(Value),
}

/// What an id stands for, so two nodes claiming the same id can be checked
/// against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Collection(CollectionKind),
    Tagged,
}

impl Shape {
    fn of_node(node: &Node) -> Option<Self> {
        match node.kind() {
            NodeKind::Collection(collection) => {
                Some(Self::Collection(collection.kind))
            }
            NodeKind::Tagged(_) => Some(Self::Tagged),
            NodeKind::Primitive(_) | NodeKind::Reference(_) => None,
        }
    }

    const fn of_value(value: &Value) -> Option<Self> {
        Some(match value {
            Value::List(_) => Self::Collection(CollectionKind::List),
            Value::Set(_) => Self::Collection(CollectionKind::Set),
            Value::Map(_) => Self::Collection(CollectionKind::Map),
            Value::Tuple(_) => Self::Collection(CollectionKind::Tuple),
            Value::FrozenSet(_) => Self::Collection(CollectionKind::FrozenSet),
            Value::Object(_) => Self::Tagged,
            _ => return None,
        })
    }
}

impl Slot {
    const fn stage(&self) -> u8 {
        match self {
            Self::Vacant(_) | Self::Deferred(_) => 1,
            Self::Filling(_) | Self::Building => 2,
            Self::Real(_) => 3,
        }
    }

    fn shape(&self) -> Option<Shape> {
        match self {
            Self::Vacant(value) | Self::Filling(value) | Self::Real(value) => {
                Shape::of_value(value)
            }
            Self::Deferred(node) => Shape::of_node(node),
            Self::Building => None,
        }
    }

    const fn stage_name(&self) -> &'static str {
        match self {
            Self::Vacant(_) => "vacant",
            Self::Deferred(_) => "deferred",
            Self::Filling(_) => "filling",
            Self::Building => "building",
            Self::Real(_) => "real",
        }
    }
}

/// The placeholder registry: one slot per id seen in the IR.
#[derive(Debug, Default)]
pub(super) struct Arena {
    slots: FxHashMap<Id, Slot>,
}

impl Arena {
    /// Registers `slot` for `id` unless the id already has one.
    ///
    /// A second registration must describe the same shape.
    pub(super) fn seat(
        &mut self,
        id: Id,
        slot: Slot,
        path: &Path,
    ) -> Result<()> {
        match self.slots.get(&id) {
            None => {
                self.slots.insert(id, slot);
                Ok(())
            }
            Some(existing) if existing.shape() == slot.shape() => Ok(()),
            Some(existing) => Err(Error::new(
                ErrorKind::MalformedNode,
                path,
                format!(
                    "id {id} is claimed by both {} and {}",
                    describe(existing.shape()),
                    describe(slot.shape()),
                ),
            )),
        }
    }

    pub(super) fn get(&self, id: Id) -> Option<&Slot> { self.slots.get(&id) }

    /// Moves `id` to `next`, which must be a later stage than its current one.
    pub(super) fn advance(
        &mut self,
        id: Id,
        next: Slot,
        path: &Path,
    ) -> Result<()> {
        let Some(slot) = self.slots.get_mut(&id) else {
            return Err(Error::new(
                ErrorKind::Inconsistent,
                path,
                format!("id {id} was never registered"),
            ));
        };

        if slot.stage() >= next.stage() {
            return Err(Error::new(
                ErrorKind::Inconsistent,
                path,
                format!(
                    "id {id} cannot move from {} to {}",
                    slot.stage_name(),
                    next.stage_name()
                ),
            ));
        }

        *slot = next;
        Ok(())
    }

    /// Checks that every registered id ended up with its real value.
    pub(super) fn verify(&self, path: &Path) -> Result<()> {
        let mut unfinished: Vec<_> = self
            .slots
            .iter()
            .filter(|(_, slot)| !matches!(slot, Slot::Real(_)))
            .map(|(id, slot)| (*id, slot.stage_name()))
            .collect();

        if unfinished.is_empty() {
            return Ok(());
        }

        unfinished.sort_unstable();
        let (id, stage) = unfinished[0];
        Err(Error::new(
            ErrorKind::Inconsistent,
            path,
            format!(
                "{} id(s) never became real, first {id} is still {stage}",
                unfinished.len()
            ),
        ))
    }

    pub(super) fn len(&self) -> usize { self.slots.len() }

    pub(super) fn clear(&mut self) { self.slots.clear(); }
}

fn describe(shape: Option<Shape>) -> String {
    match shape {
        Some(Shape::Collection(kind)) => format!("a {kind}"),
        Some(Shape::Tagged) => "a tagged object".to_owned(),
        None => "an unfinished value".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ListRef;

    #[test]
    fn slots_only_move_forward() {
        let mut arena = Arena::default();
        let path = Path::root();
        let id = Id::new(1);
        let list = Value::List(ListRef::default());

        arena.seat(id, Slot::Vacant(list.clone()), &path).unwrap();
        arena.advance(id, Slot::Filling(list.clone()), &path).unwrap();

        let error =
            arena.advance(id, Slot::Vacant(list.clone()), &path).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Inconsistent);

        assert_eq!(
            arena.verify(&path).unwrap_err().kind(),
            ErrorKind::Inconsistent
        );
        arena.advance(id, Slot::Real(list), &path).unwrap();
        arena.verify(&path).unwrap();
    }

    #[test]
    fn conflicting_shapes_are_malformed() {
        let mut arena = Arena::default();
        let path = Path::root();
        let id = Id::new(7);

        arena.seat(id, Slot::Vacant(Value::list([])), &path).unwrap();
        // same shape again is fine
        arena.seat(id, Slot::Vacant(Value::list([])), &path).unwrap();

        let error = arena
            .seat(id, Slot::Vacant(Value::map::<Value, Value>([])), &path)
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MalformedNode);
        assert_eq!(
            error.message(),
            "id #7 is claimed by both a list and a map"
        );
    }

    #[test]
    fn unknown_ids_cannot_advance() {
        let mut arena = Arena::default();
        let error = arena
            .advance(Id::new(3), Slot::Building, &Path::root())
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Inconsistent);
        assert_eq!(arena.len(), 0);
    }
}
