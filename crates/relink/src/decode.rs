//! IR to graph.
//!
//! Decoding runs in two passes over the tree.
//!
//! 1. **Registration** walks every node once and seats a placeholder for
//!    each id: mutable collections get their final, still empty container,
//!    tagged nodes get a pending [`ObjectRef`], immutable collections are
//!    remembered so they can be built on first use. Nothing is rebuilt yet,
//!    so afterwards every reference, backward or forward, has something to
//!    resolve to.
//! 2. **Reconstruction** rebuilds the tree depth-first. Containers are
//!    filled in place and pending objects are filled with the payload their
//!    handler reconstructs, so every handle handed out during the walk ends
//!    up pointing at the real value without any patching.
//!
//! Every id's [`Slot`](arena::Slot) only moves forward; once the walk is
//! done every slot must hold its real value.

mod arena;

use std::{marker::PhantomData, sync::Arc};

use fxhash::{FxHashMap, FxHashSet};
use tracing::{debug, instrument};

use self::arena::{Arena, Slot};
use crate::{
    config::{Config, DefaultConfig},
    diagnostic::{Breadcrumb, Path},
    error::{Error, ErrorKind, Result},
    handler::Registry,
    ir::{Collection, CollectionKind, Elements, Id, Node, NodeKind, Tagged},
    value::{ListRef, MapRef, ObjectRef, SetRef, TupleRef, Value},
};

/// Converts IR trees back into value graphs.
///
/// A decoder may be reused; all bookkeeping is reset at the start and end
/// of every [`decode`](Decoder::decode) call.
#[derive(Debug)]
pub struct Decoder<'r, C: Config = DefaultConfig> {
    registry: &'r Registry,
    arena: Arena,
    /// Values already rebuilt, by node address.
    built: FxHashMap<usize, Value>,
    _config: PhantomData<C>,
}

impl<'r, C: Config> Decoder<'r, C> {
    /// Creates a decoder looking handlers up in `registry`.
    #[must_use]
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            arena: Arena::default(),
            built: FxHashMap::default(),
            _config: PhantomData,
        }
    }

    /// Rebuilds the graph described by `node`.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::MalformedReference`] for a reference to an id no node
    ///   carries,
    /// - [`ErrorKind::UnresolvedHandler`] for a tagged node naming an unknown
    ///   handler,
    /// - [`ErrorKind::HandlerReconstructionFailed`] if a handler fails,
    /// - [`ErrorKind::ImmutableCycleUnsupported`] if a tuple or frozen set
    ///   contains itself,
    /// - [`ErrorKind::MalformedNode`] for an id shared by nodes of different
    ///   shapes or a collection whose elements do not fit its kind,
    /// - [`ErrorKind::DepthExceeded`] if the tree nests deeper than
    ///   [`Config::max_depth`].
    #[instrument(skip_all, level = "debug", name = "decode", target = "relink")]
    pub fn decode(&mut self, node: &Node) -> Result<Value> {
        self.reset();
        let result = self.decode_tree(node);
        self.reset();
        result
    }

    fn reset(&mut self) {
        self.arena.clear();
        self.built.clear();
    }

    fn decode_tree(&mut self, root: &Node) -> Result<Value> {
        let mut path = Path::root();

        self.register(root, &path)?;
        let value = self.rebuild(root, &mut path)?;
        self.arena.verify(&path)?;

        debug!(
            ids = self.arena.len(),
            nodes = self.built.len(),
            "decoded graph"
        );
        Ok(value)
    }

    // =========================================================================
    // Pass 1: registration
    // =========================================================================

    fn register(&mut self, root: &Node, path: &Path) -> Result<()> {
        let mut visited = FxHashSet::default();
        let mut stack = vec![root];

        while let Some(node) = stack.pop() {
            if !visited.insert(node.address()) {
                continue;
            }
            stack.extend(node.children());

            let (id, slot) = match node.kind() {
                NodeKind::Collection(Collection {
                    kind, id: Some(id), ..
                }) => {
                    let slot = empty_container(*kind).map_or_else(
                        || Slot::Deferred(node.clone()),
                        Slot::Vacant,
                    );
                    (*id, slot)
                }
                NodeKind::Tagged(Tagged { type_name, id: Some(id), .. }) => {
                    let pending = ObjectRef::pending(Arc::clone(type_name));
                    (*id, Slot::Vacant(Value::Object(pending)))
                }
                _ => continue,
            };

            self.arena
                .seat(id, slot, path)
                .map_err(|error| error.with_snapshot(self.snapshot(node)))?;
        }

        Ok(())
    }

    // =========================================================================
    // Pass 2: reconstruction
    // =========================================================================

    fn rebuild(&mut self, node: &Node, path: &mut Path) -> Result<Value> {
        if let NodeKind::Primitive(primitive) = node.kind() {
            return Ok(primitive.to_value());
        }

        if path.depth() >= C::max_depth() {
            return Err(Error::new(
                ErrorKind::DepthExceeded,
                path,
                format!("nesting exceeds the limit of {}", C::max_depth()),
            )
            .with_snapshot(self.snapshot(node)));
        }

        if let Some(value) = self.built.get(&node.address()) {
            return Ok(value.clone());
        }

        let value = match node.kind() {
            NodeKind::Primitive(primitive) => primitive.to_value(),
            NodeKind::Reference(id) => {
                return self.resolve_reference(*id, node, path);
            }
            NodeKind::Collection(collection) => {
                self.rebuild_collection(node, collection, path)?
            }
            NodeKind::Tagged(tagged) => {
                self.rebuild_tagged(node, tagged, path)?
            }
        };

        self.built.insert(node.address(), value.clone());
        Ok(value)
    }

    fn resolve_reference(
        &mut self,
        id: Id,
        node: &Node,
        path: &mut Path,
    ) -> Result<Value> {
        let target = match self.arena.get(id) {
            Some(
                Slot::Vacant(value) | Slot::Filling(value) | Slot::Real(value),
            ) => {
                return Ok(value.clone());
            }
            Some(Slot::Deferred(target)) => target.clone(),
            Some(Slot::Building) => {
                return Err(Error::new(
                    ErrorKind::ImmutableCycleUnsupported,
                    path,
                    format!("immutable collection {id} contains itself"),
                )
                .with_snapshot(self.snapshot(node)));
            }
            None => {
                return Err(Error::new(
                    ErrorKind::MalformedReference,
                    path,
                    format!("reference to unregistered id {id}"),
                )
                .with_snapshot(self.snapshot(node)));
            }
        };

        // forward reference to a tuple or frozen set: build it right here
        self.rebuild(&target, path)
    }

    fn rebuild_collection(
        &mut self,
        node: &Node,
        collection: &Collection,
        path: &mut Path,
    ) -> Result<Value> {
        let Some(id) = collection.id else {
            return match empty_container(collection.kind) {
                Some(container) => {
                    self.fill(&container, node, collection, path)?;
                    Ok(container)
                }
                None => self.build_immutable(node, collection, path),
            };
        };

        if collection.kind.is_mutable() {
            let container = match self.arena.get(id) {
                Some(Slot::Vacant(container)) => container.clone(),
                // another copy of the same id: collapse onto the first
                Some(Slot::Filling(value) | Slot::Real(value)) => {
                    return Ok(value.clone());
                }
                _ => return Err(self.unexpected_slot(node, path)),
            };

            self.arena.advance(id, Slot::Filling(container.clone()), path)?;
            self.fill(&container, node, collection, path)?;
            self.arena.advance(id, Slot::Real(container.clone()), path)?;
            return Ok(container);
        }

        match self.arena.get(id) {
            Some(Slot::Deferred(_)) => {}
            Some(Slot::Real(value)) => return Ok(value.clone()),
            Some(Slot::Building) => {
                return Err(Error::new(
                    ErrorKind::ImmutableCycleUnsupported,
                    path,
                    format!("immutable collection {id} contains itself"),
                )
                .with_type(collection.kind.name())
                .with_snapshot(self.snapshot(node)));
            }
            _ => return Err(self.unexpected_slot(node, path)),
        }

        self.arena.advance(id, Slot::Building, path)?;
        let value = self.build_immutable(node, collection, path)?;
        self.arena.advance(id, Slot::Real(value.clone()), path)?;
        Ok(value)
    }

    fn fill(
        &mut self,
        container: &Value,
        node: &Node,
        collection: &Collection,
        path: &mut Path,
    ) -> Result<()> {
        match (container, &collection.elements) {
            (Value::List(list), Elements::Items(items)) => {
                for (index, item) in items.iter().enumerate() {
                    let value = path.scoped(Breadcrumb::Index(index), |path| {
                        self.rebuild(item, path)
                    })?;
                    list.push(value);
                }
            }
            (Value::Set(set), Elements::Items(items)) => {
                for (index, item) in items.iter().enumerate() {
                    let value = path.scoped(Breadcrumb::Index(index), |path| {
                        self.rebuild(item, path)
                    })?;
                    set.insert(value);
                }
            }
            (Value::Map(map), Elements::Entries(entries)) => {
                for (index, (key, value)) in entries.iter().enumerate() {
                    let key = path.scoped(Breadcrumb::KeyOf(index), |path| {
                        self.rebuild(key, path)
                    })?;
                    let value = path.scoped(Breadcrumb::for_key(&key), |path| {
                        self.rebuild(value, path)
                    })?;
                    map.insert(key, value);
                }
            }
            _ => return Err(self.mismatched_elements(node, collection, path)),
        }

        Ok(())
    }

    fn build_immutable(
        &mut self,
        node: &Node,
        collection: &Collection,
        path: &mut Path,
    ) -> Result<Value> {
        let Elements::Items(items) = &collection.elements else {
            return Err(self.mismatched_elements(node, collection, path));
        };

        let values = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                path.scoped(Breadcrumb::Index(index), |path| {
                    self.rebuild(item, path)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        match collection.kind {
            CollectionKind::Tuple => Ok(Value::Tuple(TupleRef::new(values))),
            CollectionKind::FrozenSet => Ok(Value::frozen_set(values)),
            _ => Err(self.mismatched_elements(node, collection, path)),
        }
    }

    fn rebuild_tagged(
        &mut self,
        node: &Node,
        tagged: &Tagged,
        path: &mut Path,
    ) -> Result<Value> {
        let registry = self.registry;
        let Some(handler) = registry.by_name(&tagged.handler) else {
            return Err(Error::new(
                ErrorKind::UnresolvedHandler,
                path,
                format!("no handler named `{}` is registered", tagged.handler),
            )
            .with_type(Arc::clone(&tagged.type_name))
            .with_handler(Arc::clone(&tagged.handler))
            .with_snapshot(self.snapshot(node)));
        };

        let placeholder = match tagged.id {
            None => None,
            Some(id) => {
                let placeholder = match self.arena.get(id) {
                    Some(Slot::Vacant(Value::Object(pending))) => {
                        pending.clone()
                    }
                    Some(Slot::Filling(value) | Slot::Real(value)) => {
                        return Ok(value.clone());
                    }
                    _ => return Err(self.unexpected_slot(node, path)),
                };
                self.arena.advance(
                    id,
                    Slot::Filling(Value::Object(placeholder.clone())),
                    path,
                )?;
                Some((id, placeholder))
            }
        };

        let state = path
            .scoped(Breadcrumb::State(Arc::clone(&tagged.type_name)), |path| {
                self.rebuild(&tagged.state, path)
            })?;

        let reconstruction_error = |message: String| {
            Error::new(ErrorKind::HandlerReconstructionFailed, path, message)
                .with_type(Arc::clone(&tagged.type_name))
                .with_handler(Arc::clone(&tagged.handler))
                .with_snapshot(self.snapshot(node))
        };

        let object = handler.reconstruct(state).map_err(|source| {
            reconstruction_error(format!(
                "handler `{}` failed to rebuild `{}`",
                tagged.handler, tagged.type_name
            ))
            .with_source(source)
        })?;

        if object.is_pending() {
            return Err(reconstruction_error(format!(
                "handler `{}` returned a placeholder",
                tagged.handler
            )));
        }

        let Some((id, placeholder)) = placeholder else {
            return Ok(Value::Object(object));
        };

        if !placeholder.fill_from(&object) {
            return Err(Error::new(
                ErrorKind::Inconsistent,
                path,
                format!("placeholder for {id} was filled twice"),
            ));
        }

        let value = Value::Object(placeholder);
        self.arena.advance(id, Slot::Real(value.clone()), path)?;
        Ok(value)
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    fn snapshot(&self, node: &Node) -> String {
        node.snapshot(C::snapshot_limit())
    }

    fn mismatched_elements(
        &self,
        node: &Node,
        collection: &Collection,
        path: &Path,
    ) -> Error {
        let found = match collection.elements {
            Elements::Items(_) => "items",
            Elements::Entries(_) => "entries",
        };
        Error::new(
            ErrorKind::MalformedNode,
            path,
            format!("a {} cannot hold {found}", collection.kind),
        )
        .with_type(collection.kind.name())
        .with_snapshot(self.snapshot(node))
    }

    fn unexpected_slot(&self, node: &Node, path: &Path) -> Error {
        let id = node.id().map_or_else(|| "?".to_owned(), |id| id.to_string());
        Error::new(
            ErrorKind::Inconsistent,
            path,
            format!("slot for id {id} is in an unexpected state"),
        )
        .with_snapshot(self.snapshot(node))
    }
}

fn empty_container(kind: CollectionKind) -> Option<Value> {
    match kind {
        CollectionKind::List => Some(Value::List(ListRef::default())),
        CollectionKind::Set => Some(Value::Set(SetRef::default())),
        CollectionKind::Map => Some(Value::Map(MapRef::default())),
        CollectionKind::Tuple | CollectionKind::FrozenSet => None,
    }
}

#[cfg(test)]
mod test;
