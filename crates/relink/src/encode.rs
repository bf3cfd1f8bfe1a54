//! Graph to IR.
//!
//! The [`Encoder`] walks a [`Value`] graph depth-first. Primitives become
//! primitive nodes directly. Every identity-capable value is given an id the
//! first time it is met, *before* its children are walked, so a child that
//! leads back to it (a cycle) or a later sibling that shares it both become
//! [`Reference`](crate::ir::NodeKind::Reference) nodes. Objects are handed to
//! the handler the [`Registry`] resolves for them and the returned state is
//! walked like any other value.
//!
//! Immutable collections only keep their id when something references them;
//! a final pass strips the ids nobody used.

use std::{marker::PhantomData, sync::Arc};

use fxhash::FxHashSet;
use tracing::{debug, instrument};

use crate::{
    config::{Config, DefaultConfig},
    diagnostic::{self, Breadcrumb, Path},
    error::{Error, ErrorKind, Result},
    handler::Registry,
    identity::{IdentityTracker, Visit},
    ir::{CollectionKind, Elements, Id, Node, NodeKind, Primitive},
    value::{ObjectRef, Value},
};

/// Converts value graphs into IR trees.
///
/// An encoder may be reused; ids are scoped to a single
/// [`encode`](Encoder::encode) call and restart at `#1` every time.
#[derive(Debug)]
pub struct Encoder<'r, C: Config = DefaultConfig> {
    registry: &'r Registry,
    tracker: IdentityTracker,
    /// Ids of the tuples and frozen sets currently being walked.
    open_immutable: FxHashSet<Id>,
    _config: PhantomData<C>,
}

impl<'r, C: Config> Encoder<'r, C> {
    /// Creates an encoder dispatching objects through `registry`.
    #[must_use]
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            tracker: IdentityTracker::default(),
            open_immutable: FxHashSet::default(),
            _config: PhantomData,
        }
    }

    /// Encodes the graph rooted at `value`.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::UnsupportedType`] if an object has no handler,
    /// - [`ErrorKind::HandlerExtractionFailed`] if a handler fails,
    /// - [`ErrorKind::DepthExceeded`] if the graph nests deeper than
    ///   [`Config::max_depth`],
    /// - [`ErrorKind::ImmutableCycleUnsupported`] if a tuple or frozen set
    ///   contains itself.
    #[instrument(skip_all, level = "debug", name = "encode", target = "relink")]
    pub fn encode(&mut self, value: &Value) -> Result<Node> {
        self.reset();

        let mut path = Path::root();
        let result = self
            .encode_value(value, &mut path)
            .map(|node| self.prune(&node).unwrap_or(node));

        if result.is_ok() {
            debug!(ids = self.tracker.len(), "encoded graph");
        }

        self.reset();
        result
    }

    fn reset(&mut self) {
        self.tracker.reset();
        self.open_immutable.clear();
    }

    fn encode_value(&mut self, value: &Value, path: &mut Path) -> Result<Node> {
        if let Some(primitive) = Primitive::from_value(value) {
            return Ok(Node::primitive(primitive));
        }

        if path.depth() >= C::max_depth() {
            return Err(Error::new(
                ErrorKind::DepthExceeded,
                path,
                format!("nesting exceeds the limit of {}", C::max_depth()),
            )
            .with_type(value.type_name())
            .with_snapshot(Self::snapshot(value)));
        }

        match self.tracker.visit(value) {
            Some(Visit::Seen(id)) => {
                if self.open_immutable.contains(&id) {
                    return Err(Error::new(
                        ErrorKind::ImmutableCycleUnsupported,
                        path,
                        format!("{} {id} contains itself", value.type_name()),
                    )
                    .with_type(value.type_name())
                    .with_snapshot(Self::snapshot(value)));
                }
                Ok(Node::reference(id))
            }
            Some(Visit::Fresh(id)) => self.encode_fresh(id, value, path),
            None => Err(Error::new(
                ErrorKind::Inconsistent,
                path,
                "shared value reported no identity",
            )),
        }
    }

    fn encode_fresh(
        &mut self,
        id: Id,
        value: &Value,
        path: &mut Path,
    ) -> Result<Node> {
        match value {
            Value::List(list) => self.encode_items(
                CollectionKind::List,
                id,
                &list.snapshot(),
                path,
            ),
            Value::Set(set) => self.encode_items(
                CollectionKind::Set,
                id,
                &set.snapshot(),
                path,
            ),
            Value::Tuple(tuple) => self.encode_immutable(
                CollectionKind::Tuple,
                id,
                tuple.items(),
                path,
            ),
            Value::FrozenSet(set) => self.encode_immutable(
                CollectionKind::FrozenSet,
                id,
                set.items(),
                path,
            ),
            Value::Map(map) => self.encode_entries(id, &map.entries(), path),
            Value::Object(object) => self.encode_object(id, object, path),
            primitive => Err(Error::new(
                ErrorKind::Inconsistent,
                path,
                "primitive was assigned an id",
            )
            .with_type(primitive.type_name())),
        }
    }

    fn encode_items(
        &mut self,
        kind: CollectionKind,
        id: Id,
        items: &[Value],
        path: &mut Path,
    ) -> Result<Node> {
        let nodes = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                path.scoped(Breadcrumb::Index(index), |path| {
                    self.encode_value(item, path)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Node::collection(kind, Some(id), Elements::Items(nodes)))
    }

    fn encode_immutable(
        &mut self,
        kind: CollectionKind,
        id: Id,
        items: &[Value],
        path: &mut Path,
    ) -> Result<Node> {
        self.open_immutable.insert(id);
        let result = self.encode_items(kind, id, items, path);
        self.open_immutable.remove(&id);
        result
    }

    fn encode_entries(
        &mut self,
        id: Id,
        entries: &[(Value, Value)],
        path: &mut Path,
    ) -> Result<Node> {
        let mut nodes = Vec::with_capacity(entries.len());

        for (index, (key, value)) in entries.iter().enumerate() {
            let key_node = path.scoped(Breadcrumb::KeyOf(index), |path| {
                self.encode_value(key, path)
            })?;

            let value_node = path.scoped(Breadcrumb::for_key(key), |path| {
                self.encode_value(value, path)
            })?;

            nodes.push((key_node, value_node));
        }

        Ok(Node::collection(
            CollectionKind::Map,
            Some(id),
            Elements::Entries(nodes),
        ))
    }

    fn encode_object(
        &mut self,
        id: Id,
        object: &ObjectRef,
        path: &mut Path,
    ) -> Result<Node> {
        let registry = self.registry;
        let Some(handler) = registry.resolve(object) else {
            let message = if object.is_pending() {
                format!("`{}` is an unfilled placeholder", object.type_name())
            } else {
                format!("no handler accepts `{}`", object.type_name())
            };
            return Err(Error::new(ErrorKind::UnsupportedType, path, message)
                .with_type(object.type_name())
                .with_snapshot(Self::snapshot(&Value::Object(object.clone()))));
        };

        let state = handler.extract_state(object).map_err(|source| {
            Error::new(
                ErrorKind::HandlerExtractionFailed,
                path,
                format!(
                    "handler `{}` failed to extract `{}`",
                    handler.name(),
                    object.type_name()
                ),
            )
            .with_type(object.type_name())
            .with_handler(handler.name())
            .with_snapshot(Self::snapshot(&Value::Object(object.clone())))
            .with_source(source)
        })?;

        let type_name: Arc<str> = Arc::from(object.type_name());
        let state = path
            .scoped(Breadcrumb::State(Arc::clone(&type_name)), |path| {
                self.encode_value(&state, path)
            })?;

        Ok(Node::tagged(type_name, handler.name(), Some(id), state))
    }

    fn snapshot(value: &Value) -> String {
        diagnostic::snapshot(format_args!("{value:?}"), C::snapshot_limit())
    }

    /// Rebuilds `node` without the ids of unreferenced immutable
    /// collections, returning `None` when nothing had to change.
    fn prune(&self, node: &Node) -> Option<Node> {
        match node.kind() {
            NodeKind::Primitive(_) | NodeKind::Reference(_) => None,

            NodeKind::Collection(collection) => {
                let elements = match &collection.elements {
                    Elements::Items(items) => {
                        self.prune_items(items).map(Elements::Items)
                    }
                    Elements::Entries(entries) => {
                        self.prune_entries(entries).map(Elements::Entries)
                    }
                };
                let id = collection.id.filter(|&id| {
                    collection.kind.is_mutable()
                        || self.tracker.is_referenced(id)
                });

                if elements.is_none() && id == collection.id {
                    return None;
                }

                Some(Node::collection(
                    collection.kind,
                    id,
                    elements.unwrap_or_else(|| collection.elements.clone()),
                ))
            }

            NodeKind::Tagged(tagged) => self.prune(&tagged.state).map(|state| {
                Node::tagged(
                    Arc::clone(&tagged.type_name),
                    Arc::clone(&tagged.handler),
                    tagged.id,
                    state,
                )
            }),
        }
    }

    fn prune_items(&self, items: &[Node]) -> Option<Vec<Node>> {
        let mut rebuilt: Option<Vec<Node>> = None;
        for (index, item) in items.iter().enumerate() {
            if let Some(pruned) = self.prune(item) {
                rebuilt.get_or_insert_with(|| items.to_vec())[index] = pruned;
            }
        }
        rebuilt
    }

    fn prune_entries(
        &self,
        entries: &[(Node, Node)],
    ) -> Option<Vec<(Node, Node)>> {
        let mut rebuilt: Option<Vec<(Node, Node)>> = None;
        for (index, (key, value)) in entries.iter().enumerate() {
            let key = self.prune(key);
            let value = self.prune(value);
            if key.is_none() && value.is_none() {
                continue;
            }

            let entry = &mut rebuilt.get_or_insert_with(|| entries.to_vec())
                [index];
            if let Some(key) = key {
                entry.0 = key;
            }
            if let Some(value) = value {
                entry.1 = value;
            }
        }
        rebuilt
    }
}
