//! Pluggable per-type strategies for opaque objects.
//!
//! The codec knows how to walk primitives and collections on its own. Every
//! [`Value::Object`](crate::Value::Object) is instead delegated to a
//! [`Handler`]: on encode the handler turns the object into a plain *state*
//! value (which may itself contain collections and further objects), on
//! decode it turns that state back into an object.
//!
//! Handlers are kept in a [`Registry`] in a fixed order. The first handler
//! whose [`Handler::can_handle`] accepts an object wins, and the outcome is
//! memoized per payload type for the lifetime of the registry.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use relink::{
//!     ObjectRef, Value,
//!     handler::{Handler, HandlerError, Registry},
//! };
//!
//! struct Celsius(f64);
//!
//! struct CelsiusHandler;
//!
//! impl Handler for CelsiusHandler {
//!     fn name(&self) -> &str { "celsius" }
//!
//!     fn can_handle(&self, object: &ObjectRef) -> bool {
//!         object.is::<Celsius>()
//!     }
//!
//!     fn extract_state(
//!         &self,
//!         object: &ObjectRef,
//!     ) -> Result<Value, HandlerError> {
//!         let celsius =
//!             object.downcast_ref::<Celsius>().ok_or("not a Celsius")?;
//!         Ok(Value::Float(celsius.0))
//!     }
//!
//!     fn reconstruct(&self, state: Value) -> Result<ObjectRef, HandlerError> {
//!         let degrees = state.as_float().ok_or("expected a float")?;
//!         Ok(ObjectRef::new(Celsius(degrees)))
//!     }
//! }
//!
//! let registry = Registry::new([Arc::new(CelsiusHandler) as Arc<dyn Handler>])
//!     .unwrap();
//! let celsius = Value::object(Celsius(21.5));
//! let node = relink::encode(&registry, &celsius).unwrap();
//! let value = relink::decode(&registry, &node).unwrap();
//! let object = value.as_object().unwrap();
//! assert_eq!(object.downcast_ref::<Celsius>().unwrap().0, 21.5);
//! ```

use std::{any::TypeId, error::Error, fmt, sync::Arc};

use dashmap::DashMap;
use fxhash::{FxBuildHasher, FxHashMap};
use tracing::trace;

use crate::value::{ObjectRef, Value};

/// The error type handlers report failures with.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// A strategy for snapshotting and rebuilding one category of objects.
///
/// # Contract
///
/// - [`name`](Handler::name) is written into the IR and used to find the
///   handler again on decode, so it must be stable and unique within a
///   registry.
/// - [`can_handle`](Handler::can_handle) must decide by the payload's type
///   alone: its answer is cached per type.
/// - [`extract_state`](Handler::extract_state) may return any value,
///   including collections holding further objects or the object itself; the
///   encoder walks it like any other value.
/// - [`reconstruct`](Handler::reconstruct) receives the rebuilt state. If the
///   object was part of a cycle, objects in the state that refer back to it
///   may still be placeholders (see
///   [`ObjectRef::is_pending`](crate::ObjectRef::is_pending)); they are
///   filled in once every reconstruction has finished. Handlers must keep
///   such handles rather than look inside them.
pub trait Handler: 'static + Send + Sync {
    /// The stable name recorded in the IR.
    fn name(&self) -> &str;

    /// Returns `true` if this handler takes care of `object`.
    fn can_handle(&self, object: &ObjectRef) -> bool;

    /// Produces a plain value describing `object`.
    ///
    /// # Errors
    ///
    /// Any error is reported as a handler extraction failure.
    fn extract_state(&self, object: &ObjectRef) -> Result<Value, HandlerError>;

    /// Builds a new object from a state produced by
    /// [`extract_state`](Handler::extract_state).
    ///
    /// # Errors
    ///
    /// Any error is reported as a handler reconstruction failure.
    fn reconstruct(&self, state: Value) -> Result<ObjectRef, HandlerError>;
}

/// Errors raised while building a [`Registry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Two handlers share a name, so decode could not tell them apart.
    #[error("handler name `{0}` is registered more than once")]
    DuplicateHandler(String),
}

/// An ordered set of handlers with a per-type resolution cache.
///
/// The registry is `Send + Sync`; share it between threads behind an [`Arc`].
pub struct Registry {
    handlers: Vec<Arc<dyn Handler>>,
    by_name: FxHashMap<String, usize>,
    resolved: DashMap<TypeId, Option<usize>, FxBuildHasher>,
}

impl Registry {
    /// Creates a registry trying `handlers` in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateHandler`] if two handlers report the
    /// same name.
    pub fn new(
        handlers: impl IntoIterator<Item = Arc<dyn Handler>>,
    ) -> Result<Self, RegistryError> {
        let handlers: Vec<_> = handlers.into_iter().collect();
        let mut by_name = FxHashMap::default();

        for (index, handler) in handlers.iter().enumerate() {
            let name = handler.name().to_owned();
            if by_name.contains_key(&name) {
                return Err(RegistryError::DuplicateHandler(name));
            }
            by_name.insert(name, index);
        }

        Ok(Self {
            handlers,
            by_name,
            resolved: DashMap::with_hasher(FxBuildHasher::default()),
        })
    }

    /// Creates a registry with no handlers.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
            by_name: FxHashMap::default(),
            resolved: DashMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Finds the handler for `object`: the first in registration order whose
    /// [`Handler::can_handle`] accepts it.
    ///
    /// Placeholders have no payload type and never resolve.
    pub fn resolve(&self, object: &ObjectRef) -> Option<&dyn Handler> {
        let type_id = object.payload_type_id()?;

        let cached = self.resolved.get(&type_id).map(|entry| *entry);
        let index = if let Some(index) = cached {
            trace!(
                type_name = object.type_name(),
                ?index,
                "resolution cache hit"
            );
            index
        } else {
            let index = self.handlers.iter().position(|h| h.can_handle(object));
            trace!(type_name = object.type_name(), ?index, "resolved handler");
            self.resolved.insert(type_id, index);
            index
        };

        index.and_then(|index| self.handlers.get(index)).map(|h| &**h)
    }

    /// Looks a handler up by its IR name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&dyn Handler> {
        self.by_name
            .get(name)
            .and_then(|&index| self.handlers.get(index))
            .map(|h| &**h)
    }

    /// Returns the number of payload types resolved so far, including those
    /// that resolved to no handler.
    #[must_use]
    pub fn cached_resolutions(&self) -> usize { self.resolved.len() }

    /// Returns the handler names in dispatch order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|h| h.name())
    }

    /// Returns the number of handlers.
    #[must_use]
    pub fn len(&self) -> usize { self.handlers.len() }

    /// Returns `true` if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.handlers.is_empty() }
}

impl Default for Registry {
    fn default() -> Self { Self::empty() }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("handlers", &self.names().collect::<Vec<_>>())
            .field("cached_resolutions", &self.cached_resolutions())
            .finish()
    }
}
