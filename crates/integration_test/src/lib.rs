//! Common handler fixtures shared by the relink integration tests.
//!
//! This crate provides opaque payload types and the handlers that encode
//! them, covering plain records, cyclic object graphs, locks and live
//! connections.

#![allow(missing_docs)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::missing_errors_doc)]

use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use parking_lot::Mutex;
use relink::{
    Codec, ListRef, MapRef, ObjectRef, Value,
    handler::{Handler, HandlerError, Registry},
};

fn state_map<'a>(state: &'a Value, what: &str) -> Result<&'a MapRef, String> {
    state.as_map().ok_or_else(|| format!("{what} state must be a map"))
}

fn field(map: &MapRef, what: &str, key: &str) -> Result<Value, String> {
    map.get_str(key)
        .ok_or_else(|| format!("{what} state is missing `{key}`"))
}

// ============================================================================
// Point
// ============================================================================

/// A plain record with no references.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Encodes a [`Point`] as `{x, y}`.
#[derive(Debug, Default)]
pub struct PointHandler;

impl Handler for PointHandler {
    fn name(&self) -> &str { "point" }

    fn can_handle(&self, object: &ObjectRef) -> bool { object.is::<Point>() }

    fn extract_state(&self, object: &ObjectRef) -> Result<Value, HandlerError> {
        let point = object.downcast_ref::<Point>().ok_or("not a point")?;
        Ok(Value::map([("x", point.x), ("y", point.y)]))
    }

    fn reconstruct(&self, state: Value) -> Result<ObjectRef, HandlerError> {
        let map = state_map(&state, "point")?;
        let coordinate = |key| {
            field(map, "point", key)?
                .as_float()
                .ok_or_else(|| format!("point `{key}` must be a float"))
        };

        Ok(ObjectRef::new(Point { x: coordinate("x")?, y: coordinate("y")? }))
    }
}

// ============================================================================
// Vertex
// ============================================================================

/// A graph vertex whose outgoing links live in a shared list, so vertices
/// can point at each other.
#[derive(Debug)]
pub struct Vertex {
    pub label: String,
    pub links: ListRef,
}

impl Vertex {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), links: ListRef::default() }
    }

    /// Adds an edge to `other`.
    pub fn link(&self, other: &ObjectRef) {
        self.links.push(Value::Object(other.clone()));
    }

    /// Returns the vertices this one links to.
    pub fn linked(&self) -> Vec<ObjectRef> {
        self.links
            .snapshot()
            .iter()
            .filter_map(|value| value.as_object().cloned())
            .collect()
    }
}

/// Creates two vertices `X` and `Y` that link to each other.
pub fn vertex_pair() -> (ObjectRef, ObjectRef) {
    let x = ObjectRef::new(Vertex::new("X"));
    let y = ObjectRef::new(Vertex::new("Y"));

    for (from, to) in [(&x, &y), (&y, &x)] {
        if let Some(vertex) = from.downcast_ref::<Vertex>() {
            vertex.link(to);
        }
    }

    (x, y)
}

/// Encodes a [`Vertex`] as `{label, links}`, handing the link list itself to
/// the codec.
#[derive(Debug, Default)]
pub struct VertexHandler;

impl Handler for VertexHandler {
    fn name(&self) -> &str { "vertex" }

    fn can_handle(&self, object: &ObjectRef) -> bool { object.is::<Vertex>() }

    fn extract_state(&self, object: &ObjectRef) -> Result<Value, HandlerError> {
        let vertex = object.downcast_ref::<Vertex>().ok_or("not a vertex")?;
        Ok(Value::map([
            ("label", Value::from(vertex.label.as_str())),
            ("links", Value::List(vertex.links.clone())),
        ]))
    }

    fn reconstruct(&self, state: Value) -> Result<ObjectRef, HandlerError> {
        let map = state_map(&state, "vertex")?;
        let label = field(map, "vertex", "label")?;
        let links = field(map, "vertex", "links")?;

        Ok(ObjectRef::new(Vertex {
            label: label.as_str().ok_or("vertex label must be text")?.into(),
            links: links
                .as_list()
                .ok_or("vertex links must be a list")?
                .clone(),
        }))
    }
}

// ============================================================================
// Locks
// ============================================================================

/// A counter behind a lock.
#[derive(Debug, Default)]
pub struct Guarded(pub Mutex<i64>);

impl Guarded {
    pub fn new(value: i64) -> Self { Self(Mutex::new(value)) }
}

/// What a [`Guarded`] decodes to: the value it held, if it could be read,
/// and whether the lock was taken while encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrozenLock {
    pub value: Option<i64>,
    pub was_held: bool,
}

impl FrozenLock {
    /// Creates a fresh, unlocked lock holding the captured value, or the
    /// default when the value could not be read.
    pub fn thaw(&self) -> Guarded {
        Guarded::new(self.value.unwrap_or_default())
    }
}

/// Captures the contents of a [`Guarded`] without ever blocking on it.
#[derive(Debug, Default)]
pub struct LockHandler;

impl Handler for LockHandler {
    fn name(&self) -> &str { "lock" }

    fn can_handle(&self, object: &ObjectRef) -> bool {
        object.is::<Guarded>() || object.is::<FrozenLock>()
    }

    fn extract_state(&self, object: &ObjectRef) -> Result<Value, HandlerError> {
        let frozen = if let Some(guarded) = object.downcast_ref::<Guarded>() {
            guarded.0.try_lock().map_or(
                FrozenLock { value: None, was_held: true },
                |value| FrozenLock { value: Some(*value), was_held: false },
            )
        } else {
            *object.downcast_ref::<FrozenLock>().ok_or("not a lock")?
        };

        Ok(Value::map([
            ("value", frozen.value.map_or(Value::NotApplicable, Value::Int)),
            ("was_held", Value::Bool(frozen.was_held)),
        ]))
    }

    fn reconstruct(&self, state: Value) -> Result<ObjectRef, HandlerError> {
        let map = state_map(&state, "lock")?;
        let value = match field(map, "lock", "value")? {
            Value::NotApplicable => None,
            Value::Int(value) => Some(value),
            other => {
                return Err(format!(
                    "lock value must be an int, got {}",
                    other.type_name()
                )
                .into());
            }
        };
        let was_held = field(map, "lock", "was_held")?
            .as_bool()
            .ok_or("lock `was_held` must be a bool")?;

        Ok(ObjectRef::new(FrozenLock { value, was_held }))
    }
}

// ============================================================================
// Connections
// ============================================================================

static SESSIONS: AtomicU64 = AtomicU64::new(1);

/// Errors raised while opening a [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("`{0}` is not a host:port address")]
    InvalidAddress(String),
}

/// A live connection: its session only exists in this process.
#[derive(Debug)]
pub struct Connection {
    address: String,
    session: u64,
}

impl Connection {
    /// Opens a connection to `address`, which must look like `host:port`.
    pub fn open(address: impl Into<String>) -> Result<Self, ConnectError> {
        let address = address.into();
        let valid = address
            .rsplit_once(':')
            .is_some_and(|(host, port)| {
                !host.is_empty() && port.parse::<u16>().is_ok()
            });

        if !valid {
            return Err(ConnectError::InvalidAddress(address));
        }

        Ok(Self { address, session: SESSIONS.fetch_add(1, Ordering::Relaxed) })
    }

    pub fn address(&self) -> &str { &self.address }

    pub fn session(&self) -> u64 { self.session }
}

/// The substitute a decoded [`Connection`] becomes: it remembers where the
/// connection went and can open a new one there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconnector {
    pub address: String,
    pub last_session: u64,
}

impl Reconnector {
    /// Opens a fresh connection to the remembered address.
    pub fn reconnect(&self) -> Result<Connection, ConnectError> {
        Connection::open(self.address.clone())
    }
}

/// Turns live connections into [`Reconnector`]s.
///
/// Reconnectors encode to the same state, so a decoded graph can be encoded
/// again.
#[derive(Debug, Default)]
pub struct ConnectionHandler;

impl Handler for ConnectionHandler {
    fn name(&self) -> &str { "connection" }

    fn can_handle(&self, object: &ObjectRef) -> bool {
        object.is::<Connection>() || object.is::<Reconnector>()
    }

    fn extract_state(&self, object: &ObjectRef) -> Result<Value, HandlerError> {
        let (address, session) =
            if let Some(connection) = object.downcast_ref::<Connection>() {
                (connection.address.as_str(), connection.session)
            } else {
                let reconnector = object
                    .downcast_ref::<Reconnector>()
                    .ok_or("not a connection")?;
                (reconnector.address.as_str(), reconnector.last_session)
            };

        Ok(Value::map([
            ("address", Value::from(address)),
            ("session", Value::Int(i64::try_from(session)?)),
        ]))
    }

    fn reconstruct(&self, state: Value) -> Result<ObjectRef, HandlerError> {
        let map = state_map(&state, "connection")?;
        let address = field(map, "connection", "address")?;
        let session = field(map, "connection", "session")?
            .as_int()
            .ok_or("connection session must be an int")?;

        Ok(ObjectRef::new(Reconnector {
            address: address
                .as_str()
                .ok_or("connection address must be text")?
                .to_owned(),
            last_session: u64::try_from(session)?,
        }))
    }
}

// ============================================================================
// Catch-all
// ============================================================================

/// What [`CatchAllHandler`] decodes every object to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opaque {
    pub type_name: String,
}

/// Accepts any object and keeps only its type name.
#[derive(Debug, Default)]
pub struct CatchAllHandler;

impl Handler for CatchAllHandler {
    fn name(&self) -> &str { "opaque" }

    fn can_handle(&self, _: &ObjectRef) -> bool { true }

    fn extract_state(&self, object: &ObjectRef) -> Result<Value, HandlerError> {
        Ok(Value::from(object.type_name()))
    }

    fn reconstruct(&self, state: Value) -> Result<ObjectRef, HandlerError> {
        let type_name = state.as_str().ok_or("opaque state must be text")?;
        Ok(ObjectRef::new(Opaque { type_name: type_name.to_owned() }))
    }
}

// ============================================================================
// Failing handlers
// ============================================================================

/// Errors raised by [`BrittleHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BrittleError {
    #[error("the object crumbled while being read")]
    Extract,
    #[error("the object cannot be rebuilt")]
    Reconstruct,
}

/// An object whose handler fails on purpose.
#[derive(Debug, Clone, Copy, Default)]
pub struct Brittle {
    pub fail_on_extract: bool,
}

/// Fails extraction when asked to, and always fails reconstruction.
#[derive(Debug, Default)]
pub struct BrittleHandler;

impl Handler for BrittleHandler {
    fn name(&self) -> &str { "brittle" }

    fn can_handle(&self, object: &ObjectRef) -> bool { object.is::<Brittle>() }

    fn extract_state(&self, object: &ObjectRef) -> Result<Value, HandlerError> {
        let brittle = object.downcast_ref::<Brittle>().ok_or("not brittle")?;
        if brittle.fail_on_extract {
            return Err(BrittleError::Extract.into());
        }
        Ok(Value::Null)
    }

    fn reconstruct(&self, _: Value) -> Result<ObjectRef, HandlerError> {
        Err(BrittleError::Reconstruct.into())
    }
}

// ============================================================================
// Instrumentation
// ============================================================================

/// Wraps a handler and counts how often it is asked to claim an object.
#[derive(Debug, Default)]
pub struct Counting<H> {
    inner: H,
    lookups: AtomicUsize,
    reconstructions: AtomicUsize,
}

impl<H> Counting<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            lookups: AtomicUsize::new(0),
            reconstructions: AtomicUsize::new(0),
        }
    }

    /// Number of [`Handler::can_handle`] calls so far.
    pub fn lookups(&self) -> usize { self.lookups.load(Ordering::Relaxed) }

    /// Number of [`Handler::reconstruct`] calls so far.
    pub fn reconstructions(&self) -> usize {
        self.reconstructions.load(Ordering::Relaxed)
    }
}

impl<H: Handler> Handler for Counting<H> {
    fn name(&self) -> &str { self.inner.name() }

    fn can_handle(&self, object: &ObjectRef) -> bool {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.inner.can_handle(object)
    }

    fn extract_state(&self, object: &ObjectRef) -> Result<Value, HandlerError> {
        self.inner.extract_state(object)
    }

    fn reconstruct(&self, state: Value) -> Result<ObjectRef, HandlerError> {
        self.reconstructions.fetch_add(1, Ordering::Relaxed);
        self.inner.reconstruct(state)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// The handlers for every fixture type, in dispatch order.
///
/// [`CatchAllHandler`] is left out so unknown types stay unsupported.
pub fn handlers() -> Vec<Arc<dyn Handler>> {
    vec![
        Arc::new(PointHandler),
        Arc::new(VertexHandler),
        Arc::new(LockHandler),
        Arc::new(ConnectionHandler),
        Arc::new(BrittleHandler),
    ]
}

/// Creates a registry with [`handlers`].
pub fn create_test_registry() -> Registry {
    Registry::new(handlers()).expect("fixture handler names are unique")
}

/// Creates a codec over [`create_test_registry`].
pub fn create_test_codec() -> Codec { Codec::new(create_test_registry()) }

/// Builds `depth` lists nested inside each other around `Null`.
pub fn nested_lists(depth: usize) -> Value {
    (0..depth).fold(Value::Null, |inner, _| Value::list([inner]))
}
