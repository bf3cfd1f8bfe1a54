//! # relink - identity-preserving object-graph codec
//!
//! relink turns an arbitrary, possibly cyclic graph of [`Value`]s into a flat,
//! self-describing intermediate representation ([`Node`]) and back again.
//! Sharing survives the round trip: two references to one list before
//! encoding are two references to one list after decoding, and a list that
//! contains itself still contains itself.
//!
//! ## Key Features
//!
//! - **Identity preservation**: shared sub-graphs are encoded once and
//!   referenced by a call-scoped [`Id`](ir::Id)
//! - **Cycles**: mutable collections and handler-backed objects may refer
//!   back to themselves or their ancestors
//! - **Pluggable handlers**: opaque objects are delegated to a
//!   [`Handler`](handler::Handler) chosen from an ordered
//!   [`Registry`](handler::Registry)
//! - **Diagnosable failures**: every [`Error`] carries the breadcrumb path,
//!   type, handler and a snapshot of what went wrong
//! - **Two payload forms**: a JSON [`envelope`] and a compact binary [`wire`]
//!   format that keeps structural sharing of the IR
//!
//! ## Workflow
//!
//! 1. **Register**: build a [`Registry`](handler::Registry) with a handler for
//!    every opaque type the graph may contain
//! 2. **Encode**: [`Codec::encode`] walks the graph into a [`Node`]
//! 3. **Transport**: write the node with [`Codec::to_bytes`] or
//!    [`Codec::to_json`], read it back with their counterparts
//! 4. **Decode**: [`Codec::decode`] rebuilds an equivalent graph
//!
//! ```rust
//! use relink::{Codec, Value, handler::Registry};
//!
//! let codec = Codec::new(Registry::empty());
//!
//! let shared = Value::list([Value::Int(1)]);
//! let root = Value::list([shared.clone(), shared]);
//! root.as_list().unwrap().push(root.clone());
//!
//! let bytes = codec.to_bytes(&codec.encode(&root).unwrap()).unwrap();
//! let decoded = codec.decode(&codec.from_bytes(&bytes).unwrap()).unwrap();
//!
//! let list = decoded.as_list().unwrap();
//! assert_eq!(list.get(0), list.get(1));
//! assert_eq!(list.get(2), Some(decoded.clone()));
//! assert!(decoded.deep_eq(&root));
//! ```
//!
//! ## Thread Safety
//!
//! [`Encoder`] and [`Decoder`] hold per-call state and are meant for one
//! thread at a time. The [`Registry`](handler::Registry) is `Send + Sync`; a
//! [`Codec`] shares it behind an `Arc`, so cloning a codec into several
//! threads is cheap and every clone benefits from the same resolution cache.

use std::{marker::PhantomData, sync::Arc};

pub mod config;
pub mod decode;
pub mod diagnostic;
pub mod encode;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod identity;
pub mod ir;
pub mod value;
pub mod wire;

pub use config::{Config, DefaultConfig};
pub use decode::Decoder;
pub use encode::Encoder;
pub use error::{Error, ErrorKind, Result};
pub use ir::Node;
pub use relink_serialize as serialize;
pub use value::{ListRef, MapRef, ObjectRef, SetRef, TupleRef, Value};

use crate::handler::Registry;

/// A registry bundled with a configuration.
///
/// Every method creates fresh per-call state, so one codec may serve any
/// number of calls, and clones share the registry.
#[derive(Debug)]
pub struct Codec<C: Config = DefaultConfig> {
    registry: Arc<Registry>,
    _config: PhantomData<C>,
}

impl<C: Config> Clone for Codec<C> {
    fn clone(&self) -> Self {
        Self { registry: self.registry.clone(), _config: PhantomData }
    }
}

impl Codec {
    /// Creates a codec owning `registry`, with the default configuration.
    #[must_use]
    pub fn new(registry: Registry) -> Self { Self::with_config(registry) }

    /// Creates a codec over a registry shared with other codecs, with the
    /// default configuration.
    #[must_use]
    pub const fn with_shared(registry: Arc<Registry>) -> Self {
        Self::with_shared_config(registry)
    }
}

impl<C: Config> Codec<C> {
    /// Creates a codec owning `registry`, with the limits of `C`.
    #[must_use]
    pub fn with_config(registry: Registry) -> Self {
        Self::with_shared_config(Arc::new(registry))
    }

    /// Creates a codec over a shared registry, with the limits of `C`.
    #[must_use]
    pub const fn with_shared_config(registry: Arc<Registry>) -> Self {
        Self { registry, _config: PhantomData }
    }

    /// Returns the handler registry.
    #[must_use]
    pub fn registry(&self) -> &Registry { &self.registry }

    /// Creates a reusable encoder borrowing this codec's registry.
    #[must_use]
    pub fn encoder(&self) -> Encoder<'_, C> { Encoder::new(&self.registry) }

    /// Creates a reusable decoder borrowing this codec's registry.
    #[must_use]
    pub fn decoder(&self) -> Decoder<'_, C> { Decoder::new(&self.registry) }

    /// Encodes `value` into the IR.
    ///
    /// # Errors
    ///
    /// See [`Encoder::encode`].
    pub fn encode(&self, value: &Value) -> Result<Node> {
        self.encoder().encode(value)
    }

    /// Rebuilds a value graph from `node`.
    ///
    /// # Errors
    ///
    /// See [`Decoder::decode`].
    pub fn decode(&self, node: &Node) -> Result<Value> {
        self.decoder().decode(node)
    }

    /// Writes `node` in the binary wire format.
    ///
    /// # Errors
    ///
    /// See [`wire::to_bytes`].
    pub fn to_bytes(&self, node: &Node) -> Result<Vec<u8>> {
        wire::to_bytes(node)
    }

    /// Reads a node written by [`Codec::to_bytes`], under this codec's
    /// depth limit.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MalformedNode`] for corrupt input and
    /// [`ErrorKind::DepthExceeded`] for trees deeper than the configuration
    /// allows.
    pub fn from_bytes(&self, bytes: &[u8]) -> Result<Node> {
        wire::from_bytes_with::<C>(bytes)
    }

    /// Renders `node` as a JSON envelope.
    #[must_use]
    pub fn to_json(&self, node: &Node) -> serde_json::Value {
        envelope::to_json(node)
    }

    /// Parses a JSON envelope under this codec's depth limit.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MalformedNode`] for missing or mistyped fields.
    pub fn from_json(&self, json: &serde_json::Value) -> Result<Node> {
        envelope::from_json_with::<C>(json)
    }
}

/// Encodes `value` with the default configuration.
///
/// # Errors
///
/// See [`Encoder::encode`].
pub fn encode(registry: &Registry, value: &Value) -> Result<Node> {
    Encoder::<DefaultConfig>::new(registry).encode(value)
}

/// Decodes `node` with the default configuration.
///
/// # Errors
///
/// See [`Decoder::decode`].
pub fn decode(registry: &Registry, node: &Node) -> Result<Value> {
    Decoder::<DefaultConfig>::new(registry).decode(node)
}
