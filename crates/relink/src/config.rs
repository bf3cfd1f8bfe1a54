//! Configuration module for tuning the codec's limits.
//!
//! This module provides the [`Config`] trait for customizing the limits both
//! engines enforce. The [`DefaultConfig`] implementation provides defaults
//! suitable for most graphs.
//!
//! # Overview
//!
//! The `Config` trait allows you to customize:
//!
//! - **Recursion depth**: how deeply nested a graph (or an IR tree) may be
//!   before the walk gives up with a depth error
//! - **Expanded size**: how many nodes a binary payload may describe once
//!   its shared sub-trees are counted at every occurrence
//! - **Snapshot length**: how much of the offending value or node an error
//!   report carries
//!
//! # Creating Custom Configurations
//!
//! ```rust
//! use relink::{Codec, Config, handler::Registry};
//!
//! #[derive(Debug, Clone, Copy, Default)]
//! struct Shallow;
//!
//! impl Config for Shallow {
//!     fn max_depth() -> usize { 8 }
//! }
//!
//! let codec = Codec::<Shallow>::with_config(Registry::empty());
//! let deep = (0..16).fold(relink::Value::Null, |inner, _| {
//!     relink::Value::list([inner])
//! });
//! assert!(codec.encode(&deep).is_err());
//! ```

use std::fmt::Debug;

/// Configuration trait for the encoder and decoder.
///
/// Every method has a default, so a custom configuration only overrides the
/// limits it cares about.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` since a [`Codec`](crate::Codec) may
/// be shared across threads.
pub trait Config: Default + Debug + Clone + Send + Sync + 'static {
    /// The deepest nesting either engine will walk.
    ///
    /// Depth counts breadcrumbs: every collection element, mapping key or
    /// value, and handler state descends one level.
    ///
    /// # Default Value
    ///
    /// The default is 256, which keeps the recursive walk well inside the
    /// stack of a default-sized thread.
    #[must_use]
    fn max_depth() -> usize { 256 }

    /// The most nodes a binary payload may expand to.
    ///
    /// The wire format writes a shared sub-tree once, so a small payload can
    /// describe a tree that is exponentially larger. Reading counts every
    /// occurrence and rejects the payload past this limit.
    ///
    /// # Default Value
    ///
    /// The default is 2^22 (4,194,304) nodes.
    #[must_use]
    fn max_nodes() -> usize { 1 << 22 }

    /// The maximum number of characters of a value or node snapshot kept in
    /// an error report.
    ///
    /// # Default Value
    ///
    /// The default is 160.
    #[must_use]
    fn snapshot_limit() -> usize { 160 }
}

/// The default configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DefaultConfig;

impl Config for DefaultConfig {}
