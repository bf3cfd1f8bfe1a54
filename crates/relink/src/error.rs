//! The error type shared by the encoder, decoder and both formats.

use std::{fmt, sync::Arc};

use crate::{diagnostic::Path, handler::HandlerError};

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// An object for which no registered handler applies.
    UnsupportedType,
    /// The graph or IR nests deeper than the configured limit.
    DepthExceeded,
    /// A wire payload whose shared sub-trees expand to more nodes than the
    /// configured limit.
    SizeExceeded,
    /// A handler failed to snapshot an object.
    HandlerExtractionFailed,
    /// A handler failed to rebuild an object from its state.
    HandlerReconstructionFailed,
    /// A reference to an id no node registered.
    MalformedReference,
    /// A tagged node names a handler the registry does not have.
    UnresolvedHandler,
    /// An immutable collection (transitively) contains itself.
    ImmutableCycleUnsupported,
    /// A node of the wrong shape, or an envelope or wire payload that does
    /// not describe a valid IR tree.
    MalformedNode,
    /// The decoder's slot bookkeeping was violated.
    Inconsistent,
}

impl ErrorKind {
    /// Returns the kind's name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedType => "unsupported type",
            Self::DepthExceeded => "depth exceeded",
            Self::SizeExceeded => "size exceeded",
            Self::HandlerExtractionFailed => "handler extraction failed",
            Self::HandlerReconstructionFailed => {
                "handler reconstruction failed"
            }
            Self::MalformedReference => "malformed reference",
            Self::UnresolvedHandler => "unresolved handler",
            Self::ImmutableCycleUnsupported => "immutable cycle unsupported",
            Self::MalformedNode => "malformed node",
            Self::Inconsistent => "inconsistent decoder state",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A codec failure, annotated with where it happened.
///
/// The error is boxed so that `Result<Node>` and `Result<Value>` stay small
/// on the recursive hot path.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error(Box<Report>);

/// The details carried by an [`Error`].
#[derive(Debug, thiserror::Error)]
#[error("{kind} at {path}: {message}")]
pub struct Report {
    kind: ErrorKind,
    path: Path,
    message: String,
    type_name: Option<Arc<str>>,
    handler: Option<Arc<str>>,
    snapshot: Option<String>,
    #[source]
    source: Option<HandlerError>,
}

impl Error {
    pub(crate) fn new(
        kind: ErrorKind,
        path: &Path,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        tracing::debug!(%kind, %path, "{message}");

        Self(Box::new(Report {
            kind,
            path: path.clone(),
            message,
            type_name: None,
            handler: None,
            snapshot: None,
            source: None,
        }))
    }

    pub(crate) fn with_type(mut self, type_name: impl Into<Arc<str>>) -> Self {
        self.0.type_name = Some(type_name.into());
        self
    }

    pub(crate) fn with_handler(mut self, handler: impl Into<Arc<str>>) -> Self {
        self.0.handler = Some(handler.into());
        self
    }

    pub(crate) fn with_snapshot(mut self, snapshot: String) -> Self {
        self.0.snapshot = Some(snapshot);
        self
    }

    pub(crate) fn with_source(mut self, source: HandlerError) -> Self {
        self.0.source = Some(source);
        self
    }

    /// Returns what went wrong.
    #[must_use]
    pub fn kind(&self) -> ErrorKind { self.0.kind }

    /// Returns the breadcrumb path to the offending value or node.
    #[must_use]
    pub fn path(&self) -> &Path { &self.0.path }

    /// Returns the human-readable description.
    #[must_use]
    pub fn message(&self) -> &str { &self.0.message }

    /// Returns the type name of the offending value, when known.
    #[must_use]
    pub fn type_name(&self) -> Option<&str> { self.0.type_name.as_deref() }

    /// Returns the name of the handler involved, when one was.
    #[must_use]
    pub fn handler(&self) -> Option<&str> { self.0.handler.as_deref() }

    /// Returns a truncated rendering of the offending value or node.
    #[must_use]
    pub fn snapshot(&self) -> Option<&str> { self.0.snapshot.as_deref() }

    /// Returns the full report.
    #[must_use]
    pub fn report(&self) -> &Report { &self.0 }
}

/// A specialized [`Result`](std::result::Result) for codec operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
