//! Breadcrumb paths and value snapshots for error reports.
//!
//! Both engines thread a [`Path`] through their recursion. A breadcrumb is
//! pushed before descending into a child and popped on every exit, so when
//! something fails the path names exactly where in the graph it happened.

use std::{
    fmt::{self, Write as _},
    sync::Arc,
};

use crate::value::Value;

/// One step from a container into a child.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Breadcrumb {
    /// The `n`-th element of a sequence or set.
    Index(usize),
    /// The value stored under a string key.
    Key(String),
    /// The value stored under a non-string key, by its rendering.
    Entry(String),
    /// The key of the `n`-th mapping entry.
    KeyOf(usize),
    /// The handler state of an object of the named type.
    State(Arc<str>),
}

impl Breadcrumb {
    /// The breadcrumb for the value stored under `key`.
    pub(crate) fn for_key(key: &Value) -> Self {
        match key {
            Value::Str(key) => Self::Key(key.to_string()),
            other => Self::Entry(snapshot(format_args!("{other:?}"), 32)),
        }
    }
}

impl fmt::Display for Breadcrumb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "[{index}]"),
            Self::Key(key) => write!(f, ".{key}"),
            Self::Entry(key) => write!(f, "[{key}]"),
            Self::KeyOf(index) => write!(f, ".<key {index}>"),
            Self::State(type_name) => write!(f, ".<{type_name}>"),
        }
    }
}

/// The breadcrumb trail from the root to the value being processed.
///
/// Renders as a dotted path rooted at `$`, for example
/// `$.nodes[3].<key 0>.<app::Point>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<Breadcrumb>);

impl Path {
    /// Creates an empty path pointing at the root.
    #[must_use]
    pub const fn root() -> Self { Self(Vec::new()) }

    /// Returns the number of breadcrumbs, which is the current depth.
    #[must_use]
    pub fn depth(&self) -> usize { self.0.len() }

    /// Returns the breadcrumbs from the root down.
    #[must_use]
    pub fn breadcrumbs(&self) -> &[Breadcrumb] { &self.0 }

    /// Runs `f` with `crumb` pushed, popping it again however `f` returns.
    pub(crate) fn scoped<T>(
        &mut self,
        crumb: Breadcrumb,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        self.0.push(crumb);
        let result = f(self);
        self.0.pop();
        result
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for crumb in &self.0 {
            write!(f, "{crumb}")?;
        }
        Ok(())
    }
}

/// Renders `args` into a string of at most `limit` characters, appending
/// `...` when the rendering was cut short.
///
/// Rendering stops as soon as the limit is hit, so snapshotting a huge graph
/// costs no more than the limit.
#[must_use]
pub fn snapshot(args: fmt::Arguments<'_>, limit: usize) -> String {
    let mut out = Limited { buf: String::new(), remaining: limit, cut: false };
    // an error here only means the limit was reached
    let _ = out.write_fmt(args);
    if out.cut {
        out.buf.push_str("...");
    }
    out.buf
}

struct Limited {
    buf: String,
    remaining: usize,
    cut: bool,
}

impl fmt::Write for Limited {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            if self.remaining == 0 {
                self.cut = true;
                return Err(fmt::Error);
            }
            self.buf.push(ch);
            self.remaining -= 1;
        }
        Ok(())
    }
}
