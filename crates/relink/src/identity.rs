//! Encode-time bookkeeping of which shared values already have an id.

use fxhash::{FxHashMap, FxHashSet};

use crate::{
    ir::Id,
    value::{Identity, Value},
};

/// The outcome of visiting an identity-capable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// First sighting in this call; the value now owns the id.
    Fresh(Id),
    /// Seen before; emit a reference to the id.
    Seen(Id),
}

/// Maps the identity of every shared value met during one encode call to
/// the id it was assigned.
///
/// The tracker holds a handle to every value it has seen. Addresses are the
/// identity, and an address is only unique while its value is alive, so
/// without this a value dropped mid-walk (a handler's temporary state, say)
/// could hand its address to an unrelated value and alias it.
#[derive(Debug)]
pub struct IdentityTracker {
    assigned: FxHashMap<Identity, Id>,
    retained: Vec<Value>,
    referenced: FxHashSet<Id>,
    next: u64,
}

impl Default for IdentityTracker {
    fn default() -> Self {
        Self {
            assigned: FxHashMap::default(),
            retained: Vec::new(),
            referenced: FxHashSet::default(),
            next: 1,
        }
    }
}

impl IdentityTracker {
    /// Records `value`, assigning a fresh id on first sight.
    ///
    /// Returns `None` for primitives, which have no identity.
    pub fn visit(&mut self, value: &Value) -> Option<Visit> {
        let identity = value.identity()?;

        if let Some(&id) = self.assigned.get(&identity) {
            self.referenced.insert(id);
            return Some(Visit::Seen(id));
        }

        let id = Id::new(self.next);
        self.next += 1;
        self.assigned.insert(identity, id);
        self.retained.push(value.clone());
        Some(Visit::Fresh(id))
    }

    /// Returns `true` if some later visit resolved to `id`.
    #[must_use]
    pub fn is_referenced(&self, id: Id) -> bool {
        self.referenced.contains(&id)
    }

    /// Returns the number of ids assigned.
    #[must_use]
    pub fn len(&self) -> usize { self.assigned.len() }

    /// Returns `true` if no id has been assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.assigned.is_empty() }

    /// Forgets everything; the next id handed out is `#1` again.
    pub fn reset(&mut self) {
        self.assigned.clear();
        self.retained.clear();
        self.referenced.clear();
        self.next = 1;
    }
}
