//! Duplication bookkeeping: records, parent discovery, and the duplication
//! primitive itself.
//!
//! Every mutating operation owns a fresh [`DupMap`]. The map answers two
//! questions the engine keeps asking while it works its way up a path:
//! "was this original already duplicated in this operation?" and "which
//! duplicate replaced it?". The map is ephemeral: it is discarded at the end
//! of the operation whether the operation commits or aborts, and nothing in
//! it is ever persisted into a node.
//!
//! The transactional variant additionally owns a [`ParentMap`]: parent/slot
//! relationships discovered lazily as the traversal reads children, instead
//! of a permanently-stored parent field that every ancestor duplication
//! would invalidate.

use std::collections::HashMap;

use crate::alloc::NodeAllocator;
use crate::node::{Node, LEFT, RIGHT};

// ============================================================================
//  FieldChange
// ============================================================================

/// The single field change a duplication applies to the clone.
pub enum FieldChange<K, V> {
    /// Replace one child slot.
    Child(usize, *mut Node<K, V>),

    /// Mark the clone logically deleted.
    Deleted,

    /// Replace the key.
    Key(K),
}

// ============================================================================
//  DupMap
// ============================================================================

/// One duplication record: `original -> {duplicate, original parent, slot}`.
pub struct DupEntry<K, V> {
    /// The original node that was duplicated.
    pub orig: *mut Node<K, V>,

    /// The duplicate that supersedes it.
    pub dup: *mut Node<K, V>,

    /// The original's parent at duplication time (null for the root).
    pub parent: *mut Node<K, V>,

    /// Which of `parent`'s slots held the original.
    pub slot: usize,
}

/// Per-operation map of duplication records, keyed by the original node's
/// address.
///
/// Invariant: at most one duplicate exists per original per operation.
pub struct DupMap<K, V> {
    entries: HashMap<usize, DupEntry<K, V>>,
}

impl<K, V> DupMap<K, V> {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Number of duplication records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no duplication has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discard every record.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Whether `orig` was duplicated in this operation.
    #[must_use]
    pub fn contains(&self, orig: *mut Node<K, V>) -> bool {
        self.entries.contains_key(&orig.addr())
    }

    /// The record for `orig`, if it was duplicated in this operation.
    #[must_use]
    pub fn get(&self, orig: *mut Node<K, V>) -> Option<&DupEntry<K, V>> {
        self.entries.get(&orig.addr())
    }

    /// The duplicate that replaced `orig` in this operation, if any.
    #[must_use]
    pub fn dup_of(&self, orig: *mut Node<K, V>) -> Option<*mut Node<K, V>> {
        self.entries.get(&orig.addr()).map(|e| e.dup)
    }

    /// Record a duplication.
    pub fn record(&mut self, entry: DupEntry<K, V>) {
        let prev = self.entries.insert(entry.orig.addr(), entry);
        debug_assert!(prev.is_none(), "original duplicated twice in one operation");
    }

    /// Iterate over all records in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &DupEntry<K, V>> {
        self.entries.values()
    }
}

impl<K, V> Default for DupMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
//  ParentMap
// ============================================================================

/// Lazily-discovered `child -> (parent, slot)` relationships, scoped to one
/// transaction.
///
/// Populated on every child read inside an open transaction; re-reading a
/// child overwrites the record, so the map always reflects the most recent
/// traversal. Cleared at every transaction boundary.
pub struct ParentMap<K, V> {
    links: HashMap<usize, (*mut Node<K, V>, usize)>,
}

impl<K, V> ParentMap<K, V> {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            links: HashMap::new(),
        }
    }

    /// Record that `child` was reached through `parent`'s `slot`.
    pub fn record(&mut self, child: *mut Node<K, V>, parent: *mut Node<K, V>, slot: usize) {
        self.links.insert(child.addr(), (parent, slot));
    }

    /// The parent and slot `child` was most recently reached through.
    #[must_use]
    pub fn get(&self, child: *mut Node<K, V>) -> Option<(*mut Node<K, V>, usize)> {
        self.links.get(&child.addr()).copied()
    }

    /// Discard every record.
    pub fn clear(&mut self) {
        self.links.clear();
    }
}

impl<K, V> Default for ParentMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
//  Duplication primitive
// ============================================================================

/// Duplicate `orig` with a single field change and record the mapping.
///
/// The clone starts equal to the original, receives `change`, and is then
/// reconciled with the duplicates already known to this operation in both
/// directions:
///
/// - if any of the original's children were already duplicated this
///   operation, the clone's slots are re-pointed at those duplicates (and
///   the duplicates' parent references at the clone);
/// - if the original's `parent` was already duplicated this operation, the
///   parent-duplicate's slot and the clone's parent reference are
///   cross-linked.
///
/// This two-directional adoption keeps the duplicate set internally
/// consistent regardless of the order in which nodes along a path are
/// touched.
///
/// # Safety
///
/// `orig` must point to a valid node, `parent` must be its parent in the
/// version being modified (null for the root) with `slot` the slot holding
/// `orig`, and the caller must have exclusive mutation rights over the
/// operation's private duplicates.
pub(crate) unsafe fn duplicate_node<K, V, A>(
    orig: *mut Node<K, V>,
    change: FieldChange<K, V>,
    parent: *mut Node<K, V>,
    slot: usize,
    dups: &mut DupMap<K, V>,
    alloc: &mut A,
) -> *mut Node<K, V>
where
    K: Clone,
    V: Clone,
    A: NodeAllocator<K, V>,
{
    debug_assert!(!dups.contains(orig), "one duplicate per original per op");

    // SAFETY: caller guarantees orig is valid.
    let mut clone = unsafe { (*orig).duplicate_unlinked() };
    match change {
        FieldChange::Child(s, child) => clone.set_child(s, child),
        FieldChange::Deleted => clone.set_deleted(),
        FieldChange::Key(k) => clone.set_key(k),
    }
    let dup = alloc.alloc(clone);

    // SAFETY: dup is private to this operation; children/parent duplicates
    // in the map are equally private.
    unsafe {
        for s in [LEFT, RIGHT] {
            let child = (*dup).child(s);
            if let Some(child_dup) = dups.dup_of(child) {
                (*dup).set_child(s, child_dup);
                (*child_dup).set_parent(dup);
            }
        }

        if let Some(parent_entry) = dups.get(parent) {
            (*parent_entry.dup).set_child(slot, dup);
            (*dup).set_parent(parent_entry.dup);
        } else {
            (*dup).set_parent(parent);
        }
    }

    dups.record(DupEntry {
        orig,
        dup,
        parent,
        slot,
    });

    dup
}

// ============================================================================
//  Tests
// ============================================================================
