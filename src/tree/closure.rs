//! Explicit-map variant: single-node duplication plus a closure pass.
//!
//! Each mutating call owns a fresh [`DupMap`]. The duplication primitive
//! copies only the node being changed; afterwards a *closure* pass walks a
//! list of candidate nodes and, for each that has a recorded duplicate,
//! repairs its own parent's child slot in place so the duplicate takes the
//! original's place. This is the minimum relinking work when only one level
//! needs fixing, and it is only safe because this variant is never exposed
//! to concurrent readers across the fix-up window: it is a single-writer
//! baseline, not a concurrent structure.

use std::ptr;

use crate::alloc::{ArenaAllocator, NodeAllocator};
use crate::dup::{duplicate_node, DupMap, FieldChange};
use crate::node::Node;
use crate::stats::StructuralStats;
use crate::tree::{seek_with, InorderIter, SeekMode};

/// Binary search tree mutated through single-node duplication and closure
/// fix-ups.
///
/// Single-writer: all mutating operations take `&mut self`. Superseded
/// nodes stay allocated in the arena until the tree drops.
pub struct ClosureTree<K, V> {
    root: *mut Node<K, V>,
    alloc: ArenaAllocator<K, V>,
    len: usize,
}

// SAFETY: the arena owns every node; moving the tree moves sole ownership.
unsafe impl<K: Send, V: Send> Send for ClosureTree<K, V> {}

impl<K: Ord + Clone, V: Clone> ClosureTree<K, V> {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: ptr::null_mut(),
            alloc: ArenaAllocator::new(),
            len: 0,
        }
    }

    /// Number of live keys.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no live keys.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total nodes ever allocated; the per-operation delta is the
    /// operation's duplication cost.
    #[must_use]
    pub fn allocated_nodes(&self) -> usize {
        self.alloc.allocated()
    }

    /// Look up a key. Logically deleted matches are skipped.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        // SAFETY: the arena keeps every reachable node alive for &self.
        let s = unsafe { seek_with(self.root, key, SeekMode::Read, |_, _, _| {}) };
        if s.found {
            // SAFETY: found implies s.node is valid.
            Some(unsafe { (*s.node).value() })
        } else {
            None
        }
    }

    /// Whether a live (non-deleted) entry with `key` exists.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Insert a key. Fails (returns false, tree untouched) if a live entry
    /// with the same key exists.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        // SAFETY: single writer, arena-backed nodes.
        let s = unsafe { seek_with(self.root, &key, SeekMode::Insert, |_, _, _| {}) };
        if s.found {
            return false;
        }

        let leaf = self.alloc.alloc(Node::new_boxed(key, value));
        if s.node.is_null() {
            self.root = leaf;
            self.len += 1;
            return true;
        }

        let mut dups = DupMap::new();
        // SAFETY: s.node is the attach parent found by the seek; its
        // ancestry fields come from the same descent.
        unsafe {
            let pdup = duplicate_node(
                s.node,
                FieldChange::Child(s.slot, leaf),
                s.parent,
                s.pslot,
                &mut dups,
                &mut self.alloc,
            );
            (*leaf).set_parent(pdup);
            self.closure_pass(&[s.node], &dups);
        }
        self.len += 1;
        true
    }

    /// Remove a key. Fails (returns false, tree untouched) if no live entry
    /// with `key` exists.
    ///
    /// A leaf match is unlinked from its parent's slot; an internal match
    /// is marked logically deleted, retaining its subtree.
    pub fn remove(&mut self, key: &K) -> bool {
        // SAFETY: single writer, arena-backed nodes.
        let s = unsafe { seek_with(self.root, key, SeekMode::Read, |_, _, _| {}) };
        if !s.found {
            return false;
        }

        let mut dups = DupMap::new();
        // SAFETY: pointers come from the seek just performed.
        unsafe {
            if (*s.node).is_leaf() {
                if s.parent.is_null() {
                    // Removing the root leaf empties the tree; no duplicate
                    // is needed for the removed node.
                    self.root = ptr::null_mut();
                } else {
                    duplicate_node(
                        s.parent,
                        FieldChange::Child(s.pslot, ptr::null_mut()),
                        s.grandparent,
                        s.gslot,
                        &mut dups,
                        &mut self.alloc,
                    );
                    self.closure_pass(&[s.parent], &dups);
                }
            } else {
                duplicate_node(
                    s.node,
                    FieldChange::Deleted,
                    s.parent,
                    s.pslot,
                    &mut dups,
                    &mut self.alloc,
                );
                self.closure_pass(&[s.node], &dups);
            }
        }
        self.len -= 1;
        true
    }

    /// Closure pass: for every listed node with a recorded duplicate,
    /// repair its parent's child slot to reference the duplicate.
    ///
    /// The patched parent is an *original* node; patching it in place is
    /// this variant's deliberate shortcut over full path copying.
    ///
    /// # Safety
    ///
    /// All listed nodes and their recorded parents must be valid, and no
    /// reader may be traversing the tree concurrently.
    unsafe fn closure_pass(&mut self, nodes: &[*mut Node<K, V>], dups: &DupMap<K, V>) {
        for &n in nodes {
            let Some(entry) = dups.get(n) else { continue };

            // SAFETY: per the caller's contract.
            unsafe {
                if entry.parent.is_null() {
                    self.root = entry.dup;
                } else if let Some(parent_entry) = dups.get(entry.parent) {
                    // The parent was duplicated in the same operation; the
                    // link normally exists already via adoption, but the
                    // closure contract is to repair it regardless.
                    (*parent_entry.dup).set_child(entry.slot, entry.dup);
                } else {
                    (*entry.parent).set_child(entry.slot, entry.dup);
                }
            }
        }
    }

    /// In-order iterator over live entries.
    pub fn iter(&self) -> InorderIter<'_, K, V> {
        // SAFETY: the arena outlives the borrow.
        unsafe { InorderIter::new(self.root) }
    }

    /// Structural statistics of the current version.
    #[must_use]
    pub fn stats(&self) -> StructuralStats {
        // SAFETY: the arena keeps the version alive for &self.
        unsafe { StructuralStats::collect_raw(self.root) }
    }

    /// The current root pointer; changes exactly when an operation
    /// mutates the tree.
    #[must_use]
    pub(crate) fn root_ptr(&self) -> *mut Node<K, V> {
        self.root
    }
}

impl<K: Ord + Clone, V: Clone> Default for ClosureTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
//  Tests
// ============================================================================
