//! Node representation for duplication-based trees.
//!
//! A [`Node`] is the unit of duplication: a mutation never edits a published
//! node's key, value, or deletion flag in place. Instead the node is cloned
//! via [`Node::duplicate_unlinked`], the clone receives the changed field,
//! and the clone is relinked into the structure by one of the ancestor
//! strategies in [`crate::tree`].
//!
//! # Field lifetimes
//!
//! - `key` / `value` are set at construction and never written again.
//! - `children` are atomic because a commit may patch a slot while
//!   unsynchronized readers traverse the same node.
//! - `parent` is a back-reference valid **only within the version that
//!   created it**. Duplicating an ancestor invalidates every descendant's
//!   stored parent without the descendant being touched, so it must never
//!   be trusted across a duplication. The transactional variant ignores it
//!   entirely and discovers parents lazily (see [`crate::dup::ParentMap`]).
//! - `flags` carries the logical-deletion bit and the transient
//!   "already duplicated in this pass" bit used by the path-copy climb.
//! - `root_shortcut` caches the root of the version this node belongs to
//!   (path-copy variant only), refreshed on every duplication.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU32, Ordering};

/// Index of the left child slot.
pub const LEFT: usize = 0;

/// Index of the right child slot.
pub const RIGHT: usize = 1;

/// Node is logically deleted: its key is skipped by searches, its subtree
/// is retained.
const DELETED_BIT: u32 = 1 << 0;

/// Node has already been duplicated in the current path-copy pass.
/// Transient: set during a climb, cleared before the operation returns.
const DUPED_BIT: u32 = 1 << 1;

/// A binary search tree node.
///
/// Published nodes are write-once: apart from child-slot patches performed
/// by a commit, no field of a reachable node is ever modified. This is what
/// lets readers treat any captured root as a frozen snapshot.
pub struct Node<K, V> {
    /// `DELETED_BIT` | `DUPED_BIT`.
    flags: AtomicU32,

    /// Left and right child slots. Null means no child.
    children: [AtomicPtr<Node<K, V>>; 2],

    /// Version-scoped parent back-reference. See the module docs.
    parent: AtomicPtr<Node<K, V>>,

    /// Cached root of the owning version (path-copy variant).
    root_shortcut: AtomicPtr<Node<K, V>>,

    /// Ordering key. Immutable after construction.
    key: K,

    /// Associated value. Immutable after construction.
    value: V,
}

impl<K, V> Node<K, V> {
    /// Create a detached leaf node.
    pub fn new_boxed(key: K, value: V) -> Box<Self> {
        Box::new(Self {
            flags: AtomicU32::new(0),
            children: [
                AtomicPtr::new(ptr::null_mut()),
                AtomicPtr::new(ptr::null_mut()),
            ],
            parent: AtomicPtr::new(ptr::null_mut()),
            root_shortcut: AtomicPtr::new(ptr::null_mut()),
            key,
            value,
        })
    }

    /// The node's key.
    #[inline]
    pub const fn key(&self) -> &K {
        &self.key
    }

    /// The node's value.
    #[inline]
    pub const fn value(&self) -> &V {
        &self.value
    }

    /// Whether the node is logically deleted.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.flags.load(Ordering::Relaxed) & DELETED_BIT != 0
    }

    /// Load a child slot.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not [`LEFT`] or [`RIGHT`]; an out-of-range slot
    /// index is a broken invariant, not a runtime condition.
    #[inline]
    pub fn child(&self, slot: usize) -> *mut Self {
        self.children[slot].load(Ordering::Acquire)
    }

    /// Store a child slot.
    ///
    /// Only legal on nodes that are private to the running operation, or on
    /// originals being patched by a closure pass / validated commit.
    #[inline]
    pub(crate) fn set_child(&self, slot: usize, child: *mut Self) {
        self.children[slot].store(child, Ordering::Release);
    }

    /// The version-scoped parent back-reference.
    #[inline]
    pub(crate) fn parent(&self) -> *mut Self {
        self.parent.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_parent(&self, parent: *mut Self) {
        self.parent.store(parent, Ordering::Release);
    }

    /// Cached root of the version this node belongs to (path-copy variant).
    #[inline]
    pub(crate) fn root_shortcut(&self) -> *mut Self {
        self.root_shortcut.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_root_shortcut(&self, root: *mut Self) {
        self.root_shortcut.store(root, Ordering::Release);
    }

    /// Mark the node logically deleted. Only legal pre-publication.
    #[inline]
    pub(crate) fn set_deleted(&self) {
        self.flags.fetch_or(DELETED_BIT, Ordering::Relaxed);
    }

    /// Whether this node was already duplicated in the current pass.
    #[inline]
    pub(crate) fn is_duped(&self) -> bool {
        self.flags.load(Ordering::Relaxed) & DUPED_BIT != 0
    }

    #[inline]
    pub(crate) fn set_duped(&self) {
        self.flags.fetch_or(DUPED_BIT, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn clear_duped(&self) {
        self.flags.fetch_and(!DUPED_BIT, Ordering::Relaxed);
    }

    /// Replace the key. Only legal on a detached duplicate that has never
    /// been linked into any version.
    #[inline]
    pub(crate) fn set_key(&mut self, key: K) {
        self.key = key;
    }

    /// Whether the node has no children in its current version.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.child(LEFT).is_null() && self.child(RIGHT).is_null()
    }

    /// Clone this node for duplication.
    ///
    /// The clone carries the original's key, value, children, parent, root
    /// shortcut, and deletion flag. The transient `DUPED` bit is *not*
    /// carried: it describes the original's role in the current pass, not
    /// the node's contents.
    pub(crate) fn duplicate_unlinked(&self) -> Box<Self>
    where
        K: Clone,
        V: Clone,
    {
        Box::new(Self {
            flags: AtomicU32::new(self.flags.load(Ordering::Relaxed) & DELETED_BIT),
            children: [
                AtomicPtr::new(self.child(LEFT)),
                AtomicPtr::new(self.child(RIGHT)),
            ],
            parent: AtomicPtr::new(self.parent()),
            root_shortcut: AtomicPtr::new(self.root_shortcut()),
            key: self.key.clone(),
            value: self.value.clone(),
        })
    }
}

impl<K: std::fmt::Debug, V> std::fmt::Debug for Node<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("deleted", &self.is_deleted())
            .field("left", &self.child(LEFT))
            .field("right", &self.child(RIGHT))
            .finish_non_exhaustive()
    }
}

// ============================================================================
//  Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_is_detached_leaf() {
        let node = Node::new_boxed(5u64, "five");

        assert_eq!(*node.key(), 5);
        assert_eq!(*node.value(), "five");
        assert!(node.is_leaf());
        assert!(!node.is_deleted());
        assert!(node.parent().is_null());
        assert!(node.root_shortcut().is_null());
    }

    #[test]
    fn test_flag_bits_are_independent() {
        let node = Node::new_boxed(1u64, ());

        node.set_duped();
        assert!(node.is_duped());
        assert!(!node.is_deleted());

        node.set_deleted();
        assert!(node.is_deleted());

        node.clear_duped();
        assert!(!node.is_duped());
        assert!(node.is_deleted());
    }

    #[test]
    fn test_duplicate_carries_deleted_but_not_duped() {
        let node = Node::new_boxed(1u64, ());
        node.set_deleted();
        node.set_duped();

        let dup = node.duplicate_unlinked();
        assert!(dup.is_deleted());
        assert!(!dup.is_duped());
    }

    #[test]
    fn test_duplicate_shares_children() {
        let left = Box::into_raw(Node::new_boxed(1u64, ()));
        let node = Node::new_boxed(2u64, ());
        node.set_child(LEFT, left);

        let dup = node.duplicate_unlinked();
        assert!(ptr::eq(dup.child(LEFT), left));
        assert!(dup.child(RIGHT).is_null());

        // SAFETY: left came from Box::into_raw above and was never shared.
        unsafe { drop(Box::from_raw(left)) };
    }

}
