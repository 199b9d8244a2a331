//! The three tree variants and the traversal machinery they share.
//!
//! - [`ClosureTree`]: explicit-map, single-call variant. Duplication touches
//!   only the changed node; a closure pass patches one original ancestor's
//!   child slot in place.
//! - [`PathCopyTree`]: every duplication eagerly climbs to the root,
//!   duplicating each not-yet-duplicated ancestor. Superseded roots stay
//!   readable as frozen [`Snapshot`]s.
//! - [`TxTree`]: optimistic, thread-scoped speculation with a
//!   globally-serialized validate-and-publish commit, for concurrent
//!   writers.
//!
//! All variants share the same routing rules, implemented once in
//! [`seek_with`], and the same in-order iteration over live keys.

use std::error::Error;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;

use crate::node::{Node, LEFT, RIGHT};

mod closure;
mod pathcopy;
mod txn;


pub use closure::ClosureTree;
pub use pathcopy::{PathCopyTree, Snapshot};
pub use txn::{TxSnapshot, TxTree, Txn};

// ============================================================================
//  CommitError
// ============================================================================

/// Errors surfaced by [`Txn::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitError {
    /// Another writer committed a conflicting change first; the transaction
    /// published nothing. Retry the whole open-write-commit sequence from
    /// scratch: no partial state survives an abort.
    Conflict,
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict => write!(f, "commit conflict: validation failed, retry the transaction"),
        }
    }
}

impl Error for CommitError {}

// ============================================================================
//  Seek
// ============================================================================

/// How [`seek_with`] treats an equal match that is logically deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SeekMode {
    /// Search/remove routing: descend into whichever child is non-null,
    /// preferring the right.
    Read,

    /// Insert routing: always descend right, so a null slot reached is the
    /// attach point for the re-inserted key.
    Insert,
}

/// Result of a routing descent.
///
/// When `found` is true, `node` is the live match and `parent` /
/// `grandparent` are the one/two ancestors above it. When false, `node` is
/// the last node visited (the attach parent for an insert, null for an
/// empty tree) and `slot` is the null slot the descent stopped at.
pub(crate) struct Seek<K, V> {
    pub found: bool,
    pub node: *mut Node<K, V>,
    pub slot: usize,
    pub parent: *mut Node<K, V>,
    pub pslot: usize,
    pub grandparent: *mut Node<K, V>,
    pub gslot: usize,
}

/// Comparison descent from `root`, reporting every child read to `record`.
///
/// The recorder is how the transactional variant populates its
/// parent-discovery map without nodes needing a permanently-valid parent
/// field; the single-writer variants pass a no-op.
///
/// # Safety
///
/// `root` must be null or point to a valid node of a consistent version,
/// and every node reachable from it must stay valid for the duration of
/// the call.
pub(crate) unsafe fn seek_with<K, V, F>(
    root: *mut Node<K, V>,
    key: &K,
    mode: SeekMode,
    mut record: F,
) -> Seek<K, V>
where
    K: Ord,
    F: FnMut(*mut Node<K, V>, *mut Node<K, V>, usize),
{
    let mut cur = root;
    let mut parent: *mut Node<K, V> = ptr::null_mut();
    let mut pslot = 0;
    let mut grandparent: *mut Node<K, V> = ptr::null_mut();
    let mut gslot = 0;

    while !cur.is_null() {
        // SAFETY: cur is non-null and valid per the caller's contract.
        let node = unsafe { &*cur };

        let slot = match key.cmp(node.key()) {
            std::cmp::Ordering::Less => LEFT,
            std::cmp::Ordering::Greater => RIGHT,
            std::cmp::Ordering::Equal => {
                if !node.is_deleted() {
                    return Seek {
                        found: true,
                        node: cur,
                        slot: 0,
                        parent,
                        pslot,
                        grandparent,
                        gslot,
                    };
                }
                // Logically deleted match: skip it by routing through a
                // child. Inserts always go right so the new leaf lands
                // where Read-mode routing will look first.
                match mode {
                    SeekMode::Insert => RIGHT,
                    SeekMode::Read => {
                        if !node.child(RIGHT).is_null() {
                            RIGHT
                        } else {
                            LEFT
                        }
                    }
                }
            }
        };

        let next = node.child(slot);
        if next.is_null() {
            return Seek {
                found: false,
                node: cur,
                slot,
                parent,
                pslot,
                grandparent,
                gslot,
            };
        }

        record(next, cur, slot);
        grandparent = parent;
        gslot = pslot;
        parent = cur;
        pslot = slot;
        cur = next;
    }

    Seek {
        found: false,
        node: ptr::null_mut(),
        slot: LEFT,
        parent,
        pslot,
        grandparent,
        gslot,
    }
}

// ============================================================================
//  In-order iteration
// ============================================================================

/// In-order iterator over the live (non-deleted) entries of one version.
///
/// The iterator walks whatever version `root` belonged to when it was
/// captured; concurrent commits against the same tree are invisible to it.
pub struct InorderIter<'a, K, V> {
    stack: Vec<*mut Node<K, V>>,
    _version: PhantomData<&'a Node<K, V>>,
}

impl<'a, K, V> InorderIter<'a, K, V> {
    /// Build an iterator over the version rooted at `root`.
    ///
    /// # Safety
    ///
    /// Every node of the version must outlive `'a`.
    pub(crate) unsafe fn new(root: *mut Node<K, V>) -> Self {
        let mut iter = Self {
            stack: Vec::new(),
            _version: PhantomData,
        };
        iter.push_left_spine(root);
        iter
    }

    fn push_left_spine(&mut self, mut node: *mut Node<K, V>) {
        while !node.is_null() {
            self.stack.push(node);
            // SAFETY: node is non-null and valid per the constructor
            // contract.
            node = unsafe { (*node).child(LEFT) };
        }
    }
}

impl<'a, K, V> Iterator for InorderIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let node = self.stack.pop()?;
            // SAFETY: every stacked pointer is non-null and valid for 'a.
            let node = unsafe { &*node };
            self.push_left_spine(node.child(RIGHT));

            if !node.is_deleted() {
                return Some((node.key(), node.value()));
            }
        }
    }
}

// ============================================================================
//  Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::{ArenaAllocator, NodeAllocator};

    /// Hand-build 2 <- 5 -> 8 and return (arena, root).
    fn small_tree() -> (ArenaAllocator<u64, u64>, *mut Node<u64, u64>) {
        let mut alloc = ArenaAllocator::new();
        let left = alloc.alloc(Node::new_boxed(2, 20));
        let right = alloc.alloc(Node::new_boxed(8, 80));
        let root = alloc.alloc(Node::new_boxed(5, 50));
        // SAFETY: arena pointers, private to the test.
        unsafe {
            (*root).set_child(LEFT, left);
            (*root).set_child(RIGHT, right);
            (*left).set_parent(root);
            (*right).set_parent(root);
        }
        (alloc, root)
    }

    #[test]
    fn test_seek_finds_live_match_with_ancestry() {
        let (_alloc, root) = small_tree();

        // SAFETY: arena alive for the whole test.
        let s = unsafe { seek_with(root, &8, SeekMode::Read, |_, _, _| {}) };
        assert!(s.found);
        unsafe {
            assert_eq!(*(*s.node).key(), 8);
        }
        assert!(ptr::eq(s.parent, root));
        assert_eq!(s.pslot, RIGHT);
        assert!(s.grandparent.is_null());
    }

    #[test]
    fn test_seek_miss_reports_attach_point() {
        let (_alloc, root) = small_tree();

        // SAFETY: arena alive for the whole test.
        let s = unsafe { seek_with(root, &3, SeekMode::Insert, |_, _, _| {}) };
        assert!(!s.found);
        unsafe {
            assert_eq!(*(*s.node).key(), 2);
        }
        assert_eq!(s.slot, RIGHT);
        assert!(ptr::eq(s.parent, root));
    }

    #[test]
    fn test_seek_skips_deleted_match() {
        let (_alloc, root) = small_tree();
        // SAFETY: arena alive for the whole test.
        unsafe {
            (*root).set_deleted();

            let s = seek_with(root, &5, SeekMode::Read, |_, _, _| {});
            assert!(!s.found, "deleted match must not be reported");

            // Insert routing descends right from the deleted match.
            let s = seek_with(root, &5, SeekMode::Insert, |_, _, _| {});
            assert!(!s.found);
            assert_eq!(*(*s.node).key(), 8);
            assert_eq!(s.slot, LEFT);
        }
    }

    #[test]
    fn test_seek_records_every_child_read() {
        let (_alloc, root) = small_tree();
        let mut reads = Vec::new();

        // SAFETY: arena alive for the whole test.
        let _ = unsafe {
            seek_with(root, &8, SeekMode::Read, |child, parent, slot| {
                reads.push((child, parent, slot));
            })
        };

        assert_eq!(reads.len(), 1);
        assert!(ptr::eq(reads[0].1, root));
        assert_eq!(reads[0].2, RIGHT);
    }

    #[test]
    fn test_inorder_skips_deleted() {
        let (_alloc, root) = small_tree();
        // SAFETY: arena alive for the whole test.
        unsafe {
            (*root).set_deleted();
            let keys: Vec<u64> = InorderIter::new(root).map(|(k, _)| *k).collect();
            assert_eq!(keys, vec![2, 8]);
        }
    }

    #[test]
    fn test_inorder_empty() {
        // SAFETY: null root is a valid empty version.
        let mut iter = unsafe { InorderIter::<u64, u64>::new(ptr::null_mut()) };
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_commit_error_display() {
        let msg = CommitError::Conflict.to_string();
        assert!(msg.contains("conflict"));
    }
}
