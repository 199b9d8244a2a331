//! Full path-copy variant: every duplication climbs to the root.
//!
//! A mutation duplicates the changed node and then every ancestor on the
//! descent path that was not already duplicated in this pass (the `DUPED`
//! flag short-circuits re-copying when one operation touches several slots
//! and the climbs converge), splicing into the existing partial chain when
//! it reaches one that was. The operation publishes a brand-new root, so
//! every superseded root remains a complete frozen version: [`Snapshot`]
//! hands one out for reading while later operations keep building new
//! versions alongside it.
//!
//! Stored parent references are valid only within the version that created
//! them, so climbs follow the ancestors recorded by the descent that just
//! ran, never a stored field. Each node touched by an operation gets its
//! *root shortcut* refreshed to the operation's published root, giving O(1)
//! "what is my version's root" without climbing.
//!
//! Single-writer: the tree is deliberately `!Sync` (interior mutability via
//! `Cell`/`RefCell`); the transactional variant is the one that adds
//! validation for concurrent writers.

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::ptr;

use crate::alloc::{ArenaAllocator, NodeAllocator};
use crate::dup::{duplicate_node, DupMap, FieldChange};
use crate::node::Node;
use crate::stats::StructuralStats;
use crate::tree::{seek_with, InorderIter, SeekMode};

/// Ancestors of a target node, root first, each with the slot descended
/// through.
type AncestorPath<K, V> = Vec<(*mut Node<K, V>, usize)>;

/// Binary search tree where every mutation path-copies up to a new root.
///
/// Operations take `&self`: mutation is internal, snapshots taken before an
/// operation remain valid and untouched afterwards. All versions share the
/// tree's arena and are freed together when the tree drops.
pub struct PathCopyTree<K, V> {
    root: Cell<*mut Node<K, V>>,
    alloc: RefCell<ArenaAllocator<K, V>>,
    len: Cell<usize>,
}

// SAFETY: the arena owns every node; moving the tree moves sole ownership.
unsafe impl<K: Send, V: Send> Send for PathCopyTree<K, V> {}

impl<K: Ord + Clone, V: Clone> PathCopyTree<K, V> {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Cell::new(ptr::null_mut()),
            alloc: RefCell::new(ArenaAllocator::new()),
            len: Cell::new(0),
        }
    }

    /// Number of live keys in the current version.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.get()
    }

    /// Whether the current version holds no live keys.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len.get() == 0
    }

    /// Total nodes ever allocated across all versions; the per-operation
    /// delta is the operation's duplication cost.
    #[must_use]
    pub fn allocated_nodes(&self) -> usize {
        self.alloc.borrow().allocated()
    }

    /// Look up a key in the current version.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        // SAFETY: the arena keeps every version alive for &self.
        let s = unsafe { seek_with(self.root.get(), key, SeekMode::Read, |_, _, _| {}) };
        if s.found {
            // SAFETY: found implies s.node is valid.
            Some(unsafe { (*s.node).value() })
        } else {
            None
        }
    }

    /// Whether a live entry with `key` exists in the current version.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Insert a key. Fails (returns false, version unchanged) if a live
    /// entry with the same key exists.
    pub fn insert(&self, key: K, value: V) -> bool {
        let mut path: AncestorPath<K, V> = Vec::new();
        // SAFETY: single writer; the arena keeps the version alive.
        let s = unsafe {
            seek_with(self.root.get(), &key, SeekMode::Insert, |_, parent, slot| {
                path.push((parent, slot));
            })
        };
        if s.found {
            return false;
        }

        let leaf = self.alloc.borrow_mut().alloc(Node::new_boxed(key, value));
        if s.node.is_null() {
            // SAFETY: leaf is private until this publish.
            unsafe { (*leaf).set_root_shortcut(leaf) };
            self.root.set(leaf);
            self.len.set(self.len.get() + 1);
            return true;
        }

        let mut dups = DupMap::new();
        // SAFETY: s.node and path come from the descent just performed.
        unsafe {
            let pdup = self.dup_climb(s.node, FieldChange::Child(s.slot, leaf), &path, &mut dups);
            (*leaf).set_parent(pdup);
            self.finish_op(&dups, leaf);
        }
        self.len.set(self.len.get() + 1);
        true
    }

    /// Remove a key. Fails (returns false, version unchanged) if no live
    /// entry with `key` exists.
    pub fn remove(&self, key: &K) -> bool {
        let mut path: AncestorPath<K, V> = Vec::new();
        // SAFETY: single writer; the arena keeps the version alive.
        let s = unsafe {
            seek_with(self.root.get(), key, SeekMode::Read, |_, parent, slot| {
                path.push((parent, slot));
            })
        };
        if !s.found {
            return false;
        }

        let mut dups = DupMap::new();
        // SAFETY: pointers and path come from the descent just performed.
        unsafe {
            if (*s.node).is_leaf() {
                if s.parent.is_null() {
                    // Removing the root leaf: the new version is empty, the
                    // removed node needs no duplicate.
                    self.root.set(ptr::null_mut());
                } else {
                    // Duplicate the parent with the slot cleared; its
                    // ancestors are the path minus the parent itself.
                    self.dup_climb(
                        s.parent,
                        FieldChange::Child(s.pslot, ptr::null_mut()),
                        &path[..path.len() - 1],
                        &mut dups,
                    );
                    self.finish_op(&dups, ptr::null_mut());
                }
            } else {
                self.dup_climb(s.node, FieldChange::Deleted, &path, &mut dups);
                self.finish_op(&dups, ptr::null_mut());
            }
        }
        self.len.set(self.len.get() - 1);
        true
    }

    /// Duplicate `target` with `change`, then climb `ancestors` (root
    /// first, each with the slot descended through), duplicating every
    /// ancestor not flagged `DUPED` this pass. Reaching a flagged ancestor
    /// splices into the chain it already belongs to; exhausting the path
    /// publishes the duplicate chain's top as the new root.
    ///
    /// Returns the duplicate of `target`.
    ///
    /// # Safety
    ///
    /// `target` and every ancestor must belong to the live version, with
    /// `ancestors` the exact descent path to `target`.
    unsafe fn dup_climb(
        &self,
        target: *mut Node<K, V>,
        change: FieldChange<K, V>,
        ancestors: &[(*mut Node<K, V>, usize)],
        dups: &mut DupMap<K, V>,
    ) -> *mut Node<K, V> {
        let (parent, pslot) = ancestors.last().copied().unwrap_or((ptr::null_mut(), 0));

        // SAFETY: per the caller's contract.
        unsafe {
            let dup = duplicate_node(
                target,
                change,
                parent,
                pslot,
                dups,
                &mut *self.alloc.borrow_mut(),
            );
            (*target).set_duped();

            let mut cur_dup = dup;
            for i in (0..ancestors.len()).rev() {
                let (anc, slot) = ancestors[i];

                if (*anc).is_duped() {
                    // Already copied by an earlier climb this pass: splice
                    // into that chain instead of re-copying.
                    let Some(entry) = dups.get(anc) else {
                        unreachable!("DUPED ancestor has no duplication record");
                    };
                    (*entry.dup).set_child(slot, cur_dup);
                    (*cur_dup).set_parent(entry.dup);
                    return dup;
                }

                let (gp, gslot) = if i > 0 {
                    ancestors[i - 1]
                } else {
                    (ptr::null_mut(), 0)
                };
                let anc_dup = duplicate_node(
                    anc,
                    FieldChange::Child(slot, cur_dup),
                    gp,
                    gslot,
                    dups,
                    &mut *self.alloc.borrow_mut(),
                );
                (*anc).set_duped();
                cur_dup = anc_dup;
            }

            // Climbed past the old root: publish.
            self.root.set(cur_dup);
            dup
        }
    }

    /// End-of-operation pass: clear the transient `DUPED` flags on the
    /// superseded originals and refresh every node created this operation
    /// to point its root shortcut at the published root.
    ///
    /// # Safety
    ///
    /// All recorded originals and duplicates must be valid.
    unsafe fn finish_op(&self, dups: &DupMap<K, V>, fresh: *mut Node<K, V>) {
        let root = self.root.get();
        // SAFETY: per the caller's contract.
        unsafe {
            for entry in dups.iter() {
                (*entry.orig).clear_duped();
                (*entry.dup).set_root_shortcut(root);
            }
            if !fresh.is_null() {
                (*fresh).set_root_shortcut(root);
            }
        }
    }

    /// Freeze the current version for reading.
    ///
    /// The snapshot stays valid across later insertions and removals; it is
    /// backed by the tree's arena and therefore cannot outlive the tree.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<'_, K, V> {
        Snapshot {
            root: self.root.get(),
            _tree: PhantomData,
        }
    }

    /// In-order iterator over the current version's live entries.
    pub fn iter(&self) -> InorderIter<'_, K, V> {
        // SAFETY: the arena outlives the borrow.
        unsafe { InorderIter::new(self.root.get()) }
    }

    /// Structural statistics of the current version.
    #[must_use]
    pub fn stats(&self) -> StructuralStats {
        // SAFETY: the arena keeps the version alive for &self.
        unsafe { StructuralStats::collect_raw(self.root.get()) }
    }

    /// The current root pointer; changes exactly when an operation
    /// mutates the tree.
    #[must_use]
    pub(crate) fn root_ptr(&self) -> *mut Node<K, V> {
        self.root.get()
    }
}

impl<K: Ord + Clone, V: Clone> Default for PathCopyTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
//  Snapshot
// ============================================================================

/// A frozen, read-only version of a [`PathCopyTree`].
///
/// Captured from whatever root was current at [`PathCopyTree::snapshot`]
/// time; mutations committed afterwards are invisible.
pub struct Snapshot<'a, K, V> {
    root: *mut Node<K, V>,
    _tree: PhantomData<&'a PathCopyTree<K, V>>,
}

impl<'a, K: Ord, V> Snapshot<'a, K, V> {
    /// Look up a key in this version.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&'a V> {
        // SAFETY: the tree's arena keeps this version alive for 'a.
        let s = unsafe { seek_with(self.root, key, SeekMode::Read, |_, _, _| {}) };
        if s.found {
            // SAFETY: found implies s.node is valid for 'a.
            Some(unsafe { (*s.node).value() })
        } else {
            None
        }
    }

    /// Whether a live entry with `key` exists in this version.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// In-order iterator over this version's live entries.
    #[must_use]
    pub fn iter(&self) -> InorderIter<'a, K, V> {
        // SAFETY: the tree's arena keeps this version alive for 'a.
        unsafe { InorderIter::new(self.root) }
    }

    /// Structural statistics of this version.
    #[must_use]
    pub fn stats(&self) -> StructuralStats {
        // SAFETY: the tree's arena keeps this version alive for 'a.
        unsafe { StructuralStats::collect_raw(self.root) }
    }
}

// ============================================================================
//  Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{LEFT, RIGHT};

    fn keys(tree: &PathCopyTree<u64, u64>) -> Vec<u64> {
        tree.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_insert_and_search() {
        let tree = PathCopyTree::new();
        assert!(tree.insert(5, 50));
        assert!(tree.insert(3, 30));
        assert!(tree.insert(8, 80));

        assert_eq!(tree.get(&3), Some(&30));
        assert_eq!(tree.get(&9), None);
        assert_eq!(keys(&tree), vec![3, 5, 8]);
    }

    #[test]
    fn test_every_mutation_publishes_a_new_root() {
        let tree = PathCopyTree::new();
        tree.insert(5, 50);
        let r1 = tree.root_ptr();

        tree.insert(3, 30);
        let r2 = tree.root_ptr();
        assert!(!ptr::eq(r1, r2));

        tree.remove(&3);
        let r3 = tree.root_ptr();
        assert!(!ptr::eq(r2, r3));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_mutations() {
        let tree = PathCopyTree::new();
        for k in [5u64, 3, 8] {
            tree.insert(k, k * 10);
        }
        let snap = tree.snapshot();

        tree.insert(1, 10);
        tree.remove(&8);

        // The snapshot still sees the original version in full.
        let snap_keys: Vec<u64> = snap.iter().map(|(k, _)| *k).collect();
        assert_eq!(snap_keys, vec![3, 5, 8]);
        assert_eq!(snap.get(&8), Some(&80));
        assert_eq!(snap.get(&1), None);

        // The live tree moved on.
        assert_eq!(keys(&tree), vec![1, 3, 5]);
    }

    #[test]
    fn test_insert_duplicates_exactly_the_path() {
        let tree = PathCopyTree::new();
        for k in [5u64, 3, 8, 1] {
            tree.insert(k, 0);
        }
        let before = tree.allocated_nodes();

        // Path to the attach point of 2 is 5 -> 3 -> 1: three duplicates
        // plus the new leaf.
        tree.insert(2, 0);
        assert_eq!(tree.allocated_nodes() - before, 4);
    }

    #[test]
    fn test_root_shortcut_tracks_published_root() {
        let tree = PathCopyTree::new();
        tree.insert(5, 0);
        tree.insert(3, 0);

        let root = tree.root_ptr();
        // SAFETY: the arena keeps all versions alive.
        unsafe {
            assert!(ptr::eq((*root).root_shortcut(), root));
            let left = (*root).child(LEFT);
            assert!(ptr::eq((*left).root_shortcut(), root));
        }
    }

    #[test]
    fn test_duped_flags_cleared_after_operation() {
        let tree = PathCopyTree::new();
        for k in [5u64, 3, 8] {
            tree.insert(k, 0);
        }
        tree.remove(&8);

        // SAFETY: the arena keeps all versions alive.
        unsafe {
            let mut stack = vec![tree.root_ptr()];
            while let Some(n) = stack.pop() {
                if n.is_null() {
                    continue;
                }
                assert!(!(*n).is_duped());
                stack.push((*n).child(LEFT));
                stack.push((*n).child(RIGHT));
            }
        }
    }

    #[test]
    fn test_multi_slot_pass_copies_each_ancestor_once() {
        // Drive the engine directly: two climbs under one DupMap, touching
        // both children of the root. The second climb must splice into the
        // first chain instead of re-copying the root.
        let tree = PathCopyTree::new();
        tree.insert(5u64, 0u64);
        tree.insert(3, 0);
        tree.insert(8, 0);

        let root = tree.root_ptr();
        // SAFETY: arena-backed pointers; single writer.
        unsafe {
            let left = (*root).child(LEFT);
            let right = (*root).child(RIGHT);

            let mut dups = DupMap::new();
            tree.dup_climb(left, FieldChange::Deleted, &[(root, LEFT)], &mut dups);
            tree.dup_climb(right, FieldChange::Deleted, &[(root, RIGHT)], &mut dups);
            tree.finish_op(&dups, ptr::null_mut());

            // Three records: root once, both children once.
            assert_eq!(dups.len(), 3);

            let new_root = tree.root_ptr();
            assert!(!ptr::eq(new_root, root));
            assert!(ptr::eq((*new_root).child(LEFT), dups.dup_of(left).expect("left dup")));
            assert!(ptr::eq(
                (*new_root).child(RIGHT),
                dups.dup_of(right).expect("right dup")
            ));
            // The old version is untouched.
            assert!(ptr::eq((*root).child(LEFT), left));
            assert!(ptr::eq((*root).child(RIGHT), right));
        }
    }

    #[test]
    fn test_remove_then_reinsert() {
        let tree = PathCopyTree::new();
        for k in [5u64, 3, 8, 1, 4] {
            tree.insert(k, k);
        }
        assert!(tree.remove(&3));
        assert_eq!(keys(&tree), vec![1, 4, 5, 8]);

        assert!(tree.insert(3, 333));
        assert_eq!(tree.get(&3), Some(&333));
        assert_eq!(keys(&tree), vec![1, 3, 4, 5, 8]);
    }

    #[test]
    fn test_stats_counts_deleted_nodes() {
        let tree = PathCopyTree::new();
        for k in [5u64, 3, 8, 1, 4] {
            tree.insert(k, 0);
        }
        tree.remove(&3);

        let stats = tree.stats();
        assert_eq!(stats.live_keys, 4);
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.nodes, 5);
    }

    #[test]
    fn test_remove_root_leaf() {
        let tree = PathCopyTree::new();
        tree.insert(5u64, 0u64);
        let old_root = tree.root_ptr();

        assert!(tree.remove(&5));
        assert!(tree.is_empty());
        assert!(tree.root_ptr().is_null());
        // SAFETY: the arena keeps the old version alive.
        unsafe {
            assert_eq!(*(*old_root).key(), 5);
        }
    }
}
