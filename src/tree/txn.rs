//! Transactional variant: optimistic speculation, validate-and-publish commit.
//!
//! A [`Txn`] is an explicit, caller-held transaction context (one per
//! attempted operation, never shared across threads). All the expensive work
//! runs lock-free against the root snapshotted at [`TxTree::begin`]: the
//! descent records every child read in a [`ParentMap`] so ancestor paths are
//! discovered lazily, and a write duplicates the target plus every ancestor
//! up to either the snapshot root or a node this transaction already owns.
//! Nothing built this way is reachable by anyone else.
//!
//! [`Txn::commit`] is the only synchronized step: under the tree's commit
//! lock it validates every duplication record before applying any patch, and
//! publishes the candidate root last, so a losing transaction aborts without
//! ever making a half-linked version observable. On abort every speculative
//! node is discarded; the caller retries the whole operation from a fresh
//! transaction.
//!
//! Superseded and unlinked nodes are retired through the tree's
//! [`seize::Collector`], so unsynchronized readers holding a guard keep
//! their frozen version alive until they are done with it.

use std::collections::HashMap;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use parking_lot::Mutex;
use seize::{Collector, Guard, LocalGuard};

use crate::alloc::{reclaim_node, reclaim_subtree, BoxAllocator, NodeAllocator};
use crate::dup::{duplicate_node, DupMap, FieldChange, ParentMap};
use crate::node::Node;
use crate::stats::StructuralStats;
use crate::tracing_helpers::{debug_log, trace_log};
use crate::tree::{seek_with, CommitError, InorderIter, SeekMode};

// ============================================================================
//  TxTree
// ============================================================================

/// Binary search tree for concurrent writers: mutations run inside a
/// [`Txn`] and take effect only at a validated commit.
///
/// Readers never block: they pin a guard, load whatever root is current,
/// and traverse a frozen version. Writers speculate concurrently and are
/// serialized only for the validate-and-publish step.
pub struct TxTree<K, V> {
    root: AtomicPtr<Node<K, V>>,
    collector: Collector,
    commit_lock: Mutex<()>,
    len: AtomicUsize,
}

// SAFETY: the root is only swapped inside the commit critical section, all
// published nodes are write-once, and reclamation is deferred through the
// collector until no guard can reach a retired node.
unsafe impl<K: Send + Sync, V: Send + Sync> Send for TxTree<K, V> {}
unsafe impl<K: Send + Sync, V: Send + Sync> Sync for TxTree<K, V> {}

impl<K: Ord + Clone, V: Clone> TxTree<K, V> {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: AtomicPtr::new(ptr::null_mut()),
            collector: Collector::new(),
            commit_lock: Mutex::new(()),
            len: AtomicUsize::new(0),
        }
    }

    /// Number of live keys in the most recently published version.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Whether the most recently published version holds no live keys.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a transaction against the current root.
    ///
    /// The transaction pins a reclamation guard for its whole lifetime, so
    /// every node of the snapshotted version stays valid until the
    /// transaction commits or is dropped.
    #[must_use]
    pub fn begin(&self) -> Txn<'_, K, V> {
        let guard = self.collector.enter();
        // Load after pinning, so the snapshot cannot be retired under us.
        let root = self.root.load(Ordering::Acquire);
        trace_log!("txn open, snapshot root {:p}", root);
        Txn {
            tree: self,
            guard,
            dups: DupMap::new(),
            parents: ParentMap::new(),
            owned: HashMap::new(),
            unlinked: Vec::new(),
            root_snapshot: root,
            new_root: root,
            dirty: false,
            len_delta: 0,
            committed: false,
            alloc: BoxAllocator,
        }
    }

    /// Pin a reclamation guard for reads outside a transaction.
    #[must_use]
    pub fn pin(&self) -> LocalGuard<'_> {
        self.collector.enter()
    }

    /// Freeze the current version for reading; valid as long as `guard` is.
    #[must_use]
    pub fn snapshot<'g>(&self, _guard: &'g LocalGuard<'_>) -> TxSnapshot<'g, K, V> {
        TxSnapshot {
            root: self.root.load(Ordering::Acquire),
            _guard: std::marker::PhantomData,
        }
    }

    /// Look up a key in the current version, cloning the value out.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        let _guard = self.pin();
        let root = self.root.load(Ordering::Acquire);
        // SAFETY: the guard keeps this version alive for the traversal.
        let s = unsafe { seek_with(root, key, SeekMode::Read, |_, _, _| {}) };
        // SAFETY: found implies s.node is valid under the guard.
        s.found.then(|| unsafe { (*s.node).value().clone() })
    }

    /// Whether a live entry with `key` exists in the current version.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Insert a key, retrying on commit conflicts until a transaction
    /// settles it. Returns false if the key was already present.
    pub fn insert(&self, key: K, value: V) -> bool {
        loop {
            let mut txn = self.begin();
            let inserted = txn.insert(key.clone(), value.clone());
            match txn.commit() {
                Ok(()) => return inserted,
                Err(CommitError::Conflict) => {}
            }
        }
    }

    /// Remove a key, retrying on commit conflicts until a transaction
    /// settles it. Returns false if no live entry with `key` existed.
    pub fn remove(&self, key: &K) -> bool {
        loop {
            let mut txn = self.begin();
            let removed = txn.remove(key);
            match txn.commit() {
                Ok(()) => return removed,
                Err(CommitError::Conflict) => {}
            }
        }
    }

    /// Structural statistics of the current version.
    #[must_use]
    pub fn stats(&self) -> StructuralStats {
        let _guard = self.pin();
        // SAFETY: the guard keeps the current version alive.
        unsafe { StructuralStats::collect_raw(self.root.load(Ordering::Acquire)) }
    }

    /// The current root pointer; changes exactly at successful non-trivial
    /// commits.
    #[must_use]
    pub(crate) fn root_ptr(&self) -> *mut Node<K, V> {
        self.root.load(Ordering::Acquire)
    }
}

impl<K: Ord + Clone, V: Clone> Default for TxTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for TxTree<K, V> {
    fn drop(&mut self) {
        // Free the published version; retired nodes of superseded versions
        // are freed by the collector when it drops after this.
        let root = *self.root.get_mut();
        // SAFETY: exclusive access; no guard can be live while we hold
        // &mut self.
        unsafe { reclaim_subtree(root) };
    }
}

// ============================================================================
//  Txn
// ============================================================================

/// One in-flight transaction against a [`TxTree`].
///
/// Holds every piece of transaction-scoped bookkeeping: the duplication
/// records, the lazily-discovered parent links, the set of nodes this
/// transaction allocated (and may therefore mutate in place), and the
/// candidate root. Dropping an uncommitted transaction discards all of it;
/// no speculative node was ever reachable by anyone else.
///
/// Not `Send`: a transaction is scoped to the thread that opened it.
pub struct Txn<'t, K, V> {
    tree: &'t TxTree<K, V>,
    guard: LocalGuard<'t>,
    dups: DupMap<K, V>,
    parents: ParentMap<K, V>,
    /// Nodes allocated by this transaction (fresh leaves and duplicates),
    /// keyed by address. Mutable in place until commit; freed on abort.
    owned: HashMap<usize, *mut Node<K, V>>,
    /// Original leaves unlinked by this transaction, retired on commit.
    unlinked: Vec<*mut Node<K, V>>,
    root_snapshot: *mut Node<K, V>,
    new_root: *mut Node<K, V>,
    dirty: bool,
    len_delta: isize,
    committed: bool,
    alloc: BoxAllocator,
}

impl<'t, K: Ord + Clone, V: Clone> Txn<'t, K, V> {
    /// The root of the version this transaction sees: the snapshot, plus
    /// its own uncommitted writes.
    #[inline]
    fn view_root(&self) -> *mut Node<K, V> {
        self.new_root
    }

    /// Look up a key in the transaction's view.
    #[must_use]
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let parents = &mut self.parents;
        // SAFETY: the guard keeps the snapshot alive; owned nodes are ours.
        let s = unsafe {
            seek_with(self.new_root, key, SeekMode::Read, |child, parent, slot| {
                parents.record(child, parent, slot);
            })
        };
        // SAFETY: found implies s.node is valid for the transaction's life.
        s.found.then(|| unsafe { (*s.node).value() })
    }

    /// Whether a live entry with `key` exists in the transaction's view.
    #[must_use]
    pub fn contains(&mut self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Insert a key into the transaction's view. Returns false (and changes
    /// nothing) if a live entry with the same key is already visible.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let root = self.view_root();
        let parents = &mut self.parents;
        // SAFETY: guard-pinned snapshot plus transaction-owned nodes.
        let s = unsafe {
            seek_with(root, &key, SeekMode::Insert, |child, parent, slot| {
                parents.record(child, parent, slot);
            })
        };
        if s.found {
            return false;
        }

        let leaf = self.alloc.alloc(Node::new_boxed(key, value));
        self.owned.insert(leaf.addr(), leaf);
        self.dirty = true;
        self.len_delta += 1;

        if s.node.is_null() {
            self.new_root = leaf;
            return true;
        }
        // SAFETY: s.node came off the seek just performed.
        unsafe {
            self.write(s.node, FieldChange::Child(s.slot, leaf));
            let rep = self.dups.dup_of(s.node).unwrap_or(s.node);
            (*leaf).set_parent(rep);
        }
        true
    }

    /// Remove a key from the transaction's view. Returns false (and changes
    /// nothing) if no live entry with `key` is visible.
    pub fn remove(&mut self, key: &K) -> bool {
        let root = self.view_root();
        let parents = &mut self.parents;
        // SAFETY: guard-pinned snapshot plus transaction-owned nodes.
        let s = unsafe {
            seek_with(root, key, SeekMode::Read, |child, parent, slot| {
                parents.record(child, parent, slot);
            })
        };
        if !s.found {
            return false;
        }
        self.dirty = true;
        self.len_delta -= 1;

        // SAFETY: every pointer came off the seek just performed.
        unsafe {
            if (*s.node).is_leaf() {
                let ours = self.owned.contains_key(&s.node.addr());
                if s.parent.is_null() {
                    self.new_root = ptr::null_mut();
                } else {
                    self.write(s.parent, FieldChange::Child(s.pslot, ptr::null_mut()));
                }
                if ours {
                    // A leaf we allocated ourselves was never published:
                    // free it now instead of retiring it.
                    self.owned.remove(&s.node.addr());
                    self.alloc.dealloc(s.node);
                } else {
                    self.unlinked.push(s.node);
                }
            } else {
                self.write(s.node, FieldChange::Deleted);
            }
        }
        true
    }

    /// Apply a field change to a node in the transaction's view.
    ///
    /// A node this transaction allocated is mutated in place. Anything else
    /// is duplicated and the duplicate chained upward, duplicating every
    /// ancestor (ancestry per the parent-discovery map) until the chain
    /// reaches a node with no recorded parent — the snapshot root, making
    /// the chain's top the candidate new root — or a node this transaction
    /// already owns or duplicated, into which it splices.
    ///
    /// # Safety
    ///
    /// `node` must be valid in the transaction's view, with its ancestry
    /// recorded by the seek that found it.
    unsafe fn write(&mut self, node: *mut Node<K, V>, change: FieldChange<K, V>) {
        // SAFETY: per the caller's contract.
        unsafe {
            if self.owned.contains_key(&node.addr()) {
                match change {
                    FieldChange::Child(slot, child) => (*node).set_child(slot, child),
                    FieldChange::Deleted => (*node).set_deleted(),
                    FieldChange::Key(k) => (*node).set_key(k),
                }
                return;
            }
            debug_assert!(!self.dups.contains(node), "superseded node reached by seek");

            let (parent, slot) = self.parents.get(node).unwrap_or((ptr::null_mut(), 0));
            let dup = duplicate_node(node, change, parent, slot, &mut self.dups, &mut self.alloc);
            self.owned.insert(dup.addr(), dup);

            let mut cur = node;
            let mut cur_new = dup;
            loop {
                let Some((p, pslot)) = self.parents.get(cur) else {
                    self.new_root = cur_new;
                    break;
                };
                if self.owned.contains_key(&p.addr()) {
                    (*p).set_child(pslot, cur_new);
                    (*cur_new).set_parent(p);
                    break;
                }
                if let Some(entry) = self.dups.get(p) {
                    // Ancestor already duplicated this transaction: splice
                    // into its chain. (Adoption inside duplicate_node has
                    // usually done this already; re-linking is idempotent.)
                    (*entry.dup).set_child(pslot, cur_new);
                    (*cur_new).set_parent(entry.dup);
                    break;
                }
                let (gp, gslot) = self.parents.get(p).unwrap_or((ptr::null_mut(), 0));
                let pdup = duplicate_node(
                    p,
                    FieldChange::Child(pslot, cur_new),
                    gp,
                    gslot,
                    &mut self.dups,
                    &mut self.alloc,
                );
                self.owned.insert(pdup.addr(), pdup);
                cur = p;
                cur_new = pdup;
            }
        }
    }

    /// Validate and publish this transaction's writes.
    ///
    /// A transaction that duplicated nothing commits trivially. Otherwise,
    /// under the tree's commit lock, the snapshot root and every boundary
    /// duplication record are validated before any slot is rewritten; only
    /// when all of them still hold are the patches applied and the candidate
    /// root published, so an abort never leaves a partially-relinked tree
    /// observable.
    ///
    /// On [`CommitError::Conflict`] the caller must retry the whole
    /// operation with a fresh transaction; this one's speculative nodes are
    /// freed when it drops.
    pub fn commit(mut self) -> Result<(), CommitError> {
        if !self.dirty {
            self.committed = true;
            return Ok(());
        }

        {
            let _commit = self.tree.commit_lock.lock();

            // The transaction's guard has pinned root_snapshot since begin,
            // so a pointer-equal root cannot be a recycled allocation.
            let current = self.tree.root.load(Ordering::Acquire);
            if !ptr::eq(current, self.root_snapshot) {
                debug_log!(
                    "txn abort: root moved {:p} -> {:p}",
                    self.root_snapshot,
                    current
                );
                return Err(CommitError::Conflict);
            }

            // Validate every record before applying any patch. Records whose
            // original parent was itself duplicated (or is one of our own
            // nodes) are interior to the speculative version and need no
            // slot rewrite; the rest must still hang where we found them.
            let mut patches: Vec<(*mut Node<K, V>, usize, *mut Node<K, V>)> = Vec::new();
            for e in self.dups.iter() {
                if e.parent.is_null()
                    || self.owned.contains_key(&e.parent.addr())
                    || self.dups.contains(e.parent)
                {
                    continue;
                }
                // SAFETY: e.parent is pinned by this transaction's guard.
                if !ptr::eq(unsafe { (*e.parent).child(e.slot) }, e.orig) {
                    debug_log!("txn abort: slot {} of {:p} moved", e.slot, e.parent);
                    return Err(CommitError::Conflict);
                }
                patches.push((e.parent, e.slot, e.dup));
            }

            // SAFETY: validated above; no other writer can interleave while
            // we hold the commit lock.
            unsafe {
                for (parent, slot, dup) in patches {
                    (*parent).set_child(slot, dup);
                }
            }
            self.tree.root.store(self.new_root, Ordering::Release);
        }

        // Reclamation and bookkeeping happen outside the critical section.
        // SAFETY: every retired node is now unreachable from the published
        // root; readers still inside old versions are guard-protected.
        unsafe {
            for e in self.dups.iter() {
                self.guard.defer_retire(e.orig, reclaim_node::<K, V>);
            }
            for &n in &self.unlinked {
                self.guard.defer_retire(n, reclaim_node::<K, V>);
            }
        }
        match self.len_delta.cmp(&0) {
            std::cmp::Ordering::Greater => {
                self.tree
                    .len
                    .fetch_add(self.len_delta.unsigned_abs(), Ordering::Relaxed);
            }
            std::cmp::Ordering::Less => {
                self.tree
                    .len
                    .fetch_sub(self.len_delta.unsigned_abs(), Ordering::Relaxed);
            }
            std::cmp::Ordering::Equal => {}
        }
        debug_log!(
            "txn commit: {} duplicates, {} unlinked, len {:+}",
            self.dups.len(),
            self.unlinked.len(),
            self.len_delta
        );
        self.committed = true;
        Ok(())
    }
}

impl<K, V> Drop for Txn<'_, K, V> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        trace_log!("txn dropped uncommitted, freeing {} nodes", self.owned.len());
        // SAFETY: speculative nodes were never linked into any published
        // version; this transaction is their sole owner.
        unsafe {
            for &node in self.owned.values() {
                self.alloc.dealloc(node);
            }
        }
    }
}

// ============================================================================
//  TxSnapshot
// ============================================================================

/// A frozen, read-only version of a [`TxTree`], pinned by a guard.
///
/// Commits published after the snapshot was taken are invisible; the guard
/// keeps every node of this version from being reclaimed.
pub struct TxSnapshot<'g, K, V> {
    root: *mut Node<K, V>,
    _guard: std::marker::PhantomData<&'g ()>,
}

impl<'g, K: Ord + 'g, V> TxSnapshot<'g, K, V> {
    /// Look up a key in this version.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&'g V> {
        // SAFETY: the guard behind 'g keeps this version alive.
        let s = unsafe { seek_with(self.root, key, SeekMode::Read, |_, _, _| {}) };
        // SAFETY: found implies s.node is valid for 'g.
        s.found.then(|| unsafe { (*s.node).value() })
    }

    /// Whether a live entry with `key` exists in this version.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// In-order iterator over this version's live entries.
    #[must_use]
    pub fn iter(&self) -> InorderIter<'g, K, V> {
        // SAFETY: the guard behind 'g keeps this version alive.
        unsafe { InorderIter::new(self.root) }
    }

    /// Structural statistics of this version.
    #[must_use]
    pub fn stats(&self) -> StructuralStats {
        // SAFETY: the guard behind 'g keeps this version alive.
        unsafe { StructuralStats::collect_raw(self.root) }
    }
}

// ============================================================================
//  Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn in_order(tree: &TxTree<u64, u64>) -> Vec<u64> {
        let guard = tree.pin();
        let snap = tree.snapshot(&guard);
        snap.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_insert_and_search() {
        let tree = TxTree::new();
        assert!(tree.insert(5, 50));
        assert!(tree.insert(3, 30));
        assert!(tree.insert(8, 80));

        assert_eq!(tree.get(&3), Some(30));
        assert_eq!(tree.get(&9), None);
        assert_eq!(in_order(&tree), vec![3, 5, 8]);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_duplicate_insert_fails_and_keeps_root() {
        let tree = TxTree::new();
        tree.insert(5u64, 0u64);
        let root = tree.root_ptr();

        assert!(!tree.insert(5, 99));
        assert!(ptr::eq(tree.root_ptr(), root));
        assert_eq!(tree.get(&5), Some(0));
    }

    #[test]
    fn test_remove_internal_marks_deleted() {
        let tree = TxTree::new();
        for k in [5u64, 3, 8, 1, 4] {
            tree.insert(k, k * 10);
        }
        assert!(tree.remove(&3));

        assert_eq!(tree.get(&3), None);
        assert_eq!(tree.get(&1), Some(10));
        assert_eq!(tree.get(&4), Some(40));
        assert_eq!(in_order(&tree), vec![1, 4, 5, 8]);

        let stats = tree.stats();
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.live_keys, 4);
    }

    #[test]
    fn test_remove_leaf_publishes_new_root() {
        let tree = TxTree::new();
        for k in [5u64, 3, 8] {
            tree.insert(k, 0);
        }
        let old_root = tree.root_ptr();

        assert!(tree.remove(&8));
        assert!(!ptr::eq(tree.root_ptr(), old_root));
        assert_eq!(in_order(&tree), vec![3, 5]);
        assert_eq!(tree.stats().nodes, 2);
    }

    #[test]
    fn test_readonly_txn_commits_despite_concurrent_commit() {
        let tree = TxTree::new();
        tree.insert(5u64, 0u64);

        let mut reader = tree.begin();
        assert_eq!(reader.get(&5), Some(&0));

        // Another transaction moves the root under the reader.
        tree.insert(3, 0);

        // Nothing was duplicated, so the read-only commit is trivial.
        assert!(reader.commit().is_ok());
    }

    #[test]
    fn test_conflicting_commit_aborts() {
        let tree = TxTree::new();
        tree.insert(5u64, 0u64);

        let mut a = tree.begin();
        let mut b = tree.begin();
        assert!(a.insert(3, 0));
        assert!(b.insert(8, 0));

        assert!(a.commit().is_ok());
        assert_eq!(b.commit(), Err(CommitError::Conflict));

        // The loser's speculation left no trace.
        assert_eq!(in_order(&tree), vec![3, 5]);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_retry_after_conflict_sees_winner() {
        let tree = TxTree::new();
        tree.insert(5u64, 0u64);

        let mut a = tree.begin();
        let mut b = tree.begin();
        assert!(a.insert(3, 1));
        assert!(b.insert(3, 2));

        assert!(a.commit().is_ok());
        assert_eq!(b.commit(), Err(CommitError::Conflict));

        // The retry observes the winner's key and reports "already present".
        assert!(!tree.insert(3, 2));
        assert_eq!(tree.get(&3), Some(1));
    }

    #[test]
    fn test_dropped_txn_discards_speculation() {
        let tree = TxTree::new();
        tree.insert(5u64, 0u64);
        let root = tree.root_ptr();

        {
            let mut txn = tree.begin();
            assert!(txn.insert(3, 0));
            assert!(txn.remove(&5));
            // Dropped without commit.
        }

        assert!(ptr::eq(tree.root_ptr(), root));
        assert_eq!(in_order(&tree), vec![5]);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_multi_write_txn_is_atomic() {
        let tree = TxTree::new();
        for k in [5u64, 3, 8] {
            tree.insert(k, 0);
        }

        let mut txn = tree.begin();
        assert!(txn.insert(1, 0));
        assert!(txn.remove(&8));
        assert!(txn.insert(9, 0));
        assert!(txn.commit().is_ok());

        assert_eq!(in_order(&tree), vec![1, 3, 5, 9]);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_txn_sees_its_own_writes() {
        let tree = TxTree::new();
        tree.insert(5u64, 0u64);

        let mut txn = tree.begin();
        assert!(txn.insert(3, 30));
        assert_eq!(txn.get(&3), Some(&30));
        assert!(txn.remove(&3));
        assert_eq!(txn.get(&3), None);
        assert!(txn.commit().is_ok());

        // Insert-then-remove of the same key inside one transaction nets
        // out to nothing.
        assert_eq!(in_order(&tree), vec![5]);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_remove_last_key_empties_tree() {
        let tree = TxTree::new();
        tree.insert(5u64, 0u64);

        assert!(tree.remove(&5));
        assert!(tree.is_empty());
        assert!(tree.root_ptr().is_null());
        assert!(!tree.remove(&5));
    }

    #[test]
    fn test_snapshot_isolated_across_commit() {
        let tree = TxTree::new();
        for k in [5u64, 3, 8] {
            tree.insert(k, k * 10);
        }
        let guard = tree.pin();
        let snap = tree.snapshot(&guard);

        tree.remove(&8);
        tree.insert(1, 10);

        let snap_keys: Vec<u64> = snap.iter().map(|(k, _)| *k).collect();
        assert_eq!(snap_keys, vec![3, 5, 8]);
        assert_eq!(snap.get(&8), Some(&80));
        assert_eq!(snap.get(&1), None);

        assert_eq!(in_order(&tree), vec![1, 3, 5]);
    }

    #[test]
    fn test_reinsert_after_logical_delete() {
        let tree = TxTree::new();
        for k in [5u64, 3, 8, 1, 4] {
            tree.insert(k, 0);
        }
        assert!(tree.remove(&3));
        assert!(tree.insert(3, 333));

        assert_eq!(tree.get(&3), Some(333));
        assert_eq!(in_order(&tree), vec![1, 3, 4, 5, 8]);
    }
}
