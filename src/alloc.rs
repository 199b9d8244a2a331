//! Node allocation and reclamation boundary.
//!
//! The trees never free a node on their own authority; they only stop
//! referencing it. Allocation and reclamation are delegated through
//! [`NodeAllocator`]:
//!
//! - [`ArenaAllocator`] backs the single-writer variants. Nodes live until
//!   the tree drops, which is also what keeps superseded versions readable
//!   as snapshots.
//! - [`BoxAllocator`] backs the transactional variant: plain
//!   `Box::into_raw` allocation, with *published* nodes retired through a
//!   [`seize::Collector`] guard (see [`reclaim_node`]) and never-published
//!   duplicates freed directly on abort.

use std::ptr as StdPtr;

use seize::Collector;

use crate::node::{Node, LEFT, RIGHT};

// ============================================================================
//  NodeAllocator
// ============================================================================

/// Trait for allocating and deallocating tree nodes.
///
/// Implementations must guarantee pointer stability: a returned pointer
/// stays valid until `dealloc` is called with it or the allocator is
/// dropped.
pub trait NodeAllocator<K, V> {
    /// Allocate a node and return a stable raw pointer.
    fn alloc(&mut self, node: Box<Node<K, V>>) -> *mut Node<K, V>;

    /// Deallocate a node.
    ///
    /// For arena-style allocators this is a no-op; nodes are freed when the
    /// allocator drops.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `alloc` on this allocator, must not
    /// have been deallocated already, and must be unreachable from every
    /// published version. After this call the pointer must not be
    /// dereferenced.
    #[allow(unused_variables)]
    unsafe fn dealloc(&mut self, ptr: *mut Node<K, V>) {
        // Default: no-op for arena-style allocators.
    }
}

// ============================================================================
//  ArenaAllocator
// ============================================================================

/// Arena-based allocator for the single-writer tree variants.
///
/// Nodes are stored as `Vec<Box<Node>>`: the `Box` provides a stable heap
/// address while the `Vec` tracks ownership, so pointers survive `Vec`
/// reallocation. All nodes, including superseded ones, are freed when the
/// arena (and thus the tree) is dropped.
pub struct ArenaAllocator<K, V> {
    nodes: Vec<Box<Node<K, V>>>,
}

impl<K, V> ArenaAllocator<K, V> {
    /// Create an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Total number of nodes ever allocated, superseded ones included.
    ///
    /// Mutations duplicate exactly the nodes on the modified path, so the
    /// delta across one operation is the duplication cost of that
    /// operation.
    #[inline]
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.nodes.len()
    }
}

impl<K, V> Default for ArenaAllocator<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> NodeAllocator<K, V> for ArenaAllocator<K, V> {
    fn alloc(&mut self, node: Box<Node<K, V>>) -> *mut Node<K, V> {
        self.nodes.push(node);
        let idx: usize = self.nodes.len() - 1;

        // SAFETY: we just pushed, so idx is valid. The pointer is derived
        // after storing to keep Stacked Borrows provenance; the Box gives a
        // stable heap address even if the Vec reallocates.
        #[allow(clippy::indexing_slicing)]
        unsafe {
            StdPtr::from_mut::<Node<K, V>>(self.nodes.get_unchecked_mut(idx).as_mut())
        }
    }

    // dealloc uses the default no-op.
}

// ============================================================================
//  BoxAllocator
// ============================================================================

/// Plain `Box`-backed allocator for the transactional variant.
///
/// `dealloc` frees immediately; it is only legal for nodes that were never
/// published (aborted duplicates). Published nodes must instead be retired
/// through a seize guard, see [`reclaim_node`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BoxAllocator;

impl BoxAllocator {
    /// Create a new allocator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl<K, V> NodeAllocator<K, V> for BoxAllocator {
    fn alloc(&mut self, node: Box<Node<K, V>>) -> *mut Node<K, V> {
        Box::into_raw(node)
    }

    unsafe fn dealloc(&mut self, ptr: *mut Node<K, V>) {
        // SAFETY: caller guarantees ptr came from alloc and is unreachable.
        unsafe { drop(Box::from_raw(ptr)) };
    }
}

// ============================================================================
//  Seize reclaim callbacks
// ============================================================================

/// Reclaim a single boxed node (seize callback for `defer_retire`).
///
/// # Safety
///
/// - `ptr` must point to a valid `Node<K, V>` allocated via `Box::into_raw`.
/// - Must only run once seize determines no guard can still reach it.
pub(crate) unsafe fn reclaim_node<K, V>(ptr: *mut Node<K, V>, _collector: &Collector) {
    // SAFETY: caller guarantees ptr is valid and from Box::into_raw; seize
    // ensures no readers remain.
    unsafe { drop(Box::from_raw(ptr)) };
}

/// Free an entire subtree with an iterative DFS.
///
/// Used at tree drop for the live version. Superseded nodes are not in the
/// live subtree; they were retired individually when they were unlinked.
///
/// # Safety
///
/// - `root` must be null or point to a valid `Node<K, V>` subtree allocated
///   via `Box::into_raw`.
/// - The subtree must be unreachable by any new traversal.
pub(crate) unsafe fn reclaim_subtree<K, V>(root: *mut Node<K, V>) {
    if root.is_null() {
        return;
    }

    let mut stack: Vec<*mut Node<K, V>> = Vec::with_capacity(32);
    stack.push(root);

    while let Some(node) = stack.pop() {
        // SAFETY: every pushed pointer is a non-null child of a valid node.
        unsafe {
            for slot in [LEFT, RIGHT] {
                let child = (*node).child(slot);
                if !child.is_null() {
                    stack.push(child);
                }
            }
            drop(Box::from_raw(node));
        }
    }
}

// ============================================================================
//  Tests
// ============================================================================
