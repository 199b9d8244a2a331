//! Structural statistics collaborator.
//!
//! The trees expose their shape through the [`NodeProbe`] capability trait
//! (leaf test, child enumeration, deletion test) and this module walks it.
//! Collection is read-only and lives entirely outside the tree logic; it
//! exists so diagnostics never need access to node internals.

use crate::node::{Node, LEFT, RIGHT};

/// Read-only node capabilities needed to collect statistics.
///
/// Implement this to feed an external tree shape into
/// [`StructuralStats::collect`].
pub trait NodeProbe: Copy {
    /// The child in `slot` ([`LEFT`] or [`RIGHT`]), if any.
    fn child(self, slot: usize) -> Option<Self>;

    /// Whether the node is logically deleted.
    fn is_deleted(self) -> bool;

    /// Whether the node has no children.
    fn is_leaf(self) -> bool {
        self.child(LEFT).is_none() && self.child(RIGHT).is_none()
    }
}

/// Structural statistics of one tree version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StructuralStats {
    /// Total nodes reachable from the root, deleted ones included.
    pub nodes: usize,

    /// Nodes holding a live key.
    pub live_keys: usize,

    /// Logically deleted nodes still linked into the version.
    pub deleted: usize,

    /// Nodes with no children.
    pub leaves: usize,

    /// Length of the longest root-to-leaf path (0 for an empty tree).
    pub max_depth: usize,
}

impl StructuralStats {
    /// Collect statistics by iterative DFS over `root`.
    pub fn collect<P: NodeProbe>(root: Option<P>) -> Self {
        let mut stats = Self::default();
        let Some(root) = root else { return stats };

        let mut stack: Vec<(P, usize)> = vec![(root, 1)];
        while let Some((node, depth)) = stack.pop() {
            stats.nodes += 1;
            stats.max_depth = stats.max_depth.max(depth);

            if node.is_deleted() {
                stats.deleted += 1;
            } else {
                stats.live_keys += 1;
            }
            if node.is_leaf() {
                stats.leaves += 1;
            }

            for slot in [LEFT, RIGHT] {
                if let Some(child) = node.child(slot) {
                    stack.push((child, depth + 1));
                }
            }
        }
        stats
    }

    /// Collect statistics for a raw node version.
    ///
    /// # Safety
    ///
    /// `root` must be null or point to a valid, frozen version whose nodes
    /// stay alive for the duration of the call.
    pub(crate) unsafe fn collect_raw<K, V>(root: *mut Node<K, V>) -> Self {
        let probe = if root.is_null() {
            None
        } else {
            Some(RawProbe(root))
        };
        Self::collect(probe)
    }
}

/// [`NodeProbe`] over a raw node pointer.
struct RawProbe<K, V>(*mut Node<K, V>);

impl<K, V> Clone for RawProbe<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for RawProbe<K, V> {}

impl<K, V> NodeProbe for RawProbe<K, V> {
    fn child(self, slot: usize) -> Option<Self> {
        // SAFETY: constructed only over valid, alive versions.
        let child = unsafe { (*self.0).child(slot) };
        if child.is_null() {
            None
        } else {
            Some(Self(child))
        }
    }

    fn is_deleted(self) -> bool {
        // SAFETY: constructed only over valid, alive versions.
        unsafe { (*self.0).is_deleted() }
    }
}

// ============================================================================
//  Tests
// ============================================================================
