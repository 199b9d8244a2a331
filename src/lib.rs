//! # `DupTree`
//!
//! Ordered binary search trees updated by node duplication instead of
//! in-place mutation.
//!
//! Every write copies the nodes on the modified path and relinks the copies
//! into a new version of the tree, leaving untouched subtrees shared between
//! versions. Readers that captured a root before a write keep traversing a
//! complete, frozen snapshot; nothing published is ever mutated again.
//!
//! Three variants escalate in how ancestors are relinked:
//!
//! | Variant | Relinking | Writers |
//! |---------|-----------|---------|
//! | [`ClosureTree`] | single-node duplicate + explicit fix-up pass | one, exclusive |
//! | [`PathCopyTree`] | eager copy of the whole path to a new root | one, snapshots stay live |
//! | [`TxTree`] | lazy parent discovery + validated commit | many, optimistic |
//!
//! ## Thread Safety
//!
//! Only [`TxTree`] is built for concurrent use: writers speculate inside a
//! [`Txn`] without locks and serialize solely on the validate-and-publish
//! step, while readers pin a [`seize`] guard and traverse whichever version
//! was current when they started.
//!
//! ```rust
//! use duptree::TxTree;
//!
//! let tree: TxTree<u64, &str> = TxTree::new();
//!
//! // Convenience operations retry internally on commit conflicts.
//! assert!(tree.insert(5, "five"));
//! assert!(!tree.insert(5, "again"));
//!
//! // Or drive a transaction explicitly.
//! let mut txn = tree.begin();
//! txn.insert(3, "three");
//! txn.commit().expect("no concurrent writer in this example");
//! ```
//!
//! ## Deletion
//!
//! Removing a leaf unlinks it; removing an internal node only marks it
//! logically deleted, keeping its subtree in place. Searches and iteration
//! skip deleted nodes, and structural statistics report them separately.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod alloc;
pub mod dup;
pub mod node;
pub mod stats;
pub mod tree;

mod tracing_helpers;

// Re-export main types for convenience
pub use alloc::{ArenaAllocator, BoxAllocator, NodeAllocator};
pub use dup::{DupEntry, DupMap, FieldChange, ParentMap};
pub use node::{Node, LEFT, RIGHT};
pub use stats::{NodeProbe, StructuralStats};
pub use tree::{
    ClosureTree, CommitError, InorderIter, PathCopyTree, Snapshot, TxSnapshot, TxTree, Txn,
};
