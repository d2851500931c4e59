//! Stable node identity.
//!
//! Every tree node carries a [`NodeId`] allocated at construction from a
//! process-wide monotonic counter. Caches and structural indices are keyed by
//! node identity rather than by path, so a node keeps its id across moves
//! within the tree. Only the id *source* is global; every collection keyed by
//! `NodeId` belongs to one engine instance.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable integer identity of a document tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying u64 value.
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Advance the allocator past `id`.
    ///
    /// Called when a deserialized tree is installed, so ids allocated for
    /// nodes created afterwards never collide with the loaded ones.
    pub fn advance_past(id: NodeId) {
        NEXT_NODE_ID.fetch_max(id.0 + 1, Ordering::Relaxed);
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Identifier-reference node id → lexical scope distance.
///
/// Produced by the resolver, consumed by the evaluator: a distance of 0 means
/// the innermost enclosing scope declares the name.
pub type ScopeDistances = HashMap<NodeId, u32>;
