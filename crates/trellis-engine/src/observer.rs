//! Tracked document tree.
//!
//! The observer exclusively owns the document root and every structural
//! index over it (id→node, id→parent). Mutation happens only inside
//! [`Observer::change`]; `&mut` exclusivity guarantees no reader observes a
//! partially-applied batch. Each commit diffs the new snapshot against the
//! previous one and delivers the resulting [`ChangeSet`] to every listener.
//! Removal is a disposal event: every descendant of a removed subtree
//! appears exactly once in the batch's `removed` ids.

use crate::memo::Region;
use slab::Slab;
use std::collections::BTreeSet;
use tracing::trace;
use trellis_types::ast::{Node, StateRoot};
use trellis_types::{ChangeSet, NodeId, TreeIndex};

/// Handle to a change-listener subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

/// The outcome of one committed mutation.
pub struct Commit {
    /// Added/removed/changed node-id batches.
    pub changes: ChangeSet,
    /// Program regions the batch touched (internal invalidation input).
    pub(crate) regions: BTreeSet<Region>,
}

type Listener = Box<dyn FnMut(&ChangeSet)>;

/// Owns the document tree, its structural indices, and change listeners.
pub struct Observer {
    root: StateRoot,
    index: TreeIndex,
    listeners: Slab<Listener>,
}

impl Observer {
    /// Start tracking `root`.
    pub fn new(root: StateRoot) -> Self {
        let index = TreeIndex::build(&root);
        if let Some(max) = index.max_id() {
            NodeId::advance_past(max);
        }
        Self {
            root,
            index,
            listeners: Slab::new(),
        }
    }

    /// The committed tree.
    pub fn root(&self) -> &StateRoot {
        &self.root
    }

    /// Run `mutator` against the tree and commit the whole batch atomically.
    ///
    /// Mutator panics propagate to the caller uncaught; nothing is notified
    /// for a batch that did not complete.
    pub fn change(&mut self, mutator: impl FnOnce(&mut StateRoot)) -> Commit {
        mutator(&mut self.root);
        self.commit()
    }

    /// Swap the tracked root wholesale. All indices are rebuilt against the
    /// new root; every old node not present in it is disposed.
    pub fn replace(&mut self, new_root: StateRoot) -> Commit {
        self.root = new_root;
        self.commit()
    }

    /// Identity-indexed lookup, O(1) against the committed snapshot.
    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.index.node(id).cloned()
    }

    /// Parent back-reference by id.
    pub fn parent_id(&self, id: NodeId) -> Option<NodeId> {
        self.index.parent_id(id)
    }

    /// Parent back-reference, resolved to the parent node.
    pub fn parent(&self, id: NodeId) -> Option<Node> {
        self.index.parent_id(id).and_then(|p| self.node(p))
    }

    /// The committed identity index.
    pub(crate) fn index(&self) -> &TreeIndex {
        &self.index
    }

    /// Register a change listener. Listeners receive every non-empty commit
    /// batch; each subscription is disposable independently of the others.
    pub fn subscribe(&mut self, listener: impl FnMut(&ChangeSet) + 'static) -> ListenerId {
        ListenerId(self.listeners.insert(Box::new(listener)))
    }

    /// Dispose a listener. Disposing twice is a no-op.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.try_remove(id.0).is_some()
    }

    // ══════════════════════════════════════════════════════════════════════
    // Commit
    // ══════════════════════════════════════════════════════════════════════

    fn commit(&mut self) -> Commit {
        let new_index = TreeIndex::build(&self.root);
        if let Some(max) = new_index.max_id() {
            NodeId::advance_past(max);
        }
        let changes = ChangeSet::between(&self.index, &new_index);

        let mut regions = BTreeSet::new();
        for &id in &changes.removed {
            if let Some(region) = region_of(id, &self.index) {
                regions.insert(region);
            }
        }
        for &id in changes.added.iter().chain(&changes.changed) {
            if let Some(region) = region_of(id, &new_index) {
                regions.insert(region);
            }
        }

        self.index = new_index;

        if !changes.is_empty() {
            trace!(
                added = changes.added.len(),
                removed = changes.removed.len(),
                changed = changes.changed.len(),
                "commit"
            );
            for (_, listener) in self.listeners.iter_mut() {
                listener(&changes);
            }
        }

        Commit { changes, regions }
    }
}

/// Attribute a node to the program region it sits under by climbing the
/// parent chain until a global or component declaration is found.
fn region_of(id: NodeId, index: &TreeIndex) -> Option<Region> {
    let mut current = id;
    loop {
        match index.node(current)? {
            Node::Global(_) => return Some(Region::Globals),
            Node::Component(_) => return Some(Region::Components),
            _ => current = index.parent_id(current)?,
        }
    }
}
