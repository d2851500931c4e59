//! Structural change batches.
//!
//! A [`ChangeSet`] is the diff between two committed tree snapshots, keyed by
//! node identity. Removal is exactly-once per id: every descendant of a
//! removed subtree has its own id and therefore its own single entry in
//! `removed` — the engine's caches evict against that batch.

use crate::{NodeId, TreeIndex};
use serde::{Deserialize, Serialize};

/// Node-id batches describing one committed mutation.
///
/// `changed` compares whole subtrees: editing a leaf marks the leaf and every
/// ancestor up to the root as changed, so a consumer watching any enclosing
/// node observes the edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    pub changed: Vec<NodeId>,
}

impl ChangeSet {
    /// Diff two snapshots. All three batches are sorted by id so listener
    /// delivery is deterministic.
    pub fn between(old: &TreeIndex, new: &TreeIndex) -> Self {
        let mut set = ChangeSet::default();

        for id in old.ids() {
            if !new.contains(id) {
                set.removed.push(id);
            }
        }
        for id in new.ids() {
            match old.node(id) {
                None => set.added.push(id),
                Some(prev) => {
                    if new.node(id) != Some(prev) {
                        set.changed.push(id);
                    }
                }
            }
        }

        set.added.sort_unstable();
        set.removed.sort_unstable();
        set.changed.sort_unstable();
        set
    }

    /// True if the mutation touched nothing.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
