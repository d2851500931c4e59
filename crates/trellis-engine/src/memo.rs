//! Explicit incremental dataflow substrate.
//!
//! Each cached computation (sync pass, frame render, subscriber collection)
//! owns a [`Memo`] recording the `(dependency, version)` pairs it read on its
//! last run. The orchestrator bumps versions in the shared [`VersionMap`]
//! when a committed mutation touches a tree region, a node, or an
//! environment binding. A computation recomputes only if a member of its
//! recorded read-set changed since the last run.

use std::collections::HashMap;
use trellis_types::NodeId;

/// A dependency a cached computation can read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum DepKey {
    /// The externally-configured + extension-contributed global set.
    ConfigGlobals,
    /// The externally-configured + extension-contributed component list.
    ConfigComponents,
    /// The document's global-declaration region.
    ProgramGlobals,
    /// The document's component-declaration region.
    ProgramComponents,
    /// One environment binding, by name.
    Env(String),
    /// One tree node, by identity.
    Node(NodeId),
}

/// Program region a touched node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Region {
    Globals,
    Components,
}

impl Region {
    pub(crate) fn dep_key(self) -> DepKey {
        match self {
            Region::Globals => DepKey::ProgramGlobals,
            Region::Components => DepKey::ProgramComponents,
        }
    }
}

/// Dependency-key → version counter. Versions only ever advance.
#[derive(Debug, Default)]
pub(crate) struct VersionMap {
    versions: HashMap<DepKey, u64>,
    clock: u64,
}

impl VersionMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Advance the clock and stamp `key` with it.
    pub(crate) fn bump(&mut self, key: DepKey) {
        self.clock += 1;
        self.versions.insert(key, self.clock);
    }

    /// Current version of `key` (0 if never bumped).
    pub(crate) fn version(&self, key: &DepKey) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }
}

/// The recorded read-set of one cached computation.
#[derive(Debug, Default)]
pub(crate) struct Memo {
    deps: Vec<(DepKey, u64)>,
    ran: bool,
}

impl Memo {
    /// True if the computation has never run, or any recorded dependency's
    /// version moved since it last ran.
    pub(crate) fn is_stale(&self, versions: &VersionMap) -> bool {
        !self.ran || self.deps.iter().any(|(key, v)| versions.version(key) != *v)
    }

    /// Store the read-set of a completed run at current versions.
    pub(crate) fn record(
        &mut self,
        deps: impl IntoIterator<Item = DepKey>,
        versions: &VersionMap,
    ) {
        self.deps.clear();
        for key in deps {
            let version = versions.version(&key);
            self.deps.push((key, version));
        }
        self.ran = true;
    }

    /// Forget the last run: the next staleness check reports stale.
    pub(crate) fn reset(&mut self) {
        self.deps.clear();
        self.ran = false;
    }
}
