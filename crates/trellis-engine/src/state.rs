//! State orchestrator.
//!
//! Owns one observed document root, one binding environment, one resolver,
//! one extension registry, the frame set, and the subscriber set, and drives
//! the synchronization algorithm after every committed mutation:
//!
//! 1. re-resolve identifier scope distances against the current tree shape;
//! 2. run the three memoized sync passes in fixed order — globals,
//!    components, environment cleanup — each a no-op when nothing it read
//!    has changed;
//! 3. render every live frame (clean frames reuse their prior output);
//! 4. re-collect every stale subscriber and notify the ones whose derived
//!    value actually changed.

use crate::error::EngineError;
use crate::extension::{Extension, ExtensionDefinition, ExtensionRegistry};
use crate::frame::{Frame, FrameId, FrameOpts, RenderCtx};
use crate::memo::{DepKey, Memo, VersionMap};
use crate::observer::{Commit, ListenerId, Observer};
use crate::query::Query;
use crate::resolver::Resolver;
use slab::Slab;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, trace};
use trellis_eval::{Environment, Evaluator};
use trellis_types::ast::{Component, Node, Program, StateRoot};
use trellis_types::{ChangeSet, NodeId, Val};

/// Construction input.
#[derive(Debug, Clone, Default)]
pub struct StateOpts {
    pub program: Program,
    /// Externally-configured components, visible alongside document ones.
    pub components: Vec<Component>,
    /// Externally-configured global bindings.
    pub globals: BTreeMap<String, Val>,
    /// Extension definitions, in registration order.
    pub extensions: Vec<ExtensionDefinition>,
}

impl StateOpts {
    pub fn new(program: Program) -> Self {
        Self {
            program,
            ..Default::default()
        }
    }
}

/// The merged configuration: external globals/components plus every
/// extension's contributions in registration order (later-registered
/// extensions overwrite earlier ones on duplicate global names).
#[derive(Debug, Clone)]
pub struct Config {
    pub globals: BTreeMap<String, Val>,
    pub components: Vec<Component>,
}

/// Subscriber registration options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriberOpts {
    /// Fire `on_collect` once synchronously at registration time, with the
    /// initial collected value as both arguments.
    pub fire_immediately: bool,
}

/// Handle to a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

struct Subscriber {
    collect: Box<dyn Fn(&Query) -> Val>,
    on_collect: Box<dyn FnMut(&Val, &Val)>,
    opts: SubscriberOpts,
    last: Val,
    memo: Memo,
}

/// What the most recent `sync()` actually recomputed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub globals_recomputed: bool,
    pub components_recomputed: bool,
    pub cleanup_recomputed: bool,
    pub frames_rendered: usize,
    pub subscribers_notified: usize,
}

/// The engine: one document, one environment, one resolver, one registry,
/// frames, subscribers. Every collection is owned by this instance —
/// independent `State`s coexist freely.
pub struct State {
    external_globals: BTreeMap<String, Val>,
    external_components: Vec<Component>,

    observer: Observer,
    env: Environment,
    resolver: Resolver,
    registry: ExtensionRegistry,

    frames: Slab<Frame>,
    frame_ids: HashMap<String, FrameId>,
    subscribers: Slab<Subscriber>,

    versions: VersionMap,
    memo_globals: Memo,
    memo_components: Memo,
    memo_cleanup: Memo,

    stats: SyncStats,
}

impl State {
    /// Wrap the program into a tracked root, initialize extensions, and run
    /// the initial sync.
    pub fn new(opts: StateOpts) -> Result<Self, EngineError> {
        let root = StateRoot::new(opts.program);
        let mut registry = ExtensionRegistry::new(opts.extensions);
        registry.init();

        let mut state = Self {
            external_globals: opts.globals,
            external_components: opts.components,
            observer: Observer::new(root),
            env: Environment::new(),
            resolver: Resolver::new(),
            registry,
            frames: Slab::new(),
            frame_ids: HashMap::new(),
            subscribers: Slab::new(),
            versions: VersionMap::new(),
            memo_globals: Memo::default(),
            memo_components: Memo::default(),
            memo_cleanup: Memo::default(),
            stats: SyncStats::default(),
        };
        state.sync()?;
        Ok(state)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Configuration
    // ══════════════════════════════════════════════════════════════════════

    /// The merged configuration for the current registration state.
    pub fn config(&self) -> Config {
        let mut globals = self.external_globals.clone();
        let mut components = self.external_components.clone();
        for extension in self.registry.extensions() {
            for (name, value) in &extension.definition().globals {
                globals.insert(name.clone(), value.clone());
            }
            components.extend(extension.definition().components.iter().cloned());
        }
        Config {
            globals,
            components,
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Sync
    // ══════════════════════════════════════════════════════════════════════

    /// Run the synchronization algorithm. Calling this repeatedly with no
    /// intervening change is a no-op for every pass, every frame, and every
    /// subscriber.
    pub fn sync(&mut self) -> Result<(), EngineError> {
        let config = self.config();
        self.resolver
            .resolve_program(self.observer.root(), &config);
        self.stats = SyncStats::default();

        self.sync_globals(&config)?;
        self.sync_components(&config);
        self.sync_cleanup(&config);
        self.render_frames()?;
        self.run_subscribers();

        debug!(stats = ?self.stats, "sync complete");
        Ok(())
    }

    /// Globals pass: write every externally-configured global, then every
    /// document-declared global (evaluated from its initializer against the
    /// current environment).
    fn sync_globals(&mut self, config: &Config) -> Result<(), EngineError> {
        if !self.memo_globals.is_stale(&self.versions) {
            return Ok(());
        }
        trace!("globals pass");

        let mut deps = vec![DepKey::ConfigGlobals, DepKey::ProgramGlobals];
        for (name, value) in &config.globals {
            if self.env.set(name, value.clone()) {
                self.versions.bump(DepKey::Env(name.clone()));
            }
        }

        let mut ev = Evaluator::with_distances(self.resolver.distances());
        for global in &self.observer.root().program.globals {
            let value = ev.eval_expr(&global.init, &self.env)?;
            deps.extend(ev.trace.drain(..).map(DepKey::Env));
            if self.env.set(&global.name, value) {
                self.versions.bump(DepKey::Env(global.name.clone()));
            }
        }

        self.memo_globals.record(deps, &self.versions);
        self.stats.globals_recomputed = true;
        Ok(())
    }

    /// Components pass: write every visible component into the environment
    /// keyed by name — externally-configured first, then document-declared.
    fn sync_components(&mut self, config: &Config) {
        if !self.memo_components.is_stale(&self.versions) {
            return;
        }
        trace!("components pass");

        for component in &config.components {
            if self
                .env
                .set(&component.name, Val::Component(component.clone()))
            {
                self.versions.bump(DepKey::Env(component.name.clone()));
            }
        }
        for component in &self.observer.root().program.components {
            if self
                .env
                .set(&component.name, Val::Component(component.clone()))
            {
                self.versions.bump(DepKey::Env(component.name.clone()));
            }
        }

        self.memo_components.record(
            [DepKey::ConfigComponents, DepKey::ProgramComponents],
            &self.versions,
        );
        self.stats.components_recomputed = true;
    }

    /// Cleanup pass: delete every environment binding whose name is outside
    /// the currently valid name set.
    fn sync_cleanup(&mut self, config: &Config) {
        if !self.memo_cleanup.is_stale(&self.versions) {
            return;
        }
        trace!("cleanup pass");

        let mut valid: HashSet<&str> = HashSet::new();
        valid.extend(config.globals.keys().map(String::as_str));
        valid.extend(config.components.iter().map(|c| c.name.as_str()));
        let root = self.observer.root();
        valid.extend(root.program.globals.iter().map(|g| g.name.as_str()));
        valid.extend(root.program.components.iter().map(|c| c.name.as_str()));

        let stale: Vec<String> = self
            .env
            .global_names()
            .filter(|name| !valid.contains(name.as_str()))
            .cloned()
            .collect();
        for name in stale {
            self.env.delete(&name);
            self.versions.bump(DepKey::Env(name));
        }

        self.memo_cleanup.record(
            [
                DepKey::ConfigGlobals,
                DepKey::ConfigComponents,
                DepKey::ProgramGlobals,
                DepKey::ProgramComponents,
            ],
            &self.versions,
        );
        self.stats.cleanup_recomputed = true;
    }

    fn render_frames(&mut self) -> Result<(), EngineError> {
        for (_, frame) in self.frames.iter_mut() {
            let mut ctx = RenderCtx {
                env: &mut self.env,
                distances: self.resolver.distances(),
            };
            if frame.render(&mut ctx, &self.versions)? {
                self.stats.frames_rendered += 1;
            }
        }
        Ok(())
    }

    fn run_subscribers(&mut self) {
        for (_, subscriber) in self.subscribers.iter_mut() {
            if !subscriber.memo.is_stale(&self.versions) {
                continue;
            }
            let query = Query::new(&self.env, &self.observer);
            let value = (subscriber.collect)(&query);
            subscriber.memo.record(query.into_trace(), &self.versions);
            if value != subscriber.last {
                (subscriber.on_collect)(&value, &subscriber.last);
                subscriber.last = value;
                self.stats.subscribers_notified += 1;
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Mutation
    // ══════════════════════════════════════════════════════════════════════

    /// The sole sanctioned mutation entry point: commit the mutator's edits
    /// as one atomic batch, evict stale resolver entries, then sync.
    pub fn change(&mut self, mutator: impl FnOnce(&mut StateRoot)) -> Result<(), EngineError> {
        let commit = self.observer.change(mutator);
        self.apply_commit(&commit);
        self.sync()
    }

    fn apply_commit(&mut self, commit: &Commit) {
        let evicted = self.resolver.evict(&commit.changes.removed);
        if evicted > 0 {
            trace!(evicted, "evicted resolver cache entries");
        }
        for &id in commit
            .changes
            .added
            .iter()
            .chain(&commit.changes.removed)
            .chain(&commit.changes.changed)
        {
            self.versions.bump(DepKey::Node(id));
        }
        for &region in &commit.regions {
            self.versions.bump(region.dep_key());
        }
    }

    /// Swap the whole document root: dispose every subscriber watch, rebuild
    /// environment/resolver/version state from scratch, clear the frame set,
    /// re-initialize extensions, re-establish the retained subscribers, and
    /// sync against the new root.
    pub fn replace(&mut self, new_root: StateRoot) -> Result<(), EngineError> {
        debug!("replacing document root");

        // Dispose every live watch exactly once; registrations are retained.
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber.memo.reset();
        }

        self.observer.replace(new_root);
        self.env = Environment::new();
        self.resolver = Resolver::new();
        self.versions = VersionMap::new();
        self.memo_globals.reset();
        self.memo_components.reset();
        self.memo_cleanup.reset();
        self.frames.clear();
        self.frame_ids.clear();
        self.registry.replace();

        // Re-establish each retained subscriber against the fresh root,
        // honoring fire_immediately again.
        for (_, subscriber) in self.subscribers.iter_mut() {
            let query = Query::new(&self.env, &self.observer);
            let value = (subscriber.collect)(&query);
            subscriber.memo.record(query.into_trace(), &self.versions);
            if subscriber.opts.fire_immediately {
                (subscriber.on_collect)(&value, &value);
            }
            subscriber.last = value;
        }

        self.sync()
    }

    // ══════════════════════════════════════════════════════════════════════
    // Frames
    // ══════════════════════════════════════════════════════════════════════

    /// Create a frame and render it once immediately. A failed initial
    /// render discards the frame and propagates the error.
    pub fn create_frame(&mut self, opts: FrameOpts) -> Result<FrameId, EngineError> {
        let stable_id = opts.id.clone();
        let key = FrameId(self.frames.insert(Frame::new(opts)));

        let frame = &mut self.frames[key.0];
        let mut ctx = RenderCtx {
            env: &mut self.env,
            distances: self.resolver.distances(),
        };
        if let Err(err) = frame.render(&mut ctx, &self.versions) {
            self.frames.remove(key.0);
            return Err(err);
        }

        if let Some(id) = stable_id {
            // duplicate ids overwrite the previous mapping silently
            self.frame_ids.insert(id, key);
        }
        Ok(key)
    }

    /// Remove a frame. O(1); removing twice is a no-op.
    pub fn remove_frame(&mut self, id: FrameId) {
        if let Some(frame) = self.frames.try_remove(id.0) {
            if let Some(stable) = frame.id() {
                if self.frame_ids.get(stable) == Some(&id) {
                    self.frame_ids.remove(stable);
                }
            }
        }
    }

    /// Look up a frame by caller-supplied stable id.
    pub fn frame_by_id(&self, id: &str) -> Option<FrameId> {
        let key = self.frame_ids.get(id).copied()?;
        self.frames.contains(key.0).then_some(key)
    }

    /// Access a live frame.
    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id.0)
    }

    /// Number of live frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Discard a frame's output and recompute it fully. Required where
    /// incremental reuse is unsafe.
    pub fn hard_rerender(&mut self, id: FrameId) -> Result<(), EngineError> {
        let Some(frame) = self.frames.get_mut(id.0) else {
            return Ok(());
        };
        let mut ctx = RenderCtx {
            env: &mut self.env,
            distances: self.resolver.distances(),
        };
        frame.hard_rerender(&mut ctx, &self.versions)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Subscribers
    // ══════════════════════════════════════════════════════════════════════

    /// Register a derived-value watcher. `collect` runs against the
    /// read-only [`Query`] surface; whenever a relevant recomputation
    /// changes its result, `on_collect(new, previous)` fires.
    pub fn subscribe(
        &mut self,
        collect: impl Fn(&Query) -> Val + 'static,
        on_collect: impl FnMut(&Val, &Val) + 'static,
        opts: SubscriberOpts,
    ) -> SubscriberId {
        let collect: Box<dyn Fn(&Query) -> Val> = Box::new(collect);
        let mut on_collect: Box<dyn FnMut(&Val, &Val)> = Box::new(on_collect);

        let query = Query::new(&self.env, &self.observer);
        let value = collect(&query);
        let mut memo = Memo::default();
        memo.record(query.into_trace(), &self.versions);
        if opts.fire_immediately {
            on_collect(&value, &value);
        }

        SubscriberId(self.subscribers.insert(Subscriber {
            collect,
            on_collect,
            opts,
            last: value,
            memo,
        }))
    }

    /// Dispose a subscriber. Disposing more than once is a no-op.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.subscribers.try_remove(id.0).is_some()
    }

    // ══════════════════════════════════════════════════════════════════════
    // Lookups & delegation
    // ══════════════════════════════════════════════════════════════════════

    /// The current tracked root.
    pub fn root(&self) -> &StateRoot {
        self.observer.root()
    }

    /// The current tracked root as a JSON value, for an external serializer.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.observer.root())
    }

    /// Identity-indexed node lookup.
    pub fn node_from_id(&self, id: NodeId) -> Option<Node> {
        self.observer.node(id)
    }

    /// Parent back-reference lookup.
    pub fn parent_node(&self, id: NodeId) -> Option<Node> {
        self.observer.parent(id)
    }

    /// Cached scope distance of an identifier-reference node.
    pub fn scope_distance(&self, id: NodeId) -> Option<u32> {
        self.resolver.distance(id)
    }

    /// Number of cached scope distances.
    pub fn resolver_cache_size(&self) -> usize {
        self.resolver.len()
    }

    /// Low-level change notification: batches of added/removed/changed node
    /// ids per committed mutation.
    pub fn listen_to_changes(
        &mut self,
        listener: impl FnMut(&ChangeSet) + 'static,
    ) -> ListenerId {
        self.observer.subscribe(listener)
    }

    /// Dispose a change listener. Disposing twice is a no-op.
    pub fn unlisten(&mut self, id: ListenerId) -> bool {
        self.observer.unsubscribe(id)
    }

    /// Typed lookup of an extension's private state.
    pub fn extension_state<T: 'static>(
        &self,
        definition: &ExtensionDefinition,
    ) -> Result<&T, EngineError> {
        self.registry.state_value::<T>(definition)
    }

    /// The live extension instance for a definition.
    pub fn extension(&self, definition: &ExtensionDefinition) -> Result<&Extension, EngineError> {
        self.registry.extension(definition)
    }

    /// The current binding environment (read-only).
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// A read-only projection over this state.
    pub fn query(&self) -> Query<'_> {
        Query::new(&self.env, &self.observer)
    }

    /// What the most recent sync actually recomputed.
    pub fn last_sync(&self) -> &SyncStats {
        &self.stats
    }
}
