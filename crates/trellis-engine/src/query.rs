//! Read-only projection surface for subscribers.

use crate::memo::DepKey;
use crate::observer::Observer;
use std::cell::RefCell;
use trellis_eval::Environment;
use trellis_types::ast::{Component, Node, StateRoot};
use trellis_types::{NodeId, Val};

/// The surface a subscriber's `collect` closure reads through.
///
/// Never mutates. Every read is recorded so the engine knows exactly which
/// bindings and tree data the collected value depends on — a subscriber
/// recomputes only when one of those reads actually changed.
pub struct Query<'a> {
    env: &'a Environment,
    observer: &'a Observer,
    trace: RefCell<Vec<DepKey>>,
}

impl<'a> Query<'a> {
    pub(crate) fn new(env: &'a Environment, observer: &'a Observer) -> Self {
        Self {
            env,
            observer,
            trace: RefCell::new(Vec::new()),
        }
    }

    /// Current value of an environment binding.
    pub fn env(&self, name: &str) -> Option<Val> {
        self.trace.borrow_mut().push(DepKey::Env(name.to_string()));
        self.env.get(name).cloned()
    }

    /// Names of every current global binding.
    pub fn global_names(&self) -> Vec<String> {
        // the valid name set is a function of all four binding sources
        self.trace.borrow_mut().extend([
            DepKey::ConfigGlobals,
            DepKey::ConfigComponents,
            DepKey::ProgramGlobals,
            DepKey::ProgramComponents,
        ]);
        self.env.global_names().cloned().collect()
    }

    /// A visible component, if `name` is bound to one.
    pub fn component(&self, name: &str) -> Option<Component> {
        self.trace.borrow_mut().push(DepKey::Env(name.to_string()));
        match self.env.get(name) {
            Some(Val::Component(component)) => Some(component.clone()),
            _ => None,
        }
    }

    /// Identity-indexed node lookup.
    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.trace.borrow_mut().push(DepKey::Node(id));
        self.observer.node(id)
    }

    /// Parent back-reference lookup.
    pub fn parent(&self, id: NodeId) -> Option<Node> {
        self.trace.borrow_mut().push(DepKey::Node(id));
        let parent = self.observer.parent(id);
        if let Some(node) = &parent {
            self.trace.borrow_mut().push(DepKey::Node(node.id()));
        }
        parent
    }

    /// The tracked document root.
    pub fn root(&self) -> &StateRoot {
        let root = self.observer.root();
        self.trace.borrow_mut().push(DepKey::Node(root.id));
        root
    }

    pub(crate) fn into_trace(self) -> Vec<DepKey> {
        self.trace.into_inner()
    }
}
