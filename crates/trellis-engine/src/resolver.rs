//! Lexical scope resolution.
//!
//! [`Resolver::resolve_program`] walks the full document tree and assigns
//! every identifier reference a scope distance: the number of enclosing
//! lexical scopes (block, component body, global scope) to traverse to reach
//! the nearest declaration of that name. Inner declarations shadow outer
//! ones. Distances are cached by identifier-node identity; entries are
//! evicted when the owning node leaves the tree, so the cache never outlives
//! its nodes and never grows across add/remove cycles.
//!
//! Resolution never raises: an identifier with no reachable declaration gets
//! no cache entry, and the failure surfaces at expression evaluation.

use crate::state::Config;
use std::collections::HashSet;
use trellis_types::ast::{Component, Expr, ExprKind, Ident, StateRoot, Template};
use trellis_types::{NodeId, ScopeDistances};

/// A lexical scope: the set of names it declares.
struct ScopeStack {
    scopes: Vec<HashSet<String>>,
}

impl ScopeStack {
    fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    fn push(&mut self, names: HashSet<String>) {
        self.scopes.push(names);
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Distance from the innermost scope to the nearest scope declaring
    /// `name` (0 = innermost declares it). `None` if no scope does.
    fn resolve(&self, name: &str) -> Option<u32> {
        for (distance, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains(name) {
                return Some(distance as u32);
            }
        }
        None
    }
}

/// Computes and caches identifier scope distances for the current tree shape.
pub struct Resolver {
    distances: ScopeDistances,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            distances: ScopeDistances::new(),
        }
    }

    /// Re-resolve every identifier reference in the document against the
    /// current tree shape and merged configuration. Idempotent: re-running
    /// after an unrelated mutation leaves untouched identifiers' distances
    /// unchanged, and replaces entries whose enclosing scope shape changed.
    pub fn resolve_program(&mut self, root: &StateRoot, config: &Config) {
        let mut stack = ScopeStack::new();

        let mut global_scope: HashSet<String> = HashSet::new();
        global_scope.extend(config.globals.keys().cloned());
        global_scope.extend(config.components.iter().map(|c| c.name.clone()));
        global_scope.extend(root.program.globals.iter().map(|g| g.name.clone()));
        global_scope.extend(root.program.components.iter().map(|c| c.name.clone()));
        stack.push(global_scope);

        for global in &root.program.globals {
            self.resolve_expr(&global.init, &stack);
        }
        for component in &root.program.components {
            self.resolve_component(component, &mut stack);
        }

        stack.pop();
    }

    /// Cached distance for an identifier-reference node.
    pub fn distance(&self, id: NodeId) -> Option<u32> {
        self.distances.get(&id).copied()
    }

    /// The full distance cache (consumed by the evaluator).
    pub fn distances(&self) -> &ScopeDistances {
        &self.distances
    }

    /// Evict cache entries for nodes that left the tree. Returns the number
    /// of entries removed.
    pub fn evict(&mut self, removed: &[NodeId]) -> usize {
        let mut evicted = 0;
        for id in removed {
            if self.distances.remove(id).is_some() {
                evicted += 1;
            }
        }
        evicted
    }

    /// Number of cached distances.
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    // ══════════════════════════════════════════════════════════════════════
    // Walkers
    // ══════════════════════════════════════════════════════════════════════

    fn resolve_component(&mut self, component: &Component, stack: &mut ScopeStack) {
        let prop_names: HashSet<String> =
            component.props.iter().map(|p| p.name.clone()).collect();
        stack.push(prop_names);

        // Defaults resolve inside the component scope: prop names shadow
        // globals everywhere in the component, defaults included.
        for prop in &component.props {
            if let Some(default) = &prop.default {
                self.resolve_expr(default, stack);
            }
        }
        for template in &component.body {
            self.resolve_template(template, stack);
        }

        stack.pop();
    }

    fn resolve_template(&mut self, template: &Template, stack: &mut ScopeStack) {
        let block = match template.each() {
            Some(each) => {
                // The iterator evaluates outside the block scope its alias
                // introduces.
                self.resolve_expr(&each.iterator, stack);
                let mut names = HashSet::new();
                names.insert(each.alias.name.clone());
                if let Some(index) = &each.index {
                    names.insert(index.name.clone());
                }
                stack.push(names);
                true
            }
            None => false,
        };

        if let Some(cond) = template.cond() {
            self.resolve_expr(cond, stack);
        }
        match template {
            Template::Tag(tag) => {
                for expr in tag.props.values() {
                    self.resolve_expr(expr, stack);
                }
                for child in &tag.children {
                    self.resolve_template(child, stack);
                }
            }
            Template::Component(inst) => {
                for expr in inst.props.values() {
                    self.resolve_expr(expr, stack);
                }
            }
            Template::Text(text) => {
                self.resolve_expr(&text.value, stack);
            }
        }

        if block {
            stack.pop();
        }
    }

    fn resolve_expr(&mut self, expr: &Expr, stack: &ScopeStack) {
        match &expr.kind {
            ExprKind::Identifier(ident) => self.resolve_ident(ident, stack),
            ExprKind::Binary { left, right, .. } => {
                self.resolve_expr(left, stack);
                self.resolve_expr(right, stack);
            }
            ExprKind::Unary { operand, .. } => self.resolve_expr(operand, stack),
            ExprKind::ListLit(items) => {
                for item in items {
                    self.resolve_expr(item, stack);
                }
            }
            ExprKind::RecordLit(entries) => {
                for (_, value) in entries {
                    self.resolve_expr(value, stack);
                }
            }
            ExprKind::FieldAccess { object, .. } => self.resolve_expr(object, stack),
            ExprKind::IndexAccess { object, index } => {
                self.resolve_expr(object, stack);
                self.resolve_expr(index, stack);
            }
            ExprKind::NumberLit(_)
            | ExprKind::StringLit(_)
            | ExprKind::BoolLit(_)
            | ExprKind::NilLit => {}
        }
    }

    fn resolve_ident(&mut self, ident: &Ident, stack: &ScopeStack) {
        match stack.resolve(&ident.name) {
            Some(distance) => {
                self.distances.insert(ident.id, distance);
            }
            None => {
                // Unresolvable: leave no entry, defer the failure to
                // evaluation.
                self.distances.remove(&ident.id);
            }
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}
