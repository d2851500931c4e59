//! Scoped variable environment.

use std::collections::BTreeMap;
use trellis_types::Val;

/// A single scope level.
///
/// A boundary scope starts a fresh lexical chain: lookups crossing it jump
/// straight to the global scope instead of falling through to the caller's
/// locals. Component instantiation pushes a boundary so a component body
/// never sees the scopes of the site that instantiated it.
#[derive(Debug, Clone)]
struct Scope {
    bindings: BTreeMap<String, Val>,
    boundary: bool,
}

impl Scope {
    fn new(boundary: bool) -> Self {
        Self {
            bindings: BTreeMap::new(),
            boundary,
        }
    }
}

/// Scoped binding environment with push/pop semantics.
///
/// Scope 0 is the permanent global scope — the binding table the engine's
/// sync passes maintain. `set`/`delete`/`global_names` operate on it; `define`
/// writes into the innermost scope during evaluation. Lookups search the
/// effective lexical chain: innermost scope down to the nearest boundary,
/// then the global scope.
#[derive(Debug, Clone)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Environment {
    /// Create a new environment with one global scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(false)],
        }
    }

    /// Push an evaluation scope (each-blocks).
    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new(false));
    }

    /// Push a boundary scope (component instantiation).
    pub fn push_boundary_scope(&mut self) {
        self.scopes.push(Scope::new(true));
    }

    /// Pop the innermost scope. The global scope is never popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Number of live scopes, including the global one.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Write a binding into the global scope.
    ///
    /// Returns `true` if the stored value actually changed — the engine's
    /// version clock only advances on real changes.
    pub fn set(&mut self, name: &str, value: Val) -> bool {
        let global = &mut self.scopes[0].bindings;
        if global.get(name) == Some(&value) {
            return false;
        }
        global.insert(name.to_string(), value);
        true
    }

    /// Remove a binding from the global scope. Returns `true` if it existed.
    pub fn delete(&mut self, name: &str) -> bool {
        self.scopes[0].bindings.remove(name).is_some()
    }

    /// Define a binding in the current (innermost) scope.
    pub fn define(&mut self, name: &str, value: Val) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.bindings.insert(name.to_string(), value);
        }
    }

    /// Look up a binding along the effective lexical chain.
    pub fn get(&self, name: &str) -> Option<&Val> {
        for scope in self.effective_chain() {
            if let Some(v) = scope.bindings.get(name) {
                return Some(v);
            }
        }
        None
    }

    /// Look up a binding exactly `distance` scopes out along the effective
    /// lexical chain (0 = innermost). Used when the resolver has already
    /// fixed the declaring scope for an identifier reference.
    pub fn get_at(&self, name: &str, distance: u32) -> Option<&Val> {
        self.effective_chain()
            .nth(distance as usize)
            .and_then(|scope| scope.bindings.get(name))
    }

    /// Current global binding names, in stable order.
    pub fn global_names(&self) -> impl Iterator<Item = &String> {
        self.scopes[0].bindings.keys()
    }

    /// The effective lexical chain: innermost scope down to the nearest
    /// boundary (inclusive), then the global scope.
    fn effective_chain(&self) -> impl Iterator<Item = &Scope> {
        let top = self.scopes.len() - 1;
        let stop = self.scopes[1..=top]
            .iter()
            .rposition(|s| s.boundary)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.scopes[stop..=top]
            .iter()
            .rev()
            .chain(if stop > 0 { self.scopes.first() } else { None })
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reports_real_changes_only() {
        let mut env = Environment::new();
        assert!(env.set("x", Val::Number(1.0)));
        assert!(!env.set("x", Val::Number(1.0)));
        assert!(env.set("x", Val::Number(2.0)));
    }

    #[test]
    fn inner_scope_shadows_global() {
        let mut env = Environment::new();
        env.set("x", Val::Number(1.0));
        env.push_scope();
        env.define("x", Val::Number(2.0));
        assert_eq!(env.get("x"), Some(&Val::Number(2.0)));
        env.pop_scope();
        assert_eq!(env.get("x"), Some(&Val::Number(1.0)));
    }

    #[test]
    fn get_at_targets_one_scope() {
        let mut env = Environment::new();
        env.set("x", Val::Number(1.0));
        env.push_scope();
        env.define("x", Val::Number(2.0));
        assert_eq!(env.get_at("x", 0), Some(&Val::Number(2.0)));
        assert_eq!(env.get_at("x", 1), Some(&Val::Number(1.0)));
        assert_eq!(env.get_at("x", 2), None);
    }

    #[test]
    fn boundary_hides_caller_locals() {
        let mut env = Environment::new();
        env.set("g", Val::Number(1.0));
        env.push_scope();
        env.define("local", Val::Number(2.0));
        env.push_boundary_scope();
        env.define("prop", Val::Number(3.0));
        // the chain inside the boundary is [boundary scope, global]
        assert_eq!(env.get("prop"), Some(&Val::Number(3.0)));
        assert_eq!(env.get("g"), Some(&Val::Number(1.0)));
        assert_eq!(env.get("local"), None);
        assert_eq!(env.get_at("g", 1), Some(&Val::Number(1.0)));
        env.pop_scope();
        assert_eq!(env.get("local"), Some(&Val::Number(2.0)));
    }

    #[test]
    fn global_scope_is_never_popped() {
        let mut env = Environment::new();
        env.set("x", Val::Number(1.0));
        env.pop_scope();
        assert_eq!(env.get("x"), Some(&Val::Number(1.0)));
        assert_eq!(env.depth(), 1);
    }

    #[test]
    fn delete_removes_global_binding() {
        let mut env = Environment::new();
        env.set("x", Val::Number(1.0));
        assert!(env.delete("x"));
        assert!(!env.delete("x"));
        assert_eq!(env.get("x"), None);
    }
}
