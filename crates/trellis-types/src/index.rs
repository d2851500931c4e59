//! Identity index over a tree snapshot.
//!
//! [`TreeIndex`] maps every node id to a clone of the node and to its parent
//! id. The engine's observer rebuilds one after each committed mutation; two
//! indices diffed against each other yield a [`crate::ChangeSet`].

use crate::ast::*;
use crate::NodeId;
use std::collections::HashMap;

/// id → node and id → parent back-reference maps over one tree snapshot.
#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    nodes: HashMap<NodeId, Node>,
    parents: HashMap<NodeId, NodeId>,
}

impl TreeIndex {
    /// Build the index by walking the full tree.
    pub fn build(root: &StateRoot) -> Self {
        let mut index = Self::default();
        index.insert(None, Node::Root(root.clone()));
        index.walk_program(root.id, &root.program);
        index
    }

    /// Look up a node by id, O(1).
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Look up a node's parent id, O(1). The root has no parent.
    pub fn parent_id(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate all indexed node ids (unordered).
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// The largest id in the index, if any.
    pub fn max_id(&self) -> Option<NodeId> {
        self.nodes.keys().copied().max()
    }

    // ══════════════════════════════════════════════════════════════════════
    // Walkers
    // ══════════════════════════════════════════════════════════════════════

    fn insert(&mut self, parent: Option<NodeId>, node: Node) {
        let id = node.id();
        if let Some(p) = parent {
            self.parents.insert(id, p);
        }
        self.nodes.insert(id, node);
    }

    fn walk_program(&mut self, parent: NodeId, program: &Program) {
        self.insert(Some(parent), Node::Program(program.clone()));
        for global in &program.globals {
            self.walk_global(program.id, global);
        }
        for component in &program.components {
            self.walk_component(program.id, component);
        }
    }

    fn walk_global(&mut self, parent: NodeId, global: &GlobalDecl) {
        self.insert(Some(parent), Node::Global(global.clone()));
        self.walk_expr(global.id, &global.init);
    }

    fn walk_component(&mut self, parent: NodeId, component: &Component) {
        self.insert(Some(parent), Node::Component(component.clone()));
        for prop in &component.props {
            self.insert(Some(component.id), Node::Prop(prop.clone()));
            if let Some(default) = &prop.default {
                self.walk_expr(prop.id, default);
            }
        }
        for template in &component.body {
            self.walk_template(component.id, template);
        }
    }

    fn walk_template(&mut self, parent: NodeId, template: &Template) {
        let id = template.id();
        self.insert(Some(parent), Node::Template(template.clone()));
        if let Some(each) = template.each() {
            self.walk_expr(id, &each.iterator);
            self.insert(Some(id), Node::Ident(each.alias.clone()));
            if let Some(index) = &each.index {
                self.insert(Some(id), Node::Ident(index.clone()));
            }
        }
        if let Some(cond) = template.cond() {
            self.walk_expr(id, cond);
        }
        match template {
            Template::Tag(tag) => {
                for expr in tag.props.values() {
                    self.walk_expr(id, expr);
                }
                for child in &tag.children {
                    self.walk_template(id, child);
                }
            }
            Template::Component(inst) => {
                for expr in inst.props.values() {
                    self.walk_expr(id, expr);
                }
            }
            Template::Text(text) => {
                self.walk_expr(id, &text.value);
            }
        }
    }

    fn walk_expr(&mut self, parent: NodeId, expr: &Expr) {
        self.insert(Some(parent), Node::Expr(expr.clone()));
        match &expr.kind {
            ExprKind::Identifier(ident) => {
                self.insert(Some(expr.id), Node::Ident(ident.clone()));
            }
            ExprKind::Binary { left, right, .. } => {
                self.walk_expr(expr.id, left);
                self.walk_expr(expr.id, right);
            }
            ExprKind::Unary { operand, .. } => {
                self.walk_expr(expr.id, operand);
            }
            ExprKind::ListLit(items) => {
                for item in items {
                    self.walk_expr(expr.id, item);
                }
            }
            ExprKind::RecordLit(entries) => {
                for (_, value) in entries {
                    self.walk_expr(expr.id, value);
                }
            }
            ExprKind::FieldAccess { object, .. } => {
                self.walk_expr(expr.id, object);
            }
            ExprKind::IndexAccess { object, index } => {
                self.walk_expr(expr.id, object);
                self.walk_expr(expr.id, index);
            }
            ExprKind::NumberLit(_)
            | ExprKind::StringLit(_)
            | ExprKind::BoolLit(_)
            | ExprKind::NilLit => {}
        }
    }
}
