//! Document tree node types for the trellis engine.
//!
//! The tree is a declarative "program" document: global declarations with
//! initializer expressions, component declarations with prop declarations and
//! body templates, and expressions (including identifier references). Every
//! node carries a stable [`NodeId`]; the engine keys its caches and indices
//! by identity, not by path. Trees are constructed programmatically or
//! deserialized — there is no text syntax.

use crate::{NodeId, Val};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ══════════════════════════════════════════════════════════════════════════════
// Root
// ══════════════════════════════════════════════════════════════════════════════

/// The tracked document root: the program plus a serializable per-extension
/// scratch area that survives `to_json()` round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRoot {
    pub id: NodeId,
    pub program: Program,
    pub extensions: BTreeMap<String, Val>,
}

impl StateRoot {
    pub fn new(program: Program) -> Self {
        Self {
            id: NodeId::next(),
            program,
            extensions: BTreeMap::new(),
        }
    }
}

/// A complete program: global declarations plus component declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: NodeId,
    pub globals: Vec<GlobalDecl>,
    pub components: Vec<Component>,
}

impl Program {
    pub fn new(globals: Vec<GlobalDecl>, components: Vec<Component>) -> Self {
        Self {
            id: NodeId::next(),
            globals,
            components,
        }
    }

    /// An empty program.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::empty()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Declarations
// ══════════════════════════════════════════════════════════════════════════════

/// A document-declared global: `name` bound to the value of `init`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalDecl {
    pub id: NodeId,
    pub name: String,
    pub init: Expr,
}

impl GlobalDecl {
    pub fn new(name: impl Into<String>, init: Expr) -> Self {
        Self {
            id: NodeId::next(),
            name: name.into(),
            init,
        }
    }
}

/// A component declaration: named, with prop declarations and body templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: NodeId,
    pub name: String,
    pub props: Vec<PropDecl>,
    pub body: Vec<Template>,
}

impl Component {
    pub fn new(name: impl Into<String>, props: Vec<PropDecl>, body: Vec<Template>) -> Self {
        Self {
            id: NodeId::next(),
            name: name.into(),
            props,
            body,
        }
    }
}

/// A prop declaration on a component.
///
/// Defaults evaluate inside the component scope in declaration order: a
/// default may reference earlier-declared props; referencing a later sibling
/// is an evaluation-time error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropDecl {
    pub id: NodeId,
    pub name: String,
    pub default: Option<Expr>,
}

impl PropDecl {
    pub fn new(name: impl Into<String>, default: Option<Expr>) -> Self {
        Self {
            id: NodeId::next(),
            name: name.into(),
            default,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Templates
// ══════════════════════════════════════════════════════════════════════════════

/// A view template in a component body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Template {
    Tag(TagTemplate),
    Component(ComponentTemplate),
    Text(TextTemplate),
}

impl Template {
    pub fn id(&self) -> NodeId {
        match self {
            Template::Tag(t) => t.id,
            Template::Component(t) => t.id,
            Template::Text(t) => t.id,
        }
    }

    /// The template's each-directive, if any.
    pub fn each(&self) -> Option<&EachDirective> {
        match self {
            Template::Tag(t) => t.each.as_ref(),
            Template::Component(t) => t.each.as_ref(),
            Template::Text(_) => None,
        }
    }

    /// The template's conditional gate, if any.
    pub fn cond(&self) -> Option<&Expr> {
        match self {
            Template::Tag(t) => t.cond.as_ref(),
            Template::Component(t) => t.cond.as_ref(),
            Template::Text(_) => None,
        }
    }
}

/// A plain element template: a tag with expression props and children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagTemplate {
    pub id: NodeId,
    pub tag: String,
    pub props: BTreeMap<String, Expr>,
    pub children: Vec<Template>,
    pub each: Option<EachDirective>,
    pub cond: Option<Expr>,
}

impl TagTemplate {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            id: NodeId::next(),
            tag: tag.into(),
            props: BTreeMap::new(),
            children: Vec::new(),
            each: None,
            cond: None,
        }
    }
}

/// Instantiates another visible component by name, passing expression props.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentTemplate {
    pub id: NodeId,
    pub component: String,
    pub props: BTreeMap<String, Expr>,
    pub each: Option<EachDirective>,
    pub cond: Option<Expr>,
}

impl ComponentTemplate {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            id: NodeId::next(),
            component: component.into(),
            props: BTreeMap::new(),
            each: None,
            cond: None,
        }
    }
}

/// A text node rendered from a single expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextTemplate {
    pub id: NodeId,
    pub value: Expr,
}

impl TextTemplate {
    pub fn new(value: Expr) -> Self {
        Self {
            id: NodeId::next(),
            value,
        }
    }
}

/// Repeats its template once per item of `iterator`, binding `alias` (and
/// optionally `index`) in a block scope visible to the template's props,
/// condition, and children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EachDirective {
    pub id: NodeId,
    pub iterator: Expr,
    pub alias: Ident,
    pub index: Option<Ident>,
}

impl EachDirective {
    pub fn new(iterator: Expr, alias: impl Into<String>) -> Self {
        Self {
            id: NodeId::next(),
            iterator,
            alias: Ident::new(alias),
            index: None,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

/// An expression node. Large recursive variants are boxed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    NumberLit(f64),
    StringLit(String),
    BoolLit(bool),
    NilLit,
    Identifier(Ident),
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    ListLit(Vec<Expr>),
    RecordLit(Vec<(String, Expr)>),
    FieldAccess {
        object: Box<Expr>,
        field: String,
    },
    IndexAccess {
        object: Box<Expr>,
        index: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Not,
    Neg,
}

/// An identifier reference. The resolver's scope-distance cache is keyed by
/// this node's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    pub id: NodeId,
    pub name: String,
}

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NodeId::next(),
            name: name.into(),
        }
    }
}

impl Expr {
    fn kind(kind: ExprKind) -> Self {
        Self {
            id: NodeId::next(),
            kind,
        }
    }

    pub fn number(n: f64) -> Self {
        Self::kind(ExprKind::NumberLit(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::kind(ExprKind::StringLit(s.into()))
    }

    pub fn bool(b: bool) -> Self {
        Self::kind(ExprKind::BoolLit(b))
    }

    pub fn nil() -> Self {
        Self::kind(ExprKind::NilLit)
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::kind(ExprKind::Identifier(Ident::new(name)))
    }

    pub fn binary(left: Expr, op: BinOp, right: Expr) -> Self {
        Self::kind(ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    pub fn unary(op: UnOp, operand: Expr) -> Self {
        Self::kind(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn list(items: Vec<Expr>) -> Self {
        Self::kind(ExprKind::ListLit(items))
    }

    pub fn record(entries: Vec<(String, Expr)>) -> Self {
        Self::kind(ExprKind::RecordLit(entries))
    }

    pub fn field(object: Expr, field: impl Into<String>) -> Self {
        Self::kind(ExprKind::FieldAccess {
            object: Box::new(object),
            field: field.into(),
        })
    }

    pub fn index(object: Expr, index: Expr) -> Self {
        Self::kind(ExprKind::IndexAccess {
            object: Box::new(object),
            index: Box::new(index),
        })
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// By-value node lookup
// ══════════════════════════════════════════════════════════════════════════════

/// A node retrieved from the identity index. Holds a clone of the node as it
/// stood at the last committed snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Root(StateRoot),
    Program(Program),
    Global(GlobalDecl),
    Component(Component),
    Prop(PropDecl),
    Template(Template),
    Expr(Expr),
    Ident(Ident),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Root(n) => n.id,
            Node::Program(n) => n.id,
            Node::Global(n) => n.id,
            Node::Component(n) => n.id,
            Node::Prop(n) => n.id,
            Node::Template(n) => n.id(),
            Node::Expr(n) => n.id,
            Node::Ident(n) => n.id,
        }
    }
}
