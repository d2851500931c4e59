//! Render frames.
//!
//! A frame binds a visible component to the live environment and holds the
//! last rendered output: a [`ViewNode`] tree produced by instantiating the
//! component's templates against current bindings. Rendering is memoized on
//! the environment names it read — a frame whose read-set is clean reuses
//! its prior output untouched.

use crate::error::EngineError;
use crate::memo::{DepKey, Memo, VersionMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;
use trellis_eval::{Environment, EvalError, Evaluator};
use trellis_types::ast::{Component, Template};
use trellis_types::{ScopeDistances, Val};

/// Component instantiation depth limit; exceeding it means a component
/// cycle.
const MAX_RENDER_DEPTH: usize = 64;

/// Tag used for text template output nodes.
pub const TEXT_TAG: &str = "#text";

/// Options for creating a frame.
#[derive(Debug, Clone, Default)]
pub struct FrameOpts {
    /// Optional caller-supplied stable id. Registering a second frame with
    /// the same id overwrites the previous id→frame mapping.
    pub id: Option<String>,
    /// Name of the component to render.
    pub component: String,
    /// Prop values passed to the component.
    pub props: BTreeMap<String, Val>,
}

/// Handle to a frame owned by the engine. O(1) removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub(crate) usize);

/// One node of rendered output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewNode {
    pub tag: String,
    pub props: BTreeMap<String, Val>,
    pub children: Vec<ViewNode>,
}

/// Everything a render needs from the engine.
pub(crate) struct RenderCtx<'a> {
    pub env: &'a mut Environment,
    pub distances: &'a ScopeDistances,
}

/// A render context bound to the live environment.
pub struct Frame {
    opts: FrameOpts,
    output: Option<ViewNode>,
    memo: Memo,
    render_count: u64,
}

impl Frame {
    pub(crate) fn new(opts: FrameOpts) -> Self {
        Self {
            opts,
            output: None,
            memo: Memo::default(),
            render_count: 0,
        }
    }

    /// The caller-supplied stable id, if any.
    pub fn id(&self) -> Option<&str> {
        self.opts.id.as_deref()
    }

    /// Name of the component this frame renders.
    pub fn component(&self) -> &str {
        &self.opts.component
    }

    /// The last rendered output.
    pub fn output(&self) -> Option<&ViewNode> {
        self.output.as_ref()
    }

    /// How many times this frame actually recomputed its output.
    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    /// Recompute the output unless nothing the previous render read has
    /// changed. Returns whether a recompute happened.
    pub(crate) fn render(
        &mut self,
        ctx: &mut RenderCtx<'_>,
        versions: &VersionMap,
    ) -> Result<bool, EngineError> {
        if self.output.is_some() && !self.memo.is_stale(versions) {
            return Ok(false);
        }
        trace!(component = %self.opts.component, "rendering frame");

        let mut ev = Evaluator::with_distances(ctx.distances);
        let node = instantiate(&self.opts.component, &self.opts.props, ctx, &mut ev, 0)?;

        self.memo
            .record(ev.trace.drain(..).map(DepKey::Env), versions);
        self.output = Some(node);
        self.render_count += 1;
        Ok(true)
    }

    /// Discard all prior output and recompute fully.
    pub(crate) fn hard_rerender(
        &mut self,
        ctx: &mut RenderCtx<'_>,
        versions: &VersionMap,
    ) -> Result<(), EngineError> {
        self.output = None;
        self.memo.reset();
        self.render(ctx, versions)?;
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Template instantiation
// ══════════════════════════════════════════════════════════════════════════════

/// Instantiate a component by name: bind props in a fresh boundary scope and
/// render the body templates.
fn instantiate(
    name: &str,
    args: &BTreeMap<String, Val>,
    ctx: &mut RenderCtx<'_>,
    ev: &mut Evaluator<'_>,
    depth: usize,
) -> Result<ViewNode, EngineError> {
    if depth >= MAX_RENDER_DEPTH {
        return Err(EngineError::RenderDepthExceeded(MAX_RENDER_DEPTH));
    }

    ev.trace.push(name.to_string());
    let component = match ctx.env.get(name) {
        Some(Val::Component(c)) => c.clone(),
        Some(_) => return Err(EngineError::NotAComponent(name.to_string())),
        None => return Err(EngineError::UnknownComponent(name.to_string())),
    };

    ctx.env.push_boundary_scope();
    let result = instantiate_body(&component, args, ctx, ev, depth);
    ctx.env.pop_scope();
    result
}

/// Body of [`instantiate`]; assumes the component's boundary scope is
/// pushed.
fn instantiate_body(
    component: &Component,
    args: &BTreeMap<String, Val>,
    ctx: &mut RenderCtx<'_>,
    ev: &mut Evaluator<'_>,
    depth: usize,
) -> Result<ViewNode, EngineError> {
    let mut bound = BTreeMap::new();
    // Declaration order: a default may reference earlier-declared props.
    for prop in &component.props {
        let value = match args.get(&prop.name) {
            Some(v) => v.clone(),
            None => match &prop.default {
                Some(default) => ev.eval_expr(default, ctx.env)?,
                None => Val::Nil,
            },
        };
        ctx.env.define(&prop.name, value.clone());
        bound.insert(prop.name.clone(), value);
    }

    let children = render_templates(&component.body, ctx, ev, depth)?;
    Ok(ViewNode {
        tag: component.name.clone(),
        props: bound,
        children,
    })
}

fn render_templates(
    templates: &[Template],
    ctx: &mut RenderCtx<'_>,
    ev: &mut Evaluator<'_>,
    depth: usize,
) -> Result<Vec<ViewNode>, EngineError> {
    let mut out = Vec::new();
    for template in templates {
        render_template(template, ctx, ev, depth, &mut out)?;
    }
    Ok(out)
}

fn render_template(
    template: &Template,
    ctx: &mut RenderCtx<'_>,
    ev: &mut Evaluator<'_>,
    depth: usize,
    out: &mut Vec<ViewNode>,
) -> Result<(), EngineError> {
    let Some(each) = template.each() else {
        return render_template_once(template, ctx, ev, depth, out);
    };

    // The iterator evaluates outside the block scope its alias introduces.
    let items = match ev.eval_expr(&each.iterator, ctx.env)? {
        Val::List(items) => items,
        other => {
            return Err(EvalError::TypeMismatch(format!(
                "each requires list, got {}",
                other.type_name()
            ))
            .into());
        }
    };

    for (i, item) in items.into_iter().enumerate() {
        ctx.env.push_scope();
        ctx.env.define(&each.alias.name, item);
        if let Some(index) = &each.index {
            ctx.env.define(&index.name, Val::Number(i as f64));
        }
        let result = render_template_once(template, ctx, ev, depth, out);
        ctx.env.pop_scope();
        result?;
    }
    Ok(())
}

fn render_template_once(
    template: &Template,
    ctx: &mut RenderCtx<'_>,
    ev: &mut Evaluator<'_>,
    depth: usize,
    out: &mut Vec<ViewNode>,
) -> Result<(), EngineError> {
    if let Some(cond) = template.cond() {
        if !ev.eval_expr(cond, ctx.env)?.is_truthy() {
            return Ok(());
        }
    }

    match template {
        Template::Tag(tag) => {
            let mut props = BTreeMap::new();
            for (name, expr) in &tag.props {
                props.insert(name.clone(), ev.eval_expr(expr, ctx.env)?);
            }
            let children = render_templates(&tag.children, ctx, ev, depth)?;
            out.push(ViewNode {
                tag: tag.tag.clone(),
                props,
                children,
            });
        }
        Template::Component(inst) => {
            let mut args = BTreeMap::new();
            for (name, expr) in &inst.props {
                args.insert(name.clone(), ev.eval_expr(expr, ctx.env)?);
            }
            let node = instantiate(&inst.component, &args, ctx, ev, depth + 1)?;
            out.push(node);
        }
        Template::Text(text) => {
            let value = ev.eval_expr(&text.value, ctx.env)?;
            let mut props = BTreeMap::new();
            props.insert("value".to_string(), value);
            out.push(ViewNode {
                tag: TEXT_TAG.to_string(),
                props,
                children: Vec::new(),
            });
        }
    }
    Ok(())
}
