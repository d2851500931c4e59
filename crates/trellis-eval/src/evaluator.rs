//! Core expression evaluator.

use crate::env::Environment;
use crate::error::{EvalError, EvalResult};
use std::collections::BTreeMap;
use trellis_types::ast::{BinOp, Expr, ExprKind, Ident, UnOp};
use trellis_types::{ScopeDistances, Val};

/// The core evaluator — walks expression nodes and produces values.
///
/// When scope distances are supplied, identifier lookups target the exact
/// scope the resolver fixed for the reference; identifiers the resolver never
/// saw (e.g. inside externally-configured components) fall back to chain
/// lookup. Every environment name read is recorded in `trace` so the engine
/// can build the read-set of the computation that ran the evaluator.
pub struct Evaluator<'a> {
    distances: Option<&'a ScopeDistances>,
    /// Environment names read during evaluation, in read order.
    pub trace: Vec<String>,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator that resolves identifiers by chain lookup.
    pub fn new() -> Evaluator<'static> {
        Evaluator {
            distances: None,
            trace: Vec::new(),
        }
    }

    /// Create an evaluator backed by resolved scope distances.
    pub fn with_distances(distances: &'a ScopeDistances) -> Evaluator<'a> {
        Evaluator {
            distances: Some(distances),
            trace: Vec::new(),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Expression evaluation
    // ══════════════════════════════════════════════════════════════════════

    /// Evaluate an expression to a value.
    pub fn eval_expr(&mut self, expr: &Expr, env: &Environment) -> EvalResult<Val> {
        match &expr.kind {
            ExprKind::NumberLit(n) => Ok(Val::Number(*n)),
            ExprKind::StringLit(s) => Ok(Val::String(s.clone())),
            ExprKind::BoolLit(b) => Ok(Val::Bool(*b)),
            ExprKind::NilLit => Ok(Val::Nil),

            ExprKind::Identifier(ident) => self.eval_identifier(ident, env),

            ExprKind::Binary { left, op, right } => self.eval_binary(left, *op, right, env),
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand, env),

            ExprKind::ListLit(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, env)?);
                }
                Ok(Val::List(values))
            }
            ExprKind::RecordLit(entries) => {
                let mut fields = BTreeMap::new();
                for (name, value) in entries {
                    fields.insert(name.clone(), self.eval_expr(value, env)?);
                }
                Ok(Val::Record(fields))
            }

            ExprKind::FieldAccess { object, field } => self.eval_field(object, field, env),
            ExprKind::IndexAccess { object, index } => self.eval_index(object, index, env),
        }
    }

    // ── Identifiers ──────────────────────────────────────────────────────

    fn eval_identifier(&mut self, ident: &Ident, env: &Environment) -> EvalResult<Val> {
        self.trace.push(ident.name.clone());
        let found = match self.distances.and_then(|d| d.get(&ident.id)) {
            Some(&distance) => env.get_at(&ident.name, distance),
            None => env.get(&ident.name),
        };
        found
            .cloned()
            .ok_or_else(|| EvalError::UndefinedVariable(ident.name.clone()))
    }

    // ── Operators ────────────────────────────────────────────────────────

    fn eval_binary(
        &mut self,
        left: &Expr,
        op: BinOp,
        right: &Expr,
        env: &Environment,
    ) -> EvalResult<Val> {
        // `and`/`or` short-circuit on the left operand's truthiness.
        match op {
            BinOp::And => {
                let l = self.eval_expr(left, env)?;
                if !l.is_truthy() {
                    return Ok(Val::Bool(false));
                }
                let r = self.eval_expr(right, env)?;
                return Ok(Val::Bool(r.is_truthy()));
            }
            BinOp::Or => {
                let l = self.eval_expr(left, env)?;
                if l.is_truthy() {
                    return Ok(Val::Bool(true));
                }
                let r = self.eval_expr(right, env)?;
                return Ok(Val::Bool(r.is_truthy()));
            }
            _ => {}
        }

        let l = self.eval_expr(left, env)?;
        let r = self.eval_expr(right, env)?;

        match op {
            BinOp::Add => match (&l, &r) {
                (Val::Number(a), Val::Number(b)) => Ok(Val::Number(a + b)),
                (Val::String(a), Val::String(b)) => Ok(Val::String(format!("{a}{b}"))),
                _ => Err(type_mismatch("+", &l, &r)),
            },
            BinOp::Sub => numeric(op, &l, &r, |a, b| Ok(Val::Number(a - b))),
            BinOp::Mul => numeric(op, &l, &r, |a, b| Ok(Val::Number(a * b))),
            BinOp::Div => numeric(op, &l, &r, |a, b| {
                if b == 0.0 {
                    Err(EvalError::ArithmeticTrap("division by zero".to_string()))
                } else {
                    Ok(Val::Number(a / b))
                }
            }),
            BinOp::Mod => numeric(op, &l, &r, |a, b| {
                if b == 0.0 {
                    Err(EvalError::ArithmeticTrap("modulo by zero".to_string()))
                } else {
                    Ok(Val::Number(a % b))
                }
            }),
            BinOp::Eq => Ok(Val::Bool(l == r)),
            BinOp::Neq => Ok(Val::Bool(l != r)),
            BinOp::Lt => numeric(op, &l, &r, |a, b| Ok(Val::Bool(a < b))),
            BinOp::Gt => numeric(op, &l, &r, |a, b| Ok(Val::Bool(a > b))),
            BinOp::Lte => numeric(op, &l, &r, |a, b| Ok(Val::Bool(a <= b))),
            BinOp::Gte => numeric(op, &l, &r, |a, b| Ok(Val::Bool(a >= b))),
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        }
    }

    fn eval_unary(&mut self, op: UnOp, operand: &Expr, env: &Environment) -> EvalResult<Val> {
        let v = self.eval_expr(operand, env)?;
        match op {
            UnOp::Not => Ok(Val::Bool(!v.is_truthy())),
            UnOp::Neg => match v {
                Val::Number(n) => Ok(Val::Number(-n)),
                other => Err(EvalError::TypeMismatch(format!(
                    "cannot negate {}",
                    other.type_name()
                ))),
            },
        }
    }

    // ── Access ───────────────────────────────────────────────────────────

    fn eval_field(&mut self, object: &Expr, field: &str, env: &Environment) -> EvalResult<Val> {
        let obj = self.eval_expr(object, env)?;
        match obj {
            Val::Record(fields) => Ok(fields.get(field).cloned().unwrap_or(Val::Nil)),
            other => Err(EvalError::TypeMismatch(format!(
                "field access requires record, got {}",
                other.type_name()
            ))),
        }
    }

    fn eval_index(&mut self, object: &Expr, index: &Expr, env: &Environment) -> EvalResult<Val> {
        let obj = self.eval_expr(object, env)?;
        let idx = self.eval_expr(index, env)?;
        match (obj, idx) {
            (Val::List(items), Val::Number(n)) => {
                if n < 0.0 || n.fract() != 0.0 {
                    return Ok(Val::Nil);
                }
                Ok(items.get(n as usize).cloned().unwrap_or(Val::Nil))
            }
            (Val::Record(fields), Val::String(key)) => {
                Ok(fields.get(&key).cloned().unwrap_or(Val::Nil))
            }
            (obj, idx) => Err(EvalError::TypeMismatch(format!(
                "cannot index {} with {}",
                obj.type_name(),
                idx.type_name()
            ))),
        }
    }
}

fn numeric(
    op: BinOp,
    l: &Val,
    r: &Val,
    f: impl FnOnce(f64, f64) -> EvalResult<Val>,
) -> EvalResult<Val> {
    match (l, r) {
        (Val::Number(a), Val::Number(b)) => f(*a, *b),
        _ => Err(type_mismatch(op_symbol(op), l, r)),
    }
}

fn type_mismatch(op: &str, l: &Val, r: &Val) -> EvalError {
    EvalError::TypeMismatch(format!(
        "`{op}` not supported between {} and {}",
        l.type_name(),
        r.type_name()
    ))
}

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Eq => "==",
        BinOp::Neq => "!=",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::Lte => "<=",
        BinOp::Gte => ">=",
        BinOp::And => "and",
        BinOp::Or => "or",
    }
}
