//! Integration tests for the expression evaluator.
//!
//! Covers:
//! - literals, lists, records
//! - identifier lookup (chain and distance-directed)
//! - binary/unary operator semantics, incl. arithmetic traps
//! - field and index access
//! - the environment read trace

use trellis_eval::{Environment, EvalError, Evaluator};
use trellis_types::ast::{BinOp, Expr, ExprKind, UnOp};
use trellis_types::{ScopeDistances, Val};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn eval(expr: &Expr, env: &Environment) -> Result<Val, EvalError> {
    Evaluator::new().eval_expr(expr, env)
}

fn eval_ok(expr: &Expr, env: &Environment) -> Val {
    eval(expr, env).expect("evaluation failed")
}

// ══════════════════════════════════════════════════════════════════════════════
// Literals & structures
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn literals() {
    let env = Environment::new();
    assert_eq!(eval_ok(&Expr::number(42.0), &env), Val::Number(42.0));
    assert_eq!(eval_ok(&Expr::string("hi"), &env), Val::String("hi".into()));
    assert_eq!(eval_ok(&Expr::bool(true), &env), Val::Bool(true));
    assert_eq!(eval_ok(&Expr::nil(), &env), Val::Nil);
}

#[test]
fn list_literal_evaluates_elements() {
    let env = Environment::new();
    let expr = Expr::list(vec![
        Expr::number(1.0),
        Expr::binary(Expr::number(2.0), BinOp::Add, Expr::number(3.0)),
    ]);
    assert_eq!(
        eval_ok(&expr, &env),
        Val::List(vec![Val::Number(1.0), Val::Number(5.0)])
    );
}

#[test]
fn record_literal_evaluates_fields() {
    let env = Environment::new();
    let expr = Expr::record(vec![
        ("a".to_string(), Expr::number(1.0)),
        ("b".to_string(), Expr::string("x")),
    ]);
    match eval_ok(&expr, &env) {
        Val::Record(fields) => {
            assert_eq!(fields.get("a"), Some(&Val::Number(1.0)));
            assert_eq!(fields.get("b"), Some(&Val::String("x".into())));
        }
        other => panic!("expected record, got {other:?}"),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn identifier_chain_lookup() {
    let mut env = Environment::new();
    env.set("x", Val::Number(7.0));
    assert_eq!(eval_ok(&Expr::ident("x"), &env), Val::Number(7.0));
}

#[test]
fn undefined_identifier_is_an_eval_error() {
    let env = Environment::new();
    assert_eq!(
        eval(&Expr::ident("missing"), &env),
        Err(EvalError::UndefinedVariable("missing".to_string()))
    );
}

#[test]
fn distance_directed_lookup_bypasses_shadowing() {
    let mut env = Environment::new();
    env.set("x", Val::Number(1.0));
    env.push_scope();
    env.define("x", Val::Number(2.0));

    let expr = Expr::ident("x");
    let ident_id = match &expr.kind {
        ExprKind::Identifier(ident) => ident.id,
        _ => unreachable!(),
    };

    let mut distances = ScopeDistances::new();
    distances.insert(ident_id, 1);
    let mut ev = Evaluator::with_distances(&distances);
    assert_eq!(ev.eval_expr(&expr, &env), Ok(Val::Number(1.0)));
}

#[test]
fn evaluator_traces_environment_reads() {
    let mut env = Environment::new();
    env.set("a", Val::Number(1.0));
    env.set("b", Val::Number(2.0));
    let expr = Expr::binary(Expr::ident("a"), BinOp::Add, Expr::ident("b"));
    let mut ev = Evaluator::new();
    ev.eval_expr(&expr, &env).unwrap();
    assert_eq!(ev.trace, vec!["a".to_string(), "b".to_string()]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn arithmetic() {
    let env = Environment::new();
    let cases = [
        (BinOp::Add, 7.0, 2.0, 9.0),
        (BinOp::Sub, 7.0, 2.0, 5.0),
        (BinOp::Mul, 7.0, 2.0, 14.0),
        (BinOp::Div, 7.0, 2.0, 3.5),
        (BinOp::Mod, 7.0, 2.0, 1.0),
    ];
    for (op, a, b, expected) in cases {
        let expr = Expr::binary(Expr::number(a), op, Expr::number(b));
        assert_eq!(eval_ok(&expr, &env), Val::Number(expected));
    }
}

#[test]
fn string_concatenation() {
    let env = Environment::new();
    let expr = Expr::binary(Expr::string("ab"), BinOp::Add, Expr::string("cd"));
    assert_eq!(eval_ok(&expr, &env), Val::String("abcd".into()));
}

#[test]
fn division_by_zero_traps() {
    let env = Environment::new();
    let expr = Expr::binary(Expr::number(1.0), BinOp::Div, Expr::number(0.0));
    assert!(matches!(eval(&expr, &env), Err(EvalError::ArithmeticTrap(_))));
}

#[test]
fn comparisons() {
    let env = Environment::new();
    let expr = Expr::binary(Expr::number(1.0), BinOp::Lt, Expr::number(2.0));
    assert_eq!(eval_ok(&expr, &env), Val::Bool(true));
    let expr = Expr::binary(Expr::string("a"), BinOp::Eq, Expr::string("a"));
    assert_eq!(eval_ok(&expr, &env), Val::Bool(true));
    let expr = Expr::binary(Expr::string("a"), BinOp::Neq, Expr::number(1.0));
    assert_eq!(eval_ok(&expr, &env), Val::Bool(true));
}

#[test]
fn and_or_short_circuit() {
    let env = Environment::new();
    // `false and <undefined>` must not evaluate the right operand
    let expr = Expr::binary(Expr::bool(false), BinOp::And, Expr::ident("missing"));
    assert_eq!(eval_ok(&expr, &env), Val::Bool(false));
    let expr = Expr::binary(Expr::bool(true), BinOp::Or, Expr::ident("missing"));
    assert_eq!(eval_ok(&expr, &env), Val::Bool(true));
}

#[test]
fn unary_operators() {
    let env = Environment::new();
    assert_eq!(
        eval_ok(&Expr::unary(UnOp::Not, Expr::bool(false)), &env),
        Val::Bool(true)
    );
    assert_eq!(
        eval_ok(&Expr::unary(UnOp::Neg, Expr::number(3.0)), &env),
        Val::Number(-3.0)
    );
    assert!(matches!(
        eval(&Expr::unary(UnOp::Neg, Expr::string("x")), &env),
        Err(EvalError::TypeMismatch(_))
    ));
}

#[test]
fn type_mismatch_on_mixed_arithmetic() {
    let env = Environment::new();
    let expr = Expr::binary(Expr::number(1.0), BinOp::Add, Expr::string("x"));
    assert!(matches!(eval(&expr, &env), Err(EvalError::TypeMismatch(_))));
}

// ══════════════════════════════════════════════════════════════════════════════
// Access
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn field_access_on_record() {
    let mut env = Environment::new();
    let mut fields = std::collections::BTreeMap::new();
    fields.insert("name".to_string(), Val::String("ada".into()));
    env.set("user", Val::Record(fields));

    let expr = Expr::field(Expr::ident("user"), "name");
    assert_eq!(eval_ok(&expr, &env), Val::String("ada".into()));

    let expr = Expr::field(Expr::ident("user"), "absent");
    assert_eq!(eval_ok(&expr, &env), Val::Nil);
}

#[test]
fn index_access_on_list() {
    let mut env = Environment::new();
    env.set(
        "items",
        Val::List(vec![Val::Number(10.0), Val::Number(20.0)]),
    );
    let expr = Expr::index(Expr::ident("items"), Expr::number(1.0));
    assert_eq!(eval_ok(&expr, &env), Val::Number(20.0));
    let expr = Expr::index(Expr::ident("items"), Expr::number(9.0));
    assert_eq!(eval_ok(&expr, &env), Val::Nil);
}

#[test]
fn index_access_with_wrong_types_is_an_error() {
    let mut env = Environment::new();
    env.set("n", Val::Number(1.0));
    let expr = Expr::index(Expr::ident("n"), Expr::number(0.0));
    assert!(matches!(eval(&expr, &env), Err(EvalError::TypeMismatch(_))));
}
