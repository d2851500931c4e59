//! Runtime error types for the evaluator.

use thiserror::Error;

/// Evaluation error.
///
/// `UndefinedVariable` is the surface point for unresolved identifier
/// references: static resolution never raises, the failure is deferred to
/// the expression evaluation that actually uses the reference.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Unknown variable at the point of use.
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),
    /// Operand types don't fit the operation.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// Division or modulo by zero.
    #[error("arithmetic trap: {0}")]
    ArithmeticTrap(String),
}

/// Result alias for evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;
