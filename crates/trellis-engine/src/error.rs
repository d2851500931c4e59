//! Engine error types.

use thiserror::Error;
use trellis_eval::EvalError;

/// Errors surfaced by the engine.
///
/// Extension lookup failures are configuration errors: the caller must fix
/// registration or ordering. Evaluation errors are where unresolved
/// identifier references finally surface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Extension state requested for a definition that was never registered
    /// (or the registry has not been initialized).
    #[error("extension `{0}` is not registered")]
    ExtensionNotRegistered(String),
    /// Extension state exists but has a different type than requested.
    #[error("extension `{0}` state has an unexpected type")]
    ExtensionStateMismatch(String),
    /// A frame references a component name with no binding.
    #[error("unknown component `{0}`")]
    UnknownComponent(String),
    /// A frame references a binding that is not a component.
    #[error("binding `{0}` is not a component")]
    NotAComponent(String),
    /// Component instantiation recursed past the depth limit.
    #[error("component instantiation exceeded depth limit {0}")]
    RenderDepthExceeded(usize),
    /// Expression evaluation failed.
    #[error(transparent)]
    Eval(#[from] EvalError),
}
