//! Shared types for the trellis engine.
//!
//! This crate defines the document tree node types, stable node identity,
//! the runtime value type, the identity-keyed tree index, and the structural
//! change-set produced by diffing two tree snapshots.

mod change;
mod id;
mod index;
mod value;
pub mod ast;

pub use change::ChangeSet;
pub use id::{NodeId, ScopeDistances};
pub use index::TreeIndex;
pub use value::Val;
