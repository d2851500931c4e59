//! Incremental reactive document engine.
//!
//! [`State`] owns one observed document tree, a binding [`Environment`],
//! a scope [`Resolver`], an [`ExtensionRegistry`], a set of render
//! [`Frame`]s, and a set of subscribers. All mutation goes through
//! [`State::change`]; after every committed mutation the engine re-resolves
//! identifier scopes, recomputes the binding environment through three
//! memoized sync passes, re-renders stale frames, and notifies subscribers
//! whose collected values changed.
//!
//! [`Environment`]: trellis_eval::Environment

mod error;
mod extension;
mod frame;
mod memo;
mod observer;
mod query;
mod resolver;
mod state;

pub use error::EngineError;
pub use extension::{Extension, ExtensionDefinition, ExtensionRegistry};
pub use frame::{Frame, FrameId, FrameOpts, ViewNode};
pub use observer::{Commit, ListenerId, Observer};
pub use query::Query;
pub use resolver::Resolver;
pub use state::{Config, State, StateOpts, SubscriberId, SubscriberOpts, SyncStats};
