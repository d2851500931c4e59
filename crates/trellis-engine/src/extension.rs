//! Extension plug-ins.
//!
//! An extension contributes global bindings and components to the engine's
//! merged configuration and owns one opaquely-typed private state slot.
//! Contribution collisions resolve deterministically by registration order:
//! a later-registered extension overwrites an earlier one on duplicate
//! global names (documented policy, not an error). Instances are created at
//! engine construction and torn down and re-created on a full document swap,
//! preserving identity and registration order.

use crate::error::EngineError;
use std::any::Any;
use std::collections::BTreeMap;
use tracing::debug;
use trellis_types::ast::Component;
use trellis_types::Val;

fn unit_state() -> Box<dyn Any> {
    Box::new(())
}

/// A registered plug-in definition.
///
/// `key` is the extension's identity: lookups compare definitions by key.
/// `init_state` allocates the private state slot; it runs once at `init()`
/// and again after every document swap.
#[derive(Debug, Clone)]
pub struct ExtensionDefinition {
    pub key: &'static str,
    pub globals: BTreeMap<String, Val>,
    pub components: Vec<Component>,
    pub init_state: fn() -> Box<dyn Any>,
}

impl ExtensionDefinition {
    /// A definition with no contributions and a unit state slot.
    pub fn new(key: &'static str) -> Self {
        Self {
            key,
            globals: BTreeMap::new(),
            components: Vec::new(),
            init_state: unit_state,
        }
    }
}

/// A live extension instance: its definition plus the private state slot.
pub struct Extension {
    definition: ExtensionDefinition,
    state: Box<dyn Any>,
}

impl Extension {
    pub fn definition(&self) -> &ExtensionDefinition {
        &self.definition
    }

    /// Downcast the private state slot.
    pub fn state_ref<T: 'static>(&self) -> Option<&T> {
        self.state.downcast_ref::<T>()
    }
}

/// Owns every extension instance, in registration order.
pub struct ExtensionRegistry {
    definitions: Vec<ExtensionDefinition>,
    extensions: Vec<Extension>,
}

impl ExtensionRegistry {
    pub fn new(definitions: Vec<ExtensionDefinition>) -> Self {
        Self {
            definitions,
            extensions: Vec::new(),
        }
    }

    /// Instantiate every configured definition, allocating its private
    /// state slot. Runs once at engine construction.
    pub fn init(&mut self) {
        debug!(count = self.definitions.len(), "initializing extensions");
        self.extensions = self
            .definitions
            .iter()
            .map(|definition| Extension {
                definition: definition.clone(),
                state: (definition.init_state)(),
            })
            .collect();
    }

    /// Dispose and re-instantiate every extension's private state after a
    /// document swap, preserving identity and registration order.
    pub fn replace(&mut self) {
        debug!("re-initializing extensions after root swap");
        self.init();
    }

    /// Live instances, in registration order.
    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// Look up the live instance for a definition. Fails if the definition
    /// was never registered or `init()` has not run.
    pub fn extension(&self, definition: &ExtensionDefinition) -> Result<&Extension, EngineError> {
        self.extensions
            .iter()
            .find(|e| e.definition.key == definition.key)
            .ok_or_else(|| EngineError::ExtensionNotRegistered(definition.key.to_string()))
    }

    /// Typed lookup of an extension's private state.
    pub fn state_value<T: 'static>(
        &self,
        definition: &ExtensionDefinition,
    ) -> Result<&T, EngineError> {
        let extension = self.extension(definition)?;
        extension
            .state_ref::<T>()
            .ok_or_else(|| EngineError::ExtensionStateMismatch(definition.key.to_string()))
    }
}
