//! Handler registry — the ordered, immutable set of handlers.

use std::collections::HashSet;
use std::sync::Arc;

use crate::handler::{Handler, HandlerInfo};
use crate::personas;

/// Registry construction failures. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("handler registry is empty")]
    Empty,

    #[error("duplicate handler id '{0}'")]
    DuplicateId(String),

    #[error("priority handler '{0}' is not registered")]
    UnknownPriority(String),
}

/// Ordered id → handler mapping with a designated priority handler.
#[derive(Debug)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<Handler>>,
    priority: usize,
}

impl HandlerRegistry {
    /// Validate and build. Order of `handlers` is the routing order.
    pub fn new(handlers: Vec<Handler>, priority_id: &str) -> Result<Self, RegistryError> {
        if handlers.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::new();
        for handler in &handlers {
            if !seen.insert(handler.id().to_string()) {
                return Err(RegistryError::DuplicateId(handler.id().to_string()));
            }
        }

        let priority = handlers
            .iter()
            .position(|h| h.id() == priority_id)
            .ok_or_else(|| RegistryError::UnknownPriority(priority_id.to_string()))?;

        Ok(Self {
            handlers: handlers.into_iter().map(Arc::new).collect(),
            priority,
        })
    }

    /// The built-in marketing handlers.
    pub fn builtin(priority_id: &str) -> Result<Self, RegistryError> {
        Self::new(personas::builtin_handlers(), priority_id)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Handler>> {
        self.handlers.iter().find(|h| h.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn priority(&self) -> &Arc<Handler> {
        &self.handlers[self.priority]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Handler>> {
        self.handlers.iter()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn infos(&self) -> Vec<HandlerInfo> {
        self.handlers.iter().map(|h| h.info().clone()).collect()
    }
}
