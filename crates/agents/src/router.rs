//! Router — picks one handler per message.
//!
//! Explicit selection wins when the id is registered. Otherwise every
//! handler scores the message in registry order and the maximum wins; on
//! equal maxima the priority handler is preferred, and any other tie goes to
//! the handler registered first.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::handler::Handler;
use crate::registry::HandlerRegistry;

/// A routing decision.
#[derive(Debug, Clone)]
pub struct Routed {
    pub handler: Arc<Handler>,
    /// The handler's own score for the message, also for explicit picks
    pub score: f32,
    pub explicit: bool,
}

/// One handler's score, for previews.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerScore {
    pub id: String,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<HandlerRegistry>,
}

impl Router {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn select_explicit(&self, id: &str) -> Option<Arc<Handler>> {
        self.registry.get(id).cloned()
    }

    pub fn select_auto(&self, message: &str) -> Routed {
        let priority_id = self.registry.priority().id();
        let mut best: Option<(Arc<Handler>, f32)> = None;

        for handler in self.registry.iter() {
            let score = handler.score(message);
            let better = match &best {
                None => true,
                Some((_, top)) => score > *top || (score == *top && handler.id() == priority_id),
            };
            if better {
                best = Some((Arc::clone(handler), score));
            }
        }

        // A registry is never empty
        let best = best.unwrap_or_else(|| {
            let priority = self.registry.priority();
            (Arc::clone(priority), priority.score(message))
        });

        debug!(handler = %best.0.id(), score = best.1, "Auto-routed message");

        Routed {
            handler: best.0,
            score: best.1,
            explicit: false,
        }
    }

    /// Explicit id when registered, auto-routing otherwise.
    pub fn route(&self, message: &str, explicit_id: Option<&str>) -> Routed {
        match explicit_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => match self.select_explicit(id) {
                Some(handler) => {
                    let score = handler.score(message);
                    Routed {
                        handler,
                        score,
                        explicit: true,
                    }
                }
                None => {
                    warn!(handler_id = %id, "Unknown handler requested, auto-routing instead");
                    self.select_auto(message)
                }
            },
            None => self.select_auto(message),
        }
    }

    /// Every handler's score in registry order.
    pub fn scores(&self, message: &str) -> Vec<HandlerScore> {
        self.registry
            .iter()
            .map(|h| HandlerScore {
                id: h.id().to_string(),
                score: h.score(message),
            })
            .collect()
    }
}
