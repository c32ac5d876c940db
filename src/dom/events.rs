//! Synchronous event dispatch with bubbling.

use super::{Document, NodeId};
use std::sync::Arc;

/// A dispatched event as seen by one listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    /// Event type such as "input" or "change"
    pub event_type: String,
    /// Node the event was dispatched on
    pub target: NodeId,
    /// Node whose listener is running
    pub current_target: NodeId,
    pub bubbles: bool,
}

/// Listener callback. It gets read access to the document so it can inspect
/// live state, the way a framework's change handler reads `event.target.value`.
pub type EventHandler = Arc<dyn Fn(&Document, &DomEvent) + Send + Sync>;

impl Document {
    /// Register a listener for `event_type` on `node` (the document node is
    /// a valid target for delegated listeners).
    pub fn add_event_listener<F>(&mut self, node: NodeId, event_type: &str, handler: F)
    where
        F: Fn(&Document, &DomEvent) + Send + Sync + 'static,
    {
        self.listeners
            .entry(node)
            .or_default()
            .push((event_type.to_string(), Arc::new(handler)));
    }

    /// Dispatch an event at `target`. Listeners on the target run first,
    /// then, when `bubbles` is set, those on each ancestor up to the
    /// document node.
    pub fn dispatch_event(&mut self, target: NodeId, event_type: &str, bubbles: bool) {
        let event = DomEvent {
            event_type: event_type.to_string(),
            target,
            current_target: target,
            bubbles,
        };
        self.event_log.push(event.clone());

        let mut path = vec![target];
        if bubbles {
            if let Some(node) = self.html.tree.get(target) {
                path.extend(node.ancestors().map(|a| a.id()));
            }
        }

        let doc: &Document = self;
        for current in path {
            let handlers: Vec<EventHandler> = doc
                .listeners
                .get(&current)
                .map(|ls| {
                    ls.iter()
                        .filter(|(t, _)| t == event_type)
                        .map(|(_, h)| h.clone())
                        .collect()
                })
                .unwrap_or_default();
            if handlers.is_empty() {
                continue;
            }
            let at = DomEvent {
                current_target: current,
                ..event.clone()
            };
            for handler in handlers {
                handler(doc, &at);
            }
        }
    }

    /// Every event dispatched on this document so far, oldest first.
    pub fn event_log(&self) -> &[DomEvent] {
        &self.event_log
    }

    pub fn take_event_log(&mut self) -> Vec<DomEvent> {
        std::mem::take(&mut self.event_log)
    }
}
