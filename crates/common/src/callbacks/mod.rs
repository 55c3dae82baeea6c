//! Query lifecycle callbacks
//!
//! Observers receive start/end events for the query as a whole and for the
//! retrieval phase. Handlers are purely observational: they cannot fail and
//! their return values are ignored.

use crate::schema::{Response, ScoredNode};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Phase an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The whole query, from start to final response
    Query,
    /// Retrieval plus citation chunking
    Retrieve,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Query => "query",
            EventKind::Retrieve => "retrieve",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data attached to an event
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Empty,
    QueryStr(String),
    Nodes(Vec<ScoredNode>),
    Response(Response),
}

/// Pairs a start event with its end event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(Uuid);

impl EventId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Receiver of lifecycle events
pub trait CallbackHandler: Send + Sync {
    fn on_event_start(&self, kind: EventKind, payload: &EventPayload, id: EventId);

    fn on_event_end(&self, kind: EventKind, payload: &EventPayload, id: EventId);
}

/// Fans events out to every registered handler, in registration order
#[derive(Clone, Default)]
pub struct CallbackManager {
    handlers: Vec<Arc<dyn CallbackHandler>>,
}

impl CallbackManager {
    pub fn new(handlers: Vec<Arc<dyn CallbackHandler>>) -> Self {
        Self { handlers }
    }

    pub fn add_handler(&mut self, handler: Arc<dyn CallbackHandler>) {
        self.handlers.push(handler);
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Announce the start of a phase and return the id to close it with
    pub fn on_event_start(&self, kind: EventKind, payload: EventPayload) -> EventId {
        let id = EventId::new();
        for handler in &self.handlers {
            handler.on_event_start(kind, &payload, id);
        }
        id
    }

    /// Announce the end of the phase opened with `id`
    pub fn on_event_end(&self, kind: EventKind, payload: EventPayload, id: EventId) {
        for handler in &self.handlers {
            handler.on_event_end(kind, &payload, id);
        }
    }
}

impl fmt::Debug for CallbackManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackManager")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHandler;

impl CallbackHandler for TracingHandler {
    fn on_event_start(&self, kind: EventKind, payload: &EventPayload, id: EventId) {
        match payload {
            EventPayload::QueryStr(query) => {
                tracing::debug!(event = %kind, event_id = %id, query = %query, "Event started")
            }
            _ => tracing::debug!(event = %kind, event_id = %id, "Event started"),
        }
    }

    fn on_event_end(&self, kind: EventKind, payload: &EventPayload, id: EventId) {
        match payload {
            EventPayload::Nodes(nodes) => {
                tracing::debug!(
                    event = %kind,
                    event_id = %id,
                    node_count = nodes.len(),
                    "Event ended"
                )
            }
            EventPayload::Response(response) => tracing::debug!(
                event = %kind,
                event_id = %id,
                source_count = response.source_nodes.len(),
                "Event ended"
            ),
            _ => tracing::debug!(event = %kind, event_id = %id, "Event ended"),
        }
    }
}
