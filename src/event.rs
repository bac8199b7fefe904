use serde::Serialize;
use std::time::Duration;

use crate::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Info,
    Error,
    Debug,
    Action,
}

/// A log record for an external logger or UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub timestamp: Duration,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub node: Option<NodeId>,
}

type Subscriber = Box<dyn FnMut(&Event)>;

/// Fans events out to subscribers and mirrors them to `tracing`.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventBus {
    pub fn subscribe(&mut self, subscriber: impl FnMut(&Event) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn emit(
        &mut self,
        timestamp: Duration,
        kind: EventKind,
        message: impl Into<String>,
        node: Option<&NodeId>,
    ) {
        let event = Event {
            timestamp,
            message: message.into(),
            kind,
            node: node.cloned(),
        };
        let node = event.node.as_ref().map(NodeId::as_str);
        match kind {
            EventKind::Info => tracing::info!(node, "{}", event.message),
            EventKind::Error => tracing::error!(node, "{}", event.message),
            EventKind::Debug | EventKind::Action => {
                tracing::debug!(node, kind = ?kind, "{}", event.message)
            }
        }
        for subscriber in &mut self.subscribers {
            subscriber(&event);
        }
    }

    pub fn info(&mut self, timestamp: Duration, message: impl Into<String>) {
        self.emit(timestamp, EventKind::Info, message, None);
    }
}
