// SPDX-License-Identifier: MIT OR Apache-2.0

use doclife_core::Timestamp;
use tokio::sync::broadcast;
use tracing::trace;

/// Realtime notification about changed documents.
///
/// Events are only published once the transaction which caused them was committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A document was inserted, saved or changed directly.
    DocUpdate {
        doctype: String,
        name: String,
        modified: Option<Timestamp>,
        user: String,
    },

    /// The list of documents of a doctype changed.
    ListUpdate {
        doctype: String,
        name: String,
        user: String,
    },
}

impl Event {
    pub fn doctype(&self) -> &str {
        match self {
            Event::DocUpdate { doctype, .. } | Event::ListUpdate { doctype, .. } => doctype,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Event::DocUpdate { name, .. } | Event::ListUpdate { name, .. } => name,
        }
    }
}

/// Broadcast channel for realtime events.
#[derive(Clone, Debug)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn publish(&self, events: Vec<Event>) {
        for event in events {
            trace!(doctype = event.doctype(), name = event.name(), "publish {event:?}");
            // Nobody listening is fine.
            let _ = self.tx.send(event);
        }
    }
}
