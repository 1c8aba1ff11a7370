//! Push channel between the flow coordinator and conversation surfaces.
//!
//! Surfaces subscribe for a private mpsc receiver and render events however
//! they like (print, speak, send over a socket). The coordinator only ever
//! broadcasts; it never knows who is listening.

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::{Note, Question};

const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FlowEvent {
    QuestionPresented {
        question: Question,
        suggestion: Option<String>,
    },
    AnswerSaved {
        note: Note,
    },
    AllAnswered {
        message: String,
    },
    /// The store discarded a corrupt document and started from defaults
    StoreRecovered,
}

pub struct FlowEventBroadcaster {
    subscribers: DashMap<String, mpsc::Sender<FlowEvent>>,
}

impl FlowEventBroadcaster {
    pub fn new() -> Self {
        FlowEventBroadcaster {
            subscribers: DashMap::new(),
        }
    }

    /// Register a subscriber. Returns its id (for unsubscribe) and receiver.
    pub fn subscribe(&self) -> (String, mpsc::Receiver<FlowEvent>) {
        let client_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers.insert(client_id.clone(), tx);
        (client_id, rx)
    }

    pub fn unsubscribe(&self, client_id: &str) {
        self.subscribers.remove(client_id);
    }

    /// Send an event to every live subscriber. A subscriber that has gone
    /// away or stopped draining is dropped rather than blocking the flow.
    pub fn broadcast(&self, event: FlowEvent) {
        let mut dead: Vec<String> = Vec::new();

        for entry in self.subscribers.iter() {
            if entry.value().try_send(event.clone()).is_err() {
                dead.push(entry.key().clone());
            }
        }

        for client_id in dead {
            log::debug!("[EVENTS] dropping unresponsive subscriber {}", client_id);
            self.subscribers.remove(&client_id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for FlowEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
