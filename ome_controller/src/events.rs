//! Event recording for reconcile outcomes.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

const EVENT_TAIL: usize = 256;

#[derive(Clone, Debug)]
pub struct Event {
    pub time: DateTime<Utc>,
    pub object: String,
    pub reason: String,
    pub message: String,
}

/// Logs events and keeps a bounded in-memory tail for inspection.
pub struct EventRecorder {
    tail: Mutex<VecDeque<Event>>,
}

impl EventRecorder {
    pub fn new() -> EventRecorder {
        EventRecorder { tail: Mutex::new(VecDeque::new()) }
    }

    pub fn event(&self, object: &str, reason: &str, message: &str) {
        info!("{}: {}: {}", object, reason, message);
        if let Ok(mut tail) = self.tail.lock() {
            if tail.len() == EVENT_TAIL {
                tail.pop_front();
            }
            tail.push_back(Event {
                time: Utc::now(),
                object: object.to_string(),
                reason: reason.to_string(),
                message: message.to_string(),
            });
        }
    }

    pub fn recent(&self) -> Vec<Event> {
        match self.tail.lock() {
            Ok(tail) => tail.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for EventRecorder {
    fn default() -> EventRecorder {
        EventRecorder::new()
    }
}
