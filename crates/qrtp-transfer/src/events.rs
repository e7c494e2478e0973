//! Observer events.
//!
//! Sessions publish through an [`EventBus`]. Listeners run synchronously,
//! in subscription order, inside the call that caused the event.

use serde::Serialize;

use crate::ranges::Range;

/// Address of a piece: a character range or a chunk index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Piece {
    Range(Range),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Outbound transfer prepared.
    Init { total_chunks: usize, total_len: usize },
    /// Inbound piece stored. `received` counts characters (range variant)
    /// or distinct chunks (indexed variant) held so far.
    Chunk {
        piece: Piece,
        payload: String,
        received: usize,
    },
    /// Inbound transfer finished. Fires once per transfer.
    Complete { message: String, pieces: Vec<Piece> },
    /// Peer acknowledgment applied to the outbound side.
    Acknowledged { pieces: Vec<Piece> },
    /// Every outbound chunk acknowledged. Fires once per transfer.
    AllAcknowledged { total_chunks: usize },
    Changed(SessionSnapshot),
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Send,
    Receive,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Receive => "receive",
        }
    }
}

/// Render-facing view of a range-variant session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeSnapshot {
    pub mode: Mode,
    pub received_ranges: Vec<Range>,
    pub max_seen_index: usize,
    pub is_complete: bool,
    pub received_text: String,
    pub excluded_ranges: Vec<Range>,
    pub total_length: usize,
    pub sender_done: bool,
}

/// Render-facing view of an indexed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedSnapshot {
    pub outbound_chunks: usize,
    pub acknowledged: Vec<usize>,
    pub outbound_done: bool,
    pub inbound_total: usize,
    pub received: Vec<usize>,
    pub inbound_complete: bool,
    pub received_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum SessionSnapshot {
    Range(RangeSnapshot),
    Indexed(IndexedSnapshot),
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Box<dyn FnMut(&SessionEvent) + Send>;

#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: &SessionEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_emit_in_subscription_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        for tag in ["a", "b"] {
            let seen = seen.clone();
            bus.subscribe(Box::new(move |_| seen.lock().unwrap().push(tag)));
        }

        bus.emit(&SessionEvent::Reset);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_unsubscribe() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();
        let c = count.clone();
        let id = bus.subscribe(Box::new(move |_| *c.lock().unwrap() += 1));

        bus.emit(&SessionEvent::Reset);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(&SessionEvent::Reset);
        assert_eq!(*count.lock().unwrap(), 1);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = SessionEvent::Chunk {
            piece: Piece::Range(Range::new(0, 4)),
            payload: "Hello".into(),
            received: 5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "chunk");
        assert_eq!(json["piece"]["range"]["end"], 4);
    }
}
