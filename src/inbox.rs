//! Bounded in-memory inbox for poll-based consumers.
//!
//! Reads never remove entries; an envelope stays visible to every poller
//! until it is evicted by capacity or the process restarts.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;

use crate::protocol::Envelope;

/// Point-in-time copy of the inbox, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct InboxSnapshot {
    pub messages: Vec<Envelope>,
    pub count: usize,
}

#[derive(Debug)]
pub struct InboxBuffer {
    capacity: usize,
    entries: Mutex<VecDeque<Envelope>>,
}

impl InboxBuffer {
    /// Create an inbox holding at most `capacity` envelopes (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an envelope, returning the oldest entry if it was evicted.
    pub fn append(&self, envelope: Envelope) -> Option<Envelope> {
        let mut entries = self.lock();
        entries.push_back(envelope);
        if entries.len() > self.capacity {
            entries.pop_front()
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> InboxSnapshot {
        let entries = self.lock();
        InboxSnapshot {
            messages: entries.iter().cloned().collect(),
            count: entries.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Envelope>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn envelope(id: &str) -> Envelope {
        Envelope {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }

    fn ids(snapshot: &InboxSnapshot) -> Vec<String> {
        snapshot
            .messages
            .iter()
            .map(|e| e.id_or_unknown().to_string())
            .collect()
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let inbox = InboxBuffer::new(3);
        for id in ["m1", "m2", "m3"] {
            assert!(inbox.append(envelope(id)).is_none());
        }

        let evicted = inbox.append(envelope("m4")).unwrap();
        assert_eq!(evicted.id.as_deref(), Some("m1"));

        let snapshot = inbox.snapshot();
        assert_eq!(snapshot.count, 3);
        assert_eq!(ids(&snapshot), vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn snapshot_is_non_destructive() {
        let inbox = InboxBuffer::new(10);
        inbox.append(envelope("m1"));

        assert_eq!(inbox.snapshot().count, 1);
        assert_eq!(inbox.snapshot().count, 1);
        assert_eq!(inbox.len(), 1);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let inbox = InboxBuffer::new(0);
        assert_eq!(inbox.capacity(), 1);
        inbox.append(envelope("a"));
        inbox.append(envelope("b"));
        assert_eq!(ids(&inbox.snapshot()), vec!["b"]);
    }

    #[test]
    fn concurrent_appends_respect_capacity() {
        let inbox = Arc::new(InboxBuffer::new(50));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let inbox = inbox.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        inbox.append(envelope(&format!("{}-{}", t, i)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(inbox.len(), 50);
        assert_eq!(inbox.snapshot().messages.len(), 50);
    }
}
