//! Shared event slot and reload counter.
//!
//! The watcher writes the serialized event into the slot under its mutex,
//! then increments the counter with release ordering. A stream task that
//! observes the counter move (acquire) and then locks the slot is
//! guaranteed to read an event no older than the change that woke it.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::event::HmrEvent;

pub struct HmrChannel {
    slot: Mutex<Vec<u8>>,
    counter: AtomicU64,
}

impl HmrChannel {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Vec::new()),
            counter: AtomicU64::new(0),
        }
    }

    /// Publish an event: slot first, counter second.
    pub fn publish(&self, event: &HmrEvent) {
        let bytes = event.to_json().into_bytes();
        *self.slot.lock() = bytes;
        self.counter.fetch_add(1, Ordering::Release);
    }

    /// Most recent serialized event (empty before the first publish).
    pub fn latest(&self) -> Vec<u8> {
        self.slot.lock().clone()
    }

    /// Current reload counter.
    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }
}

impl Default for HmrChannel {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_increments_once() {
        let ch = HmrChannel::new();
        assert_eq!(ch.counter(), 0);
        ch.publish(&HmrEvent::FullReload);
        assert_eq!(ch.counter(), 1);
        ch.publish(&HmrEvent::Connected);
        assert_eq!(ch.counter(), 2);
    }

    #[test]
    fn test_latest_follows_counter() {
        // After observing the counter move, the slot holds the
        // event that caused it (or a newer one)
        let ch = HmrChannel::new();
        ch.publish(&HmrEvent::CssUpdate { app: "a".into() });
        let seen = ch.counter();
        assert_eq!(seen, 1);
        assert_eq!(ch.latest(), br#"{"type":"css-update","app":"a"}"#.to_vec());
    }

    #[test]
    fn test_late_consumer_reads_last_event() {
        let ch = HmrChannel::new();
        ch.publish(&HmrEvent::FullReload);
        ch.publish(&HmrEvent::CssUpdate { app: "b".into() });
        // A consumer that woke late sees only the most recent event
        assert_eq!(ch.latest(), br#"{"type":"css-update","app":"b"}"#.to_vec());
    }
}
