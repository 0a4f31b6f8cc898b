//! Monotonic watermark over the server event stream.
//!
//! Event IDs are strictly increasing within one call, but the transport
//! re-delivers: the same status response (and therefore the same events) can
//! arrive more than once. The tracker keeps the highest ID already applied
//! and admits only events above it, so processing is at-most-once and in
//! delivery order.
//!
//! The watermark starts at −1 (nothing processed) and is non-decreasing for
//! the lifetime of a call; it is reset when a new call begins.

use crate::events::ServerEvent;

/// Watermark of the last applied server event for the current call.
#[derive(Debug)]
pub struct EventTracker {
    last_processed: i64,
}

impl EventTracker {
    /// Creates a tracker with nothing processed yet.
    pub fn new() -> Self {
        Self { last_processed: -1 }
    }

    /// The highest event ID applied so far, or −1.
    pub fn last_processed(&self) -> i64 {
        self.last_processed
    }

    /// True if `id` is above the watermark and should be applied.
    pub fn is_new(&self, id: i64) -> bool {
        id > self.last_processed
    }

    /// Advances the watermark. Lower or equal IDs leave it unchanged.
    pub fn mark_processed(&mut self, id: i64) {
        if id > self.last_processed {
            self.last_processed = id;
        }
    }

    /// Resets the watermark for a new call.
    pub fn reset(&mut self) {
        self.last_processed = -1;
    }

    /// Filters a delivered event list down to the events not yet applied,
    /// preserving delivery order.
    pub fn filter_new<'a>(&self, events: &'a [ServerEvent]) -> Vec<&'a ServerEvent> {
        events
            .iter()
            .filter(|e| self.is_new(e.id_call_event))
            .collect()
    }
}

impl Default for EventTracker {
    fn default() -> Self {
        Self::new()
    }
}
