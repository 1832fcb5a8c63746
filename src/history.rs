//! Optional signal history: a ring buffer of timestamped transitions consumed
//! by an external UI or waveform writer.
//!
//! A bounded SPSC-shaped ring that the simulator core owns and pushes into
//! synchronously, rather than a separately-threaded producer/consumer queue.
//! A dedicated drain thread is a host-side concern; this type only needs to
//! be `Send` so a caller may hand it to one.

use crate::signal::Signal;

/// One transition recorded by the history sink: the tick it occurred at, the
/// signal that changed, and its new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    pub tick: u64,
    pub signal: Signal,
    pub value: bool,
}

/// What to do when the ring is full: drop the oldest entry, or stall the
/// producer. A stall counts as cooperative suspension at the ring-push
/// point, so it never blocks mid-`process`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
    DropOldest,
    Stall,
}

pub struct SignalHistory {
    capacity: usize,
    entries: std::collections::VecDeque<HistoryEntry>,
    backpressure: Backpressure,
    dropped: u64,
}

impl SignalHistory {
    pub fn new(capacity: usize, backpressure: Backpressure) -> Self {
        assert!(capacity > 0, "signal history capacity must be non-zero");
        SignalHistory {
            capacity,
            entries: std::collections::VecDeque::with_capacity(capacity),
            backpressure,
            dropped: 0,
        }
    }

    /// Push one transition. Under `Backpressure::Stall`, returns `false` when
    /// the ring was full and the entry was rejected — the caller (the
    /// simulator's tick loop) is expected to treat that as a cooperative
    /// suspension point rather than retry in a spin loop.
    pub fn push(&mut self, entry: HistoryEntry) -> bool {
        if self.entries.len() == self.capacity {
            match self.backpressure {
                Backpressure::DropOldest => {
                    self.entries.pop_front();
                    self.dropped += 1;
                }
                Backpressure::Stall => return false,
            }
        }
        self.entries.push_back(entry);
        true
    }

    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, HistoryEntry> {
        self.entries.drain(..)
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tick: u64) -> HistoryEntry {
        HistoryEntry {
            tick,
            signal: Signal::NULL,
            value: false,
        }
    }

    #[test]
    fn drop_oldest_keeps_capacity() {
        let mut h = SignalHistory::new(2, Backpressure::DropOldest);
        assert!(h.push(entry(1)));
        assert!(h.push(entry(2)));
        assert!(h.push(entry(3)));
        assert_eq!(h.len(), 2);
        assert_eq!(h.dropped_count(), 1);
        let drained: Vec<_> = h.drain().collect();
        assert_eq!(drained[0].tick, 2);
        assert_eq!(drained[1].tick, 3);
    }

    #[test]
    fn stall_rejects_when_full() {
        let mut h = SignalHistory::new(1, Backpressure::Stall);
        assert!(h.push(entry(1)));
        assert!(!h.push(entry(2)));
        assert_eq!(h.len(), 1);
    }
}
