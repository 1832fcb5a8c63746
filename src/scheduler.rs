//! A time-ordered priority queue of chip wake-ups.
//!
//! Chips self-schedule their own next wake-up (an oscillator re-inserting its
//! next edge is the canonical case) generalized to any chip. Ordering between
//! chips with identical timestamps is unspecified; the simulator achieves
//! order-independence by running every chip in a batch before re-merging the
//! pool, so the scheduler itself only needs to group, not strictly order,
//! same-timestamp entries.

use crate::chip::ChipId;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    timestamp: u64,
    chip: ChipId,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.chip.cmp(&other.chip))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

pub struct Scheduler {
    heap: BinaryHeap<Reverse<Entry>>,
    /// The earliest pending timestamp per chip, used to collapse duplicate
    /// wake-up requests to the earliest one.
    pending: [Option<u64>; ChipId::MAX_CHIPS],
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            heap: BinaryHeap::new(),
            pending: [None; ChipId::MAX_CHIPS],
        }
    }

    /// Insert a wake-up; duplicate requests for the same chip collapse to
    /// the earliest of the pending entries.
    pub fn schedule(&mut self, chip: ChipId, timestamp: u64) {
        let slot = &mut self.pending[chip.index()];
        let should_insert = match *slot {
            Some(existing) if existing <= timestamp => false,
            _ => true,
        };
        if should_insert {
            *slot = Some(timestamp);
            self.heap.push(Reverse(Entry { timestamp, chip }));
        }
    }

    /// Remove and return every entry whose timestamp is `<= now`.
    pub fn pop_due(&mut self, now: u64) -> Vec<ChipId> {
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.timestamp > now {
                break;
            }
            let Reverse(entry) = self.heap.pop().unwrap();
            // A later `schedule` call may have superseded this entry with an
            // earlier one already popped, or collapsed it away; only act on
            // the entry if it is still the chip's current pending timestamp.
            if self.pending[entry.chip.index()] == Some(entry.timestamp) {
                self.pending[entry.chip.index()] = None;
                due.push(entry.chip);
            }
        }
        due
    }

    /// The next pending wake-up timestamp, or `None` if the scheduler is empty.
    pub fn peek_next(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse(e)| e.timestamp)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_everything_due_at_or_before_now() {
        let mut s = Scheduler::new();
        s.schedule(ChipId(1), 100);
        s.schedule(ChipId(2), 50);
        s.schedule(ChipId(3), 200);

        let due = s.pop_due(100);
        assert_eq!(due.len(), 2);
        assert!(due.contains(&ChipId(1)));
        assert!(due.contains(&ChipId(2)));
        assert_eq!(s.peek_next(), Some(200));
    }

    #[test]
    fn duplicate_requests_collapse_to_earliest() {
        let mut s = Scheduler::new();
        s.schedule(ChipId(1), 500);
        s.schedule(ChipId(1), 100);
        s.schedule(ChipId(1), 300);

        assert_eq!(s.peek_next(), Some(100));
        let due = s.pop_due(100);
        assert_eq!(due, vec![ChipId(1)]);
        assert!(s.is_empty());
    }

    #[test]
    fn rescheduling_to_a_later_time_does_not_duplicate() {
        let mut s = Scheduler::new();
        s.schedule(ChipId(1), 100);
        s.schedule(ChipId(1), 200);
        let due = s.pop_due(1000);
        assert_eq!(due, vec![ChipId(1)]);
    }
}
