use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

struct Scheduled<E> {
    due_ns: u64,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.due_ns == other.due_ns && self.seq == other.seq
    }
}

impl<E> Eq for Scheduled<E> {}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Scheduled<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due_ns
            .cmp(&other.due_ns)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Deferred callbacks for a single-threaded event loop.
///
/// Events fire in deadline order; equal deadlines fire in the order they
/// were scheduled. Nothing is ever cancelled individually, the owner either
/// lets an event fire or drops the whole queue with [`TimerQueue::clear`].
pub struct TimerQueue<E> {
    heap: BinaryHeap<Reverse<Scheduled<E>>>,
    next_seq: u64,
}

impl<E> TimerQueue<E> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Schedules `event` to fire `delay` after `now_ns`
    pub fn schedule(&mut self, now_ns: u64, delay: Duration, event: E) {
        let due_ns = now_ns.saturating_add(delay.as_nanos() as u64);
        self.schedule_at(due_ns, event);
    }

    pub fn schedule_at(&mut self, due_ns: u64, event: E) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled { due_ns, seq, event }));
    }

    /// Pops the earliest event whose deadline has passed
    pub fn pop_due(&mut self, now_ns: u64) -> Option<E> {
        if self.heap.peek()?.0.due_ns > now_ns {
            return None;
        }
        self.heap.pop().map(|Reverse(s)| s.event)
    }

    pub fn next_due(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse(s)| s.due_ns)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_then_schedule_order() {
        let mut q = TimerQueue::new();
        q.schedule(0, Duration::from_millis(30), "late");
        q.schedule(0, Duration::from_millis(10), "first");
        q.schedule(0, Duration::from_millis(10), "second");
        assert_eq!(q.next_due(), Some(10_000_000));

        assert_eq!(q.pop_due(5_000_000), None);
        assert_eq!(q.pop_due(10_000_000), Some("first"));
        assert_eq!(q.pop_due(10_000_000), Some("second"));
        assert_eq!(q.pop_due(10_000_000), None);
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_due(u64::MAX), Some("late"));
        assert!(q.is_empty());
    }

    #[test]
    fn clear_drops_pending_events() {
        let mut q = TimerQueue::new();
        q.schedule(0, Duration::from_secs(1), 1);
        q.schedule(0, Duration::from_secs(2), 2);
        q.clear();
        assert_eq!(q.pop_due(u64::MAX), None);
        assert_eq!(q.next_due(), None);
    }
}
