//! Min-priority queue keyed by `f32`
//!
//! There is no decrease-key: callers push again and must treat older
//! entries for the same item as stale when they come out.

use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug)]
struct QueueEntry<T> {
    priority: OrderedFloat<f32>,
    seq: u64,
    item: T,
}

impl<T> QueueEntry<T> {
    fn key(&self) -> (OrderedFloat<f32>, u64) {
        (self.priority, self.seq)
    }
}

impl<T> PartialEq for QueueEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T> Eq for QueueEntry<T> {}

impl<T> PartialOrd for QueueEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for QueueEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the smallest priority, then the
        // earliest insertion.
        other.key().cmp(&self.key())
    }
}

/// Binary min-heap over `(item, priority)` pairs
///
/// Equal priorities dequeue in insertion order.
#[derive(Debug)]
pub struct MinQueue<T> {
    heap: BinaryHeap<QueueEntry<T>>,
    next_seq: u64,
}

impl<T> Default for MinQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MinQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            next_seq: 0,
        }
    }

    /// O(log n)
    pub fn enqueue(&mut self, item: T, priority: f32) {
        self.heap.push(QueueEntry {
            priority: OrderedFloat(priority),
            seq: self.next_seq,
            item,
        });
        self.next_seq += 1;
    }

    /// Removes and returns the minimum-priority item; O(log n)
    pub fn dequeue(&mut self) -> Option<T> {
        self.dequeue_with_priority().map(|(item, _)| item)
    }

    /// Like [`MinQueue::dequeue`], also returning the priority it was queued with
    pub fn dequeue_with_priority(&mut self) -> Option<(T, f32)> {
        self.heap
            .pop()
            .map(|entry| (entry.item, entry.priority.into_inner()))
    }

    pub fn peek_priority(&self) -> Option<f32> {
        self.heap.peek().map(|entry| entry.priority.into_inner())
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }
}
