// ============================================================================
// DEFERRED WORK — debounced timers and the animation-frame queue
// ============================================================================
//
// The engine never spawns threads or sleeps. The host feeds a monotonic clock
// into `Timers::take_due` and calls `FrameQueue::next` once per frame; both
// queues hand work back as plain values for the canvas to run.

use std::collections::VecDeque;

/// Opaque handle for cancelling a scheduled item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

/// One-shot timers keyed by a deadline in milliseconds.
pub struct Timers<T> {
    pending: Vec<(TaskHandle, u64, T)>,
    next_id: u64,
}

impl<T> Default for Timers<T> {
    fn default() -> Self {
        Self { pending: Vec::new(), next_id: 0 }
    }
}

impl<T> Timers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` once `now_ms + delay_ms` has been reached.
    pub fn schedule(&mut self, now_ms: u64, delay_ms: u64, task: T) -> TaskHandle {
        self.next_id += 1;
        let handle = TaskHandle(self.next_id);
        self.pending.push((handle, now_ms.saturating_add(delay_ms), task));
        handle
    }

    /// Drop a pending timer. Returns `false` if it already ran or was cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|(h, _, _)| *h != handle);
        self.pending.len() != before
    }

    /// Remove and return every task whose deadline has passed, earliest first
    /// (ties keep scheduling order).
    pub fn take_due(&mut self, now_ms: u64) -> Vec<T> {
        let mut due: Vec<(TaskHandle, u64, T)> = Vec::new();
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].1 <= now_ms {
                due.push(self.pending.remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|(h, at, _)| (*at, h.0));
        due.into_iter().map(|(_, _, task)| task).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// FIFO of work items, one consumed per animation frame. Items are only
/// ever cancelled together.
pub struct FrameQueue<T> {
    queue: VecDeque<T>,
}

impl<T> Default for FrameQueue<T> {
    fn default() -> Self {
        Self { queue: VecDeque::new() }
    }
}

impl<T> FrameQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, item: T) {
        self.queue.push_back(item);
    }

    /// Cancel everything still queued. Returns how many items were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let n = self.queue.len();
        self.queue.clear();
        n
    }

    /// Pop the item for this frame.
    pub fn next(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timers_fire_in_deadline_order() {
        let mut t = Timers::new();
        t.schedule(0, 50, "b");
        t.schedule(0, 10, "a");
        t.schedule(0, 500, "late");
        assert!(t.take_due(5).is_empty());
        assert_eq!(t.take_due(60), vec!["a", "b"]);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut t = Timers::new();
        let h = t.schedule(0, 10, 1);
        t.schedule(0, 20, 2);
        assert!(t.cancel(h));
        assert!(!t.cancel(h));
        assert_eq!(t.take_due(100), vec![2]);
    }

    #[test]
    fn frame_queue_is_fifo_and_cancellable() {
        let mut q = FrameQueue::new();
        q.request(1);
        q.request(2);
        q.request(3);
        assert_eq!(q.next(), Some(1));
        assert_eq!(q.cancel_all(), 2);
        assert_eq!(q.next(), None);
        assert!(q.is_empty());
    }
}
