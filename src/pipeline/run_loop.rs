//! Run-loop bookkeeping: the deduplicated execution queue and the
//! time-cursor debounce window.
//!
//! Both are plain data owned by the pipeline. Nothing here spawns tasks;
//! the pipeline drains the queue itself, and the debounce deadline is a
//! cancellable value that [`Debounce::expired`] awaits. Dropping the
//! pipeline therefore drops any pending trigger with it.

use std::collections::VecDeque;
use std::time::Duration;

use rustc_hash::FxHashSet;
use tokio::time::Instant;

use crate::types::NodeId;

/// Pending node ids, deduplicated by id, drained FIFO under a
/// single-flight guard.
#[derive(Debug, Default)]
pub(crate) struct RunQueue {
    entries: VecDeque<NodeId>,
    members: FxHashSet<NodeId>,
    draining: bool,
}

impl RunQueue {
    /// Append an id unless it is already queued. Returns whether the
    /// queue changed.
    pub(crate) fn enqueue(&mut self, id: NodeId) -> bool {
        if self.members.insert(id) {
            self.entries.push_back(id);
            true
        } else {
            false
        }
    }

    pub(crate) fn pop(&mut self) -> Option<NodeId> {
        let id = self.entries.pop_front()?;
        self.members.remove(&id);
        Some(id)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Take the drain guard. Returns `false` when a drain is already
    /// active, in which case the caller must not start another.
    pub(crate) fn begin_drain(&mut self) -> bool {
        if self.draining {
            false
        } else {
            self.draining = true;
            true
        }
    }

    pub(crate) fn finish_drain(&mut self) {
        debug_assert!(self.draining, "finish_drain without begin_drain");
        self.draining = false;
    }

    pub(crate) fn is_draining(&self) -> bool {
        self.draining
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.members.clear();
    }
}

/// Trailing-edge debounce stored as a deadline.
///
/// Arming (re)sets the deadline one window into the future; a later arm
/// supersedes an earlier one, which is what collapses a scrub gesture
/// into a single execution.
#[derive(Debug)]
pub(crate) struct Debounce {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub(crate) fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    /// Drop any pending deadline. Returns whether one was pending.
    pub(crate) fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wait out the current deadline. Resolves `true` once the window
    /// elapses, or `false` immediately when nothing is armed.
    pub(crate) async fn expired(&mut self) -> bool {
        match self.deadline {
            None => false,
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_dedups_by_id() {
        let mut queue = RunQueue::default();
        let a = NodeId::new();
        let b = NodeId::new();
        assert!(queue.enqueue(a));
        assert!(queue.enqueue(b));
        assert!(!queue.enqueue(a));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop(), Some(a));
        // Popped ids may be enqueued again.
        assert!(queue.enqueue(a));
        assert_eq!(queue.pop(), Some(b));
        assert_eq!(queue.pop(), Some(a));
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_guard_is_single_flight() {
        let mut queue = RunQueue::default();
        assert!(queue.begin_drain());
        assert!(!queue.begin_drain());
        assert!(queue.is_draining());
        queue.finish_drain();
        assert!(queue.begin_drain());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_extends_the_deadline() {
        let mut debounce = Debounce::new(Duration::from_millis(300));
        assert!(!debounce.expired().await);

        debounce.arm();
        tokio::time::advance(Duration::from_millis(200)).await;
        debounce.arm();
        let fired_at = Instant::now() + Duration::from_millis(300);
        assert!(debounce.expired().await);
        assert!(Instant::now() >= fired_at);
        assert!(!debounce.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_clears_the_pending_window() {
        let mut debounce = Debounce::new(Duration::from_millis(300));
        debounce.arm();
        assert!(debounce.cancel());
        assert!(!debounce.cancel());
        assert!(!debounce.expired().await);
    }
}
