//! Per-`(tenant, agent kind)` priority FIFO.
//!
//! Items are ordered by `(-priority, created_at)`; ties break by a
//! submission sequence number so ordering is total. Capacity is the
//! tenant's concurrent-task quota: a full queue rejects fast instead
//! of buffering unboundedly.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;

use cortex_core::models::task::Task;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

struct QueuedItem {
    priority: i32,
    created_at: chrono::DateTime<chrono::Utc>,
    seq: u64,
    task: Task,
}

impl PartialEq for QueuedItem {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedItem {}

impl Ord for QueuedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then earlier submission.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct QueueState {
    heap: BinaryHeap<QueuedItem>,
    reserved: usize,
    next_seq: u64,
}

pub struct AgentQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    notify: Notify,
}

/// A reserved queue slot. Commit it with a persisted task or drop it
/// to release the slot. Reserving before persisting keeps the durable
/// record and the in-memory queue consistent.
pub struct SlotReservation<'a> {
    queue: &'a AgentQueue,
    committed: bool,
}

impl<'a> SlotReservation<'a> {
    pub fn commit(mut self, task: Task) {
        let mut state = self.queue.state.lock().expect("queue lock poisoned");
        state.reserved -= 1;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(QueuedItem {
            priority: task.priority,
            created_at: task.created_at,
            seq,
            task,
        });
        drop(state);
        self.committed = true;
        self.queue.notify.notify_one();
    }
}

impl Drop for SlotReservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let mut state = self.queue.state.lock().expect("queue lock poisoned");
            state.reserved -= 1;
        }
    }
}

impl AgentQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                reserved: 0,
                next_seq: 0,
            }),
            capacity: capacity.max(1),
            notify: Notify::new(),
        }
    }

    /// Reserve a slot, or `None` when the queue is at capacity.
    pub fn reserve(&self) -> Option<SlotReservation<'_>> {
        let mut state = self.state.lock().expect("queue lock poisoned");
        if state.heap.len() + state.reserved >= self.capacity {
            return None;
        }
        state.reserved += 1;
        Some(SlotReservation {
            queue: self,
            committed: false,
        })
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("queue lock poisoned").heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn try_pop(&self) -> Option<Task> {
        let mut state = self.state.lock().expect("queue lock poisoned");
        state.heap.pop().map(|item| item.task)
    }

    /// Wait for the next task, or `None` when `shutdown` fires first.
    pub async fn pop(&self, shutdown: &CancellationToken) -> Option<Task> {
        loop {
            if let Some(task) = self.try_pop() {
                return Some(task);
            }
            tokio::select! {
                _ = shutdown.cancelled() => return None,
                _ = self.notify.notified() => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cortex_core::models::agent::AgentKind;
    use cortex_core::models::task::TaskState;
    use serde_json::json;
    use uuid::Uuid;

    fn task(priority: i32) -> Task {
        Task {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            agent_kind: AgentKind::Sales,
            submitted_by: Uuid::new_v4(),
            payload: json!({}),
            priority,
            created_at: Utc::now(),
            deadline: None,
            state: TaskState::Queued,
            attempt_count: 0,
            parent_id: None,
            result: None,
            error: None,
        }
    }

    fn push(queue: &AgentQueue, task: Task) {
        queue.reserve().expect("queue full").commit(task);
    }

    #[test]
    fn higher_priority_pops_first() {
        let queue = AgentQueue::new(8);
        let low = task(0);
        let high = task(5);
        push(&queue, low.clone());
        push(&queue, high.clone());

        assert_eq!(queue.try_pop().unwrap().id, high.id);
        assert_eq!(queue.try_pop().unwrap().id, low.id);
    }

    #[test]
    fn same_priority_is_fifo() {
        let queue = AgentQueue::new(8);
        let first = task(1);
        let second = task(1);
        push(&queue, first.clone());
        push(&queue, second.clone());

        assert_eq!(queue.try_pop().unwrap().id, first.id);
        assert_eq!(queue.try_pop().unwrap().id, second.id);
    }

    #[test]
    fn capacity_rejects_fast() {
        let queue = AgentQueue::new(2);
        push(&queue, task(0));
        push(&queue, task(0));
        assert!(queue.reserve().is_none());

        // Draining frees a slot.
        queue.try_pop();
        assert!(queue.reserve().is_some());
    }

    #[test]
    fn dropped_reservation_releases_slot() {
        let queue = AgentQueue::new(1);
        {
            let _reservation = queue.reserve().unwrap();
            assert!(queue.reserve().is_none());
        }
        assert!(queue.reserve().is_some());
    }
}
