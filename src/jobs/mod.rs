// Background work queue
//
// A single consumer drains tasks in FIFO order. Tasks may carry a tag so a
// whole family (e.g. every pending step of one reconciliation sweep) can be
// pulled out of the queue at once before it runs.

pub mod background;
pub mod reconcile;
pub mod runner;
pub mod serialized_update;
pub mod worker;

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Identifies one posted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// Shared cancellation token for a family of tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskTag(u64);

pub(crate) struct QueuedTask {
    id: TaskId,
    tag: Option<TaskTag>,
    run: Task,
}

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<QueuedTask>,
    next_id: u64,
    next_tag: u64,
    shutdown: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    available: Condvar,
}

/// Handle to the worker queue. Clones share the same queue.
#[derive(Clone)]
pub struct WorkerQueue {
    shared: Arc<Shared>,
}

impl Default for WorkerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerQueue {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                available: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a tag unique within this queue.
    pub fn new_tag(&self) -> TaskTag {
        let mut state = self.lock();
        state.next_tag += 1;
        TaskTag(state.next_tag)
    }

    pub fn post(&self, task: Task) -> TaskId {
        self.enqueue(None, task)
    }

    pub fn post_tagged(&self, tag: TaskTag, task: Task) -> TaskId {
        self.enqueue(Some(tag), task)
    }

    fn enqueue(&self, tag: Option<TaskTag>, run: Task) -> TaskId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = TaskId(state.next_id);
        state.tasks.push_back(QueuedTask { id, tag, run });
        drop(state);
        self.shared.available.notify_one();
        id
    }

    /// Remove a task that has not started yet. Returns false if it already
    /// ran, is running, or was never posted.
    pub fn remove(&self, id: TaskId) -> bool {
        let mut state = self.lock();
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != id);
        state.tasks.len() != before
    }

    /// Remove every queued task carrying `tag`. Returns how many were removed.
    pub fn remove_tagged(&self, tag: TaskTag) -> usize {
        let mut state = self.lock();
        let before = state.tasks.len();
        state.tasks.retain(|t| t.tag != Some(tag));
        before - state.tasks.len()
    }

    pub fn pending(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn pending_tagged(&self, tag: TaskTag) -> usize {
        self.lock().tasks.iter().filter(|t| t.tag == Some(tag)).count()
    }

    /// Stop the worker thread once the task it is running (if any) returns.
    /// Queued tasks stay queued and can still be drained by hand.
    pub fn shutdown(&self) {
        self.lock().shutdown = true;
        self.shared.available.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }

    pub(crate) fn pop_next(&self) -> Option<QueuedTask> {
        self.lock().tasks.pop_front()
    }

    /// Block until a task is available. `None` once shut down.
    pub(crate) fn wait_next(&self) -> Option<QueuedTask> {
        let mut state = self.lock();
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            state = self
                .shared
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_task(counter: &Arc<AtomicUsize>) -> Task {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_fifo_order() {
        let queue = WorkerQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = Arc::clone(&log);
            queue.post(Box::new(move || log.lock().unwrap().push(i)));
        }
        assert_eq!(queue.run_until_idle(), 3);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_remove_tagged_only_touches_tag() {
        let queue = WorkerQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let sweep = queue.new_tag();
        let other = queue.new_tag();
        assert_ne!(sweep, other);

        queue.post_tagged(sweep, counting_task(&counter));
        queue.post(counting_task(&counter));
        queue.post_tagged(sweep, counting_task(&counter));
        queue.post_tagged(other, counting_task(&counter));

        assert_eq!(queue.pending_tagged(sweep), 2);
        assert_eq!(queue.remove_tagged(sweep), 2);
        assert_eq!(queue.pending(), 2);
        queue.run_until_idle();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_remove_single_task() {
        let queue = WorkerQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = queue.post(counting_task(&counter));
        assert!(queue.remove(id));
        assert!(!queue.remove(id));
        assert_eq!(queue.run_until_idle(), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
