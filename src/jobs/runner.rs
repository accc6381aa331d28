// Task runner - executes tasks from the queue on the calling thread

use super::{QueuedTask, WorkerQueue};

impl WorkerQueue {
    /// Run the next queued task, if any. Panics inside the task are caught
    /// and logged so the caller keeps going.
    pub fn run_next(&self) -> bool {
        match self.pop_next() {
            Some(task) => {
                run_task(task);
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty, including tasks that running tasks
    /// post. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut count = 0;
        while self.run_next() {
            count += 1;
        }
        count
    }
}

pub(crate) fn run_task(task: QueuedTask) {
    let id = task.id;
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task.run));
    if result.is_err() {
        log::error!("Icon worker: task {:?} panicked (recovered)", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_panicking_task_does_not_stop_drain() {
        let queue = WorkerQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));

        queue.post(Box::new(|| panic!("boom")));
        let c = Arc::clone(&counter);
        queue.post(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(queue.run_until_idle(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_self_reposting_task_drains() {
        fn step(queue: WorkerQueue, remaining: usize, counter: Arc<AtomicUsize>) {
            counter.fetch_add(1, Ordering::SeqCst);
            if remaining > 1 {
                let next = queue.clone();
                queue.post(Box::new(move || step(next, remaining - 1, counter)));
            }
        }

        let queue = WorkerQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let q = queue.clone();
        let c = Arc::clone(&counter);
        queue.post(Box::new(move || step(q, 4, c)));

        assert_eq!(queue.run_until_idle(), 4);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }
}
