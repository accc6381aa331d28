// Background icon worker -- a dedicated thread draining the WorkerQueue.
//
// Spawn once when the host starts and keep it for the app lifetime. All
// store writes from reconciliation happen here, off the interactive path.

use std::thread::JoinHandle;

use super::runner::run_task;
use super::WorkerQueue;
use crate::error::Result;

/// Owns the worker thread. Dropping the handle detaches the thread; call
/// [`WorkerHandle::shutdown`] to stop it.
pub struct WorkerHandle {
    queue: WorkerQueue,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Stop after the current task and wait for the thread to exit.
    pub fn shutdown(mut self) {
        self.queue.shutdown();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Icon worker: thread exited with a panic");
            }
        }
    }
}

impl WorkerQueue {
    /// Spawn the consumer thread for this queue.
    pub fn start(&self, name: &str) -> Result<WorkerHandle> {
        let queue = self.clone();
        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(queue))?;

        log::debug!("Icon worker '{}' started", name);

        Ok(WorkerHandle {
            queue: self.clone(),
            thread: Some(thread),
        })
    }
}

fn worker_loop(queue: WorkerQueue) {
    while let Some(task) = queue.wait_next() {
        run_task(task);
    }
    log::debug!("Icon worker: shutdown requested, exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_thread_runs_posted_tasks_in_order() {
        let queue = WorkerQueue::new();
        let handle = queue.start("icon-worker-test").unwrap();

        let (tx, rx) = mpsc::channel();
        for i in 0..5 {
            let tx = tx.clone();
            queue.post(Box::new(move || {
                tx.send(i).unwrap();
            }));
        }

        let got: Vec<i32> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);

        handle.shutdown();
        assert!(queue.is_shutdown());
    }

    #[test]
    fn test_thread_survives_panicking_task() {
        let queue = WorkerQueue::new();
        let handle = queue.start("icon-worker-test").unwrap();

        let (tx, rx) = mpsc::channel();
        queue.post(Box::new(|| panic!("boom")));
        queue.post(Box::new(move || {
            tx.send(()).unwrap();
        }));

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        handle.shutdown();
    }
}
