//! Single-slot background task runner
//!
//! A [`TaskSlot`] runs at most one operation at a time on a worker thread.
//! The outcome is sent back over a channel and picked up by the owning
//! thread through [`TaskSlot::poll`] or [`TaskSlot::wait`]; the worker never
//! calls back into the owner.
//!
//! Cancelling raises the task's [`CancelToken`] and drops the channel, so no
//! stale outcome is delivered. Work checks the token only between steps: a
//! filesystem operation already in progress runs to completion. Until the
//! cancelled worker has exited the slot is [`TaskState::Cancelling`] and
//! refuses new work, so two workers never overlap.

use crate::LibraryError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task already running: {0}")]
    AlreadyRunning(String),

    #[error("Failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Cooperative cancellation flag shared with a worker
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Slot state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
    /// Cancelled, worker still winding down
    Cancelling,
    Done,
    Failed,
}

/// Outcome delivered to the slot owner
#[derive(Debug)]
pub enum TaskEvent<T> {
    Done(T),
    Failed(LibraryError),
}

struct RunningTask<T> {
    label: String,
    rx: Receiver<Result<T, LibraryError>>,
    cancel: CancelToken,
    worker: JoinHandle<()>,
}

/// Cancelled task whose worker may still be running
struct RetiredTask {
    label: String,
    worker: JoinHandle<()>,
}

/// Owns at most one running background task
pub struct TaskSlot<T> {
    state: TaskState,
    running: Option<RunningTask<T>>,
    retired: Option<RetiredTask>,
}

impl<T: Send + 'static> Default for TaskSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> TaskSlot<T> {
    pub fn new() -> Self {
        Self {
            state: TaskState::Idle,
            running: None,
            retired: None,
        }
    }

    pub fn state(&self) -> TaskState {
        match &self.retired {
            Some(task) if !task.worker.is_finished() => TaskState::Cancelling,
            _ => self.state,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == TaskState::Running
    }

    /// Label of the running task
    pub fn current(&self) -> Option<&str> {
        self.running.as_ref().map(|task| task.label.as_str())
    }

    /// Start `work` on a worker thread
    ///
    /// Fails with [`TaskError::AlreadyRunning`] while another task is running
    /// or a cancelled one has not exited yet.
    pub fn start<F>(&mut self, label: impl Into<String>, work: F) -> Result<(), TaskError>
    where
        F: FnOnce(&CancelToken) -> Result<T, LibraryError> + Send + 'static,
    {
        if let Some(task) = &self.running {
            return Err(TaskError::AlreadyRunning(task.label.clone()));
        }
        self.reap_retired()?;

        let label = label.into();
        let (tx, rx) = mpsc::channel();
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let worker_label = label.clone();

        let worker = thread::Builder::new()
            .name(format!("gamedex-{}", label))
            .spawn(move || {
                tracing::debug!("Task {} started", worker_label);
                let outcome = work(&worker_cancel);
                if tx.send(outcome).is_err() {
                    tracing::debug!("Task {} finished after its slot let go", worker_label);
                }
            })?;

        tracing::info!("Started task {}", label);
        self.running = Some(RunningTask {
            label,
            rx,
            cancel,
            worker,
        });
        self.state = TaskState::Running;
        Ok(())
    }

    /// Take the outcome if the running task has finished
    pub fn poll(&mut self) -> Option<TaskEvent<T>> {
        let task = self.running.as_ref()?;
        let outcome = match task.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(LibraryError::WorkerLost),
        };
        Some(self.finish(outcome))
    }

    /// Block until the running task finishes
    ///
    /// Returns `None` when nothing is running.
    pub fn wait(&mut self) -> Option<TaskEvent<T>> {
        let task = self.running.as_ref()?;
        let outcome = task.rx.recv().unwrap_or(Err(LibraryError::WorkerLost));
        Some(self.finish(outcome))
    }

    /// Ask the running task to stop and discard its outcome
    ///
    /// The slot stays [`TaskState::Cancelling`] until the worker exits.
    pub fn cancel(&mut self) {
        if let Some(task) = self.running.take() {
            task.cancel.cancel();
            tracing::info!("Cancelled task {}", task.label);
            self.state = TaskState::Idle;
            self.retired = Some(RetiredTask {
                label: task.label,
                worker: task.worker,
            });
        }
    }

    /// Block until a cancelled worker has exited
    pub fn join_cancelled(&mut self) {
        if let Some(task) = self.retired.take() {
            if task.worker.join().is_err() {
                tracing::warn!("Cancelled task {} panicked", task.label);
            }
            tracing::debug!("Cancelled task {} exited", task.label);
        }
    }

    fn reap_retired(&mut self) -> Result<(), TaskError> {
        match self.retired.take() {
            Some(task) if !task.worker.is_finished() => {
                let label = task.label.clone();
                self.retired = Some(task);
                Err(TaskError::AlreadyRunning(label))
            }
            Some(task) => {
                if task.worker.join().is_err() {
                    tracing::warn!("Cancelled task {} panicked", task.label);
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn finish(&mut self, outcome: Result<T, LibraryError>) -> TaskEvent<T> {
        let label = match self.running.take() {
            Some(task) => {
                // The outcome was sent, so the worker is returning
                task.worker.join().ok();
                task.label
            }
            None => String::new(),
        };

        match outcome {
            Ok(value) => {
                tracing::info!("Task {} done", label);
                self.state = TaskState::Done;
                TaskEvent::Done(value)
            }
            Err(e) => {
                tracing::warn!("Task {} failed: {}", label, e);
                self.state = TaskState::Failed;
                TaskEvent::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::time::{Duration, Instant};

    #[test]
    fn test_idle_slot() {
        let mut slot: TaskSlot<u32> = TaskSlot::new();
        assert_eq!(slot.state(), TaskState::Idle);
        assert!(slot.poll().is_none());
        assert!(slot.wait().is_none());
    }

    #[test]
    fn test_done() {
        let mut slot = TaskSlot::new();
        slot.start("answer", |_| Ok(42u32)).unwrap();
        assert_eq!(slot.current(), Some("answer"));

        match slot.wait() {
            Some(TaskEvent::Done(value)) => assert_eq!(value, 42),
            other => panic!("Expected Done, got {:?}", other),
        }
        assert_eq!(slot.state(), TaskState::Done);
        assert!(slot.current().is_none());
    }

    #[test]
    fn test_failed() {
        let mut slot: TaskSlot<()> = TaskSlot::new();
        slot.start("broken", |_| Err(LibraryError::Cancelled)).unwrap();
        assert!(matches!(
            slot.wait(),
            Some(TaskEvent::Failed(LibraryError::Cancelled))
        ));
        assert_eq!(slot.state(), TaskState::Failed);
    }

    #[test]
    fn test_second_start_is_refused() {
        let (release_tx, release_rx) = channel::<()>();
        let mut slot = TaskSlot::new();
        slot.start("first", move |_| {
            release_rx.recv().ok();
            Ok(1u32)
        })
        .unwrap();

        let err = slot.start("second", |_| Ok(2u32)).unwrap_err();
        assert!(matches!(err, TaskError::AlreadyRunning(ref label) if label == "first"));
        assert!(slot.is_running());

        release_tx.send(()).unwrap();
        assert!(matches!(slot.wait(), Some(TaskEvent::Done(1))));

        // A finished slot accepts the next task
        slot.start("third", |_| Ok(3u32)).unwrap();
        assert!(matches!(slot.wait(), Some(TaskEvent::Done(3))));
    }

    #[test]
    fn test_poll_delivers_once() {
        let mut slot = TaskSlot::new();
        slot.start("quick", |_| Ok("done")).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let event = loop {
            if let Some(event) = slot.poll() {
                break event;
            }
            assert!(Instant::now() < deadline, "task never completed");
            thread::sleep(Duration::from_millis(5));
        };

        assert!(matches!(event, TaskEvent::Done("done")));
        assert!(slot.poll().is_none());
    }

    #[test]
    fn test_cancel_suppresses_delivery() {
        let (started_tx, started_rx) = channel::<()>();
        let (observed_tx, observed_rx) = channel::<bool>();
        let mut slot = TaskSlot::new();

        slot.start("long", move |cancel| {
            started_tx.send(()).ok();
            let deadline = Instant::now() + Duration::from_secs(5);
            while !cancel.is_cancelled() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            observed_tx.send(cancel.is_cancelled()).ok();
            Ok(())
        })
        .unwrap();

        started_rx.recv().unwrap();
        slot.cancel();

        assert_ne!(slot.state(), TaskState::Running);
        assert!(observed_rx.recv().unwrap());
        assert!(slot.poll().is_none());
        assert!(slot.wait().is_none());

        slot.join_cancelled();
        assert_eq!(slot.state(), TaskState::Idle);
    }

    #[test]
    fn test_start_waits_for_cancelled_worker() {
        let (release_tx, release_rx) = channel::<()>();
        let (exited_tx, exited_rx) = channel::<()>();
        let mut slot = TaskSlot::new();

        // Ignores its token, like a deletion does
        slot.start("stubborn", move |_| {
            release_rx.recv().ok();
            exited_tx.send(()).ok();
            Ok(1u32)
        })
        .unwrap();

        slot.cancel();
        assert_eq!(slot.state(), TaskState::Cancelling);
        let err = slot.start("next", |_| Ok(2u32)).unwrap_err();
        assert!(matches!(err, TaskError::AlreadyRunning(ref label) if label == "stubborn"));

        release_tx.send(()).unwrap();
        exited_rx.recv().unwrap();
        slot.join_cancelled();
        assert_eq!(slot.state(), TaskState::Idle);

        slot.start("next", |_| Ok(2u32)).unwrap();
        assert!(matches!(slot.wait(), Some(TaskEvent::Done(2))));
    }

    #[test]
    fn test_start_after_cancelled_worker_exits() {
        let mut slot = TaskSlot::new();
        slot.start("short", |_| Ok(1u32)).unwrap();
        slot.cancel();

        let deadline = Instant::now() + Duration::from_secs(5);
        while slot.state() == TaskState::Cancelling {
            assert!(Instant::now() < deadline, "cancelled worker never exited");
            thread::sleep(Duration::from_millis(5));
        }

        // The finished worker is reaped by the next start
        slot.start("next", |_| Ok(2u32)).unwrap();
        assert!(matches!(slot.wait(), Some(TaskEvent::Done(2))));
    }

    #[test]
    fn test_panicking_worker_is_failed() {
        let mut slot: TaskSlot<()> = TaskSlot::new();
        slot.start("panics", |_| panic!("worker blew up")).unwrap();
        assert!(matches!(
            slot.wait(),
            Some(TaskEvent::Failed(LibraryError::WorkerLost))
        ));
    }
}
