//! # Deferred Tasks
//!
//! **Timer off-thread, execution on the world thread**
//!
//! Some follow-ups (restoring signature energy after a weapon swap) must run
//! a short time later, but may only touch entity state from the thread that
//! owns the world. [`DeferredScheduler`] splits the two:
//!
//! 1. [`DeferredScheduler::schedule`] sends the task to a timer thread.
//! 2. When due, the timer forwards it over a crossbeam channel.
//! 3. The world thread calls [`DeferredScheduler::run_due`] once per tick and
//!    runs whatever arrived, with `&mut` access to its world.
//!
//! A task is dropped without running if its [`LivenessHandle`] was
//! invalidated (entity despawned, player left) or its [`TaskHandle`] was
//! cancelled.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{ProgressionError, ProgressionResult};

/// Upper bound on how long the timer sleeps with nothing due.
const IDLE_WAIT: Duration = Duration::from_millis(250);

/// Shared flag telling deferred work whether its target still exists.
#[derive(Clone, Debug)]
pub struct LivenessHandle(Arc<AtomicBool>);

impl LivenessHandle {
    /// A live handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Marks the target gone. Irreversible.
    pub fn invalidate(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Whether the target still exists.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for LivenessHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation handle for one scheduled task.
#[derive(Clone, Debug)]
pub struct TaskHandle(Arc<AtomicBool>);

impl TaskHandle {
    /// Prevents the task from running if it has not run yet.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`Self::cancel`] was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

type Task<W> = Box<dyn FnOnce(&mut W) + Send>;

struct Scheduled<W> {
    due: Instant,
    liveness: LivenessHandle,
    cancelled: TaskHandle,
    task: Task<W>,
}

/// Delayed tasks executed on the caller's thread.
pub struct DeferredScheduler<W> {
    submit: Option<Sender<Scheduled<W>>>,
    ready: Receiver<Scheduled<W>>,
    timer: Option<JoinHandle<()>>,
}

impl<W: 'static> DeferredScheduler<W> {
    /// Starts the timer thread.
    #[must_use]
    pub fn new() -> Self {
        let (submit, incoming) = unbounded::<Scheduled<W>>();
        let (due_tx, ready) = unbounded::<Scheduled<W>>();

        let timer = thread::spawn(move || Self::timer_loop(&incoming, &due_tx));

        Self {
            submit: Some(submit),
            ready,
            timer: Some(timer),
        }
    }

    fn timer_loop(incoming: &Receiver<Scheduled<W>>, due_tx: &Sender<Scheduled<W>>) {
        let mut waiting: Vec<Scheduled<W>> = Vec::new();
        loop {
            let now = Instant::now();
            let wait = waiting
                .iter()
                .map(|task| task.due.saturating_duration_since(now))
                .min()
                .unwrap_or(IDLE_WAIT);

            match incoming.recv_timeout(wait) {
                Ok(task) => waiting.push(task),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            let now = Instant::now();
            let mut index = 0;
            while index < waiting.len() {
                if waiting[index].due <= now {
                    let task = waiting.swap_remove(index);
                    if due_tx.send(task).is_err() {
                        return;
                    }
                } else {
                    index += 1;
                }
            }
        }
        tracing::debug!("Deferred timer stopped, {} tasks dropped", waiting.len());
    }

    /// Schedules `task` to run on the world thread after `delay`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressionError::SchedulerClosed`] after shutdown.
    pub fn schedule(
        &self,
        delay: Duration,
        liveness: &LivenessHandle,
        task: impl FnOnce(&mut W) + Send + 'static,
    ) -> ProgressionResult<TaskHandle> {
        let submit = self.submit.as_ref().ok_or(ProgressionError::SchedulerClosed)?;
        let handle = TaskHandle(Arc::new(AtomicBool::new(false)));
        submit
            .send(Scheduled {
                due: Instant::now() + delay,
                liveness: liveness.clone(),
                cancelled: handle.clone(),
                task: Box::new(task),
            })
            .map_err(|_| ProgressionError::SchedulerClosed)?;
        Ok(handle)
    }

    /// Runs every task that has come due. Returns how many actually ran.
    pub fn run_due(&self, world: &mut W) -> usize {
        let mut ran = 0;
        for scheduled in self.ready.try_iter() {
            if scheduled.cancelled.is_cancelled() {
                continue;
            }
            if !scheduled.liveness.is_alive() {
                tracing::debug!("Skipping deferred task for a target that is gone");
                continue;
            }
            (scheduled.task)(world);
            ran += 1;
        }
        ran
    }
}

impl<W> DeferredScheduler<W> {
    /// Stops the timer thread. Tasks not yet due are dropped.
    pub fn shutdown(&mut self) {
        self.submit = None;
        if let Some(timer) = self.timer.take() {
            if timer.join().is_err() {
                tracing::warn!("Deferred timer thread panicked");
            }
        }
    }

    /// Whether [`Self::shutdown`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.submit.is_none()
    }
}

impl<W: 'static> Default for DeferredScheduler<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> Drop for DeferredScheduler<W> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
