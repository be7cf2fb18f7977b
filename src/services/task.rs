//! Cancellable background tasks with a single terminal signal.
//!
//! A [`TaskHandle`] is shared between the interactive context (which may request
//! cancellation) and a tokio task (which reports back). Everything a task has to
//! say travels as a message through a [`Mailbox`]; the receiving end is drained
//! only by the interactive context, so background code never touches
//! application state directly.
//!
//! # Delivery contract
//!
//! - Any number of [`TaskEvent::Progress`] messages, then
//! - exactly one [`TaskEvent::Finished`], even if the work panics.
//!
//! Cancellation is advisory. The work polls [`TaskContext::is_cancelled`] at its
//! checkpoints; the supervisor also checks the flag when the work returns, so a
//! task whose cancellation was requested never reports success.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;

/// Sending half of the channel drained by the interactive context.
///
/// Unbounded because terminal signals must never be dropped.
pub type Mailbox<M> = mpsc::UnboundedSender<M>;

/// Receiving half of a [`Mailbox`]
pub type MailboxReceiver<M> = mpsc::UnboundedReceiver<M>;

/// Create a connected mailbox pair
pub fn mailbox<M>() -> (Mailbox<M>, MailboxReceiver<M>) {
    mpsc::unbounded_channel()
}

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique task identity, used to reject stale signals
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Terminal result of a task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T, E> {
    Succeeded(T),
    Failed(E),
    Cancelled,
}

impl<T, E> TaskOutcome<T, E> {
    pub fn label(&self) -> &'static str {
        match self {
            TaskOutcome::Succeeded(_) => "succeeded",
            TaskOutcome::Failed(_) => "failed",
            TaskOutcome::Cancelled => "cancelled",
        }
    }
}

/// Message emitted by a running task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent<T, E> {
    Progress(String),
    Finished(TaskOutcome<T, E>),
}

/// The work panicked before producing an outcome
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("background task panicked: {0}")]
pub struct TaskPanicked(pub String);

/// Shared cancellation flag.
///
/// Written by the interactive context, read by the background context. It is
/// not a synchronization primitive for anything else.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
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

/// View of the task given to the work closure
pub struct TaskContext {
    id: TaskId,
    flag: CancellationFlag,
    progress: Arc<dyn Fn(String) + Send + Sync>,
}

impl TaskContext {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Cancellation checkpoint
    pub fn is_cancelled(&self) -> bool {
        self.flag.is_cancelled()
    }

    pub fn report_progress(&self, message: impl Into<String>) {
        (self.progress)(message.into());
    }
}

/// Handle to a spawned background task.
///
/// Dropping the handle does not stop the task; it only loses the ability to
/// cancel it.
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    flag: CancellationFlag,
    finished: Arc<AtomicBool>,
}

impl TaskHandle {
    /// Start `work` on the runtime and return immediately.
    ///
    /// `wrap` turns task events into the mailbox message type, tagging them with
    /// the task identity so the receiver can recognise stale signals.
    ///
    /// # Example
    /// ```ignore
    /// let handle = TaskHandle::spawn(&runtime, tx, AppEvent::conversion, |ctx| async move {
    ///     if ctx.is_cancelled() {
    ///         return TaskOutcome::Cancelled;
    ///     }
    ///     TaskOutcome::Succeeded(do_work().await)
    /// });
    /// ```
    pub fn spawn<T, E, M, W, Fut>(
        runtime: &tokio::runtime::Handle,
        mailbox: Mailbox<M>,
        wrap: fn(TaskId, TaskEvent<T, E>) -> M,
        work: W,
    ) -> Self
    where
        T: Send + 'static,
        E: From<TaskPanicked> + Send + 'static,
        M: Send + 'static,
        W: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = TaskOutcome<T, E>> + Send + 'static,
    {
        let id = TaskId::next();
        let flag = CancellationFlag::new();
        let finished = Arc::new(AtomicBool::new(false));

        let progress_mailbox = mailbox.clone();
        let context = TaskContext {
            id,
            flag: flag.clone(),
            progress: Arc::new(move |message| {
                // Progress is best effort; the receiver may already be gone
                let _ = progress_mailbox.send(wrap(id, TaskEvent::Progress(message)));
            }),
        };

        let supervisor_flag = flag.clone();
        let supervisor_finished = Arc::clone(&finished);
        let inner_runtime = runtime.clone();

        runtime.spawn(async move {
            tracing::debug!("{} started", id);

            let outcome = match inner_runtime.spawn(work(context)).await {
                Ok(outcome) => outcome,
                Err(join_error) if join_error.is_panic() => {
                    let message = panic_message(join_error.into_panic());
                    tracing::error!("{} panicked: {}", id, message);
                    TaskOutcome::Failed(E::from(TaskPanicked(message)))
                }
                Err(_) => {
                    tracing::debug!("{} aborted by runtime shutdown", id);
                    TaskOutcome::Cancelled
                }
            };

            let outcome = if supervisor_flag.is_cancelled() {
                TaskOutcome::Cancelled
            } else {
                outcome
            };

            supervisor_finished.store(true, Ordering::SeqCst);
            tracing::debug!("{} finished: {}", id, outcome.label());

            if mailbox.send(wrap(id, TaskEvent::Finished(outcome))).is_err() {
                tracing::debug!("{} finished after its receiver closed", id);
            }
        });

        Self { id, flag, finished }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Request cancellation. A no-op once the task has finished.
    pub fn cancel(&self) {
        if self.is_finished() {
            tracing::debug!("{} already finished, cancellation ignored", self.id);
            return;
        }
        tracing::info!("Cancellation requested for {}", self.id);
        self.flag.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
