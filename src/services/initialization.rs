//! One-shot background resolution of the conversion engine.

use crate::services::engine::{EngineError, EngineHandle, EngineLoader};
use crate::services::task::{Mailbox, TaskEvent, TaskHandle, TaskId, TaskOutcome, TaskPanicked};
use std::sync::Arc;
use thiserror::Error;

/// Why the engine could not be made available
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<EngineError> for InitError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::MissingDependency(detail) => InitError::MissingDependency(detail),
            other => InitError::Unexpected(other.to_string()),
        }
    }
}

impl From<TaskPanicked> for InitError {
    fn from(panic: TaskPanicked) -> Self {
        InitError::Unexpected(panic.to_string())
    }
}

impl InitError {
    /// Body of the error notification shown to the user
    pub fn user_message(&self) -> String {
        match self {
            InitError::MissingDependency(detail) => format!(
                "The document converter could not be loaded because a required component is missing.\n\n{}\n\nInstall a supported converter (markitdown or pandoc) and restart the application.",
                detail
            ),
            InitError::Unexpected(detail) => format!(
                "The document converter could not be loaded.\n\n{}",
                detail
            ),
        }
    }
}

/// Resolves the engine on the blocking pool and reports once.
pub struct InitializationTask;

impl InitializationTask {
    /// Start resolving the engine.
    ///
    /// # Arguments
    ///
    /// * `runtime` - Runtime the task runs on
    /// * `mailbox` - Receives progress and the single terminal signal
    /// * `wrap` - Tags task events with the task identity
    /// * `loader` - Engine resolution strategy
    ///
    /// # Returns
    ///
    /// The task handle, returned before any engine work starts
    pub fn start<M: Send + 'static>(
        runtime: &tokio::runtime::Handle,
        mailbox: Mailbox<M>,
        wrap: fn(TaskId, TaskEvent<EngineHandle, InitError>) -> M,
        loader: Arc<dyn EngineLoader>,
    ) -> TaskHandle {
        TaskHandle::spawn(runtime, mailbox, wrap, move |ctx| async move {
            if ctx.is_cancelled() {
                return TaskOutcome::Cancelled;
            }
            ctx.report_progress("Loading conversion engine...");

            let result = match tokio::task::spawn_blocking(move || loader.load()).await {
                Ok(result) => result,
                Err(join_error) if join_error.is_panic() => {
                    return TaskOutcome::Failed(InitError::Unexpected(
                        "engine loader panicked".to_string(),
                    ));
                }
                Err(_) => return TaskOutcome::Cancelled,
            };

            if ctx.is_cancelled() {
                return TaskOutcome::Cancelled;
            }

            match result {
                Ok(engine) => {
                    tracing::info!("Conversion engine ready: {}", engine.name());
                    TaskOutcome::Succeeded(engine)
                }
                Err(error) => {
                    tracing::error!("Conversion engine failed to load: {}", error);
                    TaskOutcome::Failed(InitError::from(error))
                }
            }
        })
    }
}
