//! Per-request conversion job.
//!
//! Runs the engine against one validated path, honouring the cancellation flag
//! before and after the blocking engine call, and joins the returned text
//! blocks into the final Markdown.

use crate::models::{ConversionRequest, ErrorKind};
use crate::services::engine::{EngineError, EngineHandle};
use crate::services::task::{Mailbox, TaskEvent, TaskHandle, TaskId, TaskOutcome, TaskPanicked};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Separator placed between non-empty text blocks
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Failure categories a conversion task can report.
///
/// `FileNotFound` and `PermissionDenied` are absent: they are raised by the
/// pre-flight checks before a task exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionErrorKind {
    OsFailure,
    MissingDependency,
    EmptyResult,
    Unexpected,
}

impl fmt::Display for ConversionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversionErrorKind::OsFailure => "OS error",
            ConversionErrorKind::MissingDependency => "missing dependency",
            ConversionErrorKind::EmptyResult => "empty result",
            ConversionErrorKind::Unexpected => "unexpected error",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ConversionError {
    kind: ConversionErrorKind,
    message: String,
}

impl ConversionError {
    pub fn new(kind: ConversionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn empty_result() -> Self {
        Self::new(
            ConversionErrorKind::EmptyResult,
            "the converter returned no text",
        )
    }

    /// Shared taxonomy kind
    pub fn kind(&self) -> ErrorKind {
        match self.kind {
            ConversionErrorKind::OsFailure => ErrorKind::OsFailure,
            ConversionErrorKind::MissingDependency => ErrorKind::MissingDependency,
            ConversionErrorKind::EmptyResult => ErrorKind::EmptyResult,
            ConversionErrorKind::Unexpected => ErrorKind::Unexpected,
        }
    }

    /// Underlying detail, for logs
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Notification body for a failed conversion of `name`.
    ///
    /// Unexpected errors get a generic message; their detail only goes to the log.
    pub fn user_message(&self, name: &str) -> String {
        match self.kind {
            ConversionErrorKind::OsFailure => {
                let mut text = format!(
                    "An operating system error occurred while converting '{}':\n\n{}",
                    name, self.message
                );
                if self.message.contains("1314") {
                    text.push_str(
                        "\n\nThis usually means symbolic links could not be created. \
                         Try enabling Developer Mode in Windows settings, running the \
                         application as administrator, or checking the permissions of \
                         the converter's cache directory.",
                    );
                }
                text
            }
            ConversionErrorKind::MissingDependency => format!(
                "A required component is missing, so '{}' could not be converted:\n\n{}",
                name, self.message
            ),
            ConversionErrorKind::EmptyResult => format!(
                "The conversion of '{}' produced no text. The file may be empty, \
                 image-only, or in an unsupported format.",
                name
            ),
            ConversionErrorKind::Unexpected => format!(
                "An unexpected error occurred while converting '{}'. See the log file for details.",
                name
            ),
        }
    }
}

impl From<EngineError> for ConversionError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::MissingDependency(detail) => {
                ConversionError::new(ConversionErrorKind::MissingDependency, detail)
            }
            EngineError::Os(detail) => ConversionError::new(ConversionErrorKind::OsFailure, detail),
            EngineError::Failed(detail) => {
                ConversionError::new(ConversionErrorKind::Unexpected, detail)
            }
        }
    }
}

impl From<TaskPanicked> for ConversionError {
    fn from(panic: TaskPanicked) -> Self {
        ConversionError::new(ConversionErrorKind::Unexpected, panic.to_string())
    }
}

/// Successful conversion payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedDocument {
    pub markdown: String,
    pub block_count: usize,
    pub elapsed: Duration,
}

/// Join text blocks with a blank line, dropping whitespace-only blocks.
///
/// Returns `None` when no block carries any text.
pub fn join_blocks(blocks: &[String]) -> Option<String> {
    let kept: Vec<&str> = blocks
        .iter()
        .map(String::as_str)
        .filter(|block| !block.trim().is_empty())
        .collect();

    if kept.is_empty() {
        None
    } else {
        Some(kept.join(BLOCK_SEPARATOR))
    }
}

pub struct ConversionTask;

impl ConversionTask {
    /// Start converting `request` with `engine`.
    ///
    /// # Arguments
    ///
    /// * `runtime` - Runtime the task runs on
    /// * `mailbox` - Receives progress and the single terminal signal
    /// * `wrap` - Tags task events with the task identity
    /// * `engine` - Shared, read-only engine
    /// * `request` - Validated request
    /// * `timeout` - Optional limit on the engine call
    ///
    /// # Returns
    ///
    /// The task handle, returned immediately
    pub fn start<M: Send + 'static>(
        runtime: &tokio::runtime::Handle,
        mailbox: Mailbox<M>,
        wrap: fn(TaskId, TaskEvent<ConvertedDocument, ConversionError>) -> M,
        engine: EngineHandle,
        request: ConversionRequest,
        timeout: Option<Duration>,
    ) -> TaskHandle {
        TaskHandle::spawn(runtime, mailbox, wrap, move |ctx| async move {
            if ctx.is_cancelled() {
                tracing::info!("{} cancelled before starting", ctx.id());
                return TaskOutcome::Cancelled;
            }

            let name = request.display_name().to_string();
            ctx.report_progress(format!("Converting '{}'...", name));

            let started = Instant::now();
            let path = request.path.clone();
            let call = tokio::task::spawn_blocking(move || engine.convert(&path));

            let joined = match timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        tracing::error!(
                            "Conversion of {} timed out after {}s",
                            request.path,
                            limit.as_secs_f64()
                        );
                        return TaskOutcome::Failed(ConversionError::new(
                            ConversionErrorKind::Unexpected,
                            format!("timed out after {}s", limit.as_secs_f64()),
                        ));
                    }
                },
                None => call.await,
            };

            let result = match joined {
                Ok(result) => result,
                Err(join_error) if join_error.is_panic() => {
                    return TaskOutcome::Failed(ConversionError::new(
                        ConversionErrorKind::Unexpected,
                        "conversion engine panicked",
                    ));
                }
                Err(_) => return TaskOutcome::Cancelled,
            };

            if ctx.is_cancelled() {
                tracing::info!("{} cancelled after the engine returned", ctx.id());
                return TaskOutcome::Cancelled;
            }

            let blocks = match result {
                Ok(blocks) => blocks,
                Err(error) => return TaskOutcome::Failed(ConversionError::from(error)),
            };

            match join_blocks(&blocks) {
                Some(markdown) => TaskOutcome::Succeeded(ConvertedDocument {
                    markdown,
                    block_count: blocks.len(),
                    elapsed: started.elapsed(),
                }),
                None => TaskOutcome::Failed(ConversionError::empty_result()),
            }
        })
    }
}
