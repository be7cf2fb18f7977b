//! Services module - background work and adapters behind the controller.
//!
//! Nothing here touches application state or the UI. Tasks talk back only by
//! posting messages into a [`Mailbox`](task::Mailbox).
//!
//! # Components
//!
//! - [`TaskHandle`]: cancellable background unit with exactly one terminal signal
//! - [`InitializationTask`]: resolves the conversion engine once per process
//! - [`ConversionTask`]: converts one document, observing cancellation checkpoints
//! - [`ConversionEngine`] / [`EngineLoader`]: the opaque engine and how it is found.
//!   [`ExternalConverterLoader`] locates a converter executable (markitdown,
//!   pandoc, or one configured explicitly) and runs it as a child process
//! - [`files`]: pre-flight checks, dropped-path resolution and saving
//!
//! # Usage Example
//!
//! ```ignore
//! use docmark::services::{mailbox, ConversionTask};
//!
//! let (tx, mut rx) = mailbox();
//! let handle = ConversionTask::start(&runtime, tx, AppEvent::conversion, engine, request, None);
//!
//! // Later, from the interactive context
//! handle.cancel();
//! ```

pub mod conversion;
pub mod engine;
pub mod files;
pub mod initialization;
pub mod task;

pub use conversion::{
    ConversionError, ConversionErrorKind, ConversionTask, ConvertedDocument, join_blocks,
};
pub use engine::{
    ConversionEngine, EngineError, EngineHandle, EngineLoader, ExternalConverter,
    ExternalConverterLoader,
};
pub use files::PreflightError;
pub use initialization::{InitError, InitializationTask};
pub use task::{
    CancellationFlag, Mailbox, MailboxReceiver, TaskContext, TaskEvent, TaskHandle, TaskId,
    TaskOutcome, TaskPanicked, mailbox,
};
