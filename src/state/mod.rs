// State management module
//
// This module provides the AppController, the single owner of AppState, plus the
// event, change and adapter types it exchanges with the rest of the application.

mod controller;

pub use controller::AppController;

use crate::models::{AppState, ApplicationState, StatusTone};
use crate::services::{ConversionError, ConvertedDocument, EngineHandle, InitError, TaskEvent, TaskId};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Status shown after a cancellation request, until the task reports back
pub const CANCELLING_STATUS: &str = "Cancelling...";

/// Status shown while the application is permanently degraded
pub const INIT_FAILED_STATUS: &str = "Initialization failed.";

/// Everything the controller reacts to.
///
/// User intents are posted by the GUI shell, task signals by background tasks.
/// All of them travel through the same mailbox and are handled one at a time.
#[derive(Debug)]
pub enum AppEvent {
    /// The main window became visible
    WindowShown,

    /// A file was chosen in the open dialog
    OpenFile(PathBuf),

    /// A file was dropped on the window
    FileDropped(PathBuf),

    CancelRequested,
    CopyRequested,

    /// Save the output to the path chosen in the save dialog
    SaveRequested(PathBuf),

    WindowClosed,

    /// Signal from the initialization task
    Initialization {
        id: TaskId,
        event: TaskEvent<EngineHandle, InitError>,
    },

    /// Signal from a conversion task
    Conversion {
        id: TaskId,
        event: TaskEvent<ConvertedDocument, ConversionError>,
    },

    /// A temporary status line reached the end of its display time
    StatusExpired { generation: u64 },
}

impl AppEvent {
    /// Tag an initialization task event
    pub fn initialization(id: TaskId, event: TaskEvent<EngineHandle, InitError>) -> Self {
        AppEvent::Initialization { id, event }
    }

    /// Tag a conversion task event
    pub fn conversion(id: TaskId, event: TaskEvent<ConvertedDocument, ConversionError>) -> Self {
        AppEvent::Conversion { id, event }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            AppEvent::WindowShown => "window-shown",
            AppEvent::OpenFile(_) => "open-file",
            AppEvent::FileDropped(_) => "file-dropped",
            AppEvent::CancelRequested => "cancel-requested",
            AppEvent::CopyRequested => "copy-requested",
            AppEvent::SaveRequested(_) => "save-requested",
            AppEvent::WindowClosed => "window-closed",
            AppEvent::Initialization { .. } => "initialization-signal",
            AppEvent::Conversion { .. } => "conversion-signal",
            AppEvent::StatusExpired { .. } => "status-expired",
        }
    }
}

/// Change events computed after each handled event
///
/// The presenter re-renders only when at least one change was detected.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// Lifecycle phase moved
    PhaseChanged {
        from: ApplicationState,
        to: ApplicationState,
    },

    /// A cancellation request started or ended
    CancellingChanged { cancelling: bool },

    /// The visible status line changed
    StatusChanged { message: String, tone: StatusTone },

    /// The Markdown output was replaced or cleared
    OutputChanged { has_output: bool },
}

/// Detect what changed between two states and generate events
pub fn detect_changes(old: &AppState, new: &AppState) -> Vec<StateChange> {
    let mut changes = Vec::new();

    if old.phase != new.phase {
        changes.push(StateChange::PhaseChanged {
            from: old.phase,
            to: new.phase,
        });
    }

    if old.cancelling != new.cancelling {
        changes.push(StateChange::CancellingChanged {
            cancelling: new.cancelling,
        });
    }

    if old.status_message != new.status_message || old.status_tone != new.status_tone {
        changes.push(StateChange::StatusChanged {
            message: new.status_message.clone(),
            tone: new.status_tone,
        });
    }

    if old.markdown_output != new.markdown_output {
        changes.push(StateChange::OutputChanged {
            has_output: new.has_output(),
        });
    }

    changes
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationLevel {
    Warning,
    Error,
}

/// A blocking message for the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// Presentation surface driven by the controller.
///
/// Called only from the interactive context.
#[cfg_attr(test, mockall::automock)]
pub trait Presenter {
    /// Bring the surface in line with `state`
    fn render(&self, state: &AppState);

    /// Show a blocking notification
    fn notify(&self, notification: &Notification);
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Clipboard unavailable: {0}")]
pub struct ClipboardError(pub String);

/// System clipboard adapter
#[cfg_attr(test, mockall::automock)]
pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}
