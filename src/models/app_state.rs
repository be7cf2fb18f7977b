use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::time::Instant;

/// Status shown while nothing is loaded and the engine is ready.
pub const READY_STATUS: &str = "Ready. Select a file or drag it here.";

/// Status shown while the conversion engine is being resolved.
pub const INITIALIZING_STATUS: &str = "Loading conversion engine...";

/// Status shown when a conversion ends cancelled
pub const CANCELLED_STATUS: &str = "Cancelled";

/// Application lifecycle.
///
/// There is exactly one value of this type per process, stored in [`AppState`]
/// and owned by [`crate::state::AppController`]. Nothing outside the controller
/// can assign it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ApplicationState {
    /// Window not shown yet, engine not requested.
    #[default]
    Uninitialized,
    /// The initialization task is resolving the engine.
    Initializing,
    /// Engine available, no conversion in flight.
    Ready,
    /// Exactly one conversion request is in flight.
    Busy,
    /// The engine could not be resolved. Permanent until restart.
    InitializationFailed,
}

impl ApplicationState {
    /// Whether open/drop intents can be accepted in this state
    pub fn accepts_requests(self) -> bool {
        self == ApplicationState::Ready
    }

    /// Whether a progress indicator should be visible
    pub fn shows_progress(self) -> bool {
        matches!(
            self,
            ApplicationState::Initializing | ApplicationState::Busy
        )
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplicationState::Uninitialized => "uninitialized",
            ApplicationState::Initializing => "initializing",
            ApplicationState::Ready => "ready",
            ApplicationState::Busy => "busy",
            ApplicationState::InitializationFailed => "initialization-failed",
        };
        f.write_str(name)
    }
}

/// Visual tone of the status line
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusTone {
    #[default]
    Info,
    Processing,
    Success,
    Error,
}

impl StatusTone {
    /// Integer code consumed by the Slint status text colour binding
    pub fn code(self) -> i32 {
        match self {
            StatusTone::Info => 0,
            StatusTone::Processing => 1,
            StatusTone::Success => 2,
            StatusTone::Error => 3,
        }
    }
}

/// Error taxonomy shared by pre-flight checks, tasks and the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FileNotFound,
    PermissionDenied,
    MissingDependency,
    OsFailure,
    EmptyResult,
    Cancelled,
    Unexpected,
}

impl ErrorKind {
    /// Persistent status line that follows a failure of this kind
    pub fn status_label(self) -> &'static str {
        match self {
            ErrorKind::FileNotFound => "File access error.",
            ErrorKind::PermissionDenied => "File permission error.",
            ErrorKind::MissingDependency => "Conversion failed (Missing Dependency).",
            ErrorKind::OsFailure => "Conversion failed (OS Error).",
            ErrorKind::EmptyResult => "Conversion failed: Empty result.",
            ErrorKind::Cancelled => CANCELLED_STATUS,
            ErrorKind::Unexpected => "Conversion failed (Unexpected Error).",
        }
    }

    /// Title of the notification raised for this kind
    pub fn title(self) -> &'static str {
        match self {
            ErrorKind::FileNotFound => "File Not Found",
            ErrorKind::PermissionDenied => "Permission Denied",
            ErrorKind::MissingDependency => "Missing Dependency",
            ErrorKind::OsFailure => "Operating System Error",
            ErrorKind::EmptyResult => "Empty Result",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Unexpected => "Conversion Error",
        }
    }
}

/// An accepted request to convert one file.
#[derive(Clone, Debug)]
pub struct ConversionRequest {
    pub path: Utf8PathBuf,
    pub submitted_at: Instant,
}

impl ConversionRequest {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self {
            path,
            submitted_at: Instant::now(),
        }
    }

    /// File name used in status lines and notifications
    pub fn display_name(&self) -> &str {
        display_name(&self.path)
    }
}

/// Base name of a path, falling back to the full path when it has none
pub fn display_name(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or(path.as_str())
}

/// UI-observable application state.
///
/// Mirrors what the presentation surface shows. Only
/// [`AppController`](crate::state::AppController) mutates it; presenters receive
/// a shared reference in [`Presenter::render`](crate::state::Presenter::render).
#[derive(Clone, Debug, PartialEq)]
pub struct AppState {
    // Lifecycle
    pub phase: ApplicationState,
    pub cancelling: bool,

    // Status line
    pub status_message: String,
    pub status_tone: StatusTone,
    /// Status restored when a temporary status expires
    pub persistent_status: String,
    pub persistent_tone: StatusTone,

    // Output
    pub markdown_output: String,
    pub source_path: Option<Utf8PathBuf>,

    // Request being converted
    pub current_file: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            phase: ApplicationState::Uninitialized,
            cancelling: false,

            status_message: READY_STATUS.to_string(),
            status_tone: StatusTone::Info,
            persistent_status: READY_STATUS.to_string(),
            persistent_tone: StatusTone::Info,

            markdown_output: String::new(),
            source_path: None,

            current_file: None,
        }
    }
}

impl AppState {
    /// Open button and drop zone
    pub fn interaction_enabled(&self) -> bool {
        self.phase.accepts_requests()
    }

    pub fn cancel_enabled(&self) -> bool {
        self.phase == ApplicationState::Busy && !self.cancelling
    }

    pub fn has_output(&self) -> bool {
        !self.markdown_output.trim().is_empty()
    }

    /// Copy and save buttons
    pub fn output_actions_enabled(&self) -> bool {
        self.phase == ApplicationState::Ready && self.has_output()
    }

    pub fn shows_progress(&self) -> bool {
        self.phase.shows_progress()
    }

    /// Default file name offered by the save dialog
    pub fn suggested_file_name(&self) -> String {
        crate::services::files::default_save_name(self.source_path.as_deref())
    }

    /// Replace the status line and remember it as the persistent one
    pub fn set_status(&mut self, message: impl Into<String>, tone: StatusTone) {
        let message = message.into();
        self.persistent_status = message.clone();
        self.persistent_tone = tone;
        self.status_message = message;
        self.status_tone = tone;
    }

    /// Replace only the visible status line; a later revert restores the persistent one
    pub fn set_temporary_status(&mut self, message: impl Into<String>, tone: StatusTone) {
        self.status_message = message.into();
        self.status_tone = tone;
    }

    /// Restore the persistent status line
    pub fn restore_status(&mut self) {
        self.status_message = self.persistent_status.clone();
        self.status_tone = self.persistent_tone;
    }

    pub fn clear_output(&mut self) {
        self.markdown_output.clear();
    }
}
