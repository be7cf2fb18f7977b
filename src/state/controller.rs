use super::{
    AppEvent, CANCELLING_STATUS, Clipboard, INIT_FAILED_STATUS, Notification, Presenter,
    StateChange, detect_changes,
};
use crate::metrics::Metrics;
use crate::models::{
    AppSettings, AppState, ApplicationState, ConversionRequest, ErrorKind, INITIALIZING_STATUS,
    READY_STATUS, StatusTone, display_name,
};
use crate::services::files;
use crate::services::{
    ConversionError, ConversionTask, ConvertedDocument, EngineHandle, EngineLoader, InitError,
    InitializationTask, Mailbox, TaskEvent, TaskHandle, TaskId, TaskOutcome,
};
use camino::Utf8PathBuf;
use std::cell::OnceCell;
use std::path::PathBuf;
use std::sync::Arc;

struct ActiveConversion {
    handle: TaskHandle,
    request: ConversionRequest,
}

/// The single authority over [`ApplicationState`] and task sequencing.
///
/// Lives on the interactive context. Every input, whether a user intent or a
/// task signal, arrives as an [`AppEvent`] through
/// [`handle_event`](Self::handle_event); there is no other mutation surface.
///
/// # Invariants
///
/// - At most one initialization task per controller, guarded by a run-once latch
/// - At most one conversion task at a time; requests outside `Ready` are refused
/// - Signals from a task that is no longer tracked are ignored
/// - After `WindowClosed`, every event is ignored
///
/// # Related Types
///
/// - [`crate::models::AppState`]: the state it owns
/// - [`Presenter`]: receives the state after each change
/// - [`crate::ui::bridge::EventLoopBridge`]: feeds it events on the slint thread
pub struct AppController {
    state: AppState,
    presenter: Box<dyn Presenter>,
    clipboard: Box<dyn Clipboard>,
    loader: Arc<dyn EngineLoader>,
    runtime: tokio::runtime::Handle,
    mailbox: Mailbox<AppEvent>,
    settings: AppSettings,

    init_latch: OnceCell<TaskId>,
    init_task: Option<TaskHandle>,
    engine: Option<EngineHandle>,
    active: Option<ActiveConversion>,

    /// Bumped on every status write; only the newest temporary status reverts
    status_generation: u64,
    shutting_down: bool,
    metrics: Arc<Metrics>,
}

impl AppController {
    /// Create a controller in the `Uninitialized` state.
    ///
    /// # Arguments
    /// * `runtime` - Runtime background tasks are spawned on
    /// * `mailbox` - Sender half of the channel this controller is fed from
    /// * `loader` - How the conversion engine is resolved
    /// * `presenter` - Presentation surface
    /// * `clipboard` - Clipboard adapter
    /// * `settings` - Timeouts and delays
    pub fn new(
        runtime: tokio::runtime::Handle,
        mailbox: Mailbox<AppEvent>,
        loader: Arc<dyn EngineLoader>,
        presenter: Box<dyn Presenter>,
        clipboard: Box<dyn Clipboard>,
        settings: AppSettings,
    ) -> Self {
        Self {
            state: AppState::default(),
            presenter,
            clipboard,
            loader,
            runtime,
            mailbox,
            settings,
            init_latch: OnceCell::new(),
            init_task: None,
            engine: None,
            active: None,
            status_generation: 0,
            shutting_down: false,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Share an existing metrics instance
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn phase(&self) -> ApplicationState {
        self.state.phase
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Identity of the conversion task currently in flight
    pub fn active_task_id(&self) -> Option<TaskId> {
        self.active.as_ref().map(|active| active.handle.id())
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Apply one event and re-render if anything observable changed.
    ///
    /// # Returns
    /// The changes the event caused, empty when it was ignored
    pub fn handle_event(&mut self, event: AppEvent) -> Vec<StateChange> {
        if self.shutting_down {
            tracing::debug!("Ignoring {} after shutdown", event.name());
            return Vec::new();
        }

        let old_state = self.state.clone();

        match event {
            AppEvent::WindowShown => self.on_window_shown(),
            AppEvent::OpenFile(path) | AppEvent::FileDropped(path) => self.on_file_requested(path),
            AppEvent::CancelRequested => self.on_cancel_requested(),
            AppEvent::CopyRequested => self.on_copy_requested(),
            AppEvent::SaveRequested(path) => self.on_save_requested(path),
            AppEvent::WindowClosed => {
                self.shutdown();
                return Vec::new();
            }
            AppEvent::Initialization { id, event } => self.on_initialization_event(id, event),
            AppEvent::Conversion { id, event } => self.on_conversion_event(id, event),
            AppEvent::StatusExpired { generation } => self.on_status_expired(generation),
        }

        let changes = detect_changes(&old_state, &self.state);
        if !changes.is_empty() {
            tracing::debug!("State changes: {:?}", changes);
            self.metrics.record_state_update();
            self.presenter.render(&self.state);
        }
        changes
    }

    /// Request cancellation of outstanding tasks and stop reacting to events.
    ///
    /// Does not wait for the tasks to confirm.
    pub fn shutdown(&mut self) {
        if self.shutting_down {
            return;
        }
        self.shutting_down = true;
        tracing::info!("Window closed, abandoning outstanding tasks");

        if let Some(active) = &self.active {
            active.handle.cancel();
        }
        if let Some(init) = &self.init_task {
            init.cancel();
        }
    }

    fn on_window_shown(&mut self) {
        let mut spawned = false;
        let id = *self.init_latch.get_or_init(|| {
            spawned = true;
            let handle = InitializationTask::start(
                &self.runtime,
                self.mailbox.clone(),
                AppEvent::initialization,
                Arc::clone(&self.loader),
            );
            let id = handle.id();
            self.init_task = Some(handle);
            id
        });

        if !spawned {
            tracing::debug!("Initialization already started as {}", id);
            return;
        }

        tracing::info!("Started engine initialization ({})", id);
        self.state.phase = ApplicationState::Initializing;
        self.set_status(INITIALIZING_STATUS, StatusTone::Processing);
    }

    fn on_initialization_event(&mut self, id: TaskId, event: TaskEvent<EngineHandle, InitError>) {
        let tracked = self.init_task.as_ref().map(TaskHandle::id);
        if tracked != Some(id) || self.state.phase != ApplicationState::Initializing {
            self.ignore_stale(id);
            return;
        }

        match event {
            TaskEvent::Progress(message) => self.set_status(message, StatusTone::Processing),
            TaskEvent::Finished(outcome) => {
                self.init_task = None;
                match outcome {
                    TaskOutcome::Succeeded(engine) => {
                        tracing::info!("Conversion engine '{}' is ready", engine.name());
                        self.engine = Some(engine);
                        self.state.phase = ApplicationState::Ready;
                        self.set_status(READY_STATUS, StatusTone::Info);
                    }
                    TaskOutcome::Failed(error) => self.fail_initialization(error),
                    TaskOutcome::Cancelled => self.fail_initialization(InitError::Unexpected(
                        "initialization was cancelled".to_string(),
                    )),
                }
            }
        }
    }

    fn fail_initialization(&mut self, error: InitError) {
        match &error {
            InitError::MissingDependency(detail) => {
                tracing::warn!("Initialization failed, missing dependency: {}", detail)
            }
            InitError::Unexpected(detail) => {
                tracing::error!("Initialization failed unexpectedly: {}", detail)
            }
        }

        self.state.phase = ApplicationState::InitializationFailed;
        self.set_status(INIT_FAILED_STATUS, StatusTone::Error);
        self.presenter.notify(&Notification::error(
            "Initialization Error",
            error.user_message(),
        ));
    }

    fn on_file_requested(&mut self, path: PathBuf) {
        match self.state.phase {
            ApplicationState::Ready => self.start_conversion(path),
            ApplicationState::Busy => {
                let current = self.state.current_file.clone().unwrap_or_default();
                self.reject_request(Notification::warning(
                    "Please Wait",
                    format!(
                        "Already converting '{}'. Wait for it to finish or cancel it first.",
                        current
                    ),
                ));
            }
            ApplicationState::Uninitialized | ApplicationState::Initializing => {
                self.reject_request(Notification::warning(
                    "Please Wait",
                    "The conversion engine is still loading. Try again in a moment.",
                ));
            }
            ApplicationState::InitializationFailed => {
                self.reject_request(Notification::error(
                    "Not Initialized",
                    "The conversion engine failed to initialize. Fix the problem and restart the application.",
                ));
            }
        }
    }

    fn reject_request(&mut self, notification: Notification) {
        tracing::info!("Request rejected in state {}: {}", self.state.phase, notification.title);
        self.metrics.record_request_rejected();
        self.presenter.notify(&notification);
    }

    fn start_conversion(&mut self, path: PathBuf) {
        let path = match files::resolve_dropped_path(path).and_then(|path| {
            files::preflight(&path)?;
            Ok(path)
        }) {
            Ok(path) => path,
            Err(error) => {
                tracing::warn!("Pre-flight check failed: {}", error);
                self.set_status(error.kind().status_label(), StatusTone::Error);
                self.presenter
                    .notify(&Notification::error(error.title(), error.user_message()));
                return;
            }
        };

        let Some(engine) = self.engine.clone() else {
            tracing::error!("Ready without a conversion engine, refusing {}", path);
            return;
        };

        let request = ConversionRequest::new(path);
        let name = request.display_name().to_string();
        let handle = ConversionTask::start(
            &self.runtime,
            self.mailbox.clone(),
            AppEvent::conversion,
            engine,
            request.clone(),
            self.settings.conversion_timeout(),
        );

        tracing::info!("Converting {} ({})", request.path, handle.id());
        self.metrics.record_conversion_started();

        self.state.clear_output();
        self.state.source_path = None;
        self.state.current_file = Some(name.clone());
        self.state.cancelling = false;
        self.state.phase = ApplicationState::Busy;
        self.set_status(format!("Converting '{}'...", name), StatusTone::Processing);

        self.active = Some(ActiveConversion { handle, request });
    }

    fn on_cancel_requested(&mut self) {
        match &self.active {
            Some(active) if self.state.phase == ApplicationState::Busy && !self.state.cancelling => {
                active.handle.cancel();
                self.state.cancelling = true;
                self.set_status(CANCELLING_STATUS, StatusTone::Processing);
            }
            _ => tracing::debug!("Cancel requested with nothing to cancel"),
        }
    }

    fn on_conversion_event(
        &mut self,
        id: TaskId,
        event: TaskEvent<ConvertedDocument, ConversionError>,
    ) {
        if self.active_task_id() != Some(id) {
            self.ignore_stale(id);
            return;
        }

        match event {
            TaskEvent::Progress(message) => {
                if !self.state.cancelling {
                    self.set_status(message, StatusTone::Processing);
                }
            }
            TaskEvent::Finished(outcome) => {
                if let Some(active) = self.active.take() {
                    self.finish_conversion(active, outcome);
                }
            }
        }
    }

    fn finish_conversion(
        &mut self,
        active: ActiveConversion,
        outcome: TaskOutcome<ConvertedDocument, ConversionError>,
    ) {
        let request = active.request;
        let name = request.display_name().to_string();
        let elapsed = request.submitted_at.elapsed();

        self.state.phase = ApplicationState::Ready;
        self.state.cancelling = false;
        self.state.current_file = None;

        match outcome {
            TaskOutcome::Succeeded(document) => {
                tracing::info!(
                    "Converted {} in {:.2}s ({} blocks, {} bytes)",
                    request.path,
                    elapsed.as_secs_f64(),
                    document.block_count,
                    document.markdown.len()
                );
                self.metrics.record_conversion_succeeded(elapsed);
                self.state.markdown_output = document.markdown;
                self.state.source_path = Some(request.path);
                self.set_status(
                    format!("Successfully converted '{}'", name),
                    StatusTone::Success,
                );
            }
            TaskOutcome::Failed(error) => {
                if error.kind() == ErrorKind::Unexpected {
                    tracing::error!(
                        "Conversion of {} failed unexpectedly: {}",
                        request.path,
                        error.message()
                    );
                } else {
                    tracing::warn!("Conversion of {} failed: {}", request.path, error);
                }
                self.metrics.record_conversion_failed();
                self.state.clear_output();
                self.set_status(error.kind().status_label(), StatusTone::Error);
                self.presenter.notify(&Notification::error(
                    error.kind().title(),
                    error.user_message(&name),
                ));
            }
            TaskOutcome::Cancelled => {
                tracing::info!("Conversion of {} cancelled", request.path);
                self.metrics.record_conversion_cancelled();
                self.state.clear_output();
                self.set_status(ErrorKind::Cancelled.status_label(), StatusTone::Info);
            }
        }
    }

    fn on_copy_requested(&mut self) {
        if self.state.phase != ApplicationState::Ready {
            tracing::debug!("Copy ignored in state {}", self.state.phase);
            return;
        }
        if !self.state.has_output() {
            self.set_temporary_status("Nothing to copy.", StatusTone::Info);
            return;
        }

        match self.clipboard.set_text(&self.state.markdown_output) {
            Ok(()) => {
                tracing::info!("Copied {} bytes to clipboard", self.state.markdown_output.len());
                self.set_temporary_status("Markdown copied to clipboard!", StatusTone::Success);
            }
            Err(error) => {
                tracing::warn!("Clipboard copy failed: {}", error);
                self.presenter.notify(&Notification::error(
                    "Clipboard Error",
                    format!("Could not copy to clipboard: {}", error),
                ));
                self.set_temporary_status("Clipboard copy failed.", StatusTone::Error);
            }
        }
    }

    fn on_save_requested(&mut self, path: PathBuf) {
        if !self.state.output_actions_enabled() {
            self.set_temporary_status("Nothing to save.", StatusTone::Info);
            return;
        }

        let path = match Utf8PathBuf::try_from(path) {
            Ok(path) => path,
            Err(error) => {
                let raw = error.into_path_buf();
                tracing::warn!("Save path is not valid UTF-8: {}", raw.display());
                self.presenter.notify(&Notification::error(
                    "Save Error",
                    format!("The file name is not valid UTF-8:\n\n{}", raw.display()),
                ));
                return;
            }
        };

        match files::save_markdown(path.clone(), &self.state.markdown_output) {
            Ok(saved) => {
                self.set_temporary_status(
                    format!("Saved to '{}'", display_name(&saved)),
                    StatusTone::Success,
                );
            }
            Err(error) => {
                tracing::error!("Failed to save {}: {}", path, error);
                self.presenter.notify(&Notification::error(
                    "Save Error",
                    format!("Could not save the file:\n\n{}\n\n{}", path, error),
                ));
                self.set_temporary_status("Save failed.", StatusTone::Error);
            }
        }
    }

    fn on_status_expired(&mut self, generation: u64) {
        if generation == self.status_generation {
            self.state.restore_status();
        } else {
            tracing::debug!(
                "Status revert {} superseded by {}",
                generation,
                self.status_generation
            );
        }
    }

    fn ignore_stale(&self, id: TaskId) {
        tracing::debug!("Ignoring stale signal from {}", id);
        self.metrics.record_stale_signal();
    }

    /// Persistent status; cancels any pending revert
    fn set_status(&mut self, message: impl Into<String>, tone: StatusTone) {
        self.status_generation += 1;
        self.state.set_status(message, tone);
    }

    /// Temporary status, reverted after the configured delay
    fn set_temporary_status(&mut self, message: impl Into<String>, tone: StatusTone) {
        self.status_generation += 1;
        self.state.set_temporary_status(message, tone);

        let generation = self.status_generation;
        let delay = self.settings.status_reset_delay();
        let mailbox = self.mailbox.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = mailbox.send(AppEvent::StatusExpired { generation });
        });
    }
}
