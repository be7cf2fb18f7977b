//! Integration tests for the AppController lifecycle
//!
//! These tests drive the controller the way the GUI does: events go in through
//! `handle_event`, task signals come back through the mailbox, and a recording
//! presenter captures what the user would see.

use camino::Utf8Path;
use docmark::models::{ApplicationState, CANCELLED_STATUS, READY_STATUS, StatusTone};
use docmark::services::{
    ConversionEngine, EngineError, EngineHandle, EngineLoader, MailboxReceiver, TaskEvent,
    TaskOutcome, mailbox,
};
use docmark::state::{
    CANCELLING_STATUS, Clipboard, ClipboardError, INIT_FAILED_STATUS, Notification, Presenter,
};
use docmark::ui::DropGesture;
use docmark::{AppController, AppEvent, AppSettings, AppState, StateChange};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

/// Everything the presenter was asked to show
#[derive(Default)]
struct Screen {
    renders: Vec<AppState>,
    notifications: Vec<Notification>,
}

#[derive(Clone, Default)]
struct RecordingPresenter {
    screen: Rc<RefCell<Screen>>,
}

impl Presenter for RecordingPresenter {
    fn render(&self, state: &AppState) {
        self.screen.borrow_mut().renders.push(state.clone());
    }

    fn notify(&self, notification: &Notification) {
        self.screen.borrow_mut().notifications.push(notification.clone());
    }
}

#[derive(Clone, Default)]
struct RecordingClipboard {
    copied: Rc<RefCell<Vec<String>>>,
}

impl Clipboard for RecordingClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.copied.borrow_mut().push(text.to_string());
        Ok(())
    }
}

struct ScriptedEngine {
    blocks: Result<Vec<String>, EngineError>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl ConversionEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn convert(&self, _path: &Utf8Path) -> Result<Vec<String>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.blocks.clone()
    }
}

struct ScriptedLoader {
    load_error: Option<EngineError>,
    blocks: Result<Vec<String>, EngineError>,
    delay: Duration,
    loads: Arc<AtomicUsize>,
    conversions: Arc<AtomicUsize>,
}

impl ScriptedLoader {
    fn producing(blocks: &[&str]) -> Self {
        Self {
            load_error: None,
            blocks: Ok(blocks.iter().map(|b| b.to_string()).collect()),
            delay: Duration::ZERO,
            loads: Arc::new(AtomicUsize::new(0)),
            conversions: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl EngineLoader for ScriptedLoader {
    fn load(&self) -> Result<EngineHandle, EngineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.load_error {
            return Err(error.clone());
        }
        Ok(EngineHandle::new(ScriptedEngine {
            blocks: self.blocks.clone(),
            delay: self.delay,
            calls: Arc::clone(&self.conversions),
        }))
    }
}

struct App {
    runtime: tokio::runtime::Runtime,
    rx: MailboxReceiver<AppEvent>,
    controller: AppController,
    screen: Rc<RefCell<Screen>>,
    copied: Rc<RefCell<Vec<String>>>,
    dir: TempDir,
}

impl App {
    fn new(loader: ScriptedLoader) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let (tx, rx) = mailbox();
        let presenter = RecordingPresenter::default();
        let clipboard = RecordingClipboard::default();
        let screen = Rc::clone(&presenter.screen);
        let copied = Rc::clone(&clipboard.copied);

        let settings = AppSettings {
            status_reset_delay: 20,
            ..AppSettings::default()
        };
        let controller = AppController::new(
            runtime.handle().clone(),
            tx,
            Arc::new(loader),
            Box::new(presenter),
            Box::new(clipboard),
            settings,
        );

        Self {
            runtime,
            rx,
            controller,
            screen,
            copied,
            dir: TempDir::new().unwrap(),
        }
    }

    fn send(&mut self, event: AppEvent) -> Vec<StateChange> {
        self.controller.handle_event(event)
    }

    fn next_event(&mut self) -> AppEvent {
        let rx = &mut self.rx;
        self.runtime
            .block_on(async { timeout(Duration::from_secs(5), rx.recv()).await })
            .expect("Timeout waiting for controller event")
            .expect("Mailbox closed")
    }

    fn pump_until(&mut self, done: impl Fn(&AppController) -> bool) {
        while !done(&self.controller) {
            let event = self.next_event();
            self.controller.handle_event(event);
        }
    }

    fn ready(loader: ScriptedLoader) -> Self {
        let mut app = Self::new(loader);
        app.send(AppEvent::WindowShown);
        app.pump_until(|c| c.phase() == ApplicationState::Ready);
        app
    }

    fn document(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"document body").unwrap();
        path
    }

    fn notification_titles(&self) -> Vec<String> {
        self.screen
            .borrow()
            .notifications
            .iter()
            .map(|n| n.title.clone())
            .collect()
    }
}

#[test]
fn test_successful_conversion_end_to_end() {
    let mut app = App::ready(ScriptedLoader::producing(&["# Report", "", "Body text"]));
    assert_eq!(app.controller.state().status_message, READY_STATUS);

    let path = app.document("report.pdf");
    app.send(AppEvent::OpenFile(path));

    {
        let state = app.controller.state();
        assert_eq!(state.phase, ApplicationState::Busy);
        assert_eq!(state.status_message, "Converting 'report.pdf'...");
        assert!(state.cancel_enabled());
        assert!(!state.interaction_enabled());
    }

    app.pump_until(|c| c.phase() == ApplicationState::Ready);

    let state = app.controller.state();
    assert_eq!(state.markdown_output, "# Report\n\nBody text");
    assert_eq!(state.status_message, "Successfully converted 'report.pdf'");
    assert_eq!(state.status_tone, StatusTone::Success);
    assert!(state.output_actions_enabled());
    assert_eq!(state.suggested_file_name(), "report.md");
    assert!(app.notification_titles().is_empty());

    let metrics = app.controller.metrics();
    assert_eq!(metrics.conversions_started.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.conversions_succeeded.load(Ordering::Relaxed), 1);
}

#[test]
fn test_every_render_reflects_the_latest_state() {
    let mut app = App::ready(ScriptedLoader::producing(&["text"]));
    let path = app.document("notes.docx");
    app.send(AppEvent::FileDropped(path));
    app.pump_until(|c| c.phase() == ApplicationState::Ready);

    let screen = app.screen.borrow();
    let phases: Vec<ApplicationState> = screen.renders.iter().map(|s| s.phase).collect();
    assert_eq!(phases.first(), Some(&ApplicationState::Initializing));
    assert!(phases.contains(&ApplicationState::Busy));
    assert_eq!(screen.renders.last().map(|s| s.phase), Some(ApplicationState::Ready));
    assert_eq!(
        screen.renders.last().map(|s| s.markdown_output.as_str()),
        Some("text")
    );
}

#[test]
fn test_missing_file_never_reaches_the_engine() {
    let loader = ScriptedLoader::producing(&["unused"]);
    let conversions = Arc::clone(&loader.conversions);
    let mut app = App::ready(loader);

    let missing = app.dir.path().join("missing.pdf");
    app.send(AppEvent::OpenFile(missing));

    assert_eq!(app.controller.phase(), ApplicationState::Ready);
    assert_eq!(app.controller.state().status_message, "File access error.");
    assert_eq!(app.controller.state().status_tone, StatusTone::Error);
    assert_eq!(app.notification_titles(), vec!["File Not Found"]);
    assert!(
        app.screen.borrow().notifications[0]
            .message
            .contains("missing.pdf")
    );
    assert_eq!(conversions.load(Ordering::SeqCst), 0);
}

#[test]
fn test_cancel_discards_the_result() {
    let loader = ScriptedLoader::producing(&["late output"]).slow(Duration::from_millis(200));
    let mut app = App::ready(loader);

    let path = app.document("big.pdf");
    app.send(AppEvent::OpenFile(path));
    let changes = app.send(AppEvent::CancelRequested);

    assert!(changes.contains(&StateChange::CancellingChanged { cancelling: true }));
    assert_eq!(app.controller.state().status_message, CANCELLING_STATUS);
    assert!(!app.controller.state().cancel_enabled());

    // A second cancel is a no-op
    assert!(app.send(AppEvent::CancelRequested).is_empty());

    app.pump_until(|c| c.phase() == ApplicationState::Ready);

    let state = app.controller.state();
    assert_eq!(state.status_message, CANCELLED_STATUS);
    assert!(state.markdown_output.is_empty());
    assert!(!state.cancelling);
    assert!(app.notification_titles().is_empty());
}

#[test]
fn test_second_request_while_busy_is_rejected() {
    let loader = ScriptedLoader::producing(&["first"]).slow(Duration::from_millis(100));
    let conversions = Arc::clone(&loader.conversions);
    let mut app = App::ready(loader);

    let first = app.document("first.pdf");
    let second = app.document("second.pdf");
    app.send(AppEvent::OpenFile(first));
    let active = app.controller.active_task_id();

    app.send(AppEvent::FileDropped(second));
    assert_eq!(app.controller.active_task_id(), active);
    assert_eq!(app.notification_titles(), vec!["Please Wait"]);

    app.pump_until(|c| c.phase() == ApplicationState::Ready);
    assert_eq!(
        app.controller.state().status_message,
        "Successfully converted 'first.pdf'"
    );
    assert_eq!(conversions.load(Ordering::SeqCst), 1);
}

#[test]
fn test_multi_file_drop_converts_only_the_first() {
    let loader = ScriptedLoader::producing(&["first"]).slow(Duration::from_millis(50));
    let conversions = Arc::clone(&loader.conversions);
    let mut app = App::ready(loader);

    let files = [
        app.document("a.pdf"),
        app.document("b.docx"),
        app.document("c.html"),
    ];

    // One gesture: the shell offers every dropped file, then closes it
    let mut gesture = DropGesture::new();
    gesture.begin();
    for path in files {
        if let Some(path) = gesture.offer(path) {
            app.send(AppEvent::FileDropped(path));
        }
    }
    assert_eq!(gesture.end(), 2);

    app.pump_until(|c| c.phase() == ApplicationState::Ready);

    assert!(app.notification_titles().is_empty());
    assert_eq!(
        app.controller.state().status_message,
        "Successfully converted 'a.pdf'"
    );
    assert_eq!(conversions.load(Ordering::SeqCst), 1);
    assert_eq!(
        app.controller
            .metrics()
            .requests_rejected
            .load(Ordering::Relaxed),
        0
    );
}

#[test]
fn test_empty_result_is_reported() {
    let mut app = App::ready(ScriptedLoader::producing(&["", "  "]));
    let path = app.document("blank.pdf");

    app.send(AppEvent::OpenFile(path));
    app.pump_until(|c| c.phase() == ApplicationState::Ready);

    assert_eq!(
        app.controller.state().status_message,
        "Conversion failed: Empty result."
    );
    assert!(!app.controller.state().has_output());
    assert_eq!(app.notification_titles(), vec!["Empty Result"]);
}

#[test]
fn test_engine_failure_keeps_the_app_usable() {
    let mut loader = ScriptedLoader::producing(&[]);
    loader.blocks = Err(EngineError::Os("WinError 1314".to_string()));
    let mut app = App::ready(loader);

    let path = app.document("report.pdf");
    app.send(AppEvent::OpenFile(path));
    app.pump_until(|c| c.phase() == ApplicationState::Ready);

    assert_eq!(app.controller.state().status_message, "Conversion failed (OS Error).");
    assert_eq!(app.notification_titles(), vec!["Operating System Error"]);
    assert!(app.controller.state().interaction_enabled());
}

#[test]
fn test_initialization_failure_blocks_requests() {
    let mut loader = ScriptedLoader::producing(&[]);
    loader.load_error = Some(EngineError::MissingDependency(
        "no document converter found on PATH".to_string(),
    ));
    let mut app = App::new(loader);

    app.send(AppEvent::WindowShown);
    app.pump_until(|c| c.phase() == ApplicationState::InitializationFailed);
    assert_eq!(app.controller.state().status_message, INIT_FAILED_STATUS);
    assert!(!app.controller.has_engine());

    let path = app.document("report.pdf");
    app.send(AppEvent::OpenFile(path));
    assert_eq!(app.controller.phase(), ApplicationState::InitializationFailed);
    assert_eq!(
        app.notification_titles(),
        vec!["Initialization Error", "Not Initialized"]
    );
}

#[test]
fn test_window_shown_twice_loads_once() {
    let loader = ScriptedLoader::producing(&["x"]);
    let loads = Arc::clone(&loader.loads);
    let mut app = App::new(loader);

    app.send(AppEvent::WindowShown);
    app.send(AppEvent::WindowShown);
    app.pump_until(|c| c.phase() == ApplicationState::Ready);
    app.send(AppEvent::WindowShown);

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(app.controller.phase(), ApplicationState::Ready);
}

#[test]
fn test_signal_from_a_finished_task_is_ignored() {
    let mut app = App::ready(ScriptedLoader::producing(&["one"]).slow(Duration::from_millis(50)));

    let path = app.document("a.pdf");
    app.send(AppEvent::OpenFile(path));
    let first_id = app.controller.active_task_id().unwrap();
    app.pump_until(|c| c.phase() == ApplicationState::Ready);

    let path = app.document("b.pdf");
    app.send(AppEvent::OpenFile(path));
    let second_id = app.controller.active_task_id().unwrap();
    assert_ne!(first_id, second_id);

    // Signals tagged with the old id change nothing, even a terminal one
    let before = app.controller.state().clone();
    let progress = app.send(AppEvent::Conversion {
        id: first_id,
        event: TaskEvent::Progress("stale".to_string()),
    });
    let finished = app.send(AppEvent::Conversion {
        id: first_id,
        event: TaskEvent::Finished(TaskOutcome::Cancelled),
    });
    assert!(progress.is_empty());
    assert!(finished.is_empty());
    assert_eq!(app.controller.state(), &before);
    assert_eq!(app.controller.active_task_id(), Some(second_id));

    app.pump_until(|c| c.phase() == ApplicationState::Ready);
    assert_eq!(
        app.controller.state().status_message,
        "Successfully converted 'b.pdf'"
    );
    assert_eq!(
        app.controller
            .metrics()
            .stale_signals_ignored
            .load(Ordering::Relaxed),
        2
    );
}

#[test]
fn test_copy_and_save_after_conversion() {
    let mut app = App::ready(ScriptedLoader::producing(&["# Title", "text"]));
    let path = app.document("paper.pdf");
    app.send(AppEvent::OpenFile(path));
    app.pump_until(|c| c.phase() == ApplicationState::Ready);

    app.send(AppEvent::CopyRequested);
    assert_eq!(app.copied.borrow().as_slice(), ["# Title\n\ntext"]);
    assert_eq!(
        app.controller.state().status_message,
        "Markdown copied to clipboard!"
    );

    let target = app.dir.path().join("paper");
    app.send(AppEvent::SaveRequested(target));
    let saved = app.dir.path().join("paper.md");
    assert_eq!(std::fs::read_to_string(saved).unwrap(), "# Title\n\ntext");
    assert_eq!(app.controller.state().status_message, "Saved to 'paper.md'");

    // The temporary statuses fall back to the conversion result
    app.pump_until(|c| c.state().status_message == "Successfully converted 'paper.pdf'");
}

#[test]
fn test_window_closed_cancels_running_conversion() {
    let loader = ScriptedLoader::producing(&["never shown"]).slow(Duration::from_millis(100));
    let mut app = App::ready(loader);
    let path = app.document("report.pdf");
    app.send(AppEvent::OpenFile(path));

    app.send(AppEvent::WindowClosed);
    assert!(app.controller.is_shutting_down());

    let remaining = app.next_event();
    assert!(app.send(remaining).is_empty());
    assert!(app.controller.state().markdown_output.is_empty());
}
