// GUI Controller - Bridges Slint UI with the AppController
//
// This module contains the GuiController which coordinates between:
// - Slint UI (MainWindow)
// - AppController (application state and task sequencing)
// - EventLoopBridge (mailbox pump on the Slint thread)
//
// It handles:
// - Turning Slint callbacks into AppEvents
// - Native open/save dialogs
// - File drops delivered by winit
// - The notification overlay

use crate::metrics::Metrics;
use crate::models::AppSettings;
use crate::services::files::{SAVE_EXTENSIONS, SUPPORTED_EXTENSIONS};
use crate::services::{EngineLoader, mailbox};
use crate::state::{AppController, AppEvent};
use crate::ui::bridge::EventLoopBridge;
use crate::ui::drop::DropGesture;
use crate::ui::presenter::{NotificationQueue, SlintPresenter, SystemClipboard, dismiss_notification};
use anyhow::{Context, Result};
use slint::winit_030::winit::event::WindowEvent;
use slint::winit_030::{WinitWindowAccessor, WinitWindowEventResult};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

// Include the generated Slint code
slint::include_modules!();

/// GUI Controller that wires up the Slint UI with the AppController
///
/// This is the main coordinator for the GUI layer. It:
/// - Creates the mailbox and the EventLoopBridge that drains it
/// - Owns the AppController on the Slint thread
/// - Sets up Slint callbacks that post events
/// - Handles file dialogs using the `rfd` crate
///
/// # Example
/// ```ignore
/// let runtime = tokio::runtime::Runtime::new()?;
/// let loader = Arc::new(ExternalConverterLoader::new(settings.converter.clone()));
///
/// let controller = GuiController::new(
///     &settings,
///     loader,
///     runtime.handle().clone(),
///     Arc::new(Metrics::new()),
/// )?;
/// controller.run()?;  // Blocks until window is closed
/// ```
pub struct GuiController {
    /// The Slint UI window
    ui: MainWindow,

    /// Event loop bridge for coordinating between tokio and Slint
    bridge: EventLoopBridge<MainWindow>,

    /// Lifecycle controller, only touched on the Slint thread
    controller: Rc<RefCell<AppController>>,

    _pump: slint::JoinHandle<()>,
}

impl GuiController {
    /// Create a new GUI controller
    ///
    /// # Arguments
    /// * `settings` - Application settings
    /// * `loader` - How the conversion engine is resolved
    /// * `tokio_handle` - Handle to the tokio runtime for background tasks
    /// * `metrics` - Session metrics shared with the caller
    ///
    /// # Returns
    /// A new GuiController ready to run
    pub fn new(
        settings: &AppSettings,
        loader: Arc<dyn EngineLoader>,
        tokio_handle: tokio::runtime::Handle,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        // Create the Slint UI
        let ui = MainWindow::new().context("Failed to create Slint UI")?;

        let (tx, rx) = mailbox();
        let bridge = EventLoopBridge::new(&ui, tx.clone());

        let notifications = Rc::new(RefCell::new(NotificationQueue::default()));
        let presenter = SlintPresenter::new(
            ui.as_weak(),
            Rc::clone(&notifications),
            Arc::clone(&metrics),
        );

        let controller = AppController::new(
            tokio_handle,
            tx,
            loader,
            Box::new(presenter),
            Box::new(SystemClipboard::new()),
            settings.clone(),
        )
        .with_metrics(metrics);
        let controller = Rc::new(RefCell::new(controller));

        Self::setup_callbacks(&ui, &bridge, &controller, &notifications);
        Self::setup_file_drop(&ui, &bridge);

        let pump = bridge
            .start_pump(rx, Rc::clone(&controller))
            .context("Failed to start controller event pump")?;

        tracing::info!("GUI controller initialized");

        Ok(Self {
            ui,
            bridge,
            controller,
            _pump: pump,
        })
    }

    /// Run the GUI (blocks until window is closed)
    ///
    /// Posts `WindowShown` so initialization starts as soon as the event loop
    /// runs, and shuts the controller down once the window is gone.
    pub fn run(self) -> Result<()> {
        tracing::info!("Starting GUI event loop");
        self.bridge.post(AppEvent::WindowShown);

        let result = self.ui.run().context("Slint event loop failed");

        self.controller
            .borrow_mut()
            .handle_event(AppEvent::WindowClosed);
        tracing::info!("GUI event loop finished");
        result
    }

    /// Set up all Slint callbacks
    fn setup_callbacks(
        ui: &MainWindow,
        bridge: &EventLoopBridge<MainWindow>,
        controller: &Rc<RefCell<AppController>>,
        notifications: &Rc<RefCell<NotificationQueue>>,
    ) {
        let handle = bridge.clone_handle();

        // Open file callback
        ui.on_open_file(move || {
            tracing::debug!("Open file clicked");

            if let Some(path) = Self::show_open_picker() {
                tracing::info!("File selected: {}", path.display());
                handle.post(AppEvent::OpenFile(path));
            }
        });

        let handle = bridge.clone_handle();
        ui.on_cancel_conversion(move || {
            tracing::debug!("Cancel clicked");
            handle.post(AppEvent::CancelRequested);
        });

        let handle = bridge.clone_handle();
        ui.on_copy_markdown(move || {
            tracing::debug!("Copy clicked");
            handle.post(AppEvent::CopyRequested);
        });

        let handle = bridge.clone_handle();
        let controller = Rc::clone(controller);

        // Save callback; the dialog is pre-filled from the current state
        ui.on_save_markdown(move || {
            tracing::debug!("Save clicked");

            let suggested = match controller.try_borrow() {
                Ok(controller) => controller.state().suggested_file_name(),
                Err(_) => {
                    tracing::warn!("Controller busy, save dialog skipped");
                    return;
                }
            };

            if let Some(path) = Self::show_save_picker(&suggested) {
                tracing::info!("Save target selected: {}", path.display());
                handle.post(AppEvent::SaveRequested(path));
            }
        });

        let ui_weak = ui.as_weak();
        let notifications = Rc::clone(notifications);

        // Error dialog dismissed
        ui.on_error_dialog_dismissed(move || {
            tracing::debug!("Notification dismissed");

            if let Some(ui) = ui_weak.upgrade() {
                dismiss_notification(&ui, &notifications);
            }
        });

        tracing::debug!("UI callbacks configured");
    }

    /// Forward winit file drops and drag hover to the controller and UI.
    ///
    /// Only the first file of a multi-file drop is posted.
    fn setup_file_drop(ui: &MainWindow, bridge: &EventLoopBridge<MainWindow>) {
        let handle = bridge.clone_handle();
        let gesture = Rc::new(RefCell::new(DropGesture::new()));

        ui.window().on_winit_window_event(move |_window, event| match event {
            WindowEvent::HoveredFile(_) => {
                // One HoveredFile per file; never reset a gesture mid-drop
                if !gesture.borrow().is_open() {
                    gesture.borrow_mut().begin();
                }
                if let Some(ui) = handle.ui_weak().upgrade() {
                    ui.set_drop_hover(true);
                }
                WinitWindowEventResult::Propagate
            }
            WindowEvent::HoveredFileCancelled => {
                if let Some(ui) = handle.ui_weak().upgrade() {
                    ui.set_drop_hover(false);
                }
                WinitWindowEventResult::Propagate
            }
            WindowEvent::DroppedFile(path) => {
                if let Some(ui) = handle.ui_weak().upgrade() {
                    ui.set_drop_hover(false);
                }
                let accepted = gesture.borrow_mut().offer(path.clone());
                if let Some(path) = accepted {
                    tracing::info!("File dropped: {}", path.display());
                    handle.post(AppEvent::FileDropped(path));

                    // The rest of this drop arrives before the timer fires
                    let gesture = Rc::clone(&gesture);
                    slint::Timer::single_shot(Duration::ZERO, move || {
                        let ignored = gesture.borrow_mut().end();
                        if ignored > 0 {
                            tracing::info!(
                                "Converting the first dropped file, ignored {} more",
                                ignored
                            );
                        }
                    });
                }
                WinitWindowEventResult::PreventDefault
            }
            _ => WinitWindowEventResult::Propagate,
        });
    }

    /// Show a native open dialog filtered to supported documents
    ///
    /// # Returns
    /// The selected file path, or None if cancelled
    fn show_open_picker() -> Option<PathBuf> {
        rfd::FileDialog::new()
            .set_title("Select Document")
            .add_filter("Documents", SUPPORTED_EXTENSIONS)
            .add_filter("All files", &["*"])
            .pick_file()
    }

    /// Show a native save dialog
    ///
    /// # Arguments
    /// * `suggested` - File name the dialog starts with
    fn show_save_picker(suggested: &str) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .set_title("Save Markdown")
            .set_file_name(suggested)
            .add_filter("Markdown", SAVE_EXTENSIONS)
            .save_file()
    }
}
