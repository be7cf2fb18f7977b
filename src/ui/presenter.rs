// Slint-side adapters for the controller: presenter, notification queue, clipboard

use crate::metrics::Metrics;
use crate::models::AppState;
use crate::state::{Clipboard, ClipboardError, Notification, NotificationLevel, Presenter};
use crate::ui::controller::MainWindow;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

/// Notifications waiting for the overlay dialog.
///
/// One is shown at a time; the rest wait until the user dismisses it.
#[derive(Debug, Default)]
pub struct NotificationQueue {
    showing: Option<Notification>,
    pending: VecDeque<Notification>,
}

impl NotificationQueue {
    /// Queue a notification
    ///
    /// # Returns
    /// The notification to display now, if the dialog was free
    pub fn push(&mut self, notification: Notification) -> Option<&Notification> {
        if self.showing.is_some() {
            self.pending.push_back(notification);
            None
        } else {
            self.showing = Some(notification);
            self.showing.as_ref()
        }
    }

    /// Dismiss the current notification
    ///
    /// # Returns
    /// The next notification to display, or `None` to hide the dialog
    pub fn dismiss(&mut self) -> Option<&Notification> {
        self.showing = self.pending.pop_front();
        self.showing.as_ref()
    }

    pub fn len(&self) -> usize {
        self.pending.len() + usize::from(self.showing.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Writes controller state into the Slint window properties
pub struct SlintPresenter {
    ui_weak: slint::Weak<MainWindow>,
    notifications: Rc<RefCell<NotificationQueue>>,
    metrics: Arc<Metrics>,
}

impl SlintPresenter {
    pub fn new(
        ui_weak: slint::Weak<MainWindow>,
        notifications: Rc<RefCell<NotificationQueue>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            ui_weak,
            notifications,
            metrics,
        }
    }
}

impl Presenter for SlintPresenter {
    fn render(&self, state: &AppState) {
        let Some(ui) = self.ui_weak.upgrade() else {
            tracing::debug!("Render skipped, window is gone");
            return;
        };

        ui.set_status_message(state.status_message.as_str().into());
        ui.set_status_tone(state.status_tone.code());
        ui.set_markdown_output(state.markdown_output.as_str().into());
        ui.set_interaction_enabled(state.interaction_enabled());
        ui.set_cancel_enabled(state.cancel_enabled());
        ui.set_copy_enabled(state.output_actions_enabled());
        ui.set_save_enabled(state.output_actions_enabled());
        ui.set_is_busy(state.shows_progress());

        self.metrics.record_ui_update();
    }

    fn notify(&self, notification: &Notification) {
        tracing::info!("Notification: {}", notification);

        let Some(ui) = self.ui_weak.upgrade() else {
            return;
        };
        let mut queue = self.notifications.borrow_mut();
        if let Some(current) = queue.push(notification.clone()) {
            show_notification(&ui, current);
        }
    }
}

/// Show the next queued notification, or hide the dialog
pub fn dismiss_notification(ui: &MainWindow, notifications: &RefCell<NotificationQueue>) {
    let mut queue = notifications.borrow_mut();
    match queue.dismiss() {
        Some(next) => show_notification(ui, next),
        None => ui.set_show_error_dialog(false),
    }
}

fn show_notification(ui: &MainWindow, notification: &Notification) {
    ui.set_error_title(notification.title.as_str().into());
    ui.set_error_message(notification.message.as_str().into());
    ui.set_error_is_error(notification.level == NotificationLevel::Error);
    ui.set_show_error_dialog(true);
}

/// System clipboard via arboard.
///
/// The arboard handle is created on first use and kept alive: on X11 the
/// copied text is served only while it exists.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        if self.inner.is_none() {
            let clipboard =
                arboard::Clipboard::new().map_err(|e| ClipboardError(e.to_string()))?;
            self.inner = Some(clipboard);
        }

        let Some(clipboard) = self.inner.as_mut() else {
            return Err(ClipboardError("clipboard not initialized".to_string()));
        };
        clipboard
            .set_text(text)
            .map_err(|e| ClipboardError(e.to_string()))
    }
}
