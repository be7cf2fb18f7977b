// EventLoopBridge - Coordinates between tokio async runtime and Slint event loop
//
// Two execution contexts meet here:
// 1. Slint's single-threaded GUI event loop, which owns the AppController
// 2. Tokio's multi-threaded runtime, where background tasks run
//
// Every message for the controller, whether a task signal or a UI intent, goes
// through one mailbox. The bridge drains that mailbox on the Slint thread with
// `slint::spawn_local`, so the controller is only ever touched from one thread
// and handles one message at a time.

use crate::services::{Mailbox, MailboxReceiver};
use crate::state::{AppController, AppEvent};
use slint::{ComponentHandle, Weak};
use std::cell::RefCell;
use std::rc::Rc;

/// Coordinates between tokio async runtime and Slint event loop
///
/// # Example
/// ```ignore
/// let (tx, rx) = services::mailbox();
/// let ui = MainWindow::new()?;
/// let bridge = EventLoopBridge::new(&ui, tx);
///
/// bridge.start_pump(rx, controller)?;
///
/// // From a Slint callback
/// let handle = bridge.clone_handle();
/// ui.on_cancel_conversion(move || handle.post(AppEvent::CancelRequested));
/// ```
pub struct EventLoopBridge<T: ComponentHandle> {
    /// Weak reference to the UI component to prevent circular references
    ui_weak: Weak<T>,

    /// Sending half of the controller mailbox
    mailbox: Mailbox<AppEvent>,
}

impl<T: ComponentHandle + 'static> EventLoopBridge<T> {
    /// Create a new EventLoopBridge
    ///
    /// # Arguments
    /// * `ui` - Strong reference to the Slint UI component
    /// * `mailbox` - Sender feeding the controller
    pub fn new(ui: &T, mailbox: Mailbox<AppEvent>) -> Self {
        Self {
            ui_weak: ui.as_weak(),
            mailbox,
        }
    }

    /// Start draining `receiver` into `controller` on the Slint event loop.
    ///
    /// Must be called from the thread that runs the Slint event loop. The pump
    /// ends when every sender is dropped or the controller shuts down.
    pub fn start_pump(
        &self,
        mut receiver: MailboxReceiver<AppEvent>,
        controller: Rc<RefCell<AppController>>,
    ) -> Result<slint::JoinHandle<()>, slint::EventLoopError> {
        slint::spawn_local(async move {
            tracing::debug!("EventLoopBridge pump started");

            while let Some(event) = receiver.recv().await {
                let mut controller = controller.borrow_mut();
                controller.handle_event(event);
                if controller.is_shutting_down() {
                    break;
                }
            }

            tracing::debug!("EventLoopBridge pump terminated");
        })
    }

    /// Post an event for the controller
    pub fn post(&self, event: AppEvent) {
        post_event(&self.mailbox, event);
    }

    /// Clone the bridge for use in multiple callbacks
    ///
    /// # Returns
    /// An EventLoopBridgeHandle that implements Clone
    pub fn clone_handle(&self) -> EventLoopBridgeHandle<T> {
        EventLoopBridgeHandle {
            ui_weak: self.ui_weak.clone(),
            mailbox: self.mailbox.clone(),
        }
    }
}

/// Lightweight handle that can be cloned and passed to callbacks
pub struct EventLoopBridgeHandle<T: ComponentHandle> {
    ui_weak: Weak<T>,
    mailbox: Mailbox<AppEvent>,
}

// Manual Clone implementation to avoid requiring T: Clone
impl<T: ComponentHandle> Clone for EventLoopBridgeHandle<T> {
    fn clone(&self) -> Self {
        Self {
            ui_weak: self.ui_weak.clone(),
            mailbox: self.mailbox.clone(),
        }
    }
}

impl<T: ComponentHandle + 'static> EventLoopBridgeHandle<T> {
    /// Post an event for the controller
    pub fn post(&self, event: AppEvent) {
        post_event(&self.mailbox, event);
    }

    /// Get a weak reference to the UI component
    pub fn ui_weak(&self) -> &Weak<T> {
        &self.ui_weak
    }
}

fn post_event(mailbox: &Mailbox<AppEvent>, event: AppEvent) {
    let name = event.name();
    if mailbox.send(event).is_err() {
        tracing::warn!("Dropped {} - controller mailbox is closed", name);
    }
}
