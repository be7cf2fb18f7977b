// UI module - GUI shell around the AppController
//
// This module contains:
// - EventLoopBridge: Drains the controller mailbox on the Slint event loop
// - GuiController: Creates the window and turns UI callbacks into AppEvents
// - DropGesture: Keeps the first file of a multi-file drop
// - SlintPresenter / SystemClipboard: Presenter and Clipboard adapters

pub mod bridge;
pub mod controller;
pub mod drop;
pub mod presenter;

pub use bridge::{EventLoopBridge, EventLoopBridgeHandle};
pub use controller::GuiController;
pub use drop::DropGesture;
pub use presenter::{NotificationQueue, SlintPresenter, SystemClipboard};
