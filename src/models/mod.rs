//! Data models for the DocuMark application.
//!
//! - [`AppState`]: UI-observable state owned by the [`AppController`](crate::state::AppController)
//! - [`ApplicationState`]: the lifecycle (uninitialized, initializing, ready, busy, failed)
//! - [`ConversionRequest`]: one accepted conversion request
//! - [`ErrorKind`]: error taxonomy shared by pre-flight checks and background tasks
//! - [`UserConfig`]: settings loaded from `DocuMark Settings.yaml`

pub mod app_state;
pub mod config;

pub use app_state::{
    AppState, ApplicationState, CANCELLED_STATUS, ConversionRequest, ErrorKind, INITIALIZING_STATUS,
    READY_STATUS, StatusTone, display_name,
};
pub use config::{AppSettings, ConverterSettings, INPUT_PLACEHOLDER, UserConfig};
