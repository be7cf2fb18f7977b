//! DocuMark - document to Markdown converter
//!
//! Main entry point for the GUI application.
//!
//! # Overview
//!
//! This binary crate provides the Slint GUI frontend for DocuMark. It initializes:
//! - Configuration loading ([`ConfigManager`])
//! - Logging infrastructure (file rotation + optional console output)
//! - Tokio async runtime (workers for engine loading and conversions)
//! - GUI controller ([`GuiController`] - owns the window and the [`AppController`](docmark::AppController))
//!
//! The application uses a hybrid threading model:
//! - **Main thread**: Runs the Slint event loop and the controller
//! - **Tokio workers**: Load the engine and run conversions, reporting back
//!   through the controller mailbox
//!
//! # Execution Flow
//!
//! 1. Load `DocuMark Data/DocuMark Settings.yaml` (defaults if missing)
//! 2. Initialize logging → logs/docmark.<date>
//! 3. Create tokio runtime with 2 worker threads
//! 4. Create GuiController and run the Slint event loop (blocks until window closed)
//! 5. Log session metrics and shut the runtime down

use anyhow::Result;
use docmark::logging::{LogOptions, setup_logging};
use docmark::services::ExternalConverterLoader;
use docmark::ui::GuiController;
use docmark::{APP_NAME, ConfigManager, Metrics, UserConfig, VERSION};
use std::sync::Arc;
use std::time::Duration;

const WORKER_THREADS: usize = 2;

fn main() -> Result<()> {
    let config_manager = ConfigManager::new("DocuMark Data")?;

    // Logging is not up yet, so a broken settings file is reported on stderr
    let user_config = config_manager.load_user_config().unwrap_or_else(|e| {
        eprintln!("Ignoring unreadable settings ({e:#}), using defaults");
        UserConfig::default()
    });
    let settings = user_config.settings;

    let _log_guard = setup_logging(&LogOptions::new("logs", "docmark").with_settings(&settings))?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(WORKER_THREADS)
        .thread_name("docmark-worker")
        .build()?;

    tracing::info!("Tokio runtime initialized with {} worker threads", WORKER_THREADS);

    let loader = Arc::new(ExternalConverterLoader::new(settings.converter.clone()));
    let metrics = Arc::new(Metrics::new());

    let gui_controller =
        GuiController::new(&settings, loader, runtime.handle().clone(), Arc::clone(&metrics))?;

    tracing::info!("GUI controller initialized, launching window");

    // Blocks until the window is closed; running tasks are cancelled on the way out
    let result = gui_controller.run();

    tracing::info!("GUI closed, shutting down");
    metrics.log_summary();

    // Blocking converter calls cannot be interrupted, so do not wait on them long
    runtime.shutdown_timeout(Duration::from_millis(500));

    tracing::info!("Application shutdown complete");

    result.map_err(|e| {
        tracing::error!("GUI error: {:#}", e);
        e
    })
}
