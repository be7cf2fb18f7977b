use crate::models::AppSettings;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Where and how the application logs.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Directory for the daily rotated log files
    pub dir: Utf8PathBuf,
    /// File name prefix, e.g. "docmark"
    pub prefix: String,
    pub debug_mode: bool,
    /// Mirror log lines to stderr with ANSI colors
    pub console: bool,
}

impl LogOptions {
    pub fn new(dir: impl Into<Utf8PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            debug_mode: false,
            console: true,
        }
    }

    /// Take the debug and console switches from the user settings
    pub fn with_settings(mut self, settings: &AppSettings) -> Self {
        self.debug_mode = settings.debug_mode;
        self.console = settings.console_logging;
        self
    }
}

/// Level used when `RUST_LOG` is not set
fn default_directive(debug_mode: bool) -> &'static str {
    if debug_mode { "debug" } else { "info" }
}

/// `RUST_LOG` wins over the settings file
fn build_filter(debug_mode: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug_mode)))
}

fn ensure_log_dir(dir: &Utf8Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir))?;
    }
    Ok(())
}

/// Install the global subscriber: a daily rotating file, plus stderr when
/// `options.console` is set.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging(options: &LogOptions) -> Result<WorkerGuard> {
    ensure_log_dir(&options.dir)?;

    let file_appender = rolling::daily(&options.dir, &options.prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    // Option<Layer> is itself a layer, so one registry covers both cases
    let console_layer = options.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(build_filter(options.debug_mode))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    tracing::info!(
        dir = %options.dir,
        prefix = %options.prefix,
        debug = options.debug_mode,
        console = options.console,
        "Logging initialized"
    );

    Ok(guard)
}
