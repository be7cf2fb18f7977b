// Conversion metrics module
//
// Lightweight counters describing what the controller did during a session

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Session metrics
///
/// Uses atomic operations so background code could record without locks,
/// although today only the interactive context writes. Logged on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Conversion tasks started
    pub conversions_started: AtomicUsize,

    /// Conversions that produced Markdown
    pub conversions_succeeded: AtomicUsize,

    /// Conversions that ended with an error
    pub conversions_failed: AtomicUsize,

    /// Conversions that ended cancelled
    pub conversions_cancelled: AtomicUsize,

    /// Open/drop requests refused because the controller was not Ready
    pub requests_rejected: AtomicUsize,

    /// Task signals ignored because their task was no longer tracked
    pub stale_signals_ignored: AtomicU64,

    /// Wall time of successful conversions in milliseconds
    pub total_conversion_time_ms: AtomicU64,

    /// Controller transitions that changed observable state
    pub state_updates: AtomicU64,

    /// Render calls made on the presenter
    pub ui_updates: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            conversions_started: AtomicUsize::new(0),
            conversions_succeeded: AtomicUsize::new(0),
            conversions_failed: AtomicUsize::new(0),
            conversions_cancelled: AtomicUsize::new(0),
            requests_rejected: AtomicUsize::new(0),
            stale_signals_ignored: AtomicU64::new(0),
            total_conversion_time_ms: AtomicU64::new(0),
            state_updates: AtomicU64::new(0),
            ui_updates: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_conversion_started(&self) {
        self.conversions_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful conversion and its duration
    pub fn record_conversion_succeeded(&self, duration: Duration) {
        self.conversions_succeeded.fetch_add(1, Ordering::Relaxed);
        self.total_conversion_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_conversion_failed(&self) {
        self.conversions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conversion_cancelled(&self) {
        self.conversions_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_signal(&self) {
        self.stale_signals_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_state_update(&self) {
        self.state_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ui_update(&self) {
        self.ui_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average duration of successful conversions in milliseconds
    pub fn avg_conversion_time_ms(&self) -> f64 {
        let total = self.total_conversion_time_ms.load(Ordering::Relaxed);
        let count = self.conversions_succeeded.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Session Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Conversions: {} started, {} succeeded, {} failed, {} cancelled",
            self.conversions_started.load(Ordering::Relaxed),
            self.conversions_succeeded.load(Ordering::Relaxed),
            self.conversions_failed.load(Ordering::Relaxed),
            self.conversions_cancelled.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Total conversion time: {:.2}s (avg: {:.2}ms per document)",
            self.total_conversion_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_conversion_time_ms()
        );
        tracing::info!(
            "Requests rejected: {}, stale signals ignored: {}",
            self.requests_rejected.load(Ordering::Relaxed),
            self.stale_signals_ignored.load(Ordering::Relaxed)
        );
        tracing::info!(
            "State updates: {}, UI updates: {}",
            self.state_updates.load(Ordering::Relaxed),
            self.ui_updates.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
