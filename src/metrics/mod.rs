//! Prometheus metrics for reviewpipe
//!
//! In-process counters for file processing, retries, circuit breaking and
//! progress rendering. Nothing is persisted; `gather_metrics` renders the
//! current values in the Prometheus text format.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // File processing metrics
    // ============================================================================

    /// Files that reached a terminal status, labelled by status
    pub static ref FILES_PROCESSED: CounterVec = CounterVec::new(
        Opts::new(
            "reviewpipe_files_processed_total",
            "Files that reached a terminal status"
        ),
        &["status"]
    ).expect("Failed to create FILES_PROCESSED counter");

    /// Wall-clock time spent on one file, retries included
    pub static ref FILE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "reviewpipe_file_duration_seconds",
            "Time spent processing one file including retries"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0])
    ).expect("Failed to create FILE_DURATION histogram");

    // ============================================================================
    // Resilience metrics
    // ============================================================================

    /// Retries scheduled after a retryable failure
    pub static ref RETRY_ATTEMPTS: Counter = Counter::with_opts(
        Opts::new(
            "reviewpipe_retry_attempts_total",
            "Retries scheduled after a retryable failure"
        )
    ).expect("Failed to create RETRY_ATTEMPTS counter");

    /// Times a circuit breaker opened
    pub static ref CIRCUIT_TRIPS: Counter = Counter::with_opts(
        Opts::new(
            "reviewpipe_circuit_trips_total",
            "Times a circuit breaker opened"
        )
    ).expect("Failed to create CIRCUIT_TRIPS counter");

    // ============================================================================
    // Rendering and chunking metrics
    // ============================================================================

    /// Renderer failures absorbed by the render guard
    pub static ref RENDER_ERRORS: Counter = Counter::with_opts(
        Opts::new(
            "reviewpipe_render_errors_total",
            "Renderer failures absorbed by the render guard"
        )
    ).expect("Failed to create RENDER_ERRORS counter");

    /// Switches from the primary renderer to the fallback
    pub static ref RENDER_FALLBACKS: Counter = Counter::with_opts(
        Opts::new(
            "reviewpipe_render_fallbacks_total",
            "Switches from the primary renderer to the fallback"
        )
    ).expect("Failed to create RENDER_FALLBACKS counter");

    /// Diff chunks analysed, labelled by outcome
    pub static ref CHUNKS_PROCESSED: CounterVec = CounterVec::new(
        Opts::new(
            "reviewpipe_chunks_processed_total",
            "Diff chunks analysed"
        ),
        &["outcome"]
    ).expect("Failed to create CHUNKS_PROCESSED counter");
}

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Safe to call more than once; only the first call registers.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(FILES_PROCESSED.clone()),
            Box::new(FILE_DURATION.clone()),
            Box::new(RETRY_ATTEMPTS.clone()),
            Box::new(CIRCUIT_TRIPS.clone()),
            Box::new(RENDER_ERRORS.clone()),
            Box::new(RENDER_FALLBACKS.clone()),
            Box::new(CHUNKS_PROCESSED.clone()),
        ];

        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::warn!("Failed to register metric: {}", e);
            }
        }
    });
}

/// Gather all metrics and encode them in Prometheus text format
///
/// Returns an empty string if encoding fails.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Metrics contained invalid UTF-8: {}", e);
        String::new()
    })
}
