//! Metrics for the analytics batching pipeline
//!
//! The pipeline reports batch sizes, flush outcomes and retry counts through
//! the `metrics` facade; operators scrape them from the Prometheus exporter
//! installed by the worker binary.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), telemetry::TelemetryError> {
//! telemetry::install_prometheus("0.0.0.0:9464".parse().unwrap())?;
//! telemetry::record_flush("persisted", 100, Duration::from_millis(42));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod metrics;

pub use crate::metrics::*;
pub use error::*;

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the global recorder with an HTTP scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Fails if a recorder is already installed or the listener cannot bind.
pub fn install_prometheus(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| TelemetryError::ExporterError(e.to_string()))?;

    tracing::info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn flush_metrics_are_rendered() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            record_flush("persisted", 100, Duration::from_millis(5));
            record_flush("empty", 0, Duration::from_millis(1));
            record_sink_retry();
            record_events_dropped(7);
        });

        let rendered = handle.render();
        assert!(rendered.contains(FLUSH_OUTCOMES));
        assert!(rendered.contains("status=\"persisted\""));
        assert!(rendered.contains(SINK_RETRIES));
        assert!(rendered.contains(EVENTS_DROPPED));
    }

    #[test]
    fn recording_without_recorder_is_a_noop() {
        record_event_tracked(3);
        record_track_failure("buffer");
        record_flush_trigger("threshold");
        record_task_completed("analytics.flush", true);
    }
}
