//! Metrics collection and registry.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus metrics registry for the capture and streaming pipeline.
pub struct MetricsRegistry {
    registry: Registry,

    // Capture metrics, labelled by camera name
    frames_published: IntCounterVec,
    capture_timeouts: IntCounterVec,
    capture_errors: IntCounterVec,
    conversion_failures: IntCounterVec,

    // Streaming metrics
    active_sessions: IntGauge,
    active_camera: IntGauge,
    switches_total: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new registry with all pipeline metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_published = IntCounterVec::new(
            Opts::new(
                "camjam_frames_published_total",
                "Frames published to the frame bus",
            ),
            &["camera"],
        )?;
        let capture_timeouts = IntCounterVec::new(
            Opts::new(
                "camjam_capture_timeouts_total",
                "Waits that ended without a new frame",
            ),
            &["camera"],
        )?;
        let capture_errors = IntCounterVec::new(
            Opts::new(
                "camjam_capture_errors_total",
                "Device wait or read failures",
            ),
            &["camera"],
        )?;
        let conversion_failures = IntCounterVec::new(
            Opts::new(
                "camjam_conversion_failures_total",
                "Frames dropped because JPEG conversion failed",
            ),
            &["camera"],
        )?;

        let active_sessions = IntGauge::new(
            "camjam_active_sessions",
            "Stream sessions currently connected",
        )?;
        let active_camera = IntGauge::new(
            "camjam_active_camera",
            "Index of the camera being streamed",
        )?;
        let switches_total = IntCounter::new(
            "camjam_switches_total",
            "Successful camera switches",
        )?;

        registry.register(Box::new(frames_published.clone()))?;
        registry.register(Box::new(capture_timeouts.clone()))?;
        registry.register(Box::new(capture_errors.clone()))?;
        registry.register(Box::new(conversion_failures.clone()))?;
        registry.register(Box::new(active_sessions.clone()))?;
        registry.register(Box::new(active_camera.clone()))?;
        registry.register(Box::new(switches_total.clone()))?;

        Ok(Self {
            registry,
            frames_published,
            capture_timeouts,
            capture_errors,
            conversion_failures,
            active_sessions,
            active_camera,
            switches_total,
        })
    }

    /// Counts a frame published by `camera`.
    pub fn frame_published(&self, camera: &str) {
        self.frames_published.with_label_values(&[camera]).inc();
    }

    /// Counts a wait on `camera` that timed out.
    pub fn capture_timeout(&self, camera: &str) {
        self.capture_timeouts.with_label_values(&[camera]).inc();
    }

    /// Counts a device wait or read failure on `camera`.
    pub fn capture_error(&self, camera: &str) {
        self.capture_errors.with_label_values(&[camera]).inc();
    }

    /// Counts a frame from `camera` dropped by the converter.
    pub fn conversion_failure(&self, camera: &str) {
        self.conversion_failures.with_label_values(&[camera]).inc();
    }

    /// Increments the connected-session gauge.
    pub fn session_opened(&self) {
        self.active_sessions.inc();
    }

    /// Decrements the connected-session gauge.
    pub fn session_closed(&self) {
        self.active_sessions.dec();
    }

    /// Records a switch to camera `index`.
    pub fn camera_switched(&self, index: usize) {
        self.active_camera.set(index as i64);
        self.switches_total.inc();
    }

    /// Frames published so far by `camera`.
    pub fn frames_published(&self, camera: &str) -> u64 {
        self.frames_published.with_label_values(&[camera]).get()
    }

    /// Stream sessions currently open.
    pub fn active_sessions(&self) -> i64 {
        self.active_sessions.get()
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("active_sessions", &self.active_sessions.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_capture_counters_are_per_camera() {
        let registry = MetricsRegistry::new().unwrap();

        registry.frame_published("front");
        registry.frame_published("front");
        registry.frame_published("rear");
        registry.capture_timeout("rear");

        assert_eq!(registry.frames_published("front"), 2);
        assert_eq!(registry.frames_published("rear"), 1);

        let output = registry.encode().unwrap();
        assert!(output.contains("camjam_frames_published_total{camera=\"front\"} 2"));
        assert!(output.contains("camjam_capture_timeouts_total{camera=\"rear\"} 1"));
    }

    #[test]
    fn test_session_and_switch_metrics() {
        let registry = MetricsRegistry::new().unwrap();

        registry.session_opened();
        registry.session_opened();
        registry.session_closed();
        registry.camera_switched(1);

        let output = registry.encode().unwrap();
        assert!(output.contains("camjam_active_sessions 1"));
        assert!(output.contains("camjam_active_camera 1"));
        assert!(output.contains("camjam_switches_total 1"));
    }
}
