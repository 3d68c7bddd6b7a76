//! Prometheus metrics for the capture and streaming pipeline.
//!
//! Served in text format at `GET /metrics`.
//!
//! # Metrics Exposed
//!
//! ## Capture (label `camera`)
//! - `camjam_frames_published_total` - Frames published to the frame bus
//! - `camjam_capture_timeouts_total` - Waits that ended without a frame
//! - `camjam_capture_errors_total` - Device wait/read failures
//! - `camjam_conversion_failures_total` - Frames dropped by the converter
//!
//! ## Streaming
//! - `camjam_active_sessions` - Connected stream clients
//! - `camjam_active_camera` - Index of the selected camera
//! - `camjam_switches_total` - Successful camera switches

mod collector;

pub use collector::{MetricsError, MetricsRegistry};
