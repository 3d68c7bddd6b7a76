//! Camera abstraction for frame capture.
//!
//! This module provides a trait-based abstraction over camera hardware.
//! A [`CameraDriver`] opens devices by identifier and hands back a
//! [`CameraHandle`] exposing the narrow set of operations the capture loop
//! needs. Real hardware goes through the V4L2 backend (feature `v4l2`);
//! `stub://` devices are served by [`SyntheticCamera`].

use super::PixelFormat;
use crate::convert;
use std::io;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Device identifier prefix routed to the synthetic backend.
pub const SYNTHETIC_PREFIX: &str = "stub://";

/// Errors that can occur during camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("could not open camera device {device}: {reason}")]
    DeviceOpenFailed { device: String, reason: String },
    #[error("pixel format {requested} not supported (driver offered {offered})")]
    FormatUnsupported {
        requested: PixelFormat,
        offered: String,
    },
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    #[error("timed out waiting for frame")]
    Timeout,
    #[error("camera i/o failure: {0}")]
    Io(#[from] io::Error),
    #[error("camera not streaming")]
    NotStreaming,
}

/// Format the driver actually applied. It may differ from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedFormat {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

/// Opens capture devices.
pub trait CameraDriver: Send + Sync {
    /// Opens the device named by `device`.
    fn open(&self, device: &str) -> Result<Box<dyn CameraHandle>, CameraError>;
}

/// Operations on one open capture device.
///
/// Dropping the handle closes the device. A handle is owned by exactly one
/// capture loop, so implementations need `Send` but not `Sync`.
pub trait CameraHandle: Send {
    /// Requests a pixel format and size; returns what the driver applied.
    fn negotiate_format(
        &mut self,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<NegotiatedFormat, CameraError>;

    /// Sets the number of driver buffers.
    fn set_buffer_depth(&mut self, depth: u32) -> Result<(), CameraError>;

    /// Starts the device's capture process.
    fn start_capture(&mut self) -> Result<(), CameraError>;

    /// Stops the device's capture process.
    fn stop_capture(&mut self) -> Result<(), CameraError>;

    /// Blocks until a frame is ready or `timeout` elapses.
    fn wait_for_frame(&mut self, timeout: Duration) -> Result<(), CameraError>;

    /// Reads the frame signalled by the last successful wait.
    fn read_frame(&mut self) -> Result<Vec<u8>, CameraError>;
}

/// Driver used by the binary: synthetic for `stub://`, V4L2 otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDriver;

impl CameraDriver for SystemDriver {
    fn open(&self, device: &str) -> Result<Box<dyn CameraHandle>, CameraError> {
        if let Some(label) = device.strip_prefix(SYNTHETIC_PREFIX) {
            return Ok(Box::new(SyntheticCamera::new(label)));
        }
        open_hardware(device)
    }
}

#[cfg(feature = "v4l2")]
fn open_hardware(device: &str) -> Result<Box<dyn CameraHandle>, CameraError> {
    Ok(Box::new(super::v4l2::V4l2Camera::open(device)?))
}

#[cfg(not(feature = "v4l2"))]
fn open_hardware(device: &str) -> Result<Box<dyn CameraHandle>, CameraError> {
    Err(CameraError::DeviceOpenFailed {
        device: device.to_string(),
        reason: "built without v4l2 support".to_string(),
    })
}

/// Largest frame the synthetic backend will agree to.
const SYNTHETIC_MAX: (u32, u32) = (1920, 1080);

/// Camera that renders a moving test pattern.
///
/// Behaves like a driver that snaps sizes: widths are rounded down to an
/// even number and both dimensions are capped at 1920x1080.
#[derive(Debug)]
pub struct SyntheticCamera {
    label: String,
    format: Option<NegotiatedFormat>,
    frame_period: Duration,
    streaming: bool,
    next_frame_at: Option<Instant>,
    sequence: u64,
}

impl SyntheticCamera {
    /// Default rate: 30 frames per second.
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_frame_rate(label, 30)
    }

    /// Synthetic camera producing `fps` frames per second (at least 1).
    pub fn with_frame_rate(label: impl Into<String>, fps: u32) -> Self {
        Self {
            label: label.into(),
            format: None,
            frame_period: Duration::from_secs(1) / fps.max(1),
            streaming: false,
            next_frame_at: None,
            sequence: 0,
        }
    }

    /// Number of frames read so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    fn render_yuyv(&self, width: u32, height: u32) -> Vec<u8> {
        // Diagonal luma ramp that slides one column per frame; chroma
        // depends on the label so different stubs look different.
        let tint = self
            .label
            .bytes()
            .fold(0u8, |acc, b| acc.wrapping_mul(31).wrapping_add(b));
        let shift = self.sequence as u32;
        let mut raw = Vec::with_capacity(width as usize * height as usize * 2);
        for y in 0..height {
            for x in (0..width).step_by(2) {
                let y0 = ((x + y + shift) % 220 + 16) as u8;
                let y1 = ((x + 1 + y + shift) % 220 + 16) as u8;
                raw.extend_from_slice(&[y0, tint, y1, 255 - tint]);
            }
        }
        raw
    }
}

impl CameraHandle for SyntheticCamera {
    fn negotiate_format(
        &mut self,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<NegotiatedFormat, CameraError> {
        if width < 2 || height == 0 {
            return Err(CameraError::ConfigFailed(format!(
                "unsupported size {width}x{height}"
            )));
        }
        let negotiated = NegotiatedFormat {
            format,
            width: (width.min(SYNTHETIC_MAX.0)) & !1,
            height: height.min(SYNTHETIC_MAX.1),
        };
        self.format = Some(negotiated);
        Ok(negotiated)
    }

    fn set_buffer_depth(&mut self, depth: u32) -> Result<(), CameraError> {
        if depth == 0 {
            return Err(CameraError::ConfigFailed("buffer depth must be at least 1".into()));
        }
        Ok(())
    }

    fn start_capture(&mut self) -> Result<(), CameraError> {
        if self.format.is_none() {
            return Err(CameraError::ConfigFailed("format not negotiated".into()));
        }
        self.streaming = true;
        self.next_frame_at = Some(Instant::now());
        tracing::debug!(label = %self.label, "synthetic camera started");
        Ok(())
    }

    fn stop_capture(&mut self) -> Result<(), CameraError> {
        self.streaming = false;
        self.next_frame_at = None;
        Ok(())
    }

    fn wait_for_frame(&mut self, timeout: Duration) -> Result<(), CameraError> {
        let due = match (self.streaming, self.next_frame_at) {
            (true, Some(due)) => due,
            _ => return Err(CameraError::NotStreaming),
        };

        let now = Instant::now();
        let wait = due.saturating_duration_since(now);
        if wait > timeout {
            thread::sleep(timeout);
            return Err(CameraError::Timeout);
        }
        thread::sleep(wait);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Vec<u8>, CameraError> {
        let negotiated = match (self.streaming, self.format) {
            (true, Some(format)) => format,
            _ => return Err(CameraError::NotStreaming),
        };

        let raw = self.render_yuyv(negotiated.width, negotiated.height);
        self.sequence += 1;
        self.next_frame_at = Some(Instant::now() + self.frame_period);

        match negotiated.format {
            PixelFormat::Yuyv => Ok(raw),
            PixelFormat::Mjpeg => {
                convert::convert(raw, negotiated.width, negotiated.height, PixelFormat::Yuyv)
                    .map(|jpeg| jpeg.to_vec())
                    .map_err(|e| CameraError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(format: PixelFormat) -> SyntheticCamera {
        let mut camera = SyntheticCamera::with_frame_rate("test", 200);
        camera.negotiate_format(format, 33, 8).unwrap();
        camera.set_buffer_depth(1).unwrap();
        camera.start_capture().unwrap();
        camera
    }

    #[test]
    fn test_synthetic_lifecycle() {
        let mut camera = started(PixelFormat::Yuyv);

        camera.wait_for_frame(Duration::from_secs(1)).unwrap();
        let frame = camera.read_frame().unwrap();
        // 33 snapped to 32
        assert_eq!(frame.len(), 32 * 8 * 2);
        assert_eq!(camera.sequence(), 1);

        camera.stop_capture().unwrap();
        assert!(matches!(
            camera.wait_for_frame(Duration::from_millis(10)),
            Err(CameraError::NotStreaming)
        ));
    }

    #[test]
    fn test_synthetic_mjpeg_emits_jpeg() {
        let mut camera = started(PixelFormat::Mjpeg);
        camera.wait_for_frame(Duration::from_secs(1)).unwrap();
        let frame = camera.read_frame().unwrap();
        assert_eq!(&frame[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_synthetic_times_out_before_next_frame() {
        let mut camera = SyntheticCamera::with_frame_rate("slow", 1);
        camera.negotiate_format(PixelFormat::Yuyv, 4, 4).unwrap();
        camera.start_capture().unwrap();

        camera.wait_for_frame(Duration::from_millis(5)).unwrap();
        camera.read_frame().unwrap();
        assert!(matches!(
            camera.wait_for_frame(Duration::from_millis(5)),
            Err(CameraError::Timeout)
        ));
    }

    #[test]
    fn test_start_without_format() {
        let mut camera = SyntheticCamera::new("raw");
        assert!(matches!(
            camera.start_capture(),
            Err(CameraError::ConfigFailed(_))
        ));
    }

    #[test]
    fn test_system_driver_routes_stub_devices() {
        let handle = SystemDriver.open("stub://front");
        assert!(handle.is_ok());
    }
}
