//! Per-camera capture loop.
//!
//! Each initialized [`Camera`] is driven by one [`CaptureLoop`] on its own
//! OS thread: wait for a frame, read it, convert it to JPEG, publish it to
//! the camera's [`FrameBus`]. Timeouts and device errors are logged and the
//! loop carries on; only an explicit stop ends it.

use super::camera::{CameraDriver, CameraError, CameraHandle, NegotiatedFormat};
use super::config::{CameraDescriptor, ServerConfig};
use super::{Frame, PixelFormat};
use crate::bus::FrameBus;
use crate::convert;
use crate::metrics::MetricsRegistry;
use serde::Serialize;
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Driver buffer count. One buffer keeps the stream close to real time.
pub const BUFFER_DEPTH: u32 = 1;

/// Pause after a device error before trying again.
const ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Read-only description of a running camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraInfo {
    pub id: usize,
    pub name: String,
    pub device: String,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

/// An opened, configured and streaming capture device.
pub struct Camera {
    index: usize,
    name: String,
    device: String,
    format: NegotiatedFormat,
    handle: Box<dyn CameraHandle>,
}

impl Camera {
    /// Opens the described device, negotiates its format, sets the buffer
    /// depth and starts capture.
    pub fn initialize(
        index: usize,
        descriptor: &CameraDescriptor,
        driver: &dyn CameraDriver,
    ) -> Result<Self, CameraError> {
        tracing::info!(
            camera = %descriptor.name,
            device = %descriptor.device,
            "opening camera device"
        );
        let mut handle = driver.open(&descriptor.device)?;

        let format =
            handle.negotiate_format(descriptor.format, descriptor.width, descriptor.height)?;
        if (format.width, format.height) != (descriptor.width, descriptor.height) {
            tracing::info!(
                camera = %descriptor.name,
                requested = %format_args!("{}x{}", descriptor.width, descriptor.height),
                applied = %format_args!("{}x{}", format.width, format.height),
                "driver adjusted frame size"
            );
        }

        handle.set_buffer_depth(BUFFER_DEPTH)?;
        handle.start_capture()?;

        tracing::info!(
            camera = %descriptor.name,
            device = %descriptor.device,
            format = %format.format,
            width = format.width,
            height = format.height,
            "enabled camera"
        );

        Ok(Self {
            index,
            name: descriptor.name.clone(),
            device: descriptor.device.clone(),
            format,
            handle,
        })
    }

    /// Position among the running cameras; also the id used by `/switch`.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Configured camera name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Format and size the driver applied.
    pub fn format(&self) -> NegotiatedFormat {
        self.format
    }

    /// Read-only projection served by `/cameras`.
    pub fn info(&self) -> CameraInfo {
        CameraInfo {
            id: self.index,
            name: self.name.clone(),
            device: self.device.clone(),
            format: self.format.format,
            width: self.format.width,
            height: self.format.height,
        }
    }

    fn stop(&mut self) {
        match self.handle.stop_capture() {
            Ok(()) => tracing::info!(camera = %self.name, device = %self.device, "shutdown camera"),
            Err(e) => tracing::error!(
                camera = %self.name,
                device = %self.device,
                error = %e,
                "could not stop streaming camera"
            ),
        }
    }
}

impl std::fmt::Debug for Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Camera")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("device", &self.device)
            .field("format", &self.format)
            .finish()
    }
}

/// Timing for a capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Upper bound on a single wait for the device.
    pub frame_timeout: Duration,
    /// Minimum time between the starts of two captures; `None` runs free.
    pub min_interval: Option<Duration>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            frame_timeout: Duration::from_secs(5),
            min_interval: None,
        }
    }
}

impl From<&ServerConfig> for CaptureSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            frame_timeout: config.frame_timeout(),
            min_interval: config.min_interval(),
        }
    }
}

/// Result of one capture iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A frame with this sequence number reached the bus.
    Published(u64),
    /// No frame arrived within the timeout.
    TimedOut,
    /// Waiting for or reading the frame failed.
    DeviceError,
    /// The frame was read but could not be converted.
    Dropped,
}

/// Capture state machine for one camera.
pub struct CaptureLoop {
    camera: Camera,
    bus: FrameBus,
    settings: CaptureSettings,
    metrics: Arc<MetricsRegistry>,
    sequence: u64,
}

impl CaptureLoop {
    /// Loop publishing `camera` frames to `bus`. Nothing runs until [`step`](Self::step)
    /// or [`spawn`](Self::spawn).
    pub fn new(
        camera: Camera,
        bus: FrameBus,
        settings: CaptureSettings,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            camera,
            bus,
            settings,
            metrics,
            sequence: 0,
        }
    }

    /// Sequence number of the last published frame.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Runs one wait → read → convert → publish iteration.
    pub fn step(&mut self) -> CaptureOutcome {
        let name = self.camera.name.as_str();

        match self.camera.handle.wait_for_frame(self.settings.frame_timeout) {
            Ok(()) => {}
            Err(CameraError::Timeout) => {
                tracing::warn!(camera = %name, "camera timed out waiting for frame");
                self.metrics.capture_timeout(name);
                return CaptureOutcome::TimedOut;
            }
            Err(e) => {
                tracing::error!(camera = %name, error = %e, "error waiting for camera frame");
                self.metrics.capture_error(name);
                return CaptureOutcome::DeviceError;
            }
        }

        let raw = match self.camera.handle.read_frame() {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(camera = %name, error = %e, "error reading camera frame");
                self.metrics.capture_error(name);
                return CaptureOutcome::DeviceError;
            }
        };

        let format = self.camera.format;
        let data = match convert::convert(raw, format.width, format.height, format.format) {
            Ok(data) if !data.is_empty() => data,
            Ok(_) => {
                tracing::warn!(camera = %name, "dropping empty frame");
                self.metrics.conversion_failure(name);
                return CaptureOutcome::Dropped;
            }
            Err(e) => {
                tracing::error!(camera = %name, error = %e, "error converting camera frame");
                self.metrics.conversion_failure(name);
                return CaptureOutcome::Dropped;
            }
        };

        self.sequence += 1;
        self.bus
            .publish(Frame::new(data, self.camera.index, self.sequence));
        self.metrics.frame_published(name);
        tracing::trace!(camera = %name, sequence = self.sequence, "published frame");

        CaptureOutcome::Published(self.sequence)
    }

    /// Starts the loop on a dedicated thread.
    pub fn spawn(self) -> io::Result<CaptureWorker> {
        let name = self.camera.name.clone();
        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name(format!("capture-{name}"))
            .spawn(move || self.run(stop_rx, done_tx))?;

        Ok(CaptureWorker {
            name,
            stop: stop_tx,
            done: done_rx,
            thread: Some(thread),
        })
    }

    fn run(mut self, stop: mpsc::Receiver<()>, done: mpsc::Sender<()>) {
        tracing::debug!(camera = %self.camera.name, "capture loop started");

        loop {
            if stop_requested(&stop) {
                break;
            }

            let started = Instant::now();
            let pause = match self.step() {
                CaptureOutcome::Published(_) | CaptureOutcome::Dropped => self
                    .settings
                    .min_interval
                    .map(|interval| interval.saturating_sub(started.elapsed())),
                CaptureOutcome::DeviceError => Some(
                    self.settings
                        .min_interval
                        .map_or(ERROR_BACKOFF, |interval| interval.max(ERROR_BACKOFF)),
                ),
                CaptureOutcome::TimedOut => None,
            };

            if let Some(pause) = pause.filter(|p| !p.is_zero()) {
                match stop.recv_timeout(pause) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }

        self.camera.stop();
        tracing::debug!(
            camera = %self.camera.name,
            frames = self.sequence,
            "capture loop stopped"
        );
        // Dropping the loop closes the device before acknowledging.
        drop(self);
        let _ = done.send(());
    }
}

fn stop_requested(stop: &mpsc::Receiver<()>) -> bool {
    matches!(stop.try_recv(), Ok(()) | Err(TryRecvError::Disconnected))
}

/// Handle to a running capture loop thread.
///
/// Dropping the worker also stops the loop, without waiting for it.
#[derive(Debug)]
pub struct CaptureWorker {
    name: String,
    stop: mpsc::Sender<()>,
    done: mpsc::Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    /// Name of the camera this loop captures.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Asks the loop to stop after its current iteration.
    pub fn signal_stop(&self) {
        let _ = self.stop.send(());
    }

    /// Waits up to `timeout` for the loop to stop capture and release the
    /// device. Returns `false` if it did not acknowledge in time; the
    /// thread is then left to finish on its own.
    pub fn wait_stopped(mut self, timeout: Duration) -> bool {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(thread) = self.thread.take() {
                    if thread.join().is_err() {
                        tracing::error!(camera = %self.name, "capture loop panicked");
                    }
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    camera = %self.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "capture loop did not stop in time, releasing anyway"
                );
                false
            }
        }
    }

    /// Signals the loop and waits up to `timeout` for it to finish.
    pub fn stop(self, timeout: Duration) -> bool {
        self.signal_stop();
        self.wait_stopped(timeout)
    }
}
