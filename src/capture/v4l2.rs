//! V4L2 camera backend.
//!
//! Uses memory-mapped streaming buffers. The driver's poll timeout is
//! surfaced as [`CameraError::Timeout`]; a dequeued buffer is copied out and
//! held until the next [`CameraHandle::read_frame`] call.

use super::camera::{CameraError, CameraHandle, NegotiatedFormat};
use super::PixelFormat;
use std::io;
use std::time::Duration;
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::{CaptureStream, Stream};
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

/// A V4L2 capture device.
pub struct V4l2Camera {
    path: String,
    device: Device,
    buffer_depth: u32,
    stream: Option<MmapStream<'static>>,
    pending: Option<Vec<u8>>,
}

impl V4l2Camera {
    /// Opens the device node at `path` (e.g. `/dev/video0`).
    pub fn open(path: &str) -> Result<Self, CameraError> {
        let device = Device::with_path(path).map_err(|e| CameraError::DeviceOpenFailed {
            device: path.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            path: path.to_string(),
            device,
            buffer_depth: 1,
            stream: None,
            pending: None,
        })
    }
}

impl std::fmt::Debug for V4l2Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V4l2Camera")
            .field("path", &self.path)
            .field("buffer_depth", &self.buffer_depth)
            .field("streaming", &self.stream.is_some())
            .finish()
    }
}

impl CameraHandle for V4l2Camera {
    fn negotiate_format(
        &mut self,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<NegotiatedFormat, CameraError> {
        let requested = Format::new(width, height, FourCC::new(&format.fourcc()));
        let applied = self
            .device
            .set_format(&requested)
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;

        if PixelFormat::from_fourcc(&applied.fourcc.repr) != Some(format) {
            return Err(CameraError::FormatUnsupported {
                requested: format,
                offered: applied.fourcc.to_string(),
            });
        }

        Ok(NegotiatedFormat {
            format,
            width: applied.width,
            height: applied.height,
        })
    }

    fn set_buffer_depth(&mut self, depth: u32) -> Result<(), CameraError> {
        if depth == 0 {
            return Err(CameraError::ConfigFailed("buffer depth must be at least 1".into()));
        }
        if self.stream.is_some() {
            return Err(CameraError::ConfigFailed(
                "buffer depth cannot change while streaming".into(),
            ));
        }
        self.buffer_depth = depth;
        Ok(())
    }

    fn start_capture(&mut self) -> Result<(), CameraError> {
        let mut stream =
            MmapStream::with_buffers(&self.device, Type::VideoCapture, self.buffer_depth)?;
        stream.start()?;
        self.stream = Some(stream);
        Ok(())
    }

    fn stop_capture(&mut self) -> Result<(), CameraError> {
        self.pending = None;
        if let Some(mut stream) = self.stream.take() {
            stream.stop()?;
        }
        Ok(())
    }

    fn wait_for_frame(&mut self, timeout: Duration) -> Result<(), CameraError> {
        let stream = self.stream.as_mut().ok_or(CameraError::NotStreaming)?;
        stream.set_timeout(timeout);

        match CaptureStream::next(stream) {
            Ok((buf, meta)) => {
                let used = match meta.bytesused as usize {
                    0 => buf.len(),
                    n => n.min(buf.len()),
                };
                self.pending = Some(buf[..used].to_vec());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Err(CameraError::Timeout),
            Err(e) => Err(CameraError::Io(e)),
        }
    }

    fn read_frame(&mut self) -> Result<Vec<u8>, CameraError> {
        self.pending.take().ok_or_else(|| {
            CameraError::Io(io::Error::new(
                io::ErrorKind::WouldBlock,
                "no frame ready; wait_for_frame first",
            ))
        })
    }
}
