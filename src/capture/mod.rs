//! Camera input and frame handling.
//!
//! This module covers everything between a device node and the frame bus:
//! the camera handle abstraction and its backends, configuration of the
//! camera set, and the per-camera capture loop.

mod camera;
mod config;
mod devices;
mod format;
mod frame;
#[cfg(feature = "v4l2")]
mod v4l2;
mod worker;

pub use camera::{
    CameraDriver, CameraError, CameraHandle, NegotiatedFormat, SyntheticCamera, SystemDriver,
    SYNTHETIC_PREFIX,
};
pub use config::{search_paths, CameraDescriptor, ConfigError, FileConfig, ServerConfig};
pub use devices::{is_v4l_device, list_devices, list_devices_in, DeviceInfo};
pub use format::{PixelFormat, UnknownPixelFormat};
pub use frame::Frame;
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Camera;
pub use worker::{
    Camera, CameraInfo, CaptureLoop, CaptureOutcome, CaptureSettings, CaptureWorker, BUFFER_DEPTH,
};
