//! Pixel formats understood by the capture pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of pixel formats a camera can be configured with.
///
/// Config files use the V4L2 FourCC spelling (`"MJPG"`, `"YUYV"`); any other
/// tag is rejected when the configuration is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Motion-JPEG: every frame is already a complete JPEG image.
    #[serde(rename = "MJPG")]
    Mjpeg,
    /// Packed 4:2:2 luma/chroma, `Y0 U Y1 V` per pixel pair.
    #[serde(rename = "YUYV")]
    Yuyv,
}

impl PixelFormat {
    /// Returns the four-character code used by the driver.
    pub const fn fourcc(self) -> [u8; 4] {
        match self {
            PixelFormat::Mjpeg => *b"MJPG",
            PixelFormat::Yuyv => *b"YUYV",
        }
    }

    /// Maps a driver four-character code back to a known format.
    pub fn from_fourcc(code: &[u8; 4]) -> Option<Self> {
        match code {
            b"MJPG" => Some(PixelFormat::Mjpeg),
            b"YUYV" => Some(PixelFormat::Yuyv),
            _ => None,
        }
    }

    /// Whether frames in this format must be re-encoded before streaming.
    #[inline]
    pub fn needs_conversion(self) -> bool {
        matches!(self, PixelFormat::Yuyv)
    }

    /// Tag as written in configuration files.
    pub const fn as_str(self) -> &'static str {
        match self {
            PixelFormat::Mjpeg => "MJPG",
            PixelFormat::Yuyv => "YUYV",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown pixel format tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pixel format {0:?} (expected \"MJPG\" or \"YUYV\")")]
pub struct UnknownPixelFormat(pub String);

impl FromStr for PixelFormat {
    type Err = UnknownPixelFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MJPG" => Ok(PixelFormat::Mjpeg),
            "YUYV" => Ok(PixelFormat::Yuyv),
            other => Err(UnknownPixelFormat(other.to_string())),
        }
    }
}
