//! Frame normalization to JPEG.
//!
//! Every frame leaves the capture pipeline as a JPEG image. MJPEG devices
//! already deliver that, so their frames pass through untouched. YUYV frames
//! are unpacked into a planar 4:2:2 buffer and then compressed.
//!
//! Conversion is pure and stateless; callers decide what to do with a
//! failure (the capture loop drops the frame and keeps going).

mod planar;

pub use planar::PlanarYCbCr422;

use crate::capture::PixelFormat;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use thiserror::Error;

/// JPEG quality used for re-encoded frames.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Errors produced while converting a raw frame.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("jpeg encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Converts one raw frame to JPEG bytes.
///
/// `width` and `height` are the negotiated dimensions of the producing
/// camera. For [`PixelFormat::Mjpeg`] the input is returned as-is.
pub fn convert(
    raw: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Bytes, ConvertError> {
    if !format.needs_conversion() {
        return Ok(Bytes::from(raw));
    }
    let planar = PlanarYCbCr422::from_yuyv(&raw, width, height)?;
    encode_jpeg(&planar, DEFAULT_JPEG_QUALITY).map(Bytes::from)
}

/// Compresses a planar image with the given JPEG quality (1-100).
pub fn encode_jpeg(image: &PlanarYCbCr422, quality: u8) -> Result<Vec<u8>, ConvertError> {
    let rgb = image.to_rgb();
    let mut jpeg = Vec::with_capacity(rgb.len() / 8);
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100));
    encoder.encode(&rgb, image.width(), image.height(), ExtendedColorType::Rgb8)?;
    Ok(jpeg)
}
