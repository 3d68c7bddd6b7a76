//! Frame type representing one encoded image with metadata.

use bytes::Bytes;
use std::time::Instant;

/// A single JPEG frame published by a capture loop.
///
/// Cloning is cheap: the image bytes are reference counted, so every
/// stream session holding the frame shares one buffer.
#[derive(Clone)]
pub struct Frame {
    /// JPEG image data.
    data: Bytes,
    /// Index of the producing camera.
    camera: usize,
    /// Per-camera monotonic sequence number, starting at 1.
    sequence: u64,
    /// When the capture loop read the frame.
    timestamp: Instant,
}

impl Frame {
    /// Creates a new frame with the given parameters.
    pub fn new(data: Bytes, camera: usize, sequence: u64) -> Self {
        Self {
            data,
            camera,
            sequence,
            timestamp: Instant::now(),
        }
    }

    /// Returns the encoded image bytes.
    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    #[inline]
    pub fn camera(&self) -> usize {
        self.camera
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("camera", &self.camera)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let frame = Frame::new(Bytes::from_static(b"\xFF\xD8jpeg"), 2, 7);

        assert_eq!(frame.camera(), 2);
        assert_eq!(frame.sequence(), 7);
        assert_eq!(frame.len(), 6);
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_clone_shares_buffer() {
        let frame = Frame::new(Bytes::from(vec![1u8; 1024]), 0, 1);
        let copy = frame.clone();
        assert_eq!(frame.data().as_ptr(), copy.data().as_ptr());
    }
}
