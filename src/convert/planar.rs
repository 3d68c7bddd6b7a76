//! Planar 4:2:2 image assembled from packed YUYV.

use super::ConvertError;

/// A 4:2:2 subsampled image with separate Y, Cb and Cr planes.
///
/// Luma has one sample per pixel; each chroma plane has one sample per
/// horizontal pixel pair.
#[derive(Clone)]
pub struct PlanarYCbCr422 {
    width: u32,
    height: u32,
    y: Vec<u8>,
    cb: Vec<u8>,
    cr: Vec<u8>,
}

impl PlanarYCbCr422 {
    /// Unpacks a YUYV buffer.
    ///
    /// Each 4-byte group `Y0 Cb Y1 Cr` yields luma samples for an even and
    /// an odd column plus one chroma pair. Trailing bytes beyond
    /// `width * height * 2` are ignored since some drivers pad buffers.
    pub fn from_yuyv(raw: &[u8], width: u32, height: u32) -> Result<Self, ConvertError> {
        if width == 0 || height == 0 || width % 2 != 0 {
            return Err(ConvertError::InvalidDimensions { width, height });
        }

        let pixels = width as usize * height as usize;
        let expected = pixels * 2;
        if raw.len() < expected {
            return Err(ConvertError::Truncated {
                expected,
                actual: raw.len(),
            });
        }

        let pairs = pixels / 2;
        let mut y = vec![0u8; pixels];
        let mut cb = vec![0u8; pairs];
        let mut cr = vec![0u8; pairs];

        for (i, group) in raw[..expected].chunks_exact(4).enumerate() {
            y[i * 2] = group[0];
            y[i * 2 + 1] = group[2];
            cb[i] = group[1];
            cr[i] = group[3];
        }

        Ok(Self {
            width,
            height,
            y,
            cb,
            cr,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Luma plane, row-major.
    pub fn luma(&self) -> &[u8] {
        &self.y
    }

    /// Blue-difference chroma plane, half horizontal resolution.
    pub fn cb(&self) -> &[u8] {
        &self.cb
    }

    /// Red-difference chroma plane, half horizontal resolution.
    pub fn cr(&self) -> &[u8] {
        &self.cr
    }

    /// Expands to interleaved 8-bit RGB for the encoder.
    pub fn to_rgb(&self) -> Vec<u8> {
        let mut rgb = Vec::with_capacity(self.y.len() * 3);
        for (i, &luma) in self.y.iter().enumerate() {
            let chroma = i / 2;
            rgb.extend_from_slice(&ycbcr_to_rgb(luma, self.cb[chroma], self.cr[chroma]));
        }
        rgb
    }
}

impl std::fmt::Debug for PlanarYCbCr422 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanarYCbCr422")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Full-range (JFIF) BT.601 conversion.
pub(crate) fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let y = y as f32;
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;

    let r = y + 1.402 * cr;
    let g = y - 0.344_136 * cb - 0.714_136 * cr;
    let b = y + 1.772 * cb;

    [clamp(r), clamp(g), clamp(b)]
}

#[inline]
fn clamp(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
