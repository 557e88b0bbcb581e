use super::error::{EngineError, Result};

/// Tightly packed RGBA8 image (row stride = `width * 4`).
///
/// This is the only image representation that crosses the UI/worker boundary.
/// Sending one moves it; the sender keeps no access to the pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelImage {
    /// Wraps `data`, which must hold exactly `width * height` RGBA pixels.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(EngineError::EmptyImage { width, height });
        }
        let expected = Self::byte_len_for(width, height)?;
        if data.len() != expected {
            return Err(EngineError::InvalidImage {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// An image where every pixel is `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let pixels = (width as usize).saturating_mul(height as usize);
        let data = rgba.iter().copied().cycle().take(pixels.saturating_mul(4)).collect();
        Self::new(width, height, data)
    }

    /// Builds an image from a per-pixel function of `(x, y)`.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 4]) -> Result<Self> {
        let mut data = Vec::with_capacity((width as usize) * (height as usize) * 4);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self::new(width, height, data)
    }

    fn byte_len_for(width: u32, height: u32) -> Result<usize> {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| EngineError::MarshalMismatch(format!("{width}x{height} overflows usize")))
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Raw RGBA bytes, row after row without padding.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// The RGBA bytes of row `y`.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let stride = self.width as usize * 4;
        let start = y as usize * stride;
        self.data.get(start..start + stride)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width {
            return None;
        }
        let row = self.row(y)?;
        let i = x as usize * 4;
        Some([row[i], row[i + 1], row[i + 2], row[i + 3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_dimensions() {
        assert_eq!(
            PixelImage::new(0, 4, Vec::new()).unwrap_err(),
            EngineError::EmptyImage { width: 0, height: 4 }
        );
    }

    #[test]
    fn rejects_short_buffers() {
        let err = PixelImage::new(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidImage { expected: 16, actual: 15, .. }));
    }

    #[test]
    fn filled_repeats_the_colour() {
        let img = PixelImage::filled(3, 2, [1, 2, 3, 4]).unwrap();
        assert_eq!(img.as_bytes().len(), 24);
        assert_eq!(img.pixel(2, 1), Some([1, 2, 3, 4]));
    }

    #[test]
    fn from_fn_is_row_major() {
        let img = PixelImage::from_fn(3, 2, |x, y| [x as u8, y as u8, 0, 255]).unwrap();
        assert_eq!(img.row(1).unwrap(), &[0, 1, 0, 255, 1, 1, 0, 255, 2, 1, 0, 255]);
        assert_eq!(img.pixel(3, 0), None);
        assert_eq!(img.row(2), None);
    }
}
