//! Pixel marshalling between tightly packed images and pitched module buffers.
//!
//! Pitch is honoured on both directions: nothing here assumes a module keeps
//! rows tightly packed, on write or on read-back.

use super::error::{EngineError, Result};
use super::image::PixelImage;
use super::imports::Imports;
use super::memory::LinearMemory;
use super::module::{ComputeModule, EngineBuffer};

/// Geometry of one module buffer as reported through the export surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BufferLayout {
    pub width: u32,
    pub height: u32,
    /// Row stride in pixels.
    pub pitch: u32,
    /// Byte address of the first pixel.
    pub pixels: u32,
}

impl BufferLayout {
    pub fn read<M>(module: &M, memory: &LinearMemory, buffer: EngineBuffer) -> Result<Self>
    where
        M: ComputeModule + ?Sized,
    {
        Ok(Self {
            width: module.width(memory, buffer)?,
            height: module.height(memory, buffer)?,
            pitch: module.pitch(memory, buffer)?,
            pixels: module.pixels(memory, buffer)?,
        })
    }

    /// Bytes from the first pixel to the end of the last row's visible pixels.
    pub fn span_bytes(&self) -> Result<usize> {
        span_bytes(self.width as usize, self.height as usize, self.pitch as usize)
    }
}

/// `(pitch * (height - 1) + width) * 4`, the extent a pitched image touches.
///
/// Fails when `pitch < width` or the arithmetic overflows.
pub fn span_bytes(width: usize, height: usize, pitch: usize) -> Result<usize> {
    if pitch < width {
        return Err(EngineError::MarshalMismatch(format!(
            "pitch {pitch} is narrower than width {width}"
        )));
    }
    if height == 0 || width == 0 {
        return Ok(0);
    }
    pitch
        .checked_mul(height - 1)
        .and_then(|n| n.checked_add(width))
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| {
            EngineError::MarshalMismatch(format!("{width}x{height} pitch {pitch} overflows usize"))
        })
}

/// Copies a pitched buffer into a freshly allocated tightly packed one.
///
/// Row `y` is read from byte `y * pitch * 4` and written to byte `y * width * 4`;
/// padding bytes are dropped. When `pitch == width` the span is copied whole.
pub fn unpack_rows(src: &[u8], width: usize, height: usize, pitch: usize) -> Result<Vec<u8>> {
    let needed = span_bytes(width, height, pitch)?;
    if src.len() < needed {
        return Err(EngineError::MarshalMismatch(format!(
            "source holds {} bytes, {width}x{height} pitch {pitch} needs {needed}",
            src.len()
        )));
    }
    if pitch == width {
        return Ok(src[..needed].to_vec());
    }

    let row = width * 4;
    let stride = pitch * 4;
    let mut out = vec![0u8; row * height];
    for (y, dst) in out.chunks_exact_mut(row).enumerate() {
        let offset = y * stride;
        dst.copy_from_slice(&src[offset..offset + row]);
    }
    Ok(out)
}

/// Copies tightly packed `rgba` rows into a pitched destination.
///
/// Padding bytes in `dst` are left untouched.
pub fn pack_rows(dst: &mut [u8], rgba: &[u8], width: usize, height: usize, pitch: usize) -> Result<()> {
    let needed = span_bytes(width, height, pitch)?;
    let row = width * 4;
    if rgba.len() != row * height {
        return Err(EngineError::MarshalMismatch(format!(
            "source holds {} bytes, {width}x{height} needs {}",
            rgba.len(),
            row * height
        )));
    }
    if dst.len() < needed {
        return Err(EngineError::MarshalMismatch(format!(
            "destination holds {} bytes, {width}x{height} pitch {pitch} needs {needed}",
            dst.len()
        )));
    }
    if pitch == width {
        dst[..needed].copy_from_slice(rgba);
        return Ok(());
    }

    let stride = pitch * 4;
    for (y, src) in rgba.chunks_exact(row).enumerate() {
        let offset = y * stride;
        dst[offset..offset + row].copy_from_slice(src);
    }
    Ok(())
}

/// Allocates a module buffer for `image` and copies its pixels in.
pub fn marshal_in<M>(module: &mut M, env: &mut dyn Imports, image: &PixelImage) -> Result<EngineBuffer>
where
    M: ComputeModule + ?Sized,
{
    let (width, height) = image.dimensions();
    let buffer = module.create_image_buffer(env, width, height)?;

    let layout = BufferLayout::read(&*module, env.memory(), buffer)?;
    if layout.width != width || layout.height != height {
        return Err(EngineError::MarshalMismatch(format!(
            "module allocated {}x{} for a {width}x{height} image",
            layout.width, layout.height
        )));
    }
    let count = module.num_pixels(env.memory(), buffer)?;
    if count as u64 != width as u64 * height as u64 {
        return Err(EngineError::MarshalMismatch(format!(
            "module reports {count} pixels for a {width}x{height} image"
        )));
    }

    let span = layout.span_bytes()?;
    let dst = env.memory_mut().slice_mut(layout.pixels as usize, span)?;
    pack_rows(dst, image.as_bytes(), width as usize, height as usize, layout.pitch as usize)?;
    Ok(buffer)
}

/// Reads a module buffer back into a tightly packed image.
pub fn marshal_out<M>(module: &M, memory: &LinearMemory, buffer: EngineBuffer) -> Result<PixelImage>
where
    M: ComputeModule + ?Sized,
{
    let layout = BufferLayout::read(module, memory, buffer)?;
    if layout.width == 0 || layout.height == 0 {
        return Err(EngineError::EmptyImage {
            width: layout.width,
            height: layout.height,
        });
    }
    let span = layout.span_bytes()?;
    let src = memory.slice(layout.pixels as usize, span)?;
    let data = unpack_rows(
        src,
        layout.width as usize,
        layout.height as usize,
        layout.pitch as usize,
    )?;
    PixelImage::new(layout.width, layout.height, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a pitched buffer whose visible pixels encode `(x, y)` and whose
    /// padding is filled with 0xEE.
    fn padded(width: usize, height: usize, pitch: usize) -> (Vec<u8>, Vec<u8>) {
        let mut src = vec![0xEEu8; pitch * 4 * height];
        let mut expected = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            for x in 0..width {
                let px = [x as u8, y as u8, (x ^ y) as u8, 255];
                let at = (y * pitch + x) * 4;
                src[at..at + 4].copy_from_slice(&px);
                expected.extend_from_slice(&px);
            }
        }
        (src, expected)
    }

    // ── span ──────────────────────────────────────────────────────────────

    #[test]
    fn span_excludes_trailing_padding_of_last_row() {
        assert_eq!(span_bytes(3, 2, 5).unwrap(), (5 + 3) * 4);
        assert_eq!(span_bytes(3, 1, 5).unwrap(), 12);
    }

    #[test]
    fn span_rejects_pitch_below_width() {
        assert!(matches!(span_bytes(4, 2, 3), Err(EngineError::MarshalMismatch(_))));
    }

    // ── unpack ────────────────────────────────────────────────────────────

    #[test]
    fn unpack_drops_padding_for_every_row() {
        for (w, h, p) in [(1, 1, 1), (3, 4, 3), (3, 4, 4), (5, 7, 8), (13, 3, 32)] {
            let (src, expected) = padded(w, h, p);
            let out = unpack_rows(&src, w, h, p).unwrap();
            assert_eq!(out.len(), w * h * 4);
            for y in 0..h {
                let row = &out[y * w * 4..(y + 1) * w * 4];
                assert_eq!(row, &expected[y * w * 4..(y + 1) * w * 4], "row {y} of {w}x{h}/{p}");
            }
        }
    }

    #[test]
    fn unpack_accepts_source_without_final_row_padding() {
        let (src, expected) = padded(3, 2, 6);
        let trimmed = &src[..span_bytes(3, 2, 6).unwrap()];
        assert_eq!(unpack_rows(trimmed, 3, 2, 6).unwrap(), expected);
    }

    #[test]
    fn unpack_rejects_short_source() {
        let (src, _) = padded(3, 2, 6);
        let short = &src[..span_bytes(3, 2, 6).unwrap() - 1];
        assert!(matches!(unpack_rows(short, 3, 2, 6), Err(EngineError::MarshalMismatch(_))));
    }

    // ── pack ──────────────────────────────────────────────────────────────

    #[test]
    fn pack_then_unpack_is_identity() {
        let (_, rgba) = padded(5, 3, 5);
        let mut dst = vec![0xAAu8; 8 * 4 * 3];
        pack_rows(&mut dst, &rgba, 5, 3, 8).unwrap();
        // Padding untouched.
        assert_eq!(&dst[5 * 4..8 * 4], &[0xAA; 12]);
        assert_eq!(unpack_rows(&dst, 5, 3, 8).unwrap(), rgba);
    }

    #[test]
    fn pack_rejects_mismatched_source() {
        let mut dst = vec![0u8; 64];
        assert!(matches!(
            pack_rows(&mut dst, &[0u8; 7], 2, 1, 2),
            Err(EngineError::MarshalMismatch(_))
        ));
    }
}
