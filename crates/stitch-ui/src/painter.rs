use stitch_engine::coords::Vec2;
use stitch_engine::host::PixelImage;
use stitch_engine::transform::Mat4;

/// Software renderer for the viewport.
///
/// Each target pixel center is mapped back through the inverse view matrix and
/// takes the nearest image pixel, composited over `background`. Targets are
/// `0x00RRGGBB` words, row-major, `width × height`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ViewportPainter {
    pub background: u32,
}

impl Default for ViewportPainter {
    fn default() -> Self {
        Self { background: 0x0020_2024 }
    }
}

impl ViewportPainter {
    pub fn new(background: u32) -> Self {
        Self { background }
    }

    /// Renders `image` through `view` into `target`.
    ///
    /// Returns `false` (and leaves only the background) when there is nothing
    /// to draw or `view` cannot be inverted.
    pub fn paint(&self, image: Option<&PixelImage>, view: &Mat4, target: &mut [u32], width: usize, height: usize) -> bool {
        let len = width.saturating_mul(height).min(target.len());
        let target = &mut target[..len];
        target.fill(self.background);

        let (Some(image), Some(inv)) = (image, view.inverse_2d()) else {
            return false;
        };
        let (iw, ih) = (image.width() as f64, image.height() as f64);
        let bytes = image.as_bytes();
        let stride = image.width() as usize * 4;

        // Image-space step per target pixel along x.
        let (step_x, step_y) = (inv.0[0], inv.0[1]);

        for (y, row) in target.chunks_mut(width.max(1)).enumerate() {
            let start = inv.transform_point(Vec2::new(0.5, y as f64 + 0.5));
            for (x, out) in row.iter_mut().enumerate() {
                let u = start.x + step_x * x as f64;
                let v = start.y + step_y * x as f64;
                if !(u >= 0.0 && v >= 0.0 && u < iw && v < ih) {
                    continue;
                }
                let offset = v as usize * stride + u as usize * 4;
                let Some(px) = bytes.get(offset..offset + 4) else {
                    continue;
                };
                *out = over(px, *out);
            }
        }
        true
    }
}

/// Straight-alpha RGBA over an opaque `0x00RRGGBB` pixel.
fn over(src: &[u8], dst: u32) -> u32 {
    let a = src[3] as u32;
    let channel = |s: u8, shift: u32| {
        let d = (dst >> shift) & 0xff;
        ((s as u32 * a + d * (255 - a) + 127) / 255) << shift
    };
    channel(src[0], 16) | channel(src[1], 8) | channel(src[2], 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> PixelImage {
        PixelImage::from_fn(2, 2, |x, y| if (x + y) % 2 == 0 { [255, 0, 0, 255] } else { [0, 0, 255, 255] }).unwrap()
    }

    #[test]
    fn identity_copies_pixels() {
        let painter = ViewportPainter::new(0);
        let mut fb = vec![0; 3 * 2];
        assert!(painter.paint(Some(&checker()), &Mat4::IDENTITY, &mut fb, 3, 2));
        assert_eq!(fb, vec![0xff0000, 0x0000ff, 0, 0x0000ff, 0xff0000, 0]);
    }

    #[test]
    fn scaled_view_magnifies() {
        let painter = ViewportPainter::new(0);
        let mut fb = vec![0; 4 * 4];
        painter.paint(Some(&checker()), &Mat4::uniform_scale(2.0), &mut fb, 4, 4);
        assert_eq!(&fb[0..4], &[0xff0000, 0xff0000, 0x0000ff, 0x0000ff]);
        assert_eq!(fb[15], 0xff0000);
    }

    #[test]
    fn translated_view_leaves_background() {
        let painter = ViewportPainter::new(0x123456);
        let mut fb = vec![0; 4];
        painter.paint(Some(&checker()), &Mat4::translation(Vec2::new(2.0, 0.0)), &mut fb, 4, 1);
        assert_eq!(fb, vec![0x123456, 0x123456, 0xff0000, 0x0000ff]);
    }

    #[test]
    fn alpha_blends_over_background() {
        let img = PixelImage::filled(1, 1, [255, 255, 255, 0]).unwrap();
        let painter = ViewportPainter::new(0x102030);
        let mut fb = vec![0; 1];
        painter.paint(Some(&img), &Mat4::IDENTITY, &mut fb, 1, 1);
        assert_eq!(fb[0], 0x102030);

        let half = PixelImage::filled(1, 1, [255, 255, 255, 128]).unwrap();
        painter.paint(Some(&half), &Mat4::IDENTITY, &mut fb, 1, 1);
        assert_eq!(fb[0], over(&[255, 255, 255, 128], 0x102030));
        assert!(fb[0] > 0x7f7f7f);
    }

    #[test]
    fn singular_view_draws_nothing() {
        let painter = ViewportPainter::new(7);
        let mut fb = vec![0; 4];
        assert!(!painter.paint(Some(&checker()), &Mat4::uniform_scale(0.0), &mut fb, 2, 2));
        assert!(fb.iter().all(|&p| p == 7));
        assert!(!painter.paint(None, &Mat4::IDENTITY, &mut fb, 2, 2));
    }
}
