use std::path::Path;

use anyhow::Context;
use image::{ImageFormat, RgbaImage};

use stitch_engine::host::PixelImage;

/// Decodes any supported format into tightly packed RGBA.
pub fn load(path: &Path) -> anyhow::Result<PixelImage> {
    let decoded = image::open(path).with_context(|| format!("reading {}", path.display()))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    let image = PixelImage::new(width, height, rgba.into_raw())
        .with_context(|| format!("unusable image {}", path.display()))?;
    Ok(image)
}

pub fn save_png(path: &Path, image: &PixelImage) -> anyhow::Result<()> {
    let (width, height) = image.dimensions();
    let buffer = RgbaImage::from_raw(width, height, image.as_bytes().to_vec())
        .context("pixel buffer does not match its dimensions")?;
    buffer
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))
}
