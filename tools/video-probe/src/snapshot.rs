//! Write a converted image to disk

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, ImageBuffer, Rgb, Rgba};
use video_playback::{Image, PixelLayout};

/// Save as PNG or JPEG, chosen by extension. JPEG drops alpha.
pub fn save(frame: &Image, path: &Path) -> Result<()> {
    let image = to_dynamic(frame)?;

    let jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));

    let image = if jpeg {
        DynamicImage::ImageRgb8(image.into_rgb8())
    } else {
        image
    };

    image
        .save(path)
        .with_context(|| format!("writing {}", path.display()))
}

fn to_dynamic(frame: &Image) -> Result<DynamicImage> {
    let data = frame.data.clone();
    let image = match frame.layout {
        PixelLayout::Rgb24 => ImageBuffer::<Rgb<u8>, _>::from_raw(frame.width, frame.height, data)
            .map(DynamicImage::ImageRgb8),
        PixelLayout::Rgba32 => ImageBuffer::<Rgba<u8>, _>::from_raw(frame.width, frame.height, data)
            .map(DynamicImage::ImageRgba8),
    };

    image.ok_or_else(|| {
        anyhow!(
            "buffer of {} bytes doesn't fit {}x{} {:?}",
            frame.data.len(),
            frame.width,
            frame.height,
            frame.layout
        )
    })
}
