//! Frame conversion into packed RGB/RGBA images

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};
use ffmpeg_next::util::frame::video::Video as VideoFrame;
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::image::{Image, PixelLayout};

/// Source geometry a scaler was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScalerSource {
    format: Pixel,
    width: u32,
    height: u32,
}

/// Scales host-resident frames to the session size in a fixed packed layout.
///
/// The scaling context is cached and only rebuilt when the source format or
/// dimensions change.
pub struct FrameConverter {
    width: u32,
    height: u32,
    layout: PixelLayout,
    scaler: Option<(ScalerSource, ScalingContext)>,
}

impl FrameConverter {
    pub fn new(width: u32, height: u32, has_alpha: bool) -> Self {
        Self {
            width,
            height,
            layout: PixelLayout::for_alpha(has_alpha),
            scaler: None,
        }
    }

    /// Convert one frame, logging and returning `None` on failure
    pub fn convert(&mut self, frame: &VideoFrame) -> Option<Image> {
        match self.try_convert(frame) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!("Frame conversion failed: {}", e);
                None
            }
        }
    }

    pub fn try_convert(&mut self, frame: &VideoFrame) -> Result<Image, DecodeError> {
        let (width, height, layout) = (self.width, self.height, self.layout);
        let scaler = self.ensure_scaler(frame.format(), frame.width(), frame.height())?;

        let mut output = VideoFrame::empty();
        scaler
            .run(frame, &mut output)
            .map_err(|e| DecodeError::Scaler(e.to_string()))?;

        let row_bytes = width as usize * layout.bytes_per_pixel();
        let data = pack_rows(output.data(0), output.stride(0), row_bytes, height as usize);

        Ok(Image {
            width,
            height,
            layout,
            data,
        })
    }

    /// Drop the cached scaling context
    pub fn reset(&mut self) {
        self.scaler = None;
    }

    fn ensure_scaler(
        &mut self,
        format: Pixel,
        width: u32,
        height: u32,
    ) -> Result<&mut ScalingContext, DecodeError> {
        let source = ScalerSource {
            format,
            width,
            height,
        };

        let stale = !matches!(&self.scaler, Some((current, _)) if *current == source);
        if stale {
            self.scaler = None;

            let target = match self.layout {
                PixelLayout::Rgba32 => Pixel::RGBA,
                PixelLayout::Rgb24 => Pixel::RGB24,
            };

            let context = ScalingContext::get(
                format,
                width,
                height,
                target,
                self.width,
                self.height,
                ScalingFlags::BILINEAR,
            )
            .map_err(|e| DecodeError::Scaler(format!("{:?} {}x{}: {}", format, width, height, e)))?;

            debug!(
                "Built scaler {:?} {}x{} -> {:?} {}x{}",
                format, width, height, target, self.width, self.height
            );
            self.scaler = Some((source, context));
        }

        match self.scaler.as_mut() {
            Some((_, context)) => Ok(context),
            None => Err(DecodeError::Scaler("scaler missing after build".to_string())),
        }
    }

    #[cfg(test)]
    fn scaler_source(&self) -> Option<(Pixel, u32, u32)> {
        self.scaler
            .as_ref()
            .map(|(s, _)| (s.format, s.width, s.height))
    }
}

/// Copy `rows` rows of `row_bytes` out of a strided plane, dropping padding
fn pack_rows(src: &[u8], stride: usize, row_bytes: usize, rows: usize) -> Vec<u8> {
    if stride == row_bytes {
        return src[..row_bytes * rows].to_vec();
    }

    let mut data = Vec::with_capacity(row_bytes * rows);
    for y in 0..rows {
        let row_start = y * stride;
        data.extend_from_slice(&src[row_start..row_start + row_bytes]);
    }
    data
}
