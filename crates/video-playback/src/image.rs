//! Converted output image handed to the host.

/// Packed pixel layout of an [`Image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// 3 bytes per pixel, R G B.
    Rgb24,
    /// 4 bytes per pixel, R G B A.
    Rgba32,
}

impl PixelLayout {
    /// Layout used for a stream, chosen by alpha presence.
    pub fn for_alpha(has_alpha: bool) -> Self {
        if has_alpha {
            Self::Rgba32
        } else {
            Self::Rgb24
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb24 => 3,
            Self::Rgba32 => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Rgba32)
    }
}

/// Row-major packed pixel buffer with no row padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
}

impl Image {
    /// Zero-filled image (black, fully transparent for RGBA).
    pub fn blank(width: u32, height: u32, layout: PixelLayout) -> Self {
        Self {
            width,
            height,
            layout,
            data: vec![0; Self::buffer_len(width, height, layout)],
        }
    }

    /// Byte length of a packed buffer of the given geometry.
    pub fn buffer_len(width: u32, height: u32, layout: PixelLayout) -> usize {
        width as usize * height as usize * layout.bytes_per_pixel()
    }
}
