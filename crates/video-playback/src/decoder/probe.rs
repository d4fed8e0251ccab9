//! Container probing and video stream selection

use std::ffi::CString;
use std::path::Path;
use std::ptr;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::ffi;
use ffmpeg_next::format::context::Input;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::Rational;
use tracing::debug;

use crate::error::DecodeError;

/// Metadata of the selected video stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub pixel_format: Pixel,
    /// Frames per second, 0.0 when neither rate is usable
    pub frame_rate: f64,
    /// Container duration in seconds, 0.0 when unknown
    pub duration: f64,
    pub has_alpha: bool,
    pub codec_id: ffmpeg::codec::Id,
}

/// Open a container and read its stream information.
///
/// The returned `Input` closes itself on drop, including when stream
/// information can't be read.
pub fn open_input(path: &Path) -> Result<Input, DecodeError> {
    let display = path.display().to_string();

    if !path.exists() {
        return Err(DecodeError::ContainerOpen {
            path: display,
            reason: "file not found".to_string(),
        });
    }

    let c_path = path_to_cstring(path)?;

    unsafe {
        let mut ps = ptr::null_mut();
        let ret = ffi::avformat_open_input(&mut ps, c_path.as_ptr(), ptr::null_mut(), ptr::null_mut());
        if ret < 0 || ps.is_null() {
            return Err(DecodeError::ContainerOpen {
                path: display,
                reason: ffmpeg::Error::from(ret).to_string(),
            });
        }

        let mut input = Input::wrap(ps);

        let ret = ffi::avformat_find_stream_info(input.as_mut_ptr(), ptr::null_mut());
        if ret < 0 {
            return Err(DecodeError::StreamInfo(ffmpeg::Error::from(ret).to_string()));
        }

        Ok(input)
    }
}

/// Path bytes as FFmpeg expects them, without lossy re-encoding
fn path_to_cstring(path: &Path) -> Result<CString, DecodeError> {
    let open_error = |reason: &str| DecodeError::ContainerOpen {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };

    #[cfg(unix)]
    let bytes = {
        use std::os::unix::ffi::OsStrExt;
        path.as_os_str().as_bytes().to_vec()
    };
    #[cfg(not(unix))]
    let bytes = path
        .to_str()
        .ok_or_else(|| open_error("path is not valid UTF-8"))?
        .as_bytes()
        .to_vec();

    CString::new(bytes).map_err(|_| open_error("path contains a NUL byte"))
}

/// Pick the best video stream and extract its metadata
pub fn select_video_stream(input: &Input) -> Result<StreamInfo, DecodeError> {
    let stream = input
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or(DecodeError::NoVideoStream)?;

    let parameters = stream.parameters();
    let (width, height, raw_format) = unsafe {
        let par = parameters.as_ptr();
        ((*par).width, (*par).height, (*par).format)
    };

    let pixel_format = pixel_from_raw(raw_format);
    let frame_rate = select_frame_rate(stream.rate(), stream.avg_frame_rate());
    let duration = duration_secs(input.duration());

    let info = StreamInfo {
        index: stream.index(),
        width: width.max(0) as u32,
        height: height.max(0) as u32,
        pixel_format,
        frame_rate,
        duration,
        has_alpha: pixel_has_alpha(pixel_format),
        codec_id: parameters.id(),
    };

    debug!(
        "Selected video stream #{}: {}x{} {:?} @ {:.3} fps, {:.3}s",
        info.index, info.width, info.height, info.pixel_format, info.frame_rate, info.duration
    );

    Ok(info)
}

/// Prefer the real (forced) rate, then the average; 0.0 if both have a zero denominator.
pub fn select_frame_rate(real: Rational, average: Rational) -> f64 {
    [real, average]
        .into_iter()
        .find(|r| r.denominator() != 0)
        .map(|r| r.numerator() as f64 / r.denominator() as f64)
        .unwrap_or(0.0)
}

/// Convert a container duration in `AV_TIME_BASE` units to seconds
pub fn duration_secs(duration: i64) -> f64 {
    if duration > 0 {
        duration as f64 / ffi::AV_TIME_BASE as f64
    } else {
        0.0
    }
}

/// Closed set of source formats that carry an alpha channel
pub fn pixel_has_alpha(format: Pixel) -> bool {
    matches!(
        format,
        Pixel::RGBA | Pixel::BGRA | Pixel::YUVA420P | Pixel::YUVA444P
    )
}

/// Human-readable pixel format name, "Unknown" when unset
pub fn pixel_format_name(format: Pixel) -> String {
    if format == Pixel::None {
        return "Unknown".to_string();
    }
    format
        .descriptor()
        .map(|d| d.name().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn pixel_from_raw(raw: i32) -> Pixel {
    if raw < 0 {
        return Pixel::None;
    }
    // Same conversion ffmpeg-next applies to `AVFrame::format`
    Pixel::from(unsafe { std::mem::transmute::<i32, ffi::AVPixelFormat>(raw) })
}
