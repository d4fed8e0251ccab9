//! Decoded frame residency

use ffmpeg_next::ffi;
use ffmpeg_next::util::frame::video::Video as VideoFrame;
use tracing::trace;

use super::hwaccel::is_hw_pixel_format;
use crate::error::DecodeError;

/// A frame fresh out of the decoder, tagged by where its samples live.
pub enum DecodedFrame {
    /// Samples live in accelerator memory and must be downloaded before use.
    HardwareResident(VideoFrame),
    /// Samples are host-addressable.
    HostResident(VideoFrame),
}

impl DecodedFrame {
    /// Tag a decoder output by its pixel format
    pub fn classify(frame: VideoFrame) -> Self {
        if is_hw_pixel_format(frame.format()) {
            Self::HardwareResident(frame)
        } else {
            Self::HostResident(frame)
        }
    }

    pub fn is_hardware_resident(&self) -> bool {
        matches!(self, Self::HardwareResident(_))
    }

    /// Download to host memory if needed; host frames pass through untouched
    pub fn into_host(self) -> Result<VideoFrame, DecodeError> {
        match self {
            Self::HostResident(frame) => Ok(frame),
            Self::HardwareResident(frame) => transfer_to_host(&frame),
        }
    }
}

fn transfer_to_host(frame: &VideoFrame) -> Result<VideoFrame, DecodeError> {
    let mut host = VideoFrame::empty();

    let ret = unsafe { ffi::av_hwframe_transfer_data(host.as_mut_ptr(), frame.as_ptr(), 0) };
    if ret < 0 {
        return Err(DecodeError::HwTransfer(ffmpeg_next::Error::from(ret).to_string()));
    }

    host.set_pts(frame.pts());

    trace!(
        "Transferred {:?} frame to host as {:?}",
        frame.format(),
        host.format()
    );
    Ok(host)
}
