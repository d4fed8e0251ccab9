//! FFmpeg decode session

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::ffi;
use ffmpeg_next::format::context::Input;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::util::frame::video::Video as VideoFrame;
use ffmpeg_next::Packet;
use tracing::{debug, info, trace, warn};

use super::convert::FrameConverter;
use super::frame::DecodedFrame;
use super::hwaccel::{self, DeviceFactory, FfmpegDevices, HardwareContext, HwBackend};
use super::probe::{self, StreamInfo};
use crate::clock::FrameSource;
use crate::config::DecoderConfig;
use crate::error::DecodeError;
use crate::image::Image;

/// Lifecycle of a [`DecodeSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Open,
}

/// Everything `open` acquires. Dropping it releases whatever was acquired.
struct OpenResources {
    input: Input,
    decoder: ffmpeg::decoder::Video,
    hw: Option<HardwareContext>,
    stream: StreamInfo,
}

/// One open decodable video stream
pub struct DecodeSession {
    config: DecoderConfig,
    devices: Box<dyn DeviceFactory>,
    state: SessionState,

    // Released in this order by close()
    converter: Option<FrameConverter>,
    decoder: Option<ffmpeg::decoder::Video>,
    input: Option<Input>,
    hw: Option<HardwareContext>,

    stream: Option<StreamInfo>,
    draining: bool,

    // Not applied to conversion yet
    color_range: Option<i32>,
    color_space: Option<i32>,
}

impl DecodeSession {
    /// Closed session using real FFmpeg hardware devices
    pub fn new(config: DecoderConfig) -> Self {
        Self::with_devices(config, Box::new(FfmpegDevices))
    }

    /// Closed session with a custom device factory for hardware negotiation
    pub fn with_devices(config: DecoderConfig, devices: Box<dyn DeviceFactory>) -> Self {
        Self {
            config,
            devices,
            state: SessionState::Closed,
            converter: None,
            decoder: None,
            input: None,
            hw: None,
            stream: None,
            draining: false,
            color_range: None,
            color_space: None,
        }
    }

    /// Open a video file, closing whatever was open before.
    ///
    /// On failure every partially acquired resource is released and the
    /// session stays closed.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), DecodeError> {
        let path = path.as_ref();
        self.close();

        ffmpeg::init()?;

        self.state = SessionState::Opening;
        let resources = match self.acquire(path) {
            Ok(resources) => resources,
            Err(e) => {
                warn!("Failed to open {}: {}", path.display(), e);
                self.close();
                return Err(e);
            }
        };

        let OpenResources {
            input,
            decoder,
            hw,
            stream,
        } = resources;

        info!(
            "Opened video: {}x{} @ {:.2} fps, {:.2}s, {} ({})",
            stream.width,
            stream.height,
            stream.frame_rate,
            stream.duration,
            probe::pixel_format_name(stream.pixel_format),
            hw.as_ref().map(|h| h.backend().name()).unwrap_or("Software"),
        );
        if let Some(hw) = hw.as_ref() {
            debug!("Decoder expects {:?} surfaces", hw.surface_format());
        }

        self.converter = Some(FrameConverter::new(stream.width, stream.height, stream.has_alpha));
        self.decoder = Some(decoder);
        self.input = Some(input);
        self.hw = hw;
        self.stream = Some(stream);
        self.state = SessionState::Open;
        Ok(())
    }

    fn acquire(&self, path: &Path) -> Result<OpenResources, DecodeError> {
        let input = probe::open_input(path)?;
        let stream = probe::select_video_stream(&input)?;

        let codec = ffmpeg::decoder::find(stream.codec_id)
            .ok_or_else(|| DecodeError::CodecOpen(format!("no decoder for {:?}", stream.codec_id)))?;

        let mut context = unsafe {
            let ptr = ffi::avcodec_alloc_context3(codec.as_ptr());
            if ptr.is_null() {
                return Err(DecodeError::Allocation);
            }
            ffmpeg::codec::context::Context::wrap(ptr, None)
        };

        let parameters = input
            .stream(stream.index)
            .ok_or(DecodeError::NoVideoStream)?
            .parameters();
        context
            .set_parameters(parameters)
            .map_err(|e| DecodeError::ParameterCopy(e.to_string()))?;

        let hw = if self.config.use_hardware_acceleration {
            hwaccel::negotiate(&mut context, self.devices.as_ref(), &self.config.hw_backends)
        } else {
            None
        };

        let decoder = context
            .decoder()
            .open_as(codec)
            .and_then(|opened| opened.video())
            .map_err(|e| DecodeError::CodecOpen(e.to_string()))?;

        Ok(OpenResources {
            input,
            decoder,
            hw,
            stream,
        })
    }

    /// In-memory opening is not supported; always fails
    pub fn open_bytes(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        warn!("Stream opening from {} bytes not implemented", data.len());
        Err(DecodeError::NotImplemented("In-memory stream opening"))
    }

    /// Release all decode resources. Safe to call any number of times.
    pub fn close(&mut self) {
        let was_open = self.state == SessionState::Open;

        if let Some(converter) = self.converter.as_mut() {
            converter.reset();
        }
        self.converter = None;
        self.decoder = None;
        self.input = None;
        self.hw = None;

        self.stream = None;
        self.draining = false;
        self.state = SessionState::Closed;

        if was_open {
            info!("Closed video");
        }
    }

    /// Decode and convert the next frame of the selected stream.
    ///
    /// Returns `None` at end of stream, when the session is closed, or when
    /// too many consecutive packets were rejected.
    pub fn decode_next_frame(&mut self) -> Option<Image> {
        if self.state != SessionState::Open {
            return None;
        }

        let max_failures = self.config.max_consecutive_send_failures;
        let (Some(input), Some(decoder), Some(converter), Some(stream)) = (
            self.input.as_mut(),
            self.decoder.as_mut(),
            self.converter.as_mut(),
            self.stream.as_ref(),
        ) else {
            return None;
        };

        let mut failures = 0u32;

        loop {
            let mut frame = VideoFrame::empty();
            match decoder.receive_frame(&mut frame) {
                Ok(()) => {
                    trace!("Decoded frame pts={:?} format={:?}", frame.pts(), frame.format());
                    match DecodedFrame::classify(frame).into_host() {
                        Ok(host) => return converter.convert(&host),
                        Err(e) => {
                            warn!("{}, skipping frame", e);
                            continue;
                        }
                    }
                }
                Err(ffmpeg::Error::Eof) => {
                    debug!("Decoder drained");
                    return None;
                }
                // Needs more input
                Err(_) => {}
            }

            let mut packet = Packet::empty();
            match packet.read(input) {
                Ok(()) => {}
                Err(ffmpeg::Error::Eof) => {
                    if self.draining {
                        return None;
                    }
                    debug!("End of stream, draining decoder");
                    self.draining = true;
                    if let Err(e) = decoder.send_eof() {
                        debug!("Decoder refused end of stream: {}", e);
                        return None;
                    }
                    continue;
                }
                Err(e) => {
                    failures += 1;
                    trace!("Skipping unreadable packet: {}", e);
                    if failures > max_failures {
                        warn!("Giving up after {} unreadable packets", failures);
                        return None;
                    }
                    continue;
                }
            }

            if packet.stream() != stream.index {
                continue;
            }

            match decoder.send_packet(&packet) {
                Ok(()) => failures = 0,
                Err(e) => {
                    failures += 1;
                    warn!("Decoder rejected packet pts={:?}: {}", packet.pts(), e);
                    if failures > max_failures {
                        warn!("Giving up after {} rejected packets", failures);
                        return None;
                    }
                }
            }
        }
    }

    /// Seek to the nearest keyframe at or before `time` seconds and flush the decoder
    pub fn seek_to_time(&mut self, time: f64) -> Result<(), DecodeError> {
        let (Some(input), Some(decoder)) = (self.input.as_mut(), self.decoder.as_mut()) else {
            return Err(DecodeError::NotOpen);
        };

        if !time.is_finite() || time < 0.0 {
            return Err(DecodeError::Seek {
                time,
                reason: "time must be finite and non-negative".to_string(),
            });
        }

        let duration = self.stream.as_ref().map(|s| s.duration).unwrap_or(0.0);
        if duration > 0.0 && time > duration {
            return Err(DecodeError::Seek {
                time,
                reason: format!("past end of stream ({:.3}s)", duration),
            });
        }

        let timestamp = (time * ffi::AV_TIME_BASE as f64) as i64;
        let ret = unsafe {
            ffi::av_seek_frame(
                input.as_mut_ptr(),
                -1,
                timestamp,
                ffi::AVSEEK_FLAG_BACKWARD as i32,
            )
        };

        if ret < 0 {
            return Err(DecodeError::Seek {
                time,
                reason: ffmpeg::Error::from(ret).to_string(),
            });
        }

        decoder.flush();
        self.draining = false;

        debug!("Seeked to {:.3}s (ts={})", time, timestamp);
        Ok(())
    }

    /// Seek to `frame / frame_rate` seconds; needs a known frame rate
    pub fn seek_to_frame(&mut self, frame: i64) -> Result<(), DecodeError> {
        if !self.is_open() {
            return Err(DecodeError::NotOpen);
        }

        let time = frame_time(frame, self.frame_rate())?;
        self.seek_to_time(time)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.stream.as_ref()
    }

    pub fn width(&self) -> u32 {
        self.stream.as_ref().map(|s| s.width).unwrap_or(0)
    }

    pub fn height(&self) -> u32 {
        self.stream.as_ref().map(|s| s.height).unwrap_or(0)
    }

    pub fn frame_rate(&self) -> f64 {
        self.stream.as_ref().map(|s| s.frame_rate).unwrap_or(0.0)
    }

    /// Duration in seconds, 0.0 when unknown
    pub fn duration(&self) -> f64 {
        self.stream.as_ref().map(|s| s.duration).unwrap_or(0.0)
    }

    pub fn has_alpha(&self) -> bool {
        self.stream.as_ref().map(|s| s.has_alpha).unwrap_or(false)
    }

    pub fn pixel_format(&self) -> Pixel {
        self.stream.as_ref().map(|s| s.pixel_format).unwrap_or(Pixel::None)
    }

    pub fn pixel_format_name(&self) -> String {
        probe::pixel_format_name(self.pixel_format())
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Takes effect on the next `open`
    pub fn set_use_hardware_acceleration(&mut self, enabled: bool) {
        self.config.use_hardware_acceleration = enabled;
    }

    pub fn use_hardware_acceleration(&self) -> bool {
        self.config.use_hardware_acceleration
    }

    /// Device types the linked FFmpeg was built with
    pub fn available_hw_decoders() -> Vec<String> {
        hwaccel::available_device_types()
    }

    pub fn hw_backend(&self) -> Option<HwBackend> {
        self.hw.as_ref().map(|h| h.backend())
    }

    /// Active backend name, "Software" without one
    pub fn current_hw_decoder(&self) -> String {
        self.hw_backend()
            .map(|b| b.name().to_string())
            .unwrap_or_else(|| "Software".to_string())
    }

    /// Stored only; conversion does not read it yet
    pub fn set_color_range(&mut self, range: i32) {
        debug!("Color range {} recorded (not applied)", range);
        self.color_range = Some(range);
    }

    /// Stored only; conversion does not read it yet
    pub fn set_color_space(&mut self, space: i32) {
        debug!("Color space {} recorded (not applied)", space);
        self.color_space = Some(space);
    }

    pub fn color_range(&self) -> Option<i32> {
        self.color_range
    }

    pub fn color_space(&self) -> Option<i32> {
        self.color_space
    }
}

/// Presentation time of frame `frame`, failing when the rate is unknown
fn frame_time(frame: i64, frame_rate: f64) -> Result<f64, DecodeError> {
    if frame_rate <= 0.0 {
        return Err(DecodeError::Seek {
            time: 0.0,
            reason: format!("frame {} requested but frame rate is unknown", frame),
        });
    }
    Ok(frame as f64 / frame_rate)
}

impl Default for DecodeSession {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

impl Drop for DecodeSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl FrameSource for DecodeSession {
    fn is_open(&self) -> bool {
        DecodeSession::is_open(self)
    }

    fn width(&self) -> u32 {
        DecodeSession::width(self)
    }

    fn height(&self) -> u32 {
        DecodeSession::height(self)
    }

    fn has_alpha(&self) -> bool {
        DecodeSession::has_alpha(self)
    }

    fn frame_rate(&self) -> f64 {
        DecodeSession::frame_rate(self)
    }

    fn duration(&self) -> f64 {
        DecodeSession::duration(self)
    }

    fn decode_next_frame(&mut self) -> Option<Image> {
        DecodeSession::decode_next_frame(self)
    }

    fn seek_to_time(&mut self, time: f64) -> Result<(), DecodeError> {
        DecodeSession::seek_to_time(self, time)
    }
}
