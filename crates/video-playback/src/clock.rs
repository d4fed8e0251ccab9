//! Playback clock: decides per tick whether a new frame is needed.
//!
//! Decoding is driven by frame time buckets rather than by ticks, so a host
//! ticking faster than the stream frame rate never decodes the same bucket
//! twice. When the wanted bucket is more than [`DRIFT_TOLERANCE_FRAMES`] away
//! from the last decoded one the source is re-seeked first, which bounds drift
//! after dropped ticks or a slow host.

use tracing::{debug, trace, warn};

use crate::error::DecodeError;
use crate::image::{Image, PixelLayout};

/// Gap, in frame durations, beyond which a corrective seek is issued
pub const DRIFT_TOLERANCE_FRAMES: f64 = 1.5;

/// What the clock needs from a decoder
pub trait FrameSource {
    fn is_open(&self) -> bool;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn has_alpha(&self) -> bool;
    /// Frames per second, non-positive when unknown
    fn frame_rate(&self) -> f64;
    /// Seconds, non-positive when unknown
    fn duration(&self) -> f64;
    fn decode_next_frame(&mut self) -> Option<Image>;
    fn seek_to_time(&mut self, time: f64) -> Result<(), DecodeError>;
}

/// Nominal start of the frame containing `position`, `None` without a frame rate
pub fn frame_boundary(position: f64, frame_rate: f64) -> Option<f64> {
    if frame_rate <= 0.0 {
        return None;
    }
    let frame_duration = 1.0 / frame_rate;
    Some((position / frame_duration).floor() * frame_duration)
}

/// Whether reaching `boundary` from the last decoded boundary needs a seek.
///
/// With nothing decoded yet the decoder position is unknown, so always seek.
pub fn needs_corrective_seek(last: Option<f64>, boundary: f64, frame_duration: f64) -> bool {
    match last {
        Some(last) => (boundary - last).abs() > frame_duration * DRIFT_TOLERANCE_FRAMES,
        None => true,
    }
}

/// Host-facing playback state over one frame source
pub struct PlaybackClock<S> {
    source: Option<S>,
    position: f64,
    playing: bool,
    paused: bool,
    last_frame_time: Option<f64>,
    cache_valid: bool,
    cached: Option<Image>,
}

impl<S> Default for PlaybackClock<S> {
    fn default() -> Self {
        Self {
            source: None,
            position: 0.0,
            playing: false,
            paused: false,
            last_frame_time: None,
            cache_valid: false,
            cached: None,
        }
    }
}

impl<S: FrameSource> PlaybackClock<S> {
    /// Idle clock with no source
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(source: S) -> Self {
        let mut clock = Self::new();
        clock.set_source(source);
        clock
    }

    /// Attach a source, seeding a blank image of its size when it is open
    pub fn set_source(&mut self, source: S) {
        self.stop();
        self.cached = None;

        if source.is_open() && source.width() > 0 && source.height() > 0 {
            let layout = PixelLayout::for_alpha(source.has_alpha());
            self.cached = Some(Image::blank(source.width(), source.height(), layout));
        }

        self.source = Some(source);
    }

    pub fn source(&self) -> Option<&S> {
        self.source.as_ref()
    }

    pub fn source_mut(&mut self) -> Option<&mut S> {
        self.source.as_mut()
    }

    pub fn play(&mut self) {
        if !self.source.as_ref().is_some_and(|s| s.is_open()) {
            warn!("No open source for playback");
            return;
        }
        self.playing = true;
        self.paused = false;
        debug!(position = self.position, "Playback started");
    }

    /// Stop and rewind to zero; the next play decodes fresh
    pub fn stop(&mut self) {
        self.playing = false;
        self.paused = false;
        self.position = 0.0;
        self.cache_valid = false;
        self.last_frame_time = None;
    }

    /// Playing and not paused
    pub fn is_playing(&self) -> bool {
        self.playing && !self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Source duration in seconds, 0.0 without a source
    pub fn length(&self) -> f64 {
        self.source.as_ref().map(|s| s.duration()).unwrap_or(0.0)
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    /// Latest image to display
    pub fn image(&self) -> Option<&Image> {
        self.cached.as_ref()
    }

    /// Seek the source; position only moves when the source accepted the seek
    pub fn seek(&mut self, time: f64) -> Result<(), DecodeError> {
        let Some(source) = self.source.as_mut() else {
            return Err(DecodeError::NotOpen);
        };

        source.seek_to_time(time)?;

        self.position = time;
        self.cache_valid = false;
        self.last_frame_time = None;
        debug!(position = time, "Seeked");
        Ok(())
    }

    /// Advance by `delta` seconds. Returns whether a new image was decoded.
    ///
    /// Position only moves forward; negative or non-finite deltas are ignored.
    pub fn update(&mut self, delta: f64) -> bool {
        if !self.playing || self.paused {
            return false;
        }
        if !delta.is_finite() || delta < 0.0 {
            trace!("Ignoring tick delta {}", delta);
            return false;
        }
        let Some(source) = self.source.as_mut() else {
            return false;
        };

        self.position += delta;

        let mut refreshed = false;
        let frame_rate = source.frame_rate();

        if let Some(boundary) = frame_boundary(self.position, frame_rate) {
            if !self.cache_valid || self.last_frame_time != Some(boundary) {
                if needs_corrective_seek(self.last_frame_time, boundary, 1.0 / frame_rate) {
                    if let Err(e) = source.seek_to_time(boundary) {
                        debug!("Corrective seek to {:.3}s failed: {}", boundary, e);
                    }
                }

                match source.decode_next_frame() {
                    Some(image) => {
                        self.cached = Some(image);
                        self.cache_valid = true;
                        self.last_frame_time = Some(boundary);
                        refreshed = true;
                    }
                    None => trace!("No frame for {:.3}s, keeping previous image", boundary),
                }
            }
        }

        let duration = source.duration();
        if duration > 0.0 && self.position >= duration {
            debug!(position = self.position, "Reached end of stream");
            self.stop();
        }

        refreshed
    }
}
