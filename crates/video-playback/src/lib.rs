//! FFmpeg-backed video playback core.
//!
//! Opens a container, decodes its best video stream (on a hardware device when
//! one can be created, in software otherwise), converts frames to packed
//! RGB/RGBA and paces decoding against a host-driven playback clock.
//!
//! Everything runs synchronously inside the host's per-frame update:
//!
//! ```no_run
//! use video_playback::{DecoderConfig, VideoStream};
//!
//! let mut stream = VideoStream::new(DecoderConfig::default());
//! stream.set_file("clip.mp4").expect("failed to open clip");
//!
//! let mut playback = stream.instantiate_playback();
//! playback.play();
//! while playback.is_playing() {
//!     if playback.update(1.0 / 60.0) {
//!         let image = playback.image().unwrap();
//!         // hand image.data to the display surface
//!         # let _ = image;
//!     }
//! }
//! ```

pub mod clock;
pub mod config;
pub mod decoder;
pub mod error;
pub mod image;
pub mod stream;

pub use clock::{FrameSource, PlaybackClock};
pub use config::DecoderConfig;
pub use decoder::{DecodeSession, HwBackend, SessionState};
pub use error::DecodeError;
pub use image::{Image, PixelLayout};
pub use stream::VideoStream;
