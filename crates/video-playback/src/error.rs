//! Decode session error types (thiserror-based).

use thiserror::Error;

/// Errors raised by the decode session and its collaborators.
///
/// Open-time variants abort the open and leave the session closed. Per-packet
/// variants (`HwTransfer`, `Scaler`) are logged and skipped by the read loop.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The source could not be opened or parsed as a supported container.
    #[error("Could not open container {path}: {reason}")]
    ContainerOpen { path: String, reason: String },

    /// Stream headers are incomplete or corrupt.
    #[error("Could not find stream information: {0}")]
    StreamInfo(String),

    /// The container holds no decodable video stream.
    #[error("No video stream found")]
    NoVideoStream,

    /// The codec context could not be allocated.
    #[error("Could not allocate codec context")]
    Allocation,

    /// Stream parameters could not be copied into the codec context.
    #[error("Could not copy codec parameters: {0}")]
    ParameterCopy(String),

    /// The codec could not be activated.
    #[error("Could not open codec: {0}")]
    CodecOpen(String),

    /// The requested path is deliberately unsupported.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    /// An operation that needs an open session was called on a closed one.
    #[error("Session is not open")]
    NotOpen,

    /// The demuxer rejected a seek request.
    #[error("Seek error at {time}s: {reason}")]
    Seek { time: f64, reason: String },

    /// A hardware-resident frame could not be downloaded to host memory.
    #[error("Hardware frame transfer failed: {0}")]
    HwTransfer(String),

    /// No scaling context could be built for the source format.
    #[error("Scaler error: {0}")]
    Scaler(String),

    /// A hardware device context could not be created.
    #[error("Hardware device {backend} unavailable: {reason}")]
    HwDevice { backend: &'static str, reason: String },

    /// Any other FFmpeg failure.
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),
}
