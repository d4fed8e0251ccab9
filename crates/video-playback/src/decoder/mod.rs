//! Video decoder module

mod convert;
mod frame;
mod hwaccel;
mod probe;
mod session;

pub use convert::FrameConverter;
pub use frame::DecodedFrame;
pub use hwaccel::{
    available_device_types, first_hw_format, is_hw_pixel_format, negotiate, DeviceFactory,
    FfmpegDevices, HardwareContext, HwBackend, HwDevice,
};
pub use probe::{
    open_input, pixel_format_name, pixel_has_alpha, select_frame_rate, select_video_stream,
    StreamInfo,
};
pub use session::{DecodeSession, SessionState};
