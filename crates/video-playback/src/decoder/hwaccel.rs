//! Hardware acceleration negotiation
//!
//! Backends are tried in a fixed priority order and the first one whose device
//! context can be created is bound to the codec. Failing every backend is not an
//! error: the session just decodes in software.

use std::ffi::CStr;
use std::ptr;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::ffi;
use ffmpeg_next::format::Pixel;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::DecodeError;

/// Hardware acceleration backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HwBackend {
    Cuda,
    Vaapi,
    D3d11va,
    Dxva2,
    VideoToolbox,
}

impl HwBackend {
    /// GPU vendor backend, then platform-native backends, then VideoToolbox.
    pub const DEFAULT_PRIORITY: [HwBackend; 5] = [
        HwBackend::Cuda,
        HwBackend::Vaapi,
        HwBackend::D3d11va,
        HwBackend::Dxva2,
        HwBackend::VideoToolbox,
    ];

    /// FFmpeg's device type name
    pub fn name(self) -> &'static str {
        match self {
            HwBackend::Cuda => "cuda",
            HwBackend::Vaapi => "vaapi",
            HwBackend::D3d11va => "d3d11va",
            HwBackend::Dxva2 => "dxva2",
            HwBackend::VideoToolbox => "videotoolbox",
        }
    }

    fn device_type(self) -> ffi::AVHWDeviceType {
        use ffi::AVHWDeviceType::*;
        match self {
            HwBackend::Cuda => AV_HWDEVICE_TYPE_CUDA,
            HwBackend::Vaapi => AV_HWDEVICE_TYPE_VAAPI,
            HwBackend::D3d11va => AV_HWDEVICE_TYPE_D3D11VA,
            HwBackend::Dxva2 => AV_HWDEVICE_TYPE_DXVA2,
            HwBackend::VideoToolbox => AV_HWDEVICE_TYPE_VIDEOTOOLBOX,
        }
    }

    /// Device-resident surface format the decoder produces on this backend
    pub fn surface_format(self) -> Pixel {
        use ffi::AVPixelFormat::*;
        Pixel::from(match self {
            HwBackend::Cuda => AV_PIX_FMT_CUDA,
            HwBackend::Vaapi => AV_PIX_FMT_VAAPI,
            HwBackend::D3d11va => AV_PIX_FMT_D3D11,
            HwBackend::Dxva2 => AV_PIX_FMT_DXVA2_VLD,
            HwBackend::VideoToolbox => AV_PIX_FMT_VIDEOTOOLBOX,
        })
    }
}

impl std::fmt::Display for HwBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Owned reference to an FFmpeg hardware device context
pub struct HwDevice {
    ptr: *mut ffi::AVBufferRef,
    backend: HwBackend,
}

impl HwDevice {
    /// Create a device context on the default device of `backend`
    pub fn create(backend: HwBackend) -> Result<Self, DecodeError> {
        let mut raw: *mut ffi::AVBufferRef = ptr::null_mut();

        let ret = unsafe {
            ffi::av_hwdevice_ctx_create(
                &mut raw,
                backend.device_type(),
                ptr::null(),
                ptr::null_mut(),
                0,
            )
        };

        if ret < 0 || raw.is_null() {
            return Err(DecodeError::HwDevice {
                backend: backend.name(),
                reason: ffmpeg::Error::from(ret).to_string(),
            });
        }

        Ok(Self { ptr: raw, backend })
    }

    pub fn backend(&self) -> HwBackend {
        self.backend
    }
}

impl Drop for HwDevice {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                ffi::av_buffer_unref(&mut self.ptr);
            }
        }
    }
}

/// Creates device contexts for the negotiator.
///
/// Passed into the session so device creation can be swapped out without
/// touching the decode path.
pub trait DeviceFactory {
    fn create(&self, backend: HwBackend) -> Result<HwDevice, DecodeError>;
}

/// Creates real FFmpeg device contexts
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegDevices;

impl DeviceFactory for FfmpegDevices {
    fn create(&self, backend: HwBackend) -> Result<HwDevice, DecodeError> {
        HwDevice::create(backend)
    }
}

/// Device context bound to a codec, plus the surface format it decodes into
pub struct HardwareContext {
    device: HwDevice,
    surface_format: Pixel,
}

impl HardwareContext {
    pub fn backend(&self) -> HwBackend {
        self.device.backend()
    }

    pub fn surface_format(&self) -> Pixel {
        self.surface_format
    }
}

/// Try each backend in order and return the first one `create` accepts
pub fn first_available<T>(
    backends: &[HwBackend],
    mut create: impl FnMut(HwBackend) -> Result<T, DecodeError>,
) -> Option<T> {
    for &backend in backends {
        match create(backend) {
            Ok(device) => return Some(device),
            Err(e) => debug!("Hardware backend {} unavailable: {}", backend, e),
        }
    }
    None
}

/// Bind the first creatable backend to an unopened codec context.
///
/// Installs the device reference and the surface-format hook. Returns `None`
/// when no backend is usable; the codec is left untouched in that case.
pub fn negotiate(
    context: &mut ffmpeg::codec::context::Context,
    factory: &dyn DeviceFactory,
    backends: &[HwBackend],
) -> Option<HardwareContext> {
    let Some(device) = first_available(backends, |backend| factory.create(backend)) else {
        info!("Hardware acceleration not available, using software decoding");
        return None;
    };

    let reference = unsafe { ffi::av_buffer_ref(device.ptr) };
    if reference.is_null() {
        warn!("Could not reference {} device context, using software decoding", device.backend());
        return None;
    }

    unsafe {
        let ctx = context.as_mut_ptr();
        (*ctx).hw_device_ctx = reference;
        (*ctx).get_format = Some(select_hw_format_hook);
    }

    info!("Hardware acceleration enabled: {}", device.backend());

    let surface_format = device.backend().surface_format();
    Some(HardwareContext {
        device,
        surface_format,
    })
}

/// Whether frames of this format live in device memory
pub fn is_hw_pixel_format(format: Pixel) -> bool {
    if format == Pixel::None {
        return false;
    }
    let desc = unsafe { ffi::av_pix_fmt_desc_get(format.into()) };
    if desc.is_null() {
        return false;
    }
    unsafe { (*desc).flags & ffi::AV_PIX_FMT_FLAG_HWACCEL as u64 != 0 }
}

/// First hardware-resident candidate, if the decoder offers one
pub fn first_hw_format(candidates: &[Pixel]) -> Option<Pixel> {
    candidates.iter().copied().find(|&f| is_hw_pixel_format(f))
}

unsafe extern "C" fn select_hw_format_hook(
    _ctx: *mut ffi::AVCodecContext,
    mut formats: *const ffi::AVPixelFormat,
) -> ffi::AVPixelFormat {
    let mut candidates = Vec::new();
    while !formats.is_null() && *formats != ffi::AVPixelFormat::AV_PIX_FMT_NONE {
        candidates.push(Pixel::from(*formats));
        formats = formats.add(1);
    }

    match first_hw_format(&candidates) {
        Some(format) => format.into(),
        None => {
            warn!("Decoder offered no hardware surface format: {:?}", candidates);
            ffi::AVPixelFormat::AV_PIX_FMT_NONE
        }
    }
}

/// Names of the device types compiled into the linked FFmpeg
pub fn available_device_types() -> Vec<String> {
    let mut names = Vec::new();
    let mut device_type = ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_NONE;

    loop {
        device_type = unsafe { ffi::av_hwdevice_iterate_types(device_type) };
        if device_type == ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_NONE {
            break;
        }

        let name = unsafe { ffi::av_hwdevice_get_type_name(device_type) };
        if !name.is_null() {
            names.push(unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned());
        }
    }

    names
}
