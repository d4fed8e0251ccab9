//! Decoder configuration.

use serde::{Deserialize, Serialize};

use crate::decoder::HwBackend;

/// Default ceiling on back-to-back packet submission failures per decode call.
pub const DEFAULT_MAX_SEND_FAILURES: u32 = 64;

/// Options read by [`DecodeSession::open`](crate::DecodeSession::open).
///
/// Changing a value on an open session has no effect until the next open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Try hardware backends before settling on software decoding.
    pub use_hardware_acceleration: bool,
    /// Backends to try, in order. The first one that creates a device wins.
    pub hw_backends: Vec<HwBackend>,
    /// Consecutive rejected packets tolerated by one decode call before it gives up.
    pub max_consecutive_send_failures: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            use_hardware_acceleration: true,
            hw_backends: HwBackend::DEFAULT_PRIORITY.to_vec(),
            max_consecutive_send_failures: DEFAULT_MAX_SEND_FAILURES,
        }
    }
}

impl DecoderConfig {
    /// Software-only configuration.
    pub fn software_only() -> Self {
        Self {
            use_hardware_acceleration: false,
            ..Self::default()
        }
    }
}
