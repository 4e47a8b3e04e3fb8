//! The capability surface a fingerprint SDK must provide.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    #[error("failed to load SDK library {path}: {reason}")]
    LibraryLoad { path: String, reason: String },
    #[error("missing SDK symbol: {0}")]
    MissingSymbol(String),
    #[error("SDK not initialized")]
    NotInitialized,
    #[error("device not opened")]
    NotOpened,
    #[error("{call} failed: {name} ({code})")]
    Call {
        call: &'static str,
        code: i32,
        name: &'static str,
    },
    #[error("{0}")]
    Other(String),
}

/// Frame buffer shape reported by the device when it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceGeometry {
    pub width: u32,
    pub height: u32,
}

impl DeviceGeometry {
    /// Bytes in one 8-bit grayscale frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Indicator LED colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Light {
    /// Session ready.
    Green,
    /// Capture failed.
    Red,
}

impl fmt::Display for Light {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Light::Green => f.write_str("green"),
            Light::Red => f.write_str("red"),
        }
    }
}

/// Operations the capture session needs from a vendor fingerprint SDK.
///
/// `acquire_image` separates "no finger on the sensor yet" (`Ok(None)`)
/// from a device fault (`Err`), so callers can keep polling on the former
/// and abort on the latter.
pub trait FingerprintSdk {
    /// Initialize the SDK runtime.
    fn init(&mut self) -> Result<(), SdkError>;

    /// Number of attached devices.
    fn device_count(&mut self) -> Result<usize, SdkError>;

    /// Open the device at `index` and report its frame geometry.
    fn open_device(&mut self, index: usize) -> Result<DeviceGeometry, SdkError>;

    fn set_light(&mut self, light: Light) -> Result<(), SdkError>;

    /// Clear the on-device fingerprint template database.
    fn clear_db(&mut self) -> Result<(), SdkError>;

    /// Non-blocking acquisition of one raw grayscale frame.
    fn acquire_image(&mut self) -> Result<Option<Vec<u8>>, SdkError>;

    fn close_device(&mut self) -> Result<(), SdkError>;
}
