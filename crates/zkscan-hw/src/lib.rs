//! zkscan-hw — Hardware abstraction for USB fingerprint scanners.
//!
//! Defines the narrow SDK boundary the capture session talks to, a
//! runtime-loaded binding for the ZKTeco ZKFinger SDK (`libzkfp.so`),
//! and grayscale frame encoding to PNG.

pub mod frame;
pub mod sdk;
pub mod zkfp;

pub use frame::{FrameError, RawFrame};
pub use sdk::{DeviceGeometry, FingerprintSdk, Light, SdkError};
pub use zkfp::ZkfpSdk;
