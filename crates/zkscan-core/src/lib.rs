//! zkscan-core — Single-shot fingerprint capture.
//!
//! A [`CaptureSession`] connects to one sensor, polls it for a finger
//! press within a bounded time window, and turns the outcome into a
//! [`CaptureResult`] that serializes to one JSON line.

pub mod clock;
pub mod session;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use session::{
    run, write_result, CaptureError, CaptureSession, ConnectError, SessionState,
    CONNECT_FAILED_MESSAGE,
};
pub use types::{CaptureOptions, CaptureResult};
