//! Capture session: device lifecycle and the bounded polling loop.

use crate::clock::{Clock, SystemClock};
use crate::types::{CaptureOptions, CaptureResult};
use std::io::{self, Write};
use thiserror::Error;
use zkscan_hw::{DeviceGeometry, FingerprintSdk, FrameError, Light, RawFrame, SdkError};

/// Reported when `connect` did not succeed.
pub const CONNECT_FAILED_MESSAGE: &str = "Failed to connect to device";

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("No fingerprint devices found")]
    NoDeviceFound,
    #[error("device index {index} out of range ({count} devices found)")]
    NoSuchDevice { index: usize, count: usize },
    #[error("session already closed")]
    Closed,
    #[error("{0}")]
    Sdk(#[from] SdkError),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Device not connected")]
    NotConnected,
    #[error("Capture failed: {0}")]
    Acquisition(#[from] SdkError),
    #[error("Capture failed: {0}")]
    Encode(#[from] FrameError),
    #[error("Timeout: No fingerprint detected within {secs} seconds")]
    Timeout { secs: u64 },
}

/// Lifecycle of the device handle owned by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected(DeviceGeometry),
    Closed,
}

/// Owns one fingerprint device from connect to close and produces one result.
///
/// The device is closed when the session is dropped if `close` was not
/// called explicitly.
pub struct CaptureSession<S: FingerprintSdk, C: Clock = SystemClock> {
    sdk: S,
    clock: C,
    options: CaptureOptions,
    state: SessionState,
}

impl<S: FingerprintSdk> CaptureSession<S> {
    /// Session on the real wall clock.
    pub fn with_system_clock(sdk: S, options: CaptureOptions) -> Self {
        Self::new(sdk, SystemClock::new(), options)
    }
}

impl<S: FingerprintSdk, C: Clock> CaptureSession<S, C> {
    pub fn new(sdk: S, clock: C, options: CaptureOptions) -> Self {
        Self {
            sdk,
            clock,
            options,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected(_))
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    /// Initialize the SDK, open the configured device, light it green and
    /// clear its template database.
    ///
    /// The template database is cleared on every connect so each capture
    /// starts from an empty on-device store. Failures are logged and
    /// reported as `false`.
    pub fn connect(&mut self) -> bool {
        match self.try_connect() {
            Ok(geometry) => {
                self.state = SessionState::Connected(geometry);
                tracing::info!(
                    width = geometry.width,
                    height = geometry.height,
                    "device connected successfully"
                );
                true
            }
            Err(ConnectError::NoDeviceFound) => {
                tracing::error!("no fingerprint devices found");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "connection failed");
                false
            }
        }
    }

    fn try_connect(&mut self) -> Result<DeviceGeometry, ConnectError> {
        match self.state {
            SessionState::Connected(geometry) => return Ok(geometry),
            SessionState::Closed => return Err(ConnectError::Closed),
            SessionState::Disconnected => {}
        }

        self.sdk.init()?;

        let count = self.sdk.device_count()?;
        if count == 0 {
            return Err(ConnectError::NoDeviceFound);
        }
        let index = self.options.device_index;
        if index >= count {
            return Err(ConnectError::NoSuchDevice { index, count });
        }
        tracing::info!(count, index, "fingerprint devices found, connecting");

        let geometry = self.sdk.open_device(index)?;

        if let Err(e) = self.prepare_device() {
            if let Err(close_err) = self.sdk.close_device() {
                tracing::warn!(error = %close_err, "failed to close device after connect failure");
            }
            return Err(e.into());
        }

        Ok(geometry)
    }

    fn prepare_device(&mut self) -> Result<(), SdkError> {
        self.sdk.set_light(Light::Green)?;
        self.sdk.clear_db()
    }

    /// Poll the device until a frame arrives, the device faults, or the
    /// timeout elapses.
    pub fn capture(&mut self) -> CaptureResult {
        match self.try_capture() {
            Ok(image) => CaptureResult::success(image),
            Err(e) => CaptureResult::error(e.to_string()),
        }
    }

    fn try_capture(&mut self) -> Result<String, CaptureError> {
        let SessionState::Connected(geometry) = self.state else {
            return Err(CaptureError::NotConnected);
        };

        tracing::info!("waiting for fingerprint (place finger on scanner)");
        let start = self.clock.now();
        let mut polls = 0u32;

        while self.clock.now().saturating_sub(start) < self.options.timeout {
            polls += 1;
            match self.sdk.acquire_image() {
                Ok(Some(data)) => {
                    let frame = RawFrame::new(data, geometry.width, geometry.height);
                    tracing::debug!(
                        polls,
                        bytes = frame.data.len(),
                        brightness = frame.avg_brightness(),
                        "frame acquired"
                    );
                    return frame
                        .to_base64_png()
                        .map_err(|e| self.fault(CaptureError::Encode(e)));
                }
                Ok(None) => self.clock.sleep(self.options.poll_interval),
                Err(e) => return Err(self.fault(CaptureError::Acquisition(e))),
            }
        }

        tracing::warn!(polls, "no fingerprint detected before timeout");
        Err(CaptureError::Timeout {
            secs: self.options.timeout.as_secs(),
        })
    }

    /// Signal a capture fault on the device and hand the error back.
    fn fault(&mut self, err: CaptureError) -> CaptureError {
        if let Err(e) = self.sdk.set_light(Light::Red) {
            tracing::warn!(error = %e, "failed to set error light");
        }
        tracing::error!(error = %err, "error during fingerprint capture");
        err
    }

    /// Release the device. Safe to call any number of times; close
    /// failures are logged and never propagated.
    pub fn close(&mut self) {
        if let SessionState::Connected(_) = self.state {
            match self.sdk.close_device() {
                Ok(()) => tracing::debug!("device closed"),
                Err(e) => tracing::error!(error = %e, "error closing device"),
            }
        }
        self.state = SessionState::Closed;
    }
}

impl<S: FingerprintSdk, C: Clock> Drop for CaptureSession<S, C> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Write `result` to `out` as a single JSON line.
pub fn write_result<W: Write>(out: &mut W, result: &CaptureResult) -> io::Result<()> {
    let line = result.to_json().map_err(io::Error::from)?;
    writeln!(out, "{line}")?;
    out.flush()
}

/// Connect, capture once, emit the result, then close the device.
///
/// The result is written before teardown, so a failing close can never
/// replace it.
pub fn run<S, C, W>(session: &mut CaptureSession<S, C>, out: &mut W) -> io::Result<CaptureResult>
where
    S: FingerprintSdk,
    C: Clock,
    W: Write,
{
    let result = if session.connect() {
        session.capture()
    } else {
        CaptureResult::error(CONNECT_FAILED_MESSAGE)
    };

    let written = write_result(out, &result);
    session.close();
    written.map(|()| result)
}
