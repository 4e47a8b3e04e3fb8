use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Message carried by every successful capture.
pub const SUCCESS_MESSAGE: &str = "Fingerprint captured successfully";

/// The single externally observable outcome of a run.
///
/// Serializes as `{"status":"success","message":..,"image":..}` or
/// `{"status":"error","message":..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CaptureResult {
    Success {
        message: String,
        /// Base64-encoded PNG.
        image: String,
    },
    Error {
        message: String,
    },
}

impl CaptureResult {
    pub fn success(image: String) -> Self {
        Self::Success {
            message: SUCCESS_MESSAGE.to_string(),
            image,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. } | Self::Error { message } => message,
        }
    }

    /// One-line JSON rendering.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Tunables for one capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Index of the sensor to open.
    pub device_index: usize,
    /// Wall-clock budget for the polling loop.
    pub timeout: Duration,
    /// Sleep between empty polls.
    pub poll_interval: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            device_index: 0,
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_json_shape() {
        let json = CaptureResult::success("aGVsbG8=".into()).to_json().unwrap();
        assert_eq!(
            json,
            r#"{"status":"success","message":"Fingerprint captured successfully","image":"aGVsbG8="}"#
        );
    }

    #[test]
    fn test_error_json_shape() {
        let json = CaptureResult::error("Device not connected").to_json().unwrap();
        assert_eq!(json, r#"{"status":"error","message":"Device not connected"}"#);
    }

    #[test]
    fn test_error_has_no_image_field() {
        let value: serde_json::Value =
            serde_json::from_str(&CaptureResult::error("x").to_json().unwrap()).unwrap();
        assert!(value.get("image").is_none());
        assert_eq!(value["status"], "error");
    }

    #[test]
    fn test_parse_back() {
        let original = CaptureResult::success("abc".into());
        let parsed: CaptureResult = serde_json::from_str(&original.to_json().unwrap()).unwrap();
        assert_eq!(parsed, original);
        assert!(parsed.is_success());
        assert_eq!(parsed.message(), SUCCESS_MESSAGE);
    }

    #[test]
    fn test_default_options() {
        let opts = CaptureOptions::default();
        assert_eq!(opts.device_index, 0);
        assert_eq!(opts.timeout, Duration::from_secs(30));
        assert_eq!(opts.poll_interval, Duration::from_millis(100));
    }
}
