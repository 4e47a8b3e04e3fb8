use std::time::Duration;
use zkscan_core::CaptureOptions;
use zkscan_hw::zkfp::DEFAULT_LIBRARY;

/// Scanner configuration, loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Path or soname of the ZKFinger SDK library (default: libzkfp.so).
    pub sdk_library: String,
    /// Index of the sensor to open.
    pub device_index: usize,
    /// Seconds to wait for a finger before giving up.
    pub timeout_secs: u64,
    /// Milliseconds to sleep between empty polls.
    pub poll_interval_ms: u64,
}

impl Config {
    /// Load configuration from `ZKSCAN_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            sdk_library: var("ZKSCAN_SDK_LIBRARY").unwrap_or_else(|| DEFAULT_LIBRARY.to_string()),
            device_index: parse_or(&var, "ZKSCAN_DEVICE_INDEX", 0),
            timeout_secs: parse_or(&var, "ZKSCAN_TIMEOUT_SECS", 30),
            poll_interval_ms: parse_or(&var, "ZKSCAN_POLL_INTERVAL_MS", 100),
        }
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            device_index: self.device_index,
            timeout: Duration::from_secs(self.timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
