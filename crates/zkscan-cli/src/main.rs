use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use std::any::Any;
use tracing_subscriber::EnvFilter;
use zkscan_core::{CaptureResult, CaptureSession};
use zkscan_hw::ZkfpSdk;

mod config;

use config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "zkscan",
    version,
    about = "Capture one fingerprint from a ZKTeco scanner and print it as JSON"
)]
struct Cli {
    /// Sensor index to open [env: ZKSCAN_DEVICE_INDEX, default 0]
    #[arg(long)]
    device_index: Option<usize>,
    /// Seconds to wait for a finger [env: ZKSCAN_TIMEOUT_SECS, default 30]
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Milliseconds between polls [env: ZKSCAN_POLL_INTERVAL_MS, default 100]
    #[arg(long)]
    poll_interval_ms: Option<u64>,
    /// ZKFinger SDK library [env: ZKSCAN_SDK_LIBRARY, default libzkfp.so]
    #[arg(long)]
    sdk_library: Option<String>,
}

impl Cli {
    fn apply(self, mut config: Config) -> Config {
        if let Some(index) = self.device_index {
            config.device_index = index;
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(lib) = self.sdk_library {
            config.sdk_library = lib;
        }
        config
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_line_number(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let reason = match std::panic::catch_unwind(run) {
        Ok(Ok(())) => return,
        Ok(Err(e)) => format!("{e:#}"),
        Err(payload) => panic_message(payload.as_ref()),
    };

    tracing::error!(%reason, "capture script failed");
    let result = failure_result(&reason);
    if let Err(e) = zkscan_core::write_result(&mut std::io::stdout().lock(), &result) {
        tracing::error!(error = %e, "failed to write result");
    }
}

fn run() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print().context("failed to print usage")?;
            return Ok(());
        }
        Err(e) => return Err(e).context("invalid arguments"),
    };

    let config = cli.apply(Config::from_env());
    tracing::debug!(?config, "configuration loaded");

    let sdk = ZkfpSdk::new(config.sdk_library.clone());
    let mut session = CaptureSession::with_system_clock(sdk, config.capture_options());

    let stdout = std::io::stdout();
    let result = zkscan_core::run(&mut session, &mut stdout.lock())
        .context("failed to write result")?;
    tracing::info!(success = result.is_success(), "capture finished");

    Ok(())
}

fn failure_result(reason: &str) -> CaptureResult {
    CaptureResult::error(format!("Script failed: {reason}"))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_env_config() {
        let cli = Cli::try_parse_from([
            "zkscan",
            "--timeout-secs",
            "5",
            "--sdk-library",
            "/tmp/libzkfp.so",
        ])
        .unwrap();
        let config = cli.apply(Config::from_vars(|_| None));
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.sdk_library, "/tmp/libzkfp.so");
        assert_eq!(config.device_index, 0);
        assert_eq!(config.poll_interval_ms, 100);
    }

    #[test]
    fn test_no_arguments_required() {
        let cli = Cli::try_parse_from(["zkscan"]).unwrap();
        assert!(cli.device_index.is_none());
        assert!(cli.timeout_secs.is_none());
    }

    #[test]
    fn test_failure_result_shape() {
        let json = failure_result("boom").to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "Script failed: boom");
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("sensor exploded")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "sensor exploded");
    }
}
