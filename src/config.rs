use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, SupervisorError};
use crate::registry::Thresholds;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 502;
const DEFAULT_UNIT_ID: u8 = 1;

const CONNECT_TIMEOUT_MS: u64 = 3000;
const REQUEST_TIMEOUT_MS: u64 = 1000;

// Snapshot cadence: 1 Hz, with a longer pause after a degraded cycle
const POLL_INTERVAL_MS: u64 = 1000;
const ERROR_BACKOFF_MS: u64 = 2000;
const STOP_TIMEOUT_MS: u64 = 1000;

const PULSE_DWELL_MS: u64 = 100;
const STEP_DELAY_MS: u64 = 100;

const SUBSCRIBER_BUFFER: usize = 16;

/// Runtime settings for one supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub host: String,
    pub port: u16,
    pub unit_id: u8,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub error_backoff_ms: u64,
    pub stop_timeout_ms: u64,
    pub pulse_dwell_ms: u64,
    pub step_delay_ms: u64,
    pub subscriber_buffer: usize,
    pub thresholds: Thresholds,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            unit_id: DEFAULT_UNIT_ID,
            connect_timeout_ms: CONNECT_TIMEOUT_MS,
            request_timeout_ms: REQUEST_TIMEOUT_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
            error_backoff_ms: ERROR_BACKOFF_MS,
            stop_timeout_ms: STOP_TIMEOUT_MS,
            pulse_dwell_ms: PULSE_DWELL_MS,
            step_delay_ms: STEP_DELAY_MS,
            subscriber_buffer: SUBSCRIBER_BUFFER,
            thresholds: Thresholds::default(),
        }
    }
}

impl SupervisorConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SupervisorError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| SupervisorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("error_backoff_ms", self.error_backoff_ms),
            ("request_timeout_ms", self.request_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(SupervisorError::Config(format!("{name} must be non-zero")));
            }
        }
        if self.subscriber_buffer == 0 {
            return Err(SupervisorError::Config(
                "subscriber_buffer must be non-zero".to_string(),
            ));
        }
        self.thresholds.validate()
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn pulse_dwell(&self) -> Duration {
        Duration::from_millis(self.pulse_dwell_ms)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}
