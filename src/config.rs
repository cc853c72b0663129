use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::receiver::MIN_CAPTURE_WINDOW;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    IOError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("duty must be within (0, 1], got {0}")]
    InvalidDuty(f32),
    #[error("capture window must be at least 750ms, got {0}ms")]
    CaptureWindowTooShort(u64),
    #[error("capture capacity must be at least 1 edge")]
    EmptyCapture,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    /// Carrier frequency the PWM channel is set up with
    pub carrier_hz: u32,
    /// Fraction of the carrier period the LED is lit during a mark
    pub duty: f32,
    pub capture_window_ms: u64,
    /// Maximum number of edges kept per capture
    pub capture_capacity: usize,
    /// How long a caller waits for a transmission, it is never aborted
    pub transmit_timeout_ms: Option<u64>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            carrier_hz: 38_000,
            duty: 0.25,
            capture_window_ms: 750,
            capture_capacity: 1024,
            transmit_timeout_ms: None,
            log_level: "info".into(),
        }
    }
}

impl Config {
    /// Loads the config at `path`, falling back to defaults when it doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let cfg = if path.exists() {
            let txt = fs::read_to_string(path)?;
            serde_json::from_str(&txt)?
        } else {
            Config::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.duty > 0.0 && self.duty <= 1.0) {
            return Err(ConfigError::InvalidDuty(self.duty));
        }
        if self.capture_window() < MIN_CAPTURE_WINDOW {
            return Err(ConfigError::CaptureWindowTooShort(self.capture_window_ms));
        }
        if self.capture_capacity == 0 {
            return Err(ConfigError::EmptyCapture);
        }
        Ok(())
    }

    pub fn capture_window(&self) -> Duration {
        Duration::from_millis(self.capture_window_ms)
    }

    pub fn transmit_timeout(&self) -> Option<Duration> {
        self.transmit_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let cfg: Config = serde_json::from_str(r#"{ "duty": 0.5, "transmit_timeout_ms": 500 }"#).unwrap();
        assert_eq!(cfg.duty, 0.5);
        assert_eq!(cfg.carrier_hz, 38_000);
        assert_eq!(cfg.transmit_timeout(), Some(Duration::from_millis(500)));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let cfg = Config {
            duty: 0.0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidDuty(_))));

        let cfg = Config {
            capture_window_ms: 500,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::CaptureWindowTooShort(500))
        ));
    }

    #[test]
    fn test_missing_file() {
        let cfg = Config::load(Path::new("/nonexistent/daikin-remote.json")).unwrap();
        assert_eq!(cfg, Config::default());
    }
}
