//! Runtime configuration
//!
//! Retry and timeout tuning for the command layer. Device paths are never
//! configured here; callers pass them in.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, TapeCtlError};
use crate::scsi::constants::timeouts;

/// What `DeviceRegistry::open_device` does when a node opens but does not answer INQUIRY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InquiryFailurePolicy {
    /// Keep the device open as a plain (non-SCSI) tape node
    #[default]
    PlainTape,
    /// Close the node and report `InquiryFailed`
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Attempts per command while the device reports BUSY
    pub retry_budget: u32,
    /// Pause between BUSY retries
    pub busy_delay_ms: u64,
    pub command_timeout_secs: u64,
    pub inquiry_timeout_secs: u64,
    pub inquiry_failure: InquiryFailurePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry_budget: 5,
            busy_delay_ms: 500,
            command_timeout_secs: timeouts::COMMAND_SECS,
            inquiry_timeout_secs: timeouts::INQUIRY_SECS,
            inquiry_failure: InquiryFailurePolicy::default(),
        }
    }
}

impl Config {
    /// Per-user config file: `<config_dir>/tapectl/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tapectl").join("config.json"))
    }

    /// Load from `path`, else the per-user file if present, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => {
                    debug!("No configuration file, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| {
            TapeCtlError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry_budget == 0 {
            return Err(TapeCtlError::config("retry_budget must be at least 1"));
        }
        if self.command_timeout_secs == 0 {
            return Err(TapeCtlError::config("command_timeout_secs must be at least 1"));
        }
        if self.inquiry_timeout_secs == 0 {
            return Err(TapeCtlError::config("inquiry_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    pub fn busy_delay(&self) -> Duration {
        Duration::from_millis(self.busy_delay_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn inquiry_timeout(&self) -> Duration {
        Duration::from_secs(self.inquiry_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry_budget, 5);
        assert_eq!(config.inquiry_failure, InquiryFailurePolicy::PlainTape);
        assert_eq!(config.command_timeout(), Duration::from_secs(240));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "retry_budget": 3, "inquiry_failure": "fail" }}"#).unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.retry_budget, 3);
        assert_eq!(config.inquiry_failure, InquiryFailurePolicy::Fail);
        assert_eq!(config.busy_delay_ms, 500);
    }

    #[test]
    fn test_reject_zero_budget() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "retry_budget": 0 }}"#).unwrap();

        assert!(matches!(
            Config::from_file(file.path()),
            Err(TapeCtlError::Config(_))
        ));
    }

    #[test]
    fn test_reject_unknown_field() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "retries": 3 }}"#).unwrap();

        assert!(matches!(
            Config::from_file(file.path()),
            Err(TapeCtlError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(matches!(
            Config::load(Some(path.as_path())),
            Err(TapeCtlError::Config(_))
        ));
    }
}
