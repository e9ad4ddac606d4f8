//! Command Handlers Module
//!
//! Each handler opens its device, runs one operation and closes the device
//! again, whether or not the operation succeeded.

pub mod eject;
pub mod inquiry;
pub mod raw;
pub mod ready;
pub mod rewind;
pub mod status;

use rust_tapectl::{CommandOutcome, Config, DeviceHandle, HostRegistry, Result, SenseInfo};
use serde::Serialize;
use tracing::warn;

/// Open `device`, run `op` and close the device on every path
pub fn with_device<T>(
    config: &Config,
    device: &str,
    op: impl FnOnce(&HostRegistry, DeviceHandle) -> Result<T>,
) -> Result<T> {
    let mut registry = HostRegistry::host(config);
    let handle = registry.open_device(device)?;

    let result = op(&registry, handle);
    let closed = registry.close_device(handle);

    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), closed) => {
            if let Err(close_error) = closed {
                warn!("Closing {} failed: {}", device, close_error);
            }
            Err(e)
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Printable view of a finished command
#[derive(Debug, Serialize)]
pub struct CommandReport {
    pub status: String,
    pub raw_status: u8,
    pub attempts: u32,
    pub residual: usize,
    pub sense_hex: String,
    pub sense: Option<SenseInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_hex: Option<String>,
}

impl CommandReport {
    pub fn new(outcome: &CommandOutcome, data: Option<&[u8]>) -> Self {
        Self {
            status: outcome.status.description().to_string(),
            raw_status: outcome.raw_status,
            attempts: outcome.attempts,
            residual: outcome.residual,
            sense_hex: hex::encode(&outcome.sense),
            sense: outcome.sense_info(),
            data_hex: data.map(hex::encode),
        }
    }

    pub fn print(&self) {
        println!(
            "  Status: {} (0x{:02X}) after {} attempt(s)",
            self.status, self.raw_status, self.attempts
        );
        if self.residual > 0 {
            println!("  Residual: {} bytes", self.residual);
        }
        if let Some(sense) = &self.sense {
            println!("  Sense: {}", sense);
        }
        if !self.sense_hex.is_empty() {
            println!("  Sense bytes: {}", self.sense_hex);
        }
        if let Some(data) = &self.data_hex {
            println!("  Data: {}", data);
        }
    }
}
