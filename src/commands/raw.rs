//! Raw Command Handler
//!
//! Handles the `raw` subcommand: sends one caller-supplied CDB through the
//! retry executor and prints the classified result.

use super::{print_json, with_device, CommandReport};
use rust_tapectl::scsi::SENSE_INFO_LEN;
use rust_tapectl::{CommandRequest, Config, Result};
use std::time::Duration;
use tracing::info;

pub struct RawArgs {
    pub cdb: Vec<u8>,
    pub read: Option<usize>,
    pub write: Option<Vec<u8>>,
    pub timeout: Option<u64>,
}

pub fn execute(config: &Config, device: &str, args: RawArgs, json: bool) -> Result<()> {
    info!(
        "Sending CDB {} to {}",
        hex::encode(&args.cdb),
        device
    );

    let mut read_buffer = args.read.map(|len| vec![0u8; len]);
    let mut sense = [0u8; SENSE_INFO_LEN];

    let outcome = with_device(config, device, |registry, handle| {
        let timeout = args
            .timeout
            .map(Duration::from_secs)
            .unwrap_or_else(|| registry.command_timeout());
        let mut request = CommandRequest::new(&args.cdb, &mut sense).with_timeout(timeout);
        if let Some(buffer) = read_buffer.as_deref_mut() {
            request = request.read_into(buffer);
        } else if let Some(payload) = args.write.as_deref() {
            request = request.write_from(payload);
        }
        registry.execute_command(handle, &mut request)
    })?;

    let data = read_buffer.as_deref().map(|buffer| {
        let len = buffer.len().saturating_sub(outcome.residual);
        &buffer[..len]
    });
    let report = CommandReport::new(&outcome, data);

    if json {
        return print_json(&report);
    }

    println!("Command 0x{} on {}:", hex::encode(&args.cdb), device);
    report.print();
    Ok(())
}
