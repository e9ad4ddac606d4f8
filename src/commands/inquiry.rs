//! Inquiry Command Handler
//!
//! Handles the `inquiry` subcommand: prints the identity read at open time.

use super::{print_json, with_device};
use rust_tapectl::{Config, Result};
use serde::Serialize;
use tracing::info;

#[derive(Serialize)]
struct InquiryReport<'a> {
    device: &'a str,
    scsi: bool,
    identity: Option<rust_tapectl::Identity>,
}

pub fn execute(config: &Config, device: &str, json: bool) -> Result<()> {
    info!("Reading device identity: {}", device);

    with_device(config, device, |registry, handle| {
        let descriptor = registry.lookup(handle)?;
        let report = InquiryReport {
            device,
            scsi: descriptor.is_scsi(),
            identity: descriptor.identity().cloned(),
        };

        if json {
            return print_json(&report);
        }

        println!("Device {}:", device);
        match &report.identity {
            Some(id) => {
                println!("  Type: {}", id.device_type().description());
                println!("  Vendor: {}", id.vendor());
                println!("  Product: {}", id.product());
                println!("  Revision: {}", id.revision());
                println!("  Short name: {}", id.short_name());
            }
            None => println!("  No SCSI identity, treated as a plain tape device"),
        }
        println!(
            "  SCSI commands: {}",
            if report.scsi { "supported" } else { "not supported" }
        );
        Ok(())
    })
}
