//! Status Command Handler
//!
//! Handles the `status` subcommand for querying tape mechanical status.

use super::{print_json, with_device};
use rust_tapectl::{Config, Result};
use tracing::info;

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

pub fn execute(config: &Config, device: &str, json: bool) -> Result<()> {
    info!("Getting tape status: {}", device);

    with_device(config, device, |registry, handle| {
        let report = registry.query_tape_status(handle)?.report();

        if json {
            return print_json(&report);
        }

        println!("Tape status for {}:", device);
        println!("  Online: {}", yes_no(report.online));
        println!("  Beginning of tape: {}", yes_no(report.beginning_of_tape));
        println!("  End of tape: {}", yes_no(report.end_of_tape));
        println!("  Write protected: {}", yes_no(report.write_protected));
        Ok(())
    })
}
