//! Ready Command Handler
//!
//! Runs TEST UNIT READY. A not-ready drive is reported, not treated as failure.

use super::{print_json, with_device, CommandReport};
use rust_tapectl::{Config, Result};
use tracing::info;

pub fn execute(config: &Config, device: &str, json: bool) -> Result<()> {
    info!("Checking whether {} is ready", device);

    let outcome = with_device(config, device, |registry, handle| {
        registry.test_unit_ready(handle)
    })?;
    let report = CommandReport::new(&outcome, None);

    if json {
        return print_json(&report);
    }

    if outcome.is_good() {
        println!("{} is ready", device);
    } else {
        println!("{} is not ready", device);
    }
    report.print();
    Ok(())
}
