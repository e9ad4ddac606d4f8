use super::{print_json, with_device};
use rust_tapectl::{Config, Result};
use serde_json::json;

pub fn execute(config: &Config, device: &str, json: bool) -> Result<()> {
    with_device(config, device, |registry, handle| registry.rewind(handle))?;

    if json {
        print_json(&json!({ "device": device, "rewound": true }))
    } else {
        println!("Tape in {} rewound", device);
        Ok(())
    }
}
