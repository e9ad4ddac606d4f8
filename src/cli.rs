use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tapectl")]
#[command(about = "Issue SCSI and tape-control commands to tape drives and changers")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Specify configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show device identity (INQUIRY)
    Inquiry {
        /// Device path (e.g. /dev/nst0, /dev/sg1, \\.\TAPE0)
        #[arg(value_name = "DEVICE")]
        device: String,
    },

    /// Show tape mechanical status
    Status {
        #[arg(value_name = "DEVICE")]
        device: String,
    },

    /// Unload the tape
    Eject {
        #[arg(value_name = "DEVICE")]
        device: String,
    },

    /// Rewind the tape
    Rewind {
        #[arg(value_name = "DEVICE")]
        device: String,
    },

    /// Run TEST UNIT READY and decode the sense data
    Ready {
        #[arg(value_name = "DEVICE")]
        device: String,
    },

    /// Execute a raw CDB
    Raw {
        #[arg(value_name = "DEVICE")]
        device: String,

        /// Command block as hex, e.g. "12 00 00 00 60 00"
        #[arg(long, value_parser = parse_hex_bytes)]
        cdb: HexBytes,

        /// Read this many bytes from the device
        #[arg(long, value_name = "BYTES", conflicts_with = "write")]
        read: Option<usize>,

        /// Send these hex bytes to the device
        #[arg(long, value_name = "HEX", value_parser = parse_hex_bytes)]
        write: Option<HexBytes>,

        /// Command timeout in seconds (defaults to the configured timeout)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
}

/// Byte string given on the command line in hex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

/// Accepts "120000006000", "12 00 00 00 60 00" and "12:00:00:00:60:00"
pub fn parse_hex_bytes(s: &str) -> Result<HexBytes, String> {
    let digits: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
        .collect();
    if digits.is_empty() {
        return Err("empty hex string".to_string());
    }
    hex::decode(&digits)
        .map(HexBytes)
        .map_err(|e| format!("invalid hex '{}': {}", s, e))
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
